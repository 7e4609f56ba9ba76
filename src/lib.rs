//! rsload - synthetic query load testing for a query-serving HTTP API.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod preflight;
pub mod query;
pub mod report;
pub mod run;
pub mod summary;
pub mod target;
pub mod transport;
