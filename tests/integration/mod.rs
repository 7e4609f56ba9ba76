//! Integration tests for rsload.

pub mod http_transport_test;
pub mod run_test;
