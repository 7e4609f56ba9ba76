//! Query definitions, request construction, execution and classification.
//!
//! This module holds the per-query half of the engine: what a query is, how
//! it is sent, and how the target's answer is turned into an [`Outcome`].

pub mod definition;
pub mod outcome;
pub mod request;
pub mod runner;

pub use definition::{LambdaQuery, QueryBody, QueryDefinition, QuerySet, SqlQuery};
pub use outcome::{classify_status, Outcome, OutcomeKind, QueryResult, RowCount, Timings};
pub use request::QueryRequest;
pub use runner::QueryRunner;
