//! Display and persistence of run artifacts.
//!
//! Reporters receive the ordered results and the summary of each dispatched
//! query set, together with the masked view of the target. They never add
//! outcome states of their own: status strings and messages come from
//! [`crate::query::OutcomeKind`] and [`crate::query::Outcome::message`].

pub mod console;
pub mod history;

pub use self::console::ConsoleReporter;
pub use self::history::CsvReporter;

use crate::error::Result;
use crate::query::QueryResult;
use crate::run::RunStats;
use crate::summary::Summary;
use crate::target::PublishedTarget;

/// Everything a reporter may know about the run besides the artifacts.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub test_name: &'a str,
    pub stats: &'a RunStats,
    /// 1-based iteration number.
    pub iteration: u32,
    pub target: &'a PublishedTarget,
}

/// A consumer of dispatch artifacts.
pub trait Reporter: Send {
    /// Handles the results and summary of one dispatched query set.
    fn report(
        &mut self,
        ctx: &ReportContext<'_>,
        results: &[QueryResult],
        summary: &Summary,
    ) -> Result<()>;
}

/// Label for the query set a summary belongs to.
pub(crate) fn query_set_label(summary: &Summary) -> String {
    match &summary.query_set_name {
        Some(name) => name.clone(),
        None => summary.query_set_num.to_string(),
    }
}

/// Renders an optional informational number, empty when absent.
pub(crate) fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}
