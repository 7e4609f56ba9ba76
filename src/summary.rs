//! Reduction of a result list into a run-level verdict.

use crate::query::{Outcome, QueryResult, QuerySet};

/// Warning text for a successful query that returned no rows.
pub const NO_ROWS_WARNING: &str = "Returned no rows";

/// A result worth an operator's attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub query_num: usize,
    pub name: String,
    pub message: String,
}

/// Totals and warnings for one dispatched query set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    pub query_set_num: usize,
    pub query_set_name: Option<String>,
    /// Sum of round-trip times of successful queries.
    pub total_ms: u64,
    pub query_ms: u64,
    pub queued_ms: u64,
    pub network_ms: u64,
    pub warnings: Vec<Warning>,
    /// True when there are no warnings.
    pub clean: bool,
}

impl Summary {
    /// Attaches the identity of the set the results came from.
    pub fn for_query_set(mut self, set: &QuerySet) -> Self {
        self.query_set_num = set.number;
        self.query_set_name = set.name.clone();
        self
    }
}

/// Summarizes results. Timings are summed over successes only.
pub fn summarize(results: &[QueryResult]) -> Summary {
    let mut summary = Summary::default();

    for result in results {
        if let Some(timings) = result.outcome.timings() {
            summary.total_ms += timings.round_trip_ms;
            summary.query_ms += timings.query_ms;
            summary.queued_ms += timings.queued_ms;
            summary.network_ms += timings.network_ms;
        }

        if let Some(message) = warning_message(&result.outcome) {
            summary.warnings.push(Warning {
                query_num: result.query_num,
                name: result.name.clone(),
                message,
            });
        }
    }

    summary.clean = summary.warnings.is_empty();
    summary
}

fn warning_message(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Success(timings) if timings.row_count.is_zero() => {
            Some(NO_ROWS_WARNING.to_string())
        }
        Outcome::Success(_) => None,
        Outcome::Error { message } => Some(format!("Errored with message: {message}")),
        Outcome::Timeout | Outcome::Exhausted | Outcome::Invalid => {
            outcome.message().map(str::to_string)
        }
    }
}
