//! Classified query results.
//!
//! Every response from the target maps to exactly one [`OutcomeKind`]. The
//! same kinds and display texts are used by the summarizer, the console table
//! and the CSV records.

use std::fmt;

/// Display text for a query the target timed out (HTTP 408).
pub const TIMEOUT_MESSAGE: &str = "Query timed out";

/// Display text for a query rejected for lack of resources (HTTP 429).
pub const EXHAUSTED_MESSAGE: &str = "Resources exhausted";

/// Display text for a definition with no usable body.
pub const INVALID_MESSAGE: &str = "Query definition must specify exactly one of lambda or sql";

/// The five outcome kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Error,
    Timeout,
    Exhausted,
    Invalid,
}

impl OutcomeKind {
    /// Returns the kind as a lowercase string for display and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Exhausted => "exhausted",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an HTTP status code to an outcome kind.
///
/// Never returns [`OutcomeKind::Invalid`], which is decided before any request is made.
pub fn classify_status(status: u16) -> OutcomeKind {
    match status {
        200 => OutcomeKind::Success,
        408 => OutcomeKind::Timeout,
        429 => OutcomeKind::Exhausted,
        _ => OutcomeKind::Error,
    }
}

/// Number of rows returned, or a marker that the target was told to drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    Rows(u64),
    Dropped,
}

impl RowCount {
    /// True only for a real count of zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Rows(0))
    }
}

impl fmt::Display for RowCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows(n) => write!(f, "{n}"),
            Self::Dropped => f.write_str("dropped"),
        }
    }
}

/// Latency breakdown of a successful query, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wall-clock duration of the whole call.
    pub round_trip_ms: u64,
    /// Elapsed time reported by the target.
    pub server_ms: u64,
    /// Time the target reports the query spent queued or throttled.
    pub queued_ms: u64,
    /// Server time spent executing.
    pub query_ms: u64,
    /// Time outside the target's own accounting.
    pub network_ms: u64,
    pub row_count: RowCount,
}

impl Timings {
    /// Derives the breakdown from the measured round trip and the target's statistics.
    pub fn derive(
        round_trip_ms: u64,
        elapsed_time_ms: f64,
        throttled_time_micros: f64,
        row_count: RowCount,
    ) -> Self {
        let server_ms = round_ms(elapsed_time_ms);
        let queued_ms = round_ms(throttled_time_micros / 1000.0);
        Self {
            round_trip_ms,
            server_ms,
            queued_ms,
            query_ms: server_ms.saturating_sub(queued_ms),
            network_ms: round_trip_ms.saturating_sub(server_ms),
            row_count,
        }
    }
}

fn round_ms(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Timings),
    /// Any non-200 status other than 408 and 429. Carries reason and body.
    Error { message: String },
    Timeout,
    Exhausted,
    Invalid,
}

impl Outcome {
    /// Builds the outcome for a non-200 response.
    ///
    /// Returns `None` for 200, which needs the response statistics.
    pub fn from_failure_status(status: u16, reason: &str, body: &str) -> Option<Self> {
        match classify_status(status) {
            OutcomeKind::Success => None,
            OutcomeKind::Timeout => Some(Self::Timeout),
            OutcomeKind::Exhausted => Some(Self::Exhausted),
            OutcomeKind::Error | OutcomeKind::Invalid => Some(Self::Error {
                message: format!("{reason}. {body}"),
            }),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Error { .. } => OutcomeKind::Error,
            Self::Timeout => OutcomeKind::Timeout,
            Self::Exhausted => OutcomeKind::Exhausted,
            Self::Invalid => OutcomeKind::Invalid,
        }
    }

    pub fn timings(&self) -> Option<&Timings> {
        match self {
            Self::Success(timings) => Some(timings),
            _ => None,
        }
    }

    /// Fixed human-readable text for non-success outcomes; `None` for success.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { message } => Some(message),
            Self::Timeout => Some(TIMEOUT_MESSAGE),
            Self::Exhausted => Some(EXHAUSTED_MESSAGE),
            Self::Invalid => Some(INVALID_MESSAGE),
        }
    }
}

/// A classified outcome tagged with the query it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// 1-based position of the query within its set.
    pub query_num: usize,
    pub name: String,
    pub outcome: Outcome,
}

impl QueryResult {
    pub fn new(query_num: usize, name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            query_num,
            name: name.into(),
            outcome,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }
}
