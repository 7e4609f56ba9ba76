//! Request construction for the two query shapes the target accepts.

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::definition::{LambdaQuery, QueryBody, SqlQuery};

/// Path that accepts ad-hoc SQL queries.
pub const QUERY_SUBMISSION_PATH: &str = "/v1/orgs/self/queries";

/// Hint telling the target to discard result rows but still report statistics.
pub const DROP_RESULTS_HINT: &str = "HINT(final_aggregator_drop_results=true)";

/// A fully built request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// API path, always starting with `/`.
    pub path: String,
    pub body: JsonValue,
    /// True when the target was asked to discard the result rows.
    pub results_dropped: bool,
}

#[derive(Debug, Serialize)]
struct SqlPayload<'a> {
    sql: SqlPayloadInner<'a>,
}

#[derive(Debug, Serialize)]
struct SqlPayloadInner<'a> {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paginate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_paginate_response_doc_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct LambdaPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a JsonValue>,
}

impl QueryRequest {
    /// Builds the request for a query body.
    ///
    /// `drop_results` only has an effect on SQL bodies; for lambdas the caller
    /// is expected to warn and the request is built unmodified.
    pub fn build(body: &QueryBody, drop_results: bool) -> Self {
        match body {
            QueryBody::Sql(sql) => Self::sql(sql, drop_results),
            QueryBody::Lambda(lambda) => Self::lambda(lambda),
        }
    }

    fn sql(sql: &SqlQuery, drop_results: bool) -> Self {
        let query = if drop_results {
            with_drop_results_hint(&sql.query)
        } else {
            sql.query.clone()
        };

        let payload = SqlPayload {
            sql: SqlPayloadInner {
                query,
                parameters: sql.parameters.as_ref(),
                paginate: sql.paginate,
                initial_paginate_response_doc_count: sql.initial_paginate_response_doc_count,
            },
        };

        Self {
            path: QUERY_SUBMISSION_PATH.to_string(),
            body: to_json(&payload),
            results_dropped: drop_results,
        }
    }

    fn lambda(lambda: &LambdaQuery) -> Self {
        let payload = LambdaPayload {
            parameters: lambda.parameters.as_ref(),
        };

        Self {
            path: normalize_path(&lambda.path),
            body: to_json(&payload),
            results_dropped: false,
        }
    }
}

/// Strips trailing whitespace and one trailing `;`, then appends the drop hint.
pub fn with_drop_results_hint(query: &str) -> String {
    let trimmed = query.trim_end();
    let base = trimmed.strip_suffix(';').unwrap_or(trimmed);
    format!("{base} {DROP_RESULTS_HINT}")
}

/// Ensures an API path starts with `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// Payload structs hold only strings, numbers and JSON values, which always serialize.
fn to_json<T: Serialize>(payload: &T) -> JsonValue {
    serde_json::to_value(payload).unwrap_or(JsonValue::Null)
}
