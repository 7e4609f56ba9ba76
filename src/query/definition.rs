//! Query definitions and query sets as loaded from configuration.

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Name given to queries that do not declare one.
pub const UNNAMED_QUERY: &str = "unnamed";

/// An ad-hoc SQL query.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub query: String,
    pub parameters: Option<JsonValue>,
    pub paginate: Option<bool>,
    pub initial_paginate_response_doc_count: Option<u64>,
}

/// A saved query (query lambda) invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaQuery {
    /// API path of the lambda execution endpoint.
    pub path: String,
    pub parameters: Option<JsonValue>,
}

/// The body of a query: exactly one of SQL or lambda.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Sql(SqlQuery),
    Lambda(LambdaQuery),
}

/// One query of a query set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawQueryDefinition")]
pub struct QueryDefinition {
    pub name: String,
    /// `None` when the definition declares neither or both body kinds.
    pub body: Option<QueryBody>,
    /// Ask the target to discard result rows for this query.
    pub drop_results: bool,
}

impl QueryDefinition {
    /// Creates a named SQL query.
    pub fn sql(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: Some(QueryBody::Sql(SqlQuery {
                query: query.into(),
                parameters: None,
                paginate: None,
                initial_paginate_response_doc_count: None,
            })),
            drop_results: false,
        }
    }

    /// Creates a named lambda query.
    pub fn lambda(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: Some(QueryBody::Lambda(LambdaQuery {
                path: path.into(),
                parameters: None,
            })),
            drop_results: false,
        }
    }

    /// Creates a definition with no usable body.
    pub fn invalid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: None,
            drop_results: false,
        }
    }

    /// Sets the per-query drop-results flag.
    pub fn with_drop_results(mut self, drop_results: bool) -> Self {
        self.drop_results = drop_results;
        self
    }

    /// Attaches bind parameters to whichever body is present.
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        match &mut self.body {
            Some(QueryBody::Sql(sql)) => sql.parameters = Some(parameters),
            Some(QueryBody::Lambda(lambda)) => lambda.parameters = Some(parameters),
            None => {}
        }
        self
    }
}

/// Configuration shape of a query definition.
#[derive(Debug, Deserialize)]
struct RawQueryDefinition {
    name: Option<String>,
    sql: Option<String>,
    lambda: Option<String>,
    parameters: Option<JsonValue>,
    paginate: Option<bool>,
    initial_paginate_response_doc_count: Option<u64>,
    #[serde(default)]
    drop_results: bool,
}

impl From<RawQueryDefinition> for QueryDefinition {
    fn from(raw: RawQueryDefinition) -> Self {
        let body = match (raw.sql, raw.lambda) {
            (Some(query), None) => Some(QueryBody::Sql(SqlQuery {
                query,
                parameters: raw.parameters,
                paginate: raw.paginate,
                initial_paginate_response_doc_count: raw.initial_paginate_response_doc_count,
            })),
            (None, Some(path)) => Some(QueryBody::Lambda(LambdaQuery {
                path,
                parameters: raw.parameters,
            })),
            _ => None,
        };

        Self {
            name: raw.name.unwrap_or_else(|| UNNAMED_QUERY.to_string()),
            body,
            drop_results: raw.drop_results,
        }
    }
}

/// An ordered collection of queries dispatched together.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet {
    /// 1-based position of the set within the run.
    pub number: usize,
    pub name: Option<String>,
    pub queries: Vec<QueryDefinition>,
}

impl QuerySet {
    pub fn new(number: usize, name: Option<String>, queries: Vec<QueryDefinition>) -> Self {
        Self {
            number,
            name,
            queries,
        }
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Name for display, falling back to the set number.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("set {}", self.number),
        }
    }
}
