//! Execution of a single query against the target.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::definition::{QueryBody, QueryDefinition};
use super::outcome::{Outcome, QueryResult, RowCount, Timings};
use super::request::QueryRequest;
use crate::error::{Result, RsloadError};
use crate::target::Target;
use crate::transport::{QueryTransport, TransportResponse};

/// Sends one query and classifies the response.
#[derive(Clone)]
pub struct QueryRunner {
    transport: Arc<dyn QueryTransport>,
}

impl QueryRunner {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self { transport }
    }

    /// Runs query number `query_num` (1-based) against the target.
    ///
    /// Classified failures (timeout, exhaustion, server errors, invalid
    /// definitions) are returned as `Ok` outcomes. `Err` means the run cannot
    /// continue: the transport failed or a 200 body was malformed.
    pub async fn run(
        &self,
        query_num: usize,
        target: &Target,
        query: &QueryDefinition,
    ) -> Result<QueryResult> {
        let Some(body) = &query.body else {
            debug!(query_num, name = %query.name, "query definition has no body");
            return Ok(QueryResult::new(query_num, &query.name, Outcome::Invalid));
        };

        let drop_requested = query.drop_results || target.overrides.drop_results;
        if drop_requested && matches!(body, QueryBody::Lambda(_)) {
            warn!(
                query_num,
                name = %query.name,
                "drop results is not supported for query lambdas; running unmodified"
            );
        }

        let request = QueryRequest::build(body, drop_requested);

        let start = Instant::now();
        let response = self
            .transport
            .post_json(
                &target.endpoint,
                &request.path,
                &target.credential,
                &request.body,
            )
            .await?;
        let round_trip_ms = millis_since(start);

        let outcome = classify_response(&response, round_trip_ms, request.results_dropped)?;
        debug!(
            query_num,
            name = %query.name,
            status = response.status,
            outcome = %outcome.kind(),
            round_trip_ms,
            "query finished"
        );

        Ok(QueryResult::new(query_num, &query.name, outcome))
    }
}

impl std::fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner").finish_non_exhaustive()
    }
}

fn millis_since(start: Instant) -> u64 {
    (start.elapsed().as_secs_f64() * 1000.0).round() as u64
}

/// Turns a received response into an outcome.
fn classify_response(
    response: &TransportResponse,
    round_trip_ms: u64,
    results_dropped: bool,
) -> Result<Outcome> {
    if let Some(outcome) =
        Outcome::from_failure_status(response.status, &response.reason, &response.body)
    {
        return Ok(outcome);
    }

    let parsed: SuccessBody = serde_json::from_str(&response.body)
        .map_err(|e| RsloadError::response(format!("Failed to parse query response: {e}")))?;

    let row_count = match (results_dropped, parsed.results) {
        (true, _) => RowCount::Dropped,
        (false, Some(rows)) => RowCount::Rows(rows.len() as u64),
        (false, None) => {
            return Err(RsloadError::response(
                "Query response has no results array",
            ))
        }
    };

    Ok(Outcome::Success(Timings::derive(
        round_trip_ms,
        parsed.stats.elapsed_time_ms,
        parsed.stats.throttled_time_micros,
        row_count,
    )))
}

// Response types

#[derive(Debug, Deserialize)]
struct SuccessBody {
    stats: ResponseStats,
    results: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ResponseStats {
    elapsed_time_ms: f64,
    throttled_time_micros: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::outcome::OutcomeKind;
    use crate::query::request::QUERY_SUBMISSION_PATH;
    use crate::target::{Credential, Endpoint, Overrides};
    use crate::transport::{MockResponse, MockTransport};
    use serde_json::json;

    fn target() -> Target {
        Target::new(Endpoint::https("api.test"), Credential::new("secret-key"))
    }

    fn runner(mock: &Arc<MockTransport>) -> QueryRunner {
        QueryRunner::new(mock.clone())
    }

    #[tokio::test]
    async fn test_invalid_definition_makes_no_call() {
        let mock = Arc::new(MockTransport::new());
        let result = runner(&mock)
            .run(4, &target(), &QueryDefinition::invalid("broken"))
            .await
            .unwrap();

        assert_eq!(result.query_num, 4);
        assert_eq!(result.name, "broken");
        assert_eq!(result.outcome, Outcome::Invalid);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_success_derives_timings_and_rows() {
        let mock = Arc::new(
            MockTransport::new().with_fallback(MockResponse::rows_with_stats(10, 0, 5000)),
        );
        let result = runner(&mock)
            .run(1, &target(), &QueryDefinition::sql("q", "SELECT 1"))
            .await
            .unwrap();

        let timings = result.outcome.timings().unwrap();
        assert_eq!(timings.row_count, RowCount::Rows(10));
        assert_eq!(timings.server_ms, 0);
        assert_eq!(timings.queued_ms, 5);
        assert_eq!(timings.query_ms, 0);
        assert_eq!(timings.network_ms, timings.round_trip_ms);
    }

    #[tokio::test]
    async fn test_request_shape_and_auth() {
        let mock = Arc::new(MockTransport::new());
        runner(&mock)
            .run(1, &target(), &QueryDefinition::sql("q", "SELECT 1"))
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(
            requests[0].url,
            format!("https://api.test{QUERY_SUBMISSION_PATH}")
        );
        assert_eq!(requests[0].authorization, "ApiKey secret-key");
        assert_eq!(
            requests[0].body,
            Some(json!({"sql": {"query": "SELECT 1"}}))
        );
    }

    #[tokio::test]
    async fn test_status_classification() {
        let mock = Arc::new(
            MockTransport::new()
                .with_route("q408", MockResponse::status(408, ""))
                .with_route("q429", MockResponse::status(429, ""))
                .with_route("q500", MockResponse::status(500, "boom")),
        );
        let runner = runner(&mock);
        let t = target();

        let timeout = runner
            .run(1, &t, &QueryDefinition::sql("a", "SELECT 'q408'"))
            .await
            .unwrap();
        assert_eq!(timeout.kind(), OutcomeKind::Timeout);

        let exhausted = runner
            .run(2, &t, &QueryDefinition::sql("b", "SELECT 'q429'"))
            .await
            .unwrap();
        assert_eq!(exhausted.kind(), OutcomeKind::Exhausted);

        let error = runner
            .run(3, &t, &QueryDefinition::sql("c", "SELECT 'q500'"))
            .await
            .unwrap();
        assert_eq!(
            error.outcome,
            Outcome::Error {
                message: "Internal Server Error. boom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_drop_results_override_marks_rows_dropped() {
        let mock = Arc::new(MockTransport::new().with_fallback(MockResponse::rows(0)));
        let t = target().with_overrides(Overrides { drop_results: true });

        let result = runner(&mock)
            .run(1, &t, &QueryDefinition::sql("q", "SELECT * FROM t;"))
            .await
            .unwrap();

        assert_eq!(result.outcome.timings().unwrap().row_count, RowCount::Dropped);
        let body = mock.requests()[0].body.clone().unwrap();
        assert_eq!(
            body["sql"]["query"],
            "SELECT * FROM t HINT(final_aggregator_drop_results=true)"
        );
    }

    #[tokio::test]
    async fn test_per_query_drop_results() {
        let mock = Arc::new(MockTransport::new());
        let query = QueryDefinition::sql("q", "SELECT 1").with_drop_results(true);

        let result = runner(&mock).run(1, &target(), &query).await.unwrap();

        assert_eq!(result.outcome.timings().unwrap().row_count, RowCount::Dropped);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_warnings() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test]
    async fn test_drop_results_on_lambda_runs_unmodified() {
        let (logs, _guard) = capture_warnings();
        let mock = Arc::new(MockTransport::new().with_fallback(MockResponse::rows(2)));
        let t = target().with_overrides(Overrides { drop_results: true });

        let result = runner(&mock)
            .run(1, &t, &QueryDefinition::lambda("l", "v1/lambdas/x"))
            .await
            .unwrap();

        let logged = logs.text();
        assert!(logged.contains("WARN"));
        assert!(logged.contains("drop results is not supported for query lambdas"));

        assert_eq!(result.outcome.timings().unwrap().row_count, RowCount::Rows(2));
        let requests = mock.requests();
        assert_eq!(requests[0].url, "https://api.test/v1/lambdas/x");
        assert_eq!(requests[0].body, Some(json!({})));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_fatal() {
        let mock = Arc::new(MockTransport::new().with_fallback(MockResponse::status(200, "not json")));
        let err = runner(&mock)
            .run(1, &target(), &QueryDefinition::sql("q", "SELECT 1"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Response Error");
    }

    #[tokio::test]
    async fn test_success_without_results_array_is_fatal() {
        let body = r#"{"stats":{"elapsed_time_ms":10,"throttled_time_micros":0}}"#;
        let mock = Arc::new(MockTransport::new().with_fallback(MockResponse::status(200, body)));

        let err = runner(&mock)
            .run(1, &target(), &QueryDefinition::sql("q", "SELECT 1"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Response Error");
        assert!(err.to_string().contains("no results array"));

        // With results dropped the array is never read.
        let dropped = runner(&mock)
            .run(2, &target(), &QueryDefinition::sql("q", "SELECT 1").with_drop_results(true))
            .await
            .unwrap();
        assert_eq!(dropped.outcome.timings().unwrap().row_count, RowCount::Dropped);
        assert_eq!(dropped.outcome.timings().unwrap().server_ms, 10);
    }

    #[tokio::test]
    async fn test_lambda_without_drop_does_not_warn() {
        let (logs, _guard) = capture_warnings();
        let mock = Arc::new(MockTransport::new());

        runner(&mock)
            .run(1, &target(), &QueryDefinition::lambda("l", "/v1/lambdas/x"))
            .await
            .unwrap();

        assert!(logs.text().is_empty());
    }

    #[tokio::test]
    async fn test_transport_fault_propagates() {
        let mock = Arc::new(MockTransport::new().with_fallback(MockResponse::fault("tls handshake")));
        let err = runner(&mock)
            .run(1, &target(), &QueryDefinition::sql("q", "SELECT 1"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Connection Error");
    }
}
