//! HTTP transport integration tests.
//!
//! Runs queries and preflight through reqwest against a wiremock server.

use rsload::preflight;
use rsload::query::{OutcomeKind, QueryDefinition, QueryRunner, RowCount};
use rsload::target::{Credential, Endpoint, Overrides, Target};
use rsload::transport::HttpTransport;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "abcd1234wxyz";

fn target_for(server: &MockServer) -> Target {
    Target::new(
        Endpoint::insecure(server.address().to_string()),
        Credential::new(KEY),
    )
}

fn runner() -> QueryRunner {
    QueryRunner::new(Arc::new(HttpTransport::new(Some(5)).unwrap()))
}

fn success_body(rows: usize, elapsed_ms: u64, throttled_micros: u64) -> serde_json::Value {
    let results: Vec<_> = (0..rows).map(|i| json!({ "id": i })).collect();
    json!({
        "stats": {
            "elapsed_time_ms": elapsed_ms,
            "throttled_time_micros": throttled_micros,
        },
        "results": results,
    })
}

#[tokio::test]
async fn test_sql_query_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orgs/self/queries"))
        .and(header("Authorization", "ApiKey abcd1234wxyz"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({ "sql": { "query": "SELECT * FROM users" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(3, 0, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let query = QueryDefinition::sql("users", "SELECT * FROM users");
    let result = runner().run(1, &target_for(&server), &query).await.unwrap();

    assert_eq!(result.kind(), OutcomeKind::Success);
    assert_eq!(result.query_num, 1);
    assert_eq!(result.name, "users");
    let timings = result.outcome.timings().unwrap();
    assert_eq!(timings.row_count, RowCount::Rows(3));
    assert_eq!(timings.server_ms, 0);
    assert_eq!(timings.network_ms, timings.round_trip_ms);
}

#[tokio::test]
async fn test_drop_results_override_appends_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orgs/self/queries"))
        .and(body_partial_json(json!({
            "sql": { "query": "SELECT * FROM events HINT(final_aggregator_drop_results=true)" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(0, 0, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let target = target_for(&server).with_overrides(Overrides { drop_results: true });
    let query = QueryDefinition::sql("events", "SELECT * FROM events;  ");
    let result = runner().run(1, &target, &query).await.unwrap();

    assert_eq!(result.kind(), OutcomeKind::Success);
    assert_eq!(result.outcome.timings().unwrap().row_count, RowCount::Dropped);
}

#[tokio::test]
async fn test_lambda_posts_to_normalized_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orgs/self/ws/commons/lambdas/daily/tags/latest"))
        .and(body_json(json!({ "parameters": [{ "name": "day", "value": "2024-01-01" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(2, 0, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let query = QueryDefinition::lambda("daily", "v1/orgs/self/ws/commons/lambdas/daily/tags/latest")
        .with_parameters(json!([{ "name": "day", "value": "2024-01-01" }]));
    let result = runner().run(2, &target_for(&server), &query).await.unwrap();

    assert_eq!(result.kind(), OutcomeKind::Success);
    assert_eq!(result.outcome.timings().unwrap().row_count, RowCount::Rows(2));
}

#[tokio::test]
async fn test_failure_statuses_are_classified() {
    let server = MockServer::start().await;
    for (marker, status, body) in [
        ("slow", 408, ""),
        ("busy", 429, ""),
        ("broken", 400, "syntax error at line 1"),
    ] {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "sql": { "query": marker } })))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
    }

    let target = target_for(&server);
    let runner = runner();

    let slow = runner.run(1, &target, &QueryDefinition::sql("a", "slow")).await.unwrap();
    assert_eq!(slow.kind(), OutcomeKind::Timeout);
    assert_eq!(slow.outcome.message(), Some("Query timed out"));

    let busy = runner.run(2, &target, &QueryDefinition::sql("b", "busy")).await.unwrap();
    assert_eq!(busy.kind(), OutcomeKind::Exhausted);

    let broken = runner.run(3, &target, &QueryDefinition::sql("c", "broken")).await.unwrap();
    assert_eq!(broken.kind(), OutcomeKind::Error);
    assert_eq!(
        broken.outcome.message(),
        Some("Bad Request. syntax error at line 1")
    );
}

#[tokio::test]
async fn test_malformed_success_body_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = runner()
        .run(1, &target_for(&server), &QueryDefinition::sql("q", "SELECT 1"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Response Error");
}

#[tokio::test]
async fn test_invalid_definition_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = runner()
        .run(1, &target_for(&server), &QueryDefinition::invalid("empty"))
        .await
        .unwrap();

    assert_eq!(result.kind(), OutcomeKind::Invalid);
}

#[tokio::test]
async fn test_preflight_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orgs/self/virtualinstances"))
        .and(header("Authorization", "ApiKey abcd1234wxyz"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "current_type": "XLARGE" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/orgs/self/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "aggregator_parallelism": 8,
                "concurrent_queries_limit": 60,
                "concurrent_query_execution_limit": 12
            }
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Some(5)).unwrap();
    let capacity = preflight::discover(&transport, &target_for(&server)).await.unwrap();

    assert_eq!(capacity.vi_size.as_deref(), Some("XLARGE"));
    assert_eq!(capacity.aggregator_parallelism, Some(8));
    assert_eq!(capacity.concurrent_queries_limit, Some(60));
    assert_eq!(capacity.concurrent_query_execution_limit, Some(12));
}

#[tokio::test]
async fn test_preflight_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Some(5)).unwrap();
    let err = preflight::discover(&transport, &target_for(&server))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Connection error: Authorization failure connecting to target"
    );
}
