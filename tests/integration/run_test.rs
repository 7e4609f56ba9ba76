//! Full-run integration tests.
//!
//! Config file, HTTP transport, run controller and CSV history together.

use rsload::config::Config;
use rsload::dispatch::Dispatcher;
use rsload::query::QueryRunner;
use rsload::report::CsvReporter;
use rsload::run::RunController;
use rsload::target::{Credential, Endpoint};
use rsload::transport::HttpTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "abcd1234wxyz";

const CONFIG: &str = r#"
test_name: integration
iterations: 2
log_output: true
target:
  api_server: https://placeholder.invalid
  execution_mode: parallel
query_sets:
  - name: mixed
    queries:
      - name: ten_rows
        sql: SELECT 'ten'
      - name: slow
        sql: SELECT 'slow'
      - name: empty
        sql: SELECT 'empty'
      - name: no_body
"#;

async fn mount_query(server: &MockServer, sql: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/orgs/self/queries"))
        .and(body_partial_json(json!({ "sql": { "query": sql } })))
        .respond_with(response)
        .mount(server)
        .await;
}

fn rows(n: usize) -> ResponseTemplate {
    let results: Vec<_> = (0..n).map(|i| json!({ "id": i })).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "stats": { "elapsed_time_ms": 0, "throttled_time_micros": 0 },
        "results": results,
    }))
}

#[tokio::test]
async fn test_iterative_run_writes_history_without_secret() {
    let server = MockServer::start().await;
    // Earlier queries answer later so completion order differs from input order.
    mount_query(&server, "SELECT 'ten'", rows(10).set_delay(Duration::from_millis(60))).await;
    mount_query(
        &server,
        "SELECT 'slow'",
        ResponseTemplate::new(408).set_delay(Duration::from_millis(30)),
    )
    .await;
    mount_query(&server, "SELECT 'empty'", rows(0)).await;

    let config: Config = serde_yaml::from_str(CONFIG).unwrap();
    let mut target = config.target(Credential::new(KEY)).unwrap();
    target.endpoint = Endpoint::insecure(server.address().to_string());

    let out = tempfile::tempdir().unwrap();
    let reporter = CsvReporter::new(out.path(), "details.csv", "summary.csv");

    let controller = RunController::new(
        target,
        config.query_sets().unwrap(),
        Dispatcher::new(QueryRunner::new(Arc::new(HttpTransport::new(Some(5)).unwrap()))),
        config.test_name.clone(),
    )
    .with_mode(config.run_mode().unwrap())
    .with_reporter(Box::new(reporter.clone()));

    let verdict = controller.run().await.unwrap();

    assert_eq!(verdict.cycles, 2);
    assert_eq!(verdict.unclean, 2);
    for summary in &verdict.summaries {
        assert_eq!(summary.warnings.len(), 3);
        assert_eq!(summary.warnings[0].message, "Query timed out");
        assert_eq!(summary.warnings[1].message, "Returned no rows");
        assert_eq!(summary.warnings[2].query_num, 4);
    }

    // Both iterations authenticate with the live key.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 6);
    for request in &requests {
        let auth = request.headers.get("authorization").unwrap().to_str().unwrap();
        assert_eq!(auth, "ApiKey abcd1234wxyz");
    }

    let details = std::fs::read_to_string(reporter.details_path()).unwrap();
    let lines: Vec<&str> = details.lines().collect();
    assert_eq!(lines.len(), 1 + 2 * 4);
    assert!(lines[1].contains(",ten_rows,1,success,"));
    assert!(lines[2].contains(",slow,2,timeout,"));
    assert!(lines[3].contains(",empty,3,success,"));
    assert!(lines[4].contains(",no_body,4,invalid,"));
    assert!(lines[5].contains(",mixed,2,ten_rows,1,success,"));

    let summary = std::fs::read_to_string(reporter.summary_path()).unwrap();
    assert_eq!(summary.lines().count(), 3);
    assert!(summary.lines().nth(1).unwrap().contains(",mixed,1,false,"));

    assert!(!details.contains("abcd1234"));
    assert!(!summary.contains("abcd1234"));
}

#[tokio::test]
async fn test_unreachable_target_aborts_run() {
    let config: Config = serde_yaml::from_str(CONFIG).unwrap();
    let mut target = config.target(Credential::new(KEY)).unwrap();
    target.endpoint = Endpoint::insecure("127.0.0.1:9");

    let err = RunController::new(
        target,
        config.query_sets().unwrap(),
        Dispatcher::new(QueryRunner::new(Arc::new(HttpTransport::new(Some(5)).unwrap()))),
        "unreachable",
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.category(), "Connection Error");
}
