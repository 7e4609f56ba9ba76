//! Mock transport for testing.
//!
//! Returns scripted responses chosen by substring match on the request path
//! or body, optionally after a delay, and records every request it receives.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{authorization_header, QueryTransport, TransportResponse};
use crate::error::{Result, RsloadError};
use crate::target::{Credential, Endpoint};

/// A scripted reply.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    body: String,
    delay: Duration,
    fault: Option<String>,
    panic: Option<String>,
}

impl MockResponse {
    /// A 200 query response with `rows` rows and the given statistics.
    pub fn rows_with_stats(rows: usize, elapsed_time_ms: u64, throttled_time_micros: u64) -> Self {
        let results: Vec<JsonValue> = (0..rows).map(|i| json!({ "_id": i })).collect();
        let body = json!({
            "stats": {
                "elapsed_time_ms": elapsed_time_ms,
                "throttled_time_micros": throttled_time_micros,
            },
            "results": results,
        });
        Self::status(200, body.to_string())
    }

    /// A 200 query response with `rows` rows and small statistics.
    pub fn rows(rows: usize) -> Self {
        Self::rows_with_stats(rows, 1, 0)
    }

    /// A response with an arbitrary status and body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            fault: None,
            panic: None,
        }
    }

    /// A transport fault: no response is produced.
    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            body: String::new(),
            delay: Duration::ZERO,
            fault: Some(message.into()),
            panic: None,
        }
    }

    /// Panics the calling task instead of replying.
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            panic: Some(message.into()),
            ..Self::status(0, "")
        }
    }

    /// Delays the reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub authorization: String,
    pub body: Option<JsonValue>,
}

/// A mock transport that returns predefined responses.
#[derive(Debug)]
pub struct MockTransport {
    routes: Vec<(String, MockResponse)>,
    fallback: MockResponse,
    requests: Mutex<Vec<RecordedRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Creates a mock that answers every request with one row.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: MockResponse::rows(1),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Adds a route. The first route whose pattern appears in the path or body wins.
    pub fn with_route(mut self, pattern: impl Into<String>, response: MockResponse) -> Self {
        self.routes.push((pattern.into(), response));
        self
    }

    /// Replaces the reply used when no route matches.
    pub fn with_fallback(mut self, response: MockResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Requests currently waiting for their reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn pick(&self, path: &str, body: Option<&JsonValue>) -> MockResponse {
        let body_text = body.map(|b| b.to_string()).unwrap_or_default();
        self.routes
            .iter()
            .find(|(pattern, _)| path.contains(pattern.as_str()) || body_text.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn respond(&self, request: RecordedRequest, path: &str) -> Result<TransportResponse> {
        let response = self.pick(path, request.body.as_ref());
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if let Some(message) = response.panic {
            panic!("{message}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response.fault {
            Some(message) => Err(RsloadError::connection(message)),
            None => Ok(TransportResponse::new(response.status, response.body)),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        path: &str,
        credential: &Credential,
        body: &JsonValue,
    ) -> Result<TransportResponse> {
        let request = RecordedRequest {
            method: "POST",
            url: endpoint.url_for(path),
            authorization: authorization_header(credential),
            body: Some(body.clone()),
        };
        self.respond(request, path).await
    }

    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        credential: &Credential,
    ) -> Result<TransportResponse> {
        let request = RecordedRequest {
            method: "GET",
            url: endpoint.url_for(path),
            authorization: authorization_header(credential),
            body: None,
        };
        self.respond(request, path).await
    }
}
