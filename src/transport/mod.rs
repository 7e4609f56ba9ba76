//! Transport layer for rsload.
//!
//! Provides a trait-based interface for talking to the query API, allowing
//! the real HTTP client and a scripted mock to be used interchangeably.

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockResponse, MockTransport, RecordedRequest};

use crate::error::Result;
use crate::target::{Credential, Endpoint};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Value of the `Authorization` header for a credential.
pub fn authorization_header(credential: &Credential) -> String {
    format!("ApiKey {}", credential.expose())
}

/// A response that reached the client, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Canonical reason phrase for the status (e.g. "Bad Request").
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason_phrase(status),
            body: body.into(),
        }
    }
}

/// Canonical reason phrase for a status code, empty when unknown.
pub fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
        .to_string()
}

/// Trait defining the interface for query API transports.
///
/// Implementations return `Err` only for faults that prevented a response
/// from being received; any HTTP status is returned as a [`TransportResponse`].
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Sends a JSON POST with `ApiKey` authorization.
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        path: &str,
        credential: &Credential,
        body: &JsonValue,
    ) -> Result<TransportResponse>;

    /// Sends a GET with `ApiKey` authorization.
    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        credential: &Credential,
    ) -> Result<TransportResponse>;
}
