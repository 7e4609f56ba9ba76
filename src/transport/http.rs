//! HTTP transport backed by reqwest.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::trace;

use super::{authorization_header, QueryTransport, TransportResponse};
use crate::error::{Result, RsloadError};
use crate::target::{Credential, Endpoint};

/// Query API transport over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport. `timeout_secs` of `None` leaves the client without a request timeout.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RsloadError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn send(request: RequestBuilder) -> Result<TransportResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| RsloadError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RsloadError::connection(format!("Failed to read response: {e}")))?;

        trace!(status = status.as_u16(), bytes = body.len(), "response received");

        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        path: &str,
        credential: &Credential,
        body: &JsonValue,
    ) -> Result<TransportResponse> {
        let request = self
            .client
            .post(endpoint.url_for(path))
            .header(AUTHORIZATION, authorization_header(credential))
            .header(CONTENT_TYPE, "application/json")
            .json(body);

        Self::send(request).await
    }

    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        credential: &Credential,
    ) -> Result<TransportResponse> {
        let request = self
            .client
            .get(endpoint.url_for(path))
            .header(AUTHORIZATION, authorization_header(credential));

        Self::send(request).await
    }
}
