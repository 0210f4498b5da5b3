//! Executes `HttpRequest` values against the network.
//!
//! `Transport` is the only place that performs I/O. `ReqwestTransport` is the
//! production implementation; tests substitute scripted transports.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// The request could not be completed (DNS, connect, read, ...).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Non-2xx responses are data, not errors; only a missing response fails.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self.client.request(method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| Some((key.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response.text().await.map_err(|e| TransportError(e.to_string()))?;

        debug!(status, "received response");
        Ok(HttpResponse { status, headers, body })
    }
}
