//! HTTP client implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use super::request::Request;
use super::response::Response;
use crate::app::ScanConfig;

/// Headers recomputed by the client rather than replayed from a capture
const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "accept-encoding",
    "transfer-encoding",
];

/// Performs one request/response round trip
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response>;
}

/// HTTP client wrapper
pub struct HttpClient {
    /// Inner reqwest client
    client: reqwest::Client,

    /// Response bodies are cut at this many bytes
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_response_size: config.max_response_size,
        })
    }

    /// Execute a request
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        let start = Instant::now();

        let method = reqwest::Method::from_str(&request.method).context("Invalid HTTP method")?;
        let mut builder = self.client.request(method, &request.url);

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            if SKIPPED_HEADERS.iter().any(|h| key.eq_ignore_ascii_case(h)) {
                continue;
            }
            if let (Ok(name), Ok(val)) = (HeaderName::from_str(key), HeaderValue::from_str(value)) {
                headers.append(name, val);
            }
        }
        builder = builder.headers(headers);

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.context("Request failed")?;
        self.build_response(response, start).await
    }

    /// Build response from reqwest response
    async fn build_response(&self, response: reqwest::Response, start: Instant) -> Result<Response> {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_string(), v.to_string());
            }
        }

        let body = response.bytes().await.context("Failed to read response body")?;
        let truncated = body.len() > self.max_response_size;
        if truncated {
            tracing::warn!(size = body.len(), limit = self.max_response_size, "Response body truncated");
        }
        let body = body[..body.len().min(self.max_response_size)].to_vec();

        Ok(Response {
            status,
            headers,
            body,
            duration_ms: start.elapsed().as_millis() as u64,
            truncated,
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: &Request) -> Result<Response> {
        self.execute(request).await
    }
}
