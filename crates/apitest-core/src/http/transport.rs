//! HTTP transport.

use async_trait::async_trait;
use reqwest::Method;
use std::borrow::Cow;
use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::model::{Headers, HttpMethod};

/// A fully built request ready to send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    /// Absolute URL including query string.
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// A received response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Time from sending the request until the body was read.
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Headers, body: impl Into<Vec<u8>>, elapsed: Duration) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            elapsed,
        }
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Sends requests on behalf of the orchestrator.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with its own client.
    pub fn new(follow_redirects: bool, user_agent: &str) -> Result<Self, TransportError> {
        let redirect = if follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .redirect(redirect)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Create a transport with a custom client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<HttpResponse, TransportError> {
        let start = Instant::now();
        let timeout = request.timeout;

        let method: Method = request.method.into();
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(timeout);

        for (key, value) in request.headers.iter() {
            builder = builder.header(key, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::from(e)
            }
        };

        let response = builder.send().await.map_err(map_err)?;

        let status = response.status().as_u16();
        // Repeated headers such as Set-Cookie keep every value.
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let body = response.bytes().await.map_err(map_err)?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
            elapsed: start.elapsed(),
        })
    }
}
