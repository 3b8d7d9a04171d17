//! Executes the core's `HttpRequest` values over the network.

use std::time::Duration;

use reqwest::{Client, Method};
use todo_core::{HttpMethod, HttpRequest, HttpResponse, Outcome, TransportError};

/// Requests that take longer than this count as a connection failure.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cheap to clone: clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
}

impl Executor {
    pub fn new() -> reqwest::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Send `request` and hand back whatever the server answered. Only a
    /// failure to get any answer at all is an `Err`; 4xx and 5xx responses are
    /// returned as data for the core to interpret.
    pub async fn execute(&self, request: &HttpRequest) -> Outcome {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.path);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, url = %request.path, error = %e, "request failed");
            TransportError(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        tracing::debug!(method = %request.method, url = %request.path, status, "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
