use std::time::Duration;

use async_trait::async_trait;
use flowline_config::HttpSection;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use super::{CollaboratorError, HttpClient, HttpRequest, HttpResponse, Result};

/// `HttpClient` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &HttpSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                CollaboratorError::InvalidRequest(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| {
                CollaboratorError::InvalidRequest(format!("invalid method '{}'", request.method))
            })?;

        debug!(method = %method, url = %request.url, "Sending HTTP request");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = match request.body {
            None | Some(Value::Null) => builder,
            Some(Value::String(text)) => builder.body(text),
            Some(json) => builder.json(&json),
        };

        let response = builder.send().await?;
        let status_code = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(HttpResponse { status_code, body })
    }
}
