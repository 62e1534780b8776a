//! Outbound collaborators used by side-effect blocks.
//!
//! ```text
//! HttpClient        - httpRequest       (ReqwestHttpClient)
//! CompletionClient  - aiCompletion      (OpenAiCompletionClient)
//! Mailer            - sendEmail         (ResendMailer)
//! EntityStorage     - *Record blocks    (flowline-store)
//! ```
//!
//! Each production implementation owns its own timeout; the engine never
//! retries a failed call.

mod ai;
mod http;
mod mail;
pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use ai::OpenAiCompletionClient;
pub use http::ReqwestHttpClient;
pub use mail::ResendMailer;
pub use mock::{MockCompletionClient, MockHttpClient, MockMailer};

/// Errors returned by outbound collaborators.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Transport-level HTTP failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The remote service returned an error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported email provider: {0}")]
    UnsupportedProvider(String),
}

pub type Result<T> = std::result::Result<T, CollaboratorError>;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    /// Parsed JSON when the body is JSON, otherwise the raw text as a string.
    pub body: Value,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

// ─────────────────────────────────────────────────────────────────────────────
// AI completion
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub api_key: String,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text for a single prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Email
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub provider: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub api_key: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Returns whether the provider accepted the message.
    async fn send(&self, message: EmailMessage) -> Result<bool>;
}
