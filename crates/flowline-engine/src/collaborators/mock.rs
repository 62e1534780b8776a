//! Scripted collaborators for tests. Each one records the requests it sees.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    CollaboratorError, CompletionClient, CompletionRequest, EmailMessage, HttpClient,
    HttpRequest, HttpResponse, Mailer, Result,
};

/// Answers every request with the same response, or the same failure.
#[derive(Debug)]
pub struct MockHttpClient {
    response: std::result::Result<HttpResponse, String>,
    request_log: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn with_json(status_code: u16, body: Value) -> Self {
        Self {
            response: Ok(HttpResponse { status_code, body }),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Every request fails at the transport level.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            request_log: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.request_log.lock().clone()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::with_json(200, Value::Object(Default::default()))
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.request_log.lock().push(request);
        self.response
            .clone()
            .map_err(CollaboratorError::Backend)
    }
}

#[derive(Debug)]
pub struct MockCompletionClient {
    response: std::result::Result<String, String>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            request_log: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            request_log: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::with_text("mock completion")
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.request_log.lock().push(request);
        self.response.clone().map_err(CollaboratorError::Backend)
    }
}

#[derive(Debug)]
pub struct MockMailer {
    accept: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockMailer {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::accepting()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: EmailMessage) -> Result<bool> {
        self.sent.lock().push(message);
        Ok(self.accept)
    }
}
