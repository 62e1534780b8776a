use std::time::Duration;

use async_trait::async_trait;
use flowline_config::MailSection;
use reqwest::{Client, header};
use serde_json::json;
use tracing::{debug, warn};

use super::{CollaboratorError, EmailMessage, Mailer, Result};

/// Provider name handled by [`ResendMailer`].
pub const RESEND: &str = "resend";

/// `Mailer` for the Resend email API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: Client,
    base_url: String,
}

impl ResendMailer {
    pub fn new(config: &MailSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CollaboratorError::InvalidRequest(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: EmailMessage) -> Result<bool> {
        if !message.provider.eq_ignore_ascii_case(RESEND) {
            return Err(CollaboratorError::UnsupportedProvider(message.provider));
        }

        debug!(to = ?message.to, subject = %message.subject, "Sending email");

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", message.api_key))
            .json(&json!({
                "from": message.from,
                "to": message.to,
                "subject": message.subject,
                "html": message.body,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Email provider rejected message");
            return Ok(false);
        }
        Ok(true)
    }
}
