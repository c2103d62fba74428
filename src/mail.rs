//! Outbound email. Messages are handed to a relay over NATS; without a NATS
//! connection they are only logged.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{Result, StorefrontError};

pub const MAIL_SUBJECT: &str = "storefront.mail.outbound";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Standard base64.
    pub content: String,
}

impl Attachment {
    pub fn pdf(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self { filename: filename.into(), content_type: "application/pdf".to_string(), content: STANDARD.encode(bytes) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<()>;
}

pub struct NatsMailer {
    client: async_nats::Client,
}

impl NatsMailer {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl Mailer for NatsMailer {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        let payload = serde_json::to_vec(&email).map_err(|e| StorefrontError::Mail(e.to_string()))?;
        self.client
            .publish(MAIL_SUBJECT.to_string(), payload.into())
            .await
            .map_err(|e| StorefrontError::Mail(e.to_string()))?;
        tracing::info!(to = %email.to, subject = %email.subject, attachments = email.attachments.len(), "email queued");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, attachments = email.attachments.len(), "mail relay not configured, email logged only");
        Ok(())
    }
}

/// Keeps sent mail in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<OutboundEmail> { self.sent.lock().await.clone() }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}
