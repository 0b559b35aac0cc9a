//! Digest dispatch through a transactional-email provider.

use crate::core::config::NewsletterConfig;
use crate::core::error::HandoverError;
use crate::plugins::newsletter::HistoryRecord;
use crate::plugins::newsletter::digest::DigestPayload;
use crate::plugins::newsletter::render;
use crate::plugins::newsletter::source::DigestSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub sender: SenderIdentity,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// The outbound email collaborator. Errors come back unchanged to the caller.
pub trait EmailTransport {
    fn send_email(&self, email: &OutboundEmail) -> Result<SendReceipt, HandoverError>;
}

/// Brevo (`/v3/smtp/email`) over a blocking HTTP client.
pub struct BrevoTransport {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct BrevoAddress<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoRequest<'a> {
    sender: BrevoAddress<'a>,
    to: Vec<BrevoAddress<'a>>,
    subject: &'a str,
    #[serde(rename = "htmlContent")]
    html_content: &'a str,
}

#[derive(Deserialize)]
struct BrevoResponse {
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

impl BrevoTransport {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, HandoverError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &NewsletterConfig) -> Result<Self, HandoverError> {
        let (_, api_key) = config.credentials()?;
        Self::new(
            &config.api_url,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

impl EmailTransport for BrevoTransport {
    fn send_email(&self, email: &OutboundEmail) -> Result<SendReceipt, HandoverError> {
        let request = BrevoRequest {
            sender: BrevoAddress {
                name: Some(&email.sender.name),
                email: &email.sender.email,
            },
            to: vec![BrevoAddress {
                name: None,
                email: &email.to,
            }],
            subject: &email.subject,
            html_content: &email.html_body,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(HandoverError::ProviderError {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: BrevoResponse = response.json()?;
        Ok(SendReceipt {
            message_id: parsed.message_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
}

/// Renders a payload, dispatches it with a fixed sender identity and records
/// one history row per project once the provider has accepted the message.
pub struct DigestSender<T> {
    transport: T,
    identity: SenderIdentity,
}

impl<T: EmailTransport> DigestSender<T> {
    pub fn new(transport: T, identity: SenderIdentity) -> Self {
        Self { transport, identity }
    }

    pub fn identity(&self) -> &SenderIdentity {
        &self.identity
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn compose(&self, payload: &DigestPayload) -> OutboundEmail {
        OutboundEmail {
            sender: self.identity.clone(),
            to: payload.recipient.clone(),
            subject: render::render_subject(payload),
            html_body: render::render_body(payload),
        }
    }

    pub fn send<S>(&self, source: &S, payload: &DigestPayload) -> Result<SendResult, HandoverError>
    where
        S: DigestSource + ?Sized,
    {
        let email = self.compose(payload);
        let receipt = self.transport.send_email(&email)?;
        info!(
            recipient = %payload.recipient,
            message_id = receipt.message_id.as_deref().unwrap_or("-"),
            projects = payload.projects.len(),
            "digest dispatched"
        );

        let serialized = serde_json::to_string(payload)?;
        let window = payload.window();
        let records: Vec<HistoryRecord> = payload
            .projects
            .iter()
            .map(|p| HistoryRecord {
                project_id: p.project.id,
                recipient: payload.recipient.clone(),
                subject: email.subject.clone(),
                week_start: window.start_date(),
                week_end: window.end_date(),
                payload: serialized.clone(),
                message_id: receipt.message_id.clone(),
            })
            .collect();
        let written = source.append_newsletter_history(&records)?;
        debug!(recipient = %payload.recipient, rows = written, "newsletter history recorded");

        Ok(SendResult {
            success: true,
            message_id: receipt.message_id,
        })
    }
}

impl DigestSender<BrevoTransport> {
    /// Production sender. Fails before any network use when credentials are missing.
    pub fn from_config(config: &NewsletterConfig) -> Result<Self, HandoverError> {
        let (sender_email, _) = config.credentials()?;
        Ok(Self::new(
            BrevoTransport::from_config(config)?,
            SenderIdentity {
                name: config.sender_name.clone(),
                email: sender_email.to_string(),
            },
        ))
    }
}
