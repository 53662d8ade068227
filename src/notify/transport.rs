//! Mail submission seam.
//!
//! The dispatcher only needs a single capability: deliver one message.
//! Production uses SMTP against the local mail-submission endpoint;
//! tests swap in a mock without a network endpoint.

use std::sync::RwLock;

use crate::errors::{RecoveryError, RecoveryResult};

/// Addressing for one outbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEnvelope {
    /// Sender mailbox, e.g. `root@host`.
    pub from: String,
    /// Recipient mailbox, derived from the artifact's on-disk owner.
    pub to: String,
    /// Subject line naming the recovered document.
    pub subject: String,
}

/// Mail transport trait for abstraction
pub trait MailTransport: Send + Sync {
    /// Submit one message.
    fn send(&self, envelope: &MailEnvelope, body: &str) -> RecoveryResult<()>;
}

/// SMTP transport against the local mail-submission endpoint.
#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    /// SMTP server host
    pub host: String,
    /// SMTP server port
    pub port: u16,
}

impl SmtpMailTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for SmtpMailTransport {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
        }
    }
}

impl MailTransport for SmtpMailTransport {
    fn send(&self, envelope: &MailEnvelope, body: &str) -> RecoveryResult<()> {
        use lettre::{message::header::ContentType, Message, SmtpTransport, Transport};

        let email = Message::builder()
            .from(
                envelope
                    .from
                    .parse()
                    .map_err(|e| RecoveryError::NotificationSendFailed(format!(
                        "invalid from address: {}",
                        e
                    )))?,
            )
            .to(envelope
                .to
                .parse()
                .map_err(|e| RecoveryError::NotificationSendFailed(format!(
                    "invalid to address: {}",
                    e
                )))?)
            .subject(envelope.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| {
                RecoveryError::NotificationSendFailed(format!("failed to build email: {}", e))
            })?;

        // Local submission endpoint, no authentication.
        let mailer = SmtpTransport::builder_dangerous(&self.host)
            .port(self.port)
            .build();

        mailer
            .send(&email)
            .map_err(|e| RecoveryError::NotificationSendFailed(e.to_string()))?;

        Ok(())
    }
}

/// Mock mail transport for testing
#[derive(Debug, Default)]
pub struct MockMailTransport {
    /// Sent messages (for testing)
    pub sent: RwLock<Vec<(MailEnvelope, String)>>,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of sent messages
    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Clear sent messages
    pub fn clear(&self) {
        self.sent.write().unwrap().clear();
    }
}

impl MailTransport for MockMailTransport {
    fn send(&self, envelope: &MailEnvelope, body: &str) -> RecoveryResult<()> {
        self.sent
            .write()
            .unwrap()
            .push((envelope.clone(), body.to_string()));
        Ok(())
    }
}
