//! Outgoing invitation mail.
//!
//! Delivery goes through the [`Mailer`] trait so that a failed send can be
//! caught per recipient. SMTP is used when `SMTP_HOST` is configured;
//! otherwise messages are only logged.

mod smtp;
pub mod templates;

pub use smtp::SmtpMailer;
pub use templates::{EmailContext, InvitationEmailContent};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invitation has no recipient")]
    NoRecipient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub from: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// Writes each message to the log instead of delivering it.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            from = %email.from,
            subject = %email.subject,
            "SMTP not configured, invitation email logged only"
        );
        tracing::debug!(body = %email.text, "Invitation email body");
        Ok(())
    }
}

pub fn create_mailer(config: Option<&SmtpConfig>) -> Result<Arc<dyn Mailer>, EmailError> {
    match config {
        Some(smtp) => {
            let mailer = SmtpMailer::new(
                smtp.host.clone(),
                smtp.port,
                smtp.username.clone(),
                smtp.password.clone(),
                smtp.use_tls,
            )?;
            Ok(Arc::new(mailer))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}
