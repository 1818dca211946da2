//! Email notifications for match transitions.
//!
//! The lifecycle never sends mail itself. It publishes
//! [`crate::domain::MatchEvent`]s, and the [`Notifier`] task turns accepted
//! and completed matches into emails through an [`EmailSender`]. Delivery
//! failures are logged and dropped; they can never fail a transition.

pub mod notifier;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;

pub use notifier::Notifier;
pub use smtp::{EmailConfig, SmtpEmailSender};

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("email build error: {0}")]
    Build(String),

    /// The provider did not answer in time.
    #[error("email provider timed out")]
    Timeout,
}

/// An outgoing HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// Transactional email provider.
#[async_trait]
pub trait EmailSender: Send + Sync + std::fmt::Debug {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] if the message cannot be built or the
    /// provider refuses it.
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Sender used when no SMTP relay is configured: logs instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "email delivery disabled; logged only");
        Ok(())
    }
}
