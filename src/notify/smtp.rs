//! SMTP delivery via `lettre`.
//!
//! Configuration is loaded from environment variables; if `SMTP_HOST` is
//! not set, [`EmailConfig::from_env`] returns `None` and the service falls
//! back to [`super::LogEmailSender`].

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{EmailError, EmailMessage, EmailSender};
use crate::config::parse_env;

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "ShiftFlex <noreply@shiftflex.local>";

/// Default per-message timeout in milliseconds.
const DEFAULT_EMAIL_TIMEOUT_MS: u64 = 5_000;

/// Configuration for the SMTP email sender.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Per-message send timeout in milliseconds.
    pub timeout_ms: u64,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable           | Required | Default                               |
    /// |--------------------|----------|---------------------------------------|
    /// | `SMTP_HOST`        | yes      | -                                     |
    /// | `SMTP_PORT`        | no       | `587`                                 |
    /// | `SMTP_FROM`        | no       | `ShiftFlex <noreply@shiftflex.local>` |
    /// | `SMTP_USER`        | no       | -                                     |
    /// | `SMTP_PASSWORD`    | no       | -                                     |
    /// | `EMAIL_TIMEOUT_MS` | no       | `5000`                                |
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            timeout_ms: parse_env("EMAIL_TIMEOUT_MS", DEFAULT_EMAIL_TIMEOUT_MS),
        })
    }
}

/// Sends HTML notification emails through an SMTP relay.
#[derive(Debug)]
pub struct SmtpEmailSender {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailSender {
    /// Builds the sender and its connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::Transport`] if the relay host is invalid.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .timeout(Some(std::time::Duration::from_millis(config.timeout_ms)));

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    fn build(&self, message: &EmailMessage) -> Result<Message, EmailError> {
        Message::builder()
            .from(self.config.from_address.parse()?)
            .to(message.to.parse()?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| EmailError::Build(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = self.build(message)?;
        self.transport.send(email).await?;
        tracing::info!(to = %message.to, subject = %message.subject, "notification email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            smtp_user: None,
            smtp_password: None,
            timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn builds_html_message() {
        let Ok(sender) = SmtpEmailSender::new(config()) else {
            panic!("valid relay config");
        };
        let message = EmailMessage {
            to: "worker@example.com".to_string(),
            subject: "Swap accepted".to_string(),
            html: "<p>hello</p>".to_string(),
        };
        assert!(sender.build(&message).is_ok());
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let Ok(sender) = SmtpEmailSender::new(config()) else {
            panic!("valid relay config");
        };
        let message = EmailMessage {
            to: "not an address".to_string(),
            subject: "x".to_string(),
            html: String::new(),
        };
        assert!(matches!(sender.build(&message), Err(EmailError::Address(_))));
    }
}
