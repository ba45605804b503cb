//! Email Channel — SMTP sending via async lettre.
//!
//! STARTTLS on the configured port (587 by default), authenticated with the
//! sender's credentials. Success means the relay accepted the message; there
//! is no delivery confirmation beyond that.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use tuitionbell_core::config::EmailConfig;
use tuitionbell_core::{EmailTransport, OutgoingEmail, Result, TuitionError};

/// SMTP email transport.
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// `true` when host and credentials are all set.
    pub fn is_configured(&self) -> bool {
        !self.config.smtp_host.is_empty()
            && !self.config.username.is_empty()
            && !self.config.password.is_empty()
    }

    fn from_mailbox(&self) -> Result<Mailbox> {
        let address = self.config.sender_address();
        let raw = match &self.config.display_name {
            Some(name) if !name.is_empty() => format!("{name} <{address}>"),
            _ => address.to_string(),
        };
        raw.parse()
            .map_err(|e| TuitionError::Transport(format!("Invalid from '{raw}': {e}")))
    }

    /// Build the MIME message for `email`.
    pub fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| TuitionError::Transport(format!("Invalid to '{}': {e}", email.to)))?;

        Message::builder()
            .from(self.from_mailbox()?)
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| TuitionError::Transport(format!("Build email: {e}")))
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if !self.is_configured() {
            return Err(TuitionError::Transport(
                "SMTP not configured (EMAIL_SERVER / EMAIL_FROM / EMAIL_PASSWORD)".into(),
            ));
        }

        let message = self.build_message(email)?;
        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(|e| TuitionError::Transport(format!("SMTP relay: {e}")))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| TuitionError::Transport(format!("SMTP send: {e}")))?;

        tracing::debug!("📤 Email sent to: {}", email.to);
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
