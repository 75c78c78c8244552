//! Outgoing email.

use std::path::PathBuf;
use std::sync::Arc;

use inkwell_common::{
    AppError, AppResult,
    config::{EmailBackend, EmailConfig},
};
use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

enum Transport {
    File {
        dir: PathBuf,
        transport: AsyncFileTransport<Tokio1Executor>,
    },
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
}

/// A plain-text message to a single recipient.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Sends mail through the configured transport.
#[derive(Clone)]
pub struct EmailService {
    transport: Arc<Transport>,
    from: Mailbox,
}

impl EmailService {
    /// Build the transport named by `config.backend`.
    pub fn from_config(config: &EmailConfig) -> AppResult<Self> {
        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid email.from_address: {e}")))?;

        let transport = match config.backend {
            EmailBackend::File => Transport::File {
                dir: config.file_path.clone(),
                transport: AsyncFileTransport::<Tokio1Executor>::new(&config.file_path),
            },
            EmailBackend::Smtp => {
                let host = config.smtp_host.as_deref().ok_or_else(|| {
                    AppError::Config("email.smtp_host is required for the smtp backend".to_string())
                })?;
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
                    .port(config.smtp_port);
                if let (Some(username), Some(password)) =
                    (&config.smtp_username, &config.smtp_password)
                {
                    builder = builder.credentials(Credentials::new(
                        username.clone(),
                        password.clone(),
                    ));
                }
                Transport::Smtp(builder.build())
            }
        };

        Ok(Self {
            transport: Arc::new(transport),
            from,
        })
    }

    /// Send one message.
    pub async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| AppError::Email(e.to_string()))?;

        match self.transport.as_ref() {
            Transport::File { dir, transport } => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| AppError::Email(format!("Failed to create mail spool: {e}")))?;
                let id = transport
                    .send(email)
                    .await
                    .map_err(|e| AppError::Email(e.to_string()))?;
                debug!(id = %id, dir = %dir.display(), "Wrote email to spool");
            }
            Transport::Smtp(transport) => {
                transport
                    .send(email)
                    .await
                    .map_err(|e| AppError::Email(e.to_string()))?;
            }
        }

        info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }

    /// Mail a password reset link.
    pub async fn send_password_reset(
        &self,
        to: &str,
        username: &str,
        link: &str,
    ) -> AppResult<()> {
        self.send(EmailMessage {
            to: to.to_string(),
            subject: "Password reset".to_string(),
            body: format!(
                "You're receiving this email because you requested a password\n\
                 reset for your user account.\n\n\
                 Please go to the following page and choose a new password:\n\n\
                 {link}\n\n\
                 Your username, in case you've forgotten: {username}\n"
            ),
        })
        .await
    }
}
