//! Outbound mail. Only the confirmation-code message is sent today.
//!
//! Backends:
//! - `log`: writes the message to the tracing output (default, development)
//! - `memory`: keeps an outbox in memory, used by tests
//! - `smtp`: delivers through an SMTP relay

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::errors::AppError;

const DEFAULT_FROM: &str = "noreply@yamdb.local";
const CONFIRMATION_SUBJECT: &str = "Confirmation code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn confirmation_code(from: &str, to: &str, code: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            body: format!("Your confirmation code: {code}"),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sender address used for outgoing messages.
    fn from_address(&self) -> &str;

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn from_address(&self) -> &str {
        &self.from
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        tracing::info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "mail (log backend)"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryMailer {
    from: String,
    outbox: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl Default for MemoryMailer {
    fn default() -> Self {
        Self::with_from(DEFAULT_FROM)
    }
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_from(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            outbox: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().map(|outbox| outbox.clone()).unwrap_or_default()
    }

    /// Most recent message addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    fn from_address(&self) -> &str {
        &self.from
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        self.outbox
            .lock()
            .map_err(|_| AppError::mail("outbox lock poisoned"))?
            .push(mail);
        Ok(())
    }
}

pub struct SmtpMailer {
    from: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(from: impl Into<String>, host: &str, port: u16, credentials: Option<(String, String)>) -> Self {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Self {
            from: from.into(),
            transport: builder.build(),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn from_address(&self) -> &str {
        &self.from
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|err| AppError::mail(format!("invalid sender address: {err}")))?;
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|err| AppError::mail(format!("invalid recipient address: {err}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject)
            .body(mail.body)
            .map_err(|err| AppError::mail(err.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| AppError::mail(err.to_string()))?;

        Ok(())
    }
}

/// Picks the backend named by `EMAIL_BACKEND`.
pub fn from_env() -> Result<Arc<dyn Mailer>, AppError> {
    let from = std::env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_FROM.to_string());
    let backend = std::env::var("EMAIL_BACKEND").unwrap_or_default().to_lowercase();

    match backend.as_str() {
        "" | "log" => Ok(Arc::new(LogMailer::new(from))),
        "memory" => Ok(Arc::new(MemoryMailer::with_from(from))),
        "smtp" => {
            let host = std::env::var("SMTP_HOST").map_err(|_| AppError::configuration("SMTP_HOST not set"))?;
            let port = std::env::var("SMTP_PORT")
                .map(|val| val.parse::<u16>())
                .unwrap_or(Ok(25))
                .map_err(|_| AppError::configuration("SMTP_PORT must be a valid port"))?;
            let credentials = match (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD")) {
                (Ok(username), Ok(password)) => Some((username, password)),
                _ => None,
            };
            Ok(Arc::new(SmtpMailer::new(from, &host, port, credentials)))
        }
        other => Err(AppError::configuration(format!("unknown EMAIL_BACKEND: {other}"))),
    }
}
