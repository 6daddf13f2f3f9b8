//! Outbound e-mail for scheduled report delivery.

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("message could not be built: {0}")]
    Build(String),

    #[error("smtp delivery failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from.to_string()).finish()
    }
}

impl SmtpMailer {
    /// Plain SMTP (optionally authenticated). TLS termination is left to the relay.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|_| MailError::Address(settings.from.clone()))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host.as_str()).port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(mail.subject.as_str());
        for to in &mail.to {
            let mailbox: Mailbox = to.parse().map_err(|_| MailError::Address(to.clone()))?;
            builder = builder.to(mailbox);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
        for a in &mail.attachments {
            let ct = ContentType::parse(&a.content_type).map_err(|e| MailError::Build(e.to_string()))?;
            body = body.singlepart(Attachment::new(a.filename.clone()).body(a.bytes.clone(), ct));
        }

        builder.multipart(body).map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = self.build_message(&mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(to = ?mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Keeps every message in memory. Used in tests and when no SMTP host is configured.
#[derive(Debug, Default)]
pub struct InMemoryMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if let Some(bad) = mail.to.iter().find(|t| t.parse::<Mailbox>().is_err()) {
            return Err(MailError::Address(bad.clone()));
        }
        debug!(to = ?mail.to, subject = %mail.subject, "mail captured in memory");
        self.outbox.lock().unwrap_or_else(|p| p.into_inner()).push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            to: vec![to.to_string()],
            subject: "Payroll report".into(),
            body: "Attached.".into(),
            attachments: vec![MailAttachment {
                filename: "payroll.csv".into(),
                content_type: "text/csv".into(),
                bytes: b"a,b\n".to_vec(),
            }],
        }
    }

    #[tokio::test]
    async fn in_memory_mailer_keeps_outbox() {
        let mailer = InMemoryMailer::new();
        mailer.send(mail("hr@acme.io")).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert!(matches!(mailer.send(mail("not an address")).await, Err(MailError::Address(_))));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn smtp_message_carries_attachment() {
        let mailer = SmtpMailer::new(&SmtpSettings {
            host: "localhost".into(),
            port: 2525,
            username: None,
            password: None,
            from: "Aura HRMS <noreply@aura.local>".into(),
        })
        .unwrap();
        let raw = String::from_utf8(mailer.build_message(&mail("hr@acme.io")).unwrap().formatted()).unwrap();
        assert!(raw.contains("Subject: Payroll report"));
        assert!(raw.contains("payroll.csv"));
    }
}
