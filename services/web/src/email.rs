//! Transactional email
//!
//! Bodies are rendered from the `email/` templates (an HTML part and a plain
//! text part) and handed to a [`Mailer`]. Production relays through SMTP;
//! development keeps messages in memory and logs them.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use tera::Tera;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{AppConfig, MailTransport};
use crate::models::UserRow;
use crate::password::RESET_TOKEN_TTL_MINUTES;

/// A rendered message
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivers rendered messages
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, email: &Email) -> Result<()>;
}

/// SMTP relay with STARTTLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.email_host)
            .with_context(|| format!("Invalid SMTP host: {}", config.email_host))?
            .port(config.email_port)
            .credentials(Credentials::new(
                config.email_username.clone(),
                config.email_password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: sender(&config.email_from)?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &Email) -> Result<()> {
        let to: Mailbox = email
            .to
            .parse()
            .with_context(|| format!("Invalid recipient: {}", email.to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))?;

        self.transport.send(message).await?;
        info!("Sent \"{}\" to {}", email.subject, email.to);
        Ok(())
    }
}

/// Most recent messages a [`LogMailer`] keeps
pub const OUTBOX_CAPACITY: usize = 50;

/// Logs every message and keeps the most recent ones in memory
#[derive(Clone, Default)]
pub struct LogMailer {
    outbox: Arc<Mutex<VecDeque<Email>>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages still held, oldest first
    pub async fn sent(&self) -> Vec<Email> {
        self.outbox.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, email: &Email) -> Result<()> {
        info!(
            "Email to {} (\"{}\"):\n{}",
            email.to, email.subject, email.text
        );
        let mut outbox = self.outbox.lock().await;
        if outbox.len() == OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(email.clone());
        Ok(())
    }
}

/// `Natours <address>`
fn sender(address: &str) -> Result<Mailbox> {
    format!("Natours <{}>", address)
        .parse()
        .with_context(|| format!("Invalid EMAIL_FROM: {}", address))
}

/// Build the mailer selected by `EMAIL_TRANSPORT`
pub fn mailer_from_config(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    Ok(match config.email_transport {
        MailTransport::Smtp => Arc::new(SmtpMailer::new(config)?),
        MailTransport::Log => Arc::new(LogMailer::new()),
    })
}

/// Renders and sends the application's emails
#[derive(Clone)]
pub struct EmailComposer {
    templates: Arc<Tera>,
    mailer: Arc<dyn Mailer>,
}

impl EmailComposer {
    pub fn new(templates: Arc<Tera>, mailer: Arc<dyn Mailer>) -> Self {
        Self { templates, mailer }
    }

    /// Render `email/<template>.html` and `email/<template>.txt`
    fn render(&self, template: &str, user: &UserRow, url: &str, subject: &str) -> Result<Email> {
        let mut context = tera::Context::new();
        context.insert("first_name", user.first_name());
        context.insert("url", url);
        context.insert("subject", subject);
        context.insert("ttl_minutes", &RESET_TOKEN_TTL_MINUTES);

        Ok(Email {
            to: user.email.clone(),
            subject: subject.to_string(),
            html: self
                .templates
                .render(&format!("email/{template}.html"), &context)?,
            text: self
                .templates
                .render(&format!("email/{template}.txt"), &context)?,
        })
    }

    pub async fn send_welcome(&self, user: &UserRow, url: &str) -> Result<()> {
        let email = self.render("welcome", user, url, "Welcome to the natours group!")?;
        self.mailer.deliver(&email).await
    }

    pub async fn send_password_reset(&self, user: &UserRow, url: &str) -> Result<()> {
        let email = self.render(
            "password_reset",
            user,
            url,
            "Your password reset token (valid for only 10 minutes)",
        )?;
        self.mailer.deliver(&email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;
    use tokio_test::{assert_ok, block_on};
    use uuid::Uuid;

    fn templates() -> Arc<Tera> {
        Arc::new(
            Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
                .expect("templates parse"),
        )
    }

    fn user() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "Laura Wilson".to_string(),
            email: "laura@example.com".to_string(),
            photo: "default.jpg".to_string(),
            role: Role::User,
            password_hash: String::new(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            version: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_welcome_email_greets_by_first_name() {
        let outbox = LogMailer::new();
        let composer = EmailComposer::new(templates(), Arc::new(outbox.clone()));

        composer
            .send_welcome(&user(), "http://localhost:3000/me")
            .await
            .unwrap();

        let sent = outbox.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "laura@example.com");
        assert_eq!(sent[0].subject, "Welcome to the natours group!");
        assert!(sent[0].html.contains("Laura"));
        assert!(!sent[0].text.contains("Wilson"));
        assert!(sent[0].text.contains("http://localhost:3000/me"));
    }

    #[tokio::test]
    async fn test_password_reset_email_carries_link() {
        let outbox = LogMailer::new();
        let composer = EmailComposer::new(templates(), Arc::new(outbox.clone()));
        let url = "http://localhost:3000/api/v1/users/resetPassword/abc123";

        composer.send_password_reset(&user(), url).await.unwrap();

        let sent = outbox.sent().await;
        assert!(sent[0].subject.contains("10 minutes"));
        assert!(sent[0].html.contains("abc123"));
        assert!(sent[0].text.contains(url));
    }

    #[test]
    fn test_log_mailer_keeps_only_recent_messages() {
        let mailer = LogMailer::new();
        let total = OUTBOX_CAPACITY + 5;

        for i in 0..total {
            let email = Email {
                to: format!("user{}@example.com", i),
                subject: "Hello".to_string(),
                html: String::new(),
                text: String::new(),
            };
            assert_ok!(block_on(mailer.deliver(&email)));
        }

        let sent = block_on(mailer.sent());
        assert_eq!(sent.len(), OUTBOX_CAPACITY);
        assert_eq!(sent[0].to, "user5@example.com");
        assert_eq!(sent[OUTBOX_CAPACITY - 1].to, format!("user{}@example.com", total - 1));
    }

    #[test]
    fn test_sender_uses_brand_name() {
        let mailbox = sender("hello@natours.io").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Natours"));
        assert_eq!(mailbox.email.to_string(), "hello@natours.io");
    }
}
