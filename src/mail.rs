use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tracing::{info, instrument};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}

pub fn password_reset_mail(name: &str, email: &str, reset_url: &str) -> OutgoingMail {
    let first_name = name.split_whitespace().next().unwrap_or(name);
    let text = format!(
        "Hi {first_name},\n\nForgot your password? Submit your new password and passwordConfirm at:\n{reset_url}\n\n\
         The link is valid for 10 minutes.\nIf you didn't forget your password, please ignore this email!"
    );
    let html = format!(
        "<p>Hi {first_name},</p>\
         <p>Forgot your password? Set a new one here: <a href=\"{reset_url}\">{reset_url}</a></p>\
         <p>The link is valid for 10 minutes. If you didn't forget your password, please ignore this email!</p>"
    );
    OutgoingMail {
        to: email.to_string(),
        subject: "Your password reset token (valid for 10 min)".to_string(),
        text,
        html,
    }
}

/// SMTP delivery; the blocking send runs off the async workers.
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> anyhow::Result<SmtpTransport> {
        let transport = match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => SmtpTransport::relay(&self.config.host)?
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .port(self.config.port)
                .build(),
            // local catchers such as maildev speak plain SMTP
            _ => SmtpTransport::builder_dangerous(&self.config.host)
                .port(self.config.port)
                .build(),
        };
        Ok(transport)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, mail), fields(to = %mail.to))]
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.config.sender.parse()?)
            .to(mail.to.parse()?)
            .subject(mail.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html),
                    ),
            )?;

        let transport = self.transport()?;
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        info!("mail sent");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use super::*;

    /// Keeps every message instead of sending it; can be told to fail.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutgoingMail>>,
        failing: AtomicBool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            let mailer = Self::default();
            mailer.failing.store(true, Ordering::SeqCst);
            mailer
        }

        pub fn sent(&self) -> Vec<OutgoingMail> {
            self.sent.lock().expect("mailer lock").clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("smtp connection refused");
            }
            self.sent.lock().expect("mailer lock").push(mail);
            Ok(())
        }
    }
}
