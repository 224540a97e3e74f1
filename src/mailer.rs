use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Outbound email. One-shot send, no retries; a failed dispatch aborts the
/// calling operation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay config")?
            .port(cfg.port)
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        let from: Mailbox = cfg.from.parse().context("parse SMTP_FROM")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("parse recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .context("build email")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

/// HTML body for the password-reset email. The link carries the reset token
/// and expires with it.
pub fn reset_email_html(username: &str, link: &str) -> String {
    format!(
        "<p>Hi {username},</p>\
         <p>We received a request to reset your password. Click the link below \
         to choose a new one. The link expires in 10 minutes.</p>\
         <p><a href=\"{link}\">Reset your password</a></p>\
         <p>If you did not request this, you can ignore this email.</p>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_embeds_link_and_name() {
        let html = reset_email_html(
            "ann",
            "http://localhost:5173/reset-password?token=abc.def.ghi",
        );
        assert!(html.contains("Hi ann"));
        assert!(html.contains("href=\"http://localhost:5173/reset-password?token=abc.def.ghi\""));
    }
}
