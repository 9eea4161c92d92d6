use anyhow::Result;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::config::{SmtpConfig, SmtpSecurity};

/// Outgoing mail, one fully rendered plain-text email.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn verification(to: &str, username: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "ErrandBuddy Email Verification".to_string(),
            body: format!(
                "Hi {},\n\nYour verification code is: {}\n\nThis code expires in {} minutes. \
                 If you did not request this, you can ignore this email.\n",
                username, code, ttl_minutes
            ),
        }
    }

    pub fn resent_verification(to: &str, username: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "ErrandBuddy Email Verification (Resent)".to_string(),
            body: format!(
                "Hi {},\n\nYour verification code is: {}\n\nThis code expires in {} minutes.",
                username, code, ttl_minutes
            ),
        }
    }
}

/// Best-effort mail delivery.
///
/// With SMTP disabled the mail is written to the log and appended to the dev
/// log file instead, and counts as sent. A delivery failure is reported as
/// `false` and never fails the request, but the mail is still written out the
/// same way so the code is not lost.
#[derive(Clone)]
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub async fn send(&self, email: &Email) -> bool {
        if !self.config.enabled {
            self.write_dev_log(email).await;
            return true;
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout, self.deliver(email)).await {
            Ok(Ok(())) => {
                tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(to = %email.to, "Failed to send email: {:#}", e);
                self.write_fallback(email).await;
                false
            }
            Err(_) => {
                tracing::error!(to = %email.to, "Timed out sending email after {:?}", timeout);
                self.write_fallback(email).await;
                false
            }
        }
    }

    async fn deliver(&self, email: &Email) -> Result<()> {
        let message = Message::builder()
            .from(format!("{} <{}>", self.config.from_name, self.config.from_email).parse()?)
            .to(email.to.parse()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;

        if self.config.use_sendmail {
            AsyncSendmailTransport::<Tokio1Executor>::new()
                .send(message)
                .await?;
            return Ok(());
        }

        let builder = match self.config.security {
            SmtpSecurity::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?,
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
            }
        };
        let mut builder = builder
            .port(self.config.port)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)));
        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        builder.build().send(message).await?;
        Ok(())
    }

    async fn write_dev_log(&self, email: &Email) {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "[MAIL DEV] SMTP disabled, mail not delivered:\n{}",
            email.body
        );
        self.append_to_dev_log(email).await;
    }

    async fn write_fallback(&self, email: &Email) {
        tracing::warn!(
            to = %email.to,
            subject = %email.subject,
            "[MAIL FALLBACK] SMTP delivery failed, mail not delivered:\n{}",
            email.body
        );
        self.append_to_dev_log(email).await;
    }

    async fn append_to_dev_log(&self, email: &Email) {
        if self.config.dev_log.is_empty() {
            return;
        }
        if let Err(e) = append_dev_log(&self.config.dev_log, email).await {
            tracing::warn!("Failed to write dev mail log {}: {}", self.config.dev_log, e);
        }
    }
}

async fn append_dev_log(path: &str, email: &Email) -> std::io::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let entry = format!(
        "To: {}\nSubject: {}\n{}\n{}\n",
        email.to,
        email.subject,
        email.body,
        "-".repeat(40)
    );
    file.write_all(entry.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_smtp_appends_dev_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("mail").join("otp_dev.log");
        let mailer = Mailer::new(SmtpConfig {
            dev_log: log.to_string_lossy().to_string(),
            ..SmtpConfig::default()
        });

        let email = Email::verification("alice@student.kpu.ca", "alice", "042117", 10);
        assert!(mailer.send(&email).await);
        assert!(mailer.send(&email).await);

        let content = std::fs::read_to_string(&log).unwrap();
        assert_eq!(content.matches("To: alice@student.kpu.ca").count(), 2);
        assert!(content.contains("Your verification code is: 042117"));
    }

    #[tokio::test]
    async fn test_bad_recipient_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("otp_dev.log");
        let mailer = Mailer::new(SmtpConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 1,
            security: SmtpSecurity::None,
            timeout_secs: 2,
            dev_log: log.to_string_lossy().to_string(),
            ..SmtpConfig::default()
        });

        let email = Email::verification("not an address", "x", "000000", 10);
        assert!(!mailer.send(&email).await);

        // the undelivered code still lands in the dev log
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("To: not an address"));
        assert!(content.contains("Your verification code is: 000000"));
    }
}
