//! Outbound confirmation mail dispatch.
//!
//! Handlers only enqueue; a background worker owns delivery and retries.
//! The HTTP response never waits on (or fails because of) the mail path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// One confirmation message: destination plus the completed activation URL.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to_email: String,
    pub activation_url: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs instead of delivering; the default when no mail API is configured.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            activation_url = %message.activation_url,
            "confirmation email send stub"
        );
        Ok(())
    }
}

/// Delivers through a hosted mail HTTP API (JSON POST + bearer key).
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: SecretString,
    from_email: String,
}

impl HttpEmailSender {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_url: String, api_key: SecretString, from_email: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build mail API client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
            from_email,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let body = json!({
            "from": { "email": self.from_email },
            "to": [{ "email": message.to_email }],
            "subject": "Confirm your account",
            "text": format!(
                "Follow this link to activate your account: {}",
                message.activation_url
            ),
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("mail API request failed")?;

        response
            .error_for_status()
            .context("mail API rejected the message")?;

        Ok(())
    }
}

/// Retry/backoff configuration for the dispatch worker.
#[derive(Clone, Copy, Debug)]
pub struct MailerConfig {
    max_attempts: u32,
    backoff_base_seconds: u64,
    backoff_max_seconds: u64,
}

impl MailerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_seconds: 2,
            backoff_max_seconds: 60,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max_seconds = seconds;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle handlers use to enqueue mail without awaiting delivery.
#[derive(Clone, Debug)]
pub struct MailerHandle {
    tx: mpsc::UnboundedSender<EmailMessage>,
}

impl MailerHandle {
    /// Handle + receiver pair; tests read the receiver to assert on queued mail.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EmailMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, message: EmailMessage) {
        // A dead worker loses the message; it must never surface back into
        // the request path as a second response.
        if self.tx.send(message).is_err() {
            error!("mail worker is gone, dropping confirmation email");
        }
    }
}

/// Spawn the dispatch worker and return the handle to feed it.
pub fn spawn_mailer_worker(sender: Arc<dyn EmailSender>, config: MailerConfig) -> MailerHandle {
    let (handle, rx) = MailerHandle::channel();
    tokio::spawn(run_worker(rx, sender, config));
    handle
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<EmailMessage>,
    sender: Arc<dyn EmailSender>,
    config: MailerConfig,
) {
    while let Some(message) = rx.recv().await {
        deliver_with_retry(sender.as_ref(), &message, config).await;
    }
}

async fn deliver_with_retry(sender: &dyn EmailSender, message: &EmailMessage, config: MailerConfig) {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match sender.send(message).await {
            Ok(()) => {
                info!(to_email = %message.to_email, attempt, "confirmation email delivered");
                return;
            }
            Err(err) if attempt >= config.max_attempts() => {
                error!(
                    to_email = %message.to_email,
                    attempt,
                    "giving up on confirmation email: {err:#}"
                );
                return;
            }
            Err(err) => {
                let delay = backoff_delay(config, attempt);
                warn!(
                    to_email = %message.to_email,
                    attempt,
                    delay_seconds = delay.as_secs(),
                    "confirmation email failed, retrying: {err:#}"
                );
                sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(config: MailerConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let seconds = config
        .backoff_base_seconds
        .saturating_mul(1u64 << exponent)
        .min(config.backoff_max_seconds);
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_then_caps() {
        let config = MailerConfig::new()
            .with_backoff_base_seconds(2)
            .with_backoff_max_seconds(10);

        assert_eq!(backoff_delay(config, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(config, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(config, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(config, 4), Duration::from_secs(10));
        assert_eq!(backoff_delay(config, 40), Duration::from_secs(10));
    }

    struct FlakySender {
        failures: AtomicU32,
        delivered: AtomicU32,
    }

    #[async_trait]
    impl EmailSender for FlakySender {
        async fn send(&self, _message: &EmailMessage) -> Result<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow!("transient mail failure"));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            to_email: "b@x.com".to_string(),
            activation_url: "https://registro.test/account-activation#token=t".to_string(),
        }
    }

    #[tokio::test]
    async fn retries_until_delivery() {
        let sender = FlakySender {
            failures: AtomicU32::new(2),
            delivered: AtomicU32::new(0),
        };
        let config = MailerConfig::new()
            .with_max_attempts(3)
            .with_backoff_base_seconds(0);

        deliver_with_retry(&sender, &message(), config).await;
        assert_eq!(sender.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let sender = FlakySender {
            failures: AtomicU32::new(10),
            delivered: AtomicU32::new(0),
        };
        let config = MailerConfig::new()
            .with_max_attempts(2)
            .with_backoff_base_seconds(0);

        deliver_with_retry(&sender, &message(), config).await;
        assert_eq!(sender.delivered.load(Ordering::SeqCst), 0);
        assert_eq!(sender.failures.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn handle_enqueue_reaches_the_worker() {
        let (handle, mut rx) = MailerHandle::channel();
        handle.enqueue(message());

        let queued = rx.recv().await;
        assert_eq!(queued.map(|m| m.to_email), Some("b@x.com".to_string()));
    }
}
