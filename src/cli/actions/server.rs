use crate::{
    activation::{TokenIssuer, TokenVerifier},
    api,
    api::email::{EmailSender, HttpEmailSender, LogEmailSender, MailerConfig},
    api::handlers::SignupState,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub signing_key: SecretString,
    pub token_ttl_seconds: i64,
    pub clock_skew_leeway_seconds: i64,
    pub activation_base_url: String,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<SecretString>,
    pub mail_from: String,
    pub mail_max_attempts: u32,
    pub mail_backoff_base_seconds: u64,
    pub mail_backoff_max_seconds: u64,
}

/// Execute the server action.
///
/// The signing key is injected here once and shared read-only by the token
/// issuer and verifier; no other process-wide mutable state exists.
///
/// # Errors
///
/// Returns an error if the mail client cannot be built or the server fails
/// to start.
pub async fn execute(args: Args) -> Result<()> {
    let issuer = TokenIssuer::new(
        args.signing_key.clone(),
        args.activation_base_url.clone(),
        args.token_ttl_seconds,
    );
    let verifier = TokenVerifier::new(
        args.signing_key,
        args.activation_base_url.clone(),
        args.clock_skew_leeway_seconds,
    );
    let state = Arc::new(SignupState::new(args.activation_base_url, issuer, verifier));

    let sender: Arc<dyn EmailSender> = match (args.mail_api_url, args.mail_api_key) {
        (Some(api_url), Some(api_key)) => {
            Arc::new(HttpEmailSender::new(api_url, api_key, args.mail_from)?)
        }
        _ => {
            info!("No mail API configured, logging confirmation emails instead");
            Arc::new(LogEmailSender)
        }
    };

    let mailer_config = MailerConfig::new()
        .with_max_attempts(args.mail_max_attempts)
        .with_backoff_base_seconds(args.mail_backoff_base_seconds)
        .with_backoff_max_seconds(args.mail_backoff_max_seconds);

    api::new(args.port, args.dsn, state, sender, mailer_config).await
}
