//! Confirmation-mail delivery arguments.
//!
//! Without a mail API URL and key the server falls back to the logging
//! sender, which is what local development wants.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_MAIL_API_URL: &str = "mail-api-url";
pub const ARG_MAIL_API_KEY: &str = "mail-api-key";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAIL_MAX_ATTEMPTS: &str = "mail-max-attempts";
pub const ARG_MAIL_BACKOFF_BASE_SECONDS: &str = "mail-backoff-base-seconds";
pub const ARG_MAIL_BACKOFF_MAX_SECONDS: &str = "mail-backoff-max-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_API_URL)
                .long(ARG_MAIL_API_URL)
                .help("Mail API endpoint for confirmation emails")
                .env("REGISTRO_MAIL_API_URL")
                .requires(ARG_MAIL_API_KEY),
        )
        .arg(
            Arg::new(ARG_MAIL_API_KEY)
                .long(ARG_MAIL_API_KEY)
                .help("Bearer key for the mail API")
                .env("REGISTRO_MAIL_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for confirmation emails")
                .env("REGISTRO_MAIL_FROM")
                .default_value("no-reply@registro.dev"),
        )
        .arg(
            Arg::new(ARG_MAIL_MAX_ATTEMPTS)
                .long(ARG_MAIL_MAX_ATTEMPTS)
                .help("Max delivery attempts before giving up on an email")
                .env("REGISTRO_MAIL_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_MAIL_BACKOFF_BASE_SECONDS)
                .long(ARG_MAIL_BACKOFF_BASE_SECONDS)
                .help("Base delay for mail retry backoff")
                .env("REGISTRO_MAIL_BACKOFF_BASE_SECONDS")
                .default_value("2")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_MAIL_BACKOFF_MAX_SECONDS)
                .long(ARG_MAIL_BACKOFF_MAX_SECONDS)
                .help("Max delay for mail retry backoff")
                .env("REGISTRO_MAIL_BACKOFF_MAX_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub api_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub from_email: String,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

impl Options {
    /// # Errors
    ///
    /// Currently infallible; kept fallible to match the other option parsers.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            api_url: matches.get_one::<String>(ARG_MAIL_API_URL).cloned(),
            api_key: matches
                .get_one::<String>(ARG_MAIL_API_KEY)
                .cloned()
                .map(SecretString::from),
            from_email: matches
                .get_one::<String>(ARG_MAIL_FROM)
                .cloned()
                .unwrap_or_else(|| "no-reply@registro.dev".to_string()),
            max_attempts: matches
                .get_one::<u32>(ARG_MAIL_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(3),
            backoff_base_seconds: matches
                .get_one::<u64>(ARG_MAIL_BACKOFF_BASE_SECONDS)
                .copied()
                .unwrap_or(2),
            backoff_max_seconds: matches
                .get_one::<u64>(ARG_MAIL_BACKOFF_MAX_SECONDS)
                .copied()
                .unwrap_or(60),
        })
    }
}
