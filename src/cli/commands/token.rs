//! Activation-token configuration arguments.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_CLOCK_SKEW_LEEWAY_SECONDS: &str = "clock-skew-leeway-seconds";
pub const ARG_ACTIVATION_BASE_URL: &str = "activation-base-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("Secret key used to sign and verify activation tokens")
                .env("REGISTRO_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Confirmation window: activation token TTL in seconds")
                .env("REGISTRO_TOKEN_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CLOCK_SKEW_LEEWAY_SECONDS)
                .long(ARG_CLOCK_SKEW_LEEWAY_SECONDS)
                .help("Clock skew tolerated when checking token expiry, in seconds")
                .env("REGISTRO_CLOCK_SKEW_LEEWAY_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ACTIVATION_BASE_URL)
                .long(ARG_ACTIVATION_BASE_URL)
                .help("Base URL for activation links; also the token issuer and CORS origin")
                .env("REGISTRO_ACTIVATION_BASE_URL")
                .default_value("https://registro.dev"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub signing_key: SecretString,
    pub token_ttl_seconds: i64,
    pub clock_skew_leeway_seconds: i64,
    pub activation_base_url: String,
}

impl Options {
    /// # Errors
    ///
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let signing_key = matches
            .get_one::<String>(ARG_SIGNING_KEY)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --signing-key")?;

        let token_ttl_seconds = matches
            .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(600);

        let clock_skew_leeway_seconds = matches
            .get_one::<i64>(ARG_CLOCK_SKEW_LEEWAY_SECONDS)
            .copied()
            .unwrap_or(30);

        let activation_base_url = matches
            .get_one::<String>(ARG_ACTIVATION_BASE_URL)
            .cloned()
            .context("missing required argument: --activation-base-url")?;

        Ok(Self {
            signing_key,
            token_ttl_seconds,
            clock_skew_leeway_seconds,
            activation_base_url,
        })
    }
}
