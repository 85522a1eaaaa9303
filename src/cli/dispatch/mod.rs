//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{mail, token};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let token_opts = token::Options::parse(matches)?;
    let mail_opts = mail::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_key: token_opts.signing_key,
        token_ttl_seconds: token_opts.token_ttl_seconds,
        clock_skew_leeway_seconds: token_opts.clock_skew_leeway_seconds,
        activation_base_url: token_opts.activation_base_url,
        mail_api_url: mail_opts.api_url,
        mail_api_key: mail_opts.api_key,
        mail_from: mail_opts.from_email,
        mail_max_attempts: mail_opts.max_attempts,
        mail_backoff_base_seconds: mail_opts.backoff_base_seconds,
        mail_backoff_max_seconds: mail_opts.backoff_max_seconds,
    }))
}
