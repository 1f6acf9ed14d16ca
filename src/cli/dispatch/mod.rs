//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(3001);
    let zitadel_api_url = matches
        .get_one::<String>(commands::ARG_ZITADEL_API_URL)
        .cloned()
        .context("missing required argument: --zitadel-api-url")?;
    let zitadel_service_token = matches
        .get_one::<String>(commands::ARG_ZITADEL_SERVICE_TOKEN)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --zitadel-service-token")?;
    let ui_origin = matches
        .get_one::<String>(commands::ARG_UI_ORIGIN)
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    Ok(Action::Server(Args {
        port,
        zitadel_api_url,
        zitadel_service_token,
        ui_origin,
        organization: matches.get_one::<String>(commands::ARG_ORGANIZATION).cloned(),
        require_email_verification: matches
            .get_one::<bool>(commands::ARG_REQUIRE_EMAIL_VERIFICATION)
            .copied()
            .unwrap_or(false),
        session_lifetime_seconds: matches
            .get_one::<u64>(commands::ARG_SESSION_LIFETIME)
            .copied()
            .unwrap_or(24 * 60 * 60),
    }))
}
