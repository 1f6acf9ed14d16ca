use crate::{api, config::AppConfig, zitadel::ZitadelClient};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;

pub struct Args {
    pub port: u16,
    pub zitadel_api_url: String,
    pub zitadel_service_token: SecretString,
    pub ui_origin: String,
    pub organization: Option<String>,
    pub require_email_verification: bool,
    pub session_lifetime_seconds: u64,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("zitadel_api_url", &self.zitadel_api_url)
            .field("zitadel_service_token", &"***")
            .field("ui_origin", &self.ui_origin)
            .field("organization", &self.organization)
            .field(
                "require_email_verification",
                &self.require_email_verification,
            )
            .field("session_lifetime_seconds", &self.session_lifetime_seconds)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the identity client cannot be built or the server
/// fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let config = AppConfig::new()
        .with_zitadel_api_url(args.zitadel_api_url.clone())
        .with_ui_origin(args.ui_origin)
        .with_default_organization(args.organization)
        .with_require_email_verification(args.require_email_verification)
        .with_session_lifetime_seconds(args.session_lifetime_seconds);

    let client = ZitadelClient::new(&args.zitadel_api_url, args.zitadel_service_token)
        .context("Failed to build identity API client")?;

    let state = Arc::new(api::AppState {
        config,
        client: Arc::new(client),
    });

    api::serve(args.port, state).await
}
