//! Runtime configuration assembled by the CLI layer.

/// Application settings shared by every handler through the router state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the identity-provider API.
    pub zitadel_api_url: String,
    /// Origin the hosted login UI is served from. Used for CORS and for
    /// building absolute IDP callback URLs.
    pub ui_origin: String,
    /// Organization applied when a request carries none.
    pub default_organization: Option<String>,
    /// Treat sessions of users with an unverified email as invalid.
    pub require_email_verification: bool,
    /// Lifetime of newly created sessions, in seconds.
    pub session_lifetime_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            zitadel_api_url: "http://localhost:8080".to_string(),
            ui_origin: "http://localhost:3000".to_string(),
            default_organization: None,
            require_email_verification: false,
            session_lifetime_seconds: 24 * 60 * 60,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_zitadel_api_url(mut self, url: impl Into<String>) -> Self {
        self.zitadel_api_url = url.into();
        self
    }

    #[must_use]
    pub fn with_ui_origin(mut self, origin: impl Into<String>) -> Self {
        self.ui_origin = origin.into();
        self
    }

    #[must_use]
    pub fn with_default_organization(mut self, organization: Option<String>) -> Self {
        self.default_organization = organization;
        self
    }

    #[must_use]
    pub fn with_require_email_verification(mut self, require: bool) -> Self {
        self.require_email_verification = require;
        self
    }

    #[must_use]
    pub fn with_session_lifetime_seconds(mut self, seconds: u64) -> Self {
        self.session_lifetime_seconds = seconds;
        self
    }

    /// Session cookies are marked `Secure` whenever the UI is served
    /// over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.ui_origin.starts_with("https://")
    }
}
