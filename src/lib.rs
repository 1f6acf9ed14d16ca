//! # Ensaluti (Hosted Login Flow Engine)
//!
//! `ensaluti` drives the hosted login experience for a ZITADEL-compatible
//! identity provider. It decides, for every step of an authentication flow,
//! where the browser goes next: password entry, passkey, an external IDP,
//! MFA verification, registration, or back to the relying party.
//!
//! ## Flow Model
//!
//! - **Login-name routing:** the identifier typed on the start page is
//!   resolved to exactly one user; ambiguity is an error, never a guess.
//! - **Authentication levels:** every UI route declares the level it
//!   requires (session, password, MFA, strong MFA). A proxy layer enforces
//!   the level and redirects to the earliest unfinished step.
//! - **Protocol completion:** OIDC and SAML requests are resumed and
//!   finished against the backend; the browser only ever sees the final
//!   callback URL or an auto-submitting SAML form.
//!
//! ## Session Cookies
//!
//! The backend owns all session state. The browser carries a single
//! HTTP-only cookie listing the sessions it participates in; every handler
//! re-reads and re-writes that list.
//!
//! ## Error Policy
//!
//! Credential-handling surfaces never reveal whether an account exists:
//! transport failures, unknown users and wrong passwords all collapse into
//! the same generic error before a response leaves the API.

pub mod api;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod error;
pub mod flows;
pub mod zitadel;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
