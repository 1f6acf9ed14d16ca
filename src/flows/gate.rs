//! Authentication level gate.
//!
//! Every protected route declares a level; the gate decides whether the
//! browser's current session satisfies it and where to send the user if
//! not. Check order is fixed: expiry and missing user first, then
//! password, then MFA.

use tracing::debug;

use crate::cookies::SessionCookieJar;
use crate::flows::context::FlowContext;
use crate::flows::factors::{self, FactorSummary};
use crate::flows::session::load_most_recent_session;
use crate::zitadel::IdentityClient;
use crate::zitadel::types::Session;

/// Ordered protection levels. Strong MFA accepts only TOTP or U2F;
/// any-MFA additionally accepts OTP by email.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthLevel {
    Open,
    BasicSession,
    PasswordRequired,
    AnyMfaRequired,
    StrongMfaRequired,
}

impl AuthLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::BasicSession => "basic_session",
            Self::PasswordRequired => "password_required",
            Self::AnyMfaRequired => "any_mfa_required",
            Self::StrongMfaRequired => "strong_mfa_required",
        }
    }
}

/// Gate verdict. `redirect` and `reason` are set only when the check
/// fails; `session` is returned whenever one was looked up.
#[derive(Debug, Default)]
pub struct AuthCheck {
    pub satisfied: bool,
    pub session: Option<Session>,
    pub redirect: Option<&'static str>,
    pub reason: Option<&'static str>,
}

impl AuthCheck {
    fn pass(session: Option<Session>) -> Self {
        Self {
            satisfied: true,
            session,
            redirect: None,
            reason: None,
        }
    }

    fn fail(session: Option<Session>, redirect: &'static str, reason: &'static str) -> Self {
        Self {
            satisfied: false,
            session,
            redirect: Some(redirect),
            reason: Some(reason),
        }
    }
}

/// Checks the required level against the most recent matching session.
/// A failed session lookup counts as "no session"; the gate itself
/// never mutates session state and never fails the request outright.
pub async fn check_authentication_level(
    client: &dyn IdentityClient,
    jar: &SessionCookieJar,
    required: AuthLevel,
    login_name: Option<&str>,
    organization: Option<&str>,
) -> AuthCheck {
    // Open routes never trigger a session lookup.
    if required == AuthLevel::Open {
        return AuthCheck::pass(None);
    }

    let session = match load_most_recent_session(client, jar, login_name, organization).await {
        Ok(session) => session,
        Err(err) => {
            debug!(?login_name, ?organization, "session lookup failed: {err}");
            None
        }
    };

    if required == AuthLevel::BasicSession {
        return match session {
            Some(session) => AuthCheck::pass(Some(session)),
            None => AuthCheck::fail(None, "/", "No session found"),
        };
    }

    let summary = factors::evaluate(session.as_ref());

    if !summary.has_user || !summary.not_expired {
        let reason = if summary.has_user {
            "Session expired"
        } else {
            "No user in session"
        };
        return AuthCheck::fail(session, "/", reason);
    }

    if !summary.password_verified {
        return AuthCheck::fail(session, "/password", "Password not verified");
    }

    match required {
        AuthLevel::AnyMfaRequired if !summary.has_any_mfa() => {
            AuthCheck::fail(session, "/mfa", "MFA not verified")
        }
        AuthLevel::StrongMfaRequired if !summary.has_strong_mfa() => {
            AuthCheck::fail(session, "/mfa", "Strong MFA not verified")
        }
        _ => AuthCheck::pass(session),
    }
}

/// Where to send a request that failed the gate, preserving the flow
/// context it arrived with. Picks the earliest unfinished step of the
/// authentication flow.
#[must_use]
pub fn smart_redirect(
    session: Option<&Session>,
    ctx: &FlowContext,
    login_name: Option<&str>,
) -> String {
    let summary = factors::evaluate(session);
    let login_name = login_name.or_else(|| session.and_then(Session::login_name));
    let params: Vec<(&str, &str)> = login_name
        .map(|name| vec![("loginName", name)])
        .unwrap_or_default();

    if !summary.has_user || !summary.not_expired {
        return ctx.url("/", &params);
    }
    if !summary.password_verified {
        return ctx.url("/password", &params);
    }
    if !summary.has_strong_mfa() {
        return ctx.url("/mfa", &params);
    }
    // Fully authenticated yet still redirected; the account page is the
    // safe destination.
    "/account".to_string()
}

/// True when the summary satisfies the level without consulting the
/// backend. Used by callers that already hold an evaluated session.
#[must_use]
pub fn level_satisfied(summary: &FactorSummary, required: AuthLevel) -> bool {
    match required {
        AuthLevel::Open => true,
        AuthLevel::BasicSession => summary.has_user,
        AuthLevel::PasswordRequired => {
            summary.has_user && summary.not_expired && summary.password_verified
        }
        AuthLevel::AnyMfaRequired => {
            summary.has_user
                && summary.not_expired
                && summary.password_verified
                && summary.has_any_mfa()
        }
        AuthLevel::StrongMfaRequired => {
            summary.has_user
                && summary.not_expired
                && summary.password_verified
                && summary.has_strong_mfa()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthLevel, check_authentication_level, level_satisfied, smart_redirect};
    use crate::cookies::{SessionCookie, SessionCookieJar};
    use crate::flows::context::FlowContext;
    use crate::flows::factors;
    use crate::flows::testing::FakeIdentity;
    use crate::zitadel::types::{Factors, Session, SessionFactor, UserFactor};
    use chrono::{Duration, Utc};

    fn session(password: bool, totp: bool, otp_email: bool) -> Session {
        let now = Utc::now();
        Session {
            id: "s1".to_string(),
            factors: Factors {
                user: Some(UserFactor {
                    id: "user1".to_string(),
                    login_name: "user@example.com".to_string(),
                    organization_id: None,
                }),
                password: password.then(|| SessionFactor::verified_at(now)),
                totp: totp.then(|| SessionFactor::verified_at(now)),
                otp_email: otp_email.then(|| SessionFactor::verified_at(now)),
                ..Default::default()
            },
            expiration_date: Some(now + Duration::hours(1)),
            change_date: Some(now),
        }
    }

    fn jar_for(session: &Session) -> SessionCookieJar {
        let mut jar = SessionCookieJar::default();
        jar.upsert(SessionCookie {
            id: session.id.clone(),
            token: format!("token-{}", session.id),
            login_name: session.login_name().unwrap_or_default().to_string(),
            organization: None,
            creation_date: Utc::now(),
            change_date: Utc::now(),
            expiration_date: session.expiration_date,
        });
        jar
    }

    #[tokio::test]
    async fn open_level_passes_without_session() {
        let fake = FakeIdentity::default();
        let jar = SessionCookieJar::default();
        let check =
            check_authentication_level(&fake, &jar, AuthLevel::Open, None, None).await;
        assert!(check.satisfied);
        assert!(check.session.is_none());
    }

    #[tokio::test]
    async fn basic_session_requires_a_cookie() {
        let fake = FakeIdentity::default();
        let jar = SessionCookieJar::default();
        let check =
            check_authentication_level(&fake, &jar, AuthLevel::BasicSession, None, None).await;
        assert!(!check.satisfied);
        assert_eq!(check.redirect, Some("/"));
        assert_eq!(check.reason, Some("No session found"));
    }

    #[tokio::test]
    async fn password_failure_redirects_to_password_entry() {
        let session = session(false, false, false);
        let jar = jar_for(&session);
        let fake = FakeIdentity::default().with_sessions(vec![session]);

        let check =
            check_authentication_level(&fake, &jar, AuthLevel::PasswordRequired, None, None).await;
        assert!(!check.satisfied);
        assert_eq!(check.redirect, Some("/password"));
        assert_eq!(check.reason, Some("Password not verified"));
    }

    #[tokio::test]
    async fn expiry_outranks_missing_password() {
        let mut expired = session(false, false, false);
        expired.expiration_date = Some(Utc::now() - Duration::minutes(1));
        let jar = jar_for(&expired);
        let fake = FakeIdentity::default().with_sessions(vec![expired]);

        let check =
            check_authentication_level(&fake, &jar, AuthLevel::PasswordRequired, None, None).await;
        assert!(!check.satisfied);
        assert_eq!(check.redirect, Some("/"));
        assert_eq!(check.reason, Some("Session expired"));
    }

    #[tokio::test]
    async fn otp_email_satisfies_any_but_not_strong_mfa() {
        let session = session(true, false, true);
        let jar = jar_for(&session);
        let fake = FakeIdentity::default().with_sessions(vec![session]);

        let check =
            check_authentication_level(&fake, &jar, AuthLevel::AnyMfaRequired, None, None).await;
        assert!(check.satisfied);

        let check =
            check_authentication_level(&fake, &jar, AuthLevel::StrongMfaRequired, None, None)
                .await;
        assert!(!check.satisfied);
        assert_eq!(check.redirect, Some("/mfa"));
        assert_eq!(check.reason, Some("Strong MFA not verified"));
    }

    #[tokio::test]
    async fn gate_is_idempotent_for_unchanged_sessions() {
        let session = session(true, true, false);
        let jar = jar_for(&session);
        let fake = FakeIdentity::default().with_sessions(vec![session]);

        let first =
            check_authentication_level(&fake, &jar, AuthLevel::StrongMfaRequired, None, None)
                .await;
        let second =
            check_authentication_level(&fake, &jar, AuthLevel::StrongMfaRequired, None, None)
                .await;
        assert_eq!(first.satisfied, second.satisfied);
        assert_eq!(first.redirect, second.redirect);
    }

    #[test]
    fn strong_satisfaction_implies_any_satisfaction() {
        for (password, totp, otp_email) in [
            (true, true, false),
            (true, true, true),
            (true, false, true),
            (true, false, false),
            (false, false, false),
        ] {
            let session = session(password, totp, otp_email);
            let summary = factors::evaluate(Some(&session));
            if level_satisfied(&summary, AuthLevel::StrongMfaRequired) {
                assert!(level_satisfied(&summary, AuthLevel::AnyMfaRequired));
            }
        }
        // The converse fails for OTP email alone.
        let summary = factors::evaluate(Some(&session(true, false, true)));
        assert!(level_satisfied(&summary, AuthLevel::AnyMfaRequired));
        assert!(!level_satisfied(&summary, AuthLevel::StrongMfaRequired));
    }

    #[test]
    fn smart_redirect_walks_the_flow_in_order() {
        let ctx = FlowContext::new(Some("org1".to_string()), Some("oidc_req1".to_string()));

        assert_eq!(
            smart_redirect(None, &ctx, None),
            "/?organization=org1&requestId=oidc_req1"
        );

        let no_password = session(false, false, false);
        assert_eq!(
            smart_redirect(Some(&no_password), &ctx, None),
            "/password?loginName=user%40example.com&organization=org1&requestId=oidc_req1"
        );

        let no_mfa = session(true, false, false);
        assert!(smart_redirect(Some(&no_mfa), &ctx, None).starts_with("/mfa?"));

        let complete = session(true, true, false);
        assert_eq!(smart_redirect(Some(&complete), &ctx, None), "/account");
    }
}
