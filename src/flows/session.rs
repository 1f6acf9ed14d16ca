//! Session selection and validity.
//!
//! The cookie jar only references sessions; the backend record decides
//! whether one is still usable. Lookup failures here are never fatal, a
//! session that cannot be fetched is simply not a candidate.

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::cookies::SessionCookieJar;
use crate::flows::factors;
use crate::zitadel::IdentityClient;
use crate::zitadel::types::Session;

/// Hint from a pending authorization request narrowing which session
/// may be reused.
#[derive(Clone, Debug)]
pub enum SessionHint {
    UserId(String),
    LoginName(String),
}

impl SessionHint {
    fn matches(&self, session: &Session) -> bool {
        match self {
            Self::UserId(user_id) => session.user_id() == Some(user_id.as_str()),
            Self::LoginName(login_name) => session
                .login_name()
                .is_some_and(|name| name.eq_ignore_ascii_case(login_name)),
        }
    }
}

/// Fetches every session the jar references, skipping entries the
/// backend no longer knows or refuses to return.
pub async fn load_sessions(client: &dyn IdentityClient, jar: &SessionCookieJar) -> Vec<Session> {
    let mut sessions = Vec::with_capacity(jar.all().len());
    for entry in jar.all() {
        match client.session(&entry.id, &entry.token).await {
            Ok(Some(session)) => sessions.push(session),
            Ok(None) => debug!(session_id = %entry.id, "session no longer exists"),
            Err(err) => debug!(session_id = %entry.id, "failed to load session: {err}"),
        }
    }
    sessions
}

/// Loads the session for a login name, or the most recently changed one
/// when no login name is given.
///
/// # Errors
/// Returns an error when the backend lookup fails.
pub async fn load_most_recent_session(
    client: &dyn IdentityClient,
    jar: &SessionCookieJar,
    login_name: Option<&str>,
    organization: Option<&str>,
) -> Result<Option<Session>> {
    let entry = match login_name {
        Some(login_name) => jar.find_by_login_name(login_name, organization),
        None => jar.most_recent(),
    };
    let Some(entry) = entry else {
        return Ok(None);
    };
    client.session(&entry.id, &entry.token).await
}

/// Full validity check: a user is attached, at least one credential
/// (password, passkey or external IDP intent) is verified, the session
/// has not expired, and the user's email is verified when policy
/// requires it.
pub async fn is_session_valid(
    client: &dyn IdentityClient,
    session: &Session,
    require_email_verification: bool,
) -> bool {
    let summary = factors::evaluate_at(Some(session), Utc::now());
    let credential_verified =
        summary.password_verified || summary.u2f_verified || summary.intent_verified;
    if !summary.has_user || !credential_verified || !summary.not_expired {
        return false;
    }
    if !require_email_verification {
        return true;
    }
    let Some(user_id) = session.user_id() else {
        return false;
    };
    match client.user_by_id(user_id).await {
        Ok(Some(user)) => user
            .human
            .as_ref()
            .and_then(|human| human.email.as_ref())
            .is_some_and(|email| email.is_verified),
        Ok(None) => false,
        Err(err) => {
            debug!(user_id, "failed to verify user email: {err}");
            false
        }
    }
}

/// Picks the newest valid session, honoring the request's user hint.
/// Candidates are sorted by change time descending and the first one
/// that passes the full validity check wins. An invalid session is
/// never returned, however recent.
pub async fn find_valid_session(
    client: &dyn IdentityClient,
    sessions: Vec<Session>,
    hint: Option<&SessionHint>,
    require_email_verification: bool,
) -> Option<Session> {
    let mut candidates: Vec<Session> = sessions
        .into_iter()
        .filter(|session| hint.is_none_or(|hint| hint.matches(session)))
        .collect();
    candidates.sort_by(|a, b| b.change_date.cmp(&a.change_date));

    for session in candidates {
        if is_session_valid(client, &session, require_email_verification).await {
            return Some(session);
        }
    }
    None
}
