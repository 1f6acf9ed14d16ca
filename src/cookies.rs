//! Session cookie jar.
//!
//! The browser carries one HTTP-only cookie holding a list of session
//! references (id, token, login name). The backend owns the sessions; the
//! cookie is just the map from this browser to them. The payload is a JSON
//! array encoded with URL-safe base64 so it survives cookie value rules.

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderValue, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE_NAME: &str = "ensaluti_sessions";

/// One browser-side reference to a backend session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub id: String,
    pub token: String,
    pub login_name: String,
    pub organization: Option<String>,
    pub creation_date: DateTime<Utc>,
    pub change_date: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl SessionCookie {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|expiration| expiration <= now)
    }
}

/// All session references carried by the current request.
#[derive(Clone, Debug, Default)]
pub struct SessionCookieJar {
    entries: Vec<SessionCookie>,
}

impl SessionCookieJar {
    /// Parses the jar from request headers. An absent, malformed or fully
    /// expired cookie yields an empty jar; a broken cookie never breaks
    /// the request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_headers_at(headers, Utc::now())
    }

    #[must_use]
    pub fn from_headers_at(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let Some(raw) = cookie_value(headers, SESSION_COOKIE_NAME) else {
            return Self::default();
        };
        match decode_entries(&raw) {
            Ok(mut entries) => {
                entries.retain(|entry| !entry.is_expired(now));
                Self { entries }
            }
            Err(err) => {
                tracing::debug!("dropping unreadable session cookie: {err}");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn all(&self) -> &[SessionCookie] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find_by_id(&self, session_id: &str) -> Option<&SessionCookie> {
        self.entries.iter().find(|entry| entry.id == session_id)
    }

    /// Case-insensitive lookup, optionally scoped to an organization.
    #[must_use]
    pub fn find_by_login_name(
        &self,
        login_name: &str,
        organization: Option<&str>,
    ) -> Option<&SessionCookie> {
        self.entries.iter().find(|entry| {
            entry.login_name.eq_ignore_ascii_case(login_name)
                && organization.is_none_or(|org| entry.organization.as_deref() == Some(org))
        })
    }

    /// The most recently changed entry.
    #[must_use]
    pub fn most_recent(&self) -> Option<&SessionCookie> {
        self.entries.iter().max_by_key(|entry| entry.change_date)
    }

    /// Inserts or replaces the entry for the session id. Last write wins.
    pub fn upsert(&mut self, cookie: SessionCookie) {
        self.entries.retain(|entry| entry.id != cookie.id);
        self.entries.push(cookie);
    }

    pub fn remove(&mut self, session_id: &str) {
        self.entries.retain(|entry| entry.id != session_id);
    }

    /// Serializes the jar into a `Set-Cookie` header value.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn to_set_cookie(&self, secure: bool) -> Result<HeaderValue> {
        let payload = serde_json::to_vec(&self.entries).context("serializing session cookie")?;
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let mut value = format!("{SESSION_COOKIE_NAME}={encoded}; Path=/; HttpOnly; SameSite=Lax");
        if secure {
            value.push_str("; Secure");
        }
        HeaderValue::from_str(&value).context("building session cookie header")
    }
}

fn decode_entries(raw: &str) -> Result<Vec<SessionCookie>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .context("session cookie is not valid base64")?;
    serde_json::from_slice(&bytes).context("session cookie payload is not valid JSON")
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get_all(header::COOKIE).iter().find_map(|header| {
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::{SESSION_COOKIE_NAME, SessionCookie, SessionCookieJar};
    use axum::http::{HeaderMap, HeaderValue, header};
    use chrono::{Duration, Utc};

    fn cookie(id: &str, login_name: &str, minutes_ago: i64) -> SessionCookie {
        let now = Utc::now();
        SessionCookie {
            id: id.to_string(),
            token: format!("token-{id}"),
            login_name: login_name.to_string(),
            organization: None,
            creation_date: now - Duration::minutes(minutes_ago),
            change_date: now - Duration::minutes(minutes_ago),
            expiration_date: Some(now + Duration::hours(1)),
        }
    }

    fn headers_with(jar: &SessionCookieJar) -> HeaderMap {
        let set_cookie = jar.to_set_cookie(false).unwrap();
        let value = set_cookie.to_str().unwrap();
        let pair = value.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    #[test]
    fn round_trips_through_headers() {
        let mut jar = SessionCookieJar::default();
        jar.upsert(cookie("s1", "user@example.com", 10));
        jar.upsert(cookie("s2", "other@example.com", 5));

        let parsed = SessionCookieJar::from_headers(&headers_with(&jar));
        assert_eq!(parsed.all().len(), 2);
        assert_eq!(
            parsed.find_by_id("s1").map(|entry| entry.token.as_str()),
            Some("token-s1")
        );
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let mut jar = SessionCookieJar::default();
        jar.upsert(cookie("s1", "user@example.com", 10));
        let mut replacement = cookie("s1", "user@example.com", 0);
        replacement.token = "token-new".to_string();
        jar.upsert(replacement);

        assert_eq!(jar.all().len(), 1);
        assert_eq!(jar.find_by_id("s1").unwrap().token, "token-new");
    }

    #[test]
    fn expired_entries_are_dropped_on_parse() {
        let mut jar = SessionCookieJar::default();
        let mut expired = cookie("s1", "user@example.com", 10);
        expired.expiration_date = Some(Utc::now() - Duration::minutes(1));
        jar.upsert(expired);
        jar.upsert(cookie("s2", "other@example.com", 5));

        let parsed = SessionCookieJar::from_headers(&headers_with(&jar));
        assert_eq!(parsed.all().len(), 1);
        assert!(parsed.find_by_id("s1").is_none());
    }

    #[test]
    fn malformed_cookie_yields_empty_jar() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}=%%%not-base64%%%")).unwrap(),
        );
        assert!(SessionCookieJar::from_headers(&headers).is_empty());
    }

    #[test]
    fn login_name_lookup_ignores_case_and_honors_org() {
        let mut jar = SessionCookieJar::default();
        let mut entry = cookie("s1", "User@Example.com", 1);
        entry.organization = Some("org1".to_string());
        jar.upsert(entry);

        assert!(jar.find_by_login_name("user@example.com", None).is_some());
        assert!(jar.find_by_login_name("user@example.com", Some("org1")).is_some());
        assert!(jar.find_by_login_name("user@example.com", Some("org2")).is_none());
    }

    #[test]
    fn most_recent_prefers_latest_change() {
        let mut jar = SessionCookieJar::default();
        jar.upsert(cookie("old", "a@example.com", 30));
        jar.upsert(cookie("new", "b@example.com", 1));
        assert_eq!(jar.most_recent().map(|entry| entry.id.as_str()), Some("new"));
    }
}
