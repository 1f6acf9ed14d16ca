//! HTTP handlers for the login flow API.
//!
//! Handlers stay thin: parse the session cookie jar, call the matching
//! flow function, serialize its outcome and re-write the cookie. All
//! decision logic lives under [`crate::flows`].

pub mod finish;
pub mod flow;
pub mod health;
pub mod login;
pub mod loginname;
pub mod logout;
pub mod password;
pub mod session;

use axum::{
    http::header::SET_COOKIE,
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use crate::config::AppConfig;
use crate::cookies::SessionCookieJar;
use crate::error::FlowOutcome;

/// Serialize a flow outcome and attach the updated session cookie.
///
/// A cookie that fails to serialize is logged and dropped; the outcome
/// still reaches the UI so the user is never stuck on a broken response.
pub(crate) fn respond(config: &AppConfig, jar: &SessionCookieJar, outcome: &FlowOutcome) -> Response {
    let mut response = Json(outcome).into_response();
    match jar.to_set_cookie(config.cookie_secure()) {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        Err(err) => error!("failed to serialize session cookie: {err}"),
    }
    response
}
