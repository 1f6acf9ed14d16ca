use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::api::AppState;
use crate::cookies::SessionCookieJar;
use crate::flows::factors;
use crate::flows::session::load_most_recent_session;

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub login_name: Option<String>,
    pub organization: Option<String>,
}

/// Browser-safe view of the current session. Never exposes tokens.
#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub login_name: Option<String>,
    pub organization_id: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub password_verified: bool,
    pub mfa_verified: bool,
}

#[utoipa::path(
    get,
    path = "/api/session",
    params(SessionParams),
    responses(
        (status = 200, description = "Most recent matching session", body = SessionSummary),
        (status = 204, description = "No matching session")
    ),
    tag = "session"
)]
pub async fn session(
    state: Extension<Arc<AppState>>,
    Query(params): Query<SessionParams>,
    headers: HeaderMap,
) -> Response {
    let jar = SessionCookieJar::from_headers(&headers);
    let session = match load_most_recent_session(
        state.client.as_ref(),
        &jar,
        params.login_name.as_deref(),
        params.organization.as_deref(),
    )
    .await
    {
        Ok(session) => session,
        Err(err) => {
            debug!("session lookup failed: {err}");
            None
        }
    };

    let Some(session) = session else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let summary = factors::evaluate(Some(&session));
    Json(SessionSummary {
        id: session.id.clone(),
        login_name: session.login_name().map(str::to_string),
        organization_id: session.organization_id().map(str::to_string),
        expiration_date: session.expiration_date,
        password_verified: summary.password_verified,
        mfa_verified: summary.has_any_mfa(),
    })
    .into_response()
}
