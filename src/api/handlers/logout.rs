use axum::{extract::Extension, http::HeaderMap, response::Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::handlers::respond;
use crate::cookies::SessionCookieJar;
use crate::error::FlowOutcome;

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    /// Session to terminate; the most recent one when absent.
    pub session_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session terminated and removed from the cookie")
    ),
    tag = "session"
)]
pub async fn logout(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LogoutRequest>,
) -> Response {
    let mut jar = SessionCookieJar::from_headers(&headers);

    let target = request
        .session_id
        .as_deref()
        .and_then(|id| jar.find_by_id(id))
        .or_else(|| jar.most_recent())
        .map(|cookie| (cookie.id.clone(), cookie.token.clone()));

    if let Some((session_id, token)) = target {
        // Backend deletion is best effort; the cookie entry goes away
        // regardless so the browser cannot keep using a dead session.
        if let Err(err) = state.client.delete_session(&session_id, &token).await {
            warn!("could not delete session {session_id}: {err}");
        } else {
            info!("session {session_id} terminated");
        }
        jar.remove(&session_id);
    }

    respond(&state.config, &jar, &FlowOutcome::redirect("/"))
}
