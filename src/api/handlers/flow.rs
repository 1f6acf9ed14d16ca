use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::IntoParams;

use crate::api::AppState;
use crate::cookies::SessionCookieJar;
use crate::flows::initiation::{FlowDecision, initiate_flow};

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InitiateParams {
    pub request_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/login",
    params(InitiateParams),
    responses(
        (status = 307, description = "Redirect to the next flow step or the relying party"),
        (status = 200, description = "Auto-submitting SAML POST form", content_type = "text/html"),
        (status = 400, description = "Unknown or malformed request ID")
    ),
    tag = "flow"
)]
pub async fn initiate(
    state: Extension<Arc<AppState>>,
    Query(params): Query<InitiateParams>,
    headers: HeaderMap,
) -> Response {
    let Some(request_id) = params.request_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing requestId parameter" })),
        )
            .into_response();
    };

    let mut jar = SessionCookieJar::from_headers(&headers);
    let decision = match initiate_flow(state.client.as_ref(), &mut jar, &state.config, &request_id)
        .await
    {
        Ok(decision) => decision,
        Err(err) => {
            error!("flow initiation failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not initiate flow" })),
            )
                .into_response();
        }
    };

    let mut response = match decision {
        FlowDecision::Redirect(url) => Redirect::temporary(&url).into_response(),
        FlowDecision::PostForm {
            url,
            relay_state,
            saml_response,
        } => Html(post_form(&url, &relay_state, &saml_response)).into_response(),
        FlowDecision::Failure { status, message } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "error": message })),
        )
            .into_response(),
    };

    // A login-hint lookup may have added a session; persist the jar either way.
    match jar.to_set_cookie(state.config.cookie_secure()) {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        Err(err) => error!("failed to serialize session cookie: {err}"),
    }
    response
}

/// SAML POST binding: the browser submits the response itself.
fn post_form(url: &str, relay_state: &str, saml_response: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><body onload=\"document.forms[0].submit()\">",
            "<form method=\"post\" action=\"{url}\">",
            "<input type=\"hidden\" name=\"RelayState\" value=\"{relay_state}\"/>",
            "<input type=\"hidden\" name=\"SAMLResponse\" value=\"{saml_response}\"/>",
            "<noscript><button type=\"submit\">Continue</button></noscript>",
            "</form></body></html>"
        ),
        url = escape(url),
        relay_state = escape(relay_state),
        saml_response = escape(saml_response),
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
