use axum::{extract::Extension, http::HeaderMap, response::Response};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::handlers::respond;
use crate::cookies::SessionCookieJar;
use crate::flows::login::{SubmitLoginCommand, submit_login};

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub request_id: Option<String>,
    pub organization: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Redirect to the next step, or the generic credentials error")
    ),
    tag = "flow"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LoginRequest>,
) -> Response {
    let mut jar = SessionCookieJar::from_headers(&headers);
    let command = SubmitLoginCommand {
        username: request.username,
        password: request.password,
        request_id: request.request_id,
        organization: request.organization,
    };

    // submit_login is total; every failure already coalesces inside.
    let outcome = submit_login(state.client.as_ref(), &mut jar, &state.config, &command).await;
    respond(&state.config, &jar, &outcome)
}
