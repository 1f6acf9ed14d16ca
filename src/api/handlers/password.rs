use axum::{extract::Extension, http::HeaderMap, response::Response};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::handlers::respond;
use crate::cookies::SessionCookieJar;
use crate::flows::password::{ChangePasswordCommand, change_password};

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub login_name: String,
    pub new_password: String,
    pub current_password: Option<String>,
    pub organization: Option<String>,
    pub request_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/password/change",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Redirect onward, or the generic credentials error")
    ),
    tag = "flow"
)]
pub async fn change(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ChangePasswordRequest>,
) -> Response {
    let jar = SessionCookieJar::from_headers(&headers);
    let command = ChangePasswordCommand {
        login_name: request.login_name,
        new_password: request.new_password,
        current_password: request.current_password,
        organization: request.organization,
        request_id: request.request_id,
    };

    let outcome = change_password(state.client.as_ref(), &jar, &state.config, &command).await;
    respond(&state.config, &jar, &outcome)
}
