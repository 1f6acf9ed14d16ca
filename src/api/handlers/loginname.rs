use axum::{extract::Extension, http::HeaderMap, response::Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::handlers::respond;
use crate::cookies::SessionCookieJar;
use crate::error::{FlowError, FlowOutcome};
use crate::flows::loginname::{SendLoginnameCommand, send_loginname};

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginNameRequest {
    pub login_name: String,
    pub organization: Option<String>,
    pub request_id: Option<String>,
    pub suffix: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/loginname",
    request_body = LoginNameRequest,
    responses(
        (status = 200, description = "Next flow step, or a typed policy error")
    ),
    tag = "flow"
)]
pub async fn loginname(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LoginNameRequest>,
) -> Response {
    let mut jar = SessionCookieJar::from_headers(&headers);
    let command = SendLoginnameCommand {
        login_name: request.login_name,
        organization: request.organization,
        request_id: request.request_id,
        suffix: request.suffix,
    };

    let outcome = match send_loginname(state.client.as_ref(), &mut jar, &state.config, &command).await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            // Transport failures must not reveal more than a policy error.
            error!("login name routing failed: {err}");
            FlowOutcome::error(FlowError::CouldNotSearchUsers)
        }
    };

    respond(&state.config, &jar, &outcome)
}
