use axum::{extract::Extension, http::HeaderMap, response::Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::handlers::respond;
use crate::cookies::SessionCookieJar;
use crate::error::{FlowError, FlowOutcome};
use crate::flows::completion::{FinishFlowCommand, complete_flow_or_get_url};

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinishFlowRequest {
    pub session_id: Option<String>,
    pub login_name: Option<String>,
    pub request_id: Option<String>,
    pub organization: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/flow",
    request_body = FinishFlowRequest,
    responses(
        (status = 200, description = "Callback URL of the relying party, or the post-login page")
    ),
    tag = "flow"
)]
pub async fn finish(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<FinishFlowRequest>,
) -> Response {
    let jar = SessionCookieJar::from_headers(&headers);
    let command = FinishFlowCommand {
        session_id: request.session_id,
        login_name: request.login_name,
        request_id: request.request_id,
        organization: request.organization.clone(),
    };

    let organization = request
        .organization
        .or_else(|| state.config.default_organization.clone());
    // The default redirect URI lives in the login policy; losing it only
    // costs the fallback, not the completion itself.
    let default_redirect_uri = match state.client.login_settings(organization.as_deref()).await {
        Ok(settings) => settings.and_then(|settings| settings.default_redirect_uri),
        Err(err) => {
            error!("could not load login settings for flow completion: {err}");
            None
        }
    };

    let outcome = match complete_flow_or_get_url(
        state.client.as_ref(),
        &jar,
        &command,
        default_redirect_uri.as_deref(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("flow completion failed: {err}");
            FlowOutcome::error(FlowError::NavigationFailed)
        }
    };

    respond(&state.config, &jar, &outcome)
}
