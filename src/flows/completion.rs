//! Flow completion.
//!
//! Called once the required factors are verified: either finish the
//! pending OIDC/SAML exchange against the backend, or compute the plain
//! post-login navigation target.

use anyhow::Result;

use crate::cookies::SessionCookieJar;
use crate::error::{FlowError, FlowOutcome};
use crate::flows::context::{FlowContext, RequestId};
use crate::zitadel::IdentityClient;
use crate::zitadel::types::SamlBinding;

/// Identifiers available at the end of an authentication flow.
#[derive(Clone, Debug, Default)]
pub struct FinishFlowCommand {
    pub session_id: Option<String>,
    pub login_name: Option<String>,
    pub request_id: Option<String>,
    pub organization: Option<String>,
}

/// Completes a pending protocol exchange when the command names one,
/// otherwise returns the navigation URL after sign-in.
///
/// # Errors
/// Returns an error when the backend exchange fails.
pub async fn complete_flow_or_get_url(
    client: &dyn IdentityClient,
    jar: &SessionCookieJar,
    command: &FinishFlowCommand,
    default_redirect_uri: Option<&str>,
) -> Result<FlowOutcome> {
    if let (Some(session_id), Some(raw_request_id)) = (&command.session_id, &command.request_id) {
        match RequestId::parse(raw_request_id) {
            Some(request_id) => {
                return complete_protocol_flow(client, jar, session_id, &request_id).await;
            }
            None => return Ok(FlowOutcome::error(FlowError::InvalidRequestId)),
        }
    }

    if let Some(default_redirect_uri) = default_redirect_uri {
        return Ok(FlowOutcome::redirect(default_redirect_uri));
    }

    let ctx = FlowContext::new(command.organization.clone(), command.request_id.clone());
    let mut params: Vec<(&str, &str)> = Vec::new();
    if let Some(login_name) = &command.login_name {
        params.push(("loginName", login_name));
    }
    if let Some(session_id) = &command.session_id {
        params.push(("sessionId", session_id));
    }
    Ok(FlowOutcome::redirect(ctx.url("/account", &params)))
}

async fn complete_protocol_flow(
    client: &dyn IdentityClient,
    jar: &SessionCookieJar,
    session_id: &str,
    request_id: &RequestId,
) -> Result<FlowOutcome> {
    // The backend call needs the session token, which lives only in the
    // browser cookie. Without it the flow cannot be finished.
    let Some(cookie) = jar.find_by_id(session_id) else {
        return Ok(FlowOutcome::error(FlowError::NavigationFailed));
    };

    match request_id {
        RequestId::Oidc(raw_id) => {
            let callback_url = client
                .create_oidc_callback(raw_id, &cookie.id, &cookie.token)
                .await?;
            Ok(FlowOutcome::redirect(callback_url))
        }
        RequestId::Saml(raw_id) => {
            let binding = client
                .create_saml_response(raw_id, &cookie.id, &cookie.token)
                .await?;
            let url = match binding {
                SamlBinding::Redirect { url } | SamlBinding::Post { url, .. } => url,
            };
            Ok(FlowOutcome::redirect(url))
        }
    }
}
