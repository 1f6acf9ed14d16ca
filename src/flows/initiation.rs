//! OIDC and SAML flow initiation.
//!
//! Entry point for `/login?requestId=...`: resumes a pending protocol
//! request against whatever sessions the browser already holds, honoring
//! the OIDC prompt semantics.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::cookies::SessionCookieJar;
use crate::flows::context::{FlowContext, RequestId};
use crate::flows::loginname::{SendLoginnameCommand, send_loginname};
use crate::flows::session::{SessionHint, find_valid_session, load_sessions};
use crate::zitadel::IdentityClient;
use crate::zitadel::types::{AuthRequest, IdentityProviderType, Prompt, SamlBinding, Session};

fn org_scope_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"urn:zitadel:iam:org:id:([0-9]+)").unwrap())
}

fn org_domain_scope_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"urn:zitadel:iam:org:domain:primary:(.+)").unwrap())
}

fn idp_scope_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"urn:zitadel:iam:org:idp:id:(.+)").unwrap())
}

/// Navigation decision produced by flow initiation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlowDecision {
    Redirect(String),
    /// Auto-submitting SAML POST form.
    PostForm {
        url: String,
        relay_state: String,
        saml_response: String,
    },
    Failure {
        status: u16,
        message: &'static str,
    },
}

/// Resumes the pending request named by `raw_request_id`.
///
/// # Errors
/// Returns an error when a backend call fails outside the branches that
/// deliberately fall back to interactive login.
pub async fn initiate_flow(
    client: &dyn IdentityClient,
    jar: &mut SessionCookieJar,
    config: &AppConfig,
    raw_request_id: &str,
) -> Result<FlowDecision> {
    let Some(request_id) = RequestId::parse(raw_request_id) else {
        return Ok(FlowDecision::Failure {
            status: 400,
            message: "Invalid request ID format",
        });
    };

    let sessions = load_sessions(client, jar).await;

    match &request_id {
        RequestId::Oidc(id) => initiate_oidc(client, jar, config, &request_id, id, sessions).await,
        RequestId::Saml(id) => initiate_saml(client, jar, config, &request_id, id, sessions).await,
    }
}

async fn initiate_oidc(
    client: &dyn IdentityClient,
    jar: &mut SessionCookieJar,
    config: &AppConfig,
    request_id: &RequestId,
    raw_id: &str,
    sessions: Vec<Session>,
) -> Result<FlowDecision> {
    let auth_request = client.auth_request(raw_id).await?;
    let request_param = request_id.as_param();
    let login = FlowDecision::Redirect(
        FlowContext::new(None, Some(request_param.clone())).url("/", &[]),
    );

    let Some(auth_request) = auth_request else {
        return Ok(login);
    };

    let organization = extract_organization(client, &auth_request).await?;
    let ctx = FlowContext::new(organization.clone(), Some(request_param.clone()));

    if let Some(decision) =
        idp_scope_redirect(client, config, &auth_request, &ctx, organization.as_deref()).await?
    {
        return Ok(decision);
    }

    if auth_request.prompt.contains(&Prompt::Create) {
        return Ok(FlowDecision::Redirect(ctx.url("/register", &[])));
    }

    if sessions.is_empty() {
        return Ok(login);
    }

    let hint = session_hint(&auth_request);

    if auth_request.prompt.contains(&Prompt::SelectAccount) {
        let selected = find_valid_session(
            client,
            sessions,
            hint.as_ref(),
            config.require_email_verification,
        )
        .await;
        return Ok(match selected {
            Some(_) => FlowDecision::Redirect(ctx.url("/account", &[])),
            None => login,
        });
    }

    if auth_request.prompt.contains(&Prompt::Login) {
        // Forced re-authentication. A login hint lets the routing
        // engine pick the right first step; failures there fall back to
        // the plain login page.
        if let Some(login_hint) = &auth_request.login_hint {
            let mut command = SendLoginnameCommand::new(login_hint.clone())
                .with_request_id(request_param.clone());
            if let Some(org) = &organization {
                command = command.with_organization(org.clone());
            }
            match send_loginname(client, jar, config, &command).await {
                Ok(outcome) => {
                    if let Some(redirect) = outcome.as_redirect() {
                        return Ok(FlowDecision::Redirect(redirect.to_string()));
                    }
                }
                Err(err) => error!("login hint routing failed: {err}"),
            }
        }
        return Ok(login);
    }

    if auth_request.prompt.contains(&Prompt::None) {
        // prompt=none forbids interaction; either complete silently or
        // report that interaction would be required.
        let no_session = FlowDecision::Failure {
            status: 400,
            message: "No active session found",
        };
        let Some(selected) = find_valid_session(
            client,
            sessions,
            hint.as_ref(),
            config.require_email_verification,
        )
        .await
        else {
            return Ok(no_session);
        };
        let Some(cookie) = jar.find_by_id(&selected.id) else {
            return Ok(no_session);
        };
        let callback_url = client
            .create_oidc_callback(raw_id, &cookie.id, &cookie.token)
            .await?;
        return Ok(FlowDecision::Redirect(callback_url));
    }

    // No special prompt: silently continue with the freshest valid
    // session when the callback succeeds, otherwise log in interactively.
    let Some(selected) = find_valid_session(
        client,
        sessions,
        hint.as_ref(),
        config.require_email_verification,
    )
    .await
    else {
        return Ok(login);
    };
    let Some(cookie) = jar.find_by_id(&selected.id) else {
        return Ok(login);
    };
    match client
        .create_oidc_callback(raw_id, &cookie.id, &cookie.token)
        .await
    {
        Ok(callback_url) => Ok(FlowDecision::Redirect(callback_url)),
        Err(err) => {
            warn!("could not create callback, sending user to login: {err}");
            Ok(login)
        }
    }
}

async fn initiate_saml(
    client: &dyn IdentityClient,
    jar: &SessionCookieJar,
    config: &AppConfig,
    request_id: &RequestId,
    raw_id: &str,
    sessions: Vec<Session>,
) -> Result<FlowDecision> {
    let request_param = request_id.as_param();
    let ctx = FlowContext::new(None, Some(request_param));

    if client.saml_request(raw_id).await?.is_none() {
        return Ok(FlowDecision::Failure {
            status: 400,
            message: "No samlRequest found",
        });
    }

    if sessions.is_empty() {
        return Ok(FlowDecision::Redirect(ctx.url("/", &[])));
    }

    let accounts = FlowDecision::Redirect(ctx.url("/account", &[]));
    let Some(selected) =
        find_valid_session(client, sessions, None, config.require_email_verification).await
    else {
        return Ok(accounts);
    };
    let Some(cookie) = jar.find_by_id(&selected.id) else {
        return Ok(accounts);
    };

    match client
        .create_saml_response(raw_id, &cookie.id, &cookie.token)
        .await
    {
        Ok(SamlBinding::Redirect { url }) => Ok(FlowDecision::Redirect(url)),
        Ok(SamlBinding::Post {
            url,
            relay_state,
            saml_response,
        }) => Ok(FlowDecision::PostForm {
            url,
            relay_state,
            saml_response,
        }),
        Err(err) => {
            error!("SAML response creation failed: {err}");
            Ok(accounts)
        }
    }
}

/// Organization scope extraction: an explicit org-id scope wins; a
/// primary-domain scope is resolved through the backend and only used
/// when exactly one organization matches.
async fn extract_organization(
    client: &dyn IdentityClient,
    auth_request: &AuthRequest,
) -> Result<Option<String>> {
    for scope in &auth_request.scope {
        if let Some(captures) = org_scope_regex().captures(scope) {
            return Ok(captures.get(1).map(|m| m.as_str().to_string()));
        }
    }
    for scope in &auth_request.scope {
        if let Some(captures) = org_domain_scope_regex().captures(scope) {
            let Some(domain) = captures.get(1).map(|m| m.as_str()) else {
                continue;
            };
            let orgs = client.orgs_by_domain(domain).await?;
            if let [org] = orgs.as_slice() {
                return Ok(Some(org.id.clone()));
            }
            return Ok(None);
        }
    }
    Ok(None)
}

/// When the scope pins an IDP, start its flow directly, skipping the
/// login page entirely. LDAP has no external auth URL and gets its own
/// credential page instead.
async fn idp_scope_redirect(
    client: &dyn IdentityClient,
    config: &AppConfig,
    auth_request: &AuthRequest,
    ctx: &FlowContext,
    organization: Option<&str>,
) -> Result<Option<FlowDecision>> {
    let idp_id = auth_request.scope.iter().find_map(|scope| {
        idp_scope_regex()
            .captures(scope)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    });
    let Some(idp_id) = idp_id else {
        return Ok(None);
    };

    let providers = client.active_identity_providers(organization).await?;
    let Some(idp) = providers.iter().find(|idp| idp.id == idp_id) else {
        return Ok(None);
    };

    if idp.idp_type == IdentityProviderType::Ldap {
        return Ok(Some(FlowDecision::Redirect(ctx.url("/ldap", &[]))));
    }

    let slug = idp.idp_type.slug();
    let origin = &config.ui_origin;
    let success_url = format!("{origin}{}", ctx.url(&format!("/idp/{slug}/process"), &[]));
    let failure_url = format!("{origin}{}", ctx.url(&format!("/idp/{slug}/failure"), &[]));
    let url = client
        .start_identity_provider_flow(&idp_id, &success_url, &failure_url)
        .await?;
    let Some(mut url) = url else {
        return Ok(Some(FlowDecision::Failure {
            status: 500,
            message: "Could not start IDP flow",
        }));
    };
    if url.starts_with('/') {
        url = format!("{origin}{url}");
    }
    Ok(Some(FlowDecision::Redirect(url)))
}

fn session_hint(auth_request: &AuthRequest) -> Option<SessionHint> {
    if let Some(user_id) = &auth_request.hint_user_id {
        return Some(SessionHint::UserId(user_id.clone()));
    }
    auth_request
        .login_hint
        .as_ref()
        .map(|login_hint| SessionHint::LoginName(login_hint.clone()))
}
