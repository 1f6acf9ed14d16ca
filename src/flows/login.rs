//! Combined username + password login.
//!
//! Single-step login used when the password page posts both fields.
//! Every failure, from validation to backend errors, collapses into the
//! same generic credentials error so the response never reveals whether
//! an account exists.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::cookies::{SessionCookie, SessionCookieJar};
use crate::error::{FlowError, FlowOutcome};
use crate::flows::completion::{FinishFlowCommand, complete_flow_or_get_url};
use crate::flows::context::FlowContext;
use crate::flows::{factors, mfa};
use crate::zitadel::IdentityClient;
use crate::zitadel::types::{SessionChecks, UserState};

#[derive(Clone, Debug)]
pub struct SubmitLoginCommand {
    pub username: String,
    pub password: String,
    pub request_id: Option<String>,
    pub organization: Option<String>,
}

const MAX_CREDENTIAL_LEN: usize = 200;

fn valid_credentials(command: &SubmitLoginCommand) -> bool {
    !command.username.trim().is_empty()
        && !command.password.is_empty()
        && command.username.len() <= MAX_CREDENTIAL_LEN
        && command.password.len() <= MAX_CREDENTIAL_LEN
}

/// Runs the whole login step: credential check, session cookie update,
/// email-verification gate, MFA resolution and flow completion.
///
/// Unlike the routing engine this function is total: backend failures
/// are logged and coalesced instead of propagated, because this is the
/// one surface where errors must not distinguish causes.
pub async fn submit_login(
    client: &dyn IdentityClient,
    jar: &mut SessionCookieJar,
    config: &AppConfig,
    command: &SubmitLoginCommand,
) -> FlowOutcome {
    let invalid = FlowOutcome::error(FlowError::InvalidCredentials);

    if !valid_credentials(command) {
        warn!("server side validation failed for username and password");
        return invalid;
    }

    let organization = command
        .organization
        .clone()
        .or_else(|| config.default_organization.clone());

    let settings = match client.login_settings(organization.as_deref()).await {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            error!("could not load login settings");
            return invalid;
        }
        Err(err) => {
            error!("could not load login settings: {err}");
            return invalid;
        }
    };

    let checks = SessionChecks::for_login_name(&command.username)
        .with_password(&command.password);
    let created = match client
        .create_session(checks, Some(config.session_lifetime_seconds))
        .await
    {
        Ok(created) => created,
        Err(err) => {
            info!("authentication failed, returning generic error: {err}");
            return invalid;
        }
    };

    let Some(user_factor) = created.session.factors.user.clone() else {
        error!("session created but no user attached");
        return invalid;
    };
    jar.upsert(SessionCookie {
        id: created.session.id.clone(),
        token: created.session_token.clone(),
        login_name: user_factor.login_name.clone(),
        organization: user_factor.organization_id.clone(),
        creation_date: Utc::now(),
        change_date: created.session.change_date.unwrap_or_else(Utc::now),
        expiration_date: created.session.expiration_date,
    });

    let user = match client.user_by_id(&user_factor.id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            error!("user not found after successful authentication");
            return invalid;
        }
        Err(err) => {
            error!("user lookup failed after authentication: {err}");
            return invalid;
        }
    };
    if user.state == UserState::Initial {
        error!("user in initial state is not supported");
        return invalid;
    }

    let ctx = FlowContext::new(
        organization.clone().or(user_factor.organization_id.clone()),
        command.request_id.clone(),
    );

    let email_verified = user
        .human
        .as_ref()
        .and_then(|human| human.email.as_ref())
        .is_some_and(|email| email.is_verified);
    if config.require_email_verification && !email_verified {
        // Old codes are not expected to still be valid, so the page
        // requests a fresh one.
        return FlowOutcome::redirect(ctx.url(
            "/verify",
            &[("loginName", user_factor.login_name.as_str()), ("send", "true")],
        ));
    }

    let methods = match client.authentication_method_types(&user_factor.id).await {
        Ok(methods) => methods,
        Err(err) => {
            error!("could not list authentication methods: {err}");
            return invalid;
        }
    };
    if methods.is_empty() {
        error!("no authentication methods found for user");
        return invalid;
    }

    let summary = factors::evaluate(Some(&created.session));
    if let Some(redirect) =
        mfa::check_mfa_factors(&created.session, &user, &settings, &methods, &summary, &ctx)
    {
        return FlowOutcome::redirect(redirect);
    }

    info!("login successful");
    let finish = FinishFlowCommand {
        session_id: Some(created.session.id.clone()),
        login_name: Some(user_factor.login_name.clone()),
        request_id: command.request_id.clone(),
        organization,
    };
    match complete_flow_or_get_url(
        client,
        jar,
        &finish,
        settings.default_redirect_uri.as_deref(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("flow completion failed: {err}");
            invalid
        }
    }
}
