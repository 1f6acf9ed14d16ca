//! Login-name routing.
//!
//! Takes the identifier a user typed on the start page and decides the
//! next step: password entry, passkey, an external IDP redirect,
//! registration, or a typed policy error. Ambiguity never guesses; the
//! decision tree prefers passkeys, then IDPs, then passwords.

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::config::AppConfig;
use crate::cookies::{SessionCookie, SessionCookieJar};
use crate::error::{FlowError, FlowOutcome};
use crate::flows::context::FlowContext;
use crate::zitadel::types::{
    AuthenticationMethodType, LoginSettings, PasskeysType, SessionChecks, User, UserState,
};
use crate::zitadel::{IdentityClient, is_user_not_active};

/// Input from the start-page form.
#[derive(Clone, Debug)]
pub struct SendLoginnameCommand {
    pub login_name: String,
    pub organization: Option<String>,
    pub request_id: Option<String>,
    /// Organization domain appended to bare usernames.
    pub suffix: Option<String>,
}

impl SendLoginnameCommand {
    #[must_use]
    pub fn new(login_name: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            organization: None,
            request_id: None,
            suffix: None,
        }
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Routes a login name to its next flow step.
///
/// Policy outcomes come back as [`FlowOutcome`] values; `Err` is reserved
/// for transport and backend failures, which the API layer coalesces
/// into a generic message.
///
/// # Errors
/// Returns an error when a backend call fails.
pub async fn send_loginname(
    client: &dyn IdentityClient,
    jar: &mut SessionCookieJar,
    config: &AppConfig,
    command: &SendLoginnameCommand,
) -> Result<FlowOutcome> {
    let organization = command
        .organization
        .clone()
        .or_else(|| config.default_organization.clone());

    let Some(settings) = client.login_settings(organization.as_deref()).await? else {
        return Ok(FlowOutcome::error(FlowError::CouldNotGetLoginSettings));
    };

    let search_value = match &command.suffix {
        Some(suffix) => format!("{}@{suffix}", command.login_name),
        None => command.login_name.clone(),
    };

    let matches = client
        .search_users(&search_value, organization.as_deref())
        .await?;
    // Per-credential channel policy: a disabled channel removes only the
    // users matched through that channel, never the whole result.
    let matches: Vec<&User> = matches
        .iter()
        .filter(|user| channel_eligible(user, &search_value, &settings))
        .collect();

    let ctx = FlowContext::new(organization.clone(), command.request_id.clone());

    match matches.as_slice() {
        [] => user_not_found(client, config, &settings, organization, ctx, &search_value).await,
        [user] => {
            user_found(client, jar, config, &settings, ctx, &search_value, user).await
        }
        _ => Ok(FlowOutcome::error(FlowError::MoreThanOneUserFound)),
    }
}

/// A user is eligible when the typed identifier matches their login
/// name, or matches an email/phone whose login channel is enabled.
fn channel_eligible(user: &User, search_value: &str, settings: &LoginSettings) -> bool {
    if user.preferred_login_name.eq_ignore_ascii_case(search_value) {
        return true;
    }
    if user
        .email()
        .is_some_and(|email| email.eq_ignore_ascii_case(search_value))
    {
        return !settings.disable_login_with_email;
    }
    if user.phone() == Some(search_value) {
        return !settings.disable_login_with_phone;
    }
    false
}

async fn user_found(
    client: &dyn IdentityClient,
    jar: &mut SessionCookieJar,
    config: &AppConfig,
    settings: &LoginSettings,
    ctx: FlowContext,
    search_value: &str,
    user: &User,
) -> Result<FlowOutcome> {
    let checks = SessionChecks::for_user_id(&user.user_id);
    let created = match client
        .create_session(checks, Some(config.session_lifetime_seconds))
        .await
    {
        Ok(created) => created,
        Err(err) if is_user_not_active(&err) => {
            return Ok(FlowOutcome::error(FlowError::UserNotActive));
        }
        Err(err) => return Err(err),
    };

    let Some(user_factor) = &created.session.factors.user else {
        return Ok(FlowOutcome::error(FlowError::CouldNotCreateSession));
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

    if user.state == UserState::Initial {
        return Ok(FlowOutcome::error(FlowError::InitialUserNotSupported));
    }

    let methods = client.authentication_method_types(&user.user_id).await?;
    if methods.is_empty() {
        // No method at all: bootstrap the account through email
        // verification with a fresh invite code.
        return Ok(FlowOutcome::redirect(ctx.url(
            "/verify",
            &[("loginName", search_value), ("send", "true"), ("invite", "true")],
        )));
    }

    let has_passkey = methods.contains(&AuthenticationMethodType::Passkey);
    let has_password = methods.contains(&AuthenticationMethodType::Password);
    let has_idp = methods.contains(&AuthenticationMethodType::Idp);
    let passkeys_allowed = settings.passkeys_type == PasskeysType::Allowed;
    let password_allowed = settings.allow_username_password;

    if has_passkey && passkeys_allowed {
        let mut params = vec![("loginName", search_value)];
        if has_password && password_allowed {
            params.push(("altPassword", "true"));
        }
        return Ok(FlowOutcome::redirect(ctx.url("/passkey", &params)));
    }

    if has_idp {
        if let Some(url) = user_idp_redirect(client, &user.user_id, &ctx, config).await? {
            return Ok(FlowOutcome::redirect(url));
        }
    }

    if has_password {
        if password_allowed {
            return Ok(FlowOutcome::redirect(
                ctx.url("/password", &[("loginName", search_value)]),
            ));
        }
        // Password exists but policy forbids it: fall back to an IDP,
        // user-linked first, then the organization's single active one.
        if let Some(url) = user_idp_redirect(client, &user.user_id, &ctx, config).await? {
            return Ok(FlowOutcome::redirect(url));
        }
        let org = user.organization_id.as_deref().or(ctx.organization.as_deref());
        if let Some(url) = org_idp_redirect(client, org, &ctx, config).await? {
            return Ok(FlowOutcome::redirect(url));
        }
        return Ok(FlowOutcome::error(FlowError::UsernamePasswordNotAllowed));
    }

    if has_passkey && !passkeys_allowed {
        return Ok(FlowOutcome::error(FlowError::PasskeysNotAllowed));
    }

    Ok(FlowOutcome::error(FlowError::NoMethodAvailable))
}

async fn user_not_found(
    client: &dyn IdentityClient,
    config: &AppConfig,
    settings: &LoginSettings,
    organization: Option<String>,
    ctx: FlowContext,
    search_value: &str,
) -> Result<FlowOutcome> {
    if settings.ignore_unknown_usernames {
        // Non-enumerating: proceed to password entry as if the account
        // existed.
        return Ok(FlowOutcome::redirect(
            ctx.url("/password", &[("loginName", search_value)]),
        ));
    }

    if !settings.allow_register {
        return Ok(FlowOutcome::error(FlowError::UserNotFound));
    }

    // Domain discovery only applies when the caller supplied no
    // organization. It is used only when exactly one organization owns
    // the domain and explicitly allows discovery; anything ambiguous
    // keeps the context empty instead of guessing.
    let mut ctx = ctx;
    let mut effective = settings.clone();
    if organization.is_none() {
        if let Some((discovered_org, discovered_settings)) =
            discover_organization(client, search_value).await?
        {
            ctx = ctx.with_organization(discovered_org);
            effective = discovered_settings;
        }
    }

    if effective.allow_username_password {
        return Ok(FlowOutcome::redirect(
            ctx.url("/register", &[("email", search_value)]),
        ));
    }

    if let Some(url) = org_idp_redirect(client, ctx.organization.as_deref(), &ctx, config).await? {
        return Ok(FlowOutcome::redirect(url));
    }

    Ok(FlowOutcome::error(FlowError::UserNotFound))
}

async fn discover_organization(
    client: &dyn IdentityClient,
    search_value: &str,
) -> Result<Option<(String, LoginSettings)>> {
    let Some((_, domain)) = search_value.split_once('@') else {
        return Ok(None);
    };
    if domain.is_empty() {
        return Ok(None);
    }
    let orgs = client.orgs_by_domain(domain).await?;
    let [org] = orgs.as_slice() else {
        debug!(domain, matches = orgs.len(), "skipping ambiguous domain discovery");
        return Ok(None);
    };
    let Some(org_settings) = client.login_settings(Some(&org.id)).await? else {
        return Ok(None);
    };
    if !org_settings.allow_domain_discovery {
        return Ok(None);
    }
    Ok(Some((org.id.clone(), org_settings)))
}

async fn user_idp_redirect(
    client: &dyn IdentityClient,
    user_id: &str,
    ctx: &FlowContext,
    config: &AppConfig,
) -> Result<Option<String>> {
    let links = client.idp_links(user_id).await?;
    let Some(link) = links.first() else {
        return Ok(None);
    };
    start_idp_flow(client, &link.idp_id, ctx, config).await
}

async fn org_idp_redirect(
    client: &dyn IdentityClient,
    organization: Option<&str>,
    ctx: &FlowContext,
    config: &AppConfig,
) -> Result<Option<String>> {
    let idps = client.active_identity_providers(organization).await?;
    let [idp] = idps.as_slice() else {
        return Ok(None);
    };
    start_idp_flow(client, &idp.id, ctx, config).await
}

async fn start_idp_flow(
    client: &dyn IdentityClient,
    idp_id: &str,
    ctx: &FlowContext,
    config: &AppConfig,
) -> Result<Option<String>> {
    let slug = client
        .idp_by_id(idp_id)
        .await?
        .map_or("oidc", |idp| idp.idp_type.slug());
    let origin = &config.ui_origin;
    let success_url = format!("{origin}{}", ctx.url(&format!("/idp/{slug}/process"), &[]));
    let failure_url = format!("{origin}{}", ctx.url(&format!("/idp/{slug}/failure"), &[]));
    client
        .start_identity_provider_flow(idp_id, &success_url, &failure_url)
        .await
}
