//! Client for the identity-provider backend.
//!
//! All flow decisions go through the [`IdentityClient`] trait so tests can
//! substitute an in-memory fake. The production implementation talks to the
//! ZITADEL v2 REST API with a service-user token.

pub mod types;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::{Instrument, info_span};
use url::Url;

use types::{
    AuthRequest, AuthenticationMethodType, CreatedSession, IdentityProvider, IdpLink,
    LoginSettings, Organization, SamlBinding, SamlRequest, Session, SessionChecks, User,
    UserSearch,
};

/// Backend rejection with the status and message it came with. Carried
/// inside `anyhow::Error` so callers can downcast when they need to branch
/// on a specific backend error code.
#[derive(Clone, Debug)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identity API error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// True when the error is the backend's "user is not active" rejection.
#[must_use]
pub fn is_user_not_active(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(|api| api.message.contains("Errors.User.NotActive"))
}

/// Everything the flow engine needs from the identity backend.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Login policy for the organization, or the instance default when
    /// `organization` is `None`. `Ok(None)` means no policy exists at all.
    async fn login_settings(&self, organization: Option<&str>) -> Result<Option<LoginSettings>>;

    async fn search_users(&self, login_name: &str, organization: Option<&str>)
    -> Result<Vec<User>>;

    async fn user_by_id(&self, user_id: &str) -> Result<Option<User>>;

    async fn authentication_method_types(
        &self,
        user_id: &str,
    ) -> Result<Vec<AuthenticationMethodType>>;

    async fn idp_links(&self, user_id: &str) -> Result<Vec<IdpLink>>;

    async fn idp_by_id(&self, idp_id: &str) -> Result<Option<IdentityProvider>>;

    /// IDPs activated on the organization's login policy.
    async fn active_identity_providers(
        &self,
        organization: Option<&str>,
    ) -> Result<Vec<IdentityProvider>>;

    async fn orgs_by_domain(&self, domain: &str) -> Result<Vec<Organization>>;

    /// Starts an external IDP flow and returns the provider's auth URL.
    async fn start_identity_provider_flow(
        &self,
        idp_id: &str,
        success_url: &str,
        failure_url: &str,
    ) -> Result<Option<String>>;

    async fn create_session(
        &self,
        checks: SessionChecks,
        lifetime_seconds: Option<u64>,
    ) -> Result<CreatedSession>;

    async fn session(&self, session_id: &str, session_token: &str) -> Result<Option<Session>>;

    async fn delete_session(&self, session_id: &str, session_token: &str) -> Result<()>;

    async fn auth_request(&self, auth_request_id: &str) -> Result<Option<AuthRequest>>;

    async fn saml_request(&self, saml_request_id: &str) -> Result<Option<SamlRequest>>;

    /// Finishes an OIDC flow, returning the relying party's callback URL.
    async fn create_oidc_callback(
        &self,
        auth_request_id: &str,
        session_id: &str,
        session_token: &str,
    ) -> Result<String>;

    /// Finishes a SAML flow, returning the response binding to execute.
    async fn create_saml_response(
        &self,
        saml_request_id: &str,
        session_id: &str,
        session_token: &str,
    ) -> Result<SamlBinding>;

    async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
        current_password: Option<&str>,
    ) -> Result<()>;
}

/// REST client for the ZITADEL v2 API.
pub struct ZitadelClient {
    client: Client,
    base_url: Url,
    token: SecretString,
}

#[derive(Deserialize)]
struct SettingsEnvelope {
    settings: Option<LoginSettings>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultEnvelope<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthMethodsEnvelope {
    #[serde(default)]
    auth_method_types: Vec<AuthenticationMethodType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpEnvelope {
    idp: Option<IdentityProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveIdpsEnvelope {
    #[serde(default)]
    identity_providers: Vec<IdentityProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpIntentEnvelope {
    auth_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionEnvelope {
    session_id: String,
    session_token: String,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    session: Option<Session>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEnvelope {
    user: Option<User>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequestEnvelope {
    auth_request: Option<AuthRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SamlRequestEnvelope {
    saml_request: Option<SamlRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackEnvelope {
    callback_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SamlResponseEnvelope {
    url: String,
    binding: Option<SamlPostBinding>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SamlPostBinding {
    relay_state: String,
    saml_response: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
}

impl ZitadelClient {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()?;
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| anyhow!("invalid API path {path}: {err}"))
    }

    async fn get(&self, span_name: &'static str, path: &str) -> Result<Option<reqwest::Response>> {
        let url = self.endpoint(path)?;
        let span = info_span!("zitadel.api", operation = span_name, http.method = "GET", url = %url);
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .instrument(span)
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response).await?))
    }

    async fn post(
        &self,
        span_name: &'static str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        let span = info_span!("zitadel.api", operation = span_name, http.method = "POST", url = %url);
        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .json(body)
            .send()
            .instrument(span)
            .await?;
        Self::check(response).await
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or(body);
        Err(ApiError {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

#[async_trait]
impl IdentityClient for ZitadelClient {
    async fn login_settings(&self, organization: Option<&str>) -> Result<Option<LoginSettings>> {
        let path = match organization {
            Some(org) => format!("v2/settings/login?ctx.orgId={org}"),
            None => "v2/settings/login".to_string(),
        };
        match self.get("settings.login", &path).await? {
            Some(response) => {
                let envelope: SettingsEnvelope = response.json().await?;
                Ok(envelope.settings)
            }
            None => Ok(None),
        }
    }

    async fn search_users(
        &self,
        login_name: &str,
        organization: Option<&str>,
    ) -> Result<Vec<User>> {
        let mut queries = vec![json!({
            "loginNameQuery": { "loginName": login_name, "method": "TEXT_QUERY_METHOD_EQUALS" }
        })];
        if let Some(org) = organization {
            queries.push(json!({ "organizationIdQuery": { "organizationId": org } }));
        }
        let body = json!({ "queries": queries });
        let response = self.post("users.search", "v2/users", &body).await?;
        let envelope: ResultEnvelope<User> = response.json().await?;
        Ok(envelope.result)
    }

    async fn user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        match self.get("users.get", &format!("v2/users/{user_id}")).await? {
            Some(response) => {
                let envelope: UserEnvelope = response.json().await?;
                Ok(envelope.user)
            }
            None => Ok(None),
        }
    }

    async fn authentication_method_types(
        &self,
        user_id: &str,
    ) -> Result<Vec<AuthenticationMethodType>> {
        let path = format!("v2/users/{user_id}/authentication_methods");
        match self.get("users.authentication_methods", &path).await? {
            Some(response) => {
                let envelope: AuthMethodsEnvelope = response.json().await?;
                Ok(envelope.auth_method_types)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn idp_links(&self, user_id: &str) -> Result<Vec<IdpLink>> {
        let path = format!("v2/users/{user_id}/links/_search");
        let response = self.post("users.idp_links", &path, &json!({})).await?;
        let envelope: ResultEnvelope<IdpLink> = response.json().await?;
        Ok(envelope.result)
    }

    async fn idp_by_id(&self, idp_id: &str) -> Result<Option<IdentityProvider>> {
        match self.get("idps.get", &format!("v2/idps/{idp_id}")).await? {
            Some(response) => {
                let envelope: IdpEnvelope = response.json().await?;
                Ok(envelope.idp)
            }
            None => Ok(None),
        }
    }

    async fn active_identity_providers(
        &self,
        organization: Option<&str>,
    ) -> Result<Vec<IdentityProvider>> {
        let path = match organization {
            Some(org) => format!("v2/settings/login/idps?ctx.orgId={org}"),
            None => "v2/settings/login/idps".to_string(),
        };
        match self.get("settings.login_idps", &path).await? {
            Some(response) => {
                let envelope: ActiveIdpsEnvelope = response.json().await?;
                Ok(envelope.identity_providers)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn orgs_by_domain(&self, domain: &str) -> Result<Vec<Organization>> {
        let body = json!({
            "queries": [{ "domainQuery": { "domain": domain, "method": "TEXT_QUERY_METHOD_EQUALS" } }]
        });
        let response = self
            .post("organizations.search", "v2/organizations/_search", &body)
            .await?;
        let envelope: ResultEnvelope<Organization> = response.json().await?;
        Ok(envelope.result)
    }

    async fn start_identity_provider_flow(
        &self,
        idp_id: &str,
        success_url: &str,
        failure_url: &str,
    ) -> Result<Option<String>> {
        let body = json!({
            "idpId": idp_id,
            "urls": { "successUrl": success_url, "failureUrl": failure_url }
        });
        let response = self.post("idp_intents.start", "v2/idp_intents", &body).await?;
        let envelope: IdpIntentEnvelope = response.json().await?;
        Ok(envelope.auth_url)
    }

    async fn create_session(
        &self,
        checks: SessionChecks,
        lifetime_seconds: Option<u64>,
    ) -> Result<CreatedSession> {
        let user = match &checks.user {
            UserSearch::UserId(id) => json!({ "userId": id }),
            UserSearch::LoginName(name) => json!({ "loginName": name }),
        };
        let mut check_body = json!({ "user": user });
        if let Some(password) = &checks.password {
            check_body["password"] = json!({ "password": password });
        }
        let mut body = json!({ "checks": check_body });
        if let Some(lifetime) = lifetime_seconds {
            body["lifetime"] = json!(format!("{lifetime}s"));
        }

        let response = self.post("sessions.create", "v2/sessions", &body).await?;
        let created: CreateSessionEnvelope = response.json().await?;
        let session = self
            .session(&created.session_id, &created.session_token)
            .await?
            .ok_or_else(|| anyhow!("created session {} not found", created.session_id))?;
        Ok(CreatedSession {
            session,
            session_token: created.session_token,
        })
    }

    async fn session(&self, session_id: &str, session_token: &str) -> Result<Option<Session>> {
        let path = format!("v2/sessions/{session_id}?sessionToken={session_token}");
        match self.get("sessions.get", &path).await? {
            Some(response) => {
                let envelope: SessionEnvelope = response.json().await?;
                Ok(envelope.session)
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, session_id: &str, session_token: &str) -> Result<()> {
        let url = self.endpoint(&format!("v2/sessions/{session_id}"))?;
        let span = info_span!("zitadel.api", operation = "sessions.delete", http.method = "DELETE", url = %url);
        let response = self
            .client
            .delete(url)
            .bearer_auth(self.token.expose_secret())
            .json(&json!({ "sessionToken": session_token }))
            .send()
            .instrument(span)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn auth_request(&self, auth_request_id: &str) -> Result<Option<AuthRequest>> {
        let path = format!("v2/oidc/auth_requests/{auth_request_id}");
        match self.get("oidc.auth_request", &path).await? {
            Some(response) => {
                let envelope: AuthRequestEnvelope = response.json().await?;
                Ok(envelope.auth_request)
            }
            None => Ok(None),
        }
    }

    async fn saml_request(&self, saml_request_id: &str) -> Result<Option<SamlRequest>> {
        let path = format!("v2/saml/saml_requests/{saml_request_id}");
        match self.get("saml.request", &path).await? {
            Some(response) => {
                let envelope: SamlRequestEnvelope = response.json().await?;
                Ok(envelope.saml_request)
            }
            None => Ok(None),
        }
    }

    async fn create_oidc_callback(
        &self,
        auth_request_id: &str,
        session_id: &str,
        session_token: &str,
    ) -> Result<String> {
        let body = json!({
            "session": { "sessionId": session_id, "sessionToken": session_token }
        });
        let path = format!("v2/oidc/auth_requests/{auth_request_id}");
        let response = self.post("oidc.callback", &path, &body).await?;
        let envelope: CallbackEnvelope = response.json().await?;
        Ok(envelope.callback_url)
    }

    async fn create_saml_response(
        &self,
        saml_request_id: &str,
        session_id: &str,
        session_token: &str,
    ) -> Result<SamlBinding> {
        let body = json!({
            "session": { "sessionId": session_id, "sessionToken": session_token }
        });
        let path = format!("v2/saml/saml_requests/{saml_request_id}");
        let response = self.post("saml.response", &path, &body).await?;
        let envelope: SamlResponseEnvelope = response.json().await?;
        match envelope.binding {
            Some(post) => Ok(SamlBinding::Post {
                url: envelope.url,
                relay_state: post.relay_state,
                saml_response: post.saml_response,
            }),
            None => Ok(SamlBinding::Redirect { url: envelope.url }),
        }
    }

    async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
        current_password: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "newPassword": { "password": new_password } });
        if let Some(current) = current_password {
            body["currentPassword"] = json!(current);
        }
        let path = format!("v2/users/{user_id}/password");
        self.post("users.set_password", &path, &body).await?;
        Ok(())
    }
}
