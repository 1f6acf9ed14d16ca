//! In-memory identity backend for flow tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::zitadel::types::{
    AuthRequest, AuthenticationMethodType, CreatedSession, Email, Factors, HumanUser,
    IdentityProvider, IdpLink, LoginSettings, Organization, Phone, SamlBinding, SamlRequest,
    Session, SessionChecks, SessionFactor, User, UserFactor, UserSearch, UserState,
};
use crate::zitadel::{ApiError, IdentityClient};

pub fn active_user(user_id: &str, email: &str, email_verified: bool) -> User {
    User {
        user_id: user_id.to_string(),
        state: UserState::Active,
        preferred_login_name: email.to_string(),
        organization_id: Some("org123".to_string()),
        human: Some(HumanUser {
            email: Some(Email {
                email: email.to_string(),
                is_verified: email_verified,
            }),
            ..Default::default()
        }),
    }
}

pub fn user_with_phone(user_id: &str, login_name: &str, email: &str, phone: &str) -> User {
    let mut user = active_user(user_id, email, true);
    user.preferred_login_name = login_name.to_string();
    if let Some(human) = &mut user.human {
        human.phone = Some(Phone {
            phone: phone.to_string(),
            is_verified: true,
        });
    }
    user
}

#[derive(Default)]
pub struct FakeIdentity {
    pub default_settings: Option<LoginSettings>,
    pub org_settings: HashMap<String, LoginSettings>,
    pub users: Vec<User>,
    pub methods: HashMap<String, Vec<AuthenticationMethodType>>,
    pub links: HashMap<String, Vec<IdpLink>>,
    pub idps: HashMap<String, IdentityProvider>,
    pub active_idps: Vec<IdentityProvider>,
    pub orgs_by_domain: HashMap<String, Vec<Organization>>,
    pub idp_auth_url: Option<String>,
    pub auth_requests: HashMap<String, AuthRequest>,
    pub saml_requests: HashMap<String, SamlRequest>,
    pub callback_url: Option<String>,
    pub saml_binding: Option<SamlBinding>,
    pub valid_password: Option<String>,
    pub search_fails: bool,
    pub create_session_error: Option<String>,
    pub session_without_user: bool,
    pub sessions: Mutex<HashMap<String, (Session, String)>>,
    pub deleted_sessions: Mutex<Vec<String>>,
    pub password_changes: Mutex<Vec<(String, String)>>,
    pub idp_flow_starts: Mutex<Vec<(String, String, String)>>,
    next_session: AtomicUsize,
}

impl FakeIdentity {
    pub fn with_settings(mut self, settings: LoginSettings) -> Self {
        self.default_settings = Some(settings);
        self
    }

    pub fn with_org_settings(mut self, org: &str, settings: LoginSettings) -> Self {
        self.org_settings.insert(org.to_string(), settings);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_methods(mut self, user_id: &str, methods: Vec<AuthenticationMethodType>) -> Self {
        self.methods.insert(user_id.to_string(), methods);
        self
    }

    pub fn with_link(mut self, user_id: &str, idp_id: &str) -> Self {
        self.links.entry(user_id.to_string()).or_default().push(IdpLink {
            idp_id: idp_id.to_string(),
            user_name: None,
        });
        self
    }

    pub fn with_idp(mut self, idp: IdentityProvider) -> Self {
        self.idps.insert(idp.id.clone(), idp);
        self
    }

    pub fn with_active_idps(mut self, idps: Vec<IdentityProvider>) -> Self {
        self.active_idps = idps;
        self
    }

    pub fn with_org_for_domain(mut self, domain: &str, orgs: Vec<Organization>) -> Self {
        self.orgs_by_domain.insert(domain.to_string(), orgs);
        self
    }

    pub fn with_idp_auth_url(mut self, url: &str) -> Self {
        self.idp_auth_url = Some(url.to_string());
        self
    }

    pub fn with_sessions(self, sessions: Vec<Session>) -> Self {
        {
            let mut map = self.sessions.lock().unwrap();
            for session in sessions {
                let token = format!("token-{}", session.id);
                map.insert(session.id.clone(), (session, token));
            }
        }
        self
    }

    pub fn with_auth_request(mut self, request: AuthRequest) -> Self {
        self.auth_requests.insert(request.id.clone(), request);
        self
    }

    pub fn with_saml_request(mut self, request: SamlRequest) -> Self {
        self.saml_requests.insert(request.id.clone(), request);
        self
    }

    pub fn with_callback_url(mut self, url: &str) -> Self {
        self.callback_url = Some(url.to_string());
        self
    }

    pub fn with_saml_binding(mut self, binding: SamlBinding) -> Self {
        self.saml_binding = Some(binding);
        self
    }

    pub fn with_valid_password(mut self, password: &str) -> Self {
        self.valid_password = Some(password.to_string());
        self
    }

    fn find_user(&self, search: &UserSearch) -> Option<User> {
        match search {
            UserSearch::UserId(user_id) => self
                .users
                .iter()
                .find(|user| &user.user_id == user_id)
                .cloned(),
            UserSearch::LoginName(login_name) => self
                .users
                .iter()
                .find(|user| {
                    user.preferred_login_name.eq_ignore_ascii_case(login_name)
                        || user.email().is_some_and(|email| email.eq_ignore_ascii_case(login_name))
                        || user.phone() == Some(login_name.as_str())
                })
                .cloned(),
        }
    }
}

#[async_trait]
impl IdentityClient for FakeIdentity {
    async fn login_settings(&self, organization: Option<&str>) -> Result<Option<LoginSettings>> {
        match organization {
            Some(org) => Ok(self
                .org_settings
                .get(org)
                .cloned()
                .or_else(|| self.default_settings.clone())),
            None => Ok(self.default_settings.clone()),
        }
    }

    async fn search_users(
        &self,
        login_name: &str,
        organization: Option<&str>,
    ) -> Result<Vec<User>> {
        if self.search_fails {
            return Err(ApiError {
                status: 500,
                message: "search backend unavailable".to_string(),
            }
            .into());
        }
        Ok(self
            .users
            .iter()
            .filter(|user| {
                user.preferred_login_name.eq_ignore_ascii_case(login_name)
                    || user.email().is_some_and(|email| email.eq_ignore_ascii_case(login_name))
                    || user.phone() == Some(login_name)
            })
            .filter(|user| {
                organization.is_none_or(|org| user.organization_id.as_deref() == Some(org))
            })
            .cloned()
            .collect())
    }

    async fn user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.iter().find(|user| user.user_id == user_id).cloned())
    }

    async fn authentication_method_types(
        &self,
        user_id: &str,
    ) -> Result<Vec<AuthenticationMethodType>> {
        Ok(self.methods.get(user_id).cloned().unwrap_or_default())
    }

    async fn idp_links(&self, user_id: &str) -> Result<Vec<IdpLink>> {
        Ok(self.links.get(user_id).cloned().unwrap_or_default())
    }

    async fn idp_by_id(&self, idp_id: &str) -> Result<Option<IdentityProvider>> {
        Ok(self.idps.get(idp_id).cloned())
    }

    async fn active_identity_providers(
        &self,
        _organization: Option<&str>,
    ) -> Result<Vec<IdentityProvider>> {
        Ok(self.active_idps.clone())
    }

    async fn orgs_by_domain(&self, domain: &str) -> Result<Vec<Organization>> {
        Ok(self.orgs_by_domain.get(domain).cloned().unwrap_or_default())
    }

    async fn start_identity_provider_flow(
        &self,
        idp_id: &str,
        success_url: &str,
        failure_url: &str,
    ) -> Result<Option<String>> {
        self.idp_flow_starts.lock().unwrap().push((
            idp_id.to_string(),
            success_url.to_string(),
            failure_url.to_string(),
        ));
        Ok(self.idp_auth_url.clone())
    }

    async fn create_session(
        &self,
        checks: SessionChecks,
        lifetime_seconds: Option<u64>,
    ) -> Result<CreatedSession> {
        if let Some(message) = &self.create_session_error {
            return Err(ApiError {
                status: 400,
                message: message.clone(),
            }
            .into());
        }
        let user = self.find_user(&checks.user).ok_or_else(|| ApiError {
            status: 400,
            message: "Errors.User.NotFound".to_string(),
        })?;
        if let Some(password) = &checks.password {
            if self.valid_password.as_deref() != Some(password.as_str()) {
                return Err(ApiError {
                    status: 400,
                    message: "Errors.User.Password.Invalid".to_string(),
                }
                .into());
            }
        }

        let now = Utc::now();
        let lifetime = lifetime_seconds.unwrap_or(24 * 60 * 60);
        let number = self.next_session.fetch_add(1, Ordering::SeqCst);
        let id = format!("fake-session-{number}");
        let session = Session {
            id: id.clone(),
            factors: Factors {
                user: (!self.session_without_user).then(|| UserFactor {
                    id: user.user_id.clone(),
                    login_name: user.preferred_login_name.clone(),
                    organization_id: user.organization_id.clone(),
                }),
                password: checks
                    .password
                    .is_some()
                    .then(|| SessionFactor::verified_at(now)),
                ..Default::default()
            },
            expiration_date: Some(now + Duration::seconds(i64::try_from(lifetime).unwrap_or(0))),
            change_date: Some(now),
        };
        let token = format!("token-{id}");
        self.sessions
            .lock()
            .unwrap()
            .insert(id, (session.clone(), token.clone()));
        Ok(CreatedSession {
            session,
            session_token: token,
        })
    }

    async fn session(&self, session_id: &str, _session_token: &str) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|(session, _)| session.clone()))
    }

    async fn delete_session(&self, session_id: &str, _session_token: &str) -> Result<()> {
        self.deleted_sessions
            .lock()
            .unwrap()
            .push(session_id.to_string());
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn auth_request(&self, auth_request_id: &str) -> Result<Option<AuthRequest>> {
        Ok(self.auth_requests.get(auth_request_id).cloned())
    }

    async fn saml_request(&self, saml_request_id: &str) -> Result<Option<SamlRequest>> {
        Ok(self.saml_requests.get(saml_request_id).cloned())
    }

    async fn create_oidc_callback(
        &self,
        _auth_request_id: &str,
        _session_id: &str,
        _session_token: &str,
    ) -> Result<String> {
        self.callback_url.clone().ok_or_else(|| {
            ApiError {
                status: 400,
                message: "callback not available".to_string(),
            }
            .into()
        })
    }

    async fn create_saml_response(
        &self,
        _saml_request_id: &str,
        _session_id: &str,
        _session_token: &str,
    ) -> Result<SamlBinding> {
        self.saml_binding.clone().ok_or_else(|| {
            ApiError {
                status: 400,
                message: "saml response not available".to_string(),
            }
            .into()
        })
    }

    async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
        _current_password: Option<&str>,
    ) -> Result<()> {
        self.password_changes
            .lock()
            .unwrap()
            .push((user_id.to_string(), new_password.to_string()));
        Ok(())
    }
}
