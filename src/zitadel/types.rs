//! Wire types for the identity-provider API surface this service consumes.
//!
//! These mirror the session/settings/user resources of the ZITADEL v2 API.
//! Everything here is read-only from the flow engine's point of view; the
//! backend owns the records and this crate only branches on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single credential check with its verification instant.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionFactor {
    pub verified_at: Option<DateTime<Utc>>,
}

impl SessionFactor {
    #[must_use]
    pub fn verified_at(at: DateTime<Utc>) -> Self {
        Self {
            verified_at: Some(at),
        }
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

/// User identity attached to a session after the user check succeeded.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserFactor {
    pub id: String,
    pub login_name: String,
    pub organization_id: Option<String>,
}

/// All factors a session may carry. Absent factors were never checked.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Factors {
    pub user: Option<UserFactor>,
    pub password: Option<SessionFactor>,
    pub totp: Option<SessionFactor>,
    pub web_auth_n: Option<SessionFactor>,
    pub otp_email: Option<SessionFactor>,
    pub otp_sms: Option<SessionFactor>,
    /// External IDP intent check.
    pub intent: Option<SessionFactor>,
}

/// A partially- or fully-authenticated browser session, owned by the
/// backend. The application only holds a cookie reference to it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub id: String,
    pub factors: Factors,
    pub expiration_date: Option<DateTime<Utc>>,
    pub change_date: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.factors.user.as_ref().map(|user| user.id.as_str())
    }

    #[must_use]
    pub fn login_name(&self) -> Option<&str> {
        self.factors
            .user
            .as_ref()
            .map(|user| user.login_name.as_str())
    }

    #[must_use]
    pub fn organization_id(&self) -> Option<&str> {
        self.factors
            .user
            .as_ref()
            .and_then(|user| user.organization_id.as_deref())
    }
}

/// A freshly created session together with its opaque bearer token.
/// The token is only ever persisted in the browser cookie.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session: Session,
    pub session_token: String,
}

/// Org-level passkey policy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub enum PasskeysType {
    #[default]
    #[serde(rename = "PASSKEYS_TYPE_NOT_ALLOWED")]
    NotAllowed,
    #[serde(rename = "PASSKEYS_TYPE_ALLOWED")]
    Allowed,
}

/// Per-organization login policy, fetched fresh for every request and
/// never mutated locally.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginSettings {
    pub allow_username_password: bool,
    pub allow_register: bool,
    pub ignore_unknown_usernames: bool,
    pub allow_domain_discovery: bool,
    pub disable_login_with_email: bool,
    pub disable_login_with_phone: bool,
    pub passkeys_type: PasskeysType,
    pub force_mfa: bool,
    pub force_mfa_local_only: bool,
    /// Grace window after a user skipped MFA setup, in seconds.
    pub mfa_init_skip_lifetime_seconds: Option<i64>,
    pub default_redirect_uri: Option<String>,
}

/// Methods configured on a user account. Read-only for this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub enum AuthenticationMethodType {
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_PASSWORD")]
    Password,
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_PASSKEY")]
    Passkey,
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_TOTP")]
    Totp,
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_U2F")]
    U2f,
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_OTP_EMAIL")]
    OtpEmail,
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_OTP_SMS")]
    OtpSms,
    #[serde(rename = "AUTHENTICATION_METHOD_TYPE_IDP")]
    Idp,
}

impl AuthenticationMethodType {
    /// TOTP and U2F are the only factors counted as strong MFA.
    #[must_use]
    pub fn is_strong_mfa(self) -> bool {
        matches!(self, Self::Totp | Self::U2f)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub enum UserState {
    #[default]
    #[serde(rename = "USER_STATE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "USER_STATE_ACTIVE")]
    Active,
    #[serde(rename = "USER_STATE_INACTIVE")]
    Inactive,
    #[serde(rename = "USER_STATE_DELETED")]
    Deleted,
    #[serde(rename = "USER_STATE_LOCKED")]
    Locked,
    /// Created but never finished setup; unsupported for login.
    #[serde(rename = "USER_STATE_INITIAL")]
    Initial,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Email {
    pub email: String,
    pub is_verified: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Phone {
    pub phone: String,
    pub is_verified: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct HumanUser {
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub password_change_required: bool,
    pub password_changed: Option<DateTime<Utc>>,
    /// Set when the user skipped MFA setup; starts the grace window.
    pub mfa_init_skipped: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub user_id: String,
    pub state: UserState,
    pub preferred_login_name: String,
    pub organization_id: Option<String>,
    pub human: Option<HumanUser>,
}

impl User {
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.human
            .as_ref()
            .and_then(|human| human.email.as_ref())
            .map(|email| email.email.as_str())
    }

    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.human
            .as_ref()
            .and_then(|human| human.phone.as_ref())
            .map(|phone| phone.phone.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub enum IdentityProviderType {
    #[default]
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_OIDC")]
    Oidc,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_OAUTH")]
    Oauth,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_LDAP")]
    Ldap,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_SAML")]
    Saml,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_GOOGLE")]
    Google,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_GITHUB")]
    Github,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_GITLAB")]
    Gitlab,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_AZURE_AD")]
    AzureAd,
    #[serde(rename = "IDENTITY_PROVIDER_TYPE_APPLE")]
    Apple,
}

impl IdentityProviderType {
    /// URL slug used for the IDP process/failure callback routes.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::AzureAd => "azure",
            Self::Apple => "apple",
            Self::Saml => "saml",
            Self::Ldap => "ldap",
            Self::Oauth => "oauth",
            Self::Oidc | Self::Unspecified => "oidc",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityProvider {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub idp_type: IdentityProviderType,
}

/// Link between a user and an external identity provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IdpLink {
    pub idp_id: String,
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// OIDC prompt values carried by a pending authorization request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub enum Prompt {
    #[serde(rename = "PROMPT_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "PROMPT_NONE")]
    None,
    #[serde(rename = "PROMPT_LOGIN")]
    Login,
    #[serde(rename = "PROMPT_CONSENT")]
    Consent,
    #[serde(rename = "PROMPT_SELECT_ACCOUNT")]
    SelectAccount,
    #[serde(rename = "PROMPT_CREATE")]
    Create,
}

/// Pending OIDC authorization request identified by an `oidc_` RequestId.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthRequest {
    pub id: String,
    pub scope: Vec<String>,
    pub prompt: Vec<Prompt>,
    pub login_hint: Option<String>,
    pub hint_user_id: Option<String>,
}

/// Pending SAML request identified by a `saml_` RequestId. SAML carries
/// no prompt or user-hint concept.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SamlRequest {
    pub id: String,
}

/// How the SAML response must travel back to the service provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SamlBinding {
    Redirect {
        url: String,
    },
    /// Auto-submitting POST form rendered by the UI layer.
    Post {
        url: String,
        relay_state: String,
        saml_response: String,
    },
}

/// User search sent with session creation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserSearch {
    UserId(String),
    LoginName(String),
}

/// Checks to run when creating or updating a session.
#[derive(Clone, Debug)]
pub struct SessionChecks {
    pub user: UserSearch,
    pub password: Option<String>,
}

impl SessionChecks {
    #[must_use]
    pub fn for_user_id(user_id: impl Into<String>) -> Self {
        Self {
            user: UserSearch::UserId(user_id.into()),
            password: None,
        }
    }

    #[must_use]
    pub fn for_login_name(login_name: impl Into<String>) -> Self {
        Self {
            user: UserSearch::LoginName(login_name.into()),
            password: None,
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthenticationMethodType, IdentityProviderType, Session, SessionFactor, UserFactor};
    use chrono::Utc;

    #[test]
    fn strong_mfa_excludes_otp_methods() {
        assert!(AuthenticationMethodType::Totp.is_strong_mfa());
        assert!(AuthenticationMethodType::U2f.is_strong_mfa());
        assert!(!AuthenticationMethodType::OtpEmail.is_strong_mfa());
        assert!(!AuthenticationMethodType::OtpSms.is_strong_mfa());
        assert!(!AuthenticationMethodType::Password.is_strong_mfa());
    }

    #[test]
    fn session_accessors_handle_missing_user() {
        let session = Session::default();
        assert_eq!(session.user_id(), None);
        assert_eq!(session.login_name(), None);
        assert_eq!(session.organization_id(), None);

        let session = Session {
            factors: super::Factors {
                user: Some(UserFactor {
                    id: "user123".to_string(),
                    login_name: "user@example.com".to_string(),
                    organization_id: Some("org123".to_string()),
                }),
                password: Some(SessionFactor::verified_at(Utc::now())),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(session.user_id(), Some("user123"));
        assert_eq!(session.organization_id(), Some("org123"));
    }

    #[test]
    fn idp_slugs_are_url_safe() {
        for idp_type in [
            IdentityProviderType::Google,
            IdentityProviderType::AzureAd,
            IdentityProviderType::Oidc,
        ] {
            let slug = idp_type.slug();
            assert!(slug.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn auth_method_deserializes_proto_names() {
        let method: AuthenticationMethodType =
            serde_json::from_str("\"AUTHENTICATION_METHOD_TYPE_PASSKEY\"").unwrap();
        assert_eq!(method, AuthenticationMethodType::Passkey);
    }
}
