//! Password change.

use std::time::Duration;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::cookies::SessionCookieJar;
use crate::error::{FlowError, FlowOutcome};
use crate::flows::context::FlowContext;
use crate::flows::session::load_most_recent_session;
use crate::zitadel::IdentityClient;

#[derive(Clone, Debug)]
pub struct ChangePasswordCommand {
    pub login_name: String,
    pub new_password: String,
    /// Absent for reset flows where a code already authorized the change.
    pub current_password: Option<String>,
    pub organization: Option<String>,
    pub request_id: Option<String>,
}

/// Changes the password of the user behind the current session.
///
/// Failures coalesce into the generic credentials error; a password
/// surface must not reveal which step failed.
pub async fn change_password(
    client: &dyn IdentityClient,
    jar: &SessionCookieJar,
    config: &AppConfig,
    command: &ChangePasswordCommand,
) -> FlowOutcome {
    let invalid = FlowOutcome::error(FlowError::InvalidCredentials);

    if command.new_password.is_empty() {
        return invalid;
    }

    let organization = command
        .organization
        .clone()
        .or_else(|| config.default_organization.clone());

    let session = match load_most_recent_session(
        client,
        jar,
        Some(&command.login_name),
        organization.as_deref(),
    )
    .await
    {
        Ok(Some(session)) => session,
        Ok(None) => {
            error!("no session found for password change");
            return invalid;
        }
        Err(err) => {
            error!("session lookup failed for password change: {err}");
            return invalid;
        }
    };
    let Some(user_id) = session.user_id() else {
        return invalid;
    };

    if let Err(err) = client
        .set_password(
            user_id,
            &command.new_password,
            command.current_password.as_deref(),
        )
        .await
    {
        error!("password change rejected: {err}");
        return invalid;
    }

    // The backend applies the change eventually; reading the user right
    // away can still observe the old credential. Keep this wait.
    tokio::time::sleep(Duration::from_secs(1)).await;

    info!("password changed");
    let ctx = FlowContext::new(organization, command.request_id.clone());
    FlowOutcome::redirect(ctx.url("/all-set", &[("loginName", &command.login_name)]))
}

#[cfg(test)]
mod tests {
    use super::{ChangePasswordCommand, change_password};
    use crate::config::AppConfig;
    use crate::cookies::{SessionCookie, SessionCookieJar};
    use crate::error::FlowError;
    use crate::flows::testing::FakeIdentity;
    use crate::zitadel::types::{Factors, Session, SessionFactor, UserFactor};
    use chrono::{Duration, Utc};

    fn command() -> ChangePasswordCommand {
        ChangePasswordCommand {
            login_name: "user@example.com".to_string(),
            new_password: "new-secret".to_string(),
            current_password: Some("old-secret".to_string()),
            organization: None,
            request_id: Some("oidc_req1".to_string()),
        }
    }

    fn session() -> Session {
        let now = Utc::now();
        Session {
            id: "s1".to_string(),
            factors: Factors {
                user: Some(UserFactor {
                    id: "user123".to_string(),
                    login_name: "user@example.com".to_string(),
                    organization_id: None,
                }),
                password: Some(SessionFactor::verified_at(now)),
                ..Default::default()
            },
            expiration_date: Some(now + Duration::hours(1)),
            change_date: Some(now),
        }
    }

    fn jar() -> SessionCookieJar {
        let mut jar = SessionCookieJar::default();
        jar.upsert(SessionCookie {
            id: "s1".to_string(),
            token: "token-s1".to_string(),
            login_name: "user@example.com".to_string(),
            organization: None,
            creation_date: Utc::now(),
            change_date: Utc::now(),
            expiration_date: Some(Utc::now() + Duration::hours(1)),
        });
        jar
    }

    #[tokio::test(start_paused = true)]
    async fn change_is_recorded_and_redirects_onward() {
        let fake = FakeIdentity::default().with_sessions(vec![session()]);
        let outcome = change_password(&fake, &jar(), &AppConfig::new(), &command()).await;
        assert_eq!(
            outcome.as_redirect(),
            Some("/all-set?loginName=user%40example.com&requestId=oidc_req1")
        );
        let changes = fake.password_changes.lock().unwrap();
        assert_eq!(changes.as_slice(), &[("user123".to_string(), "new-secret".to_string())]);
    }

    #[tokio::test]
    async fn missing_session_coalesces_to_generic_error() {
        let fake = FakeIdentity::default();
        let outcome =
            change_password(&fake, &SessionCookieJar::default(), &AppConfig::new(), &command())
                .await;
        assert_eq!(outcome.as_error(), Some(FlowError::InvalidCredentials));
        assert!(fake.password_changes.lock().unwrap().is_empty());
    }
}
