//! MFA step resolution after a primary credential check.
//!
//! Decides whether the flow continues to a second-factor prompt, the
//! chooser, the setup page, or not at all.

use chrono::{DateTime, Duration, Utc};

use crate::flows::context::FlowContext;
use crate::flows::factors::FactorSummary;
use crate::zitadel::types::{AuthenticationMethodType, LoginSettings, Session, User};

/// Whether policy demands a second factor for this session.
///
/// `force_mfa` applies to every authentication method. The local-only
/// variant applies to password sessions but exempts sessions that
/// authenticated through an external IDP intent.
#[must_use]
pub fn should_enforce_mfa(summary: &FactorSummary, settings: &LoginSettings) -> bool {
    if settings.force_mfa {
        return true;
    }
    if settings.force_mfa_local_only {
        return summary.password_verified && !summary.intent_verified;
    }
    false
}

/// Picks the next MFA page, or `None` when the flow may continue.
#[must_use]
pub fn check_mfa_factors(
    session: &Session,
    user: &User,
    settings: &LoginSettings,
    methods: &[AuthenticationMethodType],
    summary: &FactorSummary,
    ctx: &FlowContext,
) -> Option<String> {
    check_mfa_factors_at(session, user, settings, methods, summary, ctx, Utc::now())
}

#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn check_mfa_factors_at(
    session: &Session,
    user: &User,
    settings: &LoginSettings,
    methods: &[AuthenticationMethodType],
    summary: &FactorSummary,
    ctx: &FlowContext,
    now: DateTime<Utc>,
) -> Option<String> {
    let login_name = session.login_name().unwrap_or_default();
    let params = [("loginName", login_name)];

    let strong: Vec<AuthenticationMethodType> = methods
        .iter()
        .copied()
        .filter(|method| method.is_strong_mfa())
        .collect();

    match strong.as_slice() {
        // One strong factor configured: go straight to its prompt.
        [AuthenticationMethodType::Totp] => {
            return Some(ctx.url("/otp/time-based", &params));
        }
        [AuthenticationMethodType::U2f] => {
            return Some(ctx.url("/u2f", &params));
        }
        [] => {}
        // Several strong factors: let the user choose.
        _ => return Some(ctx.url("/mfa", &params)),
    }

    if !should_enforce_mfa(summary, settings) {
        return None;
    }

    if within_skip_window(user, settings, now) {
        return None;
    }

    Some(ctx.url("/mfa/set", &params))
}

/// A previous "skip MFA setup" is honored while the configured grace
/// window lasts.
fn within_skip_window(user: &User, settings: &LoginSettings, now: DateTime<Utc>) -> bool {
    let Some(skipped_at) = user.human.as_ref().and_then(|human| human.mfa_init_skipped) else {
        return false;
    };
    let Some(lifetime) = settings.mfa_init_skip_lifetime_seconds else {
        return false;
    };
    now - skipped_at < Duration::seconds(lifetime)
}
