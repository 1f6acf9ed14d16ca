//! Session factor evaluation.
//!
//! Reduces a raw session record to the booleans the gate and resolvers
//! branch on. Evaluation is pure; the session is fetched elsewhere.

use chrono::{DateTime, Utc};

use crate::zitadel::types::{Session, SessionFactor};

/// Verification state of a single session at one instant.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FactorSummary {
    pub has_user: bool,
    pub not_expired: bool,
    pub password_verified: bool,
    pub intent_verified: bool,
    pub totp_verified: bool,
    pub u2f_verified: bool,
    pub otp_email_verified: bool,
    pub otp_sms_verified: bool,
}

impl FactorSummary {
    /// TOTP or U2F. OTP by mail or SMS never counts as strong.
    #[must_use]
    pub fn has_strong_mfa(&self) -> bool {
        self.totp_verified || self.u2f_verified
    }

    /// Any second factor, including OTP email. OTP over SMS is
    /// deliberately excluded.
    #[must_use]
    pub fn has_any_mfa(&self) -> bool {
        self.has_strong_mfa() || self.otp_email_verified
    }
}

/// Evaluates a session against the current clock. `None` yields the
/// all-false summary.
#[must_use]
pub fn evaluate(session: Option<&Session>) -> FactorSummary {
    evaluate_at(session, Utc::now())
}

#[must_use]
pub fn evaluate_at(session: Option<&Session>, now: DateTime<Utc>) -> FactorSummary {
    let Some(session) = session else {
        return FactorSummary::default();
    };
    FactorSummary {
        has_user: session.factors.user.is_some(),
        not_expired: session
            .expiration_date
            .is_none_or(|expiration| expiration > now),
        password_verified: verified(session.factors.password.as_ref()),
        intent_verified: verified(session.factors.intent.as_ref()),
        totp_verified: verified(session.factors.totp.as_ref()),
        u2f_verified: verified(session.factors.web_auth_n.as_ref()),
        otp_email_verified: verified(session.factors.otp_email.as_ref()),
        otp_sms_verified: verified(session.factors.otp_sms.as_ref()),
    }
}

fn verified(factor: Option<&SessionFactor>) -> bool {
    factor.is_some_and(SessionFactor::is_verified)
}
