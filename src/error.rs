//! Typed flow outcomes shared by every decision function.
//!
//! Expected policy results (ambiguous account, disallowed method, unknown
//! user) are values, not exceptions: flow functions return `FlowOutcome`
//! and reserve `Err` for transport or backend failures. The API layer
//! catches those and collapses them into a generic, non-enumerating
//! message before anything reaches the UI.

use serde::Serialize;

/// Expected policy outcomes of an authentication flow step.
///
/// Each variant carries a stable message key consumed by the UI layer's
/// translation provider, plus a safe English fallback. The split between
/// specific and coalesced keys is deliberate: anything that could reveal
/// whether an account exists maps to `InvalidCredentials`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowError {
    CouldNotGetLoginSettings,
    CouldNotSearchUsers,
    MoreThanOneUserFound,
    InitialUserNotSupported,
    UserNotActive,
    CouldNotCreateSession,
    UserNotFound,
    PasskeysNotAllowed,
    UsernamePasswordNotAllowed,
    NoMethodAvailable,
    InvalidCredentials,
    InvalidRequestId,
    NavigationFailed,
}

impl FlowError {
    /// Stable key resolved by the UI translation layer.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::CouldNotGetLoginSettings => "errors.couldNotGetLoginSettings",
            Self::CouldNotSearchUsers => "errors.couldNotSearchUsers",
            Self::MoreThanOneUserFound => "errors.moreThanOneUserFound",
            Self::InitialUserNotSupported => "errors.initialUserNotSupported",
            Self::UserNotActive => "errors.userNotActive",
            Self::CouldNotCreateSession => "errors.couldNotCreateSession",
            Self::UserNotFound => "errors.userNotFound",
            Self::PasskeysNotAllowed => "errors.passkeysNotAllowed",
            Self::UsernamePasswordNotAllowed => "errors.usernamePasswordNotAllowed",
            Self::NoMethodAvailable => "errors.noMethodAvailable",
            Self::InvalidCredentials => "validation.invalidCredentials",
            Self::InvalidRequestId => "errors.invalidRequestId",
            Self::NavigationFailed => "errors.navigationFailed",
        }
    }

    /// English fallback text, safe to display without translation.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::CouldNotGetLoginSettings => "Could not load login settings",
            Self::CouldNotSearchUsers => "Could not search for users",
            Self::MoreThanOneUserFound => "More than one user matched the login name",
            Self::InitialUserNotSupported => "Account setup is not finished",
            Self::UserNotActive => "Account is not active",
            Self::CouldNotCreateSession => "Could not create a session",
            Self::UserNotFound => "User not found",
            Self::PasskeysNotAllowed => "Passkeys are not allowed",
            Self::UsernamePasswordNotAllowed => "Username and password login is not allowed",
            Self::NoMethodAvailable => "No usable authentication method",
            Self::InvalidCredentials => "Invalid credentials",
            Self::InvalidRequestId => "Invalid request ID format",
            Self::NavigationFailed => "Authentication completed but navigation failed",
        }
    }
}

/// Result of a flow-level decision function: a redirect the UI should
/// follow, or a typed policy error. Never both.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowOutcome {
    Redirect {
        redirect: String,
    },
    Error {
        #[serde(serialize_with = "serialize_error_key")]
        error: FlowError,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_error_key<S: serde::Serializer>(
    error: &FlowError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(error.key())
}

impl FlowOutcome {
    #[must_use]
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::Redirect {
            redirect: url.into(),
        }
    }

    #[must_use]
    pub const fn error(error: FlowError) -> Self {
        Self::Error { error }
    }

    #[must_use]
    pub fn as_redirect(&self) -> Option<&str> {
        match self {
            Self::Redirect { redirect } => Some(redirect),
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn as_error(&self) -> Option<FlowError> {
        match self {
            Self::Redirect { .. } => None,
            Self::Error { error } => Some(*error),
        }
    }
}
