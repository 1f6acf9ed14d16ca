//! Route protection table.
//!
//! Maps UI paths to the authentication level they require. Lookup is
//! longest-prefix-wins so `/password/change` cannot fall through to the
//! weaker `/password` rule.

use crate::flows::gate::AuthLevel;

/// Path prefixes with their required level. Order does not matter;
/// lookup always picks the longest matching prefix.
pub const ROUTE_PATTERNS: &[(&str, AuthLevel)] = &[
    ("/account", AuthLevel::AnyMfaRequired),
    ("/password/change", AuthLevel::PasswordRequired),
    ("/mfa", AuthLevel::PasswordRequired),
    ("/verify", AuthLevel::PasswordRequired),
    ("/password", AuthLevel::BasicSession),
    ("/verify/success", AuthLevel::PasswordRequired),
    ("/password/reset", AuthLevel::Open),
    ("/otp", AuthLevel::PasswordRequired),
    ("/u2f", AuthLevel::PasswordRequired),
    ("/mfa/set", AuthLevel::PasswordRequired),
    ("/all-set", AuthLevel::PasswordRequired),
];

/// Routes that never require a session.
pub const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/healthy",
    "/security",
    "/logout-session",
    "/error",
];

/// Pages that belong to a multi-step authentication flow. A partially
/// authenticated session may reach these even though the full level
/// check would fail.
pub const AUTH_FLOW_ROUTES: &[&str] = &[
    "/password",
    "/password/reset",
    "/mfa",
    "/mfa/set",
    "/otp/time-based",
    "/otp/time-based/set",
    "/otp/email",
    "/otp/email/set",
    "/u2f",
    "/u2f/set",
    "/verify",
];

/// Paths the protection middleware skips entirely.
pub const API_ROUTES: &[&str] = &["/api", "/healthy", "/security", "/login", "/logout-session"];

/// True when `path` equals a pattern or sits below it. A trailing `*`
/// makes the pattern a plain prefix match.
#[must_use]
pub fn matches_pattern(path: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            return path.starts_with(prefix);
        }
        if *pattern == "/" {
            return path == "/";
        }
        path == *pattern || path.starts_with(&format!("{pattern}/"))
    })
}

/// Required level for a path. Public routes and unmatched paths are open.
#[must_use]
pub fn required_auth_level(path: &str) -> AuthLevel {
    if matches_pattern(path, PUBLIC_ROUTES) {
        return AuthLevel::Open;
    }
    ROUTE_PATTERNS
        .iter()
        .filter(|(pattern, _)| path == *pattern || path.starts_with(&format!("{pattern}/")))
        .max_by_key(|(pattern, _)| pattern.len())
        .map_or(AuthLevel::Open, |(_, level)| *level)
}

/// True when the path is part of an in-progress authentication flow.
#[must_use]
pub fn is_auth_flow_route(path: &str) -> bool {
    matches_pattern(path, AUTH_FLOW_ROUTES)
}

#[must_use]
pub fn is_api_route(path: &str) -> bool {
    matches_pattern(path, API_ROUTES)
}
