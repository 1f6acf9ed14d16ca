use utoipa::OpenApi;

use super::handlers::{finish, flow, health, login, loginname, logout, password, session};

/// OpenAPI document for the login flow API.
///
/// Add new endpoints to `paths(...)` so they stay documented; the proxy
/// middleware and static pages are intentionally not part of the spec.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        flow::initiate,
        loginname::loginname,
        login::login,
        password::change,
        finish::finish,
        logout::logout,
        session::session,
    ),
    components(schemas(
        health::Health,
        loginname::LoginNameRequest,
        login::LoginRequest,
        password::ChangePasswordRequest,
        finish::FinishFlowRequest,
        logout::LogoutRequest,
        session::SessionSummary,
    )),
    tags(
        (name = "flow", description = "Authentication flow decisions"),
        (name = "session", description = "Browser session management"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/login",
            "/api/loginname",
            "/api/login",
            "/api/password/change",
            "/api/flow",
            "/api/logout",
            "/api/session",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }

    #[test]
    fn document_carries_package_metadata() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }
}
