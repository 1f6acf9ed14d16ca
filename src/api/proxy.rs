//! Route protection middleware.
//!
//! Sits in front of every request and enforces the authentication level
//! the path requires. API routes and public pages pass through; anything
//! else is checked against the browser's sessions and, when the check
//! fails, redirected to the earliest unfinished flow step.

use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::api::AppState;
use crate::cookies::SessionCookieJar;
use crate::flows::context::FlowContext;
use crate::flows::gate::{AuthLevel, check_authentication_level, smart_redirect};
use crate::flows::routes;

pub async fn protect(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if routes::is_api_route(&path) {
        return next.run(request).await;
    }

    let required = routes::required_auth_level(&path);
    if required == AuthLevel::Open {
        return next.run(request).await;
    }

    let params = QueryParams::from_uri(request.uri());
    let jar = SessionCookieJar::from_headers(request.headers());
    let organization = params
        .organization
        .clone()
        .or_else(|| state.config.default_organization.clone());

    let check = check_authentication_level(
        state.client.as_ref(),
        &jar,
        required,
        params.login_name.as_deref(),
        organization.as_deref(),
    )
    .await;

    if check.satisfied {
        return next.run(request).await;
    }

    // Multi-step flows reach their own pages with partial credentials:
    // MFA pages need only a verified password, password pages only a user.
    if routes::is_auth_flow_route(&path) {
        let summary = crate::flows::factors::evaluate(check.session.as_ref());
        let mfa_page =
            path.starts_with("/mfa") || path.starts_with("/otp") || path.starts_with("/u2f");
        if mfa_page && summary.password_verified {
            return next.run(request).await;
        }
        if path.starts_with("/password") && summary.has_user {
            return next.run(request).await;
        }
    }

    debug!(
        path,
        reason = check.reason.unwrap_or("unknown"),
        "request blocked by route protection"
    );
    let ctx = FlowContext::new(organization, params.request_id);
    let redirect = smart_redirect(check.session.as_ref(), &ctx, params.login_name.as_deref());
    Redirect::temporary(&redirect).into_response()
}

#[derive(Default)]
struct QueryParams {
    login_name: Option<String>,
    organization: Option<String>,
    request_id: Option<String>,
}

impl QueryParams {
    fn from_uri(uri: &Uri) -> Self {
        let Some(query) = uri.query() else {
            return Self::default();
        };
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "loginName" => params.login_name = Some(value.into_owned()),
                "organization" => params.organization = Some(value.into_owned()),
                "requestId" => params.request_id = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}
