use crate::{api::handlers::{flow, health}, config::AppConfig, zitadel::IdentityClient};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, middleware,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    routing::{get, options, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;

pub(crate) mod handlers;
// OpenAPI document assembly lives in openapi.rs.
mod openapi;
pub mod proxy;

pub use openapi::openapi;

/// Everything handlers need, shared through an `Extension` layer.
pub struct AppState {
    pub config: AppConfig,
    pub client: Arc<dyn IdentityClient>,
}

/// Build the application router. Kept separate from [`serve`] so tests can
/// drive the router without binding a socket.
#[must_use]
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health::health))
        .route("/health", options(health::health))
        .route("/login", get(flow::initiate))
        .route("/api/loginname", post(handlers::loginname::loginname))
        .route("/api/login", post(handlers::login::login))
        .route("/api/password/change", post(handlers::password::change))
        .route("/api/flow", post(handlers::finish::finish))
        .route("/api/logout", post(handlers::logout::logout))
        .route("/api/session", get(handlers::session::session))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            proxy::protect,
        ))
        .layer(Extension(state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(port: u16, state: Arc<AppState>) -> Result<()> {
    let ui_origin = ui_origin(&state.config.ui_origin)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(ui_origin))
        .allow_credentials(true);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn ui_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid UI origin: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("UI origin must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build UI origin header")
}
