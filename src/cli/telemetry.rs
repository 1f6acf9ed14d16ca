//! Tracing and OpenTelemetry setup.
//!
//! Logs always go to stdout through `tracing_subscriber`. Spans are
//! additionally exported over OTLP when `OTEL_EXPORTER_OTLP_ENDPOINT`
//! is set, so local runs need no collector.

use anyhow::{Context, Result};
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{Resource, runtime, trace::TracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing.
///
/// The `-v` count wins over `RUST_LOG`; without either the default level
/// is `error`.
///
/// # Errors
/// Returns an error if the OTLP exporter cannot be built or a global
/// subscriber is already installed.
pub fn init(verbosity: Option<tracing::Level>) -> Result<()> {
    let filter = match verbosity {
        Some(level) => EnvFilter::new(level.to_string().to_lowercase()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let otel_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .context("Failed to build OTLP span exporter")?;
        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                env!("CARGO_PKG_NAME"),
            )]))
            .build();
        let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
        global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
