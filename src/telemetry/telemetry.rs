use opentelemetry::trace::{TraceContextExt, TraceId};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Trace id of the current span, or `TraceId::INVALID` when no exporter is installed.
pub fn get_trace_id() -> TraceId {
    tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id()
}

#[cfg(feature = "telemetry")]
fn init_tracer() -> opentelemetry_sdk::trace::Tracer {
    use opentelemetry::trace::TracerProvider;
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = std::env::var("OPENTELEMETRY_ENDPOINT_URL")
        .unwrap_or("http://localhost:4318/v1/traces".to_string());
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .expect("failed to build span exporter");
    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name("capacity-controller")
                .build(),
        )
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());
    provider.tracer("capacity-controller")
}

/// Initialize tracing. `RUST_LOG` overrides the default `info` filter.
pub async fn init(json_logs: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("invalid log filter");
    let (compact, json) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer().compact()), None)
    };
    let collector = Registry::default().with(env_filter).with(compact).with(json);

    #[cfg(feature = "telemetry")]
    collector
        .with(tracing_opentelemetry::layer().with_tracer(init_tracer()))
        .init();
    #[cfg(not(feature = "telemetry"))]
    collector.init();
}
