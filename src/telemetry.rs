//! Logging initialisation.
//!
//! Events always go to stderr, as text or JSON lines depending on
//! [`LogConfig::format`]. `RUST_LOG` overrides [`LogConfig::level`].
//!
//! With the `otel` feature, setting `OTEL_EXPORTER_OTLP_ENDPOINT` to an
//! `http://...` URL additionally exports spans and log records over OTLP/HTTP.
//! If `TRACEPARENT` is set (W3C Trace Context), spans become children of that
//! remote parent.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::{LogConfig, LogFormat};

/// Dropping it flushes and shuts down the OTLP pipeline, if any.
/// Hold this in `main()` until exit.
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    trace_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
    #[cfg(feature = "otel")]
    log_provider: Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
}

impl TelemetryGuard {
    const fn local_only() -> Self {
        Self {
            #[cfg(feature = "otel")]
            trace_provider: None,
            #[cfg(feature = "otel")]
            log_provider: None,
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        {
            if let Some(provider) = self.trace_provider.take()
                && let Err(e) = provider.shutdown()
            {
                eprintln!("otel trace shutdown error: {e}");
            }
            if let Some(provider) = self.log_provider.take()
                && let Err(e) = provider.shutdown()
            {
                eprintln!("otel log shutdown error: {e}");
            }
        }
    }
}

/// Install the global subscriber.
///
/// Call once, early in `main()`.
#[must_use]
pub fn init(config: &LogConfig) -> TelemetryGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let stderr_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter);

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    match endpoint.as_deref() {
        None | Some("") => {}
        #[cfg(feature = "otel")]
        Some(_) => {
            if let Some((trace_provider, log_provider)) = otlp_providers() {
                use opentelemetry::trace::TracerProvider as _;

                let tracer = trace_provider.tracer(env!("CARGO_PKG_NAME"));
                let trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                let log_layer =
                    opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
                        &log_provider,
                    );
                install_parent_context();
                subscriber.with(trace_layer).with(log_layer).init();
                return TelemetryGuard {
                    trace_provider: Some(trace_provider),
                    log_provider: Some(log_provider),
                };
            }
        }
        #[cfg(not(feature = "otel"))]
        Some(_) => {
            eprintln!(
                "warning: OTEL_EXPORTER_OTLP_ENDPOINT set but histport built without 'otel' feature"
            );
        }
    }

    subscriber.init();
    TelemetryGuard::local_only()
}

/// Span and log providers exporting over OTLP/HTTP.
///
/// The SDK reads `OTEL_EXPORTER_OTLP_ENDPOINT` itself and appends
/// `/v1/traces` or `/v1/logs`.
#[cfg(feature = "otel")]
fn otlp_providers() -> Option<(
    opentelemetry_sdk::trace::SdkTracerProvider,
    opentelemetry_sdk::logs::SdkLoggerProvider,
)> {
    let span_exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to init OTLP span exporter: {e}");
            return None;
        }
    };
    let log_exporter = match opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to init OTLP log exporter: {e}");
            return None;
        }
    };

    let resource = otel_resource();
    let trace_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();
    let log_provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_simple_exporter(log_exporter)
        .with_resource(resource)
        .build();
    Some((trace_provider, log_provider))
}

/// Make a `TRACEPARENT` from the environment the parent of every root span.
#[cfg(feature = "otel")]
fn install_parent_context() {
    use opentelemetry::propagation::TextMapPropagator as _;
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use std::collections::HashMap;

    let Ok(traceparent) = std::env::var("TRACEPARENT") else {
        return;
    };
    let carrier = HashMap::from([("traceparent".to_owned(), traceparent)]);
    let cx = TraceContextPropagator::new().extract(&carrier);
    // Leaked so the context stays attached for the life of the process.
    std::mem::forget(cx.attach());
}

#[cfg(feature = "otel")]
fn otel_resource() -> opentelemetry_sdk::Resource {
    use opentelemetry::KeyValue;
    opentelemetry_sdk::Resource::builder()
        .with_attribute(KeyValue::new("service.name", env!("CARGO_PKG_NAME")))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}
