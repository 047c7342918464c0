//! Tracing subscriber setup with optional OTLP span export.
//!
//! The `fmt` layer is always installed; the OpenTelemetry layer joins it
//! only when `[telemetry]` is enabled, so the existing `tracing` spans and
//! events flow to a collector without touching the instrumentation. A
//! misconfigured exporter must never keep the server from starting: the
//! failure is logged and spans simply stay local.

use std::time::Duration;

use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{BatchSpanProcessor, Sampler, SdkTracerProvider};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{OtlpProtocol, TelemetryConfig};

/// Handle owning the exporting tracer provider, if one was installed.
///
/// Call [`TelemetryGuard::shutdown`] on the way out so buffered spans are
/// flushed; dropping the guard without it may lose the tail of a trace.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Flush pending spans and stop the exporter.
    pub fn shutdown(mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(error) = provider.shutdown()
        {
            warn!(%error, "tracer provider did not shut down cleanly");
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls the filter and defaults to `info`. The subscriber is
/// installed exactly once; exporter construction happens first so its
/// failure can fall back to local-only logging.
pub fn init(config: &TelemetryConfig) -> TelemetryGuard {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (provider, export_error) = if config.enabled {
        match build_provider(config) {
            Ok(provider) => (Some(provider), None),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };

    let otel_layer = provider.as_ref().map(|provider| {
        global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer("spout"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    if let Some(e) = export_error {
        error!(
            error = %e,
            endpoint = %config.endpoint,
            protocol = %config.protocol,
            "span exporter failed to build, tracing stays local"
        );
    } else if provider.is_some() {
        info!(
            endpoint = %config.endpoint,
            protocol = %config.protocol,
            sample_ratio = config.sample_ratio,
            "span export enabled"
        );
    }

    TelemetryGuard { provider }
}

/// Assemble the exporting tracer provider: OTLP exporter over the
/// configured transport, batch processing, ratio sampling, and resource
/// attributes identifying this process.
fn build_provider(
    config: &TelemetryConfig,
) -> Result<SdkTracerProvider, opentelemetry::trace::TraceError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let exporter = match config.protocol {
        OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build()?,
        OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build()?,
    };

    Ok(SdkTracerProvider::builder()
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .with_sampler(sampler(config.sample_ratio))
        .with_resource(resource(config))
        .build())
}

fn sampler(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

fn resource(config: &TelemetryConfig) -> Resource {
    let mut attributes = vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("process.pid", std::process::id().to_string()),
    ];
    if let Ok(host) = std::env::var("HOSTNAME") {
        attributes.push(KeyValue::new("host.name", host));
    }
    attributes.extend(
        config
            .resource_attributes
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
    );
    Resource::builder().with_attributes(attributes).build()
}
