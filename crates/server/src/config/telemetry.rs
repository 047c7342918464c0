use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// OTLP transport the span exporter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// gRPC, the collector default on port 4317.
    #[default]
    Grpc,
    /// HTTP with protobuf payloads, usually port 4318.
    Http,
}

impl fmt::Display for OtlpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grpc => f.write_str("grpc"),
            Self::Http => f.write_str("http"),
        }
    }
}

/// Span export settings.
///
/// Off by default. When enabled, spans cover the whole delivery path of a
/// request: ingress, link authorization, chunk retrieval with its retries,
/// and the final accounting settlement.
///
/// # Example
///
/// ```toml
/// [telemetry]
/// enabled = true
/// endpoint = "http://tempo:4317"
/// sample_ratio = 0.25
/// ```
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Whether spans are exported at all.
    #[serde(default)]
    pub enabled: bool,
    /// Collector endpoint the exporter ships spans to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Service name stamped on every span.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Fraction of traces to keep, `0.0..=1.0`.
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,
    /// Exporter transport.
    #[serde(default)]
    pub protocol: OtlpProtocol,
    /// Export timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Extra resource attributes, merged into the built-in ones.
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            service_name: default_service_name(),
            sample_ratio: default_sample_ratio(),
            protocol: OtlpProtocol::default(),
            timeout_seconds: default_timeout(),
            resource_attributes: HashMap::new(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:4317".to_owned()
}

fn default_service_name() -> String {
    "spout".to_owned()
}

fn default_sample_ratio() -> f64 {
    1.0
}

fn default_timeout() -> u64 {
    10
}
