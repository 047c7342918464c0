mod backend;
mod links;
mod server;
mod sessions;
mod telemetry;


pub use backend::*;
pub use links::*;
pub use server::*;
pub use sessions::*;
pub use telemetry::*;

use serde::Deserialize;

/// Top-level configuration for the Spout server, loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub struct SpoutConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Share link construction configuration.
    #[serde(default)]
    pub links: LinksConfig,
    /// Chat backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Session sweeping configuration.
    #[serde(default)]
    pub sessions: SessionSweepConfig,
    /// OpenTelemetry distributed tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
