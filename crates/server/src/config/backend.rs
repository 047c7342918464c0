use serde::Deserialize;

/// Chat backend configuration.
///
/// The only built-in backend is `"memory"`, a scripted in-process client
/// for development and demos. Production deployments link their own
/// backend implementation and wire it up in place of the factory.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Backend to use: `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Storage channel every connection must be able to reach.
    #[serde(default = "default_channel_id")]
    pub channel_id: i64,
    /// Identity of the read-capable primary connection.
    #[serde(default = "default_primary")]
    pub primary: String,
    /// Identities of additional send-capable worker connections.
    #[serde(default)]
    pub workers: Vec<String>,
    /// Seed the memory backend with a demo file and log its share link on
    /// startup.
    #[serde(default = "default_demo")]
    pub demo: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            channel_id: default_channel_id(),
            primary: default_primary(),
            workers: Vec::new(),
            demo: default_demo(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_channel_id() -> i64 {
    -1_001_234_567_890
}

fn default_primary() -> String {
    "primary".to_owned()
}

fn default_demo() -> bool {
    true
}
