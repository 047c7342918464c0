use serde::Deserialize;

/// Share link construction configuration.
#[derive(Debug, Deserialize)]
pub struct LinksConfig {
    /// External URL links are built against
    /// (e.g. `https://stream.example.com`).
    ///
    /// If not set, defaults to `http://{host}:{port}` of the bind address,
    /// which only works for local testing.
    pub external_url: Option<String>,
    /// How many fingerprint characters public link tokens expose.
    ///
    /// Values outside `5..=32` are clamped: too short falls back to the
    /// default of 6, too long is capped at the full digest width. Changing
    /// this invalidates every previously issued link.
    #[serde(default = "default_token_length")]
    pub token_length: usize,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            external_url: None,
            token_length: default_token_length(),
        }
    }
}

fn default_token_length() -> usize {
    6
}
