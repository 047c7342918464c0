use serde::Deserialize;

/// Background session sweeping configuration.
///
/// A session normally closes when its transfer settles, but a process
/// crash or a write that never lands can leave entries active forever.
/// The sweeper periodically drops sessions with no recent activity.
#[derive(Debug, Deserialize)]
pub struct SessionSweepConfig {
    /// Whether the sweeper runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Sessions idle for longer than this many seconds are dropped.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
}

impl Default for SessionSweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_seconds: default_interval(),
            stale_after_seconds: default_stale_after(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    900
}

fn default_stale_after() -> u64 {
    3600
}
