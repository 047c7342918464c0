use std::sync::Arc;

use tracing::info;

use spout_backend::{ClientPool, PoolBuilder, ScriptedClient, ScriptedFile, patterned_bytes};
use spout_core::MediaKind;
use spout_gateway::GatewayError;

use crate::config::BackendConfig;
use crate::error::ServerError;

/// Message id of the file seeded by `demo = true`.
pub const DEMO_MESSAGE_ID: i64 = 1;

const DEMO_SIZE: usize = 3 * 1024 * 1024;

/// Create and verify the worker pool from the given configuration.
///
/// The primary connection must reach the storage channel or this fails;
/// workers that cannot are excluded with a warning during verification.
pub async fn create_pool(config: &BackendConfig) -> Result<Arc<ClientPool>, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            let primary = Arc::new(ScriptedClient::new(&config.primary, config.channel_id));
            if config.demo {
                primary.insert_file(
                    DEMO_MESSAGE_ID,
                    ScriptedFile::new(MediaKind::Video, patterned_bytes(DEMO_SIZE))
                        .with_name("clip.mp4")
                        .with_mime("video/mp4")
                        .with_key(42),
                );
                info!(message_id = DEMO_MESSAGE_ID, "demo file seeded into memory backend");
            }

            let mut builder = PoolBuilder::new(config.channel_id).primary(primary);
            for name in &config.workers {
                builder = builder.worker(Arc::new(ScriptedClient::new(name, config.channel_id)));
            }
            let pool = builder.build().await.map_err(GatewayError::from)?;
            Ok(Arc::new(pool))
        }
        other => Err(ServerError::Config(format!(
            "unknown backend: {other} (expected 'memory')"
        ))),
    }
}
