pub mod assets;
pub mod download;
pub mod health;
pub mod player;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use spout_core::LinkBuilder;
use spout_gateway::StreamingGateway;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The streaming gateway instance.
    pub gateway: Arc<StreamingGateway>,
    /// Builds the public URLs embedded in pages and logs.
    pub links: LinkBuilder,
    /// Compiled page templates.
    pub templates: Arc<minijinja::Environment<'static>>,
}

impl AppState {
    /// Compile the baked-in templates and wrap the shared handles.
    pub fn new(
        gateway: Arc<StreamingGateway>,
        links: LinkBuilder,
    ) -> Result<Self, crate::error::ServerError> {
        Ok(Self {
            gateway,
            links,
            templates: Arc::new(player::environment()?),
        })
    }
}

/// Build the Axum router with all routes and middleware.
///
/// `/stream/{id}` is a verbatim alias of `/dl/{id}`; some chat clients
/// refuse to inline-play URLs whose path says "download".
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(player::home))
        .route("/health", get(health::health))
        .route("/assets/{file}", get(assets::asset))
        .route("/player/{id}", get(player::player))
        .route("/dl/{id}", get(download::download))
        .route("/stream/{id}", get(download::download))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
