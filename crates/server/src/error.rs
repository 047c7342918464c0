use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use spout_gateway::GatewayError;

/// Errors that can occur when running the Spout server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself was malformed (bad id, missing token).
    #[error("{0}")]
    BadRequest(String),

    /// A gateway-level error surfaced through the API.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Page template rendering failed.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Building a response failed.
    #[error("http error: {0}")]
    Http(#[from] axum::http::Error),
}

/// Map a gateway failure to the taxonomy clients see: bad token `400`,
/// revoked `403`, missing media `404`, no usable backend `503`, anything
/// else an opaque `500`.
fn gateway_status(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidToken => StatusCode::BAD_REQUEST,
        GatewayError::Revoked => StatusCode::FORBIDDEN,
        GatewayError::NotFound => StatusCode::NOT_FOUND,
        GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Retrieval { .. }
        | GatewayError::Backend(_)
        | GatewayError::Store(_)
        | GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(e) => gateway_status(e),
            Self::Config(_) | Self::Io(_) | Self::Template(_) | Self::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
