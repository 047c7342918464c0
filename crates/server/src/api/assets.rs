//! Static assets baked into the binary.

use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

const ICON_SVG: &str = include_str!("../../assets/spout.svg");

/// `GET /assets/{file}` -- serve an embedded asset by name.
///
/// Everything is compiled in; there is no filesystem lookup and no path
/// traversal surface.
pub async fn asset(Path(file): Path<String>) -> Response {
    match file.as_str() {
        "spout.svg" => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/svg+xml")],
            ICON_SVG,
        )
            .into_response(),
        _ => (StatusCode::NOT_FOUND, "asset not found").into_response(),
    }
}
