//! The in-browser player page and the landing page.
//!
//! `/player/{id}` verifies the link token, then renders an HTML page that
//! embeds the direct stream URL in a `<video>` or `<audio>` element. With
//! `d=true` it delegates entirely to the byte-serving handler, so a player
//! link doubles as a download link.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, Response};
use axum::response::{Html, IntoResponse};
use serde::Serialize;

use crate::error::ServerError;

use super::AppState;
use super::download::{self, DownloadParams};

/// Compile the baked-in page templates once at startup.
pub(crate) fn environment() -> Result<minijinja::Environment<'static>, minijinja::Error> {
    let mut env = minijinja::Environment::new();
    env.add_template("player.html", include_str!("../../templates/player.html"))?;
    env.add_template("home.html", include_str!("../../templates/home.html"))?;
    Ok(env)
}

/// Variables the player template renders.
#[derive(Debug, Serialize)]
struct PlayerContext {
    file_name: String,
    mime: String,
    /// Which element to embed: `video`, `audio`, `image`, or `file`.
    media: &'static str,
    size: String,
    stream_url: String,
    download_url: String,
}

/// `GET /player/{id}` -- render the player page for a shared file.
///
/// The page is metadata only; the bytes always flow through `/dl`. The
/// revocation ledger is deliberately not consulted here, a page that is
/// already open keeps rendering while the links under it return 403.
pub async fn player(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<String>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Result<Response<Body>, ServerError> {
    if params.d.as_deref() == Some("true") {
        return download::download(State(state), method, Path(id), Query(params), headers).await;
    }

    let message_id = download::parse_message_id(&id)?;
    let token = params
        .hash
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::BadRequest("hash query parameter is required".to_owned()))?;

    let meta = state.gateway.describe(message_id, token).await?;
    let mime = meta.mime();
    let context = PlayerContext {
        file_name: meta.display_name(),
        media: media_element(&mime),
        size: human_size(meta.file_size),
        mime,
        stream_url: state.links.stream_url(message_id, token),
        download_url: state.links.download_url(message_id, token),
    };

    let html = state
        .templates
        .get_template("player.html")?
        .render(minijinja::Value::from_serialize(&context))?;
    Ok(Html(html).into_response())
}

/// Variables the landing template renders.
#[derive(Debug, Serialize)]
struct HomeContext {
    version: &'static str,
}

/// `GET /` -- minimal landing page.
pub async fn home(State(state): State<AppState>) -> Result<Response<Body>, ServerError> {
    let context = HomeContext {
        version: env!("CARGO_PKG_VERSION"),
    };
    let html = state
        .templates
        .get_template("home.html")?
        .render(minijinja::Value::from_serialize(&context))?;
    Ok(Html(html).into_response())
}

/// Which HTML element the player page embeds for a MIME type.
fn media_element(mime: &str) -> &'static str {
    if mime.starts_with("video/") {
        "video"
    } else if mime.starts_with("audio/") {
        "audio"
    } else if mime.starts_with("image/") {
        "image"
    } else {
        "file"
    }
}

/// Byte count the way the page shows it, e.g. `3.0 MiB`.
#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
