//! Byte-serving endpoints: `/dl/{id}` and its `/stream/{id}` alias.
//!
//! One handler covers GET and HEAD for both routes. Requests are
//! authorized against the link token, negotiated against an optional
//! `Range` header, and then streamed straight off the backend without
//! buffering the file. Byte accounting settles when the response body is
//! dropped, which covers clean completion, mid-stream failure, and client
//! disconnect alike.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, Response, StatusCode, header};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::error;

use spout_core::{ResolvedRange, resolve_range};
use spout_gateway::{GatewayError, StreamingGateway, TransferRecord, WindowStream};

use crate::error::ServerError;

use super::AppState;

/// Query parameters accepted by the byte-serving endpoints.
#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// Link token minted from the file fingerprint.
    pub hash: Option<String>,
    /// `d=true` forces a download prompt instead of inline playback.
    pub d: Option<String>,
}

/// `GET`/`HEAD` `/dl/{id}` -- serve the file's bytes, honoring `Range`.
///
/// HEAD returns the headers the matching GET would carry and closes its
/// session without touching any counter.
pub async fn download(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<String>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Result<Response<Body>, ServerError> {
    let message_id = parse_message_id(&id)?;
    let token = params
        .hash
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::BadRequest("hash query parameter is required".to_owned()))?;

    let meta = state.gateway.authorize(message_id, token).await?;
    let (ip, agent) = client_info(&headers);
    let session = state.gateway.open_session(&meta, &ip, &agent).await?;

    let total = meta.file_size;
    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let range = resolve_range(range_header, total);

    let as_attachment = params.d.as_deref() == Some("true");
    let mut builder = Response::builder()
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_TYPE, meta.mime())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(as_attachment, &meta.display_name()),
        );

    let bounds = match range {
        ResolvedRange::Unsatisfiable => {
            state.gateway.abandon_session(session.session_id);
            return Ok(Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{total}"))
                .body(Body::empty())?);
        }
        ResolvedRange::Full => {
            builder = builder
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, total);
            range.bounds(total)
        }
        ResolvedRange::Partial { start, end } => {
            builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
                .header(header::CONTENT_LENGTH, end - start + 1);
            Some((start, end))
        }
    };

    if method == Method::HEAD {
        state.gateway.abandon_session(session.session_id);
        return Ok(builder.body(Body::empty())?);
    }

    let record = TransferRecord {
        session_id: session.session_id,
        message_id: meta.message_id,
        owner_id: session.user_id,
        bytes_sent: 0,
    };

    let Some((start, end)) = bounds else {
        // Empty file: nothing to stream, but the access still settles.
        state.gateway.finish_transfer(record);
        return Ok(builder.body(Body::empty())?);
    };

    let metered = MeteredStream {
        inner: state.gateway.open_range(meta.message_id, start, end),
        gateway: Arc::clone(&state.gateway),
        message_id: meta.message_id,
        record: Some(record),
    };
    Ok(builder.body(Body::from_stream(metered))?)
}

/// Counts every byte handed to the client and settles the transfer once
/// the body is dropped.
struct MeteredStream {
    inner: WindowStream,
    gateway: Arc<StreamingGateway>,
    message_id: i64,
    record: Option<TransferRecord>,
}

impl Stream for MeteredStream {
    type Item = Result<Bytes, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.inner.poll_next_unpin(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(record) = this.record.as_mut() {
                    record.bytes_sent += chunk.len() as u64;
                }
            }
            Poll::Ready(Some(Err(e))) => {
                // Headers are long gone, so the connection just drops. The
                // log line is the only visible trace of these.
                error!(
                    message_id = this.message_id,
                    error = %e,
                    "stream aborted mid-transfer"
                );
            }
            _ => {}
        }
        polled
    }
}

impl Drop for MeteredStream {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.gateway.finish_transfer(record);
        }
    }
}

pub(super) fn parse_message_id(raw: &str) -> Result<i64, ServerError> {
    raw.parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid message id '{raw}'")))
}

/// Best-effort client identity for the session ledger.
///
/// `X-Forwarded-For` carries the original client as its first hop when
/// the server sits behind a reverse proxy.
pub(super) fn client_info(headers: &HeaderMap) -> (String, String) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_owned();
    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();
    (ip, agent)
}

/// `Content-Disposition` value with the display name quoted and escaped.
fn content_disposition(as_attachment: bool, name: &str) -> String {
    let mode = if as_attachment { "attachment" } else { "inline" };
    format!("{mode}; filename=\"{}\"", name.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_switches_on_the_download_flag() {
        assert_eq!(
            content_disposition(false, "clip.mp4"),
            "inline; filename=\"clip.mp4\""
        );
        assert_eq!(
            content_disposition(true, "clip.mp4"),
            "attachment; filename=\"clip.mp4\""
        );
    }

    #[test]
    fn disposition_escapes_embedded_quotes() {
        assert_eq!(
            content_disposition(true, "a\"b.mp4"),
            "attachment; filename=\"a\\\"b.mp4\""
        );
    }

    #[test]
    fn message_ids_must_be_integers() {
        assert_eq!(parse_message_id("42").unwrap(), 42);
        assert_eq!(parse_message_id("-7").unwrap(), -7);
        assert!(parse_message_id("42abc").is_err());
        assert!(parse_message_id("").is_err());
    }

    #[test]
    fn forwarded_header_wins_over_everything() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1".parse().unwrap(),
        );
        headers.insert(header::USER_AGENT, "curl/8.5".parse().unwrap());
        let (ip, agent) = client_info(&headers);
        assert_eq!(ip, "203.0.113.9");
        assert_eq!(agent, "curl/8.5");
    }

    #[test]
    fn missing_client_headers_degrade_to_unknown() {
        let (ip, agent) = client_info(&HeaderMap::new());
        assert_eq!(ip, "unknown");
        assert_eq!(agent, "unknown");
    }
}
