//! HTTP `Range` header resolution.
//!
//! Spout accepts the single-range `bytes=start-end` form with either bound
//! omittable. A header it cannot parse degrades to the full `0..end` span
//! instead of rejecting the request, because in-the-wild players send some
//! remarkable garbage; seeking at or past the end of the file is the one
//! hard failure.

/// Outcome of resolving a `Range` header against a file's total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRange {
    /// No header was sent: serve the whole file with a `200`.
    Full,
    /// Serve `[start, end]` inclusive with a `206` and a `Content-Range`.
    Partial { start: u64, end: u64 },
    /// Requested start lies at or beyond the end of the file: `416`.
    Unsatisfiable,
}

impl ResolvedRange {
    /// Inclusive byte bounds to serve.
    ///
    /// `None` for unsatisfiable ranges and for empty files, which have no
    /// bytes to bound.
    #[must_use]
    pub fn bounds(self, total: u64) -> Option<(u64, u64)> {
        match self {
            Self::Full if total > 0 => Some((0, total - 1)),
            Self::Partial { start, end } => Some((start, end)),
            Self::Full | Self::Unsatisfiable => None,
        }
    }
}

/// Resolve an optional `Range` header value against the file's total size.
///
/// An omitted start bound means byte zero and an omitted end bound means
/// end of file; ends past the file are clamped, not rejected. Any header
/// that fails to parse (wrong unit, extra dashes, non-numeric or inverted
/// bounds) is treated as `bytes=0-`.
#[must_use]
pub fn resolve_range(header: Option<&str>, total: u64) -> ResolvedRange {
    let Some(raw) = header else {
        return ResolvedRange::Full;
    };
    let (start, end) = parse_bounds(raw).unwrap_or((0, None));
    if start >= total {
        return ResolvedRange::Unsatisfiable;
    }
    let end = end.unwrap_or(total - 1).min(total - 1);
    if start > end {
        // Inverted bounds, e.g. `bytes=5-2`. Fail open like any other
        // malformed header.
        return ResolvedRange::Partial {
            start: 0,
            end: total - 1,
        };
    }
    ResolvedRange::Partial { start, end }
}

/// Parse `bytes=start-end` into `(start, end)`. `None` on anything else.
fn parse_bounds(raw: &str) -> Option<(u64, Option<u64>)> {
    let spec = raw.trim().strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;
    if end_str.contains('-') {
        return None;
    }
    let start = match start_str.trim() {
        "" => 0,
        s => s.parse().ok()?,
    };
    let end = match end_str.trim() {
        "" => None,
        s => Some(s.parse().ok()?),
    };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u64 = 3_145_728;

    #[test]
    fn absent_header_serves_full_file() {
        assert_eq!(resolve_range(None, SIZE), ResolvedRange::Full);
        assert_eq!(ResolvedRange::Full.bounds(SIZE), Some((0, SIZE - 1)));
    }

    #[test]
    fn explicit_bounds() {
        assert_eq!(
            resolve_range(Some("bytes=0-99"), SIZE),
            ResolvedRange::Partial { start: 0, end: 99 }
        );
        assert_eq!(
            resolve_range(Some("bytes=1048576-2097151"), SIZE),
            ResolvedRange::Partial {
                start: 1_048_576,
                end: 2_097_151
            }
        );
        assert_eq!(
            resolve_range(Some("bytes=0-0"), SIZE),
            ResolvedRange::Partial { start: 0, end: 0 }
        );
    }

    #[test]
    fn omitted_end_runs_to_eof() {
        assert_eq!(
            resolve_range(Some("bytes=1048576-"), SIZE),
            ResolvedRange::Partial {
                start: 1_048_576,
                end: SIZE - 1
            }
        );
        assert_eq!(
            resolve_range(Some("bytes=0-"), SIZE),
            ResolvedRange::Partial {
                start: 0,
                end: SIZE - 1
            }
        );
    }

    #[test]
    fn omitted_start_means_byte_zero() {
        assert_eq!(
            resolve_range(Some("bytes=-500"), SIZE),
            ResolvedRange::Partial { start: 0, end: 500 }
        );
    }

    #[test]
    fn end_past_eof_is_clamped() {
        assert_eq!(
            resolve_range(Some("bytes=100-99999999999"), SIZE),
            ResolvedRange::Partial {
                start: 100,
                end: SIZE - 1
            }
        );
    }

    #[test]
    fn start_at_or_past_eof_is_unsatisfiable() {
        assert_eq!(
            resolve_range(Some("bytes=3145728-"), SIZE),
            ResolvedRange::Unsatisfiable
        );
        assert_eq!(
            resolve_range(Some("bytes=9999999999-"), SIZE),
            ResolvedRange::Unsatisfiable
        );
        assert_eq!(ResolvedRange::Unsatisfiable.bounds(SIZE), None);
    }

    #[test]
    fn malformed_headers_fail_open() {
        for raw in [
            "bytes=abc-def",
            "bytes=12",
            "bytes=1-2-3",
            "items=0-99",
            "bytes=5-2",
            "",
            "bytes=0x10-",
        ] {
            assert_eq!(
                resolve_range(Some(raw), SIZE),
                ResolvedRange::Partial {
                    start: 0,
                    end: SIZE - 1
                },
                "header {raw:?} should fail open"
            );
        }
    }

    #[test]
    fn any_range_on_empty_file_is_unsatisfiable() {
        assert_eq!(resolve_range(Some("bytes=0-"), 0), ResolvedRange::Unsatisfiable);
        assert_eq!(resolve_range(Some("garbage"), 0), ResolvedRange::Unsatisfiable);
        assert_eq!(resolve_range(None, 0), ResolvedRange::Full);
        assert_eq!(ResolvedRange::Full.bounds(0), None);
    }
}
