//! Link fingerprinting for shareable stream URLs.
//!
//! Every file is identified by an MD5 digest over its identity fields
//! (resolved name, byte size, MIME type, numeric file key). Public links
//! embed a short prefix of the hex digest as their `hash` parameter; on
//! each request the digest is recomputed from live metadata and compared
//! against the supplied token, so a link stops working as soon as the
//! underlying media changes or disappears.

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

/// Number of hex characters exposed in public link tokens.
///
/// Values below [`TokenLength::MIN`] fall back to the default of 6; values
/// above [`TokenLength::MAX`] are capped at the full digest width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLength(usize);

impl TokenLength {
    pub const DEFAULT: usize = 6;
    pub const MIN: usize = 5;
    pub const MAX: usize = 32;

    #[must_use]
    pub fn new(chars: usize) -> Self {
        if chars < Self::MIN {
            Self(Self::DEFAULT)
        } else if chars > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(chars)
        }
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for TokenLength {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Full 32-character lowercase hex MD5 digest of a file's identity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The public token: the leading `len` characters of the digest.
    #[must_use]
    pub fn token(&self, len: TokenLength) -> &str {
        &self.0[..len.get()]
    }

    /// Compare a supplied token against this digest's prefix in constant
    /// time. Tokens of the wrong length never match.
    #[must_use]
    pub fn matches(&self, supplied: &str, len: TokenLength) -> bool {
        supplied
            .as_bytes()
            .ct_eq(self.token(len).as_bytes())
            .into()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the link fingerprint over a file's identity fields.
///
/// Numeric fields are hashed as their decimal string rendering, and field
/// order is load-bearing: tokens minted at upload time must keep verifying
/// for as long as the metadata is unchanged.
#[must_use]
pub fn link_fingerprint(name: &str, size: u64, mime: &str, file_key: i64) -> Fingerprint {
    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    hasher.update(size.to_string().as_bytes());
    hasher.update(mime.as_bytes());
    hasher.update(file_key.to_string().as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
