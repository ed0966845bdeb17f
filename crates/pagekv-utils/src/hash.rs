use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Length of the short shasum form used for short permalinks.
pub const SHORT_SHASUM_LEN: usize = 10;

/// Hex sha-256 of page content; the stable primary key of an indexed page.
#[must_use]
pub fn content_shasum(content: &[u8]) -> String {
    let digest = Sha256::digest(content);

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }

    out
}

/// Leading `SHORT_SHASUM_LEN` characters of a shasum (or all of it, if shorter).
#[must_use]
pub fn short_shasum(shasum: &str) -> &str {
    shasum
        .char_indices()
        .nth(SHORT_SHASUM_LEN)
        .map_or(shasum, |(idx, _)| &shasum[..idx])
}
