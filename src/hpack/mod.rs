//! HPACK (RFC 7541) response-header encoding.
//!
//! This module is split the way the subject matter splits: a static
//! table (this file), a dynamic table (`table`), the per-header
//! encoding-form decision and the top-level header-block driver
//! (`encoder`), the primitive wire-form writers HPACK layers on top of
//! (`primitive`), a Huffman coder for string literals (`huffman`), and
//! the producer-side contract callers implement (`producer`).

mod encoder;
mod huffman;
mod primitive;
mod producer;
mod table;

pub use encoder::Encoder;
pub use producer::{HeaderProducer, VecHeaderProducer};

use http::header::{HeaderName, HeaderValue};

/// Number of entries in the HPACK static table (RFC 7541 Appendix A).
pub const STATIC_TABLE_LEN: usize = 61;

/// `entry_size` from RFC 7541 §4.1: every header field stored in the
/// dynamic table costs 32 bytes beyond its name and value, to account
/// for the overhead of the entry structure in a real implementation.
pub(crate) fn entry_size(name: &HeaderName, value: &HeaderValue) -> usize {
    name.as_str().len() + value.as_bytes().len() + 32
}

/// Static-table name/value pairs for ordinary header fields (entries
/// 15-61 of RFC 7541 Appendix A). Pseudo-header entries (1-14) are not
/// listed here: `:method`, `:scheme`, `:path` and `:authority` never
/// appear in a response header block, and `:status` is handled directly
/// by the header-block driver's status fast path.
const STATIC_FIELD_NAMES: [(usize, &str); 47] = [
    (15, "accept-charset"),
    (16, "accept-encoding"),
    (17, "accept-language"),
    (18, "accept-ranges"),
    (19, "accept"),
    (20, "access-control-allow-origin"),
    (21, "age"),
    (22, "allow"),
    (23, "authorization"),
    (24, "cache-control"),
    (25, "content-disposition"),
    (26, "content-encoding"),
    (27, "content-language"),
    (28, "content-length"),
    (29, "content-location"),
    (30, "content-range"),
    (31, "content-type"),
    (32, "cookie"),
    (33, "date"),
    (34, "etag"),
    (35, "expect"),
    (36, "expires"),
    (37, "from"),
    (38, "host"),
    (39, "if-match"),
    (40, "if-modified-since"),
    (41, "if-none-match"),
    (42, "if-range"),
    (43, "if-unmodified-since"),
    (44, "last-modified"),
    (45, "link"),
    (46, "location"),
    (47, "max-forwards"),
    (48, "proxy-authenticate"),
    (49, "proxy-authorization"),
    (50, "range"),
    (51, "referer"),
    (52, "refresh"),
    (53, "retry-after"),
    (54, "server"),
    (55, "set-cookie"),
    (56, "strict-transport-security"),
    (57, "transfer-encoding"),
    (58, "user-agent"),
    (59, "vary"),
    (60, "via"),
    (61, "www-authenticate"),
];

/// The 7 status codes with their own static-table entry (RFC 7541
/// Appendix A, entries 8-14). Any other status code falls back to the
/// generic encoding path with `:status`'s name indexed from entry 8.
pub(crate) const STATUS_STATIC_INDEX_200: usize = 8;

pub(crate) fn status_static_index(code: u16) -> Option<usize> {
    match code {
        200 => Some(8),
        204 => Some(9),
        206 => Some(10),
        304 => Some(11),
        400 => Some(12),
        404 => Some(13),
        500 => Some(14),
        _ => None,
    }
}

/// Returns the static-table wire index for any entry whose name matches,
/// or `None`. The static table never has two ordinary field entries
/// sharing a name, so the first (only) match is exact.
pub(crate) fn static_name_index(name: &HeaderName) -> Option<usize> {
    let name = name.as_str();
    STATIC_FIELD_NAMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(idx, _)| *idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_field_names_resolve() {
        let name = HeaderName::from_static("content-type");
        assert_eq!(static_name_index(&name), Some(31));
    }

    #[test]
    fn unknown_field_names_miss() {
        let name = HeaderName::from_static("x-custom-header");
        assert_eq!(static_name_index(&name), None);
    }

    #[test]
    fn status_fast_path_codes() {
        assert_eq!(status_static_index(200), Some(8));
        assert_eq!(status_static_index(201), None);
    }
}
