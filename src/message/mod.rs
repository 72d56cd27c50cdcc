//! The HTTP message model: headers, requests, and responses.
//!
//! Requests and responses differ only in their status-line shape; header
//! storage, body handling, and wire (de)serialization are shared. Wire form
//! is the standard textual framing: status line, `Name: value` lines, a
//! blank-line terminator, then raw body bytes.

mod headers;
mod request;
mod response;

pub use headers::Headers;
pub use request::{Body, Method, Request};
pub use response::Response;

use crate::base::HttpError;

/// Split a wire message at the first blank-line boundary into the head
/// (status line + header block, without the terminator) and the body bytes.
pub(crate) fn split_head_body(wire: &[u8]) -> Result<(&str, &[u8]), HttpError> {
    let idx = wire
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| HttpError::InvalidResponse("missing header terminator".into()))?;
    let head = std::str::from_utf8(&wire[..idx])
        .map_err(|_| HttpError::InvalidResponse("non-utf8 message head".into()))?;
    Ok((head, &wire[idx + 4..]))
}

/// Split a head into its status line and header block.
pub(crate) fn split_status_headers(head: &str) -> (&str, &str) {
    match head.find("\r\n") {
        Some(idx) => (&head[..idx], &head[idx + 2..]),
        None => (head, ""),
    }
}
