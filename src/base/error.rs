use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Validation failures (`MalformedUrl`, `InvalidTarget`) are returned
/// synchronously, before any I/O starts. Failures discovered once a request
/// is in flight (`UnsupportedCodec`, `InvalidResponse`, transport errors)
/// are delivered as [`ResponseEvent::Error`](crate::connection::ResponseEvent)
/// on the response stream, because no caller stack frame exists inside the
/// read loop. A peer closing the socket mid-response is not an error at all:
/// it is synthesized as an ordinary `500` response.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed url: {0}")]
    MalformedUrl(String),

    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    #[error("unsupported content codec: {0}")]
    UnsupportedCodec(String),

    #[error("content decoding failed: {0}")]
    Decode(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("tls failure: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
