//! Content-encoding negotiation and decompression.
//!
//! Push decoders wrap `flate2`'s write-side decompressors so body fragments
//! can be decoded as they arrive, without waiting for the full response.

use std::io::Write;

use flate2::write::{GzDecoder, ZlibDecoder};

use crate::base::HttpError;
use crate::message::Response;

/// A supported `Content-Encoding` codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Deflate,
}

impl Codec {
    /// The token used in `Accept-Encoding` / `Content-Encoding`.
    pub fn token(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
        }
    }

    pub fn from_token(token: &str) -> Option<Codec> {
        match token.trim().to_ascii_lowercase().as_str() {
            "gzip" => Some(Codec::Gzip),
            "deflate" => Some(Codec::Deflate),
            _ => None,
        }
    }
}

/// Pick the decoder for a response. `None` when the body is not encoded;
/// `UnsupportedCodec` when the declared encoding is unknown or was not in
/// the configured set.
pub fn negotiate(response: &Response, configured: &[Codec]) -> Result<Option<Codec>, HttpError> {
    let Some(declared) = response.headers.get("content-encoding") else {
        return Ok(None);
    };
    let declared = declared.trim();
    if declared.is_empty() || declared.eq_ignore_ascii_case("identity") {
        return Ok(None);
    }
    match Codec::from_token(declared) {
        Some(codec) if configured.contains(&codec) => Ok(Some(codec)),
        _ => Err(HttpError::UnsupportedCodec(declared.to_string())),
    }
}

enum Inner {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(ZlibDecoder<Vec<u8>>),
}

/// Incremental decompressor: push compressed fragments in, take decoded
/// bytes out. [`finish`](StreamingDecoder::finish) flushes the trailer.
pub struct StreamingDecoder {
    inner: Inner,
}

impl StreamingDecoder {
    pub fn new(codec: Codec) -> StreamingDecoder {
        let inner = match codec {
            Codec::Gzip => Inner::Gzip(GzDecoder::new(Vec::new())),
            Codec::Deflate => Inner::Deflate(ZlibDecoder::new(Vec::new())),
        };
        StreamingDecoder { inner }
    }

    /// Decode one compressed fragment, returning whatever plaintext became
    /// available (possibly empty).
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<u8>, HttpError> {
        let out = match &mut self.inner {
            Inner::Gzip(decoder) => {
                decoder
                    .write_all(data)
                    .map_err(|e| HttpError::Decode(e.to_string()))?;
                decoder.get_mut()
            }
            Inner::Deflate(decoder) => {
                decoder
                    .write_all(data)
                    .map_err(|e| HttpError::Decode(e.to_string()))?;
                decoder.get_mut()
            }
        };
        Ok(std::mem::take(out))
    }

    /// Finish the stream and return any remaining plaintext. Errors if the
    /// compressed stream was truncated or corrupt.
    pub fn finish(self) -> Result<Vec<u8>, HttpError> {
        match self.inner {
            Inner::Gzip(decoder) => decoder.finish(),
            Inner::Deflate(decoder) => decoder.finish(),
        }
        .map_err(|e| HttpError::Decode(e.to_string()))
    }
}

/// One-shot decode of a complete body.
pub fn decode_all(codec: Codec, body: &[u8]) -> Result<Vec<u8>, HttpError> {
    let mut decoder = StreamingDecoder::new(codec);
    let mut out = decoder.push(body)?;
    out.extend(decoder.finish()?);
    Ok(out)
}
