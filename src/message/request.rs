use std::fmt;

use crate::base::HttpError;
use crate::message::Headers;
use crate::url::{percent_encode, Url};

/// HTTP request method, serialized uppercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Extension(s) => s,
        }
    }

    pub fn from_name(name: &str) -> Method {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Extension(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body: raw bytes, or a structured field map that the agent
/// url-encodes as `name=value` pairs joined by `&` at prepare time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    Form(Vec<(String, String)>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(b) => b.is_empty(),
            Body::Form(f) => f.is_empty(),
        }
    }

    /// Wire bytes for this body; the form variant is percent-encoded.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Bytes(b) => b.clone(),
            Body::Form(fields) => fields
                .iter()
                .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
                .collect::<Vec<_>>()
                .join("&")
                .into_bytes(),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Bytes(text.as_bytes().to_vec())
    }
}

/// An HTTP request. Status line is `METHOD target-path PROTOCOL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub target: Url,
    pub version: String,
    pub headers: Headers,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, target: Url) -> Request {
        Request {
            method,
            target,
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} {} {}",
            self.method,
            self.target.request_target(),
            self.version
        )
    }

    /// Serialize to wire bytes: status line, headers, blank line, body.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.status_line().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.headers.serialize().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body.encode());
        out
    }

    /// Parse a wire request back into its parts. Exact inverse of
    /// [`Request::to_wire`] for byte bodies.
    pub fn parse(wire: &[u8]) -> Result<Request, HttpError> {
        let (head, body) = crate::message::split_head_body(wire)?;
        let (status, header_block) = crate::message::split_status_headers(head);

        let mut parts = status.splitn(3, ' ');
        let method = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HttpError::InvalidResponse("empty request line".into()))?;
        let target = parts
            .next()
            .ok_or_else(|| HttpError::InvalidResponse("request line missing target".into()))?;
        let version = parts.next().unwrap_or("").to_string();

        let mut headers = Headers::new();
        headers.parse_block(header_block);

        Ok(Request {
            method: Method::from_name(method),
            target: Url::parse(target)?,
            version,
            headers,
            body: Body::Bytes(body.to_vec()),
        })
    }
}
