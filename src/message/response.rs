use crate::base::HttpError;
use crate::message::Headers;

/// An HTTP response. Status line is `PROTOCOL code text`.
///
/// The status code is kept as the string received on the wire; the
/// classification helpers parse it on demand and return `false` for
/// anything unparseable.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub version: String,
    pub status_code: String,
    pub status_text: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status_code: &str, status_text: &str) -> Response {
        Response {
            version: "HTTP/1.1".to_string(),
            status_code: status_code.to_string(),
            status_text: status_text.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Parse a response head (status line + header block, no body).
    pub fn parse_head(head: &str) -> Result<Response, HttpError> {
        let (status, header_block) = crate::message::split_status_headers(head);

        let mut parts = status.splitn(3, ' ');
        let version = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HttpError::InvalidResponse("empty status line".into()))?;
        let code = parts
            .next()
            .ok_or_else(|| HttpError::InvalidResponse("status line missing code".into()))?;
        let text = parts.next().unwrap_or("");

        let mut headers = Headers::new();
        headers.parse_block(header_block);

        Ok(Response {
            version: version.to_string(),
            status_code: code.to_string(),
            status_text: text.to_string(),
            headers,
            body: Vec::new(),
        })
    }

    /// Parse a complete wire response, body included.
    pub fn parse(wire: &[u8]) -> Result<Response, HttpError> {
        let (head, body) = crate::message::split_head_body(wire)?;
        let mut response = Response::parse_head(head)?;
        response.body = body.to_vec();
        Ok(response)
    }

    pub fn status_line(&self) -> String {
        format!("{} {} {}", self.version, self.status_code, self.status_text)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.status_line().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.headers.serialize().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Declared `Content-Length`, when present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Whether `Transfer-Encoding` declares a chunked body.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }

    fn code(&self) -> Option<u16> {
        self.status_code.trim().parse().ok()
    }

    pub fn is_informational(&self) -> bool {
        self.code().is_some_and(|c| (100..200).contains(&c))
    }

    pub fn is_success(&self) -> bool {
        self.code().is_some_and(|c| (200..300).contains(&c))
    }

    pub fn is_redirect(&self) -> bool {
        self.code().is_some_and(|c| (300..400).contains(&c))
    }

    pub fn is_client_error(&self) -> bool {
        self.code().is_some_and(|c| (400..500).contains(&c))
    }

    pub fn is_server_error(&self) -> bool {
        self.code().is_some_and(|c| (500..600).contains(&c))
    }

    pub fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_head_splits_status_line() {
        let res =
            Response::parse_head("HTTP/1.1 404 Not Found\r\nContent-Type: text/plain").unwrap();
        assert_eq!(res.version, "HTTP/1.1");
        assert_eq!(res.status_code, "404");
        assert_eq!(res.status_text, "Not Found");
        assert_eq!(res.headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn parse_keeps_multi_value_headers() {
        let wire = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\nbody";
        let res = Response::parse(wire).unwrap();
        assert_eq!(res.headers.get_all("set-cookie").unwrap().len(), 2);
        assert_eq!(res.body, b"body");
    }

    #[test]
    fn status_text_may_contain_spaces() {
        let res = Response::parse_head("HTTP/1.1 500 Internal Server Error").unwrap();
        assert_eq!(res.status_text, "Internal Server Error");
    }

    #[test]
    fn classification_buckets() {
        assert!(Response::new("101", "x").is_informational());
        assert!(Response::new("204", "x").is_success());
        assert!(Response::new("301", "x").is_redirect());
        assert!(Response::new("404", "x").is_client_error());
        assert!(Response::new("500", "x").is_server_error());
        assert!(Response::new("500", "x").is_error());
        assert!(!Response::new("bogus", "x").is_error());
    }

    #[test]
    fn framing_helpers() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let res = Response::parse(wire).unwrap();
        assert_eq!(res.content_length(), Some(5));
        assert!(!res.is_chunked());

        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
        let res = Response::parse(wire).unwrap();
        assert!(res.is_chunked());
    }
}
