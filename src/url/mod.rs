//! URL parsing, relative resolution, and percent-encoding.
//!
//! Components are present-or-absent, never defaulted: a bare `/path` parses
//! with no scheme and no host, and stays that way until resolved against a
//! base. A URL only becomes a usable request target once `scheme` and `host`
//! are both set.

use std::fmt;

use crate::base::HttpError;

/// A structured URL. Every component is optional; parsing never fills in
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Url {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

/// The (scheme, host, port) triple identifying a connection endpoint.
///
/// Used as the key for the connection cache and the cookie store. The port
/// is always concrete here: URLs without an explicit port get the scheme
/// default (80 / 443).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn default_port(scheme: &str) -> u16 {
    if scheme.eq_ignore_ascii_case("https") {
        443
    } else {
        80
    }
}

impl Url {
    /// Parse a URL string into its components.
    ///
    /// Grammar: optional `scheme:` `//host` `:port` authority section, then
    /// path up to `?` or `#`, then optional `?query` and `#fragment`. A
    /// component absent from the text is left unset. The scheme is only
    /// recognized when followed by `//`; anything else (`mailto:x`) is all
    /// path. Fails with `MalformedUrl` when an authority carries a port that
    /// is not a decimal number fitting in 16 bits.
    pub fn parse(text: &str) -> Result<Url, HttpError> {
        let mut url = Url::default();
        let mut rest = text;

        // Authority section: "scheme://host:port" with scheme and port optional.
        if let Some(idx) = rest.find("//") {
            let prefix = &rest[..idx];
            let scheme_ok = prefix.is_empty()
                || (prefix.ends_with(':')
                    && !prefix[..prefix.len() - 1].contains(['/', '?', '#', ':']));
            if scheme_ok {
                if !prefix.is_empty() {
                    url.scheme = Some(prefix[..prefix.len() - 1].to_string());
                }
                rest = &rest[idx + 2..];
                let host_end = rest
                    .find([':', '/', '?', '#'])
                    .unwrap_or(rest.len());
                url.host = Some(rest[..host_end].to_string());
                rest = &rest[host_end..];
                if let Some(after) = rest.strip_prefix(':') {
                    let port_end = after.find(['/', '?', '#']).unwrap_or(after.len());
                    let digits = &after[..port_end];
                    let port = digits
                        .parse::<u16>()
                        .map_err(|_| HttpError::MalformedUrl(text.to_string()))?;
                    url.port = Some(port);
                    rest = &after[port_end..];
                }
            }
        }

        let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
        if path_end > 0 {
            url.path = Some(rest[..path_end].to_string());
        }
        rest = &rest[path_end..];

        if let Some(after) = rest.strip_prefix('?') {
            let query_end = after.find('#').unwrap_or(after.len());
            url.query = Some(after[..query_end].to_string());
            rest = &after[query_end..];
        }
        if let Some(after) = rest.strip_prefix('#') {
            url.fragment = Some(after.to_string());
        }

        Ok(url)
    }

    /// Fill every unset component from `base`, merging paths when both are
    /// set and the receiver's is relative.
    pub fn resolve(&mut self, base: &Url) -> &mut Self {
        if self.scheme.is_none() {
            self.scheme = base.scheme.clone();
        }
        if self.host.is_none() {
            self.host = base.host.clone();
        }
        if self.port.is_none() {
            self.port = base.port;
        }
        match (&self.path, &base.path) {
            (None, Some(_)) => self.path = base.path.clone(),
            (Some(own), Some(other)) => self.path = Some(merge_paths(other, own)),
            _ => {}
        }
        if self.query.is_none() {
            self.query = base.query.clone();
        }
        if self.fragment.is_none() {
            self.fragment = base.fragment.clone();
        }
        self
    }

    /// The path + query + fragment portion, as it appears in a request line.
    /// An unset path renders as `/`.
    pub fn request_target(&self) -> String {
        let mut s = String::new();
        match &self.path {
            Some(p) => s.push_str(p),
            None => s.push('/'),
        }
        if let Some(q) = &self.query {
            s.push('?');
            s.push_str(q);
        }
        if let Some(f) = &self.fragment {
            s.push('#');
            s.push_str(f);
        }
        s
    }

    /// The connection endpoint, if this URL is a complete request target.
    pub fn authority(&self) -> Option<Authority> {
        let scheme = self.scheme.as_ref()?;
        let host = self.host.as_ref()?;
        Some(Authority {
            scheme: scheme.clone(),
            host: host.clone(),
            port: self.port.unwrap_or_else(|| default_port(scheme)),
        })
    }
}

impl fmt::Display for Url {
    /// Inverse of [`Url::parse`] over defined components: each unset
    /// component is omitted along with its separator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = &self.scheme {
            write!(f, "{s}:")?;
        }
        if let Some(h) = &self.host {
            write!(f, "//{h}")?;
        }
        if let Some(p) = self.port {
            write!(f, ":{p}")?;
        }
        if let Some(p) = &self.path {
            write!(f, "{p}")?;
        }
        if let Some(q) = &self.query {
            write!(f, "?{q}")?;
        }
        if let Some(fr) = &self.fragment {
            write!(f, "#{fr}")?;
        }
        Ok(())
    }
}

/// Merge a relative path onto a base path.
///
/// An absolute `relative` (leading `/`) wins unchanged. Otherwise the base
/// path loses everything after its last `/` and the relative segments are
/// appended. Each `..` segment removes itself and the segment before it,
/// clamped at the path root: a `..` with nothing before it is dropped, and
/// the leading empty segment of an absolute base is never consumed.
pub fn merge_paths(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        return relative.to_string();
    }
    let dir = match base.rfind('/') {
        Some(idx) => &base[..idx],
        None => return relative.to_string(),
    };

    let mut out: Vec<&str> = Vec::new();
    for seg in dir.split('/').chain(relative.split('/')) {
        if seg == ".." {
            // Keep the root marker of an absolute path.
            if out.len() > 1 || out.first().is_some_and(|s| !s.is_empty()) {
                out.pop();
            }
        } else {
            out.push(seg);
        }
    }
    out.join("/")
}

/// Percent-encode every byte except ASCII letters, digits, and `-_.~`.
pub fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_url() {
        let url = Url::parse("http://example.com:8080/a/b?x=1#frag").unwrap();
        assert_eq!(url.scheme.as_deref(), Some("http"));
        assert_eq!(url.host.as_deref(), Some("example.com"));
        assert_eq!(url.port, Some(8080));
        assert_eq!(url.path.as_deref(), Some("/a/b"));
        assert_eq!(url.query.as_deref(), Some("x=1"));
        assert_eq!(url.fragment.as_deref(), Some("frag"));
    }

    #[test]
    fn parse_leaves_absent_components_unset() {
        let url = Url::parse("/just/a/path").unwrap();
        assert_eq!(url.scheme, None);
        assert_eq!(url.host, None);
        assert_eq!(url.port, None);
        assert_eq!(url.path.as_deref(), Some("/just/a/path"));
        assert_eq!(url.query, None);
        assert_eq!(url.fragment, None);
    }

    #[test]
    fn parse_host_without_path() {
        let url = Url::parse("https://example.com").unwrap();
        assert_eq!(url.host.as_deref(), Some("example.com"));
        assert_eq!(url.path, None);
    }

    #[test]
    fn parse_rejects_bad_port() {
        assert!(matches!(
            Url::parse("http://example.com:abc/"),
            Err(HttpError::MalformedUrl(_))
        ));
        assert!(matches!(
            Url::parse("http://example.com:99999/"),
            Err(HttpError::MalformedUrl(_))
        ));
    }

    #[test]
    fn parse_scheme_without_slashes_is_path() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert_eq!(url.scheme, None);
        assert_eq!(url.path.as_deref(), Some("mailto:someone@example.com"));
    }

    #[test]
    fn to_string_round_trips() {
        for text in [
            "http://example.com:8080/a/b?x=1#frag",
            "https://example.com",
            "/relative/path",
            "http://h/p",
            "//host/path?q",
        ] {
            let url = Url::parse(text).unwrap();
            assert_eq!(Url::parse(&url.to_string()).unwrap(), url, "{text}");
        }
    }

    #[test]
    fn resolve_relative_against_base() {
        let base = Url::parse("http://host/a/b/c").unwrap();
        let mut url = Url::parse("../d").unwrap();
        url.resolve(&base);
        assert_eq!(url.to_string(), "http://host/a/d");
    }

    #[test]
    fn resolve_absolute_path_wins() {
        let base = Url::parse("http://host/a/b/c").unwrap();
        let mut url = Url::parse("/x").unwrap();
        url.resolve(&base);
        assert_eq!(url.path.as_deref(), Some("/x"));
    }

    #[test]
    fn resolve_clamps_excess_dotdot() {
        let base = Url::parse("http://h/a/").unwrap();
        let mut url = Url::parse("../../../x").unwrap();
        url.resolve(&base);
        assert_eq!(url.path.as_deref(), Some("/x"));
    }

    #[test]
    fn resolve_fills_unset_components_only() {
        let base = Url::parse("https://example.com:444/base?bq#bf").unwrap();
        let mut url = Url::parse("http://other/p").unwrap();
        url.resolve(&base);
        assert_eq!(url.scheme.as_deref(), Some("http"));
        assert_eq!(url.host.as_deref(), Some("other"));
        assert_eq!(url.port, Some(444));
        assert_eq!(url.path.as_deref(), Some("/p"));
        assert_eq!(url.query.as_deref(), Some("bq"));
        assert_eq!(url.fragment.as_deref(), Some("bf"));
    }

    #[test]
    fn merge_keeps_plain_segments() {
        assert_eq!(merge_paths("/a/b/c", "d/e"), "/a/b/d/e");
        assert_eq!(merge_paths("noslash", "d"), "d");
    }

    #[test]
    fn authority_uses_default_ports() {
        let http = Url::parse("http://h/").unwrap().authority().unwrap();
        assert_eq!(http.port, 80);
        let https = Url::parse("https://h/").unwrap().authority().unwrap();
        assert_eq!(https.port, 443);
        assert_eq!(https.to_string(), "https://h:443");
        assert!(Url::parse("/p").unwrap().authority().is_none());
    }

    #[test]
    fn percent_encode_charset() {
        assert_eq!(percent_encode("AZaz09-_.~"), "AZaz09-_.~");
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("=&?"), "%3D%26%3F");
    }
}
