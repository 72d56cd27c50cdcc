//! Authority-keyed cookie storage.
//!
//! Deliberately simpler than an RFC 6265 jar: cookies are a flat
//! `name -> value` map per authority, and `Set-Cookie` attributes
//! (`Path`, `Expires`, ...) are folded into that map as ordinary entries
//! instead of being interpreted. Tests pin this behavior.

use std::collections::BTreeMap;
use std::path::Path;

use dashmap::DashMap;

use crate::base::HttpError;

/// Cookie names and values for one authority. BTreeMap keeps `Cookie`
/// header rendering deterministic.
pub type CookieMap = BTreeMap<String, String>;

/// Shared cookie store, keyed by authority string
/// (`scheme://host:port`).
#[derive(Debug, Default)]
pub struct CookieJar {
    store: DashMap<String, CookieMap>,
}

impl CookieJar {
    pub fn new() -> CookieJar {
        CookieJar {
            store: DashMap::new(),
        }
    }

    /// The stored cookies for an authority, if any.
    pub fn get_cookies(&self, authority: &str) -> Option<CookieMap> {
        self.store.get(authority).map(|entry| entry.clone())
    }

    /// Merge cookies into an authority's map, overwriting by name.
    pub fn set_cookies(&self, authority: &str, cookies: CookieMap) {
        if cookies.is_empty() {
            return;
        }
        self.store
            .entry(authority.to_string())
            .or_default()
            .extend(cookies);
    }

    /// Absorb one `Set-Cookie` header value: every `;`-separated
    /// `name=value` segment lands in the map, attributes included.
    pub fn absorb_header(&self, authority: &str, header_value: &str) {
        let mut cookies = CookieMap::new();
        for segment in header_value.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((name, value)) => {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
                None => {
                    cookies.insert(segment.to_string(), String::new());
                }
            }
        }
        self.set_cookies(authority, cookies);
    }

    /// Render the `Cookie` header value for an authority, or `None` when
    /// nothing is stored.
    pub fn header_value(&self, authority: &str) -> Option<String> {
        let cookies = self.get_cookies(authority)?;
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Serialize the whole jar to a JSON file,
    /// `authority -> {name -> value}`.
    pub fn save(&self, path: &Path) -> Result<(), HttpError> {
        let snapshot: BTreeMap<String, CookieMap> = self
            .store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| HttpError::Io(std::io::Error::other(e)))?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), authorities = snapshot.len(), "cookie jar saved");
        Ok(())
    }

    /// Replace the in-memory jar with the contents of a JSON file.
    pub fn load(&self, path: &Path) -> Result<(), HttpError> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: BTreeMap<String, CookieMap> = serde_json::from_str(&json)
            .map_err(|e| HttpError::Io(std::io::Error::other(e)))?;
        self.store.clear();
        for (authority, cookies) in snapshot {
            self.store.insert(authority, cookies);
        }
        tracing::debug!(path = %path.display(), "cookie jar loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_merges_and_overwrites_by_name() {
        let jar = CookieJar::new();
        jar.set_cookies("http://a:80", CookieMap::from([("x".into(), "1".into())]));
        jar.set_cookies(
            "http://a:80",
            CookieMap::from([("x".into(), "2".into()), ("y".into(), "3".into())]),
        );
        let cookies = jar.get_cookies("http://a:80").unwrap();
        assert_eq!(cookies.get("x").map(String::as_str), Some("2"));
        assert_eq!(cookies.get("y").map(String::as_str), Some("3"));
    }

    #[test]
    fn attributes_fold_into_the_map() {
        let jar = CookieJar::new();
        jar.absorb_header("http://a:80", "session=abc; Path=/; HttpOnly");
        let cookies = jar.get_cookies("http://a:80").unwrap();
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("Path").map(String::as_str), Some("/"));
        assert_eq!(cookies.get("HttpOnly").map(String::as_str), Some(""));
    }

    #[test]
    fn header_value_is_deterministic() {
        let jar = CookieJar::new();
        jar.set_cookies(
            "http://a:80",
            CookieMap::from([("b".into(), "2".into()), ("a".into(), "1".into())]),
        );
        assert_eq!(jar.header_value("http://a:80").unwrap(), "a=1; b=2");
        assert!(jar.header_value("http://other:80").is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let jar = CookieJar::new();
        jar.set_cookies("http://a:80", CookieMap::from([("x".into(), "1".into())]));
        jar.set_cookies("https://b:443", CookieMap::from([("y".into(), "2".into())]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        jar.save(&path).unwrap();

        let restored = CookieJar::new();
        restored.set_cookies("http://stale:80", CookieMap::from([("z".into(), "9".into())]));
        restored.load(&path).unwrap();

        assert!(restored.get_cookies("http://stale:80").is_none());
        assert_eq!(
            restored.get_cookies("http://a:80"),
            jar.get_cookies("http://a:80")
        );
        assert_eq!(
            restored.get_cookies("https://b:443"),
            jar.get_cookies("https://b:443")
        );
    }
}
