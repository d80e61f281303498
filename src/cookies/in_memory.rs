use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use http::header::COOKIE;
use http::HeaderMap;
use indexmap::IndexMap;

use crate::cookies::CookieStore;

/// In-memory cookie store (no persistence).
///
/// Keeps cookies in insertion order; replacing a cookie keeps its position. Useful for
/// tests and for hosts that hand over the request cookies once per run.
#[derive(Debug, Default)]
pub struct InMemoryCookieStore {
    cookies: RwLock<IndexMap<String, String>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a `Cookie` request header value (`"a=1; b=2"`).
    ///
    /// Pairs without `=` are skipped. When a name repeats, the last value wins.
    pub fn from_cookie_header(header: &str) -> Self {
        let store = Self::new();
        {
            let mut cookies = store.cookies.write().unwrap_or_else(PoisonError::into_inner);
            parse_cookie_header(header, &mut cookies);
        }
        store
    }

    /// Builds a store from every `Cookie` header in `headers`.
    pub fn from_request_headers(headers: &HeaderMap) -> Self {
        let store = Self::new();
        {
            let mut cookies = store.cookies.write().unwrap_or_else(PoisonError::into_inner);
            for value in headers.get_all(COOKIE) {
                match value.to_str() {
                    Ok(header) => parse_cookie_header(header, &mut cookies),
                    Err(e) => log::warn!("skipping non-ASCII Cookie header: {}", e),
                }
            }
        }
        store
    }

    /// Renders the stored cookies as a `Cookie` request header value.
    pub fn to_cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn len(&self) -> usize {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_cookie_header(header: &str, cookies: &mut IndexMap<String, String>) {
    for pair in header.split(';') {
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            cookies.insert(name.to_string(), value.to_string());
        }
    }
}

impl CookieStore for InMemoryCookieStore {
    fn all_cookies(&self) -> Result<IndexMap<String, String>> {
        Ok(self.cookies.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set_cookie(&self, name: &str, value: &str) -> Result<()> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_cookie(&self, name: &str) -> Result<()> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name);
        Ok(())
    }

    fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }
}
