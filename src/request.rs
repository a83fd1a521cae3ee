//! The request object (§4.E): everything the lifecycle accumulates about an
//! inbound HTTP request, held per-request under the conceptual `/sys/request`
//! tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::hub::Hub;

/// `page` member of a request: the URI broken into hub-address terms.
#[derive(Clone, Debug)]
pub struct Page {
    pub full_uri: String,
    pub uri: String,
    pub href: String,
    pub addr: Address,
    pub parent: Address,
    pub name: String,
}

impl Page {
    pub fn from_uri(uri: &str) -> Self {
        let addr = Address::parse(uri);
        Page {
            full_uri: uri.to_owned(),
            uri: uri.to_owned(),
            href: addr.to_canonical(),
            parent: addr.parent(),
            name: addr.name().to_owned(),
            addr,
        }
    }
}

/// A request's accumulated state through the lifecycle phases.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: String,
    pub scheme: String,
    pub hostname: String,
    pub uri: String,
    /// Ordered multimap; repeated query keys keep every value in order.
    pub qs: Vec<(String, String)>,
    pub cookies: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
    /// Lazily materialized from body or query, depending on `Content-Type`.
    pub cgi: IndexMap<String, String>,
    /// Case-insensitive map of every `X-*` name, merged from headers and
    /// query, used for internal control directives.
    pub xargs: BTreeMap<String, String>,
    pub page: Page,
    /// Previous URIs, for subrequests.
    pub stack: Vec<String>,
    pub depth: usize,
    pub username: Option<String>,
    /// Group memberships of `username`, resolved at session-identify time
    /// (empty for an anonymous visitor). Threaded into permission checks.
    pub groups: Vec<String>,
    /// The owning vhost's hub, made available to responders (notably the
    /// hub data API) that need to resolve addresses other than `page.addr`.
    pub hub: Option<Arc<Hub>>,
    /// The parsed JSON request body, for `Content-Type: application/json`
    /// requests. The hub data API reads structured verb arguments (`value`,
    /// `order`, `items`) from here rather than from `qs`, which only ever
    /// carries strings.
    pub body_json: Option<serde_json::Value>,
    /// The raw request body bytes, always populated regardless of
    /// `Content-Type`. The hub data API's `upload` verb spools this directly
    /// rather than relying on `body_json`, which only ever holds structured
    /// JSON arguments.
    pub raw_body: Vec<u8>,
}

impl Request {
    pub fn new(method: String, scheme: String, hostname: String, uri: String) -> Self {
        Request {
            page: Page::from_uri(&uri),
            method,
            scheme,
            hostname,
            uri,
            qs: Vec::new(),
            cookies: IndexMap::new(),
            headers: IndexMap::new(),
            cgi: IndexMap::new(),
            xargs: BTreeMap::new(),
            stack: Vec::new(),
            depth: 0,
            username: None,
            groups: Vec::new(),
            hub: None,
            body_json: None,
            raw_body: Vec::new(),
        }
    }

    /// Builds a nested subrequest sharing `/sys` conceptually with the
    /// parent (§4.J "for subrequests"), recording the parent URI on the
    /// stack and incrementing depth.
    pub fn subrequest(&self, uri: &str) -> Request {
        let mut child = self.clone();
        child.stack.push(self.uri.clone());
        child.depth += 1;
        child.uri = uri.to_owned();
        child.page = Page::from_uri(uri);
        child
    }

    pub fn xarg(&mut self, name: &str, value: String) {
        self.xargs.insert(name.to_ascii_lowercase(), value);
    }

    /// The request fingerprint (`rtag`) used to key the response cache: a
    /// checksum over the fields that determine the response given the same
    /// resource (§4.E, §4.H). Only `X-*` names on the allowlist participate,
    /// since most XArgs are internal control directives that must not
    /// fragment the cache.
    pub fn rtag(&self, internal_xarg_allowlist: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.username.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.method.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.scheme.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.hostname.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.page.addr.to_canonical().as_bytes());
        hasher.update(b"\0");
        for (key, value) in &self.qs {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"&");
        }
        hasher.update(b"\0");
        for name in internal_xarg_allowlist {
            if let Some(value) = self.xargs.get(&name.to_ascii_lowercase()) {
                hasher.update(name.as_bytes());
                hasher.update(b"=");
                hasher.update(value.as_bytes());
                hasher.update(b";");
            }
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtag_is_stable_for_identical_requests() {
        let a = Request::new("GET".into(), "http".into(), "example.com".into(), "/x".into());
        let b = Request::new("GET".into(), "http".into(), "example.com".into(), "/x".into());
        assert_eq!(a.rtag(&[]), b.rtag(&[]));
    }

    #[test]
    fn rtag_differs_on_method_or_uri() {
        let a = Request::new("GET".into(), "http".into(), "example.com".into(), "/x".into());
        let b = Request::new("POST".into(), "http".into(), "example.com".into(), "/x".into());
        let c = Request::new("GET".into(), "http".into(), "example.com".into(), "/y".into());
        assert_ne!(a.rtag(&[]), b.rtag(&[]));
        assert_ne!(a.rtag(&[]), c.rtag(&[]));
    }

    #[test]
    fn subrequest_tracks_stack_and_depth() {
        let parent = Request::new("GET".into(), "http".into(), "example.com".into(), "/a".into());
        let child = parent.subrequest("/b");
        assert_eq!(child.stack, vec!["/a".to_owned()]);
        assert_eq!(child.depth, 1);
        assert_eq!(child.uri, "/b");
    }
}
