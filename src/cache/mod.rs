//! The response cache (§4.H): a file-based store keyed by request
//! fingerprint (`rtag`), with an mtime-based dependency validator so a
//! stored response survives only as long as everything it read from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::AppError;
use crate::response::Response;

/// One cached response's metadata, stored at `requests/<rtag>/meta.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CacheMeta {
    pub uri: String,
    pub qs: String,
    pub rtag: String,
    pub send_file: Option<PathBuf>,
    /// Every File/Directory the response depended on, and its mtime at
    /// store time — the validator re-stats each on every hit.
    pub deps: BTreeMap<String, u64>,
    pub cfg_mtime: Option<u64>,
    pub headers: IndexMap<String, String>,
    pub etag: String,
    pub ctime: u64,
    pub atime: u64,
    pub acount: u64,
}

pub struct ResponseCache {
    root: PathBuf,
    /// Per-rtag single-flight lock: at most one concurrent compile per
    /// fingerprint (open question resolved in favor of a stricter
    /// guarantee than "let concurrent compiles race").
    inflight: AsyncMutex<IndexMap<String, std::sync::Arc<AsyncMutex<()>>>>,
}

pub enum Lookup {
    /// Stored response is fresh; `if_modified_since` was satisfied.
    NotModified(CacheMeta),
    /// Stored response is fresh; serve its headers and body/send_file.
    Hit(CacheMeta),
    /// Nothing usable is cached; the caller must compile a fresh response.
    Miss,
}

impl ResponseCache {
    pub fn new(root: PathBuf) -> Self {
        ResponseCache {
            root,
            inflight: AsyncMutex::new(IndexMap::new()),
        }
    }

    fn meta_path(&self, rtag: &str) -> PathBuf {
        self.root.join("requests").join(rtag).join("meta.json")
    }

    fn body_path(&self, etag: &str) -> PathBuf {
        self.root.join("responses").join(etag)
    }

    /// Acquires the per-rtag single-flight guard (§9 Open Question:
    /// single-flight compiles). Held by the caller for the duration of a
    /// cache miss's compile + store.
    pub async fn lock_rtag(&self, rtag: &str) -> std::sync::Arc<AsyncMutex<()>> {
        let mut inflight = self.inflight.lock().await;
        inflight
            .entry(rtag.to_owned())
            .or_insert_with(|| std::sync::Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Looks up `rtag`, validating every dependency's mtime (§4.H rules
    /// 1-5) before deciding whether the cached entry is still usable.
    pub fn lookup(&self, rtag: &str, if_modified_since: Option<u64>, cfg_mtime: Option<u64>) -> Lookup {
        let Ok(text) = std::fs::read_to_string(self.meta_path(rtag)) else {
            return Lookup::Miss;
        };
        let Ok(mut meta) = serde_json::from_str::<CacheMeta>(&text) else {
            return Lookup::Miss;
        };

        if !self.is_valid(&meta, cfg_mtime) {
            return Lookup::Miss;
        }

        meta.atime = now();
        meta.acount += 1;
        let _ = self.write_meta(rtag, &meta);

        match if_modified_since {
            Some(since) if since >= meta.ctime => Lookup::NotModified(meta),
            _ => Lookup::Hit(meta),
        }
    }

    /// Rule order: any dep missing or newer than stored invalidates; a
    /// config mtime newer than what was stored invalidates; age-based rules
    /// come last and `max-age`/`s-maxage` take precedence over `Expires` when
    /// present (rule 4: `now - ctime > max-age` invalidates).
    fn is_valid(&self, meta: &CacheMeta, current_cfg_mtime: Option<u64>) -> bool {
        for (path, stored_mtime) in &meta.deps {
            let Ok(actual) = std::fs::metadata(path).and_then(|m| m.modified()) else {
                return false;
            };
            if to_secs(actual) != *stored_mtime {
                return false;
            }
        }

        if let (Some(stored), Some(current)) = (meta.cfg_mtime, current_cfg_mtime) {
            if current > stored {
                return false;
            }
        }

        let cache_control = meta.headers.get("Cache-Control").map(String::as_str);
        let age_limit = cache_control
            .and_then(|cc| directive_value(cc, "s-maxage"))
            .or_else(|| cache_control.and_then(|cc| directive_value(cc, "max-age")));

        match age_limit {
            Some(limit) => now().saturating_sub(meta.ctime) <= limit,
            None => match meta.headers.get("Expires").and_then(|e| httpdate::parse_http_date(e).ok()) {
                Some(expires_time) => SystemTime::now() <= expires_time,
                None => true,
            },
        }
    }

    /// Stores `response` under `rtag`, recording every dependency's mtime
    /// from its access log plus the vhost config's aggregate mtime.
    pub fn store(
        &self,
        rtag: &str,
        uri: &str,
        qs: &str,
        response: &Response,
        deps: &[(String, SystemTime)],
        cfg_mtime: Option<SystemTime>,
    ) -> Result<(), AppError> {
        if !response.can_cache {
            return Ok(());
        }

        let etag = response
            .etag
            .clone()
            .unwrap_or_else(|| format!("{:x}", simple_hash(response.body.as_bytes())));

        let meta = CacheMeta {
            uri: uri.to_owned(),
            qs: qs.to_owned(),
            rtag: rtag.to_owned(),
            send_file: response.send_file.clone(),
            deps: deps
                .iter()
                .map(|(path, mtime)| (path.clone(), to_secs(*mtime)))
                .collect(),
            cfg_mtime: cfg_mtime.map(to_secs),
            headers: response.headers.clone(),
            etag: etag.clone(),
            ctime: now(),
            atime: now(),
            acount: 0,
        };

        self.write_meta(rtag, &meta)?;

        if response.send_file.is_none() {
            crate::node::atomic_write(&self.body_path(&etag), response.body.as_bytes())?;
        }

        Ok(())
    }

    fn write_meta(&self, rtag: &str, meta: &CacheMeta) -> Result<(), AppError> {
        crate::node::atomic_write(&self.meta_path(rtag), &serde_json::to_vec_pretty(meta)?)
    }

    /// The stored body's path, if it was persisted separately from
    /// `send_file` (§4.H "zero-copy").
    pub fn body_path_for(&self, etag: &str) -> PathBuf {
        self.body_path(etag)
    }
}

/// Reads a numeric `Cache-Control` directive's value (e.g. `max-age=120`),
/// ignoring surrounding whitespace and any other directives in the list.
fn directive_value(cache_control: &str, directive: &str) -> Option<u64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(directive)?.strip_prefix('=')?.parse().ok())
}

fn now() -> u64 {
    to_secs(SystemTime::now())
}

fn to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn simple_hash(bytes: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Parses the single `Expires` header format the cache cares about. Pulled
/// in as a minimal inline shim rather than a dependency, since it's the one
/// RFC 1123 comparison the cache needs.
mod httpdate {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn parse_http_date(s: &str) -> Result<SystemTime, ()> {
        chrono::DateTime::parse_from_rfc2822(s)
            .map(|dt| UNIX_EPOCH + Duration::from_secs(dt.timestamp().max(0) as u64))
            .map_err(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    #[test]
    fn store_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf());
        let response = Response::text("hello");

        cache.store("abc123", "/x", "", &response, &[], None).unwrap();

        match cache.lookup("abc123", None, None) {
            Lookup::Hit(meta) => assert_eq!(meta.uri, "/x"),
            _ => panic!("expected a cache hit"),
        }
    }

    #[test]
    fn dep_touch_invalidates_entry() {
        let dir = tempfile::tempdir().unwrap();
        let dep_file = dir.path().join("dep.txt");
        std::fs::write(&dep_file, "v1").unwrap();
        let dep_mtime = std::fs::metadata(&dep_file).unwrap().modified().unwrap();

        let cache = ResponseCache::new(dir.path().join("cache"));
        let response = Response::text("hello");
        cache
            .store(
                "abc",
                "/x",
                "",
                &response,
                &[(dep_file.display().to_string(), dep_mtime)],
                None,
            )
            .unwrap();

        assert!(matches!(cache.lookup("abc", None, None), Lookup::Hit(_)));

        std::thread::sleep(std::time::Duration::from_millis(1100));
        std::fs::write(&dep_file, "v2 is longer than v1").unwrap();
        assert!(matches!(cache.lookup("abc", None, None), Lookup::Miss));
    }

    #[test]
    fn uncacheable_response_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf());
        let mut response = Response::text("secret");
        response.can_cache = false;

        cache.store("abc", "/x", "", &response, &[], None).unwrap();
        assert!(matches!(cache.lookup("abc", None, None), Lookup::Miss));
    }

    #[test]
    fn max_age_expiry_invalidates_once_elapsed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf());
        let mut response = Response::text("hello");
        response.set_header("Cache-Control", "max-age=1");

        cache.store("abc", "/x", "", &response, &[], None).unwrap();
        assert!(matches!(cache.lookup("abc", None, None), Lookup::Hit(_)));

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(matches!(cache.lookup("abc", None, None), Lookup::Miss));
    }

    #[test]
    fn max_age_overrides_an_already_past_expires_header() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf());
        let mut response = Response::text("hello");
        response.set_header("Expires", "Thu, 01 Jan 1970 00:00:00 GMT");
        response.set_header("Cache-Control", "max-age=3600");

        cache.store("abc", "/x", "", &response, &[], None).unwrap();
        assert!(matches!(cache.lookup("abc", None, None), Lookup::Hit(_)));
    }
}
