//! Shared scaffolding for the end-to-end lifecycle scenarios: each test gets
//! its own doc root under a TempDir, with an optional `conf/site.hf`.

use std::sync::Arc;

use hubd::cache::ResponseCache;
use hubd::hub::vhost::{VhostKey, VhostRegistry, VhostState};

/// Spins up a fresh vhost rooted at a TempDir. `site_hf`, if given, becomes
/// `conf/site.hf`; `files` are written relative to the doc root, which is the
/// root itself (a single-vhost deployment, per `application.vhost_roots`).
pub fn vhost_with(site_hf: Option<&str>, files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<VhostState>) {
    let dir = tempfile::tempdir().unwrap();
    if let Some(text) = site_hf {
        let conf = dir.path().join("conf");
        std::fs::create_dir_all(&conf).unwrap();
        std::fs::write(conf.join("site.hf"), text).unwrap();
    }
    for (rel, content) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    let registry = VhostRegistry::new();
    let key = VhostKey {
        server_hostname: "example.com".into(),
        port: 80,
        doc_root: dir.path().to_path_buf(),
    };
    let vhost = registry.get_or_init(key).unwrap();
    (dir, vhost)
}

pub fn fresh_cache() -> Arc<ResponseCache> {
    Arc::new(ResponseCache::new(tempfile::tempdir().unwrap().into_path()))
}
