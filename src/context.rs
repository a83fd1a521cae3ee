//! Process-wide application state (§4.J "new-request-cycle"): the vhost
//! registry every request resolves against, plus the shared response cache.
//! Carried as an axum `Extension`, mirroring the teacher's `AppContext`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::settings;
use crate::hub::vhost::VhostRegistry;

#[derive(Clone)]
pub struct AppContext {
    vhosts: Arc<VhostRegistry>,
    cache: Arc<ResponseCache>,
}

impl AppContext {
    pub fn new(vhosts: Arc<VhostRegistry>, cache: Arc<ResponseCache>) -> Self {
        AppContext { vhosts, cache }
    }

    pub fn vhosts(&self) -> &Arc<VhostRegistry> {
        &self.vhosts
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Resolves an inbound `Host` header to a document root, per
    /// `application.vhost_roots` (§A.3): a subdirectory matching `hostname`
    /// wins, falling back to the first configured root for single-vhost
    /// deployments where the root itself is the doc root.
    pub fn doc_root_for(&self, hostname: &str) -> Option<PathBuf> {
        let roots = &settings().application.vhost_roots;
        for root in roots {
            let candidate = root.join(hostname);
            if candidate.is_dir() {
                return Some(candidate);
            }
        }
        roots.first().cloned()
    }
}

/// Where the per-process cache root lives, relative to the first configured
/// vhost root (`tmp/response/cache`, per §4.H "Data layout").
pub fn cache_root() -> PathBuf {
    let roots = &settings().application.vhost_roots;
    let base = roots.first().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    base.join("tmp").join("response").join("cache")
}
