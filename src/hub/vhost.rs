//! Virtual-host registry (§4.J phase "new-request-cycle"): each distinct
//! `(hostname, port, doc_root)` gets its own long-lived Hub, config loader,
//! responder registry and permission table, created lazily on first request
//! and reused across subsequent ones.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config_loader::ConfigLoader;
use crate::error::AppError;
use crate::hub::{Hub, MountTable};
use crate::responders::ResponderRegistry;
use crate::session::permissions::PermissionTable;

/// Identifies one vhost: the triple that the server-name/port/doc-root
/// selection algorithm resolves an incoming request to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VhostKey {
    pub server_hostname: String,
    pub port: u16,
    pub doc_root: PathBuf,
}

/// All the long-lived state a vhost needs across requests.
pub struct VhostState {
    pub hub: Hub,
    pub config: ConfigLoader,
    pub responders: ResponderRegistry,
    pub permissions: Mutex<PermissionTable>,
}

impl VhostState {
    fn new(doc_root: PathBuf) -> Result<Self, AppError> {
        let hub = Hub::new(doc_root.clone(), MountTable::new());
        let config = ConfigLoader::load(&doc_root)?;
        let permissions = Mutex::new(PermissionTable::from_config(&config));
        let responders = ResponderRegistry::default_chain(&config);

        Ok(VhostState {
            hub,
            config,
            responders,
            permissions,
        })
    }
}

/// Keyed cache of vhost state, shared across the process.
#[derive(Default)]
pub struct VhostRegistry {
    vhosts: Mutex<HashMap<VhostKey, Arc<VhostState>>>,
}

impl VhostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the vhost for `key`, creating it on first use.
    pub fn get_or_init(&self, key: VhostKey) -> Result<Arc<VhostState>, AppError> {
        let mut vhosts = self.vhosts.lock().unwrap();
        if let Some(existing) = vhosts.get(&key) {
            return Ok(existing.clone());
        }
        let state = Arc::new(VhostState::new(key.doc_root.clone())?);
        vhosts.insert(key, state.clone());
        Ok(state)
    }

    /// Drops a vhost's cached state, forcing full re-initialization on its
    /// next request. Used when a vhost's document root is recreated.
    pub fn evict(&self, key: &VhostKey) {
        self.vhosts.lock().unwrap().remove(key);
    }

    pub fn len(&self) -> usize {
        self.vhosts.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_init_reuses_state_for_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("htdocs")).unwrap();
        let registry = VhostRegistry::new();
        let key = VhostKey {
            server_hostname: "example.com".into(),
            port: 80,
            doc_root: dir.path().to_path_buf(),
        };

        let first = registry.get_or_init(key.clone()).unwrap();
        let second = registry.get_or_init(key).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
