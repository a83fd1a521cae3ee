//! The hub (§4.C): a unified, mountable, address-addressable tree over
//! filesystem directories and structured data files.

pub mod fs_node;
pub mod hashfile;
pub mod mount;
pub mod query;
pub mod vhost;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::address::{self, Address};
use crate::error::AppError;
use crate::node::{DirectoryNode, Node, Sequence};

pub use mount::MountTable;

/// One entry in the access or change log: the resolved address and the
/// backing mtime observed at the time of the operation.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub path: String,
    pub mtime: SystemTime,
}

/// The root hierarchical container: a filesystem subtree plus its mount
/// points. `/sys` is handled above this layer (it is per-request, not
/// hub-backed) — the hub only ever sees ordinary addresses.
pub struct Hub {
    pub root: PathBuf,
    pub mounts: MountTable,
    access_log: Mutex<Vec<LogEntry>>,
    change_log: Mutex<Vec<LogEntry>>,
}

impl Hub {
    pub fn new(root: PathBuf, mounts: MountTable) -> Self {
        Hub {
            root,
            mounts,
            access_log: Mutex::new(Vec::new()),
            change_log: Mutex::new(Vec::new()),
        }
    }

    /// Resolves `address` to a Node, or `None` if nothing exists there.
    /// Implements the four-step algorithm of §4.C.
    pub fn resolve(&self, address: &Address) -> Result<Option<Node>, AppError> {
        if address.is_root() {
            let node = Node::Directory(DirectoryNode {
                path: self.root.clone(),
            });
            self.log_access(address, &node)?;
            return Ok(Some(node));
        }

        // Step 1/2: mount delegation. Mounts are not nested — the mounted
        // subtree is resolved against a fresh root with no mount table of
        // its own, which is what makes re-entering the same mount from
        // inside it impossible (§9 "mounts & cycles").
        if let Some((_, mount_root, remainder)) = self.mounts.resolve(address, None) {
            let sub = Hub::new(mount_root.to_path_buf(), MountTable::new());
            return sub.resolve(&remainder);
        }

        // Step 3/4: walk the filesystem root segment by segment.
        let mut current = Node::Directory(DirectoryNode {
            path: self.root.clone(),
        });
        let mut walked = Address::root();

        for segment in address.segments() {
            self.log_access(&walked, &current)?;

            let next = if address::is_abstract_segment(segment) {
                let materialized = current.get_data()?;
                Some(query::evaluate(&materialized, segment)?)
            } else {
                self.step(&current, segment)?
            };

            match next {
                Some(node) => {
                    current = node;
                    walked = walked.join(segment);
                }
                None => return Ok(None),
            }
        }

        self.log_access(&walked, &current)?;
        Ok(Some(current))
    }

    fn step(&self, current: &Node, segment: &str) -> Result<Option<Node>, AppError> {
        match current {
            Node::Directory(d) => {
                let child_path = d.path.join(segment);
                if !child_path.exists() {
                    return Ok(None);
                }
                Ok(Some(fs_node::node_for_path(&child_path)?))
            }
            Node::File(_) => {
                let materialized = current.get_data()?;
                index_into(&materialized, segment)
            }
            Node::Mapping(_) | Node::Sequence(_) => index_into(current, segment),
            _ => Err(AppError::Logical(format!(
                "cannot descend into a {:?} node",
                current
            ))),
        }
    }

    /// Walks upward from `address` and returns the nearest enclosing
    /// storage-bearing Node (the nearest File or Directory ancestor).
    pub fn find_storage(&self, address: &Address) -> Result<Node, AppError> {
        let mut candidate = address.clone();
        loop {
            if let Some(node) = self.resolve(&candidate)? {
                if matches!(node, Node::File(_) | Node::Directory(_)) {
                    return Ok(node);
                }
            }
            if candidate.is_root() {
                return Ok(Node::Directory(DirectoryNode {
                    path: self.root.clone(),
                }));
            }
            candidate = candidate.parent();
        }
    }

    /// Materializes a nonexistent path as the given kind, creating parent
    /// directories as needed. The parent must already resolve to a
    /// Directory.
    pub fn vivify(&self, address: &Address, node: Node) -> Result<Node, AppError> {
        if address.is_abstract() {
            return Err(AppError::Logical(
                "cannot vivify through an abstract address".into(),
            ));
        }
        let parent_addr = address.parent();
        let parent = self
            .resolve(&parent_addr)?
            .ok_or_else(|| AppError::DoesNotExist(parent_addr.to_canonical()))?;

        match parent {
            Node::Directory(d) => {
                let target_path = d.path.join(address.name());
                match &node {
                    Node::Directory(_) => {
                        std::fs::create_dir_all(&target_path)?;
                    }
                    Node::File(f) => {
                        crate::node::atomic_write(&target_path, b"")?;
                        return Ok(Node::File(crate::node::FileNode {
                            path: target_path,
                            kind: f.kind,
                        }));
                    }
                    other => {
                        return Err(AppError::Logical(format!(
                            "cannot vivify a bare {:?} node at a filesystem parent",
                            other
                        )))
                    }
                }
                fs_node::node_for_path(&target_path)
            }
            Node::Mapping(_) | Node::File(_) => Err(AppError::Logical(
                "vivify requires a Directory parent for filesystem nodes".into(),
            )),
            _ => Err(AppError::Logical("parent cannot be vivified into".into())),
        }
    }

    /// Persists `node` through its owning storage node, found via
    /// [`Hub::find_storage`]. Directories save by saving each modified
    /// child File; here we only ever receive the already-resolved storage
    /// node, so Mapping/Sequence data must be paired with the File that
    /// owns it by the caller (see the hub data API verbs).
    pub fn save_file(&self, path: &std::path::Path, data: &Node, kind: crate::node::FileKind) -> Result<(), AppError> {
        data.save_to(path, kind)?;
        self.log_change(path)?;
        Ok(())
    }

    fn log_access(&self, walked: &Address, node: &Node) -> Result<(), AppError> {
        if let Ok(mtime) = node.get_mtime() {
            self.access_log
                .lock()
                .unwrap()
                .push(LogEntry { path: walked.to_canonical(), mtime });
        }
        Ok(())
    }

    fn log_change(&self, path: &std::path::Path) -> Result<(), AppError> {
        let mtime = std::fs::metadata(path)?.modified()?;
        self.change_log.lock().unwrap().push(LogEntry {
            path: path.display().to_string(),
            mtime,
        });
        Ok(())
    }

    pub fn access_log(&self) -> Vec<LogEntry> {
        self.access_log.lock().unwrap().clone()
    }

    pub fn change_log(&self) -> Vec<LogEntry> {
        self.change_log.lock().unwrap().clone()
    }

    /// Clears both logs; called on request recycle (§3, §4.J step 7).
    pub fn reset_logs(&self) {
        self.access_log.lock().unwrap().clear();
        self.change_log.lock().unwrap().clear();
    }
}

fn index_into(node: &Node, segment: &str) -> Result<Option<Node>, AppError> {
    match node {
        Node::Mapping(m) => Ok(m.get(segment).cloned()),
        Node::Sequence(Sequence(items)) => {
            if segment == address::NEXT {
                return Err(AppError::Logical(
                    "<next> is not valid for a read resolution".into(),
                ));
            }
            let index: usize = segment
                .parse()
                .map_err(|_| AppError::IllegalArg(format!("not a valid index: {segment}")))?;
            Ok(items.get(index).cloned())
        }
        _ => Err(AppError::Logical(format!(
            "cannot index a {:?} node by {segment:?}",
            node
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Hub) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());
        (dir, hub)
    }

    #[test]
    fn resolves_nested_file_and_tracks_access_log() {
        let (_dir, hub) = hub_with(&[("htdocs/index.html", "<html></html>")]);
        let node = hub
            .resolve(&Address::parse("/htdocs/index.html"))
            .unwrap()
            .unwrap();
        assert!(matches!(node, Node::File(_)));
        assert!(!hub.access_log().is_empty());
    }

    #[test]
    fn find_storage_of_a_file_address_is_itself() {
        let (_dir, hub) = hub_with(&[("data.json", "{}")]);
        let addr = Address::parse("/data.json");
        let storage = hub.find_storage(&addr).unwrap();
        match storage {
            Node::File(f) => assert!(f.path.ends_with("data.json")),
            _ => panic!(),
        }
    }

    #[test]
    fn find_storage_descends_into_structured_content() {
        let (_dir, hub) = hub_with(&[("data.json", r#"{"a": {"b": 1}}"#)]);
        let storage = hub.find_storage(&Address::parse("/data.json/a/b")).unwrap();
        match storage {
            Node::File(f) => assert!(f.path.ends_with("data.json")),
            _ => panic!(),
        }
    }

    #[test]
    fn missing_segment_resolves_to_none_not_error() {
        let (_dir, hub) = hub_with(&[("htdocs/index.html", "x")]);
        let result = hub.resolve(&Address::parse("/htdocs/missing.html")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn vivify_creates_a_file_under_an_existing_directory() {
        let (_dir, hub) = hub_with(&[("htdocs/.keep", "")]);
        let node = hub
            .vivify(
                &Address::parse("/htdocs/new.txt"),
                Node::File(crate::node::FileNode {
                    path: Default::default(),
                    kind: crate::node::FileKind::TextFile,
                }),
            )
            .unwrap();
        assert!(matches!(node, Node::File(_)));
    }
}
