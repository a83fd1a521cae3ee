//! Filesystem-backed Directory/File node support (§3, §4.B).

use std::path::Path;

use crate::error::AppError;
use crate::node::{DirectoryNode, FileKind, FileNode, Mapping, Node};

/// Immediate child names of a directory, in a stable (sorted) order. Real
/// filesystems don't guarantee directory-entry order, so sorting is what
/// makes Directory nodes reproducible across reloads.
pub fn read_dir_entries(path: &Path) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

/// Builds the Mapping of a Directory node's immediate children, each as a
/// `Node::Directory` or `Node::File` keyed by filename (§3: "entries are
/// child Nodes computed from directory entries on disk").
pub fn read_directory(path: &Path) -> Result<Node, AppError> {
    let mut mapping = Mapping::new();
    for name in read_dir_entries(path)? {
        let child_path = path.join(&name);
        mapping.insert(name, node_for_path(&child_path)?);
    }
    Ok(Node::Mapping(mapping))
}

/// Classifies a filesystem path into the Node it backs: `Directory` if it's
/// a directory, otherwise `File` with a kind inferred from its extension.
pub fn node_for_path(path: &Path) -> Result<Node, AppError> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.is_dir() {
        Ok(Node::Directory(DirectoryNode {
            path: path.to_path_buf(),
        }))
    } else {
        Ok(Node::File(FileNode {
            path: path.to_path_buf(),
            kind: FileKind::from_extension(path),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_lists_sorted_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let entries = read_dir_entries(dir.path()).unwrap();
        assert_eq!(entries, vec!["a.txt", "b.txt", "sub"]);
    }

    #[test]
    fn node_for_path_classifies_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.hf");
        std::fs::write(&file, "a: 1\n").unwrap();

        match node_for_path(&file).unwrap() {
            Node::File(f) => assert_eq!(f.kind, FileKind::HashFile),
            other => panic!("expected File, got {other:?}"),
        }
    }
}
