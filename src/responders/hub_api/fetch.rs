//! `fetch` (§4.I): read-only retrieval of a target node, optionally as a
//! chain from `root` to `target`.

use serde_json::json;

use crate::address::Address;
use crate::error::AppError;
use crate::hub::Hub;
use crate::node::Node;

const INLINE_CONTENT_LIMIT: usize = 1024 * 1024;

/// One entry of a `fetch` response: `{addr, type, mtime, size, length}` for
/// a Directory's children, with the mount suffix from §4.B's typeof rule.
fn describe_child(hub: &Hub, addr: &Address, node: &Node) -> serde_json::Value {
    let is_mount = hub.mounts.is_mount_point(&addr.to_canonical());
    let mut entry = json!({
        "addr": addr.to_canonical(),
        "type": node.type_tag(is_mount),
    });
    if let Ok(mtime) = node.get_mtime() {
        entry["mtime"] = json!(mtime
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0));
    }
    if let Ok((size, _)) = node.get_stat() {
        entry["size"] = json!(size);
    }
    if let Ok(len) = node.length() {
        entry["length"] = json!(len);
    }
    entry
}

pub fn fetch(hub: &Hub, target: &Address) -> Result<serde_json::Value, AppError> {
    let node = hub
        .resolve(target)?
        .ok_or_else(|| AppError::DoesNotExist(target.to_canonical()))?;

    let mut body = match &node {
        Node::Directory(dir) => {
            let mut map = serde_json::Map::new();
            for name in crate::hub::fs_node::read_dir_entries(&dir.path)? {
                let child_addr = target.join(&name);
                let child = crate::hub::fs_node::node_for_path(&dir.path.join(&name))?;
                map.insert(name, describe_child(hub, &child_addr, &child));
            }
            if target.is_root() {
                for (mount_addr, _) in hub.mounts.iter() {
                    let name = mount_addr.trim_start_matches('/').to_owned();
                    if !map.contains_key(&name) {
                        map.insert(name, json!({ "addr": mount_addr, "type": "directory-mount" }));
                    }
                }
            }
            serde_json::Value::Object(map)
        }
        other => crate::node::node_to_json(other),
    };

    let is_mount = hub.mounts.is_mount_point(&target.to_canonical());
    let mut meta = json!({
        "addr": target.to_canonical(),
        "type": node.type_tag(is_mount),
    });
    if let Ok(mtime) = node.get_mtime() {
        meta["mtime"] = json!(mtime
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0));
    }
    if let (Node::File(_), Ok(raw)) = (&node, node.get_raw_content()) {
        if raw.len() < INLINE_CONTENT_LIMIT {
            if let Ok(text) = String::from_utf8(raw.clone()) {
                meta["content"] = json!(text);
                meta["checksum"] = json!(format!("{:x}", md5_like_checksum(&raw)));
            }
        }
    }

    if body.is_null() {
        body = crate::node::node_to_json(&node);
    }

    Ok(json!({ "head": { "meta": meta }, "body": body }))
}

/// `branch` fetch: the chain of nodes from `root` to `target` inclusive.
pub fn fetch_branch(hub: &Hub, root: &Address, target: &Address) -> Result<serde_json::Value, AppError> {
    let target_canon = target.to_canonical();
    let root_canon = root.to_canonical();
    if !target_canon.starts_with(&root_canon) {
        return Err(AppError::Logical("target is not under root".into()));
    }

    let mut chain = Vec::new();
    let mut addr = root.clone();
    chain.push(fetch(hub, &addr)?);
    for segment in &target.segments()[root.segments().len()..] {
        addr = addr.join(segment);
        chain.push(fetch(hub, &addr)?);
    }

    Ok(serde_json::Value::Array(chain))
}

/// A simple non-cryptographic content checksum for the `fetch` inline-content
/// envelope; stability across identical bytes is all that's required here.
fn md5_like_checksum(bytes: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MountTable;

    #[test]
    fn fetch_directory_lists_children_with_meta() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        let result = fetch(&hub, &Address::root()).unwrap();
        assert!(result["body"]["a.txt"]["type"] == "file-text");
    }

    #[test]
    fn fetch_missing_target_is_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());
        assert!(fetch(&hub, &Address::parse("/nope")).is_err());
    }
}
