//! Write verbs of the hub data API (§4.I): `store`, `update`, `insert`,
//! `remove`, `rename`, `copy`, `move`, `reorder`, `create`. Each resolves its
//! target's owning storage node, mutates the in-memory structure, and saves
//! through [`crate::hub::Hub::save_file`].

use serde_json::{json, Value as JsonValue};

use crate::address::Address;
use crate::error::AppError;
use crate::hub::Hub;
use crate::node::{FileKind, Node};

/// Loads the File that owns `target` and parses its data.
fn owning_file(hub: &Hub, target: &Address) -> Result<(std::path::PathBuf, FileKind, Node), AppError> {
    let storage = hub.find_storage(target)?;
    match storage {
        Node::File(f) => {
            let data = storage.get_data()?;
            Ok((f.path, f.kind, data))
        }
        Node::Directory(_) => Err(AppError::Logical(
            "target's storage is a plain filesystem directory, not structured data".into(),
        )),
        _ => Err(AppError::Logical("target has no owning storage file".into())),
    }
}

/// Navigates `data` to the parent of `path`, returning it plus the final
/// segment name to operate on.
fn navigate_to_parent<'a>(data: &'a mut Node, path: &[String]) -> Result<(&'a mut Node, &'a str), AppError> {
    if path.is_empty() {
        return Err(AppError::Logical("cannot mutate the root of a file directly".into()));
    }
    let mut current = data;
    for segment in &path[..path.len() - 1] {
        current = match current {
            Node::Mapping(m) => m
                .0
                .get_mut(segment)
                .ok_or_else(|| AppError::DoesNotExist(segment.clone()))?,
            Node::Sequence(s) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| AppError::IllegalArg(format!("not an index: {segment}")))?;
                s.0.get_mut(index)
                    .ok_or_else(|| AppError::DoesNotExist(segment.clone()))?
            }
            _ => return Err(AppError::Logical("cannot descend through a scalar".into())),
        };
    }
    Ok((current, path.last().unwrap()))
}

fn save(hub: &Hub, path: &std::path::Path, kind: FileKind, data: &Node) -> Result<(), AppError> {
    hub.save_file(path, data, kind)
}

/// `store` — writes `value` at `target`, replacing whatever was there.
pub fn store(hub: &Hub, target: &Address, value: JsonValue) -> Result<JsonValue, AppError> {
    let (path, kind, mut data) = owning_file(hub, target)?;
    let relative = relative_path(hub, target, &path)?;
    let new_node = crate::node::json_to_node(&value);

    if relative.is_empty() {
        data = new_node;
    } else {
        let (parent, key) = navigate_to_parent(&mut data, &relative)?;
        match parent {
            Node::Mapping(m) => {
                m.insert(key.to_owned(), new_node);
            }
            Node::Sequence(s) => {
                if key == crate::address::NEXT {
                    s.append(new_node);
                } else {
                    let index: usize = key
                        .parse()
                        .map_err(|_| AppError::IllegalArg(format!("not an index: {key}")))?;
                    if index < s.0.len() {
                        s.0[index] = new_node;
                    } else {
                        return Err(AppError::Logical("store index out of range".into()));
                    }
                }
            }
            _ => return Err(AppError::Logical("cannot store into a scalar".into())),
        }
    }

    save(hub, &path, kind, &data)?;
    Ok(json!({ "addr": target.to_canonical() }))
}

/// `update` — writes every key of `values` under `target` individually
/// (each a `store`, so `<next>`-append and nested-path semantics match), then
/// re-fetches `target` so the caller sees the merged result.
pub fn update(hub: &Hub, target: &Address, values: &JsonValue) -> Result<JsonValue, AppError> {
    let values = values
        .as_object()
        .ok_or_else(|| AppError::MissingArg("values".into()))?;

    for (key, value) in values {
        store(hub, &target.join(key), value.clone())?;
    }

    super::fetch::fetch(hub, target)
}

/// `remove` — deletes `target` from its parent Mapping or Sequence.
pub fn remove(hub: &Hub, target: &Address) -> Result<JsonValue, AppError> {
    let (path, kind, mut data) = owning_file(hub, target)?;
    let relative = relative_path(hub, target, &path)?;
    let (parent, key) = navigate_to_parent(&mut data, &relative)?;

    let removed = match parent {
        Node::Mapping(m) => m
            .remove(key)
            .ok_or_else(|| AppError::DoesNotExist(key.to_owned()))?,
        Node::Sequence(s) => {
            let index: usize = key
                .parse()
                .map_err(|_| AppError::IllegalArg(format!("not an index: {key}")))?;
            s.remove(index)?
        }
        _ => return Err(AppError::Logical("cannot remove from a scalar".into())),
    };

    save(hub, &path, kind, &data)?;
    Ok(json!({ "addr": target.to_canonical(), "removed": crate::node::node_to_json(&removed) }))
}

/// `insert` — inserts `value` into the Sequence at `target` (a `/<next>`
/// address appends).
pub fn insert(hub: &Hub, target: &Address, value: JsonValue) -> Result<JsonValue, AppError> {
    let (path, kind, mut data) = owning_file(hub, target)?;
    let relative = relative_path(hub, target, &path)?;
    let (parent, key) = navigate_to_parent(&mut data, &relative)?;
    let new_node = crate::node::json_to_node(&value);

    let index = match parent {
        Node::Sequence(s) => {
            if key == crate::address::NEXT {
                s.append(new_node)
            } else {
                let index: usize = key
                    .parse()
                    .map_err(|_| AppError::IllegalArg(format!("not an index: {key}")))?;
                s.insert(index, new_node)?;
                index
            }
        }
        _ => return Err(AppError::Logical("insert requires a Sequence parent".into())),
    };

    save(hub, &path, kind, &data)?;
    Ok(json!({ "addr": target.to_canonical(), "index": index }))
}

/// `rename` — renames a Mapping entry, preserving its position.
pub fn rename(hub: &Hub, target: &Address, new_name: &str) -> Result<JsonValue, AppError> {
    let (path, kind, mut data) = owning_file(hub, target)?;
    let relative = relative_path(hub, target, &path)?;
    let (parent, key) = navigate_to_parent(&mut data, &relative)?;

    match parent {
        Node::Mapping(m) => m.rename(key, new_name)?,
        _ => return Err(AppError::Logical("rename requires a Mapping parent".into())),
    }

    save(hub, &path, kind, &data)?;
    Ok(json!({ "addr": target.parent().join(new_name).to_canonical() }))
}

/// `reorder` — applies a permutation to a Mapping or Sequence at `target`.
pub fn reorder(hub: &Hub, target: &Address, order: Vec<usize>) -> Result<JsonValue, AppError> {
    let (path, kind, mut data) = owning_file(hub, target)?;
    let relative = relative_path(hub, target, &path)?;

    let node = if relative.is_empty() {
        &mut data
    } else {
        let (parent, key) = navigate_to_parent(&mut data, &relative)?;
        match parent {
            Node::Mapping(m) => m.0.get_mut(key).ok_or_else(|| AppError::DoesNotExist(key.to_owned()))?,
            Node::Sequence(s) => {
                let index: usize = key.parse().map_err(|_| AppError::IllegalArg(key.to_owned()))?;
                s.0.get_mut(index).ok_or_else(|| AppError::DoesNotExist(key.to_owned()))?
            }
            _ => return Err(AppError::Logical("cannot reorder a scalar".into())),
        }
    };

    match node {
        Node::Sequence(s) => s.reorder(&order)?,
        Node::Mapping(m) => m.reorder(&order)?,
        _ => return Err(AppError::Logical("reorder requires a Mapping or Sequence".into())),
    }

    save(hub, &path, kind, &data)?;
    Ok(json!({ "addr": target.to_canonical(), "order": order }))
}

/// `create` — vivifies a new node at `target` of the given file kind.
pub fn create(hub: &Hub, target: &Address, kind: FileKind) -> Result<JsonValue, AppError> {
    let node = hub.vivify(
        target,
        Node::File(crate::node::FileNode {
            path: Default::default(),
            kind,
        }),
    )?;
    Ok(json!({ "addr": target.to_canonical(), "type": node.type_tag(false) }))
}

/// `copy` — duplicates the node at `source` to `dest` (distinct storage
/// files); `move` additionally removes the source.
pub fn copy(hub: &Hub, source: &Address, dest: &Address) -> Result<JsonValue, AppError> {
    let value = hub
        .resolve(source)?
        .ok_or_else(|| AppError::DoesNotExist(source.to_canonical()))?
        .get_data()?;
    store(hub, dest, crate::node::node_to_json(&value))
}

pub fn mv(hub: &Hub, source: &Address, dest: &Address) -> Result<JsonValue, AppError> {
    let result = copy(hub, source, dest)?;
    remove(hub, source)?;
    Ok(result)
}

/// The address segments of `target` relative to the owning File's own
/// address, i.e. the path walked *inside* its parsed content.
fn relative_path(hub: &Hub, target: &Address, file_path: &std::path::Path) -> Result<Vec<String>, AppError> {
    // Re-resolve from the root, counting how many leading segments are
    // consumed before we land on the File itself; whatever remains is the
    // path into its structured content.
    let mut consumed = Address::root();
    for segment in target.segments() {
        let probe = consumed.join(segment);
        match hub.resolve(&probe)? {
            Some(Node::File(f)) if f.path == file_path => {
                return Ok(target.segments()[probe.segments().len()..].to_vec());
            }
            _ => consumed = probe,
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MountTable;

    #[test]
    fn store_replaces_a_nested_value() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"a":{"b":1}}"#).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        store(&hub, &Address::parse("/data.json/a/b"), json!(42)).unwrap();

        let result = hub.resolve(&Address::parse("/data.json/a/b")).unwrap().unwrap();
        match result {
            Node::Scalar(crate::node::Scalar::Text(t)) => assert_eq!(t, "42"),
            _ => panic!(),
        }
    }

    #[test]
    fn remove_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"a":1,"b":2}"#).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        remove(&hub, &Address::parse("/data.json/a")).unwrap();
        let result = hub.resolve(&Address::parse("/data.json")).unwrap().unwrap();
        assert!(result.get_data().unwrap().as_mapping().unwrap().get("a").is_none());
    }

    #[test]
    fn store_into_a_sequence_next_appends() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"items":["a","b"]}"#).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        store(&hub, &Address::parse("/data.json/items/<next>"), json!("c")).unwrap();

        let result = hub.resolve(&Address::parse("/data.json/items")).unwrap().unwrap();
        let seq = result.get_data().unwrap();
        assert_eq!(seq.as_sequence().unwrap().len(), 3);
    }

    #[test]
    fn update_writes_every_key_and_refetches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"a":1,"b":2}"#).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        update(&hub, &Address::parse("/data.json"), &json!({"a": 10, "c": 3})).unwrap();

        let result = hub.resolve(&Address::parse("/data.json")).unwrap().unwrap();
        let saved = result.get_data().unwrap();
        let map = saved.as_mapping().unwrap();
        assert_eq!(map.get("a").unwrap().as_scalar().unwrap(), &crate::node::Scalar::Text("10".into()));
        assert_eq!(map.get("b").unwrap().as_scalar().unwrap(), &crate::node::Scalar::Text("2".into()));
        assert_eq!(map.get("c").unwrap().as_scalar().unwrap(), &crate::node::Scalar::Text("3".into()));
    }
}
