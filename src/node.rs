//! The node model (§4.B): a tagged sum over everything reachable through the
//! hub. Per §9 this is modeled as an enum, not an inheritance hierarchy —
//! behavior is matched on the variant rather than virtually dispatched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::hub::hashfile;

/// An ordered key → Node mapping. Insertion order is preserved across
/// load → mutate → save round-trips (§3 invariant).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mapping(pub IndexMap<String, Node>);

impl Mapping {
    pub fn new() -> Self {
        Mapping(IndexMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renames `from` to `to`, preserving its position in insertion order.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), AppError> {
        if self.0.contains_key(to) {
            return Err(AppError::Logical(format!("{to} already exists")));
        }
        if !self.0.contains_key(from) {
            return Err(AppError::DoesNotExist(from.to_owned()));
        }
        // `IndexMap::shift_insert` doesn't exist on the indexmap version this
        // crate pins; rebuild the map in place instead, which preserves
        // order just as well.
        self.0 = self
            .0
            .drain(..)
            .map(|(k, v)| if k == from { (to.to_owned(), v) } else { (k, v) })
            .collect();
        Ok(())
    }

    /// Reorders entries according to a permutation of current indices (§4.I
    /// `reorder` on an ordered Mapping): `order[i]` is the current index of
    /// the entry that should end up at position `i`.
    pub fn reorder(&mut self, order: &[usize]) -> Result<(), AppError> {
        if order.len() != self.0.len() {
            return Err(AppError::Logical(
                "reorder permutation length must match mapping length".into(),
            ));
        }
        let original: Vec<(String, Node)> = self.0.drain(..).collect();
        for &idx in order {
            let (k, v) = original
                .get(idx)
                .cloned()
                .ok_or_else(|| AppError::Logical("reorder index out of range".into()))?;
            self.0.insert(k, v);
        }
        Ok(())
    }
}

/// A dense, integer-indexed, ordered list of Nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence(pub Vec<Node>);

impl Sequence {
    pub fn new() -> Self {
        Sequence(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, index: usize, value: Node) -> Result<(), AppError> {
        if index > self.0.len() {
            return Err(AppError::Logical("insert index out of range".into()));
        }
        self.0.insert(index, value);
        Ok(())
    }

    pub fn append(&mut self, value: Node) -> usize {
        self.0.push(value);
        self.0.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<Node, AppError> {
        if index >= self.0.len() {
            return Err(AppError::Logical("remove index out of range".into()));
        }
        Ok(self.0.remove(index))
    }

    /// Applies a permutation: `order[i]` is the current index of the element
    /// that should end up at position `i` (§8 scenario 4).
    pub fn reorder(&mut self, order: &[usize]) -> Result<(), AppError> {
        if order.len() != self.0.len() {
            return Err(AppError::Logical(
                "reorder permutation length must match sequence length".into(),
            ));
        }
        let original = self.0.clone();
        self.0 = order
            .iter()
            .map(|&i| {
                original
                    .get(i)
                    .cloned()
                    .ok_or_else(|| AppError::Logical("reorder index out of range".into()))
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}

/// A scalar leaf value: either text or raw octets.
#[derive(Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Binary(Vec<u8>),
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => write!(f, "Scalar::Text({s:?})"),
            Scalar::Binary(b) => write!(f, "Scalar::Binary({} bytes)", b.len()),
        }
    }
}

/// A callable node. Invoked with a keyword-parameter Mapping, returns any
/// Node. There is no scripting runtime here (out of scope, §1) — `Code`
/// nodes are constructed by responders/hub plumbing from native closures.
#[derive(Clone)]
pub struct CodeNode(pub Arc<dyn Fn(&Mapping) -> Result<Node, AppError> + Send + Sync>);

impl fmt::Debug for CodeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeNode(..)")
    }
}

impl PartialEq for CodeNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The structured-file subvariants of a [`Node::File`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    HashFile,
    JsonFile,
    TextFile,
    BinaryFile,
    CodeFile,
}

impl FileKind {
    /// Infers a kind from a file extension, matching the hub's convention
    /// for bare filesystem files with no explicit `create` type.
    pub fn from_extension(path: &Path) -> FileKind {
        match path.extension().and_then(|e| e.to_str()) {
            Some("hf") => FileKind::HashFile,
            Some("json") => FileKind::JsonFile,
            Some("rs") => FileKind::CodeFile,
            Some(
                "html" | "htm" | "txt" | "css" | "js" | "xml" | "md" | "csv" | "yaml" | "yml",
            ) => FileKind::TextFile,
            _ => FileKind::BinaryFile,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::HashFile => "hash",
            FileKind::JsonFile => "json",
            FileKind::TextFile => "text",
            FileKind::BinaryFile => "binary",
            FileKind::CodeFile => "code",
        }
    }
}

/// A storage-backed leaf: filesystem bytes parsed according to `kind`.
#[derive(Clone, Debug, PartialEq)]
pub struct FileNode {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// A storage-backed Mapping whose entries are computed from directory
/// entries on disk (§3: "created lazily on first access").
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryNode {
    pub path: PathBuf,
}

/// The node model's tagged sum (§4.B).
#[derive(Clone, Debug)]
pub enum Node {
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Sequence),
    Code(CodeNode),
    Directory(DirectoryNode),
    File(FileNode),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Node {
        Node::Scalar(Scalar::Text(s.into()))
    }

    pub fn binary(b: Vec<u8>) -> Node {
        Node::Scalar(Scalar::Binary(b))
    }

    /// The `typeof` string per §4.B's typeof rule. `is_mount` is supplied by
    /// the hub, since mount-ness is a property of the address, not the node.
    pub fn type_tag(&self, is_mount: bool) -> String {
        let suffix = if is_mount { "-mount" } else { "" };
        match self {
            Node::Directory(_) => format!("directory{suffix}"),
            Node::File(f) => format!("file-{}", f.kind.as_str()),
            Node::Mapping(_) => format!("data-hash{suffix}"),
            Node::Sequence(_) => "data-array".to_owned(),
            Node::Scalar(_) => "data-scalar".to_owned(),
            Node::Code(_) => "code".to_owned(),
        }
    }

    /// Child count for Mapping/Sequence/Directory; 0 otherwise.
    pub fn length(&self) -> Result<usize, AppError> {
        match self {
            Node::Mapping(m) => Ok(m.len()),
            Node::Sequence(s) => Ok(s.len()),
            Node::Directory(d) => Ok(crate::hub::fs_node::read_dir_entries(&d.path)?.len()),
            _ => Ok(0),
        }
    }

    /// Keys, for Mapping and Directory nodes only.
    pub fn keys(&self) -> Result<Vec<String>, AppError> {
        match self {
            Node::Mapping(m) => Ok(m.keys().map(str::to_owned).collect()),
            Node::Directory(d) => Ok(crate::hub::fs_node::read_dir_entries(&d.path)?),
            _ => Err(AppError::Logical("node has no keys".into())),
        }
    }

    /// Reads and parses the raw content of a File node. Non-File nodes
    /// return themselves as already-materialized data.
    pub fn get_data(&self) -> Result<Node, AppError> {
        match self {
            Node::File(f) => read_file(f),
            Node::Directory(d) => crate::hub::fs_node::read_directory(&d.path),
            other => Ok(other.clone()),
        }
    }

    /// Raw bytes of a File node's backing storage, unparsed.
    pub fn get_raw_content(&self) -> Result<Vec<u8>, AppError> {
        match self {
            Node::File(f) => Ok(std::fs::read(&f.path)?),
            _ => Err(AppError::Logical("get_raw_content requires a File node".into())),
        }
    }

    pub fn get_mtime(&self) -> Result<SystemTime, AppError> {
        match self {
            Node::File(f) => Ok(std::fs::metadata(&f.path)?.modified()?),
            Node::Directory(d) => Ok(std::fs::metadata(&d.path)?.modified()?),
            _ => Err(AppError::Logical("node has no backing mtime".into())),
        }
    }

    pub fn get_stat(&self) -> Result<(u64, SystemTime), AppError> {
        match self {
            Node::File(f) => {
                let meta = std::fs::metadata(&f.path)?;
                Ok((meta.len(), meta.modified()?))
            }
            Node::Directory(d) => {
                let meta = std::fs::metadata(&d.path)?;
                Ok((meta.len(), meta.modified()?))
            }
            _ => Err(AppError::Logical("node has no backing stat".into())),
        }
    }

    /// Invokes a `Code` node with a parameter Mapping.
    pub fn invoke(&self, params: &Mapping) -> Result<Node, AppError> {
        match self {
            Node::Code(c) => (c.0)(params),
            _ => Err(AppError::Logical("node is not callable".into())),
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Writes this node's data through `path`, formatted per `kind`. Used by
    /// [`crate::hub::Hub::save`] on the owning storage node.
    pub fn save_to(&self, path: &Path, kind: FileKind) -> Result<(), AppError> {
        let bytes = match (self, kind) {
            (Node::Mapping(_) | Node::Sequence(_), FileKind::JsonFile) => {
                serde_json::to_vec_pretty(&node_to_json(self))?
            }
            (Node::Mapping(m), FileKind::HashFile) => hashfile::serialize(m),
            (Node::Scalar(Scalar::Text(s)), _) => s.clone().into_bytes(),
            (Node::Scalar(Scalar::Binary(b)), _) => b.clone(),
            _ => {
                return Err(AppError::Logical(format!(
                    "cannot save a {:?} node as {:?}",
                    self, kind
                )))
            }
        };
        atomic_write(path, &bytes)
    }
}

fn read_file(f: &FileNode) -> Result<Node, AppError> {
    match f.kind {
        FileKind::HashFile => {
            let text = std::fs::read_to_string(&f.path)?;
            Ok(Node::Mapping(hashfile::parse(&text)?))
        }
        FileKind::JsonFile => {
            let text = std::fs::read_to_string(&f.path)?;
            let value: JsonValue = serde_json::from_str(&text)?;
            Ok(json_to_node(&value))
        }
        FileKind::TextFile => Ok(Node::text(std::fs::read_to_string(&f.path)?)),
        FileKind::BinaryFile => Ok(Node::binary(std::fs::read(&f.path)?)),
        FileKind::CodeFile => Err(AppError::Logical(
            "code files are not invoked through get_data".into(),
        )),
    }
}

/// Writes `bytes` to `path` via a temp-file-then-rename so concurrent readers
/// never observe a partial write (§5 shared-resource discipline).
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let dir = path.parent().ok_or_else(|| {
        AppError::Logical(format!("{} has no parent directory", path.display()))
    })?;
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("node"),
        std::process::id()
    ));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn json_to_node(value: &JsonValue) -> Node {
    match value {
        JsonValue::Null => Node::text(""),
        JsonValue::Bool(b) => Node::text(b.to_string()),
        JsonValue::Number(n) => Node::text(n.to_string()),
        JsonValue::String(s) => Node::text(s.clone()),
        JsonValue::Array(items) => Node::Sequence(Sequence(items.iter().map(json_to_node).collect())),
        JsonValue::Object(map) => {
            let mut m = Mapping::new();
            for (k, v) in map {
                m.insert(k.clone(), json_to_node(v));
            }
            Node::Mapping(m)
        }
    }
}

pub fn node_to_json(node: &Node) -> JsonValue {
    match node {
        Node::Scalar(Scalar::Text(s)) => JsonValue::String(s.clone()),
        Node::Scalar(Scalar::Binary(b)) => {
            JsonValue::String(base64::encode(b))
        }
        Node::Sequence(s) => JsonValue::Array(s.0.iter().map(node_to_json).collect()),
        Node::Mapping(m) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in m.0.iter() {
                obj.insert(k.clone(), node_to_json(v));
            }
            JsonValue::Object(obj)
        }
        Node::Code(_) => JsonValue::Null,
        Node::Directory(d) => JsonValue::String(d.path.display().to_string()),
        Node::File(f) => JsonValue::String(f.path.display().to_string()),
    }
}
