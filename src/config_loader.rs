//! Per-vhost config overlay (§4.D): an ordered stack of hashfile sources
//! under a doc root, merged into one Mapping with later sources winning on
//! key collisions. Distinct from [`crate::config`], which is the process
//! bootstrap settings (bind address, vhost search roots).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::AppError;
use crate::hub::hashfile;
use crate::node::{Mapping, Node};

/// One on-disk hashfile contributing to the overlay, later entries take
/// precedence over earlier ones for any key they both define.
struct Source {
    path: PathBuf,
    mtime: SystemTime,
    mapping: Mapping,
}

/// The merged config view for one vhost, plus enough bookkeeping to answer
/// "has anything changed since I last merged" (used by the cache's
/// config-mtime invalidation rule, §4.H).
pub struct ConfigLoader {
    sources: Vec<Source>,
    merged: Mapping,
}

/// Conventional per-vhost config file names, applied in this order so that
/// `local.hf` can override `site.hf`.
const SOURCE_NAMES: &[&str] = &["site.hf", "local.hf"];

impl ConfigLoader {
    /// Loads every present source under `doc_root`'s `conf/` directory and
    /// merges them. Missing sources are skipped, not an error.
    pub fn load(doc_root: &Path) -> Result<Self, AppError> {
        let conf_dir = doc_root.join("conf");
        let mut sources = Vec::new();

        for name in SOURCE_NAMES {
            let path = conf_dir.join(name);
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            let mtime = std::fs::metadata(&path)?.modified()?;
            let mapping = hashfile::parse(&text)?;
            sources.push(Source { path, mtime, mapping });
        }

        let merged = merge_all(&sources);
        Ok(ConfigLoader { sources, merged })
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.merged.get(key)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.merged
    }

    /// The newest mtime among all contributing sources. A response cached
    /// while depending on config is invalidated once this moves forward
    /// (§4.H rule 3).
    pub fn aggregate_mtime(&self) -> Option<SystemTime> {
        self.sources.iter().map(|s| s.mtime).max()
    }

    /// Re-reads every source from disk, returning whether anything changed.
    pub fn refresh(&mut self) -> Result<bool, AppError> {
        let before = self.aggregate_mtime();
        let doc_root = self
            .sources
            .first()
            .and_then(|s| s.path.parent())
            .and_then(|p| p.parent())
            .map(Path::to_path_buf);

        if let Some(doc_root) = doc_root {
            *self = ConfigLoader::load(&doc_root)?;
        }
        Ok(self.aggregate_mtime() != before)
    }

    /// Writes `value` at `key`, through whichever existing source already
    /// defines it (innermost wins); if none defines it, falls back to the
    /// last source in the stack, creating it if the stack is empty.
    pub fn write_value(&mut self, key: &str, value: Node) -> Result<(), AppError> {
        let target_index = self
            .sources
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| s.mapping.get(key).is_some())
            .map(|(i, _)| i)
            .unwrap_or_else(|| self.sources.len().saturating_sub(1));

        if self.sources.is_empty() {
            return Err(AppError::Logical(
                "no config source available to write into".into(),
            ));
        }

        let source = &mut self.sources[target_index];
        source.mapping.insert(key.to_owned(), value);
        crate::node::atomic_write(&source.path, &hashfile::serialize(&source.mapping))?;
        source.mtime = std::fs::metadata(&source.path)?.modified()?;

        self.merged = merge_all(&self.sources);
        Ok(())
    }
}

fn merge_all(sources: &[Source]) -> Mapping {
    let mut merged = Mapping::new();
    for source in sources {
        for (key, value) in source.mapping.0.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_source_overrides_earlier_one() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("conf");
        std::fs::create_dir_all(&conf).unwrap();
        std::fs::write(conf.join("site.hf"), "title: Site\nport: 8080\n").unwrap();
        std::fs::write(conf.join("local.hf"), "port: 9090\n").unwrap();

        let loader = ConfigLoader::load(dir.path()).unwrap();
        match loader.get("port").unwrap() {
            Node::Scalar(crate::node::Scalar::Text(t)) => assert_eq!(t, "9090"),
            _ => panic!(),
        }
        match loader.get("title").unwrap() {
            Node::Scalar(crate::node::Scalar::Text(t)) => assert_eq!(t, "Site"),
            _ => panic!(),
        }
    }

    #[test]
    fn missing_sources_are_skipped_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::load(dir.path()).unwrap();
        assert!(loader.get("anything").is_none());
        assert!(loader.aggregate_mtime().is_none());
    }
}
