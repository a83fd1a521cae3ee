//! Credential storage (§4.F): a per-vhost file of username → password-hash
//! entries, versioned so a rotated credentials file doesn't invalidate
//! sessions signed against an older version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Deserialize, Serialize)]
struct CredentialsFile {
    version: u32,
    #[serde(default)]
    entries: HashMap<String, String>,
}

/// Loaded view of `credentials/<version>.json`.
pub struct CredentialStore {
    path: PathBuf,
    version: u32,
    entries: HashMap<String, String>,
}

impl CredentialStore {
    /// Loads the highest-numbered `credentials/<n>.json` under `doc_root`,
    /// or an empty store at version 0 if none exists yet.
    pub fn load(doc_root: &Path) -> Result<Self, AppError> {
        let dir = doc_root.join("credentials");
        let mut latest: Option<(u32, PathBuf)> = None;

        if dir.is_dir() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                    continue;
                };
                if let Ok(version) = stem.parse::<u32>() {
                    if latest.as_ref().map_or(true, |(v, _)| version > *v) {
                        latest = Some((version, entry.path()));
                    }
                }
            }
        }

        match latest {
            Some((version, path)) => {
                let text = std::fs::read_to_string(&path)?;
                let file: CredentialsFile = serde_json::from_str(&text)?;
                Ok(CredentialStore {
                    path,
                    version,
                    entries: file.entries,
                })
            }
            None => Ok(CredentialStore {
                path: dir.join("1.json"),
                version: 0,
                entries: HashMap::new(),
            }),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The stored password hash (`h1 = sha1(password)`, hex) for `username`.
    pub fn h1(&self, username: &str) -> Option<&str> {
        self.entries.get(username).map(String::as_str)
    }

    pub fn set_h1(&mut self, username: impl Into<String>, h1_hex: impl Into<String>) {
        self.entries.insert(username.into(), h1_hex.into());
    }

    pub fn save(&self) -> Result<(), AppError> {
        let body = CredentialsFile {
            version: self.version,
            entries: self.entries.clone(),
        };
        crate::node::atomic_write(&self.path, &serde_json::to_vec_pretty(&body)?)
    }
}
