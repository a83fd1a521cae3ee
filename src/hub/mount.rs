//! Mount points (§3, §4.C): an address at which a foreign filesystem subtree
//! is grafted into the hub. `/sys` can never be mounted.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::address::Address;
use crate::error::AppError;

#[derive(Clone, Debug, Default)]
pub struct MountTable {
    /// Canonical mount-point address (e.g. `/shared`) → absolute filesystem
    /// root it resolves against.
    mounts: IndexMap<String, PathBuf>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: impl Into<String>, root: impl Into<PathBuf>) -> Result<(), AppError> {
        let addr = addr.into();
        if addr == "/sys" || addr.starts_with("/sys/") {
            return Err(AppError::Logical("/sys cannot be mounted".into()));
        }
        self.mounts.insert(addr, root.into());
        Ok(())
    }

    pub fn is_mount_point(&self, addr: &str) -> bool {
        self.mounts.contains_key(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.mounts.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Finds the mount (if any) whose address prefixes `address`, returning
    /// the mount's filesystem root and the remainder address to resolve
    /// inside it. Per §9, an address whose prefix *is* the mount point while
    /// already resolving inside that mount must not recurse back into it;
    /// callers track this via `exclude`.
    pub fn resolve<'a>(
        &'a self,
        address: &Address,
        exclude: Option<&str>,
    ) -> Option<(&'a str, &'a Path, Address)> {
        let canonical = address.to_canonical();
        let mut best: Option<(&str, &Path)> = None;

        for (mount_addr, root) in self.mounts.iter() {
            if Some(mount_addr.as_str()) == exclude {
                continue;
            }
            let is_prefix = canonical == *mount_addr
                || canonical.starts_with(&format!("{mount_addr}/"));
            if is_prefix && mount_addr.len() > best.map(|(m, _)| m.len()).unwrap_or(0) {
                best = Some((mount_addr.as_str(), root.as_path()));
            }
        }

        best.map(|(mount_addr, root)| {
            let remainder_str = canonical
                .strip_prefix(mount_addr)
                .unwrap_or("")
                .trim_start_matches('/');
            let remainder = if remainder_str.is_empty() {
                Address::root()
            } else {
                Address::parse(remainder_str)
            };
            (mount_addr, root, remainder)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sys_cannot_be_mounted() {
        let mut table = MountTable::new();
        assert!(table.insert("/sys", "/tmp").is_err());
        assert!(table.insert("/sys/foo", "/tmp").is_err());
    }

    #[test]
    fn resolve_picks_longest_matching_mount() {
        let mut table = MountTable::new();
        table.insert("/shared", "/data/shared").unwrap();
        table.insert("/shared/special", "/data/special").unwrap();

        let (mount, root, rest) = table
            .resolve(&Address::parse("/shared/special/a/b"), None)
            .unwrap();
        assert_eq!(mount, "/shared/special");
        assert_eq!(root, Path::new("/data/special"));
        assert_eq!(rest.to_canonical(), "/a/b");
    }

    #[test]
    fn resolve_excludes_self_to_prevent_mount_recursion() {
        let mut table = MountTable::new();
        table.insert("/shared", "/data/shared").unwrap();
        assert!(table
            .resolve(&Address::parse("/shared/a"), Some("/shared"))
            .is_none());
    }
}
