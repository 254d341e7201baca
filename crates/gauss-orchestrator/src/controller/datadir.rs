//! Host-side member data directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;

/// The host directory holding every member data directory.
#[derive(Debug, Clone)]
pub struct DataDirectories {
    root: PathBuf,
}

impl DataDirectories {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes every `<instance>-<ordinal>` entry under the root.
    ///
    /// Returns the number of entries removed. A missing root removes nothing.
    pub async fn remove_instance(&self, instance: &str) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "Data root does not exist");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !belongs_to(name, instance) {
                continue;
            }

            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
            info!(path = %path.display(), "Removed member data");
            removed += 1;
        }
        Ok(removed)
    }
}

fn belongs_to(entry: &str, instance: &str) -> bool {
    entry
        .strip_prefix(instance)
        .and_then(|rest| rest.strip_prefix('-'))
        .map(|ordinal| !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("orders-0", "orders"));
        assert!(belongs_to("orders-12", "orders"));
        assert!(!belongs_to("orders-", "orders"));
        assert!(!belongs_to("orders-archive", "orders"));
        assert!(!belongs_to("orders2-0", "orders"));
        assert!(!belongs_to("orders", "orders"));
    }

    #[tokio::test]
    async fn test_removes_only_instance_members() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["orders-0", "orders-1", "orders-archive", "billing-0"] {
            std::fs::create_dir(root.path().join(dir)).unwrap();
        }
        std::fs::write(root.path().join("orders-0").join("postgresql.conf"), "port = 5432\n").unwrap();

        let removed = DataDirectories::new(root.path()).remove_instance("orders").await.unwrap();

        assert_eq!(removed, 2);
        assert!(!root.path().join("orders-0").exists());
        assert!(!root.path().join("orders-1").exists());
        assert!(root.path().join("orders-archive").exists());
        assert!(root.path().join("billing-0").exists());
    }

    #[tokio::test]
    async fn test_missing_root_removes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let dirs = DataDirectories::new(root.path().join("absent"));
        assert_eq!(dirs.remove_instance("orders").await.unwrap(), 0);
    }
}
