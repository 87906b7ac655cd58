//! Filesystem object store
//!
//! One directory per container under a root directory. Object paths map to
//! relative file paths; the version token is the SHA-256 of the content and
//! last-modified is the file mtime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;
use rxinv_common::{Error, Result};

use super::{already_exists, ObjectMeta, ObjectStore};

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    container_dir: PathBuf,
}

impl LocalObjectStore {
    /// Store rooted at `<root>/<container>` (created on first write)
    pub fn new(root: impl AsRef<Path>, container: &str) -> Self {
        Self {
            container_dir: root.as_ref().join(container),
        }
    }

    pub fn container_dir(&self) -> &Path {
        &self.container_dir
    }

    /// Map an object path to a file below the container directory
    fn file_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(Error::InvalidInput(format!("Invalid object path: {}", path)));
        }
        Ok(self.container_dir.join(relative))
    }
}

fn not_found(path: &str, err: std::io::Error) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::NotFound(format!("object not found: {}", path))
    } else {
        Error::Io(err)
    }
}

/// Metadata for one file, hashing its content (blocking)
fn read_meta(object_path: String, file: &Path) -> std::io::Result<ObjectMeta> {
    let data = std::fs::read(file)?;
    let metadata = std::fs::metadata(file)?;
    let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    Ok(ObjectMeta {
        path: object_path,
        size: metadata.len(),
        version: format!("{:x}", Sha256::digest(&data)),
        last_modified,
    })
}

/// `a/b/c.csv` style key for a file below `base`
fn object_key(base: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(base).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let base = self.container_dir.clone();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<ObjectMeta>> {
            if !base.is_dir() {
                return Ok(Vec::new());
            }

            let mut listed = Vec::new();
            for entry in WalkDir::new(&base).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("Error accessing entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(key) = object_key(&base, entry.path()) else {
                    tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 object path");
                    continue;
                };
                if !key.starts_with(&prefix) {
                    continue;
                }
                match read_meta(key, entry.path()) {
                    Ok(meta) => listed.push(meta),
                    // Removed between walk and read
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::Io(e)),
                }
            }
            Ok(listed)
        })
        .await
        .map_err(|e| Error::Internal(format!("Listing task failed: {}", e)))?
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.file_path(path)?;
        tokio::fs::read(&file).await.map_err(|e| not_found(path, e))
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let file = self.file_path(path)?;
        let object_path = path.to_string();

        let result = tokio::task::spawn_blocking(move || read_meta(object_path, &file))
            .await
            .map_err(|e| Error::Internal(format!("Metadata task failed: {}", e)))?;

        match result {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, data).await?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let source = self.file_path(from)?;
        let target = self.file_path(to)?;

        let data = tokio::fs::read(&source).await.map_err(|e| not_found(from, e))?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut out = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(already_exists(to)),
            Err(e) => return Err(Error::Io(e)),
        };

        out.write_all(&data).await?;
        out.sync_all().await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let file = self.file_path(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
