//! Inbox conventions over an object store
//!
//! Layout: `<inbox>/<tenantId>/<fileName>` moves to
//! `<processed>/<tenantId>/<fileName>` or `<error>/<tenantId>/<fileName>`.
//! A move is copy-then-delete and is not atomic; a crash in between leaves
//! both copies and is reconciled by a later run.

use std::sync::Arc;

use rxinv_common::config::normalize_prefix;
use rxinv_common::Error;

use super::ObjectStore;
use crate::error::IngestError;
use crate::models::BlobRef;

#[derive(Clone)]
pub struct BlobInbox {
    store: Arc<dyn ObjectStore>,
    inbox_prefix: String,
    processed_prefix: String,
    error_prefix: String,
}

fn infrastructure(action: &str, path: &str, err: Error) -> IngestError {
    IngestError::Infrastructure(format!("Object store {} failed for {}: {}", action, path, err))
}

impl BlobInbox {
    /// Prefixes are normalised (blank stays blank, otherwise ends with `/`)
    pub fn new(
        store: Arc<dyn ObjectStore>,
        inbox_prefix: &str,
        processed_prefix: &str,
        error_prefix: &str,
    ) -> Self {
        Self {
            store,
            inbox_prefix: normalize_prefix(inbox_prefix),
            processed_prefix: normalize_prefix(processed_prefix),
            error_prefix: normalize_prefix(error_prefix),
        }
    }

    pub fn inbox_prefix(&self) -> &str {
        &self.inbox_prefix
    }

    /// Every object under the inbox prefix
    ///
    /// Entries the store reports without a last-modified time are skipped:
    /// their age cannot be judged.
    pub async fn list_inbox(&self) -> Result<Vec<BlobRef>, IngestError> {
        let listed = self
            .store
            .list(&self.inbox_prefix)
            .await
            .map_err(|e| infrastructure("list", &self.inbox_prefix, e))?;

        Ok(listed
            .into_iter()
            .filter_map(|meta| match meta.last_modified {
                Some(last_modified) => Some(BlobRef::new(meta.path, meta.version, last_modified)),
                None => {
                    tracing::warn!(blob = %meta.path, "Skipping blob without last-modified time");
                    None
                }
            })
            .collect())
    }

    pub async fn download(&self, name: &str) -> Result<Vec<u8>, IngestError> {
        self.store
            .get(name)
            .await
            .map_err(|e| infrastructure("download", name, e))
    }

    /// Move an inbox object to the processed area; returns the target path
    pub async fn move_to_processed(&self, name: &str) -> Result<String, IngestError> {
        let target = self.target_path(name, &self.processed_prefix)?;
        self.move_object(name, &target).await?;
        Ok(target)
    }

    /// Move an inbox object to the error area; returns the target path
    pub async fn move_to_error(&self, name: &str) -> Result<String, IngestError> {
        let target = self.target_path(name, &self.error_prefix)?;
        self.move_object(name, &target).await?;
        Ok(target)
    }

    fn target_path(&self, name: &str, target_prefix: &str) -> Result<String, IngestError> {
        name.strip_prefix(&self.inbox_prefix)
            .filter(|relative| !relative.is_empty())
            .map(|relative| format!("{}{}", target_prefix, relative))
            .ok_or_else(|| {
                IngestError::Infrastructure(format!(
                    "Blob {} is not under the inbox prefix '{}'",
                    name, self.inbox_prefix
                ))
            })
    }

    async fn move_object(&self, source: &str, target: &str) -> Result<(), IngestError> {
        let existing = self
            .store
            .head(target)
            .await
            .map_err(|e| infrastructure("head", target, e))?;
        if existing.is_some() {
            return Err(IngestError::DestinationConflict(target.to_string()));
        }

        match self.store.copy(source, target).await {
            Ok(()) => {}
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(IngestError::DestinationConflict(target.to_string()));
            }
            Err(e) => return Err(infrastructure("copy", source, e)),
        }

        self.store
            .delete(source)
            .await
            .map_err(|e| infrastructure("delete", source, e))?;

        tracing::debug!(blob = %source, target = %target, "Blob moved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use chrono::Utc;

    fn inbox(store: &MemoryObjectStore) -> BlobInbox {
        BlobInbox::new(Arc::new(store.clone()), "inbox", "processed/", "error")
    }

    #[tokio::test]
    async fn test_prefixes_are_normalised() {
        let store = MemoryObjectStore::new();
        assert_eq!(inbox(&store).inbox_prefix(), "inbox/");
    }

    #[tokio::test]
    async fn test_list_inbox_only_lists_inbox() {
        let store = MemoryObjectStore::new();
        store.insert("inbox/1/a.csv", "a", Utc::now()).unwrap();
        store.insert("processed/1/b.csv", "b", Utc::now()).unwrap();

        let listed = inbox(&store).list_inbox().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "inbox/1/a.csv");
    }

    #[tokio::test]
    async fn test_move_to_processed_copies_then_deletes() {
        let store = MemoryObjectStore::new();
        store.insert("inbox/1/a.csv", "a", Utc::now()).unwrap();

        let target = inbox(&store).move_to_processed("inbox/1/a.csv").await.unwrap();

        assert_eq!(target, "processed/1/a.csv");
        assert_eq!(store.paths().unwrap(), vec!["processed/1/a.csv"]);
    }

    #[tokio::test]
    async fn test_move_to_error_conflict_keeps_source() {
        let store = MemoryObjectStore::new();
        store.insert("inbox/1/a.csv", "new", Utc::now()).unwrap();
        store.insert("error/1/a.csv", "old", Utc::now()).unwrap();

        let err = inbox(&store).move_to_error("inbox/1/a.csv").await.unwrap_err();

        assert!(matches!(err, IngestError::DestinationConflict(ref p) if p == "error/1/a.csv"));
        assert!(store.contains("inbox/1/a.csv").unwrap());
    }

    #[tokio::test]
    async fn test_move_outside_inbox_is_infrastructure_error() {
        let store = MemoryObjectStore::new();
        store.insert("other/1/a.csv", "a", Utc::now()).unwrap();

        let err = inbox(&store).move_to_processed("other/1/a.csv").await.unwrap_err();
        assert_eq!(err.kind(), "INFRASTRUCTURE");
    }

    #[tokio::test]
    async fn test_download_failure_is_infrastructure_error() {
        let store = MemoryObjectStore::new();
        let err = inbox(&store).download("inbox/1/missing.csv").await.unwrap_err();
        assert_eq!(err.kind(), "INFRASTRUCTURE");
    }
}
