//! Object store access
//!
//! `ObjectStore` exposes the five primitives the pipeline needs. Version
//! tokens are opaque strings; each backend decides what they mean, the only
//! promise being that the token changes whenever the content changes.
//!
//! `BlobInbox` layers the inbox/processed/error conventions on top.

pub mod inbox;
pub mod local;
pub mod memory;

pub use inbox::BlobInbox;
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rxinv_common::Result;

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object path (key), `/` separated
    pub path: String,
    pub size: u64,
    /// Opaque content version
    pub version: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object storage primitives
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Objects whose path starts with `prefix`, in arbitrary order
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Entire object content; `Error::NotFound` when absent
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Metadata without content; `None` when absent
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Write (or replace) an object
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Server-side copy. Returns once the copy is complete.
    ///
    /// Fails with an `AlreadyExists` I/O error when `to` exists.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Delete an object (succeeds when already absent)
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Error reported by `copy` when the target already exists
pub(crate) fn already_exists(path: &str) -> rxinv_common::Error {
    rxinv_common::Error::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("object already exists: {}", path),
    ))
}
