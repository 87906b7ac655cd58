//! In-memory object store
//!
//! Thread-safe via `RwLock`. Used by tests and for dry runs; versions are
//! numeric (stored as strings) and bump on every write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use rxinv_common::{Error, Result};

use super::{already_exists, ObjectMeta, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    version: i64,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    next_version: i64,
    failing_gets: HashSet<String>,
    failing_copy_prefixes: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<RwLock<State>>,
    get_calls: Arc<AtomicUsize>,
}

fn poisoned<T>(_: T) -> Error {
    Error::Internal("object store lock poisoned".into())
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an object with an explicit last-modified time
    pub fn insert(&self, path: &str, data: impl Into<Vec<u8>>, last_modified: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.next_version += 1;
        let version = state.next_version;
        state.objects.insert(
            path.to_string(),
            StoredObject {
                data: data.into(),
                version,
                last_modified,
            },
        );
        Ok(())
    }

    /// Override an object's last-modified time
    pub fn set_last_modified(&self, path: &str, last_modified: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let object = state
            .objects
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(format!("object not found: {}", path)))?;
        object.last_modified = last_modified;
        Ok(())
    }

    /// Make every subsequent `get` of `path` fail with an I/O error
    pub fn fail_gets_for(&self, path: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failing_gets.insert(path.to_string());
        Ok(())
    }

    /// Make every subsequent `copy` into `prefix` fail with an I/O error
    pub fn fail_copies_to(&self, prefix: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failing_copy_prefixes.insert(prefix.to_string());
        Ok(())
    }

    /// Drop every injected failure
    pub fn clear_failures(&self) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failing_gets.clear();
        state.failing_copy_prefixes.clear();
        Ok(())
    }

    /// Every stored path, sorted
    pub fn paths(&self) -> Result<Vec<String>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.objects.keys().cloned().collect())
    }

    pub fn contains(&self, path: &str) -> Result<bool> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.objects.contains_key(path))
    }

    /// Number of `get` calls served so far
    pub fn get_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn meta(path: &str, object: &StoredObject) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: object.data.len() as u64,
            version: object.version.to_string(),
            last_modified: Some(object.last_modified),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, object)| Self::meta(path, object))
            .collect())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().map_err(poisoned)?;
        if state.failing_gets.contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("download interrupted: {}", path),
            )));
        }
        state
            .objects
            .get(path)
            .map(|object| object.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {}", path)))
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.objects.get(path).map(|object| Self::meta(path, object)))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.insert(path, data, Utc::now())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.failing_copy_prefixes.iter().any(|p| to.starts_with(p.as_str())) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("copy timed out: {} -> {}", from, to),
            )));
        }
        if state.objects.contains_key(to) {
            return Err(already_exists(to));
        }
        let source = state
            .objects
            .get(from)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object not found: {}", from)))?;

        state.next_version += 1;
        let version = state.next_version;
        state.objects.insert(
            to.to_string(),
            StoredObject {
                data: source.data,
                version,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.objects.remove(path);
        Ok(())
    }
}
