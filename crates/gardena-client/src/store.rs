//! Flow context: the persistent key-value scope the client caches tokens and
//! derived data in.
//!
//! The host supplies an implementation of [`FlowContext`]. Two are provided
//! here: [`MemoryFlowContext`] for tests and short-lived processes, and
//! [`FileFlowContext`], which persists a JSON document on every write so
//! cached tokens survive between invocations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gs_domain::error::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;

/// Async key-value store scoped to a long-lived process context.
#[async_trait]
pub trait FlowContext: Send + Sync {
    /// Read a value. `Ok(None)` means the key is unset.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Clear a value. Removing an unset key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
pub struct MemoryFlowContext {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryFlowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently set.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

#[async_trait]
impl FlowContext for MemoryFlowContext {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Flow context backed by a single JSON object on disk.
///
/// The whole document is held in memory and rewritten after every
/// mutation.
pub struct FileFlowContext {
    path: PathBuf,
    values: RwLock<HashMap<String, Value>>,
}

impl FileFlowContext {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!("creating {}: {e}", parent.display())))?;
            }
        }

        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("reading {}: {e}", path.display())))?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| Error::Storage(format!("corrupt flow context {}: {e}", path.display())))?
            }
        } else {
            HashMap::new()
        };

        tracing::debug!(
            keys = values.len(),
            path = %path.display(),
            "flow context loaded"
        );

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &HashMap<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| Error::Storage(format!("serializing flow context: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Storage(format!("writing {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl FlowContext for FileFlowContext {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.write();
        values.insert(key.to_owned(), value);
        self.flush(&values)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_set_get_remove() {
        let ctx = MemoryFlowContext::new();
        assert!(ctx.get("k").await.unwrap().is_none());

        ctx.set("k", json!("v")).await.unwrap();
        assert_eq!(ctx.get("k").await.unwrap(), Some(json!("v")));
        assert_eq!(ctx.len(), 1);

        ctx.remove("k").await.unwrap();
        assert!(ctx.get("k").await.unwrap().is_none());
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn memory_remove_missing_is_ok() {
        let ctx = MemoryFlowContext::new();
        ctx.remove("nothing").await.unwrap();
    }

    #[tokio::test]
    async fn file_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("context.json");

        {
            let ctx = FileFlowContext::open(&path).unwrap();
            ctx.set("gardena_access_token", json!("tok")).await.unwrap();
            ctx.set("gardena_access_token_expires_at", json!(1_700_000_000))
                .await
                .unwrap();
        }

        let reopened = FileFlowContext::open(&path).unwrap();
        assert_eq!(
            reopened.get("gardena_access_token").await.unwrap(),
            Some(json!("tok"))
        );
        assert_eq!(
            reopened.get("gardena_access_token_expires_at").await.unwrap(),
            Some(json!(1_700_000_000))
        );
    }

    #[tokio::test]
    async fn file_remove_is_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("context.json");

        let ctx = FileFlowContext::open(&path).unwrap();
        ctx.set("a", json!(1)).await.unwrap();
        ctx.remove("a").await.unwrap();

        let reopened = FileFlowContext::open(&path).unwrap();
        assert!(reopened.get("a").await.unwrap().is_none());
    }

    #[test]
    fn file_corrupt_document_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("context.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileFlowContext::open(&path).err().unwrap();
        assert!(matches!(err, Error::Storage(_)));
    }
}
