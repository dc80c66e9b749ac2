use crate::ports::KeyValueStore;
use async_trait::async_trait;
use shared::{Error, Result};
use std::path::Path;

/// Sled-backed key-value store for the persisted cart
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Create a new Sled store
    /// Creates the parent directory if it doesn't exist
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open Sled database: {}", e)))?;

        Ok(Self { db })
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to read '{}': {}", key, e)))?;

        match value {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    Error::Serialization(format!("Value under '{}' is not UTF-8: {}", key, e))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.into_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write '{}': {}", key, e)))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Storage(format!("Failed to flush database: {}", e)))?;

        Ok(())
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"<sled::Db>")
            .finish()
    }
}
