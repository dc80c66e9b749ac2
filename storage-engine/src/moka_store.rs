use async_trait::async_trait;
use cart::ports::KeyValueStore;
use moka::future::Cache;
use shared::Result;
use std::fmt::Debug;

/// Moka-based in-memory key-value store
/// Nothing survives the process; useful for tests and ephemeral sessions
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, String>,
}

impl MokaStore {
    /// Create a new unbounded, non-expiring store
    pub fn new(name: &str) -> Self {
        Self {
            cache: Cache::builder().name(name).build(),
        }
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new("cart")
    }
}

#[async_trait]
impl KeyValueStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }
}

impl Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
