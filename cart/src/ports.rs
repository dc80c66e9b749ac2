#![deny(clippy::all)]

use async_trait::async_trait;
use shared::Result;
use shared::config::StoreConfig;
use std::sync::Arc;

// Ports are the pluggable extension points for the persistent store behind the cart

/// Port for creating a store from configuration
/// This allows different storage backends to be plugged in
pub trait StoreFactory: Send + Sync + 'static {
    fn open(&self, config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>>;
}

/// Asynchronous get/set-by-key service the cart is mirrored to.
/// No transactional guarantee holds across calls.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}
