pub mod moka_store;

pub use moka_store::MokaStore;

use cart::persistence::SledStore;
use cart::ports::{KeyValueStore, StoreFactory};
use shared::Result;
use shared::config::{StoreBackend, StoreConfig};
use std::sync::Arc;
use tracing::info;

/// Opens the backend named in the store configuration
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultStoreFactory;

impl StoreFactory for DefaultStoreFactory {
    fn open(&self, config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
        match &config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory cart store; the cart will not survive restarts");
                Ok(Arc::new(MokaStore::default()))
            }
            StoreBackend::Sled(path) => {
                info!("Opening sled cart store at {}", path.display());
                Ok(Arc::new(SledStore::new(path)?))
            }
        }
    }
}
