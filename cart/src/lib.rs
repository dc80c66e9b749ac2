//! Client-side shopping cart kept in memory and mirrored to a key-value store.

pub mod codec;
pub mod domain;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod ports;

pub use domain::{Cart, CartChange, LineItem, Product};
pub use engine::{CartEngine, CartHandle, HydrationState};
pub use events::CartEvent;
pub use ports::{KeyValueStore, StoreFactory};

/// Store key holding the serialized cart.
///
/// Shared by every engine on the same store: one cart per store, no per-user
/// namespacing.
pub const CART_STORE_KEY: &str = "@cart-engine:items";
