// shared/src/lib.rs

use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Hydration could not read or parse the stored cart record.
    #[error("store read failed: {0}")]
    StoreRead(String),
    /// A post-mutation write did not reach the store.
    #[error("store write failed: {0}")]
    StoreWrite(String),
    /// The cart API was used without a live engine behind it.
    #[error("cart engine not in scope: {0}")]
    OutOfScope(String),
    /// `increment`/`decrement` on an id that is not in the cart.
    #[error("product not in cart: {0}")]
    NotFound(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("invalid cart record: {0}")]
    InvalidRecord(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
