use crate::codec;
use crate::domain::Cart;
use crate::engine::writer::with_timeout;
use crate::ports::KeyValueStore;
use shared::{Error, Result};
use std::time::Duration;
use tokio::sync::watch;

/// Where the startup read from the store stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HydrationState {
    /// The read has not resolved; mutations wait behind it.
    Pending,
    /// A stored cart with `items` lines replaced the empty one.
    Restored { items: usize },
    /// Nothing was stored under the cart key.
    Empty,
    /// The read failed or the record could not be parsed; the cart stays empty.
    Failed { reason: String },
}

impl HydrationState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, HydrationState::Pending)
    }
}

/// Settles a still-pending hydration as `Failed` when dropped, so a hydration
/// task that panics or is cancelled cannot leave mutations waiting forever.
pub(crate) struct SettleOnDrop<'a> {
    state: &'a watch::Sender<HydrationState>,
}

impl<'a> SettleOnDrop<'a> {
    pub(crate) fn new(state: &'a watch::Sender<HydrationState>) -> Self {
        Self { state }
    }
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        let settled = self.state.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = HydrationState::Failed {
                reason: "hydration ended without reading the store".into(),
            };
            true
        });
        if settled {
            tracing::error!("Cart hydration did not complete, starting with an empty cart");
        }
    }
}

/// Read and decode the stored cart. `Ok(None)` means no record exists.
pub(crate) async fn load(
    store: &dyn KeyValueStore,
    key: &str,
    timeout: Option<Duration>,
) -> Result<Option<Cart>> {
    let raw = with_timeout(timeout, store.get(key))
        .await
        .map_err(|e| Error::StoreRead(e.to_string()))?;

    match raw {
        Some(raw) => codec::decode(&raw)
            .map(Some)
            .map_err(|e| Error::StoreRead(e.to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_fails_pending_state() {
        let (state, rx) = watch::channel(HydrationState::Pending);

        drop(SettleOnDrop::new(&state));

        assert!(matches!(*rx.borrow(), HydrationState::Failed { .. }));
    }

    #[test]
    fn test_guard_keeps_settled_state() {
        let (state, rx) = watch::channel(HydrationState::Pending);
        {
            let _guard = SettleOnDrop::new(&state);
            state.send_replace(HydrationState::Empty);
        }

        assert_eq!(*rx.borrow(), HydrationState::Empty);
    }
}
