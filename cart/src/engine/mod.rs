//! The cart engine: owns the in-memory cart, applies mutations, hydrates from
//! the store at startup and mirrors every change back to it.

pub mod hydration;
pub mod writer;

pub use hydration::HydrationState;
pub use writer::{SnapshotWriter, WriteOutcome};

use crate::CART_STORE_KEY;
use crate::domain::{Cart, CartChange, Product};
use crate::events::{CartEvent, HydratedEvent, HydrationFailedEvent, now_timestamp_ms, publish};
use crate::ports::KeyValueStore;
use parking_lot::Mutex;
use shared::config::EngineConfig;
use shared::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

struct CartState {
    cart: Arc<Cart>,
    // Sequence of the last mutation; 0 before the first one
    sequence: u64,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    config: EngineConfig,
    state: Mutex<CartState>,
    snapshots: watch::Sender<Arc<Cart>>,
    hydration: watch::Sender<HydrationState>,
    events: broadcast::Sender<CartEvent>,
    writer: Arc<SnapshotWriter>,
    tasks: TaskTracker,
    flush_lock: tokio::sync::Mutex<()>,
    open: AtomicBool,
}

impl Inner {
    fn items(&self) -> Arc<Cart> {
        self.snapshots.borrow().clone()
    }

    fn hydration(&self) -> HydrationState {
        self.hydration.borrow().clone()
    }

    async fn wait_hydrated(&self) -> HydrationState {
        let mut rx = self.hydration.subscribe();
        rx.wait_for(HydrationState::is_settled)
            .await
            .map(|state| state.clone())
            .unwrap_or_else(|_| self.hydration())
    }

    async fn hydrate(self: Arc<Self>) {
        let _unsettled = hydration::SettleOnDrop::new(&self.hydration);
        let loaded = hydration::load(
            self.store.as_ref(),
            CART_STORE_KEY,
            self.config.store_timeout,
        )
        .await;

        let settled = match loaded {
            Ok(Some(cart)) => {
                let items = cart.len();
                {
                    let mut state = self.state.lock();
                    state.cart = Arc::new(cart);
                    self.snapshots.send_replace(state.cart.clone());
                }
                info!(items, "Cart restored from store");
                publish(
                    &self.events,
                    CartEvent::Hydrated(HydratedEvent {
                        items,
                        timestamp: now_timestamp_ms(),
                    }),
                );
                HydrationState::Restored { items }
            }
            Ok(None) => {
                info!("No stored cart, starting empty");
                publish(
                    &self.events,
                    CartEvent::Hydrated(HydratedEvent {
                        items: 0,
                        timestamp: now_timestamp_ms(),
                    }),
                );
                HydrationState::Empty
            }
            Err(e) => {
                error!(error = %e, "Cart hydration failed, starting with an empty cart");
                publish(
                    &self.events,
                    CartEvent::HydrationFailed(HydrationFailedEvent {
                        reason: e.to_string(),
                        timestamp: now_timestamp_ms(),
                    }),
                );
                HydrationState::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.hydration.send_replace(settled);
    }

    /// Apply `op` to the current cart once hydration has settled, publish the
    /// result and schedule its write. Returns without waiting for the store.
    async fn mutate<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&Cart) -> Result<(Cart, CartChange)> + Send,
    {
        self.wait_hydrated().await;

        let applied = {
            let mut state = self.state.lock();
            op(&state.cart).map(|(next, change)| {
                state.sequence += 1;
                state.cart = Arc::new(next);
                self.snapshots.send_replace(state.cart.clone());
                (state.sequence, state.cart.clone(), change)
            })
        };

        let (sequence, snapshot, change) = match applied {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "Rejected cart mutation");
                return Err(e);
            }
        };

        debug!(sequence, id = change.id(), ?change, "Cart mutation applied");
        publish(&self.events, CartEvent::from_change(&change, sequence));

        let writer = self.writer.clone();
        self.tasks.spawn(async move {
            writer.write(sequence, snapshot).await;
        });

        Ok(())
    }

    async fn add_to_cart(&self, product: Product) -> Result<()> {
        self.mutate(move |cart| Ok(cart.with_product(&product)))
            .await
    }

    async fn increment(&self, id: &str) -> Result<()> {
        self.mutate(|cart| cart.incremented(id)).await
    }

    async fn decrement(&self, id: &str) -> Result<()> {
        self.mutate(|cart| cart.decremented(id)).await
    }

    async fn flush(&self) {
        let _turn = self.flush_lock.lock().await;
        self.tasks.close();
        self.tasks.wait().await;
        if self.open.load(Ordering::Acquire) {
            self.tasks.reopen();
        }
    }
}

/// Owner of the cart for the lifetime of the application.
///
/// Starting the engine issues the one hydration read. Consumers either borrow
/// the engine or hold a [`CartHandle`], which stops working once the engine is
/// shut down or dropped.
pub struct CartEngine {
    inner: Arc<Inner>,
}

impl CartEngine {
    /// Start the engine and kick off hydration. Must be called inside a Tokio runtime.
    pub fn start(store: Arc<dyn KeyValueStore>, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let writer = Arc::new(SnapshotWriter::new(
            store.clone(),
            CART_STORE_KEY,
            config.store_timeout,
            config.write_attempts,
            events.clone(),
        ));
        let (snapshots, _) = watch::channel(Arc::new(Cart::new()));
        let (hydration, _) = watch::channel(HydrationState::Pending);

        let inner = Arc::new(Inner {
            store,
            config,
            state: Mutex::new(CartState {
                cart: Arc::new(Cart::new()),
                sequence: 0,
            }),
            snapshots,
            hydration,
            events,
            writer,
            tasks: TaskTracker::new(),
            flush_lock: tokio::sync::Mutex::new(()),
            open: AtomicBool::new(true),
        });

        info!(key = CART_STORE_KEY, "Starting cart engine");
        inner.tasks.spawn(inner.clone().hydrate());

        Self { inner }
    }

    pub fn handle(&self) -> CartHandle {
        CartHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Read-only snapshot of the current cart.
    pub fn items(&self) -> Arc<Cart> {
        self.inner.items()
    }

    pub async fn add_to_cart(&self, product: Product) -> Result<()> {
        self.inner.add_to_cart(product).await
    }

    pub async fn increment(&self, id: &str) -> Result<()> {
        self.inner.increment(id).await
    }

    pub async fn decrement(&self, id: &str) -> Result<()> {
        self.inner.decrement(id).await
    }

    /// Receiver that observes every new cart snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<Cart>> {
        self.inner.snapshots.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    pub fn hydration(&self) -> HydrationState {
        self.inner.hydration()
    }

    pub async fn wait_hydrated(&self) -> HydrationState {
        self.inner.wait_hydrated().await
    }

    /// Sequence of the newest snapshot known to be stored.
    pub async fn last_persisted(&self) -> u64 {
        self.inner.writer.last_applied().await
    }

    /// Wait for every scheduled write (and hydration) to finish.
    pub async fn flush(&self) {
        self.inner.flush().await
    }

    /// Close the scope: handles start failing with `OutOfScope`, then pending
    /// writes are awaited.
    pub async fn shutdown(self) {
        self.inner.open.store(false, Ordering::Release);
        self.inner.flush().await;
        info!("Cart engine shut down");
    }
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("items", &self.inner.items().len())
            .field("hydration", &self.inner.hydration())
            .finish()
    }
}

/// Clonable access to a running [`CartEngine`].
#[derive(Clone, Debug)]
pub struct CartHandle {
    inner: Weak<Inner>,
}

impl CartHandle {
    /// A handle with no engine behind it; every call fails with `OutOfScope`.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    pub fn is_attached(&self) -> bool {
        self.scope().is_ok()
    }

    fn scope(&self) -> Result<Arc<Inner>> {
        let inner = self.inner.upgrade().ok_or_else(|| {
            Error::OutOfScope("handle is not attached to a running CartEngine".into())
        })?;
        if !inner.open.load(Ordering::Acquire) {
            return Err(Error::OutOfScope("CartEngine has been shut down".into()));
        }
        Ok(inner)
    }

    pub fn items(&self) -> Result<Arc<Cart>> {
        Ok(self.scope()?.items())
    }

    pub async fn add_to_cart(&self, product: Product) -> Result<()> {
        self.scope()?.add_to_cart(product).await
    }

    pub async fn increment(&self, id: &str) -> Result<()> {
        self.scope()?.increment(id).await
    }

    pub async fn decrement(&self, id: &str) -> Result<()> {
        self.scope()?.decrement(id).await
    }

    pub fn watch(&self) -> Result<watch::Receiver<Arc<Cart>>> {
        Ok(self.scope()?.snapshots.subscribe())
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<CartEvent>> {
        Ok(self.scope()?.events.subscribe())
    }

    pub fn hydration(&self) -> Result<HydrationState> {
        Ok(self.scope()?.hydration())
    }

    pub async fn wait_hydrated(&self) -> Result<HydrationState> {
        Ok(self.scope()?.wait_hydrated().await)
    }
}
