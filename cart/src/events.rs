use crate::domain::CartChange;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    Hydrated(HydratedEvent),
    HydrationFailed(HydrationFailedEvent),
    ItemAdded(ItemEvent),
    QuantityChanged(QuantityChangedEvent),
    ItemRemoved(ItemEvent),
    Persisted(PersistEvent),
    PersistFailed(PersistFailedEvent),
    PersistSkipped(PersistSkippedEvent),
}

impl CartEvent {
    /// Product id the event is about, if it concerns a single line.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            CartEvent::ItemAdded(e) | CartEvent::ItemRemoved(e) => Some(e.id.as_str()),
            CartEvent::QuantityChanged(e) => Some(e.id.as_str()),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            CartEvent::Hydrated(e) => e.timestamp,
            CartEvent::HydrationFailed(e) => e.timestamp,
            CartEvent::ItemAdded(e) | CartEvent::ItemRemoved(e) => e.timestamp,
            CartEvent::QuantityChanged(e) => e.timestamp,
            CartEvent::Persisted(e) => e.timestamp,
            CartEvent::PersistFailed(e) => e.timestamp,
            CartEvent::PersistSkipped(e) => e.timestamp,
        }
    }

    pub(crate) fn from_change(change: &CartChange, sequence: u64) -> Self {
        let timestamp = now_timestamp_ms();
        match change {
            CartChange::Added { id } => CartEvent::ItemAdded(ItemEvent {
                id: id.clone(),
                sequence,
                timestamp,
            }),
            CartChange::QuantityChanged { id, quantity } => {
                CartEvent::QuantityChanged(QuantityChangedEvent {
                    id: id.clone(),
                    quantity: *quantity,
                    sequence,
                    timestamp,
                })
            }
            CartChange::Removed { id } => CartEvent::ItemRemoved(ItemEvent {
                id: id.clone(),
                sequence,
                timestamp,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedEvent {
    pub items: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationFailedEvent {
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvent {
    pub id: String,
    pub sequence: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityChangedEvent {
    pub id: String,
    pub quantity: u32,
    pub sequence: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistEvent {
    pub sequence: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistFailedEvent {
    pub sequence: u64,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistSkippedEvent {
    pub sequence: u64,
    /// Sequence already in the store when this write got its turn.
    pub newer: u64,
    pub timestamp: i64,
}

/// Milliseconds since the UNIX epoch
pub fn now_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Send to subscribers; having none is normal before a UI attaches.
pub(crate) fn publish(sender: &broadcast::Sender<CartEvent>, event: CartEvent) {
    let kind = event_kind(&event);
    match sender.send(event) {
        Ok(subscriber_count) => {
            tracing::debug!("Broadcasted {} event to {} subscriber(s)", kind, subscriber_count);
        }
        Err(_) => {
            tracing::debug!("No subscribers for {} event", kind);
        }
    }
}

fn event_kind(event: &CartEvent) -> &'static str {
    match event {
        CartEvent::Hydrated(_) => "hydrated",
        CartEvent::HydrationFailed(_) => "hydration_failed",
        CartEvent::ItemAdded(_) => "item_added",
        CartEvent::QuantityChanged(_) => "quantity_changed",
        CartEvent::ItemRemoved(_) => "item_removed",
        CartEvent::Persisted(_) => "persisted",
        CartEvent::PersistFailed(_) => "persist_failed",
        CartEvent::PersistSkipped(_) => "persist_skipped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_maps_to_event() {
        let event = CartEvent::from_change(
            &CartChange::QuantityChanged {
                id: "7".into(),
                quantity: 4,
            },
            12,
        );

        match &event {
            CartEvent::QuantityChanged(e) => {
                assert_eq!(e.quantity, 4);
                assert_eq!(e.sequence, 12);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(event.item_id(), Some("7"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CartEvent::ItemRemoved(ItemEvent {
            id: "3".into(),
            sequence: 2,
            timestamp: 1_700_000_000_000,
        });

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "item_removed");
        assert_eq!(value["id"], "3");
        assert_eq!(event.timestamp(), 1_700_000_000_000);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let (sender, _) = broadcast::channel(4);
        publish(
            &sender,
            CartEvent::Persisted(PersistEvent {
                sequence: 1,
                timestamp: now_timestamp_ms(),
            }),
        );
    }
}
