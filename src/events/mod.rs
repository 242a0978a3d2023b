use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// The events emitted by the storefront core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: u32,
    },
    CartItemUpdated {
        item_id: Uuid,
        quantity: u32,
    },
    CartItemRemoved(Uuid),
    CartCleared,
    /// A server cart mutation failed and was applied locally instead.
    CartSyncDegraded {
        operation: String,
    },

    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),

    // Payment events
    PaymentSessionOpened {
        order_id: Uuid,
        amount: Decimal,
    },
    PaymentConfirmed(Uuid),
    PaymentSessionExpired(Uuid),

    // Address events
    AddressCreated(Uuid),
    AddressUpdated(Uuid),
    AddressDeleted(Uuid),
    DefaultAddressChanged {
        owner_id: Uuid,
        address_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and the sender half wrapped for services.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    /// Event delivery is best-effort; business state never depends on it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Event delivery failed");
        }
    }
}
