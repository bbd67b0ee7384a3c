use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted by the services. Delivery is best-effort: a full
/// channel or missing processor never fails the originating request.
#[derive(Debug, Clone)]
pub enum Event {
    UserRegistered(Uuid),
    ProductCreated(Uuid),
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PaymentInitiated {
        order_id: Uuid,
        gateway_order_id: String,
    },
    PaymentCaptured {
        order_id: Uuid,
        gateway_payment_id: String,
    },
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime of the
/// process; exits when every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::PaymentCaptured {
                order_id,
                gateway_payment_id,
            } => {
                info!(%order_id, %gateway_payment_id, "payment captured");
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }
}
