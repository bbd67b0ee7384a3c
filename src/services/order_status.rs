use std::str::FromStr;
use std::sync::Arc;

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use strum::IntoEnumIterator;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::{ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Order Status Authority: admin-only direct fulfillment transitions,
/// independent of payment events.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Sets the fulfillment status of an order.
    ///
    /// The new status must be one of the recognized values, matched
    /// case-sensitively. No transition-adjacency validation is applied: any
    /// recognized status may be set from any other. Only `status` changes;
    /// `payment_status` belongs to the webhook reconciler.
    #[instrument(skip(self, acting_user), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn set_status(
        &self,
        order_id: Uuid,
        new_status: &str,
        acting_user: &AuthUser,
    ) -> Result<OrderModel, ServiceError> {
        if !acting_user.is_admin() {
            warn!(user_id = %acting_user.user_id, "Non-admin attempted status update");
            return Err(ServiceError::Forbidden(
                "Only administrators may update order status".to_string(),
            ));
        }

        let status = OrderStatus::from_str(new_status).map_err(|_| {
            error!("Invalid order status: {}", new_status);
            let valid: Vec<String> = OrderStatus::iter().map(|s| s.to_string()).collect();
            ServiceError::InvalidInput(format!(
                "Invalid status '{}'. Valid statuses are: {:?}",
                new_status, valid
            ))
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status.clone();

        let mut active: OrderActiveModel = order.into();
        active.status = Set(status.to_string());
        let updated = active.update(&*self.db).await?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %status,
            "Order status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status: status.to_string(),
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send status changed event");
            }
        }

        Ok(updated)
    }
}
