use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
        product::Entity as ProductEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// A single requested order line
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Request to build an order
#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderLineInput>,
    /// Address snapshot serialized onto the order at creation time
    pub shipping_address: Option<serde_json::Value>,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    /// Defaults to cash-on-delivery when not overridden
    pub payment_method: Option<String>,
}

/// An order together with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Order Builder: validates requested lines against the catalog, freezes a
/// price snapshot per line and persists the order.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order for `user_id` in status "pending".
    ///
    /// All requested products are fetched and validated before anything is
    /// written, so an unknown product id aborts with no partial order. The
    /// order header and its items are two separate durable writes: a crash
    /// between them can leave an items-empty order, which every reader must
    /// treat as still-pending.
    #[instrument(skip(self, request), fields(user_id = %user_id, line_count = request.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;

        let db = &*self.db;

        // Single pass: fetch products, validate quantities, accumulate the
        // total at the prices seen right now
        let mut total_amount = Decimal::ZERO;
        let mut priced_lines = Vec::with_capacity(request.items.len());

        for line in &request.items {
            if line.quantity < 1 {
                return Err(ServiceError::InvalidInput(format!(
                    "Quantity for product {} must be at least 1",
                    line.product_id
                )));
            }

            let product = ProductEntity::find_by_id(line.product_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            total_amount += product.price * Decimal::from(line.quantity);
            priced_lines.push((product, line.quantity));
        }

        let order_id = Uuid::new_v4();
        let shipping_address = request
            .shipping_address
            .as_ref()
            .map(|address| address.to_string());

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            customer_name: Set(request.customer_name),
            phone: Set(request.phone),
            payment_method: Set(request
                .payment_method
                .unwrap_or_else(|| order::PAYMENT_METHOD_COD.to_string())),
            status: Set(OrderStatus::Pending.to_string()),
            payment_status: Set(order::PAYMENT_STATUS_PENDING.to_string()),
            total_amount: Set(total_amount),
            shipping_address: Set(shipping_address),
            gateway_order_id: Set(None),
            gateway_payment_id: Set(None),
            created_at: Set(Utc::now()),
        };

        // First durable write: the order header
        let order = order_model.insert(db).await?;

        // Second durable write: one item per line, price frozen at fetch time
        let item_models: Vec<order_item::ActiveModel> = priced_lines
            .iter()
            .map(|(product, quantity)| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                quantity: Set(*quantity),
                price_at_purchase: Set(product.price),
            })
            .collect();
        OrderItemEntity::insert_many(item_models).exec(db).await?;

        let items = self.load_items(order_id).await?;

        info!(order_id = %order_id, total = %order.total_amount, "Order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        Ok(OrderDetails { order, items })
    }

    /// Retrieves an order with its items
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = self.load_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Lists orders newest first. `for_user` scopes the listing to one
    /// customer; `None` returns every order (admin view).
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        for_user: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(user_id) = for_user {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders, total))
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        // An items-empty order is valid (crash window between the two
        // creation writes); callers treat it as still-pending
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(items)
    }
}
