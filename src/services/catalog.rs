use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s-]+").unwrap());

/// Derive a URL-safe slug from a product name
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned = NON_SLUG_CHARS.replace_all(lowered.trim(), "");
    SLUG_SEPARATORS
        .replace_all(cleaned.trim(), "-")
        .into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateProductInput {
    pub name: String,
    /// Derived from the name when not supplied
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub is_featured: bool,
    pub is_holiday_special: bool,
}

/// Explicit patch: exactly these fields are updatable, each applied only when
/// present. The slug is immutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub is_featured: Option<bool>,
    pub is_holiday_special: Option<bool>,
    pub is_deleted: Option<bool>,
}

impl ProductPatch {
    /// Merge the patch onto an existing product, returning the active model
    /// with only the patched columns set.
    pub fn apply(self, current: ProductModel) -> product::ActiveModel {
        let mut active: product::ActiveModel = current.into();
        // Reset so only explicitly patched columns are written
        active.name = NotSet;
        active.description = NotSet;
        active.price = NotSet;
        active.stock = NotSet;
        active.image_url = NotSet;
        active.category = NotSet;
        active.is_featured = NotSet;
        active.is_holiday_special = NotSet;
        active.is_deleted = NotSet;
        active.updated_at = Set(Some(Utc::now()));

        if let Some(name) = self.name {
            active.name = Set(name);
        }
        if let Some(description) = self.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = self.price {
            active.price = Set(price);
        }
        if let Some(stock) = self.stock {
            active.stock = Set(stock);
        }
        if let Some(image_url) = self.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(category) = self.category {
            active.category = Set(Some(category));
        }
        if let Some(is_featured) = self.is_featured {
            active.is_featured = Set(is_featured);
        }
        if let Some(is_holiday_special) = self.is_holiday_special {
            active.is_holiday_special = Set(is_holiday_special);
        }
        if let Some(is_deleted) = self.is_deleted {
            active.is_deleted = Set(is_deleted);
        }

        active
    }
}

fn is_foreign_key_violation(err: &DbErr) -> bool {
    err.to_string().to_lowercase().contains("foreign key")
}

/// Catalog service: product CRUD. Products are referenced (never owned) by
/// order items, so a product with order history can only be soft-disabled.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Lists catalog products, optionally filtered by category. Soft-deleted
    /// products are excluded.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        category: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut query = ProductEntity::find().filter(product::Column::IsDeleted.eq(false));
        if let Some(category) = category {
            query = query.filter(product::Column::Category.eq(category));
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((products, total))
    }

    /// Fetches a product by slug, falling back to id for clients that only
    /// hold the identifier.
    #[instrument(skip(self))]
    pub async fn get_product(&self, identifier: &str) -> Result<ProductModel, ServiceError> {
        let by_slug = ProductEntity::find()
            .filter(product::Column::Slug.eq(identifier))
            .one(&*self.db)
            .await?;

        let product = match by_slug {
            Some(product) => Some(product),
            None => match Uuid::parse_str(identifier) {
                Ok(id) => ProductEntity::find_by_id(id).one(&*self.db).await?,
                Err(_) => None,
            },
        };

        product.ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", identifier)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if input.price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Product price cannot be negative".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::InvalidInput(
                "Product stock cannot be negative".to_string(),
            ));
        }

        let slug = match input.slug {
            Some(slug) if !slug.trim().is_empty() => slug,
            _ => slugify(&input.name),
        };
        if slug.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Product name does not yield a usable slug".to_string(),
            ));
        }

        let existing = ProductEntity::find()
            .filter(product::Column::Slug.eq(slug.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A product with slug '{}' already exists",
                slug
            )));
        }

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            image_url: Set(input.image_url),
            category: Set(input.category),
            is_featured: Set(input.is_featured),
            is_holiday_special: Set(input.is_holiday_special),
            is_deleted: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let created = model.insert(&*self.db).await?;
        info!(product_id = %created.id, slug = %created.slug, "Product created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::ProductCreated(created.id)).await {
                warn!(error = %e, "Failed to send product created event");
            }
        }

        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        identifier: &str,
        patch: ProductPatch,
    ) -> Result<ProductModel, ServiceError> {
        if let Some(price) = patch.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "Product price cannot be negative".to_string(),
                ));
            }
        }
        if let Some(stock) = patch.stock {
            if stock < 0 {
                return Err(ServiceError::InvalidInput(
                    "Product stock cannot be negative".to_string(),
                ));
            }
        }

        let current = self.get_product(identifier).await?;
        let updated = patch.apply(current).update(&*self.db).await?;

        info!(product_id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Deletes a product outright. A product referenced by existing order
    /// items is protected by the FK constraint; the violation is translated
    /// into a client error instructing a soft-disable instead.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, identifier: &str) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(identifier).await?;
        let removed = product.clone();

        match product.delete(&*self.db).await {
            Ok(_) => {
                info!(product_id = %removed.id, "Product deleted");
                Ok(removed)
            }
            Err(err) if is_foreign_key_violation(&err) => Err(ServiceError::Conflict(
                "Cannot delete this product because it is part of existing orders. Mark it as deleted instead.".to_string(),
            )),
            Err(err) => Err(ServiceError::DatabaseError(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::ActiveValue;

    fn sample_product() -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            name: "Gold Ring".into(),
            slug: "gold-ring".into(),
            description: None,
            price: dec!(500.00),
            stock: 3,
            image_url: None,
            category: Some("rings".into()),
            is_featured: false,
            is_holiday_special: false,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Gold Ring"), "gold-ring");
        assert_eq!(slugify("  Gold   Ring  "), "gold-ring");
        assert_eq!(slugify("Jhumka (22k) Deluxe!"), "jhumka-22k-deluxe");
        assert_eq!(slugify("already-slugged"), "already-slugged");
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let product = sample_product();
        let patch = ProductPatch {
            price: Some(dec!(650.00)),
            is_featured: Some(true),
            ..Default::default()
        };

        let active = patch.apply(product);

        assert_eq!(active.price, ActiveValue::Set(dec!(650.00)));
        assert_eq!(active.is_featured, ActiveValue::Set(true));
        // Untouched fields must not be written
        assert!(matches!(active.name, ActiveValue::NotSet));
        assert!(matches!(active.stock, ActiveValue::NotSet));
        assert!(matches!(active.is_deleted, ActiveValue::NotSet));
    }

    #[test]
    fn foreign_key_violations_are_recognized() {
        let sqlite = DbErr::Exec(sea_orm::RuntimeErr::Internal(
            "FOREIGN KEY constraint failed".into(),
        ));
        let postgres = DbErr::Exec(sea_orm::RuntimeErr::Internal(
            "update or delete on table \"products\" violates foreign key constraint".into(),
        ));
        let other = DbErr::Exec(sea_orm::RuntimeErr::Internal("disk I/O error".into()));

        assert!(is_foreign_key_violation(&sqlite));
        assert!(is_foreign_key_violation(&postgres));
        assert!(!is_foreign_key_violation(&other));
    }
}
