use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::new);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup,
        handlers::auth::login,
        handlers::auth::google_login,
        handlers::users::me,
        handlers::users::update_me,
        handlers::users::list_addresses,
        handlers::users::create_address,
        handlers::users::update_address,
        handlers::users::delete_address,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_order_status,
        handlers::payments::create_payment_order,
        handlers::payment_webhooks::payment_webhook,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Signup, login and social sign-in"),
        (name = "Users", description = "Profile and saved addresses"),
        (name = "Products", description = "Catalog management"),
        (name = "Orders", description = "Order placement and fulfillment status"),
        (name = "Payments", description = "Gateway order creation and webhook reconciliation"),
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
