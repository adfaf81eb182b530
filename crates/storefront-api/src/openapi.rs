//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented handler and schema into one OpenAPI
//! document served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`Bearer {role}:{user_id}:{mac}`, or `Bearer {secret}` for staff. \
                             Requests without a token are anonymous.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Catalog, reviews, anonymous carts, customer profiles, checkout and back-office views.\n\nCatalog reads, reviews and carts are public. Orders and `/v1/customers/me` need a bearer token bound to a user; management endpoints need the staff role.",
        license(name = "BUSL-1.1"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Collections ─────────────────────────────────────────────────
        crate::routes::collections::list_collections,
        crate::routes::collections::create_collection,
        crate::routes::collections::get_collection,
        crate::routes::collections::update_collection,
        crate::routes::collections::delete_collection,
        // ── Products ────────────────────────────────────────────────────
        crate::routes::products::list_products,
        crate::routes::products::create_product,
        crate::routes::products::get_product,
        crate::routes::products::update_product,
        crate::routes::products::delete_product,
        // ── Reviews ─────────────────────────────────────────────────────
        crate::routes::reviews::list_reviews,
        crate::routes::reviews::create_review,
        crate::routes::reviews::get_review,
        crate::routes::reviews::update_review,
        crate::routes::reviews::delete_review,
        // ── Tags ────────────────────────────────────────────────────────
        crate::routes::tags::list_tags,
        crate::routes::tags::list_product_tags,
        crate::routes::tags::attach_tag,
        crate::routes::tags::detach_tag,
        // ── Carts ───────────────────────────────────────────────────────
        crate::routes::carts::create_cart,
        crate::routes::carts::get_cart,
        crate::routes::carts::delete_cart,
        crate::routes::carts::list_items,
        crate::routes::carts::get_item,
        crate::routes::carts::add_item,
        crate::routes::carts::update_item,
        crate::routes::carts::delete_item,
        // ── Customers ───────────────────────────────────────────────────
        crate::routes::customers::list_customers,
        crate::routes::customers::create_customer,
        crate::routes::customers::get_customer,
        crate::routes::customers::update_customer,
        crate::routes::customers::delete_customer,
        crate::routes::customers::get_me,
        crate::routes::customers::update_me,
        // ── Orders ──────────────────────────────────────────────────────
        crate::routes::orders::create_order,
        crate::routes::orders::list_orders,
        crate::routes::orders::get_order,
        crate::routes::orders::update_order,
        // ── Admin ───────────────────────────────────────────────────────
        crate::routes::admin::list_products,
        crate::routes::admin::clear_inventory,
        crate::routes::admin::update_price,
        crate::routes::admin::list_collections,
        crate::routes::admin::list_customers,
        crate::routes::admin::update_membership,
        crate::routes::admin::list_orders,
    ),
    components(
        schemas(
            // ── Records ─────────────────────────────────────────────────
            crate::state::ReviewRecord,
            crate::state::CustomerRecord,
            // ── Errors ──────────────────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Pages ───────────────────────────────────────────────────
            crate::pagination::ProductPage,
            crate::pagination::AdminOrderPage,
            // ── Catalog DTOs ────────────────────────────────────────────
            crate::routes::collections::CollectionRequest,
            crate::routes::collections::CollectionView,
            crate::routes::products::ProductRequest,
            crate::routes::products::ProductView,
            crate::routes::reviews::ReviewRequest,
            crate::routes::tags::TagRequest,
            crate::routes::tags::TagView,
            // ── Cart DTOs ───────────────────────────────────────────────
            crate::routes::carts::AddCartItemRequest,
            crate::routes::carts::UpdateCartItemRequest,
            crate::routes::carts::CartProduct,
            crate::routes::carts::CartItemView,
            crate::routes::carts::CartView,
            // ── Customer and order DTOs ─────────────────────────────────
            crate::routes::customers::CreateCustomerRequest,
            crate::routes::customers::ProfileRequest,
            crate::routes::orders::CreateOrderRequest,
            crate::routes::orders::UpdateOrderRequest,
            crate::routes::orders::OrderItemView,
            crate::routes::orders::OrderView,
            // ── Admin DTOs ──────────────────────────────────────────────
            crate::routes::admin::AdminProductRow,
            crate::routes::admin::ClearInventoryRequest,
            crate::routes::admin::ClearInventoryResponse,
            crate::routes::admin::PriceUpdateRequest,
            crate::routes::admin::AdminCollectionRow,
            crate::routes::admin::AdminCustomerRow,
            crate::routes::admin::MembershipUpdateRequest,
            crate::routes::admin::AdminOrderRow,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "collections", description = "Product groupings with product counts"),
        (name = "products", description = "Catalog browsing and product management"),
        (name = "reviews", description = "Customer feedback attached to a product"),
        (name = "tags", description = "Labels staff attach to products"),
        (name = "carts", description = "Anonymous carts; repeated adds accumulate quantity"),
        (name = "customers", description = "Customer profiles, one per user"),
        (name = "orders", description = "Checkout and payment status"),
        (name = "admin", description = "Staff back-office views and bulk actions"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — The generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
