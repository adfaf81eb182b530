//! # Back-Office API
//!
//! Staff-only list views and bulk actions: a product table with an
//! inventory filter and title-prefix search, inline price edits, a bulk
//! "clear inventory" action, collections ranked by size, customer
//! membership edits and a paged order list.

use std::collections::{HashMap, HashSet};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{InventoryStatus, Membership, Money, PaymentStatus};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::pagination::{paginate, AdminOrderPage, Page};
use crate::routes::collections::product_counts;
use crate::routes::customers::save_customer;
use crate::routes::orders::{order_items, OrderItemView};
use crate::routes::persist_failed;
use crate::routes::products::{collection_titles, validate_unit_price};
use crate::state::AppState;

/// Orders per page in the back-office order list.
pub const ADMIN_ORDERS_PER_PAGE: u32 = 10;

// -- DTOs ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminProductQuery {
    /// `low` or `ok`.
    pub inventory: Option<String>,
    /// Case-insensitive title prefix.
    pub q: Option<String>,
    pub collection_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminProductRow {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
    pub inventory: u32,
    #[schema(value_type = String, example = "LOW")]
    pub inventory_status: InventoryStatus,
    pub collection_title: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClearInventoryRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearInventoryResponse {
    /// Number of products whose inventory was set to zero.
    pub updated: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PriceUpdateRequest {
    #[schema(value_type = String, example = "24.99")]
    pub unit_price: Money,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminCollectionRow {
    pub id: Uuid,
    pub title: String,
    pub products_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminCustomerRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String, example = "BRONZE")]
    pub membership: Membership,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MembershipUpdateRequest {
    #[schema(value_type = String, example = "GOLD")]
    pub membership: Membership,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminOrderQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminOrderRow {
    pub id: Uuid,
    pub placed_at: DateTime<Utc>,
    /// `null` if the customer record is missing.
    pub customer_first_name: Option<String>,
    #[schema(value_type = String, example = "PENDING")]
    pub payment_status: PaymentStatus,
    pub item_count: usize,
    pub items: Vec<OrderItemView>,
}

fn normalized(q: Option<&str>) -> Option<String> {
    q.map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

// -- Router -------------------------------------------------------------------

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/products", get(list_products))
        .route(
            "/v1/admin/products/clear-inventory",
            post(clear_inventory),
        )
        .route("/v1/admin/products/:id/price", patch(update_price))
        .route("/v1/admin/collections", get(list_collections))
        .route("/v1/admin/customers", get(list_customers))
        .route(
            "/v1/admin/customers/:id/membership",
            patch(update_membership),
        )
        .route("/v1/admin/orders", get(list_orders))
}

/// GET /v1/admin/products — Product table ordered by title.
#[utoipa::path(
    get,
    path = "/v1/admin/products",
    params(AdminProductQuery),
    responses(
        (status = 200, description = "Product rows", body = Vec<AdminProductRow>),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown inventory filter", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_products(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AdminProductQuery>, QueryRejection>,
) -> Result<Json<Vec<AdminProductRow>>, AppError> {
    require_role(&caller, Role::Staff)?;
    let q = extract_query(query)?;
    let inventory: Option<InventoryStatus> = q
        .inventory
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::Validation)?;
    let prefix = normalized(q.q.as_deref());
    let threshold = state.config.low_inventory_threshold;

    let titles = collection_titles(&state);
    let mut rows: Vec<AdminProductRow> = state
        .products
        .filter(|p| {
            q.collection_id.map_or(true, |c| p.collection_id == c)
                && inventory.map_or(true, |s| InventoryStatus::classify(p.inventory, threshold) == s)
                && prefix
                    .as_deref()
                    .map_or(true, |pre| p.title.to_lowercase().starts_with(pre))
        })
        .into_iter()
        .map(|p| AdminProductRow {
            inventory_status: InventoryStatus::classify(p.inventory, threshold),
            collection_title: titles.get(&p.collection_id).cloned(),
            id: p.id,
            title: p.title,
            unit_price: p.unit_price,
            inventory: p.inventory,
        })
        .collect();
    rows.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
    Ok(Json(rows))
}

/// POST /v1/admin/products/clear-inventory — Zero the inventory of many products.
#[utoipa::path(
    post,
    path = "/v1/admin/products/clear-inventory",
    request_body = ClearInventoryRequest,
    responses(
        (status = 200, description = "Number of products updated", body = ClearInventoryResponse),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn clear_inventory(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ClearInventoryRequest>, JsonRejection>,
) -> Result<Json<ClearInventoryResponse>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_json(body)?;
    let wanted: HashSet<Uuid> = req.product_ids.into_iter().collect();
    let now = Utc::now();

    let _write = state.catalog_writes.lock(&Uuid::nil()).await;
    let touched: Vec<Uuid> = state
        .products
        .filter(|p| wanted.contains(&p.id))
        .into_iter()
        .map(|p| p.id)
        .collect();

    if let Some(pool) = &state.db_pool {
        crate::db::catalog::clear_inventory(pool, &touched, now)
            .await
            .map_err(|e| persist_failed("inventory", e))?;
    }
    let updated = state.products.update_each(|p| {
        if !wanted.contains(&p.id) {
            return false;
        }
        p.inventory = 0;
        p.last_update = now;
        true
    });

    tracing::info!(updated, requested = wanted.len(), "inventory cleared");
    Ok(Json(ClearInventoryResponse { updated }))
}

/// PATCH /v1/admin/products/:id/price — Inline price edit.
#[utoipa::path(
    patch,
    path = "/v1/admin/products/{id}/price",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = PriceUpdateRequest,
    responses(
        (status = 200, description = "Updated row", body = AdminProductRow),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Price out of range", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_price(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<PriceUpdateRequest>, JsonRejection>,
) -> Result<Json<AdminProductRow>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_json(body)?;
    let price = validate_unit_price(req.unit_price)?;

    let _write = state.catalog_writes.lock(&id).await;
    let mut record = state
        .products
        .get(&id)
        .ok_or_else(|| AppError::not_found("product", id))?;
    record.unit_price = price;
    record.last_update = Utc::now();

    if let Some(pool) = &state.db_pool {
        crate::db::catalog::update_product(pool, &record)
            .await
            .map_err(|e| persist_failed("product", e))?;
    }
    state.products.insert(id, record.clone());

    let collection_title = state.collections.get(&record.collection_id).map(|c| c.title);
    Ok(Json(AdminProductRow {
        inventory_status: InventoryStatus::classify(
            record.inventory,
            state.config.low_inventory_threshold,
        ),
        collection_title,
        id: record.id,
        title: record.title,
        unit_price: record.unit_price,
        inventory: record.inventory,
    }))
}

/// GET /v1/admin/collections — Collections by product count, largest first.
#[utoipa::path(
    get,
    path = "/v1/admin/collections",
    params(SearchQuery),
    responses(
        (status = 200, description = "Collection rows", body = Vec<AdminCollectionRow>),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_collections(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<AdminCollectionRow>>, AppError> {
    require_role(&caller, Role::Staff)?;
    let q = extract_query(query)?;
    let needle = normalized(q.q.as_deref());
    let counts: HashMap<Uuid, usize> = product_counts(&state);

    let mut rows: Vec<AdminCollectionRow> = state
        .collections
        .filter(|c| {
            needle
                .as_deref()
                .map_or(true, |n| c.title.to_lowercase().contains(n))
        })
        .into_iter()
        .map(|c| AdminCollectionRow {
            products_count: counts.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            title: c.title,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.products_count
            .cmp(&a.products_count)
            .then_with(|| a.title.cmp(&b.title))
    });
    Ok(Json(rows))
}

/// GET /v1/admin/customers — Customers filtered by first-name prefix.
#[utoipa::path(
    get,
    path = "/v1/admin/customers",
    params(SearchQuery),
    responses(
        (status = 200, description = "Customer rows", body = Vec<AdminCustomerRow>),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_customers(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<AdminCustomerRow>>, AppError> {
    require_role(&caller, Role::Staff)?;
    let q = extract_query(query)?;
    let prefix = normalized(q.q.as_deref());

    let mut rows: Vec<AdminCustomerRow> = state
        .customers
        .filter(|c| {
            prefix
                .as_deref()
                .map_or(true, |p| c.first_name.to_lowercase().starts_with(p))
        })
        .into_iter()
        .map(|c| AdminCustomerRow {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            membership: c.membership,
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.first_name, &a.last_name, a.id).cmp(&(&b.first_name, &b.last_name, b.id))
    });
    Ok(Json(rows))
}

/// PATCH /v1/admin/customers/:id/membership — Change a membership tier.
#[utoipa::path(
    patch,
    path = "/v1/admin/customers/{id}/membership",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = MembershipUpdateRequest,
    responses(
        (status = 200, description = "Updated row", body = AdminCustomerRow),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_membership(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<MembershipUpdateRequest>, JsonRejection>,
) -> Result<Json<AdminCustomerRow>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_json(body)?;

    let _write = state.customer_writes.lock(&id).await;
    let mut record = state
        .customers
        .get(&id)
        .ok_or_else(|| AppError::not_found("customer", id))?;
    record.membership = req.membership;
    let record = save_customer(&state, record).await?;

    tracing::info!(customer_id = %id, membership = record.membership.as_str(), "membership changed");
    Ok(Json(AdminCustomerRow {
        id: record.id,
        first_name: record.first_name,
        last_name: record.last_name,
        membership: record.membership,
    }))
}

/// GET /v1/admin/orders — Orders newest first, ten per page.
#[utoipa::path(
    get,
    path = "/v1/admin/orders",
    params(AdminOrderQuery),
    responses(
        (status = 200, description = "One page of orders", body = AdminOrderPage),
        (status = 404, description = "Page out of range", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AdminOrderQuery>, QueryRejection>,
) -> Result<Json<Page<AdminOrderRow>>, AppError> {
    require_role(&caller, Role::Staff)?;
    let q = extract_query(query)?;

    let first_names: HashMap<Uuid, String> = state
        .customers
        .list()
        .into_iter()
        .map(|c| (c.id, c.first_name))
        .collect();
    let mut orders = state.orders.list();
    orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(a.id.cmp(&b.id)));

    let page = paginate(orders, q.page, ADMIN_ORDERS_PER_PAGE)?;
    let results = page
        .results
        .into_iter()
        .map(|o| -> Result<AdminOrderRow, AppError> {
            Ok(AdminOrderRow {
                customer_first_name: first_names.get(&o.customer_id).cloned(),
                item_count: o.items.len(),
                items: order_items(&state, o.items)?,
                id: o.id,
                placed_at: o.placed_at,
                payment_status: o.payment_status,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Page {
        count: page.count,
        next: page.next,
        previous: page.previous,
        results,
    }))
}
