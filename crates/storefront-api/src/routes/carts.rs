//! # Cart API
//!
//! Carts are anonymous and addressed by their UUID. Adding a product that
//! is already in the cart raises that line's quantity instead of creating
//! a second line. Writers to one cart queue on that cart's entry in
//! [`AppState::cart_writes`] and compute the new quantity from the line as
//! it stands once they hold it, so concurrent adds never lose an
//! increment. With a database the line is saved before the in-memory cart
//! changes, which keeps both in the same order.
//!
//! Line and cart totals are computed from current product prices; the
//! price is only frozen when the cart becomes an order.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{Money, Quantity, ValidationError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::{delete_failed, persist_failed};
use crate::state::{AppState, CartItemRecord, CartRecord};

// -- DTOs ---------------------------------------------------------------------

/// Add a product to a cart.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    /// 1..=32767.
    pub quantity: i64,
}

impl Validate for AddCartItemRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Quantity::new(self.quantity).map(|_| ())
    }
}

/// Set a line's quantity.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

impl Validate for UpdateCartItemRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Quantity::new(self.quantity).map(|_| ())
    }
}

/// The product summary shown on a cart line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartProduct {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub product: CartProduct,
    #[schema(value_type = u16)]
    pub quantity: Quantity,
    /// `unit_price × quantity` at the current price.
    #[schema(value_type = String, example = "39.98")]
    pub total_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItemView>,
    #[schema(value_type = String, example = "0.00")]
    pub total_price: Money,
}

// -- Views --------------------------------------------------------------------

/// Render a line, or `None` if its product has since been deleted.
fn item_view(state: &AppState, item: &CartItemRecord) -> Result<Option<CartItemView>, AppError> {
    let Some(product) = state.products.get(&item.product_id) else {
        return Ok(None);
    };
    let total_price = product.unit_price.checked_mul(u32::from(item.quantity))?;
    Ok(Some(CartItemView {
        id: item.id,
        product: CartProduct {
            id: product.id,
            title: product.title,
            unit_price: product.unit_price,
        },
        quantity: item.quantity,
        total_price,
    }))
}

fn cart_view(state: &AppState, cart: CartRecord) -> Result<CartView, AppError> {
    let mut items = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        match item_view(state, item)? {
            Some(view) => items.push(view),
            None => tracing::debug!(cart_id = %cart.id, item_id = %item.id, "skipping line for deleted product"),
        }
    }
    let total_price = Money::checked_sum(items.iter().map(|i| i.total_price))?;
    Ok(CartView {
        id: cart.id,
        created_at: cart.created_at,
        items,
        total_price,
    })
}

fn existing_item_view(state: &AppState, item: &CartItemRecord) -> Result<CartItemView, AppError> {
    item_view(state, item)?.ok_or_else(|| AppError::not_found("product", item.product_id))
}

fn find_cart(state: &AppState, id: Uuid) -> Result<CartRecord, AppError> {
    state
        .carts
        .get(&id)
        .ok_or_else(|| AppError::not_found("cart", id))
}

/// Publish a persisted line: replace the line with the same id, or append it.
fn put_line(state: &AppState, cart_id: Uuid, item: &CartItemRecord) -> Result<(), AppError> {
    state
        .carts
        .update(&cart_id, |cart| {
            match cart.items.iter_mut().find(|i| i.id == item.id) {
                Some(line) => line.quantity = item.quantity,
                None => cart.items.push(item.clone()),
            }
        })
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("cart", cart_id))
}

// -- Router -------------------------------------------------------------------

/// Build the carts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/carts", post(create_cart))
        .route("/v1/carts/:id", get(get_cart).delete(delete_cart))
        .route("/v1/carts/:id/items", get(list_items).post(add_item))
        .route(
            "/v1/carts/:id/items/:item_id",
            get(get_item).patch(update_item).delete(delete_item),
        )
}

/// POST /v1/carts — Create an empty cart.
#[utoipa::path(
    post,
    path = "/v1/carts",
    responses(
        (status = 201, description = "Cart created", body = CartView),
    ),
    tag = "carts"
)]
async fn create_cart(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CartView>), AppError> {
    let record = CartRecord {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        items: Vec::new(),
    };
    if let Some(pool) = &state.db_pool {
        crate::db::carts::insert_cart(pool, &record)
            .await
            .map_err(|e| persist_failed("cart", e))?;
    }
    state.carts.insert(record.id, record.clone());

    tracing::debug!(cart_id = %record.id, "cart created");
    Ok((StatusCode::CREATED, Json(cart_view(&state, record)?)))
}

/// GET /v1/carts/:id — A cart with its lines and total.
#[utoipa::path(
    get,
    path = "/v1/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart found", body = CartView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    let cart = find_cart(&state, id)?;
    Ok(Json(cart_view(&state, cart)?))
}

/// DELETE /v1/carts/:id — Discard a cart and its lines.
#[utoipa::path(
    delete,
    path = "/v1/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 204, description = "Cart deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn delete_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let _write = state.cart_writes.lock(&id).await;
    if !state.carts.contains(&id) {
        return Err(AppError::not_found("cart", id));
    }
    if let Some(pool) = &state.db_pool {
        crate::db::carts::delete_cart(pool, id)
            .await
            .map_err(|e| delete_failed("cart", e))?;
    }
    state.carts.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/carts/:id/items — The cart's lines.
#[utoipa::path(
    get,
    path = "/v1/carts/{id}/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart lines", body = Vec<CartItemView>),
        (status = 404, description = "Cart not found", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CartItemView>>, AppError> {
    let cart = find_cart(&state, id)?;
    Ok(Json(cart_view(&state, cart)?.items))
}

/// GET /v1/carts/:id/items/:item_id — One line.
#[utoipa::path(
    get,
    path = "/v1/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID"),
    ),
    responses(
        (status = 200, description = "Cart line", body = CartItemView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn get_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CartItemView>, AppError> {
    let cart = find_cart(&state, id)?;
    let item = cart
        .items
        .iter()
        .find(|i| i.id == item_id)
        .ok_or_else(|| AppError::not_found("cart item", item_id))?;
    Ok(Json(existing_item_view(&state, item)?))
}

/// POST /v1/carts/:id/items — Add a product, or raise its quantity if it
/// is already in this cart.
#[utoipa::path(
    post,
    path = "/v1/carts/{id}/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Existing line's quantity increased", body = CartItemView),
        (status = 201, description = "New line created", body = CartItemView),
        (status = 404, description = "Cart not found", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown product or bad quantity", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<AddCartItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartItemView>), AppError> {
    let req = extract_validated_json(body)?;
    let quantity = Quantity::new(req.quantity)?;
    if !state.products.contains(&req.product_id) {
        return Err(AppError::Validation(format!(
            "no product with the given ID was found: {}",
            req.product_id
        )));
    }

    let _write = state.cart_writes.lock(&id).await;
    let cart = find_cart(&state, id)?;
    let (item, created) = match cart.line_for_product(&req.product_id) {
        Some(line) => (
            CartItemRecord {
                quantity: line.quantity.accumulate(quantity)?,
                ..line.clone()
            },
            false,
        ),
        None => (
            CartItemRecord {
                id: Uuid::new_v4(),
                product_id: req.product_id,
                quantity,
            },
            true,
        ),
    };

    if let Some(pool) = &state.db_pool {
        crate::db::carts::upsert_item(pool, id, &item)
            .await
            .map_err(|e| persist_failed("cart item", e))?;
    }
    put_line(&state, id, &item)?;

    tracing::debug!(
        cart_id = %id,
        product_id = %item.product_id,
        quantity = %item.quantity,
        created,
        "cart line saved"
    );
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(existing_item_view(&state, &item)?)))
}

/// PATCH /v1/carts/:id/items/:item_id — Set a line's quantity.
#[utoipa::path(
    patch,
    path = "/v1/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID"),
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Line updated", body = CartItemView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Bad quantity", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn update_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<UpdateCartItemRequest>, JsonRejection>,
) -> Result<Json<CartItemView>, AppError> {
    let req = extract_validated_json(body)?;
    let quantity = Quantity::new(req.quantity)?;

    let _write = state.cart_writes.lock(&id).await;
    let cart = find_cart(&state, id)?;
    let item = cart
        .items
        .iter()
        .find(|i| i.id == item_id)
        .map(|line| CartItemRecord {
            quantity,
            ..line.clone()
        })
        .ok_or_else(|| AppError::not_found("cart item", item_id))?;

    if let Some(pool) = &state.db_pool {
        crate::db::carts::update_item_quantity(pool, item_id, quantity)
            .await
            .map_err(|e| persist_failed("cart item", e))?;
    }
    put_line(&state, id, &item)?;

    Ok(Json(existing_item_view(&state, &item)?))
}

/// DELETE /v1/carts/:id/items/:item_id — Remove a line.
#[utoipa::path(
    delete,
    path = "/v1/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID"),
    ),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "carts"
)]
async fn delete_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let _write = state.cart_writes.lock(&id).await;
    let cart = find_cart(&state, id)?;
    if !cart.items.iter().any(|i| i.id == item_id) {
        return Err(AppError::not_found("cart item", item_id));
    }

    if let Some(pool) = &state.db_pool {
        crate::db::carts::delete_item(pool, item_id)
            .await
            .map_err(|e| persist_failed("cart item", e))?;
    }
    state
        .carts
        .update(&id, |cart| cart.items.retain(|i| i.id != item_id))
        .ok_or_else(|| AppError::not_found("cart", id))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CallerIdentity;
    use crate::routes::test_support::*;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(state: &AppState) -> Router {
        app_as(router(), state.clone(), CallerIdentity::anonymous())
    }

    async fn new_cart(state: &AppState) -> CartView {
        let resp = app(state)
            .oneshot(empty_request("POST", "/v1/carts"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }

    async fn add(state: &AppState, cart_id: Uuid, product_id: Uuid, quantity: i64) -> axum::response::Response {
        app(state)
            .oneshot(json_request(
                "POST",
                &format!("/v1/carts/{cart_id}/items"),
                json!({"product_id": product_id, "quantity": quantity}),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn new_cart_is_empty() {
        let state = AppState::new();
        let cart = new_cart(&state).await;
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_price.to_string(), "0.00");
        assert!(state.carts.contains(&cart.id));
    }

    #[tokio::test]
    async fn repeated_add_accumulates_quantity() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = new_cart(&state).await;

        let resp = add(&state, cart.id, p.id, 2).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let first: CartItemView = body_json(resp).await;

        let resp = add(&state, cart.id, p.id, 3).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let second: CartItemView = body_json(resp).await;
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity.get(), 5);
        assert_eq!(second.total_price.to_string(), "25.00");

        let stored = state.carts.get(&cart.id).unwrap();
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn same_product_in_two_carts_is_independent() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let a = new_cart(&state).await;
        let b = new_cart(&state).await;

        assert_eq!(add(&state, a.id, p.id, 2).await.status(), StatusCode::CREATED);
        assert_eq!(add(&state, b.id, p.id, 1).await.status(), StatusCode::CREATED);
        assert_eq!(state.carts.get(&a.id).unwrap().items[0].quantity.get(), 2);
        assert_eq!(state.carts.get(&b.id).unwrap().items[0].quantity.get(), 1);
    }

    #[tokio::test]
    async fn add_rejects_bad_input() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = new_cart(&state).await;

        let resp = add(&state, cart.id, Uuid::new_v4(), 1).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let resp = add(&state, cart.id, p.id, 0).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let resp = add(&state, Uuid::new_v4(), p.id, 1).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        assert_eq!(add(&state, cart.id, p.id, 32_767).await.status(), StatusCode::CREATED);
        let resp = add(&state, cart.id, p.id, 1).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.carts.get(&cart.id).unwrap().items[0].quantity.get(), 32_767);
    }

    #[tokio::test]
    async fn cart_total_sums_lines() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let kettle = seed_product(&state, c.id, "Kettle", "24.99", 20);
        let cart = new_cart(&state).await;
        add(&state, cart.id, mug.id, 2).await;
        add(&state, cart.id, kettle.id, 1).await;

        let resp = app(&state)
            .oneshot(empty_request("GET", &format!("/v1/carts/{}", cart.id)))
            .await
            .unwrap();
        let view: CartView = body_json(resp).await;
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.total_price.to_string(), "34.99");
    }

    #[tokio::test]
    async fn update_and_delete_line() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = new_cart(&state).await;
        let line: CartItemView = body_json(add(&state, cart.id, p.id, 2).await).await;
        let uri = format!("/v1/carts/{}/items/{}", cart.id, line.id);

        let resp = app(&state)
            .oneshot(json_request("PATCH", &uri, json!({"quantity": 7})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: CartItemView = body_json(resp).await;
        assert_eq!(updated.quantity.get(), 7);

        let resp = app(&state).oneshot(empty_request("DELETE", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app(&state).oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_cart_then_404() {
        let state = AppState::new();
        let cart = new_cart(&state).await;
        let uri = format!("/v1/carts/{}", cart.id);
        let resp = app(&state).oneshot(empty_request("DELETE", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app(&state).oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn view_skips_lines_of_deleted_products() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = new_cart(&state).await;
        add(&state, cart.id, p.id, 1).await;
        state.products.remove(&p.id);

        let resp = app(&state)
            .oneshot(empty_request("GET", &format!("/v1/carts/{}", cart.id)))
            .await
            .unwrap();
        let view: CartView = body_json(resp).await;
        assert!(view.items.is_empty());
        assert_eq!(view.total_price, Money::ZERO);
    }

    #[tokio::test]
    async fn concurrent_adds_never_lose_increments() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = new_cart(&state).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let state = state.clone();
            let (cart_id, product_id) = (cart.id, p.id);
            handles.push(tokio::spawn(async move {
                add(&state, cart_id, product_id, 1).await.status()
            }));
        }
        let mut created = 0;
        for h in handles {
            if h.await.unwrap() == StatusCode::CREATED {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        let stored = state.carts.get(&cart.id).unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].quantity.get(), 20);
    }

    #[tokio::test]
    async fn failed_save_leaves_cart_unchanged() {
        let state = state_with_failing_db();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let line = CartItemRecord {
            id: Uuid::new_v4(),
            product_id: p.id,
            quantity: Quantity::new(2).unwrap(),
        };
        let cart = CartRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            items: vec![line.clone()],
        };
        state.carts.insert(cart.id, cart.clone());

        let resp = add(&state, cart.id, p.id, 3).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = app(&state)
            .oneshot(json_request(
                "PATCH",
                &format!("/v1/carts/{}/items/{}", cart.id, line.id),
                json!({"quantity": 9}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let stored = state.carts.get(&cart.id).unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].quantity.get(), 2);

        let resp = app(&state)
            .oneshot(empty_request("POST", "/v1/carts"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.carts.len(), 1);
    }
}
