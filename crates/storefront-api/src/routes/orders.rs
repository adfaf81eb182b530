//! # Order API
//!
//! Checkout turns a cart into an order. It holds the cart's write lock
//! from lookup to hand-off, so of two concurrent checkouts of one cart
//! exactly one proceeds and the other sees 404. Each order line snapshots
//! the product's price at that moment. With a database, the order, its
//! lines and the removal of the cart commit in one transaction before the
//! in-memory stores change; if that fails the cart stays as it was.
//!
//! Customers see only their own orders. Staff see all of them and drive
//! the payment status.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{Money, PaymentStatus, Quantity};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, require_user, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::customers::resolve_customer;
use crate::routes::persist_failed;
use crate::state::{AppState, CartRecord, CustomerRecord, OrderItemRecord, OrderRecord};

// -- DTOs ---------------------------------------------------------------------

/// Check out a cart.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub cart_id: Uuid,
}

/// Move an order to another payment status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    #[schema(value_type = String, example = "COMPLETE")]
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Current title, or `null` if the product no longer exists.
    pub product_title: Option<String>,
    #[schema(value_type = u16)]
    pub quantity: Quantity,
    /// Price per unit when the order was placed.
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
    #[schema(value_type = String, example = "39.98")]
    pub total_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub placed_at: DateTime<Utc>,
    #[schema(value_type = String, example = "PENDING")]
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItemView>,
    #[schema(value_type = String, example = "39.98")]
    pub total_price: Money,
}

/// Sum of `unit_price × quantity` over an order's lines.
pub(crate) fn order_total(order: &OrderRecord) -> Result<Money, AppError> {
    let lines = order
        .items
        .iter()
        .map(|i| i.unit_price.checked_mul(u32::from(i.quantity)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Money::checked_sum(lines)?)
}

/// Line views with current product titles and per-line totals.
pub(crate) fn order_items(
    state: &AppState,
    items: Vec<OrderItemRecord>,
) -> Result<Vec<OrderItemView>, AppError> {
    items
        .into_iter()
        .map(|item| -> Result<OrderItemView, AppError> {
            Ok(OrderItemView {
                product_title: state.products.get(&item.product_id).map(|p| p.title),
                total_price: item.unit_price.checked_mul(u32::from(item.quantity))?,
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
        })
        .collect()
}

fn order_view(state: &AppState, order: OrderRecord) -> Result<OrderView, AppError> {
    let total_price = order_total(&order)?;
    let items = order_items(state, order.items)?;
    Ok(OrderView {
        id: order.id,
        customer_id: order.customer_id,
        placed_at: order.placed_at,
        payment_status: order.payment_status,
        items,
        total_price,
    })
}

// -- Router -------------------------------------------------------------------

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", get(list_orders).post(create_order))
        .route("/v1/orders/:id", get(get_order).patch(update_order))
}

/// Snapshot the cart's lines into order lines at current prices.
///
/// Lines whose product has been deleted are dropped. An order needs at
/// least one line.
fn build_order(
    state: &AppState,
    customer: &CustomerRecord,
    cart: &CartRecord,
) -> Result<OrderRecord, AppError> {
    let mut items = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        match state.products.get(&line.product_id) {
            Some(product) => items.push(OrderItemRecord {
                id: Uuid::new_v4(),
                product_id: product.id,
                quantity: line.quantity,
                unit_price: product.unit_price,
            }),
            None => tracing::warn!(
                cart_id = %cart.id,
                product_id = %line.product_id,
                "dropping cart line for deleted product"
            ),
        }
    }
    if items.is_empty() {
        return Err(AppError::Validation(format!("cart {} is empty", cart.id)));
    }
    Ok(OrderRecord {
        id: Uuid::new_v4(),
        customer_id: customer.id,
        placed_at: Utc::now(),
        payment_status: PaymentStatus::Pending,
        items,
    })
}

async fn place(state: &AppState, customer: &CustomerRecord, cart: &CartRecord) -> Result<OrderRecord, AppError> {
    let order = build_order(state, customer, cart)?;
    if let Some(pool) = &state.db_pool {
        crate::db::orders::place_order(pool, &order, cart.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, cart_id = %cart.id, "order transaction failed");
                AppError::Internal("order could not be placed".into())
            })?;
    }
    state.carts.remove(&cart.id);
    state.orders.insert(order.id, order.clone());
    Ok(order)
}

/// POST /v1/orders — Check out a cart.
#[utoipa::path(
    post,
    path = "/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed; the cart is gone", body = OrderView),
        (status = 401, description = "No authenticated user", body = crate::error::ErrorBody),
        (status = 404, description = "Cart not found", body = crate::error::ErrorBody),
        (status = 422, description = "Cart is empty", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
async fn create_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let user_id = require_user(&caller)?;
    let req = extract_json(body)?;
    let customer = resolve_customer(&state, user_id).await?;

    let _write = state.cart_writes.lock(&req.cart_id).await;
    let cart = state
        .carts
        .get(&req.cart_id)
        .ok_or_else(|| AppError::not_found("cart", req.cart_id))?;
    let order = place(&state, &customer, &cart).await?;

    tracing::info!(
        order_id = %order.id,
        customer_id = %customer.id,
        cart_id = %cart.id,
        lines = order.items.len(),
        "order placed"
    );
    Ok((StatusCode::CREATED, Json(order_view(&state, order)?)))
}

/// GET /v1/orders — Staff see every order; customers their own. Newest first.
#[utoipa::path(
    get,
    path = "/v1/orders",
    responses(
        (status = 200, description = "Orders", body = Vec<OrderView>),
        (status = 401, description = "No authenticated user", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
async fn list_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let mut orders = if caller.is_staff() {
        state.orders.list()
    } else {
        let user_id = require_user(&caller)?;
        match state.customers.find(|c| c.user_id == user_id) {
            Some(customer) => state.orders.filter(|o| o.customer_id == customer.id),
            None => Vec::new(),
        }
    };
    orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(a.id.cmp(&b.id)));
    let views = orders
        .into_iter()
        .map(|o| order_view(&state, o))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}

/// GET /v1/orders/:id — One order, for staff or its owner.
#[utoipa::path(
    get,
    path = "/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = OrderView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
async fn get_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::not_found("order", id))?;

    if !caller.is_staff() {
        let user_id = require_user(&caller)?;
        let owns = state
            .customers
            .get(&order.customer_id)
            .is_some_and(|c| c.user_id == user_id);
        if !owns {
            return Err(AppError::not_found("order", id));
        }
    }
    Ok(Json(order_view(&state, order)?))
}

/// PATCH /v1/orders/:id — Change the payment status (staff).
#[utoipa::path(
    patch,
    path = "/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
async fn update_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderView>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_json(body)?;

    let _write = state.order_writes.lock(&id).await;
    let current = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::not_found("order", id))?;
    let from = current.payment_status;
    let order = OrderRecord {
        payment_status: from.transition_to(req.payment_status)?,
        ..current
    };

    if let Some(pool) = &state.db_pool {
        crate::db::orders::update_payment_status(pool, id, order.payment_status)
            .await
            .map_err(|e| persist_failed("order", e))?;
    }
    state.orders.insert(id, order.clone());

    tracing::info!(
        order_id = %id,
        from = from.as_str(),
        to = order.payment_status.as_str(),
        "payment status updated"
    );
    Ok(Json(order_view(&state, order)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use crate::state::CartItemRecord;
    use serde_json::json;
    use tower::ServiceExt;

    fn seed_cart(state: &AppState, lines: &[(Uuid, i64)]) -> CartRecord {
        let cart = CartRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            items: lines
                .iter()
                .map(|(product_id, qty)| CartItemRecord {
                    id: Uuid::new_v4(),
                    product_id: *product_id,
                    quantity: Quantity::new(*qty).unwrap(),
                })
                .collect(),
        };
        state.carts.insert(cart.id, cart.clone());
        cart
    }

    async fn checkout(state: &AppState, user: Uuid, cart_id: Uuid) -> axum::response::Response {
        app_as(router(), state.clone(), CallerIdentity::customer(user))
            .oneshot(json_request("POST", "/v1/orders", json!({"cart_id": cart_id})))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn checkout_snapshots_prices_and_consumes_cart() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let kettle = seed_product(&state, c.id, "Kettle", "24.99", 20);
        let cart = seed_cart(&state, &[(mug.id, 2), (kettle.id, 1)]);
        let user = Uuid::new_v4();

        let resp = checkout(&state, user, cart.id).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let order: OrderView = body_json(resp).await;
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_price.to_string(), "34.99");
        assert!(!state.carts.contains(&cart.id));

        let customer = state.customers.find(|c| c.user_id == user).unwrap();
        assert_eq!(order.customer_id, customer.id);

        // Later price changes leave the order untouched.
        state
            .products
            .update(&mug.id, |p| p.unit_price = Money::from_cents(900));
        let stored = state.orders.get(&order.id).unwrap();
        let mug_line = stored.items.iter().find(|i| i.product_id == mug.id).unwrap();
        assert_eq!(mug_line.unit_price.to_string(), "5.00");
    }

    #[tokio::test]
    async fn second_checkout_of_same_cart_is_404() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = seed_cart(&state, &[(mug.id, 1)]);
        let user = Uuid::new_v4();

        assert_eq!(checkout(&state, user, cart.id).await.status(), StatusCode::CREATED);
        assert_eq!(checkout(&state, user, cart.id).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.orders.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_checkouts_place_one_order() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = seed_cart(&state, &[(mug.id, 1)]);
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            let cart_id = cart.id;
            handles.push(tokio::spawn(async move {
                checkout(&state, user, cart_id).await.status()
            }));
        }
        let mut placed = 0;
        for h in handles {
            if h.await.unwrap() == StatusCode::CREATED {
                placed += 1;
            }
        }
        assert_eq!(placed, 1);
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.customers.len(), 1);
    }

    #[tokio::test]
    async fn empty_cart_is_kept() {
        let state = AppState::new();
        let cart = seed_cart(&state, &[]);
        let resp = checkout(&state, Uuid::new_v4(), cart.id).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.carts.contains(&cart.id));
        assert!(state.orders.is_empty());
    }

    #[tokio::test]
    async fn lines_for_deleted_products_are_dropped() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = seed_cart(&state, &[(mug.id, 1), (Uuid::new_v4(), 3)]);

        let resp = checkout(&state, Uuid::new_v4(), cart.id).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let order: OrderView = body_json(resp).await;
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product_title.as_deref(), Some("Mug"));
    }

    #[tokio::test]
    async fn checkout_requires_user() {
        let state = AppState::new();
        let cart = seed_cart(&state, &[]);
        let resp = app_as(router(), state.clone(), CallerIdentity::anonymous())
            .oneshot(json_request("POST", "/v1/orders", json!({"cart_id": cart.id})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(state.carts.contains(&cart.id));
    }

    #[tokio::test]
    async fn customers_see_only_their_orders() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let a_cart = seed_cart(&state, &[(mug.id, 1)]);
        let b_cart = seed_cart(&state, &[(mug.id, 2)]);
        let a_order: OrderView = body_json(checkout(&state, alice, a_cart.id).await).await;
        let b_order: OrderView = body_json(checkout(&state, bob, b_cart.id).await).await;

        let as_alice = app_as(router(), state.clone(), CallerIdentity::customer(alice));
        let resp = as_alice
            .clone()
            .oneshot(empty_request("GET", "/v1/orders"))
            .await
            .unwrap();
        let mine: Vec<OrderView> = body_json(resp).await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, a_order.id);

        let resp = as_alice
            .oneshot(empty_request("GET", &format!("/v1/orders/{}", b_order.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let staff = app_as(router(), state.clone(), CallerIdentity::staff(None));
        let resp = staff.oneshot(empty_request("GET", "/v1/orders")).await.unwrap();
        let all: Vec<OrderView> = body_json(resp).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn payment_status_transitions() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = seed_cart(&state, &[(mug.id, 1)]);
        let order: OrderView = body_json(checkout(&state, Uuid::new_v4(), cart.id).await).await;
        let uri = format!("/v1/orders/{}", order.id);
        let staff = app_as(router(), state.clone(), CallerIdentity::staff(None));

        let resp = staff
            .clone()
            .oneshot(json_request("PATCH", &uri, json!({"payment_status": "COMPLETE"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: OrderView = body_json(resp).await;
        assert_eq!(updated.payment_status, PaymentStatus::Complete);

        let resp = staff
            .oneshot(json_request("PATCH", &uri, json!({"payment_status": "PENDING"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let customer = app_as(router(), state, CallerIdentity::customer(Uuid::new_v4()));
        let resp = customer
            .oneshot(json_request("PATCH", &uri, json!({"payment_status": "FAILED"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn failed_order_transaction_keeps_cart() {
        let state = state_with_failing_db();
        let c = seed_collection(&state, "Kitchen");
        let mug = seed_product(&state, c.id, "Mug", "5.00", 20);
        let cart = seed_cart(&state, &[(mug.id, 2)]);
        let user = Uuid::new_v4();
        let customer = CustomerRecord::blank(user);
        state.customers.insert(customer.id, customer);

        let resp = checkout(&state, user, cart.id).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.carts.get(&cart.id).unwrap().items.len(), 1);
        assert!(state.orders.is_empty());
    }

    #[tokio::test]
    async fn failed_status_save_keeps_old_status() {
        let state = state_with_failing_db();
        let order = OrderRecord {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            placed_at: Utc::now(),
            payment_status: PaymentStatus::Pending,
            items: Vec::new(),
        };
        state.orders.insert(order.id, order.clone());

        let resp = app_as(router(), state.clone(), CallerIdentity::staff(None))
            .oneshot(json_request(
                "PATCH",
                &format!("/v1/orders/{}", order.id),
                json!({"payment_status": "COMPLETE"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            state.orders.get(&order.id).unwrap().payment_status,
            PaymentStatus::Pending
        );
    }
}
