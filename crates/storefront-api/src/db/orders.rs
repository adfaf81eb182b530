//! Order persistence operations.
//!
//! [`place_order`] is the only multi-table write: the order, its lines and
//! the removal of the source cart commit together or not at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use storefront_core::{Money, PaymentStatus, Quantity};
use uuid::Uuid;

use crate::state::{OrderItemRecord, OrderRecord};

/// Persist a new order and consume the cart it was built from, in one transaction.
pub async fn place_order(
    pool: &PgPool,
    order: &OrderRecord,
    cart_id: Uuid,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders (id, customer_id, placed_at, payment_status) VALUES ($1, $2, $3, $4)",
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(order.placed_at)
    .bind(order.payment_status.as_str())
    .execute(&mut *tx)
    .await?;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price_cents)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.id)
        .bind(order.id)
        .bind(item.product_id)
        .bind(i32::from(item.quantity.get()))
        .bind(item.unit_price.cents())
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Update an order's payment status.
pub async fn update_payment_status(
    pool: &PgPool,
    id: Uuid,
    status: PaymentStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET payment_status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all orders with their lines on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<OrderRecord>, sqlx::Error> {
    let orders = sqlx::query_as::<_, OrderRow>(
        "SELECT id, customer_id, placed_at, payment_status FROM orders ORDER BY placed_at",
    )
    .fetch_all(pool)
    .await?;
    let items = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, product_id, quantity, unit_price_cents FROM order_items",
    )
    .fetch_all(pool)
    .await?;

    let mut lines: HashMap<Uuid, Vec<OrderItemRecord>> = HashMap::new();
    for row in items {
        match Quantity::new(i64::from(row.quantity)) {
            Ok(quantity) => lines.entry(row.order_id).or_default().push(OrderItemRecord {
                id: row.id,
                product_id: row.product_id,
                quantity,
                unit_price: Money::from_cents(row.unit_price_cents),
            }),
            Err(e) => tracing::error!(item_id = %row.id, error = %e, "skipping invalid order line"),
        }
    }

    Ok(orders
        .into_iter()
        .map(|o| {
            let payment_status = o.payment_status.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    order_id = %o.id,
                    status = %o.payment_status,
                    "unknown payment status in database, defaulting to PENDING"
                );
                PaymentStatus::Pending
            });
            OrderRecord {
                id: o.id,
                customer_id: o.customer_id,
                placed_at: o.placed_at,
                payment_status,
                items: lines.remove(&o.id).unwrap_or_default(),
            }
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    placed_at: DateTime<Utc>,
    payment_status: String,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price_cents: i64,
}
