//! Cart and cart-line persistence operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use storefront_core::Quantity;
use uuid::Uuid;

use crate::state::{CartItemRecord, CartRecord};

/// Insert an empty cart.
pub async fn insert_cart(pool: &PgPool, record: &CartRecord) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO carts (id, created_at) VALUES ($1, $2)")
        .bind(record.id)
        .bind(record.created_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a cart together with its lines.
pub async fn delete_cart(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert a cart line, or overwrite the quantity of the line already
/// holding this product in this cart.
///
/// The quantity is absolute; callers hold the cart's write lock so saves
/// for one cart land in the order they were computed.
pub async fn upsert_item(
    pool: &PgPool,
    cart_id: Uuid,
    item: &CartItemRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4)
         ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
    )
    .bind(item.id)
    .bind(cart_id)
    .bind(item.product_id)
    .bind(i32::from(item.quantity.get()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Set the quantity of a cart line.
pub async fn update_item_quantity(
    pool: &PgPool,
    item_id: Uuid,
    quantity: Quantity,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE cart_items SET quantity = $1 WHERE id = $2")
        .bind(i32::from(quantity.get()))
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a cart line.
pub async fn delete_item(pool: &PgPool, item_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all carts with their lines on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CartRecord>, sqlx::Error> {
    let carts = sqlx::query_as::<_, CartRow>("SELECT id, created_at FROM carts")
        .fetch_all(pool)
        .await?;
    let items = sqlx::query_as::<_, CartItemRow>(
        "SELECT id, cart_id, product_id, quantity FROM cart_items",
    )
    .fetch_all(pool)
    .await?;

    let mut lines: HashMap<Uuid, Vec<CartItemRecord>> = HashMap::new();
    for row in items {
        match Quantity::new(i64::from(row.quantity)) {
            Ok(quantity) => lines.entry(row.cart_id).or_default().push(CartItemRecord {
                id: row.id,
                product_id: row.product_id,
                quantity,
            }),
            Err(e) => tracing::error!(item_id = %row.id, error = %e, "skipping invalid cart line"),
        }
    }

    Ok(carts
        .into_iter()
        .map(|c| CartRecord {
            id: c.id,
            created_at: c.created_at,
            items: lines.remove(&c.id).unwrap_or_default(),
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
}
