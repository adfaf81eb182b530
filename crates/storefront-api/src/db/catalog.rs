//! Collection and product persistence operations.
//!
//! Functions operate on the `collections` and `products` tables. Inserts
//! accept any executor so the seeding CLI can run them inside one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use storefront_core::Money;
use uuid::Uuid;

use crate::state::{CollectionRecord, ProductRecord};

// -- Collections --------------------------------------------------------------

/// Insert a new collection.
pub async fn insert_collection<'e, E: PgExecutor<'e>>(
    executor: E,
    record: &CollectionRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO collections (id, title, created_at) VALUES ($1, $2, $3)")
        .bind(record.id)
        .bind(&record.title)
        .bind(record.created_at)
        .execute(executor)
        .await?;
    Ok(())
}

/// Rename a collection.
pub async fn update_collection_title(
    pool: &PgPool,
    id: Uuid,
    title: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE collections SET title = $1 WHERE id = $2")
        .bind(title)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a collection. Fails with a foreign-key error while products reference it.
pub async fn delete_collection(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM collections WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all collections on startup.
pub async fn load_collections(pool: &PgPool) -> Result<Vec<CollectionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CollectionRow>(
        "SELECT id, title, created_at FROM collections ORDER BY title",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(CollectionRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
}

impl CollectionRow {
    fn into_record(self) -> CollectionRecord {
        CollectionRecord {
            id: self.id,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

// -- Products -----------------------------------------------------------------

/// Insert a new product.
pub async fn insert_product<'e, E: PgExecutor<'e>>(
    executor: E,
    record: &ProductRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (id, title, slug, description, unit_price_cents, inventory,
         collection_id, last_update)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id)
    .bind(&record.title)
    .bind(&record.slug)
    .bind(&record.description)
    .bind(record.unit_price.cents())
    .bind(i64::from(record.inventory))
    .bind(record.collection_id)
    .bind(record.last_update)
    .execute(executor)
    .await?;
    Ok(())
}

/// Overwrite every editable product column.
pub async fn update_product(pool: &PgPool, record: &ProductRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET title = $1, slug = $2, description = $3, unit_price_cents = $4,
         inventory = $5, collection_id = $6, last_update = $7 WHERE id = $8",
    )
    .bind(&record.title)
    .bind(&record.slug)
    .bind(&record.description)
    .bind(record.unit_price.cents())
    .bind(i64::from(record.inventory))
    .bind(record.collection_id)
    .bind(record.last_update)
    .bind(record.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Set the inventory of several products to zero.
pub async fn clear_inventory(
    pool: &PgPool,
    ids: &[Uuid],
    last_update: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET inventory = 0, last_update = $1 WHERE id = ANY($2)",
    )
    .bind(last_update)
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete a product. Reviews and cart lines cascade; order lines protect it.
pub async fn delete_product(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all products on startup.
pub async fn load_products(pool: &PgPool) -> Result<Vec<ProductRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, title, slug, description, unit_price_cents, inventory, collection_id,
         last_update FROM products ORDER BY title",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(record) = row.into_record() {
            records.push(record);
        }
    }
    Ok(records)
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    title: String,
    slug: String,
    description: Option<String>,
    unit_price_cents: i64,
    inventory: i64,
    collection_id: Uuid,
    last_update: DateTime<Utc>,
}

impl ProductRow {
    fn into_record(self) -> Option<ProductRecord> {
        let inventory = match u32::try_from(self.inventory) {
            Ok(v) => v,
            Err(_) => {
                tracing::error!(
                    product_id = %self.id,
                    inventory = self.inventory,
                    "skipping product row with out-of-range inventory"
                );
                return None;
            }
        };
        Some(ProductRecord {
            id: self.id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            unit_price: Money::from_cents(self.unit_price_cents),
            inventory,
            collection_id: self.collection_id,
            last_update: self.last_update,
        })
    }
}
