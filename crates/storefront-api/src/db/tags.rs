//! Tag persistence operations.
//!
//! `tags` holds unique labels; `product_tags` attaches them to products and
//! cascades away with either side.

use sqlx::PgPool;
use uuid::Uuid;

use crate::state::{ProductTagRecord, TagRecord};

/// Attach a tag to a product, creating the tag first when `new_tag` is set.
///
/// Both rows commit together.
pub async fn attach(
    pool: &PgPool,
    new_tag: Option<&TagRecord>,
    record: &ProductTagRecord,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    if let Some(tag) = new_tag {
        sqlx::query("INSERT INTO tags (id, label) VALUES ($1, $2)")
            .bind(tag.id)
            .bind(&tag.label)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("INSERT INTO product_tags (id, product_id, tag_id) VALUES ($1, $2, $3)")
        .bind(record.id)
        .bind(record.product_id)
        .bind(record.tag_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Detach a tag from a product.
pub async fn detach(pool: &PgPool, product_id: Uuid, tag_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM product_tags WHERE product_id = $1 AND tag_id = $2")
        .bind(product_id)
        .bind(tag_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all tags on startup.
pub async fn load_tags(pool: &PgPool) -> Result<Vec<TagRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TagRow>("SELECT id, label FROM tags ORDER BY label")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| TagRecord {
            id: r.id,
            label: r.label,
        })
        .collect())
}

/// Load every product/tag attachment on startup.
pub async fn load_product_tags(pool: &PgPool) -> Result<Vec<ProductTagRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProductTagRow>(
        "SELECT id, product_id, tag_id FROM product_tags",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| ProductTagRecord {
            id: r.id,
            product_id: r.product_id,
            tag_id: r.tag_id,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    label: String,
}

#[derive(sqlx::FromRow)]
struct ProductTagRow {
    id: Uuid,
    product_id: Uuid,
    tag_id: Uuid,
}
