//! Review persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::ReviewRecord;

/// Insert a new review.
pub async fn insert(pool: &PgPool, record: &ReviewRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reviews (id, product_id, name, description, date) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(record.id)
    .bind(record.product_id)
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.date)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replace a review's name and text.
pub async fn update(pool: &PgPool, record: &ReviewRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE reviews SET name = $1, description = $2 WHERE id = $3")
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a review.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all reviews on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ReviewRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT id, product_id, name, description, date FROM reviews ORDER BY date",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| ReviewRecord {
            id: r.id,
            product_id: r.product_id,
            name: r.name,
            description: r.description,
            date: r.date,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    description: String,
    date: DateTime<Utc>,
}
