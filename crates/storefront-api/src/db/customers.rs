//! Customer persistence operations.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use storefront_core::Membership;
use uuid::Uuid;

use crate::state::CustomerRecord;

/// Insert a new customer.
pub async fn insert(pool: &PgPool, record: &CustomerRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO customers (id, user_id, first_name, last_name, email, phone, birth_date,
         membership, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(record.birth_date)
    .bind(record.membership.as_str())
    .bind(record.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrite the profile fields and membership of a customer.
pub async fn update(pool: &PgPool, record: &CustomerRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE customers SET first_name = $1, last_name = $2, email = $3, phone = $4,
         birth_date = $5, membership = $6 WHERE id = $7",
    )
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(record.birth_date)
    .bind(record.membership.as_str())
    .bind(record.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a customer. Fails with a foreign-key error while orders reference it.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM customers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all customers on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CustomerRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, user_id, first_name, last_name, email, phone, birth_date, membership,
         created_at FROM customers ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(CustomerRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    birth_date: Option<NaiveDate>,
    membership: String,
    created_at: DateTime<Utc>,
}

impl CustomerRow {
    fn into_record(self) -> CustomerRecord {
        let membership = self.membership.parse::<Membership>().unwrap_or_else(|_| {
            tracing::warn!(
                customer_id = %self.id,
                membership = %self.membership,
                "unknown membership in database, defaulting to BRONZE"
            );
            Membership::default()
        });
        CustomerRecord {
            id: self.id,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            birth_date: self.birth_date,
            membership,
            created_at: self.created_at,
        }
    }
}
