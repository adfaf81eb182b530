//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every table has an in-memory [`Store`] that serves all reads. When a
//! database pool is configured, mutating handlers write through to Postgres
//! and the stores are hydrated from it on startup; without one the service
//! runs in-memory only (development and tests).
//!
//! Cart lines live inside their [`CartRecord`] and order lines inside their
//! [`OrderRecord`], so every cart mutation and the cart-to-order hand-off is
//! a single store operation under one lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use storefront_core::{Membership, Money, PaymentStatus, Quantity};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points. `parking_lot::RwLock`
/// does not poison, so a panicking writer leaves the store usable.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// List the records matching a predicate.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Return the first record matching a predicate.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Whether any record matches a predicate.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(pred)
    }

    /// Count the records matching a predicate.
    pub fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.data.read().values().filter(|v| pred(v)).count()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure receives a `&mut T` and may inspect the current state,
    /// validate preconditions, mutate the record, and return `Ok(R)` or
    /// `Err(E)`. The entire operation runs under a single write lock.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Apply a mutation to every record under one write lock.
    ///
    /// Returns the number of records for which the closure reported a change.
    pub fn update_each(&self, mut f: impl FnMut(&mut T) -> bool) -> usize {
        let mut guard = self.data.write();
        guard.values_mut().map(|v| f(v)).filter(|changed| *changed).count()
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Remove every record matching a predicate. Returns how many were removed.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        let mut guard = self.data.write();
        let before = guard.len();
        guard.retain(|_, v| !pred(v));
        before - guard.len()
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Record Types -------------------------------------------------------------

/// A named group of products.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionRecord {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
    pub inventory: u32,
    pub collection_id: Uuid,
    pub last_update: DateTime<Utc>,
}

/// Feedback left on a product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

/// A free-form label staff attach to products.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagRecord {
    pub id: Uuid,
    pub label: String,
}

/// One tag attached to one product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductTagRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub tag_id: Uuid,
}

/// Customer profile, one per authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[schema(value_type = String, example = "BRONZE")]
    pub membership: Membership,
    pub created_at: DateTime<Utc>,
}

impl CustomerRecord {
    /// An empty profile for a user seen for the first time.
    pub fn blank(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            phone: None,
            birth_date: None,
            membership: Membership::default(),
            created_at: Utc::now(),
        }
    }
}

/// One product selection inside a cart.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    #[schema(value_type = u16, minimum = 1, maximum = 32767)]
    pub quantity: Quantity,
}

/// Anonymous shopping cart. At most one line per product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItemRecord>,
}

impl CartRecord {
    /// Find the line holding a product.
    pub fn line_for_product(&self, product_id: &Uuid) -> Option<&CartItemRecord> {
        self.items.iter().find(|i| i.product_id == *product_id)
    }
}

/// One purchased line, priced at placement time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    #[schema(value_type = u16, minimum = 1, maximum = 32767)]
    pub quantity: Quantity,
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub placed_at: DateTime<Utc>,
    #[schema(value_type = String, example = "PENDING")]
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItemRecord>,
}

impl OrderRecord {
    /// Whether any line of this order refers to the product.
    pub fn contains_product(&self, product_id: &Uuid) -> bool {
        self.items.iter().any(|i| i.product_id == *product_id)
    }
}

// -- Write Ordering -----------------------------------------------------------

/// Striped async locks that order write-through for one family of records.
///
/// A writer holds the stripe for its key across the database round trip and
/// publishes to the in-memory store only after the database accepted the
/// change. For any one key, Postgres and the store therefore see the same
/// sequence of writes, and a failed write leaves the store untouched.
/// Reads never take these locks.
#[derive(Debug, Clone)]
pub struct WriteLocks {
    stripes: Arc<[tokio::sync::Mutex<()>]>,
}

impl WriteLocks {
    /// Create a lock set with `stripes` independent locks (at least one).
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1))
                .map(|_| tokio::sync::Mutex::new(()))
                .collect(),
        }
    }

    /// Wait for the stripe owning `key`.
    pub async fn lock(&self, key: &Uuid) -> tokio::sync::MutexGuard<'_, ()> {
        let index = (key.as_u128() % self.stripes.len() as u128) as usize;
        self.stripes[index].lock().await
    }
}

/// Stripes for per-cart and per-order write ordering.
const KEYED_WRITE_STRIPES: usize = 64;

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each `Store`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub collections: Store<CollectionRecord>,
    pub products: Store<ProductRecord>,
    pub reviews: Store<ReviewRecord>,
    pub tags: Store<TagRecord>,
    pub product_tags: Store<ProductTagRecord>,
    pub customers: Store<CustomerRecord>,
    pub carts: Store<CartRecord>,
    pub orders: Store<OrderRecord>,

    /// Collections, products, tags and reviews. Staff-driven and low-volume,
    /// so a single lock covers the whole catalog.
    pub catalog_writes: WriteLocks,
    /// Keyed by cart id.
    pub cart_writes: WriteLocks,
    /// Single lock; also guards first-use profile creation.
    pub customer_writes: WriteLocks,
    /// Keyed by order id.
    pub order_writes: WriteLocks,

    /// PostgreSQL connection pool. `None` means in-memory-only mode.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with default configuration and no database.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// Create a new application state with the given configuration and optional pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            collections: Store::new(),
            products: Store::new(),
            reviews: Store::new(),
            tags: Store::new(),
            product_tags: Store::new(),
            customers: Store::new(),
            carts: Store::new(),
            orders: Store::new(),
            catalog_writes: WriteLocks::new(1),
            cart_writes: WriteLocks::new(KEYED_WRITE_STRIPES),
            customer_writes: WriteLocks::new(1),
            order_writes: WriteLocks::new(KEYED_WRITE_STRIPES),
            db_pool,
            config,
        }
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let collections = crate::db::catalog::load_collections(pool).await?;
        let collection_count = collections.len();
        for record in collections {
            self.collections.insert(record.id, record);
        }

        let products = crate::db::catalog::load_products(pool).await?;
        let product_count = products.len();
        for record in products {
            self.products.insert(record.id, record);
        }

        let reviews = crate::db::reviews::load_all(pool).await?;
        let review_count = reviews.len();
        for record in reviews {
            self.reviews.insert(record.id, record);
        }

        let tags = crate::db::tags::load_tags(pool).await?;
        let tag_count = tags.len();
        for record in tags {
            self.tags.insert(record.id, record);
        }
        for record in crate::db::tags::load_product_tags(pool).await? {
            self.product_tags.insert(record.id, record);
        }

        let customers = crate::db::customers::load_all(pool).await?;
        let customer_count = customers.len();
        for record in customers {
            self.customers.insert(record.id, record);
        }

        let carts = crate::db::carts::load_all(pool).await?;
        let cart_count = carts.len();
        for record in carts {
            self.carts.insert(record.id, record);
        }

        let orders = crate::db::orders::load_all(pool).await?;
        let order_count = orders.len();
        for record in orders {
            self.orders.insert(record.id, record);
        }

        tracing::info!(
            collections = collection_count,
            products = product_count,
            reviews = review_count,
            tags = tag_count,
            customers = customer_count,
            carts = cart_count,
            orders = order_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
