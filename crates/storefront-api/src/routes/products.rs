//! # Product Catalog API
//!
//! Public, paginated catalog reads with filtering, collection-title search
//! and ordering. Each product view carries its tag labels. Staff create,
//! replace and delete products; a product that appears on any order line
//! is protected from deletion.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{require_text, slugify, InventoryStatus, Money, ValidationError};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::pagination::{effective_page_size, paginate, Page, ProductPage};
use crate::routes::tags::product_tag_labels;
use crate::routes::{delete_failed, persist_failed};
use crate::state::{AppState, ProductRecord};

/// Lowest accepted unit price.
pub const MIN_UNIT_PRICE: Money = Money::from_cents(1);
/// Highest accepted unit price (six digits, two decimals).
pub const MAX_UNIT_PRICE: Money = Money::from_cents(999_999);

/// Reject unit prices outside the catalog's range.
pub fn validate_unit_price(price: Money) -> Result<Money, ValidationError> {
    price.ensure_range("unit_price", MIN_UNIT_PRICE, MAX_UNIT_PRICE)
}

// -- DTOs ---------------------------------------------------------------------

/// Create or fully replace a product.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
    pub inventory: u32,
    pub collection_id: Uuid,
}

impl Validate for ProductRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, 255)?;
        if let Some(slug) = &self.slug {
            require_text("slug", slug, 255)?;
        }
        validate_unit_price(self.unit_price)?;
        Ok(())
    }
}

/// A product as clients see it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Money,
    /// Unit price including tax at the configured rate.
    #[schema(value_type = String, example = "21.59")]
    pub price_with_tax: Money,
    pub inventory: u32,
    #[schema(value_type = String, example = "OK")]
    pub inventory_status: InventoryStatus,
    pub collection_id: Uuid,
    pub collection_title: Option<String>,
    /// Attached tag labels, sorted.
    pub tags: Vec<String>,
    pub last_update: DateTime<Utc>,
}

/// Catalog query parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Only products in this collection.
    pub collection_id: Option<Uuid>,
    /// Strictly greater than this price.
    #[serde(rename = "unit_price__gt")]
    pub unit_price_gt: Option<String>,
    /// Strictly less than this price.
    #[serde(rename = "unit_price__lt")]
    pub unit_price_lt: Option<String>,
    /// Case-insensitive terms matched against the collection title.
    pub search: Option<String>,
    /// `unit_price`, `last_update` or `title`, optionally prefixed with `-`.
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// -- Views --------------------------------------------------------------------

pub(crate) fn collection_titles(state: &AppState) -> HashMap<Uuid, String> {
    state
        .collections
        .list()
        .into_iter()
        .map(|c| (c.id, c.title))
        .collect()
}

pub(crate) fn product_view(
    state: &AppState,
    titles: &HashMap<Uuid, String>,
    record: ProductRecord,
) -> Result<ProductView, AppError> {
    let price_with_tax = state.config.tax_rate.apply(record.unit_price)?;
    Ok(ProductView {
        price_with_tax,
        inventory_status: InventoryStatus::classify(
            record.inventory,
            state.config.low_inventory_threshold,
        ),
        collection_title: titles.get(&record.collection_id).cloned(),
        tags: product_tag_labels(state, record.id),
        id: record.id,
        title: record.title,
        slug: record.slug,
        description: record.description,
        unit_price: record.unit_price,
        inventory: record.inventory,
        collection_id: record.collection_id,
        last_update: record.last_update,
    })
}

fn single_view(state: &AppState, record: ProductRecord) -> Result<ProductView, AppError> {
    let titles: HashMap<Uuid, String> = state
        .collections
        .get(&record.collection_id)
        .map(|c| (c.id, c.title))
        .into_iter()
        .collect();
    product_view(state, &titles, record)
}

// -- Ordering -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    UnitPrice,
    LastUpdate,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProductOrdering {
    key: SortKey,
    descending: bool,
}

impl ProductOrdering {
    fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => {
                return Ok(Self {
                    key: SortKey::Title,
                    descending: false,
                })
            }
            Some(r) => r,
        };
        let (descending, field) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let key = match field {
            "unit_price" => SortKey::UnitPrice,
            "last_update" => SortKey::LastUpdate,
            "title" => SortKey::Title,
            other => {
                return Err(AppError::Validation(format!(
                    "unknown ordering field: {other} (expected unit_price, last_update or title)"
                )))
            }
        };
        Ok(Self { key, descending })
    }

    fn sort(&self, products: &mut [ProductRecord]) {
        products.sort_by(|a, b| {
            let primary = match self.key {
                SortKey::UnitPrice => a.unit_price.cmp(&b.unit_price),
                SortKey::LastUpdate => a.last_update.cmp(&b.last_update),
                SortKey::Title => a.title.cmp(&b.title),
            };
            let primary = if self.descending {
                primary.reverse()
            } else {
                primary
            };
            primary.then(a.id.cmp(&b.id))
        });
    }
}

fn matches_search(terms: &[String], collection_title: Option<&String>) -> bool {
    match collection_title {
        Some(title) => {
            let title = title.to_lowercase();
            terms.iter().all(|t| title.contains(t.as_str()))
        }
        None => terms.is_empty(),
    }
}

fn parse_price_filter(field: &'static str, raw: Option<&str>) -> Result<Option<Money>, AppError> {
    raw.map(|v| {
        Money::parse(v.trim())
            .map_err(|e| AppError::Validation(format!("{field}: {e}")))
    })
    .transpose()
}

// -- Router -------------------------------------------------------------------

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products).post(create_product))
        .route(
            "/v1/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// GET /v1/products — Filtered, ordered, paginated catalog.
#[utoipa::path(
    get,
    path = "/v1/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "One page of products", body = ProductPage),
        (status = 404, description = "Page out of range", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid filter or ordering", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<Json<Page<ProductView>>, AppError> {
    let q = extract_query(query)?;
    let price_gt = parse_price_filter("unit_price__gt", q.unit_price_gt.as_deref())?;
    let price_lt = parse_price_filter("unit_price__lt", q.unit_price_lt.as_deref())?;
    let ordering = ProductOrdering::parse(q.ordering.as_deref())?;
    let terms: Vec<String> = q
        .search
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let titles = collection_titles(&state);
    let mut products = state.products.filter(|p| {
        q.collection_id.map_or(true, |c| p.collection_id == c)
            && price_gt.map_or(true, |gt| p.unit_price > gt)
            && price_lt.map_or(true, |lt| p.unit_price < lt)
            && matches_search(&terms, titles.get(&p.collection_id))
    });
    ordering.sort(&mut products);

    let page_size = effective_page_size(q.page_size, state.config.page_size);
    let page = paginate(products, q.page, page_size)?;
    let results = page
        .results
        .into_iter()
        .map(|p| product_view(&state, &titles, p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(Page {
        count: page.count,
        next: page.next,
        previous: page.previous,
        results,
    }))
}

/// POST /v1/products — Create a product.
#[utoipa::path(
    post,
    path = "/v1/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductView),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
async fn create_product(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductView>), AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let id = Uuid::new_v4();

    let _write = state.catalog_writes.lock(&id).await;
    let record = build_record(&state, id, req)?;
    if let Some(pool) = &state.db_pool {
        crate::db::catalog::insert_product(pool, &record)
            .await
            .map_err(|e| persist_failed("product", e))?;
    }
    state.products.insert(record.id, record.clone());

    tracing::info!(product_id = %record.id, title = %record.title, "product created");
    Ok((StatusCode::CREATED, Json(single_view(&state, record)?)))
}

fn build_record(state: &AppState, id: Uuid, req: ProductRequest) -> Result<ProductRecord, AppError> {
    if !state.collections.contains(&req.collection_id) {
        return Err(AppError::Validation(format!(
            "collection {} does not exist",
            req.collection_id
        )));
    }
    let title = require_text("title", &req.title, 255)?;
    let slug = match req.slug {
        Some(slug) => require_text("slug", &slug, 255)?,
        None => slugify(&title),
    };
    Ok(ProductRecord {
        id,
        slug,
        title,
        description: req.description.filter(|d| !d.trim().is_empty()),
        unit_price: validate_unit_price(req.unit_price)?,
        inventory: req.inventory,
        collection_id: req.collection_id,
        last_update: Utc::now(),
    })
}

/// GET /v1/products/:id — One product.
#[utoipa::path(
    get,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = ProductView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>, AppError> {
    let record = state
        .products
        .get(&id)
        .ok_or_else(|| AppError::not_found("product", id))?;
    Ok(Json(single_view(&state, record)?))
}

/// PUT /v1/products/:id — Replace a product.
#[utoipa::path(
    put,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
async fn update_product(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<ProductView>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;

    let _write = state.catalog_writes.lock(&id).await;
    if !state.products.contains(&id) {
        return Err(AppError::not_found("product", id));
    }
    let record = build_record(&state, id, req)?;
    if let Some(pool) = &state.db_pool {
        crate::db::catalog::update_product(pool, &record)
            .await
            .map_err(|e| persist_failed("product", e))?;
    }
    state.products.insert(id, record.clone());

    Ok(Json(single_view(&state, record)?))
}

/// DELETE /v1/products/:id — Delete a product that was never ordered.
///
/// Its reviews, tag attachments and any cart lines holding it are removed
/// with it.
#[utoipa::path(
    delete,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Product is on an order", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
async fn delete_product(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Staff)?;

    let _write = state.catalog_writes.lock(&id).await;
    if !state.products.contains(&id) {
        return Err(AppError::not_found("product", id));
    }
    if state.orders.any(|o| o.contains_product(&id)) {
        return Err(AppError::Conflict(format!(
            "product {id} cannot be deleted because it is associated with an order item"
        )));
    }

    if let Some(pool) = &state.db_pool {
        crate::db::catalog::delete_product(pool, id)
            .await
            .map_err(|e| delete_failed("product", e))?;
    }

    state.products.remove(&id);
    let reviews = state.reviews.remove_where(|r| r.product_id == id);
    state.product_tags.remove_where(|pt| pt.product_id == id);
    let carts = state.carts.update_each(|cart| {
        let before = cart.items.len();
        cart.items.retain(|i| i.product_id != id);
        cart.items.len() != before
    });

    tracing::info!(product_id = %id, reviews, carts, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use crate::state::{
        CartItemRecord, CartRecord, OrderItemRecord, OrderRecord, ProductTagRecord, ReviewRecord,
        TagRecord,
    };
    use serde_json::json;
    use storefront_core::{PaymentStatus, Quantity};
    use tower::ServiceExt;

    fn staff_app(state: &AppState) -> Router {
        app_as(router(), state.clone(), CallerIdentity::staff(None))
    }

    fn public_app(state: &AppState) -> Router {
        app_as(router(), state.clone(), CallerIdentity::anonymous())
    }

    async fn list(state: &AppState, query: &str) -> (StatusCode, Option<Page<ProductView>>) {
        let resp = public_app(state)
            .oneshot(empty_request("GET", &format!("/v1/products{query}")))
            .await
            .unwrap();
        let status = resp.status();
        if status == StatusCode::OK {
            (status, Some(body_json(resp).await))
        } else {
            (status, None)
        }
    }

    fn titles(page: &Page<ProductView>) -> Vec<&str> {
        page.results.iter().map(|p| p.title.as_str()).collect()
    }

    // -- Ordering parsing -----------------------------------------------------

    #[test]
    fn ordering_parse() {
        assert_eq!(
            ProductOrdering::parse(None).unwrap(),
            ProductOrdering {
                key: SortKey::Title,
                descending: false
            }
        );
        assert_eq!(
            ProductOrdering::parse(Some("-unit_price")).unwrap(),
            ProductOrdering {
                key: SortKey::UnitPrice,
                descending: true
            }
        );
        assert!(ProductOrdering::parse(Some("inventory")).is_err());
    }

    #[test]
    fn request_validation() {
        let req = ProductRequest {
            title: "Mug".into(),
            slug: None,
            description: None,
            unit_price: Money::from_cents(0),
            inventory: 1,
            collection_id: Uuid::new_v4(),
        };
        assert!(req.validate().unwrap_err().to_string().contains("unit_price"));
    }

    fn tag_product(state: &AppState, product_id: Uuid, label: &str) -> TagRecord {
        let tag = TagRecord {
            id: Uuid::new_v4(),
            label: label.into(),
        };
        state.tags.insert(tag.id, tag.clone());
        let link = ProductTagRecord {
            id: Uuid::new_v4(),
            product_id,
            tag_id: tag.id,
        };
        state.product_tags.insert(link.id, link);
        tag
    }

    // -- Create ---------------------------------------------------------------

    #[tokio::test]
    async fn create_derives_slug_and_tax() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let resp = staff_app(&state)
            .oneshot(json_request(
                "POST",
                "/v1/products",
                json!({
                    "title": "Coffee Mug",
                    "unit_price": "19.99",
                    "inventory": 4,
                    "collection_id": c.id,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let p: ProductView = body_json(resp).await;
        assert_eq!(p.slug, "coffee-mug");
        assert_eq!(p.price_with_tax.to_string(), "21.59");
        assert_eq!(p.collection_title.as_deref(), Some("Kitchen"));
        assert_eq!(p.inventory_status, InventoryStatus::Low);
        assert!(state.products.contains(&p.id));
    }

    #[tokio::test]
    async fn create_rejects_unknown_collection() {
        let state = AppState::new();
        let resp = staff_app(&state)
            .oneshot(json_request(
                "POST",
                "/v1/products",
                json!({
                    "title": "Mug",
                    "unit_price": "2.00",
                    "inventory": 4,
                    "collection_id": Uuid::new_v4(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.products.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_price() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        for price in ["0.00", "10000.00"] {
            let resp = staff_app(&state)
                .oneshot(json_request(
                    "POST",
                    "/v1/products",
                    json!({
                        "title": "Mug",
                        "unit_price": price,
                        "inventory": 1,
                        "collection_id": c.id,
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{price}");
        }
    }

    #[tokio::test]
    async fn create_requires_staff() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let resp = public_app(&state)
            .oneshot(json_request(
                "POST",
                "/v1/products",
                json!({"title": "Mug", "unit_price": "2.00", "inventory": 1, "collection_id": c.id}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // -- List -----------------------------------------------------------------

    #[tokio::test]
    async fn list_filters_and_orders() {
        let state = AppState::new();
        let kitchen = seed_collection(&state, "Kitchen");
        let garden = seed_collection(&state, "Garden Tools");
        seed_product(&state, kitchen.id, "Mug", "5.00", 20);
        seed_product(&state, kitchen.id, "Kettle", "25.00", 20);
        seed_product(&state, garden.id, "Rake", "15.00", 20);

        let (_, page) = list(&state, &format!("?collection_id={}", kitchen.id)).await;
        assert_eq!(titles(&page.unwrap()), vec!["Kettle", "Mug"]);

        let (_, page) = list(&state, "?unit_price__gt=5.00&unit_price__lt=25").await;
        assert_eq!(titles(&page.unwrap()), vec!["Rake"]);

        let (_, page) = list(&state, "?ordering=-unit_price").await;
        assert_eq!(titles(&page.unwrap()), vec!["Kettle", "Rake", "Mug"]);

        let (_, page) = list(&state, "?search=garden").await;
        assert_eq!(titles(&page.unwrap()), vec!["Rake"]);

        let (_, page) = list(&state, "?search=TOOLS%20gar").await;
        assert_eq!(titles(&page.unwrap()), vec!["Rake"]);
    }

    #[tokio::test]
    async fn list_paginates() {
        let state = AppState::new();
        let c = seed_collection(&state, "Bulk");
        for i in 0..12 {
            seed_product(&state, c.id, &format!("Item {i:02}"), "1.00", 20);
        }

        let (_, page) = list(&state, "").await;
        let page = page.unwrap();
        assert_eq!(page.count, 12);
        assert_eq!(page.results.len(), 10);
        assert_eq!(page.next, Some(2));
        assert_eq!(page.previous, None);

        let (_, page) = list(&state, "?page=2").await;
        let page = page.unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(1));

        let (_, page) = list(&state, "?page_size=5&page=3").await;
        assert_eq!(page.unwrap().results.len(), 2);

        let (status, _) = list(&state, "?page=3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_rejects_bad_parameters() {
        let state = AppState::new();
        let (status, _) = list(&state, "?ordering=inventory").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = list(&state, "?unit_price__gt=abc").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = list(&state, "?collection_id=nope").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    // -- Update ---------------------------------------------------------------

    #[tokio::test]
    async fn update_replaces_fields() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let other = seed_collection(&state, "Dining");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);

        let resp = staff_app(&state)
            .oneshot(json_request(
                "PUT",
                &format!("/v1/products/{}", p.id),
                json!({
                    "title": "Big Mug",
                    "slug": "big-mug-xl",
                    "unit_price": "7.50",
                    "inventory": 3,
                    "collection_id": other.id,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: ProductView = body_json(resp).await;
        assert_eq!(updated.slug, "big-mug-xl");
        assert_eq!(updated.unit_price.to_string(), "7.50");
        assert_eq!(updated.collection_title.as_deref(), Some("Dining"));
        assert!(updated.last_update >= p.last_update);
    }

    #[tokio::test]
    async fn update_missing_is_404() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let resp = staff_app(&state)
            .oneshot(json_request(
                "PUT",
                &format!("/v1/products/{}", Uuid::new_v4()),
                json!({"title": "Mug", "unit_price": "1.00", "inventory": 1, "collection_id": c.id}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn views_list_tag_labels() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        seed_product(&state, c.id, "Kettle", "25.00", 20);
        tag_product(&state, p.id, "Sale");
        tag_product(&state, p.id, "Ceramic");

        let resp = public_app(&state)
            .oneshot(empty_request("GET", &format!("/v1/products/{}", p.id)))
            .await
            .unwrap();
        let view: ProductView = body_json(resp).await;
        assert_eq!(view.tags, vec!["Ceramic", "Sale"]);

        let (_, page) = list(&state, "?ordering=title").await;
        let page = page.unwrap();
        assert!(page.results[0].tags.is_empty());
        assert_eq!(page.results[1].tags.len(), 2);
    }

    #[tokio::test]
    async fn failed_saves_leave_catalog_unchanged() {
        let state = state_with_failing_db();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let body = json!({"title": "Big Mug", "unit_price": "7.50", "inventory": 3, "collection_id": c.id});

        let resp = staff_app(&state)
            .oneshot(json_request("POST", "/v1/products", body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.products.len(), 1);

        let resp = staff_app(&state)
            .oneshot(json_request("PUT", &format!("/v1/products/{}", p.id), body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.products.get(&p.id).unwrap().title, "Mug");

        let resp = staff_app(&state)
            .oneshot(empty_request("DELETE", &format!("/v1/products/{}", p.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.products.contains(&p.id));
    }

    // -- Delete ---------------------------------------------------------------

    #[tokio::test]
    async fn delete_cascades_reviews_and_cart_lines() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let keep = seed_product(&state, c.id, "Kettle", "25.00", 20);

        let review = ReviewRecord {
            id: Uuid::new_v4(),
            product_id: p.id,
            name: "Ann".into(),
            description: "Great".into(),
            date: Utc::now(),
        };
        state.reviews.insert(review.id, review);

        let cart = CartRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            items: vec![
                CartItemRecord {
                    id: Uuid::new_v4(),
                    product_id: p.id,
                    quantity: Quantity::new(2).unwrap(),
                },
                CartItemRecord {
                    id: Uuid::new_v4(),
                    product_id: keep.id,
                    quantity: Quantity::new(1).unwrap(),
                },
            ],
        };
        state.carts.insert(cart.id, cart.clone());
        let tag = tag_product(&state, p.id, "Sale");

        let resp = staff_app(&state)
            .oneshot(empty_request("DELETE", &format!("/v1/products/{}", p.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(!state.products.contains(&p.id));
        assert!(state.reviews.is_empty());
        let cart = state.carts.get(&cart.id).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, keep.id);
        assert!(state.product_tags.is_empty());
        assert!(state.tags.contains(&tag.id));
    }

    #[tokio::test]
    async fn delete_ordered_product_conflicts() {
        let state = AppState::new();
        let c = seed_collection(&state, "Kitchen");
        let p = seed_product(&state, c.id, "Mug", "5.00", 20);
        let order = OrderRecord {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            placed_at: Utc::now(),
            payment_status: PaymentStatus::Pending,
            items: vec![OrderItemRecord {
                id: Uuid::new_v4(),
                product_id: p.id,
                quantity: Quantity::new(1).unwrap(),
                unit_price: p.unit_price,
            }],
        };
        state.orders.insert(order.id, order);

        let resp = staff_app(&state)
            .oneshot(empty_request("DELETE", &format!("/v1/products/{}", p.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(state.products.contains(&p.id));
    }
}
