//! # Product Reviews API
//!
//! Reviews live under their product. Anyone may list a product's reviews
//! or post one; addressing a single review by id is staff moderation.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use storefront_core::{require_text, ValidationError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::{delete_failed, persist_failed};
use crate::state::{AppState, ReviewRecord};

/// Post or edit a review.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub name: String,
    pub description: String,
}

impl Validate for ReviewRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, 255)?;
        require_text("description", &self.description, 10_000)?;
        Ok(())
    }
}

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/products/:id/reviews",
            get(list_reviews).post(create_review),
        )
        .route(
            "/v1/products/:id/reviews/:review_id",
            get(get_review).put(update_review).delete(delete_review),
        )
}

fn ensure_product(state: &AppState, product_id: Uuid) -> Result<(), AppError> {
    if state.products.contains(&product_id) {
        Ok(())
    } else {
        Err(AppError::not_found("product", product_id))
    }
}

/// Look up a review, treating one filed under another product as missing.
fn review_of(state: &AppState, product_id: Uuid, review_id: Uuid) -> Result<ReviewRecord, AppError> {
    state
        .reviews
        .get(&review_id)
        .filter(|r| r.product_id == product_id)
        .ok_or_else(|| AppError::not_found("review", review_id))
}

/// GET /v1/products/:id/reviews — A product's reviews, newest first.
#[utoipa::path(
    get,
    path = "/v1/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews", body = Vec<ReviewRecord>),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
    ),
    tag = "reviews"
)]
async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewRecord>>, AppError> {
    ensure_product(&state, product_id)?;
    let mut reviews = state.reviews.filter(|r| r.product_id == product_id);
    reviews.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
    Ok(Json(reviews))
}

/// POST /v1/products/:id/reviews — Post a review.
#[utoipa::path(
    post,
    path = "/v1/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewRecord),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "reviews"
)]
async fn create_review(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let record = ReviewRecord {
        id: Uuid::new_v4(),
        product_id,
        name: require_text("name", &req.name, 255)?,
        description: req.description.trim().to_string(),
        date: Utc::now(),
    };

    let _write = state.catalog_writes.lock(&product_id).await;
    ensure_product(&state, product_id)?;
    if let Some(pool) = &state.db_pool {
        crate::db::reviews::insert(pool, &record)
            .await
            .map_err(|e| persist_failed("review", e))?;
    }
    state.reviews.insert(record.id, record.clone());

    tracing::info!(review_id = %record.id, product_id = %product_id, "review posted");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/products/:id/reviews/:review_id — One review.
#[utoipa::path(
    get,
    path = "/v1/products/{id}/reviews/{review_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
    ),
    responses(
        (status = 200, description = "Review found", body = ReviewRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "reviews"
)]
async fn get_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((product_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReviewRecord>, AppError> {
    require_role(&caller, Role::Staff)?;
    Ok(Json(review_of(&state, product_id, review_id)?))
}

/// PUT /v1/products/:id/reviews/:review_id — Edit a review.
#[utoipa::path(
    put,
    path = "/v1/products/{id}/reviews/{review_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "reviews"
)]
async fn update_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((product_id, review_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewRecord>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let name = require_text("name", &req.name, 255)?;

    let _write = state.catalog_writes.lock(&review_id).await;
    let record = ReviewRecord {
        name,
        description: req.description.trim().to_string(),
        ..review_of(&state, product_id, review_id)?
    };
    if let Some(pool) = &state.db_pool {
        crate::db::reviews::update(pool, &record)
            .await
            .map_err(|e| persist_failed("review", e))?;
    }
    state.reviews.insert(review_id, record.clone());

    Ok(Json(record))
}

/// DELETE /v1/products/:id/reviews/:review_id — Remove a review.
#[utoipa::path(
    delete,
    path = "/v1/products/{id}/reviews/{review_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "reviews"
)]
async fn delete_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((product_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Staff)?;

    let _write = state.catalog_writes.lock(&review_id).await;
    review_of(&state, product_id, review_id)?;
    if let Some(pool) = &state.db_pool {
        crate::db::reviews::delete(pool, review_id)
            .await
            .map_err(|e| delete_failed("review", e))?;
    }
    state.reviews.remove(&review_id);

    Ok(StatusCode::NO_CONTENT)
}
