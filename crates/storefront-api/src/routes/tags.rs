//! # Product Tags API
//!
//! Staff attach free-form labels to products. A label names one tag across
//! the catalog: attaching an unknown label creates the tag, attaching a
//! known one (case-insensitively) reuses it. Detaching leaves the tag in
//! place for other products.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use storefront_core::{require_text, ValidationError};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::routes::{delete_failed, persist_failed};
use crate::state::{AppState, ProductTagRecord, TagRecord};

/// Attach a tag by label.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TagRequest {
    pub label: String,
}

impl Validate for TagRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("label", &self.label, 255).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TagView {
    pub id: Uuid,
    pub label: String,
}

impl From<TagRecord> for TagView {
    fn from(record: TagRecord) -> Self {
        Self {
            id: record.id,
            label: record.label,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TagQuery {
    /// Case-insensitive label prefix.
    pub q: Option<String>,
}

/// Build the tags router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tags", get(list_tags))
        .route(
            "/v1/products/:id/tags",
            get(list_product_tags).post(attach_tag),
        )
        .route("/v1/products/:id/tags/:tag_id", delete(detach_tag))
}

/// Labels attached to a product, sorted.
pub(crate) fn product_tag_labels(state: &AppState, product_id: Uuid) -> Vec<String> {
    let mut labels: Vec<String> = tags_of(state, product_id)
        .into_iter()
        .map(|t| t.label)
        .collect();
    labels.sort();
    labels
}

fn tags_of(state: &AppState, product_id: Uuid) -> Vec<TagRecord> {
    state
        .product_tags
        .filter(|pt| pt.product_id == product_id)
        .into_iter()
        .filter_map(|pt| state.tags.get(&pt.tag_id))
        .collect()
}

fn ensure_product(state: &AppState, product_id: Uuid) -> Result<(), AppError> {
    if state.products.contains(&product_id) {
        Ok(())
    } else {
        Err(AppError::not_found("product", product_id))
    }
}

/// GET /v1/tags — Every tag, by label.
#[utoipa::path(
    get,
    path = "/v1/tags",
    params(TagQuery),
    responses(
        (status = 200, description = "Tags", body = Vec<TagView>),
    ),
    tag = "tags"
)]
async fn list_tags(
    State(state): State<AppState>,
    query: Result<Query<TagQuery>, QueryRejection>,
) -> Result<Json<Vec<TagView>>, AppError> {
    let q = extract_query(query)?;
    let prefix = q
        .q
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase);

    let mut tags: Vec<TagView> = state
        .tags
        .filter(|t| {
            prefix
                .as_deref()
                .map_or(true, |p| t.label.to_lowercase().starts_with(p))
        })
        .into_iter()
        .map(TagView::from)
        .collect();
    tags.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(Json(tags))
}

/// GET /v1/products/:id/tags — A product's tags, by label.
#[utoipa::path(
    get,
    path = "/v1/products/{id}/tags",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Tags", body = Vec<TagView>),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
    ),
    tag = "tags"
)]
async fn list_product_tags(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<TagView>>, AppError> {
    ensure_product(&state, product_id)?;
    let mut tags: Vec<TagView> = tags_of(&state, product_id)
        .into_iter()
        .map(TagView::from)
        .collect();
    tags.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(Json(tags))
}

/// POST /v1/products/:id/tags — Attach a tag by label.
///
/// 201 when the tag is newly attached, 200 when it already was.
#[utoipa::path(
    post,
    path = "/v1/products/{id}/tags",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = TagRequest,
    responses(
        (status = 201, description = "Tag attached", body = TagView),
        (status = 200, description = "Tag was already attached", body = TagView),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "tags"
)]
async fn attach_tag(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(product_id): Path<Uuid>,
    body: Result<Json<TagRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TagView>), AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let label = require_text("label", &req.label, 255)?;
    let folded = label.to_lowercase();

    let _write = state.catalog_writes.lock(&product_id).await;
    ensure_product(&state, product_id)?;

    let (tag, new_tag) = match state.tags.find(|t| t.label.to_lowercase() == folded) {
        Some(tag) => {
            if state
                .product_tags
                .any(|pt| pt.product_id == product_id && pt.tag_id == tag.id)
            {
                return Ok((StatusCode::OK, Json(tag.into())));
            }
            (tag, None)
        }
        None => {
            let tag = TagRecord {
                id: Uuid::new_v4(),
                label,
            };
            (tag.clone(), Some(tag))
        }
    };
    let link = ProductTagRecord {
        id: Uuid::new_v4(),
        product_id,
        tag_id: tag.id,
    };

    if let Some(pool) = &state.db_pool {
        crate::db::tags::attach(pool, new_tag.as_ref(), &link)
            .await
            .map_err(|e| persist_failed("tag", e))?;
    }
    if let Some(created) = new_tag {
        state.tags.insert(created.id, created);
    }
    state.product_tags.insert(link.id, link);

    tracing::info!(product_id = %product_id, tag = %tag.label, "tag attached");
    Ok((StatusCode::CREATED, Json(tag.into())))
}

/// DELETE /v1/products/:id/tags/:tag_id — Detach a tag.
#[utoipa::path(
    delete,
    path = "/v1/products/{id}/tags/{tag_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("tag_id" = Uuid, Path, description = "Tag ID"),
    ),
    responses(
        (status = 204, description = "Tag detached"),
        (status = 404, description = "Tag not attached to this product", body = crate::error::ErrorBody),
    ),
    tag = "tags"
)]
async fn detach_tag(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((product_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Staff)?;

    let _write = state.catalog_writes.lock(&product_id).await;
    ensure_product(&state, product_id)?;
    let link = state
        .product_tags
        .find(|pt| pt.product_id == product_id && pt.tag_id == tag_id)
        .ok_or_else(|| AppError::not_found("tag", tag_id))?;

    if let Some(pool) = &state.db_pool {
        crate::db::tags::detach(pool, product_id, tag_id)
            .await
            .map_err(|e| delete_failed("tag", e))?;
    }
    state.product_tags.remove(&link.id);

    Ok(StatusCode::NO_CONTENT)
}
