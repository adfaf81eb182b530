//! # Collection API
//!
//! Collections group products. Reads are public; writes are staff-only.
//! A collection that still holds products cannot be deleted.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{require_text, ValidationError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::{delete_failed, persist_failed};
use crate::state::{AppState, CollectionRecord};

/// Create or rename a collection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CollectionRequest {
    pub title: String,
}

impl Validate for CollectionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, 255).map(|_| ())
    }
}

/// A collection with its product count.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionView {
    pub id: Uuid,
    pub title: String,
    pub products_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Count products per collection in one pass over the catalog.
pub(crate) fn product_counts(state: &AppState) -> HashMap<Uuid, usize> {
    let mut counts = HashMap::new();
    for product in state.products.list() {
        *counts.entry(product.collection_id).or_default() += 1;
    }
    counts
}

fn view(record: CollectionRecord, counts: &HashMap<Uuid, usize>) -> CollectionView {
    CollectionView {
        products_count: counts.get(&record.id).copied().unwrap_or(0),
        id: record.id,
        title: record.title,
        created_at: record.created_at,
    }
}

/// Build the collections router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/collections",
            get(list_collections).post(create_collection),
        )
        .route(
            "/v1/collections/:id",
            get(get_collection)
                .put(update_collection)
                .delete(delete_collection),
        )
}

/// GET /v1/collections — All collections ordered by title.
#[utoipa::path(
    get,
    path = "/v1/collections",
    responses(
        (status = 200, description = "Collections", body = Vec<CollectionView>),
    ),
    tag = "collections"
)]
async fn list_collections(State(state): State<AppState>) -> Json<Vec<CollectionView>> {
    let counts = product_counts(&state);
    let mut views: Vec<CollectionView> = state
        .collections
        .list()
        .into_iter()
        .map(|c| view(c, &counts))
        .collect();
    views.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
    Json(views)
}

/// POST /v1/collections — Create a collection.
#[utoipa::path(
    post,
    path = "/v1/collections",
    request_body = CollectionRequest,
    responses(
        (status = 201, description = "Collection created", body = CollectionView),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "collections"
)]
async fn create_collection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CollectionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CollectionView>), AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;

    let record = CollectionRecord {
        id: Uuid::new_v4(),
        title: require_text("title", &req.title, 255)?,
        created_at: Utc::now(),
    };

    let _write = state.catalog_writes.lock(&record.id).await;
    if let Some(pool) = &state.db_pool {
        crate::db::catalog::insert_collection(pool, &record)
            .await
            .map_err(|e| persist_failed("collection", e))?;
    }
    state.collections.insert(record.id, record.clone());

    tracing::info!(collection_id = %record.id, title = %record.title, "collection created");
    Ok((StatusCode::CREATED, Json(view(record, &HashMap::new()))))
}

/// GET /v1/collections/:id — One collection.
#[utoipa::path(
    get,
    path = "/v1/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection found", body = CollectionView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "collections"
)]
async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionView>, AppError> {
    let record = state
        .collections
        .get(&id)
        .ok_or_else(|| AppError::not_found("collection", id))?;
    Ok(Json(view(record, &product_counts(&state))))
}

/// PUT /v1/collections/:id — Rename a collection.
#[utoipa::path(
    put,
    path = "/v1/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection ID")),
    request_body = CollectionRequest,
    responses(
        (status = 200, description = "Collection updated", body = CollectionView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "collections"
)]
async fn update_collection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CollectionRequest>, JsonRejection>,
) -> Result<Json<CollectionView>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let title = require_text("title", &req.title, 255)?;

    let _write = state.catalog_writes.lock(&id).await;
    if !state.collections.contains(&id) {
        return Err(AppError::not_found("collection", id));
    }
    if let Some(pool) = &state.db_pool {
        crate::db::catalog::update_collection_title(pool, id, &title)
            .await
            .map_err(|e| persist_failed("collection", e))?;
    }
    let record = state
        .collections
        .update(&id, |c| c.title = title)
        .ok_or_else(|| AppError::not_found("collection", id))?;

    Ok(Json(view(record, &product_counts(&state))))
}

/// DELETE /v1/collections/:id — Delete an empty collection.
#[utoipa::path(
    delete,
    path = "/v1/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection ID")),
    responses(
        (status = 204, description = "Collection deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Collection still has products", body = crate::error::ErrorBody),
    ),
    tag = "collections"
)]
async fn delete_collection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Staff)?;

    let _write = state.catalog_writes.lock(&id).await;
    if !state.collections.contains(&id) {
        return Err(AppError::not_found("collection", id));
    }
    let products = state.products.count(|p| p.collection_id == id);
    if products > 0 {
        return Err(AppError::Conflict(format!(
            "collection {id} cannot be deleted because it includes {products} product(s)"
        )));
    }

    if let Some(pool) = &state.db_pool {
        crate::db::catalog::delete_collection(pool, id)
            .await
            .map_err(|e| delete_failed("collection", e))?;
    }
    state.collections.remove(&id);

    tracing::info!(collection_id = %id, "collection deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use serde_json::json;
    use tower::ServiceExt;

    fn staff_app(state: &AppState) -> Router {
        app_as(router(), state.clone(), CallerIdentity::staff(None))
    }

    #[test]
    fn request_validation() {
        assert!(CollectionRequest { title: "Toys".into() }.validate().is_ok());
        assert!(CollectionRequest { title: "  ".into() }.validate().is_err());
        assert!(CollectionRequest { title: "x".repeat(256) }.validate().is_err());
    }

    #[tokio::test]
    async fn create_then_list_sorted_with_counts() {
        let state = AppState::new();
        let app = staff_app(&state);

        for title in ["Toys", "Beauty"] {
            let resp = app
                .clone()
                .oneshot(json_request("POST", "/v1/collections", json!({"title": title})))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let beauty = state.collections.find(|c| c.title == "Beauty").unwrap();
        seed_product(&state, beauty.id, "Lipstick", "9.99", 5);
        seed_product(&state, beauty.id, "Shampoo", "4.50", 5);

        let resp = app
            .oneshot(empty_request("GET", "/v1/collections"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let list: Vec<CollectionView> = body_json(resp).await;
        assert_eq!(
            list.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
            vec!["Beauty", "Toys"]
        );
        assert_eq!(list[0].products_count, 2);
        assert_eq!(list[1].products_count, 0);
    }

    #[tokio::test]
    async fn create_requires_staff() {
        let state = AppState::new();
        let app = app_as(router(), state.clone(), CallerIdentity::customer(Uuid::new_v4()));
        let resp = app
            .oneshot(json_request("POST", "/v1/collections", json!({"title": "Toys"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(state.collections.is_empty());
    }

    #[tokio::test]
    async fn anonymous_can_read() {
        let state = AppState::new();
        let c = seed_collection(&state, "Toys");
        let app = app_as(router(), state, CallerIdentity::anonymous());
        let resp = app
            .oneshot(empty_request("GET", &format!("/v1/collections/{}", c.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rename_collection() {
        let state = AppState::new();
        let c = seed_collection(&state, "Toys");
        let resp = staff_app(&state)
            .oneshot(json_request(
                "PUT",
                &format!("/v1/collections/{}", c.id),
                json!({"title": "Games"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: CollectionView = body_json(resp).await;
        assert_eq!(updated.title, "Games");
        assert_eq!(state.collections.get(&c.id).unwrap().title, "Games");
    }

    #[tokio::test]
    async fn delete_with_products_conflicts() {
        let state = AppState::new();
        let c = seed_collection(&state, "Toys");
        seed_product(&state, c.id, "Yo-yo", "1.99", 3);

        let resp = staff_app(&state)
            .oneshot(empty_request("DELETE", &format!("/v1/collections/{}", c.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(state.collections.contains(&c.id));
    }

    #[tokio::test]
    async fn delete_empty_collection() {
        let state = AppState::new();
        let c = seed_collection(&state, "Toys");
        let app = staff_app(&state);

        let resp = app
            .clone()
            .oneshot(empty_request("DELETE", &format!("/v1/collections/{}", c.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(!state.collections.contains(&c.id));

        let resp = app
            .oneshot(empty_request("DELETE", &format!("/v1/collections/{}", c.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_saves_leave_collections_unchanged() {
        let state = state_with_failing_db();
        let c = seed_collection(&state, "Toys");
        let app = staff_app(&state);

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/v1/collections", json!({"title": "Garden"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.collections.len(), 1);

        let resp = app
            .oneshot(json_request(
                "PUT",
                &format!("/v1/collections/{}", c.id),
                json!({"title": "Games"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.collections.get(&c.id).unwrap().title, "Toys");
    }
}
