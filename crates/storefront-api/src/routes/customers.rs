//! # Customer API
//!
//! Staff manage customer records directly. Any authenticated user reaches
//! their own profile at `/v1/customers/me`, which is created on first use;
//! at most one customer exists per user id.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use storefront_core::{require_text, Membership, ValidationError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, require_user, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::{delete_failed, persist_failed};
use crate::state::{AppState, CustomerRecord};

// -- DTOs ---------------------------------------------------------------------

/// Staff: register a customer for a user.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCustomerRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub profile: ProfileRequest,
}

impl Validate for CreateCustomerRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        self.profile.validate()
    }
}

/// Editable profile fields. `membership` is honoured only for staff.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>, format = Date, example = "1990-04-01")]
    pub birth_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "SILVER")]
    pub membership: Option<Membership>,
}

impl Validate for ProfileRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        self.clean().map(|_| ())
    }
}

/// Profile fields after trimming and validation.
struct CleanProfile {
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
}

fn optional_text(
    field: &'static str,
    value: Option<&String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => require_text(field, v, max).map(Some),
        None => Ok(None),
    }
}

fn looks_like_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.contains('@'))
}

impl ProfileRequest {
    fn clean(&self) -> Result<CleanProfile, ValidationError> {
        let email = optional_text("email", self.email.as_ref(), 254)?;
        if let Some(email) = &email {
            if !looks_like_email(email) {
                return Err(ValidationError::InvalidEmail(email.clone()));
            }
        }
        Ok(CleanProfile {
            first_name: require_text("first_name", &self.first_name, 255)?,
            last_name: require_text("last_name", &self.last_name, 255)?,
            email,
            phone: optional_text("phone", self.phone.as_ref(), 255)?,
        })
    }

    /// Copy the profile onto a record; membership only when `staff`.
    fn apply_to(&self, record: &mut CustomerRecord, clean: CleanProfile, staff: bool) {
        record.first_name = clean.first_name;
        record.last_name = clean.last_name;
        record.email = clean.email;
        record.phone = clean.phone;
        record.birth_date = self.birth_date;
        if staff {
            if let Some(membership) = self.membership {
                record.membership = membership;
            }
        }
    }
}

// -- Router -------------------------------------------------------------------

/// Build the customers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/customers", get(list_customers).post(create_customer))
        .route("/v1/customers/me", get(get_me).put(update_me))
        .route(
            "/v1/customers/:id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
}

/// Find or create the customer bound to a user id.
///
/// Creation happens under [`AppState::customer_writes`] with a second
/// lookup, so concurrent first requests for the same user produce a single
/// customer. The profile becomes visible only once it is saved.
pub(crate) async fn resolve_customer(
    state: &AppState,
    user_id: Uuid,
) -> Result<CustomerRecord, AppError> {
    if let Some(customer) = state.customers.find(|c| c.user_id == user_id) {
        return Ok(customer);
    }

    let _write = state.customer_writes.lock(&user_id).await;
    if let Some(customer) = state.customers.find(|c| c.user_id == user_id) {
        return Ok(customer);
    }
    let customer = CustomerRecord::blank(user_id);
    if let Some(pool) = &state.db_pool {
        crate::db::customers::insert(pool, &customer)
            .await
            .map_err(|e| persist_failed("customer", e))?;
    }
    state.customers.insert(customer.id, customer.clone());

    tracing::info!(customer_id = %customer.id, user_id = %user_id, "customer profile created");
    Ok(customer)
}

/// GET /v1/customers — All customers (staff).
#[utoipa::path(
    get,
    path = "/v1/customers",
    responses(
        (status = 200, description = "Customers", body = Vec<CustomerRecord>),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn list_customers(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<CustomerRecord>>, AppError> {
    require_role(&caller, Role::Staff)?;
    let mut customers = state.customers.list();
    customers.sort_by(|a, b| {
        (&a.first_name, &a.last_name, a.id).cmp(&(&b.first_name, &b.last_name, b.id))
    });
    Ok(Json(customers))
}

/// POST /v1/customers — Register a customer for a user (staff).
#[utoipa::path(
    post,
    path = "/v1/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = CustomerRecord),
        (status = 409, description = "User already has a customer", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn create_customer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CustomerRecord>), AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let clean = req.profile.clean()?;

    let user_id = req.user_id;
    let _write = state.customer_writes.lock(&user_id).await;
    if let Some(existing) = state.customers.find(|c| c.user_id == user_id) {
        return Err(AppError::Conflict(format!(
            "user {user_id} already has customer {}",
            existing.id
        )));
    }
    let mut customer = CustomerRecord::blank(user_id);
    req.profile.apply_to(&mut customer, clean, true);

    if let Some(pool) = &state.db_pool {
        crate::db::customers::insert(pool, &customer)
            .await
            .map_err(|e| persist_failed("customer", e))?;
    }
    state.customers.insert(customer.id, customer.clone());

    tracing::info!(customer_id = %customer.id, user_id = %user_id, "customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /v1/customers/:id — One customer (staff).
#[utoipa::path(
    get,
    path = "/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer found", body = CustomerRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn get_customer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerRecord>, AppError> {
    require_role(&caller, Role::Staff)?;
    state
        .customers
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("customer", id))
}

/// PUT /v1/customers/:id — Replace a customer's profile and membership (staff).
#[utoipa::path(
    put,
    path = "/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Customer updated", body = CustomerRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn update_customer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<CustomerRecord>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let clean = req.clean()?;

    let _write = state.customer_writes.lock(&id).await;
    let mut record = state
        .customers
        .get(&id)
        .ok_or_else(|| AppError::not_found("customer", id))?;
    req.apply_to(&mut record, clean, true);
    save_customer(&state, record).await.map(Json)
}

/// DELETE /v1/customers/:id — Delete a customer without orders (staff).
#[utoipa::path(
    delete,
    path = "/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Customer has orders", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn delete_customer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Staff)?;

    let _write = state.customer_writes.lock(&id).await;
    if !state.customers.contains(&id) {
        return Err(AppError::not_found("customer", id));
    }
    let orders = state.orders.count(|o| o.customer_id == id);
    if orders > 0 {
        return Err(AppError::Conflict(format!(
            "customer {id} cannot be deleted because it has {orders} order(s)"
        )));
    }

    if let Some(pool) = &state.db_pool {
        crate::db::customers::delete(pool, id)
            .await
            .map_err(|e| delete_failed("customer", e))?;
    }
    state.customers.remove(&id);

    tracing::info!(customer_id = %id, "customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/customers/me — The caller's own profile, created on first access.
#[utoipa::path(
    get,
    path = "/v1/customers/me",
    responses(
        (status = 200, description = "Caller's profile", body = CustomerRecord),
        (status = 401, description = "No authenticated user", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn get_me(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<CustomerRecord>, AppError> {
    let user_id = require_user(&caller)?;
    Ok(Json(resolve_customer(&state, user_id).await?))
}

/// PUT /v1/customers/me — Edit the caller's own profile.
#[utoipa::path(
    put,
    path = "/v1/customers/me",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = CustomerRecord),
        (status = 401, description = "No authenticated user", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
async fn update_me(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<CustomerRecord>, AppError> {
    let user_id = require_user(&caller)?;
    let req = extract_validated_json(body)?;
    let clean = req.clean()?;
    let customer = resolve_customer(&state, user_id).await?;

    let _write = state.customer_writes.lock(&customer.id).await;
    let mut record = state
        .customers
        .get(&customer.id)
        .ok_or_else(|| AppError::not_found("customer", customer.id))?;
    req.apply_to(&mut record, clean, false);
    save_customer(&state, record).await.map(Json)
}

/// Write an edited customer through, then publish it. Callers hold
/// [`AppState::customer_writes`].
pub(crate) async fn save_customer(
    state: &AppState,
    record: CustomerRecord,
) -> Result<CustomerRecord, AppError> {
    if let Some(pool) = &state.db_pool {
        crate::db::customers::update(pool, &record)
            .await
            .map_err(|e| persist_failed("customer", e))?;
    }
    state.customers.insert(record.id, record.clone());
    Ok(record)
}
