//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control (RBAC).
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{user_id}:{mac}   role is `customer` or `staff`, user_id may be empty for staff
//! Bearer {secret}                 operator token: staff without a user binding
//! ```
//!
//! `mac` is the lowercase hex HMAC-SHA256 of `{role}:{user_id}` keyed with
//! the configured secret. A token reveals nothing about the secret, and
//! changing its role or user invalidates the MAC.
//!
//! Requests without an `Authorization` header are served as
//! [`Role::Anonymous`]; public endpoints (catalog reads, carts, review
//! submission) accept them. A header that is present but invalid is
//! always rejected with 401.
//!
//! When no secret is configured, authentication is disabled: every request
//! runs as staff, and an `X-User-Id` header may bind a user for the
//! customer-scoped endpoints.
//!
//! ## CallerIdentity
//!
//! Every request that passes the middleware gets a [`CallerIdentity`]
//! injected into the request extensions. Handlers extract it via the
//! `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};

/// Header that binds a user id when authentication is disabled.
pub const USER_ID_HEADER: &str = "x-user-id";

// -- Role ---------------------------------------------------------------------

/// Caller roles, ordered by privilege level.
///
/// The `Ord` derivation respects variant declaration order:
/// `Anonymous < Customer < Staff`, so access checks are a single `>=`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No credentials presented.
    Anonymous,
    /// A shopper acting on their own profile and orders.
    Customer,
    /// Store operator with full access.
    Staff,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Customer => "customer",
            Self::Staff => "staff",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// -- CallerIdentity -----------------------------------------------------------

/// Identity of the caller, available to all route handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// The authenticated user. Always present for customers; optional for
    /// staff, who only need one for the `me` endpoints and checkout.
    pub user_id: Option<Uuid>,
}

impl CallerIdentity {
    /// An unauthenticated caller.
    pub fn anonymous() -> Self {
        Self {
            role: Role::Anonymous,
            user_id: None,
        }
    }

    /// A customer bound to a user.
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            role: Role::Customer,
            user_id: Some(user_id),
        }
    }

    /// A staff caller, optionally bound to a user.
    pub fn staff(user_id: Option<Uuid>) -> Self {
        Self {
            role: Role::Staff,
            user_id,
        }
    }

    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present (middleware didn't run).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
///
/// Anonymous callers get 401 (they can fix it by authenticating); callers
/// with a role that is simply too low get 403.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else if caller.role == Role::Anonymous {
        Err(AppError::Unauthorized(format!(
            "authentication required: role '{}'",
            minimum.as_str()
        )))
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

/// Return the caller's user id, or 401 if the caller is not bound to a user.
pub fn require_user(caller: &CallerIdentity) -> Result<Uuid, AppError> {
    caller
        .user_id
        .ok_or_else(|| AppError::Unauthorized("this endpoint requires an authenticated user".into()))
}

// -- Auth Configuration -------------------------------------------------------

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// -- Token Validation ---------------------------------------------------------

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, performs a dummy comparison so timing does not
/// reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 over `{role}:{user_id}`, keyed with the secret.
pub fn token_mac(role: Role, user_id: Option<Uuid>, secret: &str) -> Result<String, String> {
    let user = user_id.map(|u| u.to_string()).unwrap_or_default();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("invalid token secret: {e}"))?;
    mac.update(format!("{}:{user}", role.as_str()).as_bytes());
    Ok(mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Parse a bearer token in format `{role}:{user_id}:{mac}` or `{secret}`.
///
/// The bare secret is the operator form and always yields staff.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity::staff(None))
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role_str, user_str, mac] => {
            let role: Role = role_str.parse()?;

            let user_id = if user_str.is_empty() {
                None
            } else {
                Some(
                    user_str
                        .parse::<Uuid>()
                        .map_err(|e| format!("invalid user_id: {e}"))?,
                )
            };

            if !constant_time_token_eq(mac, &token_mac(role, user_id, expected_secret)?) {
                return Err("invalid bearer token".into());
            }

            match (role, user_id) {
                (Role::Customer, None) => Err("customer tokens must carry a user_id".into()),
                (role, user_id) => Ok(CallerIdentity { role, user_id }),
            }
        }
        _ => Err("invalid token format: expected {role}:{user_id}:{mac} or {secret}".into()),
    }
}

/// Build a bearer token value (without the `Bearer ` prefix).
pub fn mint_token(role: Role, user_id: Option<Uuid>, secret: &str) -> Result<String, String> {
    match (role, user_id) {
        (Role::Anonymous, _) => Err("anonymous callers do not carry tokens".into()),
        (Role::Customer, None) => Err("customer tokens must carry a user_id".into()),
        (role, user_id) => {
            let user = user_id.map(|u| u.to_string()).unwrap_or_default();
            Ok(format!(
                "{}:{user}:{}",
                role.as_str(),
                token_mac(role, user_id, secret)?
            ))
        }
    }
}

fn dev_user_binding(headers: &HeaderMap) -> Result<Option<Uuid>, String> {
    match headers.get(USER_ID_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map_err(|_| "x-user-id header is not valid ASCII".to_string())?
            .trim()
            .parse::<Uuid>()
            .map(Some)
            .map_err(|e| format!("invalid x-user-id header: {e}")),
    }
}

// -- Middleware ---------------------------------------------------------------

/// Resolve the caller from the `Authorization` header and inject a
/// [`CallerIdentity`] into request extensions for downstream handlers.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    let identity = match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    match parse_bearer_token(&header_value[7..], expected) {
                        Ok(identity) => identity,
                        Err(msg) => {
                            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                            return unauthorized_response(&msg);
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    return unauthorized_response("authorization header must use Bearer scheme");
                }
                None => CallerIdentity::anonymous(),
            }
        }
        _ => match dev_user_binding(request.headers()) {
            Ok(user_id) => CallerIdentity::staff(user_id),
            Err(msg) => return unauthorized_response(&msg),
        },
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("UNAUTHORIZED", message)),
    )
        .into_response()
}
