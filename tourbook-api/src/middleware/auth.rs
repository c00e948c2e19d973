use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

pub const ADMIN_ROLE: &str = "ADMIN";

/// Admin session. Validated once per request by `admin_auth_middleware`;
/// handlers take it from the request extensions.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::AuthenticationError("Admin session required".to_string()))?;

    let claims = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::AuthenticationError("Admin session expired".to_string()),
        _ => AppError::AuthenticationError("Invalid admin session".to_string()),
    })?
    .claims;

    if claims.role != ADMIN_ROLE {
        tracing::warn!("Rejected token for {} with role {}", claims.sub, claims.role);
        return Err(AppError::AuthorizationError("Admin role required".to_string()));
    }

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
