use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    middleware::auth::{AdminClaims, ADMIN_ROLE},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Public login route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/login", post(login_admin))
}

/// Session check; mounted behind the admin middleware.
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/v1/admin/session", get(current_session))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim();
    let account = state
        .auth
        .admins
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(email))
        .filter(|a| verify_password(&req.password, &a.password_hash));

    let Some(account) = account else {
        tracing::warn!("Rejected admin login");
        return Err(AppError::AuthenticationError("Invalid email or password".to_string()));
    };

    let claims = AdminClaims {
        sub: account.email.to_lowercase(),
        email: account.email.clone(),
        role: ADMIN_ROLE.to_owned(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(state.auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    tracing::info!("Admin session issued for {}", claims.sub);
    Ok(Json(AuthResponse {
        token,
        expires_in: state.auth.expiration,
    }))
}

async fn current_session(Extension(claims): Extension<AdminClaims>) -> Json<SessionResponse> {
    Json(SessionResponse {
        email: claims.email,
        role: claims.role,
        exp: claims.exp,
    })
}
