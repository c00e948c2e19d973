use axum::{http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod media;
pub mod middleware;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    // Everything here sees the claims placed by the session middleware.
    let admin = Router::new()
        .merge(admin::routes())
        .merge(media::routes(state.max_upload_bytes))
        .merge(auth::session_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(catalog::routes())
        .merge(checkout::routes())
        .merge(auth::routes())
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
