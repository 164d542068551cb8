pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{docs, generate, health, projects, users, AppState};

/// Headroom for form fields sent alongside the icon file.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_icon_size + FORM_OVERHEAD_BYTES;

    let api = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/me", get(users::current_user))
        .route("/subscription", post(users::change_subscription))
        .route("/generate-app", post(generate::generate_app))
        .route("/projects", get(projects::list_projects))
        .route("/projects/:id", delete(projects::delete_project))
        .route("/projects/:id/download", get(projects::download_project));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .nest("/api", api)
        .merge(docs::create_docs_router())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::metrics::metrics_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
