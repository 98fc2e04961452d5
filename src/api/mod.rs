//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod auth;
pub mod console;
pub mod health;
pub mod load_apply;
pub mod pages;
pub mod status;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{Html, IntoResponse},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的路由
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.upload.max_content_length;

    Router::new()
        // Login & logout
        .merge(auth::router())
        // Status pages
        .merge(status::router())
        // Console
        .merge(console::router())
        // Load and apply
        .merge(load_apply::router())
        // Health
        .merge(health::router())
        .fallback(not_found)
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(pages::error_page("Not Found", "The requested page does not exist.")),
    )
}
