mod dto;
mod error;
mod handlers;
mod state;

pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// 触发接口 + 只读接口
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/cron", get(handlers::cron).post(handlers::cron))
        .route("/api/news", get(handlers::list_news))
        .route("/api/stocks", get(handlers::list_stocks))
        .route("/api/stocks/:code", get(handlers::stock_detail))
        .route("/api/analysis", get(handlers::latest_analysis))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
