// routes.rs
use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{handler::recommendations::recommendation_handler, AppState};

// Health check handler
async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let (database, cache) = futures::future::join(
        app_state.store.ping(),
        app_state.cache.health_check(),
    )
    .await;

    let database_ok = database.is_ok();
    let cache_ok = matches!(cache, Ok(true));
    if !database_ok || !cache_ok {
        tracing::warn!("Health check degraded: database={} cache={}", database_ok, cache_ok);
    }

    Json(json!({
        "status": if database_ok && cache_ok { "ok" } else { "degraded" },
        "database": if database_ok { "connected" } else { "unreachable" },
        "cache": if cache_ok { "connected" } else { "unreachable" },
        "event_topic": app_state.env.event_topic,
        "event_source": app_state.env.event_source.as_str(),
        "checked_at": chrono::Utc::now(),
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(recommendation_handler())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}
