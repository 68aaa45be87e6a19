use std::sync::Arc;

use axum::{
    body::Bytes,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::{
    dtos::recommendationdtos::RecommendationRequestDto,
    error::HttpError,
    AppState,
};

pub fn recommendation_handler() -> Router {
    Router::new()
        .route("/recommendations", post(recommend).fallback(invalid_method))
        .route("/recommendations/", post(recommend).fallback(invalid_method))
        .route("/recommendations/top3", get(top3).fallback(invalid_method))
}

/// POST /recommendations/ with `{"user_id", "product_id"}`. The body is
/// decoded as JSON whatever `Content-Type` the client sent.
pub async fn recommend(
    Extension(app_state): Extension<Arc<AppState>>,
    payload: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let body = serde_json::from_slice::<RecommendationRequestDto>(&payload)
        .map_err(|e| HttpError::bad_request(format!("Invalid request body: {}", e)))?;

    let recommendations = app_state.recommendation_service.recommend(&body).await?;

    Ok(Json(recommendations))
}

/// GET /recommendations/top3
pub async fn top3(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let top = app_state.recommendation_service.top3().await?;

    Ok(Json(top))
}

async fn invalid_method() -> HttpError {
    HttpError::bad_request("Invalid request method")
}
