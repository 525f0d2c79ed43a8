use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use super::response::{success, success_with_message, ApiError};
use super::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/cleanup", post(cleanup))
}

async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .db
        .list_categories()
        .await
        .map_err(|e| state.internal("Failed to get categories", e))?;
    Ok(success(categories))
}

/// Merge categories that differ only by case.
async fn cleanup(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .db
        .cleanup_duplicate_categories()
        .await
        .map_err(|e| state.internal("Failed to clean up categories", e))?;
    Ok(success_with_message(
        json!({ "removed": removed }),
        format!("Removed {removed} duplicate categories"),
    ))
}
