//! REST API.
//!
//! A thin axum layer over the ingestion, storage and analytics services.
//! Every response uses the `{success, data?, error?, message?}` envelope
//! from [`response`].

mod analytics;
mod articles;
mod categories;
mod feeds;
pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analytics::{Analytics, AnalyticsError};
use crate::ai::AiError;
use crate::config::Config;
use crate::ingest::Ingestor;
use crate::storage::Database;
use response::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub ingestor: Ingestor,
    pub analytics: Analytics,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(ingestor: Ingestor, analytics: Analytics, config: Arc<Config>) -> Self {
        Self {
            db: ingestor.database().clone(),
            ingestor,
            analytics,
            config,
        }
    }

    /// 500 for `error`, with detail exposed in development.
    pub(crate) fn internal(&self, message: &'static str, error: impl std::fmt::Display) -> ApiError {
        ApiError::internal(message, error, self.config.is_development())
    }

    /// Maps analytics failures: a missing AI key is a 503, anything else a 500.
    pub(crate) fn analytics_error(&self, message: &'static str, error: AnalyticsError) -> ApiError {
        match error {
            AnalyticsError::Ai(AiError::NotConfigured) => {
                ApiError::Unavailable("AI service is not configured")
            }
            AnalyticsError::InvalidWindow { .. } => ApiError::bad_request(error.to_string()),
            other => self.internal(message, other),
        }
    }
}

/// Build the application router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/api/feeds", feeds::routes())
        .nest("/api/articles", articles::routes())
        .nest("/api/categories", categories::routes())
        .nest("/api/analytics", analytics::routes());

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind `port` on all interfaces and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "newsdesk is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Route not found" })),
    )
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub(crate) fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| ApiError::bad_request(format!("Invalid {field}: expected YYYY-MM-DD or RFC 3339")))
}
