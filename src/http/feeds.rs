use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::response::{message, success, success_with_message, ApiError};
use super::AppState;
use crate::ingest::IngestError;
use crate::storage::{SourceExists, SourceUpdate};
use crate::util::{source_name_from_url, validate_feed_url};

const DUPLICATE_SOURCE: &str = "Feed source with this URL already exists";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sources).post(create_source))
        .route("/check", post(check_all))
        .route("/fetch-all", post(fetch_all))
        .route("/reload", post(reload))
        .route("/{id}", put(update_source).delete(delete_source))
        .route("/{id}/check", post(check_source))
}

#[derive(Debug, Deserialize)]
struct CreateSource {
    name: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UpdateSource {
    name: Option<String>,
    url: Option<String>,
    #[serde(alias = "isActive")]
    is_active: Option<bool>,
}

fn validated_url(url: &str) -> Result<String, ApiError> {
    validate_feed_url(url.trim())
        .map(|u| u.to_string())
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

async fn list_sources(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let sources = state
        .db
        .list_sources()
        .await
        .map_err(|e| state.internal("Failed to get feed sources", e))?;
    Ok(success(sources))
}

/// Register a source and fetch it right away. A failing first fetch is
/// reported in the message but doesn't undo the registration.
async fn create_source(
    State(state): State<AppState>,
    Json(body): Json<CreateSource>,
) -> Result<impl IntoResponse, ApiError> {
    let url = validated_url(&body.url)?;
    let name = match body.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => source_name_from_url(&url)
            .ok_or_else(|| ApiError::bad_request("Name is required"))?,
    };

    let existing = state
        .db
        .get_source_by_url(&url)
        .await
        .map_err(|e| state.internal("Failed to add feed source", e))?;
    if existing.is_some() {
        return Err(ApiError::bad_request(DUPLICATE_SOURCE));
    }

    let source = match state.db.create_source(&name, &url).await {
        Ok(source) => source,
        Err(e) if e.downcast_ref::<SourceExists>().is_some() => {
            return Err(ApiError::bad_request(DUPLICATE_SOURCE));
        }
        Err(e) => return Err(state.internal("Failed to add feed source", e)),
    };

    let note = match state.ingestor.fetch_and_save_articles(source.id, &source.url).await {
        Ok(n) => format!("Feed source added, fetched {n} new articles"),
        Err(e) => {
            tracing::warn!(source = %source.name, error = %e, "Initial fetch failed");
            format!("Feed source added, initial fetch failed: {e}")
        }
    };

    Ok((StatusCode::CREATED, success_with_message(source, note)))
}

async fn update_source(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateSource>,
) -> Result<impl IntoResponse, ApiError> {
    let url = match body.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Some(validated_url(url)?),
        None => None,
    };
    let update = SourceUpdate {
        name: body.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        url,
        is_active: body.is_active,
    };

    match state.db.update_source(id, &update).await {
        Ok(Some(source)) => Ok(success(source)),
        Ok(None) => Err(ApiError::NotFound("Feed source not found")),
        Err(e) if e.downcast_ref::<SourceExists>().is_some() => {
            Err(ApiError::bad_request(DUPLICATE_SOURCE))
        }
        Err(e) => Err(state.internal("Failed to update feed source", e)),
    }
}

async fn delete_source(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .delete_source(id)
        .await
        .map_err(|e| state.internal("Failed to delete feed source", e))?;
    if !deleted {
        return Err(ApiError::NotFound("Feed source not found"));
    }
    Ok(message("Feed source deleted successfully"))
}

async fn check_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .ingestor
        .check_all_feeds()
        .await
        .map_err(|e| state.internal("Failed to check feeds", e))?;
    Ok(success_with_message(
        json!({ "new_articles": saved }),
        "Feed check completed",
    ))
}

async fn check_source(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.ingestor.check_source(id).await {
        Ok(n) => Ok(success_with_message(
            json!({ "new_articles": n }),
            format!("Fetched {n} new articles"),
        )),
        Err(IngestError::SourceNotFound(_)) => Err(ApiError::NotFound("Feed source not found")),
        Err(e @ IngestError::Fetch(_)) => Err(ApiError::failed(
            StatusCode::BAD_GATEWAY,
            "Failed to check feed",
            e,
            state.config.is_development(),
        )),
        Err(e) => Err(state.internal("Failed to check feed", e)),
    }
}

async fn fetch_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .ingestor
        .fetch_all()
        .await
        .map_err(|e| state.internal("Failed to fetch feeds", e))?;
    let note = format!(
        "Fetched {} new articles from {} sources",
        report.total_new_articles, report.total_sources
    );
    Ok(success_with_message(report, note))
}

/// Register configured feed URLs that aren't known yet.
async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    let added = state
        .ingestor
        .initialize_feed_sources(&state.config.rss_feeds)
        .await;
    success_with_message(
        json!({ "added": added }),
        format!("Reloaded feeds, {added} new sources"),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ai::MockGenerator;
    use crate::config::Config;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_rejects_bad_and_duplicate_urls() {
        let state = state().await;

        let (status, body) = call(
            &state,
            "POST",
            "/api/feeds",
            Some(json!({ "url": "ftp://haber.example/rss" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        state
            .db
            .create_source("var", "https://haber.example/rss")
            .await
            .unwrap();
        let (status, body) = call(
            &state,
            "POST",
            "/api/feeds",
            Some(json!({ "name": "tekrar", "url": "https://haber.example/rss" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], DUPLICATE_SOURCE);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let state = state().await;
        let source = state
            .db
            .create_source("eski", "https://haber.example/rss")
            .await
            .unwrap();
        let uri = format!("/api/feeds/{}", source.id);

        let (status, body) = call(
            &state,
            "PUT",
            &uri,
            Some(json!({ "name": "yeni", "isActive": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "yeni");
        assert_eq!(body["data"]["is_active"], false);

        let (status, _) = call(&state, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&state, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Feed source not found");

        let (status, _) = call(&state, "PUT", &uri, Some(json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_unknown_source() {
        let state = state().await;
        let (status, _) = call(&state, "POST", "/api/feeds/99/check", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fetch_all_and_reload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = Config {
            rss_feeds: vec![format!("{}/rss", server.uri())],
            ..Config::default()
        };
        let state = state_with(Arc::new(MockGenerator::failing()), config).await;

        let (status, body) = call(&state, "POST", "/api/feeds/reload", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["added"], 1);

        let (_, body) = call(&state, "GET", "/api/feeds", None).await;
        assert_eq!(body["data"][0]["name"], "127.0.0.1");
        assert_eq!(body["data"][0]["article_count"], 0);

        let (status, body) = call(&state, "POST", "/api/feeds/fetch-all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_sources"], 1);
        assert_eq!(body["data"]["failed"], 1);
        assert_eq!(body["data"]["results"][0]["status"], "error");

        let id = body["data"]["results"][0]["source_id"].as_i64().unwrap();
        let (status, body) = call(&state, "POST", &format!("/api/feeds/{id}/check"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to check feed");
        // Default config is a development deployment
        assert!(body["message"].as_str().unwrap().contains("404"));
    }
}
