use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use super::response::{success, ApiError};
use super::{parse_timestamp, AppState};
use crate::storage::ArticleQuery;
use crate::util::MAX_SEARCH_QUERY_LENGTH;

const DEFAULT_PAGE_SIZE: i64 = 20;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles))
        .route("/latest", get(latest))
        .route("/trending", get(trending))
        .route("/search", get(search))
        .route("/statistics", get(statistics))
        .route("/{id}", get(get_article))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<i64>,
    limit: Option<i64>,
    #[serde(alias = "sourceId")]
    source_id: Option<i64>,
    /// Comma separated category names.
    #[serde(alias = "categoryNames", alias = "categories")]
    category: Option<String>,
    #[serde(alias = "startDate")]
    start: Option<String>,
    #[serde(alias = "endDate")]
    end: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<i64>,
}

fn check_search_length(term: &str) -> Result<(), ApiError> {
    if term.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Search query exceeds maximum length of {MAX_SEARCH_QUERY_LENGTH} characters"
        )));
    }
    Ok(())
}

async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(term) = &params.search {
        check_search_length(term)?;
    }
    let query = ArticleQuery {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        source_id: params.source_id,
        categories: params
            .category
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        start: params
            .start
            .as_deref()
            .map(|s| parse_timestamp(s, "start"))
            .transpose()?
            .map(|d| d.timestamp()),
        end: params
            .end
            .as_deref()
            .map(|s| parse_timestamp(s, "end"))
            .transpose()?
            .map(|d| d.timestamp()),
        search: params.search,
    };

    let page = state
        .db
        .list_articles(&query)
        .await
        .map_err(|e| state.internal("Failed to get articles", e))?;
    Ok(success(page))
}

async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .get_article(id)
        .await
        .map_err(|e| state.internal("Failed to get article", e))?
        .map(success)
        .ok_or(ApiError::NotFound("Article not found"))
}

async fn latest(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = state
        .db
        .latest_articles(params.limit.unwrap_or(10))
        .await
        .map_err(|e| state.internal("Failed to get latest articles", e))?;
    Ok(success(articles))
}

/// Articles ingested during the last 24 hours.
async fn trending(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let since = Utc::now().timestamp() - 24 * 3600;
    let articles = state
        .db
        .trending_articles(since, params.limit.unwrap_or(10))
        .await
        .map_err(|e| state.internal("Failed to get trending articles", e))?;
    Ok(success(articles))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(ApiError::bad_request("Search query is required"));
    }
    check_search_length(term)?;

    let articles = state
        .db
        .search_articles(term, params.limit.unwrap_or(20))
        .await
        .map_err(|e| state.internal("Failed to search articles", e))?;
    Ok(success(articles))
}

async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .db
        .statistics(Utc::now().timestamp())
        .await
        .map_err(|e| state.internal("Failed to get statistics", e))?;
    Ok(success(stats))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::feed::NormalizedArticle;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;

    fn article(link: &str, title: &str, at: i64) -> NormalizedArticle {
        NormalizedArticle {
            title: title.into(),
            description: format!("{title} açıklaması"),
            content: String::new(),
            link: link.into(),
            image_url: None,
            author: None,
            pub_date: chrono::DateTime::from_timestamp(at, 0),
            guid: link.into(),
            categories: Vec::new(),
        }
    }

    async fn seeded() -> crate::http::AppState {
        let state = state().await;
        let source = state
            .db
            .create_source("kaynak", "https://kaynak.example/rss")
            .await
            .unwrap();
        let spor = state.db.upsert_category("Spor").await.unwrap();
        state
            .db
            .insert_article(source.id, &article("https://k/1", "Derbi sonucu", 1_736_150_000), &[spor.id])
            .await
            .unwrap();
        state
            .db
            .insert_article(source.id, &article("https://k/2", "Borsa rekor", 1_736_160_000), &[])
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_list_with_category_filter() {
        let state = seeded().await;

        let (status, body) = call(&state, "GET", "/api/articles?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["total"], 2);
        assert_eq!(body["data"]["pagination"]["total_pages"], 2);
        assert_eq!(body["data"]["articles"][0]["title"], "Borsa rekor");

        let (_, body) = call(&state, "GET", "/api/articles?categoryNames=Spor,%20Yerel", None).await;
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["articles"][0]["categories"][0], "Spor");
        assert_eq!(body["data"]["articles"][0]["source_name"], "kaynak");

        let (status, _) = call(&state, "GET", "/api/articles?start=yesterday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_search_and_statistics() {
        let state = seeded().await;

        let (status, body) = call(&state, "GET", "/api/articles/search?q=BORSA", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = call(&state, "GET", "/api/articles/search?q=%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let id = body["data"][0]["id"].as_i64().unwrap();
        let (status, body) = call(&state, "GET", &format!("/api/articles/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["link"], "https://k/2");

        let (status, body) = call(&state, "GET", "/api/articles/9999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Article not found");

        let (_, body) = call(&state, "GET", "/api/articles/statistics", None).await;
        assert_eq!(body["data"]["total_articles"], 2);
        assert_eq!(body["data"]["total_sources"], 1);
        assert_eq!(body["data"]["articles_last_24h"], 2);

        let (_, body) = call(&state, "GET", "/api/articles/trending?limit=5", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }
}
