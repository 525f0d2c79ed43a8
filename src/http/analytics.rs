use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::response::{json_body, success, success_with_message, ApiError};
use super::{parse_timestamp, AppState};
use crate::analytics::ReportKind;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/wordfrequency/generate", post(generate_word_frequency))
        .route("/wordfrequency/latest", get(latest_word_frequency))
        .route("/report/generate", post(generate_report))
        .route("/report/latest", get(latest_report))
        .route("/report/history", get(report_history))
        .route("/report/{id}", get(get_report))
        .route("/summarize", post(summarize))
        .route("/summaries", get(list_summaries))
}

#[derive(Debug, Default, Deserialize)]
struct WordFrequencyBody {
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateReportBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SummarizeBody {
    #[serde(alias = "startDate")]
    start_date: Option<String>,
    #[serde(alias = "endDate")]
    end_date: Option<String>,
    prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

fn report_kind(value: Option<&str>) -> Result<ReportKind, ApiError> {
    value
        .ok_or_else(|| ApiError::bad_request("Report type is required"))?
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid report type. Must be daily, weekly, or monthly"))
}

/// A bare date as the end of a range covers the whole day.
fn parse_range_end(value: &str) -> Result<DateTime<Utc>, ApiError> {
    let start = parse_timestamp(value, "end_date")?;
    if NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok() {
        return Ok(start + chrono::Duration::seconds(86_399));
    }
    Ok(start)
}

async fn generate_word_frequency(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: WordFrequencyBody = json_body(&body)?;
    let limit = body.limit.unwrap_or(state.config.word_frequency_articles);

    let snapshot = state
        .analytics
        .generate_word_frequency(limit)
        .await
        .map_err(|e| state.analytics_error("Failed to generate word frequency", e))?;
    let note = match &snapshot {
        Some(s) => format!("Analyzed {} articles", s.article_count),
        None => "No articles to analyze".to_string(),
    };
    Ok(success_with_message(snapshot, note))
}

async fn latest_word_frequency(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .analytics
        .latest_word_frequency()
        .await
        .map_err(|e| state.analytics_error("Failed to get word frequency", e))?
        .map(success)
        .ok_or(ApiError::NotFound("No word frequency analysis found"))
}

async fn generate_report(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: GenerateReportBody = json_body(&body)?;
    let kind = report_kind(body.kind.as_deref())?;
    let date = match body.date.as_deref() {
        Some(value) => parse_timestamp(value, "date")?.date_naive(),
        None => Utc::now().date_naive(),
    };

    let report = state
        .analytics
        .generate_report(kind, date)
        .await
        .map_err(|e| state.analytics_error("Failed to generate report", e))?;
    let note = match &report {
        Some(_) => format!("Generated {kind} report for {date}"),
        None => format!("No articles found for {kind} report ending {date}"),
    };
    Ok(success_with_message(report, note))
}

async fn latest_report(
    State(state): State<AppState>,
    Query(params): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = report_kind(params.kind.as_deref())?;
    state
        .analytics
        .latest_report(kind)
        .await
        .map_err(|e| state.analytics_error("Failed to get report", e))?
        .map(success)
        .ok_or(ApiError::NotFound("No report found"))
}

async fn report_history(
    State(state): State<AppState>,
    Query(params): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = match params.kind.as_deref() {
        Some(value) => Some(report_kind(Some(value))?),
        None => None,
    };
    let reports = state
        .analytics
        .report_history(kind, params.limit.unwrap_or(10))
        .await
        .map_err(|e| state.analytics_error("Failed to get report history", e))?;
    Ok(success(reports))
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .analytics
        .report_by_id(id)
        .await
        .map_err(|e| state.analytics_error("Failed to get report", e))?
        .map(success)
        .ok_or(ApiError::NotFound("Report not found"))
}

async fn summarize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: SummarizeBody = json_body(&body)?;
    let (Some(start), Some(end)) = (body.start_date.as_deref(), body.end_date.as_deref()) else {
        return Err(ApiError::bad_request("start_date and end_date are required"));
    };
    let start = parse_timestamp(start, "start_date")?;
    let end = parse_range_end(end)?;

    let summary = state
        .analytics
        .summarize_articles(start.timestamp(), end.timestamp(), body.prompt.as_deref())
        .await
        .map_err(|e| state.analytics_error("Failed to summarize articles", e))?;
    Ok(success(json!({
        "summary": summary,
        "date_range": {
            "start": start.to_rfc3339(),
            "end": end.to_rfc3339(),
        },
    })))
}

async fn list_summaries(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state
        .analytics
        .list_summaries(params.limit.unwrap_or(20))
        .await
        .map_err(|e| state.analytics_error("Failed to get summaries", e))?;
    Ok(success(summaries))
}
