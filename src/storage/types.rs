use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

/// Returned by source creation/update when another source already uses the URL.
#[derive(Debug, Error)]
#[error("A feed source with URL {0} already exists")]
pub struct SourceExists(pub String);

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ============================================================================
// Feed Sources
// ============================================================================

/// A registered RSS/Atom endpoint.
///
/// Timestamps are Unix seconds.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeedSource {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub is_active: bool,
    pub last_check: Option<i64>,
    pub created_at: i64,
}

/// Feed source plus the number of stored articles, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SourceWithCount {
    #[serde(flatten)]
    pub source: FeedSource,
    pub article_count: i64,
}

/// Partial update for a feed source. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
}

// ============================================================================
// Articles
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub pub_date: Option<i64>,
    pub guid: Option<String>,
    pub created_at: i64,
}

/// Article with its source name and category names.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: Article,
    pub source_name: String,
    pub categories: Vec<String>,
}

/// Filters for [`Database::list_articles`](super::Database::list_articles).
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub page: i64,
    pub limit: i64,
    pub source_id: Option<i64>,
    /// Match articles in any of these categories (exact names).
    pub categories: Vec<String>,
    /// Publish window, inclusive, Unix seconds.
    pub start: Option<i64>,
    pub end: Option<i64>,
    /// Case-insensitive substring over title, description and content.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticlePage {
    pub articles: Vec<ArticleDetail>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statistics {
    pub total_articles: i64,
    pub total_sources: i64,
    pub total_categories: i64,
    pub articles_last_24h: i64,
    pub articles_last_7_days: i64,
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithCount {
    pub id: i64,
    pub name: String,
    pub article_count: i64,
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: i64,
}

/// One persisted word-frequency analysis.
#[derive(Debug, Clone, Serialize)]
pub struct WordFrequencySnapshot {
    pub id: i64,
    pub words: Vec<WordCount>,
    pub article_ids: Vec<i64>,
    pub article_count: i64,
    pub created_at: i64,
}

/// Fields of a report before it has an id.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub kind: String,
    pub start_date: i64,
    pub end_date: i64,
    pub article_ids: Vec<i64>,
    pub summary: String,
    pub analysis: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: i64,
    pub kind: String,
    pub start_date: i64,
    pub end_date: i64,
    pub article_count: i64,
    pub article_ids: Vec<i64>,
    pub summary: String,
    pub analysis: serde_json::Value,
    pub created_at: i64,
}

/// Report listing entry without the (large) summary text.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReportMeta {
    pub id: i64,
    pub kind: String,
    pub start_date: i64,
    pub end_date: i64,
    pub article_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub id: i64,
    pub content: String,
    pub prompt: Option<String>,
    pub article_ids: Vec<i64>,
    pub start_date: i64,
    pub end_date: i64,
    pub created_at: i64,
}

// ============================================================================
// System Logs
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SystemLog {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub metadata: Option<String>,
    pub created_at: i64,
}

// ============================================================================
// Helper Types
// ============================================================================

/// Raw `reports` row; JSON columns are decoded by `into_report`.
pub(crate) type ReportRow = (i64, String, i64, i64, i64, String, String, String, i64);

pub(crate) fn decode_ids(json: &str) -> Vec<i64> {
    serde_json::from_str(json).unwrap_or_default()
}

pub(crate) fn into_report(row: ReportRow) -> Report {
    let (id, kind, start_date, end_date, article_count, article_ids, summary, analysis, created_at) =
        row;
    Report {
        id,
        kind,
        start_date,
        end_date,
        article_count,
        article_ids: decode_ids(&article_ids),
        summary,
        analysis: serde_json::from_str(&analysis).unwrap_or(serde_json::Value::Null),
        created_at,
    }
}
