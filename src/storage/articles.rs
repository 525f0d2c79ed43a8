use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

use super::schema::Database;
use super::types::{
    is_unique_violation, Article, ArticleDetail, ArticlePage, ArticleQuery, Pagination,
    Statistics,
};
use crate::feed::NormalizedArticle;
use crate::util::MAX_SEARCH_QUERY_LENGTH;

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Largest page size accepted by listings.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Cap for window queries feeding analytics (OOM protection).
const MAX_WINDOW_ARTICLES: i64 = 2000;

const ARTICLE_SELECT: &str = "SELECT a.id, a.source_id, a.title, a.description, a.content, \
     a.link, a.image_url, a.author, a.pub_date, a.guid, a.created_at, s.name AS source_name \
     FROM articles a JOIN feed_sources s ON s.id = a.source_id";

/// Newest first; items without a publish date sort by ingestion time.
const NEWEST_FIRST: &str = " ORDER BY COALESCE(a.pub_date, a.created_at) DESC, a.id DESC";

#[derive(sqlx::FromRow)]
struct ArticleJoinRow {
    #[sqlx(flatten)]
    article: Article,
    source_name: String,
}

/// Which end of a publish window analytics read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOrder {
    NewestFirst,
    OldestFirst,
}

/// `%term%` with LIKE wildcards in the term escaped by `\`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn validate_search(term: &str) -> Result<()> {
    if term.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        anyhow::bail!(
            "Search query exceeds maximum length of {} characters",
            MAX_SEARCH_QUERY_LENGTH
        );
    }
    Ok(())
}

fn push_text_match(builder: &mut QueryBuilder<'_, Sqlite>, pattern: &str) {
    builder
        .push(" AND (a.title LIKE ")
        .push_bind(pattern.to_string())
        .push(" ESCAPE '\\' OR a.description LIKE ")
        .push_bind(pattern.to_string())
        .push(" ESCAPE '\\' OR a.content LIKE ")
        .push_bind(pattern.to_string())
        .push(" ESCAPE '\\')");
}

/// Appends the `ArticleQuery` filters. Assumes a preceding `WHERE 1 = 1`.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ArticleQuery) {
    if let Some(source_id) = query.source_id {
        builder.push(" AND a.source_id = ").push_bind(source_id);
    }
    if !query.categories.is_empty() {
        builder.push(
            " AND a.id IN (SELECT ac.article_id FROM article_categories ac \
             JOIN categories c ON c.id = ac.category_id WHERE c.name IN (",
        );
        let mut names = builder.separated(", ");
        for name in &query.categories {
            names.push_bind(name.clone());
        }
        names.push_unseparated("))");
    }
    if let Some(start) = query.start {
        builder.push(" AND a.pub_date >= ").push_bind(start);
    }
    if let Some(end) = query.end {
        builder.push(" AND a.pub_date <= ").push_bind(end);
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        push_text_match(builder, &like_pattern(term));
    }
}

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    pub async fn article_exists(&self, link: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Store an article with its category links in one transaction.
    ///
    /// Returns `Ok(None)` when an article with the same link already exists,
    /// including when a concurrent run inserted it after the caller's
    /// existence check.
    pub async fn insert_article(
        &self,
        source_id: i64,
        article: &NormalizedArticle,
        category_ids: &[i64],
    ) -> Result<Option<i64>> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(i64,)> = match sqlx::query_as(
            r#"
                INSERT INTO articles
                    (source_id, title, description, content, link, image_url, author, pub_date, guid, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(link) DO NOTHING
                RETURNING id
            "#,
        )
        .bind(source_id)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(&article.link)
        .bind(&article.image_url)
        .bind(&article.author)
        .bind(article.pub_date.map(|d| d.timestamp()))
        .bind(&article.guid)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => None,
            Err(e) => return Err(e.into()),
        };

        let Some((article_id,)) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };

        if !category_ids.is_empty() {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO article_categories (article_id, category_id) ");
            builder.push_values(category_ids, |mut b, category_id| {
                b.push_bind(article_id).push_bind(*category_id);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(Some(article_id))
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<ArticleDetail>> {
        let row: Option<ArticleJoinRow> =
            sqlx::query_as(&format!("{ARTICLE_SELECT} WHERE a.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(self.with_categories(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Filtered, paginated listing, newest first.
    pub async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage> {
        if let Some(term) = &query.search {
            validate_search(term)?;
        }
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles a WHERE 1 = 1");
        push_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(ARTICLE_SELECT);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, query);
        select.push(NEWEST_FIRST);
        select
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1).saturating_mul(limit));
        let rows: Vec<ArticleJoinRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(ArticlePage {
            articles: self.with_categories(rows).await?,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: (total + limit - 1) / limit,
            },
        })
    }

    pub async fn latest_articles(&self, limit: i64) -> Result<Vec<ArticleDetail>> {
        let rows: Vec<ArticleJoinRow> =
            sqlx::query_as(&format!("{ARTICLE_SELECT}{NEWEST_FIRST} LIMIT ?"))
                .bind(limit.clamp(1, MAX_PAGE_SIZE))
                .fetch_all(&self.pool)
                .await?;
        self.with_categories(rows).await
    }

    /// Articles ingested since `since` (Unix seconds), newest first.
    pub async fn trending_articles(&self, since: i64, limit: i64) -> Result<Vec<ArticleDetail>> {
        let rows: Vec<ArticleJoinRow> = sqlx::query_as(&format!(
            "{ARTICLE_SELECT} WHERE a.created_at >= ?{NEWEST_FIRST} LIMIT ?"
        ))
        .bind(since)
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .fetch_all(&self.pool)
        .await?;
        self.with_categories(rows).await
    }

    /// Case-insensitive substring search over title, description and content.
    ///
    /// SQLite `LIKE` folds ASCII letters only, so `İ`/`ı` must match exactly.
    pub async fn search_articles(&self, term: &str, limit: i64) -> Result<Vec<ArticleDetail>> {
        let term = term.trim();
        validate_search(term)?;
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(ARTICLE_SELECT);
        builder.push(" WHERE 1 = 1");
        push_text_match(&mut builder, &like_pattern(term));
        builder.push(NEWEST_FIRST);
        builder.push(" LIMIT ").push_bind(limit.clamp(1, MAX_PAGE_SIZE));
        let rows: Vec<ArticleJoinRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        self.with_categories(rows).await
    }

    /// Articles published in `[start, end]`, optionally restricted to those
    /// whose title or content mention `topic`.
    pub async fn articles_in_window(
        &self,
        start: i64,
        end: i64,
        order: WindowOrder,
        limit: i64,
        topic: Option<&str>,
    ) -> Result<Vec<ArticleDetail>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(ARTICLE_SELECT);
        builder
            .push(" WHERE a.pub_date >= ")
            .push_bind(start)
            .push(" AND a.pub_date <= ")
            .push_bind(end);
        if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(topic);
            builder
                .push(" AND (a.title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR a.content LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        builder.push(match order {
            WindowOrder::NewestFirst => " ORDER BY a.pub_date DESC, a.id DESC",
            WindowOrder::OldestFirst => " ORDER BY a.pub_date ASC, a.id ASC",
        });
        builder
            .push(" LIMIT ")
            .push_bind(limit.clamp(1, MAX_WINDOW_ARTICLES));
        let rows: Vec<ArticleJoinRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        self.with_categories(rows).await
    }

    /// The `limit` most recently published articles, without category lookups.
    pub async fn recent_articles(&self, limit: i64) -> Result<Vec<Article>> {
        let rows: Vec<ArticleJoinRow> =
            sqlx::query_as(&format!("{ARTICLE_SELECT}{NEWEST_FIRST} LIMIT ?"))
                .bind(limit.clamp(1, MAX_WINDOW_ARTICLES))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.article).collect())
    }

    pub async fn statistics(&self, now: i64) -> Result<Statistics> {
        let (total_articles, articles_last_24h, articles_last_7_days): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0)
                FROM articles
            "#,
            )
            .bind(now - 24 * 3600)
            .bind(now - 7 * 24 * 3600)
            .fetch_one(&self.pool)
            .await?;
        let (total_sources,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feed_sources")
            .fetch_one(&self.pool)
            .await?;
        let (total_categories,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;

        Ok(Statistics {
            total_articles,
            total_sources,
            total_categories,
            articles_last_24h,
            articles_last_7_days,
        })
    }

    /// Attach category names to joined rows with one extra query.
    async fn with_categories(&self, rows: Vec<ArticleJoinRow>) -> Result<Vec<ArticleDetail>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT ac.article_id, c.name FROM article_categories ac \
             JOIN categories c ON c.id = ac.category_id WHERE ac.article_id IN (",
        );
        let mut ids = builder.separated(", ");
        for row in &rows {
            ids.push_bind(row.article.id);
        }
        ids.push_unseparated(") ORDER BY c.name");
        let pairs: Vec<(i64, String)> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut by_article: HashMap<i64, Vec<String>> = HashMap::new();
        for (article_id, name) in pairs {
            by_article.entry(article_id).or_default().push(name);
        }

        Ok(rows
            .into_iter()
            .map(|row| ArticleDetail {
                categories: by_article.remove(&row.article.id).unwrap_or_default(),
                source_name: row.source_name,
                article: row.article,
            })
            .collect())
    }
}
