use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{is_unique_violation, FeedSource, SourceExists, SourceUpdate, SourceWithCount};

const SOURCE_COLUMNS: &str = "id, name, url, is_active, last_check, created_at";

impl Database {
    // ========================================================================
    // Feed Source Operations
    // ========================================================================

    /// Register a new active source.
    ///
    /// Fails with [`SourceExists`] (inside the `anyhow` chain) when the URL is
    /// already registered.
    pub async fn create_source(&self, name: &str, url: &str) -> Result<FeedSource> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query_as::<_, FeedSource>(&format!(
            "INSERT INTO feed_sources (name, url, is_active, created_at) VALUES (?, ?, 1, ?) \
             RETURNING {SOURCE_COLUMNS}"
        ))
        .bind(name)
        .bind(url)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(source) => Ok(source),
            Err(e) if is_unique_violation(&e) => Err(SourceExists(url.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_source(&self, id: i64) -> Result<Option<FeedSource>> {
        let source = sqlx::query_as::<_, FeedSource>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM feed_sources WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    pub async fn get_source_by_url(&self, url: &str) -> Result<Option<FeedSource>> {
        let source = sqlx::query_as::<_, FeedSource>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM feed_sources WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    /// All sources with their stored article counts, ordered by name.
    pub async fn list_sources(&self) -> Result<Vec<SourceWithCount>> {
        let rows: Vec<(i64, String, String, bool, Option<i64>, i64, i64)> = sqlx::query_as(
            r#"
                SELECT
                    s.id, s.name, s.url, s.is_active, s.last_check, s.created_at,
                    COUNT(a.id) as article_count
                FROM feed_sources s
                LEFT JOIN articles a ON a.source_id = s.id
                GROUP BY s.id
                ORDER BY s.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, url, is_active, last_check, created_at, article_count)| SourceWithCount {
                    source: FeedSource {
                        id,
                        name,
                        url,
                        is_active,
                        last_check,
                        created_at,
                    },
                    article_count,
                },
            )
            .collect())
    }

    /// Sources that take part in scheduled checks.
    pub async fn active_sources(&self) -> Result<Vec<FeedSource>> {
        let sources = sqlx::query_as::<_, FeedSource>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM feed_sources WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    /// Apply a partial update. Returns `None` when the source doesn't exist.
    pub async fn update_source(&self, id: i64, update: &SourceUpdate) -> Result<Option<FeedSource>> {
        if update.name.is_none() && update.url.is_none() && update.is_active.is_none() {
            return self.get_source(id).await;
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE feed_sources SET ");
        let mut set = builder.separated(", ");
        if let Some(name) = &update.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(url) = &update.url {
            set.push("url = ").push_bind_unseparated(url);
        }
        if let Some(is_active) = update.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
        }
        builder.push(" WHERE id = ").push_bind(id);

        match builder.build().execute(&self.pool).await {
            Ok(done) if done.rows_affected() == 0 => Ok(None),
            Ok(_) => self.get_source(id).await,
            Err(e) if is_unique_violation(&e) => {
                Err(SourceExists(update.url.clone().unwrap_or_default()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a source and, through the foreign key, its articles.
    pub async fn delete_source(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM feed_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Record that a fetch of this source just completed.
    pub async fn mark_source_checked(&self, id: i64, at: i64) -> Result<()> {
        sqlx::query("UPDATE feed_sources SET last_check = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_source() {
        let db = test_db().await;
        let source = db
            .create_source("haber.example.com", "https://haber.example.com/rss")
            .await
            .unwrap();
        assert!(source.is_active);
        assert!(source.last_check.is_none());

        let fetched = db.get_source(source.id).await.unwrap().unwrap();
        assert_eq!(fetched.url, "https://haber.example.com/rss");
        let by_url = db
            .get_source_by_url("https://haber.example.com/rss")
            .await
            .unwrap();
        assert_eq!(by_url.map(|s| s.id), Some(source.id));
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let db = test_db().await;
        db.create_source("a", "https://a.example/rss").await.unwrap();
        let err = db
            .create_source("b", "https://a.example/rss")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<SourceExists>().is_some());
    }

    #[tokio::test]
    async fn test_update_source_partial() {
        let db = test_db().await;
        let source = db.create_source("a", "https://a.example/rss").await.unwrap();

        let updated = db
            .update_source(
                source.id,
                &SourceUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.name, "a");

        assert!(db.active_sources().await.unwrap().is_empty());
        assert!(db
            .update_source(999, &SourceUpdate {
                name: Some("x".into()),
                ..Default::default()
            })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_to_taken_url_rejected() {
        let db = test_db().await;
        db.create_source("a", "https://a.example/rss").await.unwrap();
        let b = db.create_source("b", "https://b.example/rss").await.unwrap();
        let err = db
            .update_source(
                b.id,
                &SourceUpdate {
                    url: Some("https://a.example/rss".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<SourceExists>().is_some());
    }

    #[tokio::test]
    async fn test_list_sources_and_delete() {
        let db = test_db().await;
        let b = db.create_source("b", "https://b.example/rss").await.unwrap();
        db.create_source("a", "https://a.example/rss").await.unwrap();

        let listed = db.list_sources().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].source.name, "a");
        assert_eq!(listed[0].article_count, 0);

        assert!(db.delete_source(b.id).await.unwrap());
        assert!(!db.delete_source(b.id).await.unwrap());
        assert_eq!(db.list_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_source_checked() {
        let db = test_db().await;
        let source = db.create_source("a", "https://a.example/rss").await.unwrap();
        db.mark_source_checked(source.id, 1_700_000_000).await.unwrap();
        let fetched = db.get_source(source.id).await.unwrap().unwrap();
        assert_eq!(fetched.last_check, Some(1_700_000_000));
    }
}
