//! Ingestion pipeline: fetch → normalize → dedupe by link → categorize → store.
//!
//! Per-item failures are logged and skipped. Per-source failures are logged
//! and reported without stopping the other sources. Only failures that make
//! the whole run impossible (listing sources) propagate.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::categories::{CategoryNormalizer, StandardCategory};
use crate::feed::{fetch_feed, normalize_item, FetchError, NormalizedArticle, RetryPolicy};
use crate::storage::{Database, FeedSource};
use crate::util::source_name_from_url;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
    #[error("Feed source {0} not found")]
    SourceNotFound(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Error,
}

/// Outcome of fetching one source during [`Ingestor::fetch_all`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source_id: i64,
    pub source_name: String,
    pub new_articles: usize,
    pub status: SourceStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchAllReport {
    pub total_sources: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_new_articles: usize,
    pub results: Vec<SourceReport>,
}

/// Runs ingestion against the database with a shared HTTP client and
/// category normalizer.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    client: reqwest::Client,
    normalizer: Arc<CategoryNormalizer>,
    retry: RetryPolicy,
}

impl Ingestor {
    pub fn new(db: Database, client: reqwest::Client, normalizer: Arc<CategoryNormalizer>) -> Self {
        Self {
            db,
            client,
            normalizer,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the download retry policy (tests use millisecond backoffs).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch one feed and store the articles whose links are new.
    ///
    /// Returns the number of inserted articles. The source's `last_check` is
    /// updated whenever the download and parse succeeded.
    pub async fn fetch_and_save_articles(
        &self,
        source_id: i64,
        feed_url: &str,
    ) -> Result<usize, IngestError> {
        let items = match fetch_feed(&self.client, feed_url, &self.retry).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(feed = %feed_url, error = %e, "Failed to fetch feed");
                return Err(e.into());
            }
        };

        let mut saved = 0;
        for item in &items {
            let article = normalize_item(item);
            match self.save_if_new(source_id, &article).await {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(link = %article.link, error = %e, "Failed to save article");
                }
            }
        }

        self.db
            .mark_source_checked(source_id, chrono::Utc::now().timestamp())
            .await?;

        tracing::info!(
            feed = %feed_url,
            items = items.len(),
            new_articles = saved,
            "Fetched feed"
        );
        Ok(saved)
    }

    async fn save_if_new(&self, source_id: i64, article: &NormalizedArticle) -> anyhow::Result<bool> {
        if article.link.is_empty() {
            tracing::warn!(title = %article.title, "Skipping feed item without link");
            return Ok(false);
        }
        if self.db.article_exists(&article.link).await? {
            return Ok(false);
        }

        let category_ids = self.resolve_categories(&article.categories).await?;
        let inserted = self
            .db
            .insert_article(source_id, article, &category_ids)
            .await?;
        Ok(inserted.is_some())
    }

    /// Standard-category row ids for the item's labels, deduplicated.
    async fn resolve_categories(&self, labels: &[String]) -> anyhow::Result<Vec<i64>> {
        match labels {
            [] => return Ok(Vec::new()),
            [label] => {
                let category = self.normalizer.get_or_create_category(&self.db, label).await?;
                return Ok(vec![category.id]);
            }
            _ => {}
        }
        let mapped = self.normalizer.normalize_batch(labels).await;
        let names: BTreeSet<&'static str> =
            mapped.values().map(|c: &StandardCategory| c.name()).collect();

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            ids.push(self.db.upsert_category(name).await?.id);
        }
        Ok(ids)
    }

    /// Fetch one registered source by id.
    pub async fn check_source(&self, source_id: i64) -> Result<usize, IngestError> {
        let source = self
            .db
            .get_source(source_id)
            .await?
            .ok_or(IngestError::SourceNotFound(source_id))?;
        self.fetch_and_save_articles(source.id, &source.url).await
    }

    /// Fetch every active source one after another. Source failures are
    /// logged and skipped.
    pub async fn check_all_feeds(&self) -> Result<usize, IngestError> {
        let sources = self.db.active_sources().await?;
        tracing::info!(sources = sources.len(), "Checking feeds for new articles");

        let mut total = 0;
        for source in &sources {
            match self.fetch_and_save_articles(source.id, &source.url).await {
                Ok(n) => total += n,
                Err(e) => {
                    tracing::error!(source = %source.name, error = %e, "Failed to check feed");
                }
            }
        }
        Ok(total)
    }

    /// Like [`check_all_feeds`](Self::check_all_feeds) but returns a
    /// per-source report.
    pub async fn fetch_all(&self) -> Result<FetchAllReport, IngestError> {
        let sources = self.db.active_sources().await?;
        let mut results = Vec::with_capacity(sources.len());

        for FeedSource { id, name, url, .. } in sources {
            let report = match self.fetch_and_save_articles(id, &url).await {
                Ok(new_articles) => SourceReport {
                    source_id: id,
                    source_name: name,
                    new_articles,
                    status: SourceStatus::Success,
                    error: None,
                },
                Err(e) => SourceReport {
                    source_id: id,
                    source_name: name,
                    new_articles: 0,
                    status: SourceStatus::Error,
                    error: Some(e.to_string()),
                },
            };
            results.push(report);
        }

        let successful = results
            .iter()
            .filter(|r| r.status == SourceStatus::Success)
            .count();
        Ok(FetchAllReport {
            total_sources: results.len(),
            successful,
            failed: results.len() - successful,
            total_new_articles: results.iter().map(|r| r.new_articles).sum(),
            results,
        })
    }

    /// Register configured feed URLs that aren't known yet. Returns how many
    /// were added. The source name is the URL host without `www.`.
    pub async fn initialize_feed_sources(&self, urls: &[String]) -> usize {
        let mut added = 0;
        for url in urls {
            let url = url.trim();
            if url.is_empty() {
                continue;
            }
            match self.register_source(url).await {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "Failed to initialize feed source");
                }
            }
        }
        added
    }

    async fn register_source(&self, url: &str) -> anyhow::Result<bool> {
        if self.db.get_source_by_url(url).await?.is_some() {
            return Ok(false);
        }
        let name = source_name_from_url(url)
            .ok_or_else(|| anyhow::anyhow!("cannot derive a source name from {url}"))?;
        self.db.create_source(&name, url).await?;
        tracing::info!(name = %name, url = %url, "Added new feed source");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerator;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(items: &[(&str, &[&str])]) -> String {
        let body: String = items
            .iter()
            .map(|(link, cats)| {
                let cats: String = cats
                    .iter()
                    .map(|c| format!("<category>{c}</category>"))
                    .collect();
                format!(
                    "<item><title>Haber {link}</title><link>{link}</link>\
                     <pubDate>Mon, 06 Jan 2025 09:30:00 +0000</pubDate>{cats}</item>"
                )
            })
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#)
    }

    async fn ingestor(mock: MockGenerator) -> (Ingestor, Arc<MockGenerator>) {
        let db = Database::open(":memory:").await.unwrap();
        let mock = Arc::new(mock);
        let normalizer = Arc::new(CategoryNormalizer::new(mock.clone()));
        let ingestor = Ingestor::new(db, reqwest::Client::new(), normalizer).with_retry_policy(
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(5),
                timeout: Duration::from_secs(5),
            },
        );
        (ingestor, mock)
    }

    async fn serve(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_three_items_one_known_saves_two() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/rss",
            rss(&[
                ("https://h.example/1", &["SPOR"]),
                ("https://h.example/2", &[]),
                ("https://h.example/3", &["Ekonomi", "borsa"]),
            ]),
        )
        .await;

        let (ingestor, mock) = ingestor(MockGenerator::failing()).await;
        let url = format!("{}/rss", server.uri());
        let source = ingestor.database().create_source("h", &url).await.unwrap();

        // Pre-existing article with the same link as item 1
        ingestor
            .database()
            .insert_article(
                source.id,
                &normalize_item(&crate::feed::RawFeedItem {
                    title: Some("eski".into()),
                    link: Some("https://h.example/1".into()),
                    ..Default::default()
                }),
                &[],
            )
            .await
            .unwrap();

        let saved = ingestor.fetch_and_save_articles(source.id, &url).await.unwrap();
        assert_eq!(saved, 2);
        assert_eq!(mock.calls(), 0);

        let source = ingestor.database().get_source(source.id).await.unwrap().unwrap();
        assert!(source.last_check.is_some());

        let categories = ingestor.database().list_categories().await.unwrap();
        let ekonomi = categories.iter().find(|c| c.name == "Ekonomi").unwrap();
        assert_eq!(ekonomi.article_count, 1);
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_the_rest() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/rss",
            rss(&[
                ("https://h.example/1", &[]),
                ("https://h.example/2", &["Spor"]),
                ("https://h.example/3", &[]),
            ]),
        )
        .await;

        let (ingestor, _) = ingestor(MockGenerator::failing()).await;
        let url = format!("{}/rss", server.uri());
        let source = ingestor.database().create_source("h", &url).await.unwrap();

        // Only the categorized item needs the link table
        sqlx::query("DROP TABLE article_categories")
            .execute(&ingestor.database().pool)
            .await
            .unwrap();

        let saved = ingestor.fetch_and_save_articles(source.id, &url).await.unwrap();
        assert_eq!(saved, 2);

        let db = ingestor.database();
        assert!(db.article_exists("https://h.example/1").await.unwrap());
        assert!(!db.article_exists("https://h.example/2").await.unwrap());
        assert!(db.article_exists("https://h.example/3").await.unwrap());

        let source = db.get_source(source.id).await.unwrap().unwrap();
        assert!(source.last_check.is_some());
    }

    #[tokio::test]
    async fn test_second_run_adds_nothing() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/rss",
            rss(&[("https://h.example/1", &[]), ("https://h.example/2", &[])]),
        )
        .await;

        let (ingestor, _) = ingestor(MockGenerator::failing()).await;
        let url = format!("{}/rss", server.uri());
        let source = ingestor.database().create_source("h", &url).await.unwrap();

        assert_eq!(ingestor.fetch_and_save_articles(source.id, &url).await.unwrap(), 2);
        assert_eq!(ingestor.fetch_and_save_articles(source.id, &url).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_category_uses_ai() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/rss",
            rss(&[("https://h.example/1", &["Zeytinyağı Festivali"])]),
        )
        .await;

        let (ingestor, mock) = ingestor(MockGenerator::replying("Gıda")).await;
        let url = format!("{}/rss", server.uri());
        let source = ingestor.database().create_source("h", &url).await.unwrap();

        assert_eq!(ingestor.fetch_and_save_articles(source.id, &url).await.unwrap(), 1);
        assert_eq!(mock.calls(), 1);
        assert!(mock.prompts()[0].contains("Kategori: \"Zeytinyağı Festivali\""));
        let page = ingestor
            .database()
            .latest_articles(10)
            .await
            .unwrap();
        assert_eq!(page[0].categories, vec!["Gıda".to_string()]);
    }

    #[tokio::test]
    async fn test_several_unknown_categories_share_one_ai_call() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/rss",
            rss(&[(
                "https://h.example/1",
                &["Zeytinyağı Festivali", "Baklava Günleri", "SPOR"],
            )]),
        )
        .await;

        let (ingestor, mock) = ingestor(MockGenerator::replying(
            r#"{"Zeytinyağı Festivali": "Gıda", "Baklava Günleri": "Gıda"}"#,
        ))
        .await;
        let url = format!("{}/rss", server.uri());
        let source = ingestor.database().create_source("h", &url).await.unwrap();

        assert_eq!(ingestor.fetch_and_save_articles(source.id, &url).await.unwrap(), 1);
        assert_eq!(mock.calls(), 1);
        let page = ingestor
            .database()
            .latest_articles(10)
            .await
            .unwrap();
        let mut categories = page[0].categories.clone();
        categories.sort();
        assert_eq!(categories, vec!["Gıda".to_string(), "Spor".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failures() {
        let server = MockServer::start().await;
        serve(&server, "/ok", rss(&[("https://h.example/1", &[])])).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (ingestor, _) = ingestor(MockGenerator::failing()).await;
        let db = ingestor.database();
        db.create_source("bozuk", &format!("{}/missing", server.uri()))
            .await
            .unwrap();
        db.create_source("iyi", &format!("{}/ok", server.uri()))
            .await
            .unwrap();

        let report = ingestor.fetch_all().await.unwrap();
        assert_eq!(report.total_sources, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total_new_articles, 1);

        let failed = report
            .results
            .iter()
            .find(|r| r.status == SourceStatus::Error)
            .unwrap();
        assert_eq!(failed.source_name, "bozuk");
        assert!(failed.error.as_deref().unwrap().contains("404"));

        // check_all_feeds swallows the same failure
        assert_eq!(ingestor.check_all_feeds().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_source_not_found() {
        let (ingestor, _) = ingestor(MockGenerator::failing()).await;
        let err = ingestor.check_source(42).await.unwrap_err();
        assert!(matches!(err, IngestError::SourceNotFound(42)));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_last_check_unset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (ingestor, _) = ingestor(MockGenerator::failing()).await;
        let url = format!("{}/rss", server.uri());
        let source = ingestor.database().create_source("h", &url).await.unwrap();
        assert!(ingestor.fetch_and_save_articles(source.id, &url).await.is_err());
        let source = ingestor.database().get_source(source.id).await.unwrap().unwrap();
        assert!(source.last_check.is_none());
    }

    #[tokio::test]
    async fn test_initialize_feed_sources() {
        let (ingestor, _) = ingestor(MockGenerator::failing()).await;
        let urls = vec![
            "https://www.haberler.example/rss".to_string(),
            " ".to_string(),
            "not a url".to_string(),
            "https://www.haberler.example/rss".to_string(),
        ];
        assert_eq!(ingestor.initialize_feed_sources(&urls).await, 1);
        assert_eq!(ingestor.initialize_feed_sources(&urls).await, 0);

        let sources = ingestor.database().list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source.name, "haberler.example");
        assert!(sources[0].source.is_active);
    }
}
