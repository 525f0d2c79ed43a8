//! AI analytics over stored articles.
//!
//! - **Word frequency**: local tokenizing and counting over the latest
//!   articles, persisted as a snapshot
//! - **Reports**: daily/weekly/monthly AI reports with a sentiment tally
//! - **Summaries**: free-form AI summaries of a publish window
//!
//! Empty inputs never produce a stored record. AI failures propagate to the
//! caller (scheduler job or HTTP handler).

mod report;
mod word_frequency;

pub use report::{extract_sentiment, InvalidReportKind, ReportKind, ReportWindow, Sentiment};
pub use word_frequency::{count_words, tokenize, MIN_WORD_CHARS, TOP_WORDS};

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::ai::{AiError, TextGenerator};
use crate::storage::{
    Database, NewReport, Report, ReportMeta, Summary, WindowOrder, WordFrequencySnapshot,
};

/// Articles analysed when no count is given.
pub const DEFAULT_WORD_FREQUENCY_ARTICLES: i64 = 10;

/// Returned by [`Analytics::summarize_articles`] for an empty window.
pub const NO_ARTICLES_MESSAGE: &str = "Belirtilen tarih aralığında haber bulunamadı.";

const DEFAULT_SUMMARY_PROMPT: &str = "Aşağıdaki haberleri Türkçe olarak özetle. Ana temaları, \
     önemli olayları ve trendleri vurgula. Özet net, anlaşılır ve bilgilendirici olmalı:";

/// Articles a summary may cover.
const MAX_SUMMARY_ARTICLES: i64 = 200;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
    #[error("Invalid window: start {start} is after end {end}")]
    InvalidWindow { start: i64, end: i64 },
}

/// Analytics generators bound to a database and an AI backend.
#[derive(Clone)]
pub struct Analytics {
    db: Database,
    generator: Arc<dyn TextGenerator>,
    topic: Option<String>,
}

impl Analytics {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            db,
            generator,
            topic: None,
        }
    }

    /// Restrict reports to articles mentioning `topic` in title or content.
    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic.filter(|t| !t.trim().is_empty());
        self
    }

    // ========================================================================
    // Word Frequency
    // ========================================================================

    /// Rank the words of the `article_limit` most recently published
    /// articles and store the top [`TOP_WORDS`].
    ///
    /// Returns `None` without storing anything when there are no articles.
    pub async fn generate_word_frequency(
        &self,
        article_limit: i64,
    ) -> Result<Option<WordFrequencySnapshot>, AnalyticsError> {
        let articles = self.db.recent_articles(article_limit.max(1)).await?;
        if articles.is_empty() {
            tracing::info!("No articles found for word frequency analysis");
            return Ok(None);
        }

        let texts: Vec<String> = articles
            .iter()
            .map(|a| format!("{}\n{}", a.title, a.content))
            .collect();
        let words = count_words(texts.iter().map(String::as_str), TOP_WORDS);
        let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();

        let snapshot = self.db.insert_word_frequency(&words, &ids).await?;
        tracing::info!(
            articles = ids.len(),
            words = words.len(),
            "Word frequency analysis completed"
        );
        Ok(Some(snapshot))
    }

    pub async fn latest_word_frequency(
        &self,
    ) -> Result<Option<WordFrequencySnapshot>, AnalyticsError> {
        Ok(self.db.latest_word_frequency().await?)
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Generate and store a report for the period ending on `date`.
    ///
    /// Returns `None` without calling the AI service when no article falls
    /// in the window.
    pub async fn generate_report(
        &self,
        kind: ReportKind,
        date: NaiveDate,
    ) -> Result<Option<Report>, AnalyticsError> {
        let window = kind.window(date);
        let articles = self
            .db
            .articles_in_window(
                window.start,
                window.end,
                kind.order(),
                kind.article_cap(),
                self.topic.as_deref(),
            )
            .await?;

        if articles.is_empty() {
            tracing::info!(kind = %kind, date = %date, "No articles found for report");
            return Ok(None);
        }

        let prompt = report::report_prompt(kind, &articles);
        let text = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Failed to generate report");
                return Err(e.into());
            }
        };

        let sentiment = extract_sentiment(&text);
        if sentiment.is_none() {
            tracing::debug!(kind = %kind, "Report reply carried no sentiment tally");
        }

        let stored = self
            .db
            .insert_report(&NewReport {
                kind: kind.as_str().to_string(),
                start_date: window.start,
                end_date: window.end,
                article_ids: articles.iter().map(|a| a.article.id).collect(),
                analysis: report::report_analysis(window, &articles, sentiment),
                summary: text,
            })
            .await?;

        tracing::info!(
            kind = %kind,
            articles = stored.article_count,
            report_id = stored.id,
            "Report generated"
        );
        Ok(Some(stored))
    }

    pub async fn latest_report(&self, kind: ReportKind) -> Result<Option<Report>, AnalyticsError> {
        Ok(self.db.latest_report(kind.as_str()).await?)
    }

    pub async fn report_history(
        &self,
        kind: Option<ReportKind>,
        limit: i64,
    ) -> Result<Vec<ReportMeta>, AnalyticsError> {
        Ok(self
            .db
            .report_history(kind.map(ReportKind::as_str), limit)
            .await?)
    }

    pub async fn report_by_id(&self, id: i64) -> Result<Option<Report>, AnalyticsError> {
        Ok(self.db.get_report(id).await?)
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    /// AI summary of the articles published in `[start, end]`.
    ///
    /// An empty window yields [`NO_ARTICLES_MESSAGE`] and stores nothing.
    pub async fn summarize_articles(
        &self,
        start: i64,
        end: i64,
        prompt: Option<&str>,
    ) -> Result<String, AnalyticsError> {
        if start > end {
            return Err(AnalyticsError::InvalidWindow { start, end });
        }
        let articles = self
            .db
            .articles_in_window(start, end, WindowOrder::NewestFirst, MAX_SUMMARY_ARTICLES, None)
            .await?;
        if articles.is_empty() {
            return Ok(NO_ARTICLES_MESSAGE.to_string());
        }

        let custom = prompt.map(str::trim).filter(|p| !p.is_empty());
        let full_prompt = format!(
            "{}\n\n{}",
            custom.unwrap_or(DEFAULT_SUMMARY_PROMPT),
            report::render_articles(&articles)
        );
        let content = self.generator.generate(&full_prompt).await?;

        let ids: Vec<i64> = articles.iter().map(|a| a.article.id).collect();
        self.db
            .insert_summary(&content, custom, &ids, start, end)
            .await?;
        tracing::info!(articles = ids.len(), "Generated summary");
        Ok(content)
    }

    pub async fn list_summaries(&self, limit: i64) -> Result<Vec<Summary>, AnalyticsError> {
        Ok(self.db.list_summaries(limit).await?)
    }

    /// Delete persisted system logs older than `retention_days`.
    pub async fn cleanup_logs(&self, retention_days: i64) -> Result<u64, AnalyticsError> {
        let cutoff = chrono::Utc::now().timestamp() - retention_days * 86_400;
        let removed = self.db.delete_logs_before(cutoff).await?;
        tracing::info!(removed = removed, "Old system logs cleaned up");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerator;
    use crate::feed::NormalizedArticle;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    async fn seed(db: &Database, link: &str, title: &str, content: &str, at: &str) -> i64 {
        let source = match db.get_source_by_url("https://kaynak.example/rss").await.unwrap() {
            Some(s) => s,
            None => db
                .create_source("kaynak", "https://kaynak.example/rss")
                .await
                .unwrap(),
        };
        let pub_date = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc();
        let article = NormalizedArticle {
            title: title.into(),
            description: String::new(),
            content: content.into(),
            link: link.into(),
            image_url: None,
            author: None,
            pub_date: Some(pub_date),
            guid: link.into(),
            categories: Vec::new(),
        };
        db.insert_article(source.id, &article, &[]).await.unwrap().unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_word_frequency_empty_stores_nothing() {
        let db = Database::open(":memory:").await.unwrap();
        let analytics = Analytics::new(db.clone(), Arc::new(MockGenerator::failing()));
        assert!(analytics.generate_word_frequency(10).await.unwrap().is_none());
        assert!(analytics.latest_word_frequency().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_word_frequency_snapshot() {
        let db = Database::open(":memory:").await.unwrap();
        seed(&db, "https://h/1", "Belediye meclisi", "Belediye bütçesi", "2025-01-06 09:00:00").await;
        seed(&db, "https://h/2", "Stadyum", "stadyum belediye", "2025-01-05 09:00:00").await;
        let mock = Arc::new(MockGenerator::failing());
        let analytics = Analytics::new(db, mock.clone());

        let snapshot = analytics.generate_word_frequency(10).await.unwrap().unwrap();
        assert_eq!(snapshot.article_count, 2);
        assert_eq!(snapshot.words[0].word, "belediye");
        assert_eq!(snapshot.words[0].count, 3);
        assert_eq!(snapshot.words[1].word, "stadyum");
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_daily_report_with_no_articles_keeps_previous() {
        let db = Database::open(":memory:").await.unwrap();
        seed(&db, "https://h/1", "Haber", "içerik", "2025-01-06 09:00:00").await;
        let mock = Arc::new(MockGenerator::replying("Rapor"));
        let analytics = Analytics::new(db, mock.clone());

        let first = analytics
            .generate_report(ReportKind::Daily, day("2025-01-06"))
            .await
            .unwrap()
            .unwrap();

        let none = analytics
            .generate_report(ReportKind::Daily, day("2025-01-07"))
            .await
            .unwrap();
        assert!(none.is_none());
        assert_eq!(mock.calls(), 1);

        let latest = analytics.latest_report(ReportKind::Daily).await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
    }

    #[tokio::test]
    async fn test_daily_report_excludes_other_days() {
        let db = Database::open(":memory:").await.unwrap();
        let inside = seed(&db, "https://h/1", "Sabah", "a", "2025-01-06 00:00:00").await;
        let late = seed(&db, "https://h/2", "Gece", "b", "2025-01-06 23:59:59").await;
        seed(&db, "https://h/3", "Dün", "c", "2025-01-05 23:59:59").await;
        seed(&db, "https://h/4", "Yarın", "d", "2025-01-07 00:00:00").await;

        let reply = "Özet metni\n{\"positive\": 1, \"negative\": 0, \"nötr\": 1}";
        let analytics = Analytics::new(db, Arc::new(MockGenerator::replying(reply)));
        let report = analytics
            .generate_report(ReportKind::Daily, day("2025-01-06"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.kind, "daily");
        assert_eq!(report.article_ids, vec![late, inside]);
        assert_eq!(report.summary, reply);
        assert_eq!(report.analysis["total_articles"], 2);
        assert_eq!(report.analysis["sources"]["kaynak"], 2);
        assert_eq!(report.analysis["sentiment"]["neutral"], 1);
    }

    #[tokio::test]
    async fn test_report_topic_filter() {
        let db = Database::open(":memory:").await.unwrap();
        seed(&db, "https://h/1", "Gaziantep'te yeni park", "", "2025-01-06 10:00:00").await;
        seed(&db, "https://h/2", "Borsa günü", "İstanbul", "2025-01-06 11:00:00").await;
        let mock = Arc::new(MockGenerator::replying("Rapor"));
        let analytics = Analytics::new(db, mock.clone()).with_topic(Some("gaziantep".into()));

        let report = analytics
            .generate_report(ReportKind::Weekly, day("2025-01-06"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.article_count, 1);
        assert!(mock.prompts()[0].contains("Gaziantep'te yeni park"));
        assert!(!mock.prompts()[0].contains("Borsa"));
    }

    #[tokio::test]
    async fn test_report_ai_failure_propagates() {
        let db = Database::open(":memory:").await.unwrap();
        seed(&db, "https://h/1", "Haber", "x", "2025-01-06 10:00:00").await;
        let analytics = Analytics::new(db, Arc::new(MockGenerator::failing()));

        let err = analytics
            .generate_report(ReportKind::Monthly, day("2025-01-06"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Ai(AiError::EmptyResponse)));
        assert!(analytics
            .report_history(Some(ReportKind::Monthly), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_summarize_articles() {
        let db = Database::open(":memory:").await.unwrap();
        let id = seed(&db, "https://h/1", "Haber", "x", "2025-01-06 10:00:00").await;
        let mock = Arc::new(MockGenerator::replying("Kısa özet"));
        let analytics = Analytics::new(db, mock.clone());

        let empty = analytics.summarize_articles(0, 10, None).await.unwrap();
        assert_eq!(empty, NO_ARTICLES_MESSAGE);
        assert_eq!(mock.calls(), 0);

        let start = 1_736_121_600;
        let text = analytics
            .summarize_articles(start, start + 86_399, Some("Tek cümle"))
            .await
            .unwrap();
        assert_eq!(text, "Kısa özet");
        assert!(mock.prompts()[0].starts_with("Tek cümle"));

        let summaries = analytics.list_summaries(10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].article_ids, vec![id]);

        assert!(matches!(
            analytics.summarize_articles(10, 0, None).await,
            Err(AnalyticsError::InvalidWindow { .. })
        ));
    }
}
