use anyhow::Result;

use super::schema::Database;
use super::types::{
    decode_ids, into_report, NewReport, Report, ReportMeta, ReportRow, Summary, WordCount,
    WordFrequencySnapshot,
};

const REPORT_COLUMNS: &str =
    "id, kind, start_date, end_date, article_count, article_ids, summary, analysis, created_at";

impl Database {
    // ========================================================================
    // Word Frequency Snapshots
    // ========================================================================

    pub async fn insert_word_frequency(
        &self,
        words: &[WordCount],
        article_ids: &[i64],
    ) -> Result<WordFrequencySnapshot> {
        let now = chrono::Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO word_frequencies (words, article_ids, article_count, created_at) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(serde_json::to_string(words)?)
        .bind(serde_json::to_string(article_ids)?)
        .bind(article_ids.len() as i64)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(WordFrequencySnapshot {
            id,
            words: words.to_vec(),
            article_ids: article_ids.to_vec(),
            article_count: article_ids.len() as i64,
            created_at: now,
        })
    }

    pub async fn latest_word_frequency(&self) -> Result<Option<WordFrequencySnapshot>> {
        let row: Option<(i64, String, String, i64, i64)> = sqlx::query_as(
            "SELECT id, words, article_ids, article_count, created_at \
             FROM word_frequencies ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, words, article_ids, article_count, created_at)| WordFrequencySnapshot {
                id,
                words: serde_json::from_str(&words).unwrap_or_default(),
                article_ids: decode_ids(&article_ids),
                article_count,
                created_at,
            },
        ))
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub async fn insert_report(&self, report: &NewReport) -> Result<Report> {
        let now = chrono::Utc::now().timestamp();
        let row: ReportRow = sqlx::query_as(&format!(
            "INSERT INTO reports \
             (kind, start_date, end_date, article_count, article_ids, summary, analysis, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {REPORT_COLUMNS}"
        ))
        .bind(&report.kind)
        .bind(report.start_date)
        .bind(report.end_date)
        .bind(report.article_ids.len() as i64)
        .bind(serde_json::to_string(&report.article_ids)?)
        .bind(&report.summary)
        .bind(serde_json::to_string(&report.analysis)?)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(into_report(row))
    }

    pub async fn latest_report(&self, kind: &str) -> Result<Option<Report>> {
        let row: Option<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE kind = ? \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_report))
    }

    pub async fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let row: Option<ReportRow> =
            sqlx::query_as(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(into_report))
    }

    /// Newest reports first, optionally of one kind, without summary text.
    pub async fn report_history(&self, kind: Option<&str>, limit: i64) -> Result<Vec<ReportMeta>> {
        let reports = sqlx::query_as::<_, ReportMeta>(
            "SELECT id, kind, start_date, end_date, article_count, created_at FROM reports \
             WHERE (?1 IS NULL OR kind = ?1) ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .bind(kind)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    pub async fn insert_summary(
        &self,
        content: &str,
        prompt: Option<&str>,
        article_ids: &[i64],
        start_date: i64,
        end_date: i64,
    ) -> Result<Summary> {
        let now = chrono::Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO summaries (content, prompt, article_ids, start_date, end_date, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(content)
        .bind(prompt)
        .bind(serde_json::to_string(article_ids)?)
        .bind(start_date)
        .bind(end_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Summary {
            id,
            content: content.to_string(),
            prompt: prompt.map(str::to_string),
            article_ids: article_ids.to_vec(),
            start_date,
            end_date,
            created_at: now,
        })
    }

    pub async fn list_summaries(&self, limit: i64) -> Result<Vec<Summary>> {
        let rows: Vec<(i64, String, Option<String>, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, content, prompt, article_ids, start_date, end_date, created_at \
             FROM summaries ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, content, prompt, article_ids, start_date, end_date, created_at)| Summary {
                    id,
                    content,
                    prompt,
                    article_ids: decode_ids(&article_ids),
                    start_date,
                    end_date,
                    created_at,
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(kind: &str, summary: &str) -> NewReport {
        NewReport {
            kind: kind.to_string(),
            start_date: 0,
            end_date: 86_399,
            article_ids: vec![3, 1, 2],
            summary: summary.to_string(),
            analysis: serde_json::json!({"total_articles": 3}),
        }
    }

    #[tokio::test]
    async fn test_word_frequency_round_trip() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(db.latest_word_frequency().await.unwrap().is_none());

        let words = vec![
            WordCount {
                word: "ekonomi".into(),
                count: 4,
            },
            WordCount {
                word: "belediye".into(),
                count: 2,
            },
        ];
        db.insert_word_frequency(&words[..1], &[1]).await.unwrap();
        let second = db.insert_word_frequency(&words, &[1, 2]).await.unwrap();

        let latest = db.latest_word_frequency().await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.words, words);
        assert_eq!(latest.article_ids, vec![1, 2]);
        assert_eq!(latest.article_count, 2);
    }

    #[tokio::test]
    async fn test_reports_keep_history_per_kind() {
        let db = Database::open(":memory:").await.unwrap();
        let first = db.insert_report(&report("daily", "ilk")).await.unwrap();
        db.insert_report(&report("weekly", "haftalık")).await.unwrap();
        let second = db.insert_report(&report("daily", "ikinci")).await.unwrap();

        let latest = db.latest_report("daily").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.summary, "ikinci");
        assert_eq!(latest.article_ids, vec![3, 1, 2]);
        assert_eq!(latest.article_count, 3);
        assert_eq!(latest.analysis["total_articles"], 3);

        let history = db.report_history(Some("daily"), 10).await.unwrap();
        let ids: Vec<i64> = history.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(db.report_history(None, 10).await.unwrap().len(), 3);

        assert_eq!(db.get_report(first.id).await.unwrap().unwrap().summary, "ilk");
        assert!(db.latest_report("monthly").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_summaries_listing() {
        let db = Database::open(":memory:").await.unwrap();
        db.insert_summary("özet", Some("kısa tut"), &[5, 6], 0, 10)
            .await
            .unwrap();
        let listed = db.list_summaries(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].article_ids, vec![5, 6]);
        assert_eq!(listed[0].prompt.as_deref(), Some("kısa tut"));
    }
}
