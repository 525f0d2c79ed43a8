use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::extract_json;
use crate::storage::{ArticleDetail, WindowOrder};
use crate::util::{strip_html, truncate_chars};

/// Characters of body text taken from each article when building a prompt.
const ARTICLE_EXCERPT_CHARS: usize = 1500;

/// Reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Error)]
#[error("Invalid report type '{0}' (expected daily, weekly or monthly)")]
pub struct InvalidReportKind(pub String);

/// Inclusive publish-date window in Unix seconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: i64,
    pub end: i64,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Turkish adjective used in prompts ("günlük rapor").
    fn label(self) -> &'static str {
        match self {
            Self::Daily => "günlük",
            Self::Weekly => "haftalık",
            Self::Monthly => "aylık",
        }
    }

    /// Days before the report date the window opens.
    fn lookback_days(self) -> i64 {
        match self {
            Self::Daily => 0,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }

    /// Maximum articles fed into one report.
    pub fn article_cap(self) -> i64 {
        match self {
            Self::Daily => 50,
            Self::Weekly => 200,
            Self::Monthly => 400,
        }
    }

    /// Daily reports look at the newest articles of the day; longer periods
    /// read from the start of the window.
    pub fn order(self) -> WindowOrder {
        match self {
            Self::Daily => WindowOrder::NewestFirst,
            Self::Weekly | Self::Monthly => WindowOrder::OldestFirst,
        }
    }

    /// `[first day 00:00:00, date 23:59:59]` in UTC.
    pub fn window(self, date: NaiveDate) -> ReportWindow {
        let first_day = date - Duration::days(self.lookback_days());
        ReportWindow {
            start: day_start(first_day),
            end: day_start(date) + 86_399,
        }
    }
}

fn day_start(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = InvalidReportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(InvalidReportKind(s.to_string())),
        }
    }
}

/// Positive/negative/neutral tally the report prompt asks the model for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(default)]
    pub positive: u32,
    #[serde(default)]
    pub negative: u32,
    #[serde(default, alias = "nötr", alias = "notr")]
    pub neutral: u32,
}

fn sentiment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{[^{}]*"(?:positive|negative)"[^{}]*\}"#).expect("static sentiment regex")
    })
}

/// Finds the sentiment object inside a free-text report, if the model
/// included one.
pub fn extract_sentiment(report: &str) -> Option<Sentiment> {
    sentiment_regex()
        .find_iter(report)
        .find_map(|m| extract_json::<Sentiment>(m.as_str()).ok())
}

fn article_date(article: &ArticleDetail) -> String {
    article
        .article
        .pub_date
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Tarih belirtilmemiş".to_string())
}

fn excerpt(article: &ArticleDetail) -> String {
    let body = if article.article.content.is_empty() {
        &article.article.description
    } else {
        &article.article.content
    };
    let plain = strip_html(body);
    truncate_chars(&plain, ARTICLE_EXCERPT_CHARS).to_string()
}

/// Articles rendered as prompt blocks separated by `---`.
pub(crate) fn render_articles(articles: &[ArticleDetail]) -> String {
    articles
        .iter()
        .map(|a| {
            let categories = if a.categories.is_empty() {
                String::new()
            } else {
                format!("Kategoriler: {}\n", a.categories.join(", "))
            };
            format!(
                "Başlık: {}\nKaynak: {}\nTarih: {}\n{}İçerik: {}\n",
                a.article.title,
                a.source_name,
                article_date(a),
                categories,
                excerpt(a)
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

pub(crate) fn report_prompt(kind: ReportKind, articles: &[ArticleDetail]) -> String {
    format!(
        "Aşağıda {label} haber raporu için {count} adet haber bulunuyor.\n\n\
         Bu haberlerden Türkçe, profesyonel ve anlaşılır bir {label} rapor hazırla. \
         Rapor şu bölümleri içersin:\n\
         1. Genel Özet: dönemin en önemli gelişmeleri\n\
         2. Öne Çıkan Konular: en çok işlenen konular ve trendler\n\
         3. Olumlu ve Olumsuz Gelişmeler\n\
         4. Trend Analizi: dönem boyunca görülen eğilimler\n\
         5. Önemli Olaylar\n\n\
         Son olarak kaç haberin olumlu, olumsuz ve nötr olduğunu say ve sonucu \
         {{\"positive\": 0, \"negative\": 0, \"neutral\": 0}} biçiminde JSON olarak ekle.\n\n\
         HABERLER:\n{articles}",
        label = kind.label(),
        count = articles.len(),
        articles = render_articles(articles),
    )
}

/// The `analysis` object stored next to a report.
pub(crate) fn report_analysis(
    window: ReportWindow,
    articles: &[ArticleDetail],
    sentiment: Option<Sentiment>,
) -> serde_json::Value {
    let mut sources: BTreeMap<&str, usize> = BTreeMap::new();
    for article in articles {
        *sources.entry(article.source_name.as_str()).or_default() += 1;
    }
    let iso = |ts: i64| {
        DateTime::<Utc>::from_timestamp(ts, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
    };

    serde_json::json!({
        "total_articles": articles.len(),
        "date_range": { "start": iso(window.start), "end": iso(window.end) },
        "sources": sources,
        "sentiment": sentiment,
    })
}
