use chrono::{Datelike, NaiveDate, Utc};

use super::ScheduledTask;
use crate::analytics::{Analytics, ReportKind};
use crate::config::Config;
use crate::ingest::Ingestor;

/// Everything the default jobs need.
#[derive(Clone)]
pub struct JobContext {
    pub ingestor: Ingestor,
    pub analytics: Analytics,
    pub feed_check_interval_minutes: u64,
    pub word_frequency_articles: i64,
    pub log_retention_days: i64,
}

impl JobContext {
    pub fn new(ingestor: Ingestor, analytics: Analytics, config: &Config) -> Self {
        Self {
            ingestor,
            analytics,
            feed_check_interval_minutes: config.feed_check_interval_minutes,
            word_frequency_articles: config.word_frequency_articles,
            log_retention_days: config.log_retention_days,
        }
    }
}

/// Cron expression firing at second 0 of every `minutes`-th minute.
pub fn feed_check_cron(minutes: u64) -> String {
    format!("0 */{minutes} * * * *")
}

/// True when the day after `date` starts a new month.
pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.day() == 1)
}

async fn check_feeds(ctx: JobContext) -> anyhow::Result<()> {
    let saved = ctx.ingestor.check_all_feeds().await?;
    tracing::info!(new_articles = saved, "Scheduled feed check completed");
    Ok(())
}

async fn word_frequency(ctx: JobContext) -> anyhow::Result<()> {
    ctx.analytics
        .generate_word_frequency(ctx.word_frequency_articles)
        .await?;
    Ok(())
}

async fn report(ctx: JobContext, kind: ReportKind) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    if kind == ReportKind::Monthly && !is_last_day_of_month(today) {
        return Ok(());
    }
    tracing::info!(kind = %kind, date = %today, "Generating scheduled report");
    ctx.analytics.generate_report(kind, today).await?;
    Ok(())
}

async fn cleanup_logs(ctx: JobContext) -> anyhow::Result<()> {
    ctx.analytics.cleanup_logs(ctx.log_retention_days).await?;
    Ok(())
}

/// The standard job set: feed checks, word frequency, the three reports and
/// log cleanup. All times are UTC.
pub fn default_jobs(ctx: JobContext) -> Vec<ScheduledTask> {
    let feed_cron = feed_check_cron(ctx.feed_check_interval_minutes);

    let report_job = |name: &str, cron: &str, kind: ReportKind| {
        let ctx = ctx.clone();
        ScheduledTask::new(name, cron, move || report(ctx.clone(), kind))
    };

    vec![
        {
            let ctx = ctx.clone();
            ScheduledTask::new("feed-check", feed_cron, move || check_feeds(ctx.clone()))
        },
        {
            let ctx = ctx.clone();
            ScheduledTask::new("word-frequency", "0 */15 * * * *", move || {
                word_frequency(ctx.clone())
            })
        },
        report_job("daily-report", "0 59 23 * * *", ReportKind::Daily),
        report_job("weekly-report", "0 59 23 * * Sun", ReportKind::Weekly),
        report_job("monthly-report", "0 59 23 28-31 * *", ReportKind::Monthly),
        {
            let ctx = ctx.clone();
            ScheduledTask::new("log-cleanup", "0 0 3 * * *", move || cleanup_logs(ctx.clone()))
        },
    ]
}
