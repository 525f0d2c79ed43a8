use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use newsdesk::ai::{GeminiClient, MockGenerator, TextGenerator, UnconfiguredGenerator};
use newsdesk::analytics::{Analytics, ReportKind};
use newsdesk::categories::{initialize_standard_categories, CategoryNormalizer};
use newsdesk::config::Config;
use newsdesk::feed::build_http_client;
use newsdesk::http::{self, AppState};
use newsdesk::ingest::Ingestor;
use newsdesk::logging::{init_tracing, SystemLogLayer};
use newsdesk::scheduler::{default_jobs, JobContext, Scheduler};
use newsdesk::storage::{Database, DatabaseError};

const DEFAULT_CONFIG_PATH: &str = "newsdesk.toml";

#[derive(Parser, Debug)]
#[command(name = "newsdesk", version, about = "News aggregation backend with AI analytics")]
struct Args {
    /// Configuration file (defaults to $NEWSDESK_CONFIG or ./newsdesk.toml)
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and the scheduler (default)
    Serve,
    /// Check every active feed once and exit
    Check,
    /// Generate one report
    Report {
        /// daily, weekly or monthly
        kind: ReportKind,
        /// Last day of the period (YYYY-MM-DD), defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Compute a word frequency snapshot
    Words {
        /// Number of latest articles to analyse
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Category maintenance
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    /// Merge categories whose names differ only by case
    Cleanup,
}

fn config_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os("NEWSDESK_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Pick the AI backend: Gemini when a key is set, a canned responder for the
/// key `mock`, and otherwise a generator that reports the missing key.
fn text_generator(config: &Config, client: reqwest::Client) -> Arc<dyn TextGenerator> {
    match config.gemini_key() {
        Some(_) if config.uses_mock_ai() => {
            tracing::warn!("GEMINI_API_KEY=mock, AI responses are canned");
            Arc::new(MockGenerator::replying(
                "Bu bir test yanıtıdır.\n{\"positive\": 0, \"negative\": 0, \"neutral\": 0}",
            ))
        }
        Some(key) => Arc::new(GeminiClient::new(
            client,
            &config.gemini_base_url,
            &config.gemini_model,
            key,
        )),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, AI features are disabled");
            Arc::new(UnconfiguredGenerator)
        }
    }
}

async fn open_database(config: &Config) -> Result<Database> {
    match Database::open(config.database_path()).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database is locked by another process. Close it and try again.");
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn serve(
    config: Arc<Config>,
    db: Database,
    ingestor: Ingestor,
    analytics: Analytics,
) -> Result<()> {
    initialize_standard_categories(&db)
        .await
        .context("Failed to initialize standard categories")?;
    let added = ingestor.initialize_feed_sources(&config.rss_feeds).await;
    tracing::info!(added = added, configured = config.rss_feeds.len(), "Feed sources initialized");

    match ingestor.check_all_feeds().await {
        Ok(n) => tracing::info!(new_articles = n, "Initial feed check completed"),
        Err(e) => tracing::error!(error = %e, "Initial feed check failed"),
    }

    let jobs = default_jobs(JobContext::new(ingestor.clone(), analytics.clone(), &config));
    let mut scheduler = Scheduler::new(jobs)
        .await
        .context("Failed to build scheduler")?;
    scheduler.start().await.context("Failed to start scheduler")?;

    let state = AppState::new(ingestor, analytics, config.clone());
    let served = http::serve(state, config.port, shutdown_signal()).await;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler did not shut down cleanly");
    }
    served
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let (system_log, log_writer) = SystemLogLayer::new();
    init_tracing(Some(system_log));

    let path = config_path(args.config);
    let config = Arc::new(
        Config::load_with_env(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
    );
    tracing::debug!(config = ?config, "Configuration loaded");

    let db = open_database(&config).await?;
    log_writer.spawn(db.clone());

    let client = build_http_client().context("Failed to build HTTP client")?;
    let generator = text_generator(&config, client.clone());
    let normalizer = Arc::new(CategoryNormalizer::new(generator.clone()));
    let ingestor = Ingestor::new(db.clone(), client, normalizer);
    let analytics =
        Analytics::new(db.clone(), generator).with_topic(config.report_topic().map(str::to_string));

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, ingestor, analytics).await?,
        Command::Check => {
            initialize_standard_categories(&db).await?;
            ingestor.initialize_feed_sources(&config.rss_feeds).await;
            let report = ingestor.fetch_all().await?;
            println!(
                "{} sources checked ({} failed), {} new articles",
                report.total_sources, report.failed, report.total_new_articles
            );
            for result in report.results.iter().filter(|r| r.error.is_some()) {
                println!(
                    "  {}: {}",
                    result.source_name,
                    result.error.as_deref().unwrap_or_default()
                );
            }
        }
        Command::Report { kind, date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            match analytics.generate_report(kind, date).await? {
                Some(report) => {
                    println!("{} report #{} ({} articles)\n", kind, report.id, report.article_count);
                    println!("{}", report.summary);
                }
                None => println!("No articles found for the {kind} report ending {date}"),
            }
        }
        Command::Words { limit } => {
            let limit = limit.unwrap_or(config.word_frequency_articles);
            match analytics.generate_word_frequency(limit).await? {
                Some(snapshot) => {
                    for entry in &snapshot.words {
                        println!("{:>5}  {}", entry.count, entry.word);
                    }
                }
                None => println!("No articles to analyse"),
            }
        }
        Command::Categories {
            action: CategoryAction::Cleanup,
        } => {
            let removed = db.cleanup_duplicate_categories().await?;
            println!("Removed {removed} duplicate categories");
        }
    }

    Ok(())
}
