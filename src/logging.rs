//! Tracing setup and the persisted system log.
//!
//! Console output goes through the usual `fmt` layer. INFO, WARN and ERROR
//! events emitted by this crate are also copied into the `system_logs` table
//! by [`SystemLogLayer`], which hands records to a background writer over a
//! bounded channel. A full channel drops the record rather than blocking the
//! caller.

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::storage::Database;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,newsdesk=debug";

const DEFAULT_CAPACITY: usize = 1024;

/// Target prefix of events that get persisted.
const PERSISTED_TARGET: &str = "newsdesk";

#[derive(Debug)]
struct LogRecord {
    level: &'static str,
    message: String,
    metadata: Option<String>,
    created_at: i64,
}

/// Collects the message and the remaining fields of an event.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

/// `tracing` layer forwarding this crate's INFO+ events to the database.
pub struct SystemLogLayer {
    tx: mpsc::Sender<LogRecord>,
}

/// Receiving half; turn it into the writer task with [`spawn`](Self::spawn)
/// once the database is open.
pub struct SystemLogWriter {
    rx: mpsc::Receiver<LogRecord>,
}

impl SystemLogLayer {
    pub fn new() -> (Self, SystemLogWriter) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, SystemLogWriter) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, SystemLogWriter { rx })
    }
}

impl<S: Subscriber> Layer<S> for SystemLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::INFO || !meta.target().starts_with(PERSISTED_TARGET) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            level: meta.level().as_str(),
            message: visitor.message.unwrap_or_default(),
            metadata: (!visitor.fields.is_empty())
                .then(|| Value::Object(visitor.fields).to_string()),
            created_at: chrono::Utc::now().timestamp(),
        };
        // Full or closed channel: the record is dropped
        let _ = self.tx.try_send(record);
    }
}

impl SystemLogWriter {
    /// Drain records into `system_logs` until every layer is dropped.
    pub fn spawn(mut self, db: Database) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(record) = self.rx.recv().await {
                if let Err(e) = db
                    .insert_log(
                        record.level,
                        &record.message,
                        record.metadata.as_deref(),
                        record.created_at,
                    )
                    .await
                {
                    // Outside the persisted target so the failure isn't fed back in
                    tracing::warn!(target: "system_log", error = %e, "Failed to persist log record");
                }
            }
        })
    }
}

/// Install the global subscriber: `EnvFilter` (falling back to
/// [`DEFAULT_FILTER`]), console output and optionally the system log layer.
pub fn init_tracing(system_log: Option<SystemLogLayer>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(system_log)
        .init();
}
