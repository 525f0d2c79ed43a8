//! newsdesk: a news aggregation backend.
//!
//! RSS/Atom sources are polled on a schedule, new items are deduplicated by
//! link and stored in SQLite with their labels mapped onto a fixed category
//! set. AI-backed analytics (word frequency, periodic reports, summaries)
//! run over the stored articles, and everything is exposed over a small
//! REST API.

pub mod ai;
pub mod analytics;
pub mod categories;
pub mod config;
pub mod feed;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod scheduler;
pub mod storage;
pub mod util;
