//! Feed retrieval and article normalization.
//!
//! - [`fetcher`] downloads a feed with retry/backoff and a size limit
//! - [`parser`] turns RSS/Atom bytes into [`RawFeedItem`]s using `feed-rs`
//! - [`normalize`] maps a raw item to a [`NormalizedArticle`] (pure)
//!
//! # Example
//!
//! ```ignore
//! use newsdesk::feed::{fetch_feed, normalize_item, RetryPolicy};
//!
//! let items = fetch_feed(&client, "https://example.com/rss", &RetryPolicy::default()).await?;
//! let articles: Vec<_> = items.iter().map(normalize_item).collect();
//! ```

mod fetcher;
mod normalize;
mod parser;

pub use fetcher::{build_http_client, fetch_feed, FetchError, RetryPolicy};
pub use normalize::{normalize_item, NormalizedArticle, DESCRIPTION_MAX_CHARS};
pub use parser::{parse_feed, RawFeedItem};
