//! Small helpers shared by the feed, category and analytics modules.
//!
//! - **Text processing**: HTML stripping, char-safe truncation and Turkish-aware
//!   lowercasing
//! - **URL handling**: validation of user-supplied feed URLs and source-name
//!   derivation from hosts

mod text;
mod url_validator;

pub use text::{fold_lowercase, strip_control_chars, strip_html, truncate_chars};
pub use url_validator::{source_name_from_url, validate_feed_url, UrlValidationError};

/// Maximum accepted length for free-text search queries coming from the API.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
