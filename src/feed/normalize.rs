use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::parser::RawFeedItem;
use crate::util::{strip_html, truncate_chars};

/// Length cap for descriptions derived from full content.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Canonical article record produced from a feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArticle {
    pub title: String,
    /// Plain text, no markup.
    pub description: String,
    /// Richest available body, HTML kept.
    pub content: String,
    pub link: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub guid: String,
    /// Free-text labels as they appeared in the feed.
    pub categories: Vec<String>,
}

fn img_src_regex() -> &'static Regex {
    static IMG: OnceLock<Regex> = OnceLock::new();
    IMG.get_or_init(|| {
        Regex::new(r#"(?i)<img[^>]+src=["']([^"'>]+)["']"#).expect("static img regex")
    })
}

/// Maps a raw item to an article. Pure: no I/O.
///
/// Items without a link get an empty `link`; the ingestion pipeline skips them
/// since the link is the dedup key.
pub fn normalize_item(item: &RawFeedItem) -> NormalizedArticle {
    let content = item
        .content
        .as_deref()
        .or(item.summary.as_deref())
        .unwrap_or_default()
        .to_string();

    let description = match item.summary.as_deref() {
        Some(summary) => strip_html(summary),
        None => truncate_chars(&strip_html(&content), DESCRIPTION_MAX_CHARS).to_string(),
    };

    let link = item.link.clone().unwrap_or_default();
    let guid = item.id.clone().unwrap_or_else(|| link.clone());

    NormalizedArticle {
        title: item.title.clone().unwrap_or_default(),
        description,
        image_url: resolve_image(item),
        author: item.author.clone(),
        pub_date: item.published.or(item.updated),
        guid,
        link,
        content,
        categories: item.categories.clone(),
    }
}

/// Enclosure, thumbnail, first remaining media content, then the first
/// `<img src>` in the HTML body.
fn resolve_image(item: &RawFeedItem) -> Option<String> {
    item.enclosure
        .clone()
        .or_else(|| item.thumbnail.clone())
        .or_else(|| item.media_content.first().cloned())
        .or_else(|| {
            [item.content.as_deref(), item.summary.as_deref()]
                .into_iter()
                .flatten()
                .find_map(|html| img_src_regex().captures(html))
                .map(|caps| caps[1].to_string())
        })
}
