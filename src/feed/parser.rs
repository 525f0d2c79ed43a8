use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

/// One entry of an RSS/Atom document, before normalization.
///
/// `feed-rs` folds RSS `<enclosure>` and `<media:content>` into the same media
/// list, so the first media content URL is reported as the enclosure and any
/// further ones land in `media_content`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// RSS `<description>` / Atom `<summary>`
    pub summary: Option<String>,
    /// RSS `<content:encoded>` / Atom `<content>`
    pub content: Option<String>,
    pub enclosure: Option<String>,
    pub thumbnail: Option<String>,
    pub media_content: Vec<String>,
    pub categories: Vec<String>,
}

/// Parses RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes into raw items.
///
/// Entries without a guid come back with `id: None`; feed-rs would otherwise
/// synthesize a hash id and hide the missing guid from normalization.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawFeedItem>> {
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)?;
    Ok(feed.entries.into_iter().map(raw_item).collect())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}

fn raw_item(entry: Entry) -> RawFeedItem {
    let mut media_urls = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| c.url.as_ref().map(|u| u.to_string()));
    let enclosure = media_urls.next();
    let media_content: Vec<String> = media_urls.collect();

    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .find(|uri| !uri.trim().is_empty());

    let categories = entry
        .categories
        .into_iter()
        .filter_map(|c| {
            let label = c.label.filter(|l| !l.trim().is_empty());
            non_empty(label.unwrap_or(c.term))
        })
        .collect();

    RawFeedItem {
        id: non_empty(entry.id),
        title: entry.title.and_then(|t| non_empty(t.content)),
        link: entry.links.into_iter().find_map(|l| non_empty(l.href)),
        published: entry.published,
        updated: entry.updated,
        author: entry.authors.into_iter().find_map(|p| non_empty(p.name)),
        summary: entry.summary.and_then(|s| non_empty(s.content)),
        content: entry.content.and_then(|c| c.body).and_then(non_empty),
        enclosure,
        thumbnail,
        media_content,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:media="http://search.yahoo.com/mrss/">
<channel>
  <title>Yerel Haber</title>
  <link>https://haber.example.com</link>
  <item>
    <title>Belediye yeni parkı açtı</title>
    <link>https://haber.example.com/park</link>
    <guid>park-123</guid>
    <pubDate>Mon, 06 Jan 2025 09:30:00 +0000</pubDate>
    <dc:creator>Ayşe Yılmaz</dc:creator>
    <description>Kısa özet</description>
    <content:encoded><![CDATA[<p>Uzun <b>içerik</b></p><img src="https://img.example.com/a.jpg"/>]]></content:encoded>
    <category>GÜNDEM</category>
    <category>Yerel</category>
    <enclosure url="https://img.example.com/enc.jpg" type="image/jpeg" length="100"/>
  </item>
  <item>
    <title>Başlıksız bağlantı</title>
    <link>https://haber.example.com/iki</link>
  </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_rss_item_fields() {
        let items = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title.as_deref(), Some("Belediye yeni parkı açtı"));
        assert_eq!(first.link.as_deref(), Some("https://haber.example.com/park"));
        assert_eq!(first.id.as_deref(), Some("park-123"));
        assert_eq!(first.author.as_deref(), Some("Ayşe Yılmaz"));
        assert_eq!(first.summary.as_deref(), Some("Kısa özet"));
        assert!(first.content.as_deref().unwrap().contains("<b>içerik</b>"));
        assert_eq!(
            first.categories,
            vec!["GÜNDEM".to_string(), "Yerel".to_string()]
        );
        assert_eq!(
            first.enclosure.as_deref(),
            Some("https://img.example.com/enc.jpg")
        );
        assert_eq!(
            first.published.map(|d| d.timestamp()),
            Some(1_736_155_800)
        );
    }

    #[test]
    fn test_parse_minimal_item() {
        let items = parse_feed(RSS.as_bytes()).unwrap();
        let second = &items[1];
        assert_eq!(second.link.as_deref(), Some("https://haber.example.com/iki"));
        assert!(second.published.is_none());
        assert!(second.categories.is_empty());
        assert!(second.enclosure.is_none());
    }

    #[test]
    fn test_item_without_guid_uses_link_as_guid() {
        let items = parse_feed(RSS.as_bytes()).unwrap();
        let second = &items[1];
        assert_eq!(second.id, None);

        let article = crate::feed::normalize_item(second);
        assert_eq!(article.guid, "https://haber.example.com/iki");
        assert_eq!(article.guid, article.link);

        let first = crate::feed::normalize_item(&items[0]);
        assert_eq!(first.guid, "park-123");
    }

    #[test]
    fn test_parse_atom() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2025-01-06T10:00:00Z</updated>
  <entry>
    <title>Atom girdisi</title>
    <id>urn:entry:1</id>
    <link href="https://atom.example.com/1"/>
    <updated>2025-01-06T10:00:00Z</updated>
    <summary>Özet</summary>
    <category term="Teknoloji"/>
  </entry>
</feed>"#;
        let items = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("urn:entry:1"));
        assert_eq!(items[0].categories, vec!["Teknoloji".to_string()]);
        assert!(items[0].updated.is_some());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }
}
