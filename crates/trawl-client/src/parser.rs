use std::sync::Arc;

use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};
use trawl_core::error::CrawlError;
use trawl_core::models::{AuthorRecord, ContentRecord, PageRecord, PostingRecord};
use trawl_core::traits::PageParser;
use uuid::Uuid;

/// Reference page parser: one posting per page.
///
/// The page body is converted to Markdown with non-content elements (script,
/// style, nav, etc.) stripped, the `<title>` becomes the posting title, and
/// the page host stands in as the author. Pages with no text left after
/// cleaning produce no postings.
pub struct MarkdownPageParser {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for MarkdownPageParser {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl MarkdownPageParser {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
                "title",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }

    fn to_markdown(&self, html: &str) -> Result<String, CrawlError> {
        self.converter
            .convert(html)
            .map_err(|e| CrawlError::ParserError(e.to_string()))
    }
}

impl Default for MarkdownPageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageParser for MarkdownPageParser {
    async fn submit(&self, page: &PageRecord) -> Result<Vec<PostingRecord>, CrawlError> {
        let body = self.to_markdown(&page.content)?;
        let body = body.trim();
        if body.is_empty() {
            tracing::debug!(url = %page.url, "No text content after cleaning");
            return Ok(Vec::new());
        }

        let host = page
            .url
            .host()
            .ok_or_else(|| CrawlError::ParserError(format!("{} has no host", page.url)))?
            .to_string();

        let author = AuthorRecord {
            id: host.clone(),
            name: host.clone(),
            profile_url: Some(page.url.origin_key()),
            tags: page.tags.clone(),
        };
        let content = ContentRecord {
            id: Uuid::new_v4(),
            author_id: host,
            source_url: page.url.to_string(),
            title: extract_title(&page.content),
            body: body.to_string(),
            keywords: page.matched_keywords.clone(),
            tags: page.tags.clone(),
            content_hash: page.content_hash.clone(),
            captured_at: page.fetched_at,
        };

        Ok(vec![PostingRecord { author, content }])
    }
}

/// Text of the first non-empty `<title>` element, whitespace-collapsed.
fn extract_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use trawl_core::models::{NormalizedUrl, RecordTags, compute_hash};

    use super::*;

    fn page(url: &str, html: &str) -> PageRecord {
        PageRecord {
            url: NormalizedUrl::parse(url).unwrap(),
            content: html.to_string(),
            matched_keywords: vec!["loan".to_string()],
            keywords: vec!["loan".to_string(), "bank".to_string()],
            tags: RecordTags {
                tenant: "acme".to_string(),
                scope: "news".to_string(),
            },
            depth: 1,
            content_hash: compute_hash(html),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn builds_posting_from_page() {
        let parser = MarkdownPageParser::new();
        let html = "<html><head><title> Loan  rates </title></head>\
                    <body><h1>Rates</h1><p>Our loan offer.</p><script>track()</script></body></html>";

        let records = parser
            .submit(&page("https://news.example.com/rates", html))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.author.id, "news.example.com");
        assert_eq!(
            record.author.profile_url.as_deref(),
            Some("https://news.example.com")
        );
        assert_eq!(record.content.author_id, "news.example.com");
        assert_eq!(record.content.title.as_deref(), Some("Loan rates"));
        assert!(record.content.body.contains("Our loan offer."));
        assert!(!record.content.body.contains("track()"));
        assert!(!record.content.body.contains("Loan  rates"));
        assert_eq!(record.content.keywords, vec!["loan".to_string()]);
        assert_eq!(record.content.tags.tenant, "acme");
        assert_eq!(record.content.source_url, "https://news.example.com/rates");
    }

    #[tokio::test]
    async fn empty_page_yields_nothing() {
        let parser = MarkdownPageParser::new();
        let html = "<html><head><script>x()</script></head><body><nav>menu</nav></body></html>";

        let records = parser
            .submit(&page("https://example.com/", html))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn title_missing() {
        assert_eq!(extract_title("<p>no head</p>"), None);
        assert_eq!(extract_title("<title>  </title>"), None);
    }
}
