use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use trawl_core::error::CrawlError;
use trawl_core::models::{AuthorRecord, ContentRecord};
use trawl_core::traits::PostingStore;

/// One output line.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Author(&'a AuthorRecord),
    Content(&'a ContentRecord),
    Graph { content_id: String, author_id: &'a str, source_url: &'a str },
}

/// Posting store that writes every save as one JSON object per line.
///
/// Lines are tagged with `"kind": "author" | "content" | "graph"`. The writer
/// is shared behind a mutex so pooled dispatch can use clones concurrently.
pub struct JsonLinesStore<W> {
    out: Arc<Mutex<W>>,
}

impl<W> Clone for JsonLinesStore<W> {
    fn clone(&self) -> Self {
        Self {
            out: Arc::clone(&self.out),
        }
    }
}

impl JsonLinesStore<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> JsonLinesStore<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    fn emit(&self, line: &Line<'_>) -> Result<(), CrawlError> {
        let mut encoded = serde_json::to_vec(line)?;
        encoded.push(b'\n');

        let mut out = self
            .out
            .lock()
            .map_err(|_| CrawlError::StoreError("output writer poisoned".to_string()))?;
        out.write_all(&encoded)
            .and_then(|()| out.flush())
            .map_err(|e| CrawlError::StoreError(format!("Failed to write record: {e}")))
    }
}

impl<W: Write + Send + 'static> PostingStore for JsonLinesStore<W> {
    async fn save_author(&self, author: &AuthorRecord) -> Result<(), CrawlError> {
        self.emit(&Line::Author(author))
    }

    async fn save_content(&self, content: &ContentRecord) -> Result<(), CrawlError> {
        self.emit(&Line::Content(content))
    }

    async fn save_to_graph(&self, content: &ContentRecord) -> Result<(), CrawlError> {
        self.emit(&Line::Graph {
            content_id: content.id.to_string(),
            author_id: &content.author_id,
            source_url: &content.source_url,
        })
    }
}
