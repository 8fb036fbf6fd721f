use regex::RegexSet;

use crate::error::CrawlError;

/// Coarse whole-word keyword pre-filter.
///
/// Keywords are lower-cased when the filter is built and content is expected
/// to be lower-cased by the caller, so matching is case-insensitive overall.
/// A keyword matches only on word boundaries: `bank` matches "the bank" but
/// not "banking".
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
    patterns: RegexSet,
}

impl RelevanceFilter {
    pub fn new(keywords: &[String]) -> Result<Self, CrawlError> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        let patterns = RegexSet::new(
            keywords
                .iter()
                .map(|k| format!(r"\b{}\b", regex::escape(&k.to_lowercase()))),
        )
        .map_err(|e| CrawlError::ConfigError(format!("Invalid keyword list: {e}")))?;

        Ok(Self { keywords, patterns })
    }

    /// True if any keyword appears as a whole word.
    ///
    /// An empty keyword list matches nothing.
    pub fn is_relevant(&self, lowered_content: &str) -> bool {
        self.patterns.is_match(lowered_content)
    }

    /// The configured keywords that occur in the content, in configuration order.
    pub fn matched_keywords(&self, lowered_content: &str) -> Vec<String> {
        self.patterns
            .matches(lowered_content)
            .into_iter()
            .map(|i| self.keywords[i].clone())
            .collect()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
