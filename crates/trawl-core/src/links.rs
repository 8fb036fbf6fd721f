use std::sync::LazyLock;

use regex::Regex;

use crate::models::NormalizedUrl;

static HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).expect("href pattern is valid")
});

/// Every `href` target in the page, resolved against `base`, in document order.
///
/// The attribute name is matched case-insensitively; targets keep their case
/// because paths and queries are case-sensitive. Targets that do not resolve
/// to an absolute URL with a host (`mailto:`, `javascript:`, garbage) are
/// dropped.
pub fn extract_links(base: &NormalizedUrl, content: &str) -> Vec<NormalizedUrl> {
    HREF_PATTERN
        .captures_iter(content)
        .filter_map(|cap| cap.get(1))
        .filter_map(|href| match base.resolve(href.as_str()) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(base = %base, error = %e, "Dropping unresolvable link");
                None
            }
        })
        .collect()
}
