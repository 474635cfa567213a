use crate::core::PageTrait;
use crate::errors::{truncate_chars, Result};
use serde::Serialize;

/// Truncated document markup as shipped to an inference backend.
#[derive(Debug, Clone, Serialize)]
pub struct DomSnapshot {
    pub url: String,
    pub markup: String,
    pub original_len: usize,
    pub truncated: bool,
}

impl DomSnapshot {
    pub async fn capture<P: PageTrait + ?Sized>(page: &P, limit: usize) -> Result<Self> {
        let url = page.url().await?;
        let html = page.content().await?;
        Ok(Self::from_markup(url, &html, limit))
    }

    pub fn from_markup(url: String, html: &str, limit: usize) -> Self {
        let original_len = html.chars().count();
        Self {
            url,
            markup: truncate_chars(html, limit),
            original_len,
            truncated: original_len > limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_capped() {
        let html = format!("<html>{}</html>", "a".repeat(20_000));
        let snapshot = DomSnapshot::from_markup("https://example.com".into(), &html, 12_000);
        assert_eq!(snapshot.markup.chars().count(), 12_000);
        assert!(snapshot.truncated);
        assert!(snapshot.markup.starts_with("<html>"));
    }

    #[test]
    fn test_small_snapshot_untouched() {
        let snapshot = DomSnapshot::from_markup("u".into(), "<p>hi</p>", 12_000);
        assert_eq!(snapshot.markup, "<p>hi</p>");
        assert!(!snapshot.truncated);
        assert_eq!(snapshot.original_len, 9);
    }
}
