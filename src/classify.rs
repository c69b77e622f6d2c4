use crate::pdf::PdfDocument;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStats {
    pub openable: bool,
    pub total_pages: u32,
    pub textual_pages: u32,
}

impl PageStats {
    pub fn unopenable() -> Self {
        Self {
            openable: false,
            total_pages: 0,
            textual_pages: 0,
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        f64::from(self.textual_pages) / f64::from(self.total_pages)
    }

    /// Unopenable and empty documents are never textual. Otherwise the share
    /// of textual pages must reach `min_ratio`, so `min_ratio = 0` accepts
    /// every openable document with at least one page.
    pub fn is_textual(&self, min_ratio: f64) -> bool {
        if !self.openable || self.total_pages == 0 {
            return false;
        }
        self.ratio() >= min_ratio
    }
}

pub fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

pub fn page_stats<I, S>(pages: I, min_chars_per_page: u32) -> PageStats
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut total_pages = 0u32;
    let mut textual_pages = 0u32;
    for page in pages {
        total_pages += 1;
        let text = page.as_ref();
        // A page with no extracted text never counts, even at a zero threshold.
        if !text.is_empty() && non_whitespace_chars(text) >= min_chars_per_page as usize {
            textual_pages += 1;
        }
    }
    PageStats {
        openable: true,
        total_pages,
        textual_pages,
    }
}

pub fn probe(path: &Path, min_chars_per_page: u32) -> PageStats {
    let doc = match PdfDocument::open(path) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("classifier cannot open document: {e:#}");
            return PageStats::unopenable();
        }
    };
    let stats = page_stats(
        doc.page_numbers().map(|n| doc.page_text(n)),
        min_chars_per_page,
    );
    debug!(
        "classified {} textual={}/{} ratio={:.3}",
        path.display(),
        stats.textual_pages,
        stats.total_pages,
        stats.ratio()
    );
    stats
}

pub fn is_textual(path: &Path, min_chars_per_page: u32, min_ratio: f64) -> bool {
    probe(path, min_chars_per_page).is_textual(min_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_non_whitespace() {
        assert_eq!(non_whitespace_chars("  a b\n\tc  "), 3);
        assert_eq!(non_whitespace_chars(""), 0);
    }

    #[test]
    fn zero_min_chars_makes_every_non_empty_page_textual() {
        let stats = page_stats(["", "   ", "x"], 0);
        assert_eq!(stats.textual_pages, 2);
        assert_eq!(stats.total_pages, 3);
    }

    #[test]
    fn empty_pages_still_weigh_against_the_ratio_at_zero_min_chars() {
        let stats = page_stats(["", "", "", "x"], 0);
        assert_eq!(stats.textual_pages, 1);
        assert!(!stats.is_textual(0.5));
        assert!(stats.is_textual(0.25));
    }

    #[test]
    fn zero_ratio_accepts_blank_documents_with_pages() {
        let stats = page_stats(["", ""], 100);
        assert_eq!(stats.textual_pages, 0);
        assert!(stats.is_textual(0.0));
        assert!(!stats.is_textual(0.01));
    }

    #[test]
    fn empty_and_unopenable_are_never_textual() {
        let empty = page_stats(Vec::<String>::new(), 0);
        assert!(!empty.is_textual(0.0));
        assert!(!PageStats::unopenable().is_textual(0.0));
    }

    #[test]
    fn ratio_threshold_is_inclusive() {
        let stats = page_stats(["hello world", "", "", "", ""], 5);
        assert_eq!(stats.textual_pages, 1);
        assert!(stats.is_textual(0.2));
        assert!(!stats.is_textual(0.21));
    }
}
