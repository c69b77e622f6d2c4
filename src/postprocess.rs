use crate::config::Output;
use unicode_normalization::UnicodeNormalization;

pub const PAGE_SEPARATOR: &str = "\n\n";

/// Join extracted page texts and clean the result for writing.
pub fn join_pages(cfg: &Output, pages: &[String]) -> String {
    clean_text(cfg, &pages.join(PAGE_SEPARATOR))
}

pub fn clean_text(cfg: &Output, raw: &str) -> String {
    let mut text = raw.replace("\r\n", "\n");

    if cfg.normalize_unicode {
        text = text.nfkc().collect::<String>();
    }

    text = strip_control_chars(&text);

    if cfg.trim_trailing_whitespace {
        text = text
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
    }

    text
}

fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| ch == '\n' || ch == '\r' || ch == '\t' || !ch.is_control())
        .collect()
}
