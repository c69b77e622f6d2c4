use crate::config::Discovery;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Shell glob as an anchored regex. `*` also crosses `/`, `[!x]` negates.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if closed {
                    re.push('[');
                    re.push_str(&class);
                    re.push(']');
                } else {
                    re.push_str(&regex::escape("["));
                    re.push_str(&regex::escape(class.trim_start_matches('^')));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).with_context(|| format!("invalid pattern: {pattern}"))
}

struct PatternSet(Vec<Regex>);

impl PatternSet {
    fn compile(patterns: &[String]) -> Result<Self> {
        patterns
            .iter()
            .map(|p| glob_to_regex(p))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Matches against the relative path and against the bare file name.
    fn matches(&self, rel: &Path) -> bool {
        let full = rel.to_string_lossy().replace('\\', "/");
        let name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.0.iter().any(|re| re.is_match(&full) || re.is_match(&name))
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Ordered list of PDFs to process. A file input is returned as is; a
/// directory is walked recursively and filtered by include, then exclude.
pub fn discover(input: &Path, filters: &Discovery) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        bail!("input not found: {}", input.display());
    }
    if !input.is_dir() {
        info!("scan single file: {}", input.display());
        return Ok(vec![input.to_path_buf()]);
    }

    let include = PatternSet::compile(&filters.include)?;
    let exclude = PatternSet::compile(&filters.exclude)?;

    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    files.retain(|p| {
        let rel = p.strip_prefix(input).unwrap_or(p.as_path());
        (include.0.is_empty() || include.matches(rel)) && !exclude.matches(rel)
    });

    info!("scan folder: {} files={}", input.display(), files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_crosses_directories() {
        let re = glob_to_regex("keep*.pdf").unwrap();
        assert!(re.is_match("keep-me.pdf"));
        assert!(re.is_match("keep/sub/x.pdf"));
        assert!(!re.is_match("skip.pdf"));
    }

    #[test]
    fn classes_and_literals_are_handled() {
        let re = glob_to_regex("a[!0-9]?.pdf").unwrap();
        assert!(re.is_match("ab1.pdf"));
        assert!(!re.is_match("a11.pdf"));
        assert!(!re.is_match("abXpdf"));

        let unclosed = glob_to_regex("x[ab").unwrap();
        assert!(unclosed.is_match("x[ab"));
    }
}
