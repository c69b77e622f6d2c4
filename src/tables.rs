//! Best-effort table detection over extracted page text.
//!
//! A table is a run of consecutive lines that split into the same number of
//! cells (at least two). Nothing here affects a document's result: callers
//! log whatever comes back and move on.

use crate::config::{Tables, TablesMode};
use crate::pdf::PdfDocument;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub page: u32,
    pub rows: Vec<Vec<String>>,
}

pub struct Splitter {
    mode: TablesMode,
    gap: Regex,
    ruling: Regex,
}

impl Splitter {
    pub fn new(mode: TablesMode) -> Result<Self> {
        Ok(Self {
            mode,
            gap: Regex::new(r"\t+|\s{2,}").context("compile column gap pattern")?,
            ruling: Regex::new(r"^[\s|:+=-]*$").context("compile ruling pattern")?,
        })
    }

    /// Cells of one line, or `None` if the line cannot be a table row.
    pub fn cells(&self, line: &str) -> Option<Vec<String>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let cells: Vec<String> = match self.mode {
            TablesMode::Stream => self.gap.split(line).map(|c| c.trim().to_string()).collect(),
            TablesMode::Lattice => {
                if !line.contains('|') {
                    return None;
                }
                line.trim_matches('|')
                    .split('|')
                    .map(|c| c.trim().to_string())
                    .collect()
            }
        };
        (cells.len() >= 2).then_some(cells)
    }

    fn is_ruling(&self, line: &str) -> bool {
        self.mode == TablesMode::Lattice && line.contains('-') && self.ruling.is_match(line)
    }

    pub fn find(&self, page: u32, text: &str, min_rows: usize) -> Vec<Table> {
        let min_rows = min_rows.max(1);
        let mut found = Vec::new();
        let mut run: Vec<Vec<String>> = Vec::new();

        let mut flush = |run: &mut Vec<Vec<String>>| {
            if run.len() >= min_rows {
                found.push(Table {
                    page,
                    rows: std::mem::take(run),
                });
            }
            run.clear();
        };

        for line in text.lines() {
            if self.is_ruling(line) {
                continue;
            }
            match self.cells(line) {
                Some(cells) => {
                    if run.first().is_some_and(|r| r.len() != cells.len()) {
                        flush(&mut run);
                    }
                    run.push(cells);
                }
                None => flush(&mut run),
            }
        }
        flush(&mut run);
        found
    }
}

/// Markdown rendering; the first row becomes the header.
pub fn to_markdown(table: &Table) -> String {
    let mut out = String::new();
    for (i, row) in table.rows.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
        if i == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(row.len())));
        }
    }
    out
}

/// Writes `<stem>.tables.md` next to the conversion output. `Ok(None)` means
/// no tables were found and nothing was written.
pub fn extract_to_file(cfg: &Tables, pdf: &Path, out_dir: &Path) -> Result<Option<PathBuf>> {
    let splitter = Splitter::new(cfg.mode)?;
    let doc = PdfDocument::open(pdf)?;

    let mut tables = Vec::new();
    for (idx, n) in doc.page_numbers().enumerate() {
        let text = doc.page_text(n);
        tables.extend(splitter.find(idx as u32 + 1, &text, cfg.min_rows));
    }
    drop(doc);
    debug!("tables mode={:?} found={}", cfg.mode, tables.len());

    if tables.is_empty() {
        return Ok(None);
    }

    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let path = out_dir.join(format!("{stem}.tables.md"));
    let body = tables
        .iter()
        .enumerate()
        .map(|(i, t)| format!("## Table {} (page {})\n\n{}", i + 1, t.page, to_markdown(t)))
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(Some(path))
}
