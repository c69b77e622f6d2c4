//! Read-only PDF access backed by [`lopdf`].
//!
//! Documents are opened for the duration of one operation and dropped before
//! the caller returns. `lopdf` can panic on some malformed inputs, so loading
//! and text decoding run behind `catch_unwind`.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct PdfDocument {
    path: PathBuf,
    doc: lopdf::Document,
    pages: BTreeMap<u32, lopdf::ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| lopdf::Document::load(path)));
        let doc = match loaded {
            Ok(Ok(doc)) => doc,
            Ok(Err(e)) => return Err(anyhow!("cannot open {}: {e}", path.display())),
            Err(_) => {
                return Err(anyhow!(
                    "cannot open {}: parser panicked (malformed document)",
                    path.display()
                ));
            }
        };
        let pages = doc.get_pages();
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            pages,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page numbers as stored in the page tree (1-based).
    pub fn page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    /// Text of one page. Undecodable pages come back empty instead of failing
    /// the document.
    pub fn page_text(&self, page_number: u32) -> String {
        let doc = &self.doc;
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[page_number])));
        match extracted {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!(
                    "page {} of {} has no decodable text: {e}",
                    page_number,
                    self.path.display()
                );
                String::new()
            }
            Err(_) => {
                warn!(
                    "text extraction panicked on page {} of {}",
                    page_number,
                    self.path.display()
                );
                String::new()
            }
        }
    }
}

/// Page count of `path`, or `None` when the document cannot be opened.
pub fn page_count(path: &Path) -> Option<u32> {
    match PdfDocument::open(path) {
        Ok(doc) => Some(doc.page_count()),
        Err(e) => {
            warn!("{e:#}");
            None
        }
    }
}
