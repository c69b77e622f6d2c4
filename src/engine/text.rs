use super::{ConversionResult, ConvertRequest, DepCheck, Engine};
use crate::config::Output;
use crate::error::{EngineFailure, ErrorKind};
use crate::pdf::PdfDocument;
use crate::postprocess;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Direct text extraction with `lopdf`; writes `<stem>.md` or `<stem>.txt`.
pub struct TextEngine {
    output: Output,
    progress: bool,
}

impl TextEngine {
    pub fn new(output: &Output, progress: bool) -> Self {
        Self {
            output: output.clone(),
            progress,
        }
    }

    /// Extract `source` but name the output after `req.input_pdf`. Used by the
    /// OCR engine, which extracts from a scratch copy.
    pub fn convert_from(&self, source: &Path, req: &ConvertRequest) -> ConversionResult {
        let started = Instant::now();
        let doc = match PdfDocument::open(source) {
            Ok(doc) => doc,
            Err(e) => {
                return ConversionResult::failure(EngineFailure::new(
                    ErrorKind::NotOpenable,
                    format!("{e:#}"),
                ));
            }
        };

        let numbers: Vec<u32> = doc
            .page_numbers()
            .enumerate()
            .filter(|(idx, _)| match req.range {
                Some(r) => (*idx as u32) >= r.start && (*idx as u32) <= r.end,
                None => true,
            })
            .map(|(_, n)| n)
            .collect();
        let total = numbers.len();

        let mut pages = Vec::with_capacity(total);
        let mut last_step = None;
        for (i, n) in numbers.into_iter().enumerate() {
            pages.push(doc.page_text(n));
            if self.progress && total > 0 {
                let pct = (i + 1) * 100 / total;
                if last_step != Some(pct / 5) {
                    info!("text {}/{} pages ({}%)", i + 1, total, pct);
                    last_step = Some(pct / 5);
                }
            }
        }
        drop(doc);

        let out_path = req.output_path(self.output.format.extension());
        let body = postprocess::join_pages(&self.output, &pages);
        if let Err(e) = std::fs::write(&out_path, body) {
            return ConversionResult::failure(EngineFailure::new(
                ErrorKind::EngineFailed,
                format!("write {}: {e}", out_path.display()),
            ));
        }

        info!(
            "text {} -> {} ({:.2}s)",
            req.input_pdf.display(),
            out_path.display(),
            started.elapsed().as_secs_f64()
        );
        ConversionResult::success(total as u32)
    }
}

impl Engine for TextEngine {
    fn name(&self) -> &str {
        "fast"
    }

    fn convert(&self, req: &ConvertRequest) -> ConversionResult {
        self.convert_from(&req.input_pdf, req)
    }

    fn doctor(&self) -> DepCheck {
        DepCheck {
            engine: self.name().to_string(),
            ok: true,
            detail: "built in (lopdf)".to_string(),
        }
    }
}
