//! Drives the heavy engine over a document in page slices.
//!
//! The loop is [`Backoff`] plus I/O: ask for the next range, invoke the
//! engine, feed the outcome back. A document the PDF reader cannot open gets
//! one whole-document invocation instead.

use crate::engine::{ConvertRequest, Engine};
use crate::error::RouteError;
use crate::pdf;
use crate::slice::{Backoff, PageRange, SliceState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceAttempt {
    pub range: PageRange,
    pub width: u32,
    pub ok: bool,
    pub seconds: f64,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SliceReport {
    pub total_pages: Option<u32>,
    pub pages_done: u32,
    pub single_pass: bool,
    pub dry_run: bool,
    pub attempts: Vec<SliceAttempt>,
}

pub struct SliceDriver<'a> {
    engine: &'a dyn Engine,
    dry_run: bool,
    progress: bool,
}

impl<'a> SliceDriver<'a> {
    pub fn new(engine: &'a dyn Engine, dry_run: bool, progress: bool) -> Self {
        Self {
            engine,
            dry_run,
            progress,
        }
    }

    pub fn run(&self, pdf: &Path, out_dir: &Path, width: u32) -> Result<SliceReport, RouteError> {
        if self.dry_run {
            info!(
                "dry run: would run {} on {} in slices of {} -> {}",
                self.engine.name(),
                pdf.display(),
                width,
                out_dir.display()
            );
            return Ok(SliceReport {
                dry_run: true,
                ..Default::default()
            });
        }

        match pdf::page_count(pdf) {
            Some(total) => self.run_slices(pdf, out_dir, width, total),
            None => self.single_pass(pdf, out_dir),
        }
    }

    /// The slice loop for a document with a known page count.
    pub fn run_slices(
        &self,
        pdf: &Path,
        out_dir: &Path,
        width: u32,
        total: u32,
    ) -> Result<SliceReport, RouteError> {
        let mut backoff = Backoff::new(total, width);
        let mut report = SliceReport {
            total_pages: Some(total),
            ..Default::default()
        };
        info!(
            "{} total_pages={} slice={}",
            self.engine.name(),
            total,
            backoff.width()
        );
        if total == 0 {
            warn!("{} has no pages; nothing to convert", pdf.display());
        }

        while let Some(range) = backoff.next_range() {
            let width = backoff.width();
            let started = Instant::now();
            let res = self
                .engine
                .convert(&ConvertRequest::slice(pdf, out_dir, range));
            let seconds = started.elapsed().as_secs_f64();
            let detail = res.error.as_ref().map(|f| f.to_string());
            report.attempts.push(SliceAttempt {
                range,
                width,
                ok: res.ok,
                seconds,
                detail: detail.clone(),
            });

            if res.ok {
                backoff.record_success();
                report.pages_done += range.pages();
                if self.progress {
                    info!(
                        "slice {} ok; {}/{} pages ({}%) in {:.2}s",
                        range,
                        report.pages_done,
                        total,
                        u64::from(report.pages_done) * 100 / u64::from(total),
                        seconds
                    );
                } else {
                    info!("pages {} ok in {:.2}s", range, seconds);
                }
                continue;
            }

            let detail = detail.unwrap_or_else(|| "engine reported failure".to_string());
            match backoff.record_failure() {
                SliceState::Retrying => {
                    warn!(
                        "slice {} failed ({}); retry with slice={}",
                        range,
                        detail,
                        backoff.width()
                    );
                }
                _ => {
                    error!("slice {} failed at minimum slice width: {}", range, detail);
                    if backoff.start() > 0 {
                        discard_partial_output(pdf, out_dir);
                    }
                    return Err(RouteError::MinSlice {
                        path: pdf.to_path_buf(),
                        start: range.start,
                        end: range.end,
                        width,
                        detail,
                    });
                }
            }
        }

        Ok(report)
    }

    fn single_pass(&self, pdf: &Path, out_dir: &Path) -> Result<SliceReport, RouteError> {
        warn!(
            "page count unknown for {}; running {} once over the whole document",
            pdf.display(),
            self.engine.name()
        );
        let started = Instant::now();
        let res = self.engine.convert(&ConvertRequest::whole(pdf, out_dir));
        if !res.ok {
            let detail = res
                .error
                .map(|f| f.to_string())
                .unwrap_or_else(|| "engine reported failure".to_string());
            error!("single-pass conversion failed: {}", detail);
            return Err(RouteError::SinglePass {
                path: pdf.to_path_buf(),
                detail,
            });
        }
        info!(
            "single-pass done in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(SliceReport {
            pages_done: res.pages_processed,
            single_pass: true,
            ..Default::default()
        })
    }
}

/// Slices written before an abort do not make a valid document.
fn discard_partial_output(pdf: &Path, out_dir: &Path) {
    let partial = ConvertRequest::whole(pdf, out_dir).output_path("md");
    if partial.exists() {
        match std::fs::remove_file(&partial) {
            Ok(()) => warn!("removed partial output {}", partial.display()),
            Err(e) => warn!("could not remove partial output {}: {e}", partial.display()),
        }
    }
}
