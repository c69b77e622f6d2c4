use crate::error::EXIT_OK;
use crate::report::{BatchSummary, DocumentReport};
use crate::router::Router;
use crate::util::{now_rfc3339, panic_message};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Routes each file in order. A failing or panicking document never stops
/// the batch; the first non-zero exit code becomes the batch's code. The
/// router already folds engine panics into `Unhandled`; the net here only
/// catches what escapes report construction itself.
pub struct BatchRunner<'a> {
    router: Router<'a>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(router: Router<'a>) -> Self {
        Self { router }
    }

    pub fn run(&self, files: &[PathBuf], slice: u32) -> BatchSummary {
        let started_at = now_rfc3339();
        let started = Instant::now();
        let total = files.len();
        let mut documents = Vec::with_capacity(total);

        for (i, pdf) in files.iter().enumerate() {
            let routed = panic::catch_unwind(AssertUnwindSafe(|| {
                self.router.route_document(pdf, i + 1, total, slice)
            }));
            let doc = match routed {
                Ok(doc) => doc,
                Err(payload) => {
                    let detail = panic_message(payload.as_ref());
                    error!("crash while processing {}: {}", pdf.display(), detail);
                    DocumentReport::crashed(pdf, detail)
                }
            };
            documents.push(doc);
        }

        let failures = documents.iter().filter(|d| !d.ok()).count();
        let exit_code = documents
            .iter()
            .map(|d| d.exit_code)
            .find(|&c| c != EXIT_OK)
            .unwrap_or(EXIT_OK);
        let elapsed = started.elapsed().as_secs_f64();
        info!(
            "summary total={} failures={} elapsed={:.2}s exit={}",
            total, failures, elapsed, exit_code
        );

        BatchSummary {
            started: started_at,
            finished: now_rfc3339(),
            total,
            failures,
            exit_code,
            elapsed_seconds: elapsed,
            documents,
        }
    }
}
