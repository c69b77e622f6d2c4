use crate::classify::{self, PageStats};
use crate::config::{Config, Mode};
use crate::driver::{SliceDriver, SliceReport};
use crate::engine::{ConvertRequest, Engine, FAST_ENGINE, HEAVY_ENGINE, Registry};
use crate::error::{EXIT_OK, EngineFailure, ErrorKind, RouteError};
use crate::report::DocumentReport;
use crate::tables;
use crate::util::{ensure_dir, panic_message};
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    ForcedEngine,
    ForcedFast,
    ForcedHeavy,
    Textual,
    NonTextual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub engine: String,
    pub use_slicing: bool,
    pub reason: Reason,
    /// Present only when the classifier ran.
    #[serde(default)]
    pub stats: Option<PageStats>,
}

impl RoutingDecision {
    fn direct(engine: &str, reason: Reason) -> Self {
        Self {
            engine: engine.to_string(),
            use_slicing: false,
            reason,
            stats: None,
        }
    }
}

pub struct Router<'a> {
    cfg: &'a Config,
    registry: &'a Registry,
}

impl<'a> Router<'a> {
    pub fn new(cfg: &'a Config, registry: &'a Registry) -> Self {
        Self { cfg, registry }
    }

    /// First match wins: forced engine, forced mode, then classification.
    pub fn decide(&self, pdf: &Path) -> RoutingDecision {
        let sel = &self.cfg.engine;
        if let Some(forced) = non_empty(&sel.forced) {
            return RoutingDecision::direct(forced, Reason::ForcedEngine);
        }

        match self.cfg.run.mode {
            Mode::Fast => RoutingDecision::direct(FAST_ENGINE, Reason::ForcedFast),
            Mode::Heavy => RoutingDecision {
                engine: HEAVY_ENGINE.to_string(),
                use_slicing: true,
                reason: Reason::ForcedHeavy,
                stats: None,
            },
            Mode::Auto => {
                let cls = &self.cfg.classification;
                let stats = classify::probe(pdf, cls.min_chars_per_page);
                let textual = stats.is_textual(cls.min_ratio);
                info!(
                    "classified textual={} pages={}/{} ratio={:.3}",
                    textual,
                    stats.textual_pages,
                    stats.total_pages,
                    stats.ratio()
                );

                let mut decision = if textual {
                    RoutingDecision::direct(
                        non_empty(&sel.textual).unwrap_or(FAST_ENGINE),
                        Reason::Textual,
                    )
                } else {
                    match non_empty(&sel.non_textual) {
                        Some(name) => RoutingDecision::direct(name, Reason::NonTextual),
                        None => RoutingDecision {
                            engine: HEAVY_ENGINE.to_string(),
                            use_slicing: true,
                            reason: Reason::NonTextual,
                            stats: None,
                        },
                    }
                };
                decision.stats = Some(stats);
                decision
            }
        }
    }

    pub fn route(&self, pdf: &Path, index: usize, total: usize, slice: u32) -> i32 {
        self.route_document(pdf, index, total, slice).exit_code
    }

    /// Routes one document. Every failure, engine panics included, is folded
    /// into the returned report.
    pub fn route_document(
        &self,
        pdf: &Path,
        index: usize,
        total: usize,
        slice: u32,
    ) -> DocumentReport {
        let started = Instant::now();
        info!("[{}/{}] {}", index, total, pdf.display());

        let decision = match panic::catch_unwind(AssertUnwindSafe(|| self.decide(pdf))) {
            Ok(decision) => decision,
            Err(payload) => {
                let mut report = DocumentReport::unrouted(pdf);
                fail(&mut report, pdf, unhandled_panic(payload.as_ref()));
                report.seconds = started.elapsed().as_secs_f64();
                return report;
            }
        };
        info!(
            "route engine={} slicing={} reason={:?}",
            decision.engine, decision.use_slicing, decision.reason
        );

        let mut report = DocumentReport::new(pdf, &decision);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(&decision, pdf, slice)
        }))
        .unwrap_or_else(|payload| Err(unhandled_panic(payload.as_ref())));
        match outcome {
            Ok(slices) => {
                report.slices = slices;
                report.exit_code = EXIT_OK;
            }
            Err(err) => fail(&mut report, pdf, err),
        }
        report.seconds = started.elapsed().as_secs_f64();
        report
    }

    fn execute(
        &self,
        decision: &RoutingDecision,
        pdf: &Path,
        slice: u32,
    ) -> Result<Option<SliceReport>, RouteError> {
        let engine = self.registry.get(&decision.engine);
        let dry_run = self.cfg.run.dry_run;

        if dry_run && !decision.use_slicing {
            match engine {
                Some(e) => info!("dry run: would run {} on {}", e.name(), pdf.display()),
                None => warn!("dry run: engine '{}' is not registered", decision.engine),
            }
            return Ok(None);
        }

        let engine = engine.ok_or_else(|| RouteError::UnknownEngine {
            name: decision.engine.clone(),
        })?;
        let out_dir = self.out_dir(pdf);
        if !dry_run {
            ensure_dir(&out_dir)?;
        }

        let slices = if decision.use_slicing {
            let driver = SliceDriver::new(engine, dry_run, self.cfg.run.progress);
            Some(driver.run(pdf, &out_dir, slice)?)
        } else {
            run_direct(engine, pdf, &out_dir)?;
            None
        };

        if self.cfg.tables.enabled && !dry_run {
            self.extract_tables(pdf, &out_dir);
        }
        Ok(slices)
    }

    fn out_dir(&self, pdf: &Path) -> PathBuf {
        if self.cfg.paths.out_dir.is_empty() {
            pdf.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            PathBuf::from(&self.cfg.paths.out_dir)
        }
    }

    fn extract_tables(&self, pdf: &Path, out_dir: &Path) {
        match tables::extract_to_file(&self.cfg.tables, pdf, out_dir)
            .with_context(|| format!("tables for {}", pdf.display()))
        {
            Ok(Some(path)) => info!("tables -> {}", path.display()),
            Ok(None) => warn!("no tables found in {}", pdf.display()),
            Err(e) => warn!("table extraction skipped: {e:#}"),
        }
    }
}

fn fail(report: &mut DocumentReport, pdf: &Path, err: RouteError) {
    error!("{} failed: {err}", pdf.display());
    report.exit_code = err.exit_code();
    report.error_kind = Some(err.kind());
    report.detail = Some(err.to_string());
}

fn unhandled_panic(payload: &(dyn std::any::Any + Send)) -> RouteError {
    RouteError::Unhandled(anyhow!("panic: {}", panic_message(payload)))
}

fn run_direct(engine: &dyn Engine, pdf: &Path, out_dir: &Path) -> Result<(), RouteError> {
    let res = engine.convert(&ConvertRequest::whole(pdf, out_dir));
    if res.ok {
        return Ok(());
    }
    let failure = res
        .error
        .unwrap_or_else(|| EngineFailure::new(ErrorKind::EngineFailed, "engine reported failure"));
    Err(RouteError::Engine {
        engine: engine.name().to_string(),
        path: pdf.to_path_buf(),
        failure,
    })
}

fn non_empty(name: &Option<String>) -> Option<&str> {
    name.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
