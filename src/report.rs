use crate::driver::SliceReport;
use crate::error::{EXIT_CRASH, ErrorKind};
use crate::router::{Reason, RoutingDecision};
use crate::util::{ensure_dir, hash_file};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub engine: String,
    pub sliced: bool,
    #[serde(default)]
    pub reason: Option<Reason>,
    pub exit_code: i32,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub detail: Option<String>,
    pub seconds: f64,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub slices: Option<SliceReport>,
}

impl DocumentReport {
    pub fn new(path: &Path, decision: &RoutingDecision) -> Self {
        Self {
            path: path.to_path_buf(),
            engine: decision.engine.clone(),
            sliced: decision.use_slicing,
            reason: Some(decision.reason),
            exit_code: 0,
            error_kind: None,
            detail: None,
            seconds: 0.0,
            sha256: None,
            slices: None,
        }
    }

    /// A document that never reached a routing decision.
    pub fn unrouted(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            engine: String::new(),
            sliced: false,
            reason: None,
            exit_code: 0,
            error_kind: None,
            detail: None,
            seconds: 0.0,
            sha256: None,
            slices: None,
        }
    }

    /// A document whose routing panicked past the router.
    pub fn crashed(path: &Path, detail: String) -> Self {
        Self {
            exit_code: EXIT_CRASH,
            detail: Some(detail),
            ..Self::unrouted(path)
        }
    }

    pub fn ok(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub started: String,
    pub finished: String,
    pub total: usize,
    pub failures: usize,
    pub exit_code: i32,
    pub elapsed_seconds: f64,
    pub documents: Vec<DocumentReport>,
}

impl BatchSummary {
    pub fn attach_hashes(&mut self) {
        for doc in &mut self.documents {
            match hash_file(&doc.path) {
                Ok(h) => doc.sha256 = Some(h),
                Err(e) => warn!("hash {}: {e:#}", doc.path.display()),
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).with_context(|| format!("write report: {}", path.display()))
    }
}
