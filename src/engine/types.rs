use crate::error::EngineFailure;
use crate::slice::PageRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub input_pdf: PathBuf,
    pub out_dir: PathBuf,
    /// `None` converts the whole document in one pass.
    pub range: Option<PageRange>,
}

impl ConvertRequest {
    pub fn whole(input_pdf: &Path, out_dir: &Path) -> Self {
        Self {
            input_pdf: input_pdf.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            range: None,
        }
    }

    pub fn slice(input_pdf: &Path, out_dir: &Path, range: PageRange) -> Self {
        Self {
            input_pdf: input_pdf.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            range: Some(range),
        }
    }

    pub fn stem(&self) -> String {
        self.input_pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }

    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.out_dir.join(format!("{}.{}", self.stem(), extension))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub ok: bool,
    pub pages_processed: u32,
    #[serde(default)]
    pub error: Option<EngineFailure>,
}

impl ConversionResult {
    pub fn success(pages_processed: u32) -> Self {
        Self {
            ok: true,
            pages_processed,
            error: None,
        }
    }

    pub fn failure(failure: EngineFailure) -> Self {
        Self {
            ok: false,
            pages_processed: 0,
            error: Some(failure),
        }
    }
}

/// Dependency report printed by `--doctor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepCheck {
    pub engine: String,
    pub ok: bool,
    pub detail: String,
}
