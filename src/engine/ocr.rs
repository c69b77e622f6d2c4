use super::process::{self, find_program, timeout_from_secs};
use super::text::TextEngine;
use super::{ConversionResult, ConvertRequest, DepCheck, Engine};
use crate::config::Heavy;
use crate::error::{EngineFailure, ErrorKind};
use std::ffi::OsString;
use std::path::PathBuf;

/// `ocrmypdf` into a scratch PDF, then direct extraction from the OCR layer.
pub struct OcrEngine {
    text: TextEngine,
    heavy: Heavy,
}

impl OcrEngine {
    pub fn new(text: TextEngine, heavy: &Heavy) -> Self {
        Self {
            text,
            heavy: heavy.clone(),
        }
    }

    fn program(&self) -> Result<PathBuf, EngineFailure> {
        find_program(&["ocrmypdf"])
            .ok_or_else(|| EngineFailure::missing_dependency("ocrmypdf not found on PATH"))
    }
}

impl Engine for OcrEngine {
    fn name(&self) -> &str {
        "ocrmypdf"
    }

    fn convert(&self, req: &ConvertRequest) -> ConversionResult {
        let program = match self.program() {
            Ok(p) => p,
            Err(failure) => return ConversionResult::failure(failure),
        };
        let scratch = match tempfile::Builder::new()
            .prefix(".ocrmypdf-")
            .tempdir_in(&req.out_dir)
        {
            Ok(dir) => dir,
            Err(e) => {
                return ConversionResult::failure(EngineFailure::new(
                    ErrorKind::EngineFailed,
                    format!("create scratch dir: {e}"),
                ));
            }
        };

        let ocr_pdf = scratch.path().join("ocr.pdf");
        let args: Vec<OsString> = vec![
            "--skip-text".into(),
            req.input_pdf.clone().into_os_string(),
            ocr_pdf.clone().into_os_string(),
        ];
        let output = match process::run(
            &program,
            &args,
            &self.heavy.env,
            timeout_from_secs(self.heavy.timeout_seconds),
        ) {
            Ok(o) => o,
            Err(e) => {
                return ConversionResult::failure(EngineFailure::new(
                    ErrorKind::EngineFailed,
                    format!("{e:#}"),
                ));
            }
        };
        if let Err(detail) = process::check_status(&program, &output) {
            return ConversionResult::failure(EngineFailure::new(ErrorKind::EngineFailed, detail));
        }

        self.text.convert_from(&ocr_pdf, req)
    }

    fn doctor(&self) -> DepCheck {
        let (ok, detail) = match self.program() {
            Ok(p) => (true, p.display().to_string()),
            Err(f) => (false, f.detail),
        };
        DepCheck {
            engine: self.name().to_string(),
            ok,
            detail,
        }
    }
}
