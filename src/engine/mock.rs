use super::{ConversionResult, ConvertRequest, DepCheck, Engine};
use crate::config::Mock;
use crate::error::{EngineFailure, ErrorKind};
use std::io::Write;

pub const MOCK_HEADER: &str = "# MOCK MARKER OUTPUT";

/// Stand-in for the heavy engine.
///
/// Unlike every real engine it appends to `<stem>.md` instead of overwriting,
/// so repeated invocations (one per slice) stay observable.
pub struct MockEngine {
    mock: Mock,
}

impl MockEngine {
    pub fn new(mock: &Mock) -> Self {
        Self { mock: mock.clone() }
    }

    fn should_fail(&self, req: &ConvertRequest) -> bool {
        if self.mock.fail {
            return true;
        }
        match req.range {
            Some(r) => self.mock.fail_if_slice_gt > 0 && r.pages() > self.mock.fail_if_slice_gt,
            None => false,
        }
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn convert(&self, req: &ConvertRequest) -> ConversionResult {
        if self.should_fail(req) {
            return ConversionResult::failure(EngineFailure::new(
                ErrorKind::EngineFailed,
                match req.range {
                    Some(r) => format!("mock failure for slice {r}"),
                    None => "mock failure for single pass".to_string(),
                },
            ));
        }

        let note = match req.range {
            Some(r) => format!("mock marker slice {r}"),
            None => "mock marker single-pass".to_string(),
        };
        let out_path = req.output_path("md");
        let has_content = std::fs::metadata(&out_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        let block = format!(
            "{}{MOCK_HEADER}\n{note}\nSource: {}\n",
            if has_content { "\n\n" } else { "" },
            req.input_pdf.display()
        );
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&out_path)
            .and_then(|mut fh| fh.write_all(block.as_bytes()));
        if let Err(e) = written {
            return ConversionResult::failure(EngineFailure::new(
                ErrorKind::EngineFailed,
                format!("write {}: {e}", out_path.display()),
            ));
        }
        ConversionResult::success(req.range.map(|r| r.pages()).unwrap_or(0))
    }

    fn doctor(&self) -> DepCheck {
        DepCheck {
            engine: self.name().to_string(),
            ok: true,
            detail: "built in".to_string(),
        }
    }
}
