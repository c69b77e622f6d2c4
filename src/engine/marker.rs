//! Layout-aware conversion through marker's single-file converter.
//!
//! Each invocation writes into a scratch directory under the output
//! directory. Only after the subprocess succeeds is its Markdown written (first
//! slice, single pass) or appended (later slices) to `<out>/<stem>.md`, so a
//! failed slice never leaves half a file behind.

use super::process::{self, expand_tilde, find_program, timeout_from_secs};
use super::{ConversionResult, ConvertRequest, DepCheck, Engine};
use crate::config::Heavy;
use crate::error::{EngineFailure, ErrorKind};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MARKER_MODULE: &str = "marker.scripts.convert_single";

pub struct MarkerEngine {
    heavy: Heavy,
}

struct Invocation {
    program: PathBuf,
    prefix: Vec<OsString>,
}

impl MarkerEngine {
    pub fn new(heavy: &Heavy) -> Self {
        Self {
            heavy: heavy.clone(),
        }
    }

    fn resolve(&self) -> Result<Invocation, EngineFailure> {
        let configured = self.heavy.executable.trim();
        if !configured.is_empty() && !configured.eq_ignore_ascii_case("auto") {
            let p = expand_tilde(configured);
            if p.exists() {
                return Ok(Invocation {
                    program: p,
                    prefix: vec![],
                });
            }
            return which::which(configured)
                .map(|program| Invocation {
                    program,
                    prefix: vec![],
                })
                .map_err(|_| {
                    EngineFailure::missing_dependency(format!(
                        "configured marker executable not found: {configured}"
                    ))
                });
        }

        if let Some(program) = find_program(&["marker_single"]) {
            return Ok(Invocation {
                program,
                prefix: vec![],
            });
        }

        let python = self.heavy.python_exe.trim();
        let python = if python.is_empty() || python.eq_ignore_ascii_case("auto") {
            find_program(&["python3", "python", "py"])
        } else {
            Some(expand_tilde(python)).filter(|p| p.exists())
        };
        match python {
            Some(program) => Ok(Invocation {
                program,
                prefix: vec!["-m".into(), MARKER_MODULE.into()],
            }),
            None => Err(EngineFailure::missing_dependency(
                "marker_single not found on PATH and no Python interpreter for the module fallback",
            )),
        }
    }

    fn args(&self, inv: &Invocation, req: &ConvertRequest, scratch: &Path) -> Vec<OsString> {
        let mut args = inv.prefix.clone();
        args.push(req.input_pdf.clone().into_os_string());
        args.push("--output_format".into());
        args.push("markdown".into());
        if !self.heavy.images {
            args.push("--disable_image_extraction".into());
        }
        if let Some(range) = req.range {
            args.push("--page_range".into());
            args.push(range.to_string().into());
        }
        args.push("--output_dir".into());
        args.push(scratch.as_os_str().to_owned());
        args.push("--lowres_image_dpi".into());
        args.push(self.heavy.lowres_dpi.to_string().into());
        args.push("--highres_image_dpi".into());
        args.push(self.heavy.highres_dpi.to_string().into());
        args
    }

    fn collect(&self, req: &ConvertRequest, scratch: &Path) -> Result<(), String> {
        let wanted = format!("{}.md", req.stem());
        let produced = WalkDir::new(scratch)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|x| x == "md"))
            .min_by_key(|p| p.file_name().is_none_or(|n| n != wanted.as_str()))
            .ok_or_else(|| format!("marker produced no markdown in {}", scratch.display()))?;

        let markdown = std::fs::read_to_string(&produced)
            .map_err(|e| format!("read {}: {e}", produced.display()))?;
        let out_path = req.output_path("md");
        let first = req.range.is_none_or(|r| r.start == 0);
        write_or_append(&out_path, &markdown, !first)
            .map_err(|e| format!("write {}: {e}", out_path.display()))?;

        if self.heavy.images {
            if let Some(dir) = produced.parent() {
                copy_assets(dir, &req.out_dir, &produced);
            }
        }
        Ok(())
    }
}

fn write_or_append(path: &Path, body: &str, append: bool) -> std::io::Result<()> {
    if !append {
        return std::fs::write(path, body);
    }
    let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let mut fh = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if has_content {
        fh.write_all(b"\n\n")?;
    }
    fh.write_all(body.as_bytes())
}

fn copy_assets(from: &Path, to: &Path, skip: &Path) {
    let Ok(entries) = std::fs::read_dir(from) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path == skip || !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().ends_with("_meta.json") {
            continue;
        }
        if let Err(e) = std::fs::copy(&path, to.join(&name)) {
            warn!("could not copy marker asset {}: {e}", path.display());
        }
    }
}

impl Engine for MarkerEngine {
    fn name(&self) -> &str {
        "marker"
    }

    fn convert(&self, req: &ConvertRequest) -> ConversionResult {
        let inv = match self.resolve() {
            Ok(inv) => inv,
            Err(failure) => return ConversionResult::failure(failure),
        };

        let scratch = match tempfile::Builder::new()
            .prefix(".marker-")
            .tempdir_in(&req.out_dir)
        {
            Ok(dir) => dir,
            Err(e) => {
                return ConversionResult::failure(EngineFailure::new(
                    ErrorKind::EngineFailed,
                    format!("create scratch dir in {}: {e}", req.out_dir.display()),
                ));
            }
        };

        let args = self.args(&inv, req, scratch.path());
        info!(
            "run {} {}",
            inv.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let started = Instant::now();
        let output = match process::run(
            &inv.program,
            &args,
            &self.heavy.env,
            timeout_from_secs(self.heavy.timeout_seconds),
        ) {
            Ok(output) => output,
            Err(e) => {
                return ConversionResult::failure(EngineFailure::new(
                    ErrorKind::EngineFailed,
                    format!("{e:#}"),
                ));
            }
        };
        if let Err(detail) = process::check_status(&inv.program, &output) {
            return ConversionResult::failure(EngineFailure::new(ErrorKind::EngineFailed, detail));
        }
        if let Err(detail) = self.collect(req, scratch.path()) {
            return ConversionResult::failure(EngineFailure::new(ErrorKind::EngineFailed, detail));
        }
        debug!("marker finished in {:.2}s", started.elapsed().as_secs_f64());

        ConversionResult::success(req.range.map(|r| r.pages()).unwrap_or(0))
    }

    fn doctor(&self) -> DepCheck {
        let (ok, detail) = match self.resolve() {
            Ok(inv) if inv.prefix.is_empty() => (true, inv.program.display().to_string()),
            Ok(inv) => (
                true,
                format!("{} -m {MARKER_MODULE} (module not verified)", inv.program.display()),
            ),
            Err(f) => (false, f.detail),
        };
        DepCheck {
            engine: self.name().to_string(),
            ok,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::PageRange;

    fn engine(images: bool) -> MarkerEngine {
        let mut heavy = Heavy::default();
        heavy.images = images;
        MarkerEngine::new(&heavy)
    }

    fn direct() -> Invocation {
        Invocation {
            program: PathBuf::from("marker_single"),
            prefix: vec![],
        }
    }

    #[test]
    fn slice_arguments_carry_page_range_and_dpi() {
        let req = ConvertRequest::slice(
            Path::new("in/doc.pdf"),
            Path::new("out"),
            PageRange::new(10, 19),
        );
        let args: Vec<String> = engine(false)
            .args(&direct(), &req, Path::new("out/.scratch"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "in/doc.pdf");
        assert!(args.contains(&"--disable_image_extraction".to_string()));
        let i = args.iter().position(|a| a == "--page_range").unwrap();
        assert_eq!(args[i + 1], "10-19");
        assert!(args.windows(2).any(|w| w[0] == "--lowres_image_dpi" && w[1] == "96"));
        assert!(args.windows(2).any(|w| w[0] == "--highres_image_dpi" && w[1] == "120"));
    }

    #[test]
    fn single_pass_has_no_page_range_and_images_keep_extraction() {
        let req = ConvertRequest::whole(Path::new("doc.pdf"), Path::new("out"));
        let args: Vec<String> = engine(true)
            .args(&direct(), &req, Path::new("s"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!args.contains(&"--page_range".to_string()));
        assert!(!args.contains(&"--disable_image_extraction".to_string()));
    }

    #[test]
    fn module_fallback_prefixes_python_arguments() {
        let inv = Invocation {
            program: PathBuf::from("python3"),
            prefix: vec!["-m".into(), MARKER_MODULE.into()],
        };
        let req = ConvertRequest::whole(Path::new("doc.pdf"), Path::new("out"));
        let args = engine(false).args(&inv, &req, Path::new("s"));
        assert_eq!(args[0], "-m");
        assert_eq!(args[1], MARKER_MODULE);
        assert_eq!(args[2], "doc.pdf");
    }

    #[test]
    fn later_slices_append_after_a_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("doc.md");
        write_or_append(&out, "first", false).unwrap();
        write_or_append(&out, "second", true).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "first\n\nsecond");
        write_or_append(&out, "fresh", false).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "fresh");
    }

    #[test]
    fn collect_prefers_markdown_named_after_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch").join("doc");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("aaa.md"), "wrong").unwrap();
        std::fs::write(scratch.join("doc.md"), "right").unwrap();

        let req = ConvertRequest::whole(&dir.path().join("doc.pdf"), dir.path());
        engine(false)
            .collect(&req, &dir.path().join("scratch"))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("doc.md")).unwrap(),
            "right"
        );
    }
}
