use super::process::{self, find_program, timeout_from_secs};
use super::{ConversionResult, ConvertRequest, DepCheck, Engine};
use crate::config::{Heavy, OutputFormat};
use crate::error::{EngineFailure, ErrorKind};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the tool leaves its result.
#[derive(Debug, Clone, Copy)]
pub enum Delivery {
    /// The tool writes the output path it is given.
    File,
    /// The tool writes `<stem>.md` into a directory it is given.
    Directory,
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub programs: &'static [&'static str],
    pub delivery: Delivery,
    /// Layout-aware tools always emit Markdown regardless of output format.
    pub markdown_only: bool,
    pub build_args: fn(input: &Path, target: &Path) -> Vec<OsString>,
}

pub fn pdftotext() -> CommandSpec {
    CommandSpec {
        name: "pdftotext",
        programs: &["pdftotext"],
        delivery: Delivery::File,
        markdown_only: false,
        build_args: |input, target| {
            vec![
                "-enc".into(),
                "UTF-8".into(),
                "-layout".into(),
                input.into(),
                target.into(),
            ]
        },
    }
}

pub fn ghostscript() -> CommandSpec {
    CommandSpec {
        name: "ghostscript",
        programs: &["gs", "gswin64c", "gswin32c"],
        delivery: Delivery::File,
        markdown_only: false,
        build_args: |input, target| {
            let mut out = OsString::from("-sOutputFile=");
            out.push(target);
            vec![
                "-q".into(),
                "-dNOPAUSE".into(),
                "-dBATCH".into(),
                "-dSAFER".into(),
                "-sDEVICE=txtwrite".into(),
                out,
                input.into(),
            ]
        },
    }
}

pub fn docling() -> CommandSpec {
    CommandSpec {
        name: "docling",
        programs: &["docling"],
        delivery: Delivery::Directory,
        markdown_only: true,
        build_args: |input, target| {
            vec![
                "--to".into(),
                "md".into(),
                "--output".into(),
                target.into(),
                input.into(),
            ]
        },
    }
}

pub struct CommandEngine {
    spec: CommandSpec,
    format: OutputFormat,
    heavy: Heavy,
}

impl CommandEngine {
    pub fn new(spec: CommandSpec, format: OutputFormat, heavy: &Heavy) -> Self {
        Self {
            spec,
            format,
            heavy: heavy.clone(),
        }
    }

    fn program(&self) -> Result<PathBuf, EngineFailure> {
        find_program(self.spec.programs).ok_or_else(|| {
            EngineFailure::missing_dependency(format!(
                "{} not found on PATH (tried {})",
                self.spec.name,
                self.spec.programs.join(", ")
            ))
        })
    }

    fn extension(&self) -> &'static str {
        if self.spec.markdown_only {
            "md"
        } else {
            self.format.extension()
        }
    }

    fn run(&self, program: &Path, req: &ConvertRequest) -> Result<PathBuf, String> {
        let out_path = req.output_path(self.extension());
        let timeout = timeout_from_secs(self.heavy.timeout_seconds);
        match self.spec.delivery {
            Delivery::File => {
                let args = (self.spec.build_args)(&req.input_pdf, &out_path);
                let output = process::run(program, &args, &self.heavy.env, timeout)
                    .map_err(|e| format!("{e:#}"))?;
                process::check_status(program, &output)?;
            }
            Delivery::Directory => {
                let scratch = tempfile::Builder::new()
                    .prefix(&format!(".{}-", self.spec.name))
                    .tempdir_in(&req.out_dir)
                    .map_err(|e| format!("create scratch dir: {e}"))?;
                let args = (self.spec.build_args)(&req.input_pdf, scratch.path());
                let output = process::run(program, &args, &self.heavy.env, timeout)
                    .map_err(|e| format!("{e:#}"))?;
                process::check_status(program, &output)?;
                let produced = scratch.path().join(format!("{}.md", req.stem()));
                std::fs::copy(&produced, &out_path)
                    .map_err(|e| format!("collect {}: {e}", produced.display()))?;
            }
        }
        Ok(out_path)
    }
}

impl Engine for CommandEngine {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn convert(&self, req: &ConvertRequest) -> ConversionResult {
        let program = match self.program() {
            Ok(p) => p,
            Err(failure) => return ConversionResult::failure(failure),
        };
        match self.run(&program, req) {
            Ok(out_path) => {
                info!(
                    "{} {} -> {}",
                    self.spec.name,
                    req.input_pdf.display(),
                    out_path.display()
                );
                ConversionResult::success(0)
            }
            Err(detail) => {
                ConversionResult::failure(EngineFailure::new(ErrorKind::EngineFailed, detail))
            }
        }
    }

    fn doctor(&self) -> DepCheck {
        let (ok, detail) = match self.program() {
            Ok(p) => (true, p.display().to_string()),
            Err(f) => (false, f.detail),
        };
        DepCheck {
            engine: self.spec.name.to_string(),
            ok,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn ghostscript_writes_through_txtwrite_device() {
        let args = strings((ghostscript().build_args)(
            Path::new("a.pdf"),
            Path::new("out/a.md"),
        ));
        assert!(args.contains(&"-sDEVICE=txtwrite".to_string()));
        assert!(args.contains(&"-sOutputFile=out/a.md".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("a.pdf"));
    }

    #[test]
    fn layout_tools_ignore_plain_text_format() {
        let heavy = Heavy::default();
        let docling = CommandEngine::new(docling(), OutputFormat::Txt, &heavy);
        assert_eq!(docling.extension(), "md");
        let poppler = CommandEngine::new(pdftotext(), OutputFormat::Txt, &heavy);
        assert_eq!(poppler.extension(), "txt");
    }
}
