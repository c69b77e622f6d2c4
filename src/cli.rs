use crate::{
    batch::BatchRunner,
    config::{Config, Mode, OutputFormat, TablesMode},
    discover::discover,
    engine::Registry,
    error::{EXIT_FAILURE, EXIT_OK, EXIT_USAGE},
    router::Router,
    util::{ensure_dir, rotate_log_file},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, builder::FalseyValueParser};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "smart-pdf-md.toml";
const USAGE: &str = "usage: smart-pdf-md INPUT SLICE [-C CONFIG] [options]";

#[derive(Parser, Debug)]
#[command(name = "smart-pdf-md")]
#[command(version)]
#[command(about = "Route PDFs to fast text extraction or a sliced layout-aware converter")]
pub struct Args {
    /// PDF file or directory (searched recursively).
    pub input: Option<PathBuf>,

    /// Pages per heavy-engine slice.
    pub slice: Option<u32>,

    /// Config file (.toml, .yaml or .json). If omitted, uses ./smart-pdf-md.toml if present.
    #[arg(short = 'C', long, env = "SMART_PDF_MD_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short = 'm', long, value_enum, env = "SMART_PDF_MD_MODE")]
    pub mode: Option<Mode>,

    /// Output directory (default: next to each PDF).
    #[arg(short = 'o', long = "out", env = "SMART_PDF_MD_OUTPUT_DIR")]
    pub out_dir: Option<PathBuf>,

    #[arg(
        short = 'i',
        long,
        env = "SMART_PDF_MD_IMAGES",
        value_parser = FalseyValueParser::new(),
        conflicts_with = "no_images"
    )]
    pub images: bool,

    #[arg(short = 'I', long)]
    pub no_images: bool,

    /// Non-whitespace characters a page needs to count as textual.
    #[arg(short = 'c', long, env = "SMART_PDF_MD_TEXT_MIN_CHARS")]
    pub min_chars: Option<u32>,

    /// Share of textual pages a document needs to take the fast path.
    #[arg(short = 'r', long, env = "SMART_PDF_MD_TEXT_MIN_RATIO")]
    pub min_ratio: Option<f64>,

    /// Force one engine for every document, bypassing classification.
    #[arg(short = 'e', long, env = "SMART_PDF_MD_ENGINE")]
    pub engine: Option<String>,

    #[arg(long, env = "SMART_PDF_MD_ENGINE_TEXTUAL")]
    pub engine_textual: Option<String>,

    #[arg(long, env = "SMART_PDF_MD_ENGINE_NON_TEXTUAL")]
    pub engine_non_textual: Option<String>,

    #[arg(short = 'f', long, value_enum, env = "SMART_PDF_MD_OUTPUT_FORMAT")]
    pub format: Option<OutputFormat>,

    #[arg(short = 'n', long, env = "SMART_PDF_MD_DRY_RUN", value_parser = FalseyValueParser::new())]
    pub dry_run: bool,

    #[arg(short = 'p', long, env = "SMART_PDF_MD_PROGRESS", value_parser = FalseyValueParser::new())]
    pub progress: bool,

    /// Glob of files to keep when INPUT is a directory (repeatable).
    #[arg(short = 'S', long)]
    pub include: Vec<String>,

    /// Glob of files to skip when INPUT is a directory (repeatable).
    #[arg(short = 'X', long)]
    pub exclude: Vec<String>,

    #[arg(long, env = "SMART_PDF_MD_TABLES", value_parser = FalseyValueParser::new())]
    pub tables: bool,

    #[arg(long, value_enum, env = "SMART_PDF_MD_TABLES_MODE")]
    pub tables_mode: Option<TablesMode>,

    /// Python interpreter used to run the heavy converter as a module.
    #[arg(long, env = "SMART_PDF_MD_PYTHON")]
    pub python: Option<String>,

    #[arg(short = 'M', long, env = "SMART_PDF_MD_MARKER_MOCK", value_parser = FalseyValueParser::new())]
    pub mock: bool,

    #[arg(short = 'F', long, env = "SMART_PDF_MD_MARKER_MOCK_FAIL", value_parser = FalseyValueParser::new())]
    pub mock_fail: bool,

    #[arg(long, env = "SMART_PDF_MD_MOCK_FAIL_IF_SLICE_GT")]
    pub mock_fail_if_slice_gt: Option<u32>,

    /// trace/debug/info/warn/error (WARNING and CRITICAL are accepted).
    #[arg(short = 'L', long, env = "SMART_PDF_MD_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, env = "SMART_PDF_MD_LOG_JSON", value_parser = FalseyValueParser::new())]
    pub log_json: bool,

    #[arg(long, env = "SMART_PDF_MD_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Write a JSON run report here.
    #[arg(long, env = "SMART_PDF_MD_REPORT")]
    pub report: Option<PathBuf>,

    /// Print engine dependency status as JSON and exit.
    #[arg(long)]
    pub doctor: bool,
}

/// Runs the tool and returns the process exit code.
pub fn dispatch(args: Args) -> i32 {
    let loaded = resolve_config_path(args.config.as_deref())
        .and_then(|path| match path {
            Some(p) => Config::load(&p),
            None => Ok(Config::default()),
        })
        .map(|cfg| merge(cfg, &args));

    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(err) => {
            let _guard = init_logging(&Config::default()).ok().flatten();
            error!("config load failed: {err:#}");
            return EXIT_USAGE;
        }
    };

    let _guard = match init_logging(&cfg) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{err:#}");
            return EXIT_USAGE;
        }
    };

    if let Err(err) = cfg.validate() {
        error!("invalid configuration: {err:#}");
        return EXIT_USAGE;
    }

    if args.doctor {
        return doctor(&cfg);
    }

    let (Some(input), Some(slice)) = (cfg.run.input.clone(), cfg.run.slice) else {
        error!("{USAGE}");
        return EXIT_USAGE;
    };

    run(&cfg, Path::new(&input), slice)
}

fn run(cfg: &Config, input: &Path, slice: u32) -> i32 {
    let files = match discover(input, &cfg.discovery) {
        Ok(files) => files,
        Err(err) => {
            error!("{err:#}");
            return EXIT_FAILURE;
        }
    };
    if files.is_empty() {
        warn!("no PDF files found under {}", input.display());
        return EXIT_FAILURE;
    }

    let registry = Registry::standard(cfg);
    let runner = BatchRunner::new(Router::new(cfg, &registry));
    let mut summary = runner.run(&files, slice);

    if !cfg.output.report_path.is_empty() {
        let path = PathBuf::from(&cfg.output.report_path);
        summary.attach_hashes();
        match summary.write(&path) {
            Ok(()) => info!("report -> {}", path.display()),
            Err(err) => error!("{err:#}"),
        }
    }
    summary.exit_code
}

fn doctor(cfg: &Config) -> i32 {
    let checks = Registry::standard(cfg).doctor();
    match serde_json::to_string_pretty(&checks) {
        Ok(raw) => {
            println!("{raw}");
            EXIT_OK
        }
        Err(err) => {
            error!("doctor: {err}");
            EXIT_FAILURE
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config file not found: {}", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    let default = PathBuf::from(DEFAULT_CONFIG);
    Ok(default.exists().then_some(default))
}

/// Layers environment and flags over the loaded file. `Args` already folds
/// `SMART_PDF_MD_*` variables in underneath the flags.
pub fn merge(mut cfg: Config, args: &Args) -> Config {
    if let Some(input) = &args.input {
        cfg.run.input = Some(input.display().to_string());
    }
    if args.slice.is_some() {
        cfg.run.slice = args.slice;
    }
    if let Some(mode) = args.mode {
        cfg.run.mode = mode;
    }
    if let Some(out) = &args.out_dir {
        cfg.paths.out_dir = out.display().to_string();
    }
    if args.no_images {
        cfg.heavy.images = false;
    } else if args.images {
        cfg.heavy.images = true;
    }
    if let Some(n) = args.min_chars {
        cfg.classification.min_chars_per_page = n;
    }
    if let Some(r) = args.min_ratio {
        cfg.classification.min_ratio = r;
    }
    if args.engine.is_some() {
        cfg.engine.forced = args.engine.clone();
    }
    if args.engine_textual.is_some() {
        cfg.engine.textual = args.engine_textual.clone();
    }
    if args.engine_non_textual.is_some() {
        cfg.engine.non_textual = args.engine_non_textual.clone();
    }
    if let Some(format) = args.format {
        cfg.output.format = format;
    }
    cfg.run.dry_run |= args.dry_run;
    cfg.run.progress |= args.progress;
    if !args.include.is_empty() {
        cfg.discovery.include = args.include.clone();
    }
    if !args.exclude.is_empty() {
        cfg.discovery.exclude = args.exclude.clone();
    }
    cfg.tables.enabled |= args.tables;
    if let Some(mode) = args.tables_mode {
        cfg.tables.mode = mode;
    }
    if let Some(python) = &args.python {
        cfg.heavy.python_exe = python.clone();
    }
    cfg.mock.enabled |= args.mock;
    cfg.mock.fail |= args.mock_fail;
    if let Some(n) = args.mock_fail_if_slice_gt {
        cfg.mock.fail_if_slice_gt = n;
    }
    if let Some(level) = &args.log_level {
        cfg.logging.level = level.clone();
    }
    cfg.logging.json |= args.log_json;
    if let Some(path) = &args.log_file {
        cfg.logging.file_path = path.display().to_string();
    }
    if let Some(path) = &args.report {
        cfg.output.report_path = path.display().to_string();
    }
    cfg
}

/// Maps legacy level names onto `tracing` levels.
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

fn init_logging(cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = normalize_level(&cfg.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.file_path.is_empty() {
        (None, None)
    } else {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            ensure_dir(parent)?;
        }
        rotate_log_file(path, cfg.logging.rotate_bytes)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = if cfg.logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed()
        };
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}
