use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Unknown top-level keys are rejected so a flat, section-less file fails
/// loudly instead of being ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub run: Run,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub engine: EngineSelection,
    #[serde(default)]
    pub heavy: Heavy,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub tables: Tables,
    #[serde(default)]
    pub discovery: Discovery,
    #[serde(default)]
    pub mock: Mock,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    /// Load a TOML, YAML or JSON config file. Keys are lowercased and `-` becomes `_`
    /// before deserialization, so `min-ratio` and `MIN_RATIO` both work.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        let value: serde_json::Value = match ext.as_str() {
            "toml" => toml::from_str(&raw).with_context(|| "parsing TOML")?,
            "yml" | "yaml" => serde_yaml::from_str(&raw).with_context(|| "parsing YAML")?,
            "json" => serde_json::from_str(&raw).with_context(|| "parsing JSON")?,
            other => bail!("unsupported config extension: .{other}"),
        };
        if !value.is_object() {
            bail!("config must be a table/object at the top level");
        }

        let cfg: Config = serde_json::from_value(normalize_keys(value))
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(slice) = self.run.slice {
            if slice == 0 {
                return Err(anyhow!("slice must be a positive page count"));
            }
        }
        let ratio = self.classification.min_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(anyhow!("min_ratio must be within [0, 1]: {ratio}"));
        }
        Ok(())
    }
}

fn normalize_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.replace('-', "_").to_lowercase(), normalize_keys(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(normalize_keys).collect())
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Auto,
    Fast,
    #[serde(alias = "marker")]
    #[value(alias = "marker")]
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Md,
    Txt,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Txt => "txt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TablesMode {
    #[default]
    Stream,
    Lattice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Run {
    pub input: Option<String>,
    pub slice: Option<u32>,
    pub mode: Mode,
    pub dry_run: bool,
    pub progress: bool,
}
impl Default for Run {
    fn default() -> Self {
        Self {
            input: None,
            slice: None,
            mode: Mode::Auto,
            dry_run: false,
            progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Empty means "next to each input PDF".
    pub out_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub min_chars_per_page: u32,
    pub min_ratio: f64,
}
impl Default for Classification {
    fn default() -> Self {
        Self {
            min_chars_per_page: 100,
            min_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSelection {
    pub forced: Option<String>,
    pub textual: Option<String>,
    pub non_textual: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Heavy {
    pub executable: String,
    pub python_exe: String,
    pub images: bool,
    pub lowres_dpi: u32,
    pub highres_dpi: u32,
    pub timeout_seconds: u64,
    pub env: BTreeMap<String, String>,
}
impl Default for Heavy {
    fn default() -> Self {
        Self {
            executable: "auto".into(),
            python_exe: "auto".into(),
            images: false,
            lowres_dpi: 96,
            highres_dpi: 120,
            timeout_seconds: 0,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub format: OutputFormat,
    pub normalize_unicode: bool,
    pub trim_trailing_whitespace: bool,
    pub report_path: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            format: OutputFormat::Md,
            normalize_unicode: true,
            trim_trailing_whitespace: true,
            report_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub enabled: bool,
    pub mode: TablesMode,
    pub min_rows: usize,
}
impl Default for Tables {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TablesMode::Stream,
            min_rows: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Discovery {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mock {
    pub enabled: bool,
    pub fail: bool,
    pub fail_if_slice_gt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub file_path: String,
    pub rotate_bytes: u64,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            file_path: "".into(),
            rotate_bytes: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_hyphenated_and_uppercase_keys() {
        let raw = serde_json::json!({
            "Classification": { "Min-Chars-Per-Page": 5, "min-ratio": 0.5 },
            "run": { "mode": "marker", "dry-run": true }
        });
        let cfg: Config = serde_json::from_value(normalize_keys(raw)).unwrap();
        assert_eq!(cfg.classification.min_chars_per_page, 5);
        assert_eq!(cfg.classification.min_ratio, 0.5);
        assert_eq!(cfg.run.mode, Mode::Heavy);
        assert!(cfg.run.dry_run);
    }

    #[test]
    fn rejects_out_of_range_ratio_and_zero_slice() {
        let mut cfg = Config::default();
        cfg.classification.min_ratio = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.run.slice = Some(0);
        assert!(cfg.validate().is_err());
    }
}
