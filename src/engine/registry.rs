use super::command::{self, CommandEngine};
use super::marker::MarkerEngine;
use super::mock::MockEngine;
use super::ocr::OcrEngine;
use super::text::TextEngine;
use super::{DepCheck, Engine, FAST_ENGINE, HEAVY_ENGINE};
use crate::config::Config;
use std::collections::BTreeMap;
use tracing::debug;

/// Engines by canonical lowercase name, plus an alias table.
#[derive(Default)]
pub struct Registry {
    engines: BTreeMap<String, Box<dyn Engine>>,
    aliases: BTreeMap<String, String>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, aliases: &[&str], engine: Box<dyn Engine>) {
        let canonical = key(name);
        for alias in aliases {
            self.aliases.insert(key(alias), canonical.clone());
        }
        self.engines.insert(canonical, engine);
    }

    pub fn canonical(&self, name: &str) -> Option<String> {
        let k = key(name);
        if self.engines.contains_key(&k) {
            return Some(k);
        }
        self.aliases
            .get(&k)
            .filter(|c| self.engines.contains_key(*c))
            .cloned()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Engine> {
        let canonical = self.canonical(name)?;
        self.engines.get(&canonical).map(|e| e.as_ref())
    }

    pub fn doctor(&self) -> Vec<DepCheck> {
        self.engines
            .iter()
            .map(|(name, engine)| {
                let mut check = engine.doctor();
                check.engine = name.clone();
                check
            })
            .collect()
    }

    pub fn standard(cfg: &Config) -> Self {
        let mut reg = Self::new();
        let text = || TextEngine::new(&cfg.output, cfg.run.progress);

        reg.register(FAST_ENGINE, &["pymupdf", "text", "lopdf"], Box::new(text()));
        if cfg.mock.enabled {
            debug!("mock enabled: '{HEAVY_ENGINE}' resolves to the mock engine");
            reg.register(HEAVY_ENGINE, &["heavy"], Box::new(MockEngine::new(&cfg.mock)));
        } else {
            reg.register(HEAVY_ENGINE, &["heavy"], Box::new(MarkerEngine::new(&cfg.heavy)));
        }
        reg.register(
            "pdftotext",
            &["poppler"],
            Box::new(CommandEngine::new(
                command::pdftotext(),
                cfg.output.format,
                &cfg.heavy,
            )),
        );
        reg.register(
            "ghostscript",
            &["gs"],
            Box::new(CommandEngine::new(
                command::ghostscript(),
                cfg.output.format,
                &cfg.heavy,
            )),
        );
        reg.register(
            "docling",
            &[],
            Box::new(CommandEngine::new(
                command::docling(),
                cfg.output.format,
                &cfg.heavy,
            )),
        );
        reg.register(
            "ocrmypdf",
            &["ocr"],
            Box::new(OcrEngine::new(text(), &cfg.heavy)),
        );
        reg.register("mock", &[], Box::new(MockEngine::new(&cfg.mock)));
        reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_follows_aliases() {
        let reg = Registry::standard(&Config::default());
        assert_eq!(reg.canonical("FAST").as_deref(), Some("fast"));
        assert_eq!(reg.canonical(" PyMuPDF ").as_deref(), Some("fast"));
        assert_eq!(reg.canonical("Heavy").as_deref(), Some("marker"));
        assert_eq!(reg.canonical("poppler").as_deref(), Some("pdftotext"));
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn mock_flag_swaps_the_heavy_engine() {
        let mut cfg = Config::default();
        assert_eq!(Registry::standard(&cfg).get("marker").unwrap().name(), "marker");
        cfg.mock.enabled = true;
        assert_eq!(Registry::standard(&cfg).get("marker").unwrap().name(), "mock");
    }

    #[test]
    fn doctor_lists_every_engine_once() {
        let reg = Registry::standard(&Config::default());
        let checks = reg.doctor();
        assert_eq!(checks.len(), reg.engines.len());
        assert!(checks.iter().any(|c| c.engine == "fast" && c.ok));
    }
}
