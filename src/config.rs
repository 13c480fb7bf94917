//! # Configuration Management Module
//!
//! Questo modulo gestisce tutto ciò che una run deve sapere sull'albero del
//! progetto: quali sottoalberi visita ogni fase, con quali soglie, qualità e
//! liste di prune.
//!
//! ## Responsabilità:
//! - Definisce `Config` e le sue sezioni, tutte tipi `serde`
//! - `Default` riproduce le tabelle del sito
//! - Validazione di ogni parametro prima che una run parta
//! - Caricamento/salvataggio da `site-budget.json` nella root del progetto
//!
//! ## Sezioni:
//! - `cleanup`: fasi di cancellazione (root + soglia + scope) e una lista di prune
//! - `optimize`: root, tabella qualità/resize per formato, conversione
//!   opzionale png/jpeg → webp, una lista di prune e il filtro di resize
//! - `temp_suffix`: suffisso dei file temporanei del replace atomico (`.optimized`)
//! - `workers`: transcodifiche parallele (default: 4)
//!
//! ## Validazione:
//! - Le qualità sono 1-100
//! - Il rapporto di profittabilità è in (0, 1], la soglia di rumore in [0, 1)
//! - Workers > 0, suffisso temporaneo non vuoto
//! - Root e voci di prune sono relative e non risalgono mai con `..`
//!
//! ## Esempio:
//! ```ignore
//! let config = Config::from_file(&Config::locate(&root)).await?;
//! config.validate()?;
//! ```

use crate::asset::Format;
use crate::policy::{ConversionPolicy, DeletionPolicy, DeletionScope, EncodeParams, OptimizationPolicy};
use crate::resize::{ResizeAlgorithm, ResizeBox};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// File looked up in the project root
pub const CONFIG_FILE_NAME: &str = "site-budget.json";

const KIB: u64 = 1024;

/// One size-threshold deletion pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionPhase {
    /// Label used in logs and reports
    pub name: String,
    /// Subtree, relative to the project root
    pub root: PathBuf,
    pub policy: DeletionPolicy,
}

impl DeletionPhase {
    pub fn new(name: &str, root: &str, threshold_bytes: u64, scope: DeletionScope) -> Self {
        Self {
            name: name.to_string(),
            root: PathBuf::from(root),
            policy: DeletionPolicy::new(threshold_bytes, scope),
        }
    }
}

/// The `cleanup` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub phases: Vec<DeletionPhase>,
    /// Subtrees removed unconditionally after the deletion phases
    pub prune: Vec<PathBuf>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            phases: vec![
                DeletionPhase::new("images", "static/images", 100 * KIB, DeletionScope::Images),
                DeletionPhase::new("routes", "src/routes", 50 * KIB, DeletionScope::Images),
                DeletionPhase::new("assets", "static/assets", 200 * KIB, DeletionScope::AllFiles),
            ],
            prune: paths(&["src/routes/blog", "src/routes/changelog"]),
        }
    }
}

/// The `optimize` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Subtrees optimized in order, relative to the project root
    pub roots: Vec<PathBuf>,
    pub policy: OptimizationPolicy,
    /// Subtrees removed before any image is touched
    pub prune: Vec<PathBuf>,
    pub resize_algorithm: ResizeAlgorithm,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        let fit = ResizeBox::new(800, 800);
        let formats: BTreeMap<Format, EncodeParams> = [
            (Format::Jpeg, 75),
            (Format::Webp, 80),
            (Format::Png, 80),
            (Format::Gif, 80),
            (Format::Avif, 80),
        ]
        .into_iter()
        .map(|(format, quality)| (format, EncodeParams::new(quality, fit)))
        .collect();

        Self {
            roots: paths(&["static/images", "src/routes"]),
            policy: OptimizationPolicy {
                formats,
                conversion: Some(ConversionPolicy {
                    target: Format::Webp,
                    params: EncodeParams::new(80, fit),
                    sources: vec![Format::Png, Format::Jpeg],
                    profitability_ratio: 0.7,
                }),
                noise_threshold: 0.05,
            },
            prune: paths(&[
                "static/images/temp",
                "static/images/changelog",
                "static/images/testimonials",
                "static/images/heroes/photos",
                "local-fonts",
            ]),
            resize_algorithm: ResizeAlgorithm::default(),
        }
    }
}

/// Configuration for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cleanup: CleanupConfig,
    pub optimize: OptimizeConfig,
    /// Suffix of temp files written during atomic replace
    pub temp_suffix: String,
    /// Number of parallel transcodes
    pub workers: usize,
    /// Evaluate and encode, but never write or delete
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup: CleanupConfig::default(),
            optimize: OptimizeConfig::default(),
            temp_suffix: ".optimized".to_string(),
            workers: 4,
            dry_run: false,
        }
    }
}

fn paths(entries: &[&str]) -> Vec<PathBuf> {
    entries.iter().map(PathBuf::from).collect()
}

fn validate_quality(label: &str, params: &EncodeParams) -> Result<()> {
    if params.quality == 0 || params.quality > 100 {
        return Err(anyhow::anyhow!("{} quality must be between 1 and 100", label));
    }
    Ok(())
}

/// Deve restare dentro la root del progetto
fn validate_relative(label: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("{} path must not be empty", label));
    }
    if path.is_absolute() || path.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
        return Err(anyhow::anyhow!(
            "{} path must be relative to the project root: {}",
            label,
            path.display()
        ));
    }
    Ok(())
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.temp_suffix.is_empty() {
            return Err(anyhow::anyhow!("Temp suffix must not be empty"));
        }

        for phase in &self.cleanup.phases {
            validate_relative(&format!("Cleanup phase '{}'", phase.name), &phase.root)?;
        }
        for entry in &self.cleanup.prune {
            validate_relative("Cleanup prune", entry)?;
        }
        for root in &self.optimize.roots {
            validate_relative("Optimize root", root)?;
        }
        for entry in &self.optimize.prune {
            validate_relative("Optimize prune", entry)?;
        }

        let policy = &self.optimize.policy;
        for (format, params) in &policy.formats {
            validate_quality(format.name(), params)?;
        }

        if !(0.0..1.0).contains(&policy.noise_threshold) {
            return Err(anyhow::anyhow!("Noise threshold must be in [0.0, 1.0)"));
        }

        if let Some(ref conversion) = policy.conversion {
            validate_quality("Conversion", &conversion.params)?;
            if conversion.profitability_ratio <= 0.0 || conversion.profitability_ratio > 1.0 {
                return Err(anyhow::anyhow!("Profitability ratio must be in (0.0, 1.0]"));
            }
        }

        Ok(())
    }

    /// Where the config file of a project lives
    pub fn locate(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE_NAME)
    }

    /// Carica la configurazione da file; un file mancante dà i default
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
