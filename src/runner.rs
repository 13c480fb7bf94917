//! # Runner Module
//!
//! Questo modulo mette in sequenza le fasi di ogni comando su una root di progetto.
//!
//! ## Ordine delle fasi:
//! - `cleanup`: ogni fase di cancellazione nell'ordine della config, poi la lista di prune
//! - `optimize`: sweep dei temporanei → lista di prune → ogni root da ottimizzare
//! - `all`: `cleanup` poi `optimize`
//!
//! Le fasi non si sovrappongono mai: ognuna viene attesa prima che parta la
//! successiva, quindi un sottoalbero non viene mai rimosso mentre i suoi file
//! sono in transcodifica. Le fasi bloccanti sul filesystem girano sul pool
//! blocking.

use crate::{
    cleanup::{DirectoryPruner, SizeSweeper, TempSweeper},
    config::Config,
    file_manager::FileManager,
    image_processor::{Codec, ImageProcessor},
    json_output::JsonMessage,
    optimizer::{ExecutorOptions, MediaOptimizer, TaskOptimizer},
    progress::{PhaseReport, RunReport, RunSummary},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Come la run riporta il suo avanzamento
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    /// Emit JSON lines on stdout
    pub json: bool,
    /// Draw the progress bar
    pub progress: bool,
}

pub struct Runner {
    project_root: PathBuf,
    config: Config,
    codec: Arc<dyn Codec>,
    output: OutputMode,
}

impl Runner {
    pub fn new(project_root: impl Into<PathBuf>, config: Config) -> Self {
        let codec = Arc::new(ImageProcessor::new(config.optimize.resize_algorithm));
        Self {
            project_root: project_root.into(),
            config,
            codec,
            output: OutputMode::default(),
        }
    }

    /// Swap the codec (tests use a deterministic one)
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn start_phase(&self, phase: &str, root: &Path) {
        if self.output.json {
            JsonMessage::phase_start(phase, root.to_path_buf(), self.config.dry_run).emit();
        }
    }

    fn finish_phase(&self, report: &PhaseReport) {
        if self.output.json {
            JsonMessage::phase_complete(report).emit();
        }
        let (files, bytes) = report.summary.totals();
        info!(
            "📊 {} [{}]: {} files, {} reclaimed",
            report.phase,
            report.root.display(),
            files,
            FileManager::format_delta(bytes)
        );
        info!("   {}", report.summary.format_summary());
    }

    /// Run a blocking phase to completion on the blocking pool
    async fn blocking_phase<F>(&self, phase: &str, root: PathBuf, work: F) -> Result<PhaseReport>
    where
        F: FnOnce() -> RunSummary + Send + 'static,
    {
        self.start_phase(phase, &root);
        let summary = tokio::task::spawn_blocking(work)
            .await
            .with_context(|| format!("{} phase panicked", phase))?;
        let report = PhaseReport::new(phase, root, summary);
        self.finish_phase(&report);
        Ok(report)
    }

    /// Size-threshold deletion phases, then the cleanup prune list
    pub async fn cleanup(&self) -> Result<RunReport> {
        info!("🧹 Cleaning up large files in {}", self.project_root.display());
        let mut report = RunReport::default();

        for phase in &self.config.cleanup.phases {
            let root = self.project_root.join(&phase.root);
            let sweeper = SizeSweeper::new(phase.policy, self.config.dry_run)
                .with_project_root(&self.project_root);
            let walk_root = root.clone();
            report.push(
                self.blocking_phase(&phase.name, root, move || sweeper.sweep(&walk_root))
                    .await?,
            );
        }

        report.push(self.prune("prune", self.config.cleanup.prune.clone()).await?);
        Ok(report)
    }

    async fn prune(&self, phase: &str, entries: Vec<PathBuf>) -> Result<PhaseReport> {
        let root = self.project_root.clone();
        let pruner = DirectoryPruner::new(self.config.dry_run);
        let prune_root = root.clone();
        self.blocking_phase(phase, root, move || pruner.prune(&prune_root, &entries))
            .await
    }

    /// Temp sweep, prune list, then every optimize root
    pub async fn optimize(&self) -> Result<RunReport> {
        info!("📸 Optimizing images in {}", self.project_root.display());
        let mut report = RunReport::default();

        let sweeper = TempSweeper::new(self.config.temp_suffix.clone(), self.config.dry_run);
        let sweep_root = self.project_root.clone();
        report.push(
            self.blocking_phase("temp-sweep", self.project_root.clone(), move || {
                sweeper.sweep(&sweep_root)
            })
            .await?,
        );

        report.push(self.prune("prune", self.config.optimize.prune.clone()).await?);

        let executor = TaskOptimizer::new(
            Arc::clone(&self.codec),
            Arc::new(self.config.optimize.policy.clone()),
            ExecutorOptions {
                dry_run: self.config.dry_run,
                temp_suffix: self.config.temp_suffix.clone(),
                project_root: self.project_root.clone(),
            },
        );
        let optimizer = MediaOptimizer::new(
            Arc::new(executor),
            self.config.workers,
            self.output.progress && !self.output.json,
        );

        for root in &self.config.optimize.roots {
            let root = self.project_root.join(root);
            self.start_phase("optimize", &root);
            let phase = optimizer.optimize_root(&root).await;
            self.finish_phase(&phase);
            report.push(phase);
        }

        Ok(report)
    }

    /// `cleanup` followed by `optimize`
    pub async fn all(&self) -> Result<RunReport> {
        let mut report = self.cleanup().await?;
        report.extend(self.optimize().await?);
        Ok(report)
    }
}
