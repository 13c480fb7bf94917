//! # Media Optimizer Main Orchestrator
//!
//! Questo modulo esegue l'executor di transcodifica su ogni asset di una root.
//!
//! ## Responsabilità:
//! - Snapshot della visita prima di toccare qualsiasi file, così le
//!   conversioni non rimettono in coda i fratelli appena creati
//! - Parallelismo limitato: al massimo `workers` file in volo, ognuno su un
//!   thread blocking perché decode/encode è CPU-bound
//! - Unico punto di aggregazione: i risultati tornano a questo task, che da
//!   solo aggiorna `RunSummary` e progress bar
//!
//! ## Modello dei fallimenti:
//! - Una root mancante produce un report vuoto
//! - Un worker in panic viene registrato come `Failed` solo per quel file

use crate::{
    asset::{self, AssetKind},
    file_manager::FileManager,
    optimizer::task_optimizer::TaskOptimizer,
    outcome::ActionResult,
    progress::{PhaseReport, ProgressManager, RunSummary},
};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrates the optimization of whole roots
pub struct MediaOptimizer {
    executor: Arc<TaskOptimizer>,
    workers: usize,
    show_progress: bool,
}

impl MediaOptimizer {
    pub fn new(executor: Arc<TaskOptimizer>, workers: usize, show_progress: bool) -> Self {
        Self {
            executor,
            workers: workers.max(1),
            show_progress,
        }
    }

    /// Files under `root` the executor could act on
    fn collect_candidates(root: &Path) -> Vec<PathBuf> {
        FileManager::walk_files(root)
            .filter(|path| asset::classify(path) != AssetKind::Other)
            .collect()
    }

    /// Optimize every image under `root`
    pub async fn optimize_root(&self, root: &Path) -> PhaseReport {
        if !root.is_dir() {
            warn!("Skipping missing directory {}", root.display());
            return PhaseReport::empty("optimize", root);
        }

        let files = Self::collect_candidates(root);
        info!("Found {} images to process in {}", files.len(), root.display());
        if files.is_empty() {
            return PhaseReport::empty("optimize", root);
        }

        let progress = ProgressManager::new(files.len() as u64, self.show_progress);
        let mut summary = RunSummary::new();

        let mut results = stream::iter(files)
            .map(|path| {
                let executor = Arc::clone(&self.executor);
                async move {
                    let worker_path = path.clone();
                    let result = tokio::task::spawn_blocking(move || executor.process(&worker_path))
                        .await
                        .unwrap_or_else(|e| {
                            error!("Worker for {} panicked: {}", path.display(), e);
                            ActionResult::Failed(format!("worker panicked: {e}"))
                        });
                    (path, result)
                }
            })
            .buffer_unordered(self.workers);

        while let Some((path, result)) = results.next().await {
            summary.record(&result);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let message = match &result {
                ActionResult::Failed(_) => format!("❌ {name}"),
                ActionResult::Skipped(_) => format!("⏭️  {name}"),
                _ => format!("✅ {name}: {:.1}% saved", result.percent_saved()),
            };
            progress.update(&message);
        }

        progress.finish(&summary.format_summary());
        PhaseReport::new("optimize", root, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Format;
    use crate::image_processor::{tests::noisy_image, ImageProcessor};
    use crate::optimizer::task_optimizer::{
        tests::{test_policy, MockCodec},
        ExecutorOptions,
    };
    use std::fs;
    use tempfile::TempDir;

    fn optimizer(codec: impl crate::image_processor::Codec + 'static, workers: usize) -> MediaOptimizer {
        let executor = TaskOptimizer::new(Arc::new(codec), Arc::new(test_policy()), ExecutorOptions::default());
        MediaOptimizer::new(Arc::new(executor), workers, false)
    }

    #[tokio::test]
    async fn test_missing_root_is_empty_report() {
        let dir = TempDir::new().unwrap();
        let report = optimizer(MockCodec::new(Format::Png, 1, 1), 2)
            .optimize_root(&dir.path().join("absent"))
            .await;
        assert_eq!(report.summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_every_candidate_reaches_one_outcome() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            fs::write(dir.path().join(format!("p{i}.png")), vec![b'o'; 1000]).unwrap();
        }
        fs::write(dir.path().join("logo.svg"), b"<svg/>").unwrap();
        fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();

        let report = optimizer(MockCodec::new(Format::Png, 900, 400), 3)
            .optimize_root(dir.path())
            .await;

        assert_eq!(report.summary.processed, 7);
        assert_eq!(report.summary.converted, 6);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.bytes_freed, 6 * 600);
        assert!(dir.path().join("readme.txt").exists());
        for i in 0..6 {
            assert!(dir.path().join(format!("p{i}.webp")).exists());
            assert!(!dir.path().join(format!("p{i}.png")).exists());
        }
    }

    #[tokio::test]
    async fn test_corrupt_file_does_not_stop_the_pass() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_corrupt.jpg"), b"definitely not a jpeg").unwrap();
        noisy_image(400, 300).save(dir.path().join("b_good.webp")).unwrap();

        let report = optimizer(ImageProcessor::default(), 1)
            .optimize_root(dir.path())
            .await;

        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.reencoded, 1);
        assert_eq!(report.summary.failed, 0);
        assert_eq!(fs::read(dir.path().join("a_corrupt.jpg")).unwrap(), b"definitely not a jpeg");
    }
}
