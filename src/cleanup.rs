//! # Cleanup Module
//!
//! Questo modulo raccoglie le fasi distruttive che non hanno bisogno del codec.
//!
//! ## Responsabilità:
//! - `SizeSweeper`: cancella i file sopra una soglia in byte sotto una root
//! - `DirectoryPruner`: rimuove una lista di sottoalberi fornita dal chiamante
//! - `TempSweeper`: rimuove i file temporanei lasciati da replace interrotti
//!
//! ## Politica degli errori:
//! - Una root mancante o una voce di prune mancante significa "niente da fare"
//! - Un errore di stat o di unlink riguarda solo quel path: viene loggato e
//!   la fase prosegue
//! - I link simbolici non vengono mai seguiti né contati
//!
//! ## Esempio:
//! ```ignore
//! let sweeper = SizeSweeper::new(DeletionPolicy::new(100 * 1024, DeletionScope::Images), false);
//! let summary = sweeper.sweep(&root.join("static/images"));
//! ```

use crate::file_manager::FileManager;
use crate::optimizer::path_resolver::PathResolver;
use crate::outcome::ActionResult;
use crate::policy::{Action, DeletionPolicy};
use crate::progress::RunSummary;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Cancella un singolo file, riportando i byte liberati
pub fn delete_file(path: &Path, size: u64, dry_run: bool) -> ActionResult {
    if dry_run {
        return ActionResult::Deleted { bytes_freed: size };
    }
    match fs::remove_file(path) {
        Ok(()) => ActionResult::Deleted { bytes_freed: size },
        Err(e) => {
            error!("Failed to remove {}: {}", path.display(), e);
            ActionResult::Failed(e.to_string())
        }
    }
}

/// Size-threshold deletion over one root
#[derive(Debug, Clone)]
pub struct SizeSweeper {
    policy: DeletionPolicy,
    dry_run: bool,
    project_root: PathBuf,
}

impl SizeSweeper {
    pub fn new(policy: DeletionPolicy, dry_run: bool) -> Self {
        Self {
            policy,
            dry_run,
            project_root: PathBuf::new(),
        }
    }

    /// Shorten log paths relative to this root
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn sweep(&self, root: &Path) -> RunSummary {
        let mut summary = RunSummary::new();
        if !root.is_dir() {
            warn!("Skipping missing directory {}", root.display());
            return summary;
        }

        for path in FileManager::walk_files(root) {
            let size = match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(_) => {
                    debug!("Not a regular file, leaving {}", path.display());
                    continue;
                }
                Err(e) => {
                    debug!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            // files the policy leaves alone are not counted
            if let Action::Delete { size } = self.policy.decide(&path, size) {
                info!(
                    "🗑️  {} large file: {} ({})",
                    if self.dry_run { "Would remove" } else { "Removing" },
                    PathResolver::display_relative(&path, &self.project_root),
                    FileManager::format_size(size)
                );
                summary.record(&delete_file(&path, size, self.dry_run));
            }
        }

        summary
    }
}

/// Rimuove interi sottoalberi, senza condizioni
#[derive(Debug, Clone, Default)]
pub struct DirectoryPruner {
    dry_run: bool,
}

impl DirectoryPruner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Remove every `root/entry` that exists; missing entries are ignored
    pub fn prune(&self, root: &Path, entries: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::new();
        for entry in entries {
            let full_path = root.join(entry);
            let meta = match fs::symlink_metadata(&full_path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Nothing to prune at {}", entry.display());
                    continue;
                }
                Err(e) => {
                    error!("❌ Failed to inspect {}: {}", entry.display(), e);
                    summary.record(&ActionResult::Failed(e.to_string()));
                    continue;
                }
            };

            let size = FileManager::tree_size(&full_path);
            info!("Removing: {} ({})", entry.display(), FileManager::format_size(size));
            if self.dry_run {
                summary.record(&ActionResult::Deleted { bytes_freed: size });
                continue;
            }

            let removed = if meta.is_dir() {
                fs::remove_dir_all(&full_path)
            } else {
                fs::remove_file(&full_path)
            };
            match removed {
                Ok(()) => {
                    info!("✅ Removed: {}", entry.display());
                    summary.record(&ActionResult::Deleted { bytes_freed: size });
                }
                Err(e) => {
                    error!("❌ Failed to remove {}: {}", entry.display(), e);
                    summary.record(&ActionResult::Failed(e.to_string()));
                }
            }
        }
        summary
    }
}

/// Removes temp artifacts left behind by interrupted atomic replaces
#[derive(Debug, Clone)]
pub struct TempSweeper {
    suffix: String,
    dry_run: bool,
}

impl TempSweeper {
    pub fn new(suffix: impl Into<String>, dry_run: bool) -> Self {
        Self {
            suffix: suffix.into(),
            dry_run,
        }
    }

    pub fn sweep(&self, root: &Path) -> RunSummary {
        let mut summary = RunSummary::new();
        for path in FileManager::walk_files(root)
            .filter(|p| PathResolver::is_temp_artifact(p, &self.suffix))
        {
            let size = fs::symlink_metadata(&path).map(|m| m.len()).unwrap_or(0);
            match delete_file(&path, size, self.dry_run) {
                ActionResult::Failed(reason) => debug!("Ignoring {}: {}", path.display(), reason),
                result => summary.record(&result),
            }
        }
        if summary.removed > 0 {
            info!("✅ Removed {} {} files", summary.removed, self.suffix);
        }
        summary
    }
}
