//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il feedback di avanzamento e la contabilità per fase
//! di quanto è stato recuperato.
//!
//! ## Responsabilità:
//! - `RunSummary`: accumulatore puro di conteggi e byte per una fase
//! - `PhaseReport` / `RunReport`: riepiloghi per fase più un totale
//! - `ProgressManager`: progress bar `indicatif` per le fasi lunghe
//! - `LogWriter`: writer per `tracing` che sospende la barra attiva, così le
//!   righe di log dei worker non si mescolano con il disegno della barra
//!
//! ## Statistiche tracciate:
//! - **processed**: ogni path arrivato a un'azione terminale
//! - **removed**: file o directory cancellati
//! - **reencoded** / **converted** / **rejected**: esiti della transcodifica
//! - **skipped** / **failed**
//! - **bytes_freed**: con segno, una ri-codifica può far crescere un file
//!
//! Il riepilogo appartiene a chi consuma i risultati; i worker non lo toccano
//! mai. La formattazione è lasciata al chiamante.
//!
//! ## Feedback visivo:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 90/150 (60%) ✅ hero.jpg: 45.2% saved
//! ```

use crate::file_manager::FileManager;
use crate::outcome::ActionResult;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Barra visibile in questo momento, se c'è
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR.lock().ok().and_then(|slot| slot.clone())
}

fn set_active_bar(bar: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE_BAR.lock() {
        *slot = bar;
    }
}

/// Log sink for `tracing_subscriber`: stderr, with the active bar cleared
/// while each line is written
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_bar() {
            Some(bar) => bar.suspend(|| io::stderr().write_all(buf))?,
            None => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Manages progress reporting for a phase
pub struct ProgressManager {
    bar: ProgressBar,
    registered: bool,
}

impl ProgressManager {
    /// Create a new progress manager; hidden bars draw nothing
    pub fn new(total_files: u64, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
                registered: false,
            };
        }

        let bar = ProgressBar::new(total_files);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        set_active_bar(Some(bar.clone()));

        Self { bar, registered: true }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Drop for ProgressManager {
    fn drop(&mut self) {
        if self.registered {
            set_active_bar(None);
        }
    }
}

/// Statistics for one phase
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub removed: usize,
    pub reencoded: usize,
    pub converted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_freed: i64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one terminal outcome into the summary
    pub fn record(&mut self, result: &ActionResult) {
        self.processed += 1;
        self.bytes_freed += result.bytes_freed();
        match result {
            ActionResult::Deleted { .. } => self.removed += 1,
            ActionResult::ReEncoded { .. } => self.reencoded += 1,
            ActionResult::Converted { .. } => self.converted += 1,
            ActionResult::ConversionRejected { .. } => {
                self.reencoded += 1;
                self.rejected += 1;
            }
            ActionResult::Skipped(_) => self.skipped += 1,
            ActionResult::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &RunSummary) {
        self.processed += other.processed;
        self.removed += other.removed;
        self.reencoded += other.reencoded;
        self.converted += other.converted;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.bytes_freed += other.bytes_freed;
    }

    /// Final `(count, bytes)` pair: files that left the tree and bytes reclaimed
    pub fn totals(&self) -> (usize, i64) {
        (self.removed + self.converted, self.bytes_freed)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} | Removed: {} | Re-encoded: {} | Converted: {} | Rejected: {} | Skipped: {} | Errors: {} | Saved: {}",
            self.processed,
            self.removed,
            self.reencoded,
            self.converted,
            self.rejected,
            self.skipped,
            self.failed,
            FileManager::format_delta(self.bytes_freed),
        )
    }
}

impl FromIterator<ActionResult> for RunSummary {
    fn from_iter<I: IntoIterator<Item = ActionResult>>(iter: I) -> Self {
        let mut summary = RunSummary::new();
        for result in iter {
            summary.record(&result);
        }
        summary
    }
}

/// Summary of one phase over one root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub phase: String,
    pub root: PathBuf,
    pub summary: RunSummary,
}

impl PhaseReport {
    pub fn new(phase: impl Into<String>, root: impl Into<PathBuf>, summary: RunSummary) -> Self {
        Self {
            phase: phase.into(),
            root: root.into(),
            summary,
        }
    }

    /// A phase that had nothing to do (missing root, empty list)
    pub fn empty(phase: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::new(phase, root, RunSummary::default())
    }
}

/// All phases of one command
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
}

impl RunReport {
    pub fn push(&mut self, phase: PhaseReport) {
        self.phases.push(phase);
    }

    pub fn extend(&mut self, other: RunReport) {
        self.phases.extend(other.phases);
    }

    pub fn total(&self) -> RunSummary {
        let mut total = RunSummary::new();
        for phase in &self.phases {
            total.merge(&phase.summary);
        }
        total
    }
}
