//! # JSON Output Module
//!
//! Output leggibile da macchina per `--json`: un oggetto JSON per riga su
//! stdout, mentre i log per umani vanno su stderr.
//!
//! ## Tipi di messaggio:
//! - `phase_start`: una fase sta per visitare la sua root
//! - `phase_complete`: riepilogo per fase
//! - `complete`: totale del comando
//! - `error`: la run non è potuta partire (config errata, root inutilizzabile)

use crate::progress::{PhaseReport, RunReport, RunSummary};
use serde::Serialize;
use std::path::PathBuf;

/// One line of JSON output
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    PhaseStart {
        phase: String,
        root: PathBuf,
        dry_run: bool,
    },
    PhaseComplete {
        phase: String,
        root: PathBuf,
        summary: RunSummary,
    },
    Complete {
        phases: usize,
        files: usize,
        bytes_freed: i64,
        duration_seconds: f64,
        summary: RunSummary,
    },
    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Print the message as a single line on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn phase_start(phase: &str, root: PathBuf, dry_run: bool) -> Self {
        Self::PhaseStart {
            phase: phase.to_string(),
            root,
            dry_run,
        }
    }

    pub fn phase_complete(report: &PhaseReport) -> Self {
        Self::PhaseComplete {
            phase: report.phase.clone(),
            root: report.root.clone(),
            summary: report.summary,
        }
    }

    pub fn complete(report: &RunReport, duration_seconds: f64) -> Self {
        let summary = report.total();
        let (files, bytes_freed) = summary.totals();
        Self::Complete {
            phases: report.phases.len(),
            files,
            bytes_freed,
            duration_seconds,
            summary,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ActionResult;

    #[test]
    fn test_phase_complete_shape() {
        let summary: RunSummary = vec![ActionResult::Deleted { bytes_freed: 150 * 1024 }]
            .into_iter()
            .collect();
        let report = PhaseReport::new("images", "/site/static/images", summary);

        let value = serde_json::to_value(JsonMessage::phase_complete(&report)).unwrap();
        assert_eq!(value["type"], "phase_complete");
        assert_eq!(value["phase"], "images");
        assert_eq!(value["summary"]["removed"], 1);
        assert_eq!(value["summary"]["bytes_freed"], 150 * 1024);
    }

    #[test]
    fn test_complete_totals() {
        let mut run = RunReport::default();
        run.push(PhaseReport::new(
            "prune",
            "/site",
            vec![ActionResult::Deleted { bytes_freed: 10 }].into_iter().collect(),
        ));
        run.push(PhaseReport::new(
            "optimize",
            "/site/static/images",
            vec![ActionResult::Converted {
                new_path: PathBuf::from("a.webp"),
                original_size: 100,
                new_size: 40,
            }]
            .into_iter()
            .collect(),
        ));

        let value = serde_json::to_value(JsonMessage::complete(&run, 1.5)).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["phases"], 2);
        assert_eq!(value["files"], 2);
        assert_eq!(value["bytes_freed"], 70);
    }

    #[test]
    fn test_error_message() {
        let json = serde_json::to_string(&JsonMessage::error("bad root")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"bad root"}"#);
    }
}
