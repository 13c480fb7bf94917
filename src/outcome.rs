//! # Action Outcomes
//!
//! Cosa è successo a un file. Ogni path processato termina in esattamente un
//! `ActionResult`; `progress::RunSummary` li accumula.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Why a file was left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not an image and the policy only looks at images
    NotAnImage,
    /// Vector images are never transcoded
    Vector,
    /// At or under the deletion threshold
    WithinThreshold,
    /// Zero-byte file
    Empty,
    /// The codec could not read any metadata
    NoMetadata,
    /// Decoded format has no entry in the active policy
    UnsupportedFormat(String),
    /// Decoding failed part-way (corrupt or truncated data)
    Undecodable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnImage => f.write_str("not an image"),
            SkipReason::Vector => f.write_str("vector image"),
            SkipReason::WithinThreshold => f.write_str("within threshold"),
            SkipReason::Empty => f.write_str("empty file"),
            SkipReason::NoMetadata => f.write_str("no readable metadata"),
            SkipReason::UnsupportedFormat(format) => write!(f, "format {format} not in policy"),
            SkipReason::Undecodable(reason) => write!(f, "undecodable: {reason}"),
        }
    }
}

/// Terminal outcome of processing one path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    /// File or directory removed
    Deleted { bytes_freed: u64 },
    /// Re-encoded in place; `new_size` may exceed `original_size`
    ReEncoded { original_size: u64, new_size: u64 },
    /// Replaced by a file in another container; the original is gone
    Converted {
        new_path: PathBuf,
        original_size: u64,
        new_size: u64,
    },
    /// Re-encoded in place, but the conversion candidate was discarded
    ConversionRejected {
        original_size: u64,
        new_size: u64,
        candidate_size: u64,
    },
    Skipped(SkipReason),
    Failed(String),
}

impl ActionResult {
    /// Signed byte delta on disk (positive = space reclaimed)
    pub fn bytes_freed(&self) -> i64 {
        match self {
            ActionResult::Deleted { bytes_freed } => *bytes_freed as i64,
            ActionResult::ReEncoded { original_size, new_size }
            | ActionResult::Converted { original_size, new_size, .. }
            | ActionResult::ConversionRejected { original_size, new_size, .. } => {
                *original_size as i64 - *new_size as i64
            }
            ActionResult::Skipped(_) | ActionResult::Failed(_) => 0,
        }
    }

    /// Percentage saved relative to the original size, for log lines
    pub fn percent_saved(&self) -> f64 {
        match self {
            ActionResult::ReEncoded { original_size, new_size }
            | ActionResult::Converted { original_size, new_size, .. }
            | ActionResult::ConversionRejected { original_size, new_size, .. } => {
                crate::file_manager::FileManager::calculate_reduction(*original_size, *new_size)
            }
            ActionResult::Deleted { .. } => 100.0,
            ActionResult::Skipped(_) | ActionResult::Failed(_) => 0.0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionResult::Failed(_))
    }
}
