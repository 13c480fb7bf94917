//! # Path Resolution Module
//!
//! Centralizza come vengono derivati i path dei fratelli e dei temporanei,
//! così executor e temp sweep concordano sui nomi.

use crate::asset::Format;
use std::path::{Path, PathBuf};

/// Utility for computing derived paths
pub struct PathResolver;

impl PathResolver {
    /// Sibling of `path` in the `target` container (`a/b.png` → `a/b.webp`)
    ///
    /// Returns `None` when the path already carries the target extension.
    pub fn conversion_path(path: &Path, target: Format) -> Option<PathBuf> {
        if target.matches_extension(path) {
            return None;
        }
        let converted = path.with_extension(target.extension());
        (converted != path).then_some(converted)
    }

    /// True if `path` is a leftover temp artifact of an atomic replace
    pub fn is_temp_artifact(path: &Path, temp_suffix: &str) -> bool {
        !temp_suffix.is_empty()
            && path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(temp_suffix))
    }

    /// Project-relative rendering for log lines
    pub fn display_relative(path: &Path, root: &Path) -> String {
        path.strip_prefix(root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
