//! # File Management Module
//!
//! Questo modulo gestisce il lato filesystem della pipeline: visita
//! dell'albero e sostituzione sicura dei file.
//!
//! ## Responsabilità:
//! - Visita ricorsiva pigra di una root, restituendo ogni voce che non è una directory
//! - Directory illeggibili o sparite vengono saltate, mai fatali
//! - Replace atomico (file temporaneo + rename) e creazione no-clobber
//! - Utilità per dimensioni e formattazione leggibile
//!
//! ## Garanzie della visita:
//! - Finita e a singolo uso: chiamare di nuovo `walk_files` per ripetere
//! - Ordine deterministico per un albero stabile (voci ordinate per nome)
//! - Iterativa (walkdir tiene uno stack esplicito), quindi alberi profondi
//!   non esauriscono lo stack
//!
//! ## Operazioni sui file:
//! - I file temporanei nascono accanto al target e portano il suffisso
//!   temporaneo della run (`.optimized` di default), così un crash lascia
//!   qualcosa che il temp sweep della run successiva riconosce
//! - Un file temporaneo mai persistito viene cancellato al drop
//!
//! ## Esempio:
//! ```ignore
//! for file in FileManager::walk_files(&root).filter(|p| asset::is_image(p)) {
//!     // process image
//! }
//! ```

use crate::error::BudgetError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Lazily walk every regular file under `root`
    pub fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| !entry.file_type().is_dir())
            .map(|entry| entry.into_path())
    }

    /// Size of a file, or the total size of every file under a directory
    pub fn tree_size(path: &Path) -> u64 {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => Self::walk_files(path)
                .filter_map(|file| fs::symlink_metadata(file).ok())
                .map(|meta| meta.len())
                .sum(),
            Ok(meta) => meta.len(),
            Err(_) => 0,
        }
    }

    /// Size of a file on disk
    pub fn file_size(path: &Path) -> Result<u64, BudgetError> {
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|e| BudgetError::fs(path, e))
    }

    /// Write `bytes` to a temp file next to `target`
    fn write_temp(target: &Path, bytes: &[u8], temp_suffix: &str) -> Result<NamedTempFile, BudgetError> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(temp_suffix)
            .tempfile_in(dir)
            .map_err(|e| BudgetError::fs(dir, e))?;

        temp.write_all(bytes)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| BudgetError::fs(temp.path(), e))?;

        Ok(temp)
    }

    /// Sostituisce atomicamente `target` con `bytes`
    ///
    /// L'originale mantiene i suoi permessi. In caso di errore l'originale
    /// resta intatto e il file temporaneo viene rimosso.
    pub fn replace_atomically(target: &Path, bytes: &[u8], temp_suffix: &str) -> Result<(), BudgetError> {
        let permissions = fs::metadata(target)
            .map_err(|e| BudgetError::fs(target, e))?
            .permissions();

        let temp = Self::write_temp(target, bytes, temp_suffix)?;
        fs::set_permissions(temp.path(), permissions).map_err(|e| BudgetError::fs(temp.path(), e))?;

        temp.persist(target)
            .map_err(|e| BudgetError::fs(target, e.error))?;
        Ok(())
    }

    /// Crea atomicamente `target` con `bytes`, fallendo se esiste già
    ///
    /// `permissions_from` fornisce il mode del nuovo file.
    pub fn create_atomically(
        target: &Path,
        bytes: &[u8],
        temp_suffix: &str,
        permissions_from: &Path,
    ) -> Result<(), BudgetError> {
        let temp = Self::write_temp(target, bytes, temp_suffix)?;
        if let Ok(meta) = fs::metadata(permissions_from) {
            fs::set_permissions(temp.path(), meta.permissions())
                .map_err(|e| BudgetError::fs(temp.path(), e))?;
        }

        temp.persist_noclobber(target)
            .map_err(|e| BudgetError::fs(target, e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Signed variant of `format_size` for deltas that may be negative
    pub fn format_delta(delta: i64) -> String {
        if delta < 0 {
            format!("-{}", Self::format_size(delta.unsigned_abs()))
        } else {
            Self::format_size(delta as u64)
        }
    }

    /// Calcola la percentuale di riduzione
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
