//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori usata al confine del
//! singolo file.
//!
//! ## Responsabilità:
//! - Definisce `BudgetError` per categorizzare ogni errore che un file può incontrare
//! - Porta con sé il path coinvolto, così ogni riga di log nomina il file
//! - Permette all'executor di distinguere "input illeggibile" dai veri errori
//!
//! ## Categorie di errori:
//! - `FileSystem`: errori di stat/unlink/rename/write
//! - `Decode`: dati immagine illeggibili o corrotti
//! - `Encode`: errore del codec durante ri-codifica o conversione
//! - `UnsupportedFormat`: il codec non gestisce questo container
//!
//! Nessuno di questi interrompe una fase: l'executor trasforma `Decode` e
//! `UnsupportedFormat` in uno skip e tutto il resto in un fallimento del solo
//! file coinvolto.
//!
//! ## Esempio:
//! ```ignore
//! let size = std::fs::metadata(path)
//!     .map_err(|e| BudgetError::fs(path, e))?
//!     .len();
//! ```

use crate::asset::Format;
use std::path::{Path, PathBuf};

/// Per-file error categories
#[derive(thiserror::Error, Debug)]
pub enum BudgetError {
    #[error("filesystem error on {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot encode {} as {format}: {reason}", path.display())]
    Encode {
        path: PathBuf,
        format: Format,
        reason: String,
    },

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
}

impl BudgetError {
    pub fn fs(path: &Path, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn decode(path: &Path, source: image::ImageError) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn encode(path: &Path, format: Format, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            format,
            reason: reason.to_string(),
        }
    }

    /// True when the input itself could not be read as an image.
    ///
    /// Such files are skipped rather than counted as failures.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::UnsupportedFormat(_))
    }
}
