//! # Asset Classification Module
//!
//! Questo modulo decide cosa è un path scoperto prima che una policy lo guardi.
//!
//! ## Responsabilità:
//! - `Format`: l'insieme chiuso di container raster che la pipeline conosce
//! - `is_image()` / `is_vector()`: classificazione per estensione
//! - `AssetRef`: un path risolvibile pigramente nel suo tipo e formato dichiarato
//!
//! ## Estensioni riconosciute:
//! - **Raster**: png, jpg, jpeg, gif, webp, avif
//! - **Vettoriali**: svg, svgz (mai transcodificati, qualunque sia la dimensione)
//!
//! Il formato *dichiarato* viene dai metadata decodificati, non
//! dall'estensione: un `.png` che contiene dati JPEG è trattato come JPEG.

use crate::image_processor::Codec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions classified as raster images (lowercase, without the dot)
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "avif"];

const VECTOR_EXTENSIONS: [&str; 2] = ["svg", "svgz"];

/// Raster container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Png,
    Jpeg,
    Gif,
    Webp,
    Avif,
}

impl Format {
    /// Map a lowercase or mixed-case extension to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Extension used when writing a new file in this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    /// True if `path` already carries an extension of this format
    pub fn matches_extension(&self, path: &Path) -> bool {
        extension_of(path)
            .and_then(|ext| Self::from_extension(&ext))
            .is_some_and(|f| f == *self)
    }

    pub(crate) fn from_codec(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Avif => Some(Self::Avif),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse kind of a discovered file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Vector,
    Other,
}

/// Lowercase extension of `path`, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Check if a file is a raster image by extension
pub fn is_image(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a file is a vector image by extension
pub fn is_vector(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| VECTOR_EXTENSIONS.contains(&ext.as_str()))
}

pub fn classify(path: &Path) -> AssetKind {
    if is_image(path) {
        AssetKind::Image
    } else if is_vector(path) {
        AssetKind::Vector
    } else {
        AssetKind::Other
    }
}

/// A discovered file. Identity is the path alone; nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    path: PathBuf,
}

impl AssetRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> AssetKind {
        classify(&self.path)
    }

    /// Formato riportato dai metadata del codec; `None` se il file non è
    /// leggibile (vuoto, corrotto, o container che il codec non conosce)
    pub fn declared_format(&self, codec: &dyn Codec) -> Option<Format> {
        codec.metadata(&self.path).ok().map(|meta| meta.format)
    }
}
