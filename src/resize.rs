//! # Resize Geometry Module
//!
//! Questo modulo contiene solo la matematica delle dimensioni per il resize
//! "fit inside". Qui non c'è I/O: il codec chiede a
//! `ResizeBox::target_dimensions` cosa produrre e poi fa il lavoro sui pixel.
//!
//! ## Semantica fit-inside:
//! - L'immagine viene scalata mantenendo l'aspect ratio finché sta nel box
//!   (`max_width` × `max_height`; un limite mancante non vincola)
//! - Con `enlarge = false` un'immagine già dentro il box resta com'è, non
//!   viene mai ingrandita
//! - I risultati sono arrotondati al pixel e non scendono mai sotto 1×1
//!
//! ## Esempio:
//! ```ignore
//! let fit = ResizeBox::new(800, 800);
//! assert_eq!(fit.target_dimensions(1600, 1200), (800, 600));
//! assert_eq!(fit.target_dimensions(400, 300), (400, 300));
//! ```

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling filter used when an image actually shrinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeAlgorithm {
    /// Best quality for downscaling (default)
    #[default]
    Lanczos,
    /// Catmull-Rom, good general quality
    CatmullRom,
    /// Fast, acceptable for previews
    Triangle,
    /// Pixel perfect, for pixel art
    Nearest,
}

impl ResizeAlgorithm {
    pub fn to_filter_type(&self) -> FilterType {
        match self {
            ResizeAlgorithm::Lanczos => FilterType::Lanczos3,
            ResizeAlgorithm::CatmullRom => FilterType::CatmullRom,
            ResizeAlgorithm::Triangle => FilterType::Triangle,
            ResizeAlgorithm::Nearest => FilterType::Nearest,
        }
    }
}

/// How the image relates to the box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale down preserving aspect ratio until both sides fit
    #[default]
    Inside,
}

/// Bounding box for a resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeBox {
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
    #[serde(default)]
    pub fit: FitMode,
    /// Allow scaling images up to the box. Always off in shipped policies.
    #[serde(default)]
    pub enlarge: bool,
}

impl Default for ResizeBox {
    /// An unbounded box: dimensions are never touched
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            fit: FitMode::Inside,
            enlarge: false,
        }
    }
}

impl ResizeBox {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: Some(max_width),
            max_height: Some(max_height),
            ..Self::default()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_width.is_none() && self.max_height.is_none()
    }

    /// Dimensions an image of `width` × `height` should end up with
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 || self.is_unbounded() {
            return (width, height);
        }

        let scale_w = self.max_width.map(|w| w as f64 / width as f64);
        let scale_h = self.max_height.map(|h| h as f64 / height as f64);
        let mut scale = match self.fit {
            FitMode::Inside => match (scale_w, scale_h) {
                (Some(w), Some(h)) => w.min(h),
                (Some(w), None) => w,
                (None, Some(h)) => h,
                (None, None) => 1.0,
            },
        };

        if !self.enlarge {
            scale = scale.min(1.0);
        }
        if scale == 1.0 {
            return (width, height);
        }

        let scaled = |side: u32, bound: Option<u32>| -> u32 {
            let value = ((side as f64 * scale).round() as u32).max(1);
            match bound {
                Some(b) if b > 0 => value.min(b),
                _ => value,
            }
        };

        (scaled(width, self.max_width), scaled(height, self.max_height))
    }

    /// True if an image of this size would be resized at all
    pub fn needs_resize(&self, width: u32, height: u32) -> bool {
        self.target_dimensions(width, height) != (width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_inside_landscape() {
        let fit = ResizeBox::new(800, 800);
        assert_eq!(fit.target_dimensions(1600, 1200), (800, 600));
    }

    #[test]
    fn test_fit_inside_portrait() {
        let fit = ResizeBox::new(800, 800);
        assert_eq!(fit.target_dimensions(1000, 4000), (200, 800));
    }

    #[test]
    fn test_never_enlarges() {
        let fit = ResizeBox::new(800, 800);
        assert_eq!(fit.target_dimensions(400, 300), (400, 300));
        assert_eq!(fit.target_dimensions(800, 800), (800, 800));
        assert!(!fit.needs_resize(640, 480));
    }

    #[test]
    fn test_enlarge_when_allowed() {
        let fit = ResizeBox {
            enlarge: true,
            ..ResizeBox::new(800, 800)
        };
        assert_eq!(fit.target_dimensions(400, 200), (800, 400));
    }

    #[test]
    fn test_single_bound() {
        let fit = ResizeBox {
            max_width: Some(500),
            ..ResizeBox::default()
        };
        assert_eq!(fit.target_dimensions(1000, 3000), (500, 1500));
        assert_eq!(ResizeBox::default().target_dimensions(5000, 5000), (5000, 5000));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        let fit = ResizeBox::new(100, 100);
        let (w, h) = fit.target_dimensions(10_000, 10);
        assert_eq!(w, 100);
        assert_eq!(h, 1);
    }

    #[test]
    fn test_result_always_inside_box() {
        let fit = ResizeBox::new(800, 600);
        for (w, h) in [(1601, 1200), (1599, 1201), (3000, 2999), (801, 601), (7, 9000)] {
            let (tw, th) = fit.target_dimensions(w, h);
            assert!(tw <= 800 && th <= 600, "{w}x{h} -> {tw}x{th}");
            assert!(tw <= w && th <= h);
        }
    }

    #[test]
    fn test_algorithm_filter() {
        assert_eq!(ResizeAlgorithm::default().to_filter_type(), FilterType::Lanczos3);
        assert_eq!(ResizeAlgorithm::Nearest.to_filter_type(), FilterType::Nearest);
    }
}
