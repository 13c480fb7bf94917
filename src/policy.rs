//! # Policy Engine
//!
//! Questo modulo trasforma "cos'è questo file" in "cosa deve succedergli". Le
//! decisioni sono pure: qui non si accede né al filesystem né al codec, il
//! chiamante fornisce dimensione e formato sondato.
//!
//! ## Policy:
//! - `DeletionPolicy`: cancellazione incondizionata sopra una soglia in byte,
//!   limitata alle sole immagini o a tutti i file
//! - `OptimizationPolicy`: tabella qualità/resize per formato più una
//!   `ConversionPolicy` opzionale (es. png/jpeg → webp dietro un gate di
//!   profittabilità)
//!
//! ## Ordine delle decisioni per l'ottimizzazione:
//! 1. vettoriale → skip
//! 2. non è un'immagine raster → skip
//! 3. vuoto → skip
//! 4. nessun metadata → skip
//! 5. formato non in tabella → skip
//! 6. altrimenti ri-codifica, con un piano di conversione quando il formato è
//!    una sorgente di conversione e il path non è già nel container target

use crate::asset::{self, AssetKind, Format};
use crate::outcome::SkipReason;
use crate::resize::ResizeBox;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Encode parameters for one format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeParams {
    /// 1-100
    pub quality: u8,
    #[serde(default)]
    pub resize: ResizeBox,
}

impl EncodeParams {
    pub fn new(quality: u8, resize: ResizeBox) -> Self {
        Self { quality, resize }
    }
}

/// Which files a deletion phase considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionScope {
    /// Raster images only (svg and friends are never touched)
    Images,
    /// Every regular file
    AllFiles,
}

/// Size-threshold deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPolicy {
    pub threshold_bytes: u64,
    pub scope: DeletionScope,
}

/// Transcode to another container when it pays off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionPolicy {
    pub target: Format,
    pub params: EncodeParams,
    /// Decoded formats eligible for conversion
    pub sources: Vec<Format>,
    /// Keep the candidate only if `candidate < ratio * original`
    pub profitability_ratio: f64,
}

impl ConversionPolicy {
    pub fn is_profitable(&self, original_size: u64, candidate_size: u64) -> bool {
        passes_gate(self.profitability_ratio, original_size, candidate_size)
    }
}

/// Gate di profittabilità: strettamente più piccolo di `ratio` dell'originale
fn passes_gate(ratio: f64, original_size: u64, candidate_size: u64) -> bool {
    (candidate_size as f64) < ratio * original_size as f64
}

/// Quality reduction table plus optional conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPolicy {
    pub formats: BTreeMap<Format, EncodeParams>,
    #[serde(default)]
    pub conversion: Option<ConversionPolicy>,
    /// Minimum fraction saved before a re-encode is worth a log line
    pub noise_threshold: f64,
}

/// Conversion step attached to a re-encode
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    pub target: Format,
    pub params: EncodeParams,
    pub profitability_ratio: f64,
}

/// Cosa fare con un file
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Delete { size: u64 },
    ReEncode {
        format: Format,
        params: EncodeParams,
        convert: Option<ConversionPlan>,
    },
    Skip(SkipReason),
}

impl DeletionPolicy {
    pub fn new(threshold_bytes: u64, scope: DeletionScope) -> Self {
        Self { threshold_bytes, scope }
    }

    pub fn decide(&self, path: &Path, size: u64) -> Action {
        if self.scope == DeletionScope::Images && !asset::is_image(path) {
            return Action::Skip(SkipReason::NotAnImage);
        }
        if size > self.threshold_bytes {
            Action::Delete { size }
        } else {
            Action::Skip(SkipReason::WithinThreshold)
        }
    }
}

impl OptimizationPolicy {
    pub fn params_for(&self, format: Format) -> Option<&EncodeParams> {
        self.formats.get(&format)
    }

    /// True if a re-encode saving `percent` is worth reporting
    pub fn is_noticeable(&self, percent_saved: f64) -> bool {
        percent_saved > self.noise_threshold * 100.0
    }

    pub fn decide(&self, path: &Path, size: u64, format: Option<Format>) -> Action {
        match asset::classify(path) {
            AssetKind::Vector => return Action::Skip(SkipReason::Vector),
            AssetKind::Other => return Action::Skip(SkipReason::NotAnImage),
            AssetKind::Image => {}
        }
        if size == 0 {
            return Action::Skip(SkipReason::Empty);
        }
        let Some(format) = format else {
            return Action::Skip(SkipReason::NoMetadata);
        };
        let Some(params) = self.params_for(format) else {
            return Action::Skip(SkipReason::UnsupportedFormat(format.to_string()));
        };

        let convert = self.conversion.as_ref().and_then(|conversion| {
            let eligible = conversion.sources.contains(&format)
                && !conversion.target.matches_extension(path);
            eligible.then(|| ConversionPlan {
                target: conversion.target,
                params: conversion.params,
                profitability_ratio: conversion.profitability_ratio,
            })
        });

        Action::ReEncode {
            format,
            params: *params,
            convert,
        }
    }
}

impl ConversionPlan {
    pub fn is_profitable(&self, original_size: u64, candidate_size: u64) -> bool {
        passes_gate(self.profitability_ratio, original_size, candidate_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OptimizationPolicy {
        let fit = ResizeBox::new(800, 800);
        let mut formats = BTreeMap::new();
        formats.insert(Format::Jpeg, EncodeParams::new(75, fit));
        formats.insert(Format::Png, EncodeParams::new(80, fit));
        formats.insert(Format::Webp, EncodeParams::new(80, fit));
        OptimizationPolicy {
            formats,
            conversion: Some(ConversionPolicy {
                target: Format::Webp,
                params: EncodeParams::new(80, fit),
                sources: vec![Format::Png, Format::Jpeg],
                profitability_ratio: 0.7,
            }),
            noise_threshold: 0.05,
        }
    }

    #[test]
    fn test_deletion_threshold_is_strict() {
        let p = DeletionPolicy::new(100 * 1024, DeletionScope::Images);
        assert_eq!(
            p.decide(Path::new("a.png"), 150 * 1024),
            Action::Delete { size: 150 * 1024 }
        );
        assert_eq!(
            p.decide(Path::new("a.png"), 100 * 1024),
            Action::Skip(SkipReason::WithinThreshold)
        );
    }

    #[test]
    fn test_deletion_scope() {
        let images = DeletionPolicy::new(10, DeletionScope::Images);
        assert_eq!(
            images.decide(Path::new("huge.svg"), 1_000_000),
            Action::Skip(SkipReason::NotAnImage)
        );
        let all = DeletionPolicy::new(10, DeletionScope::AllFiles);
        assert_eq!(
            all.decide(Path::new("font.ttf"), 11),
            Action::Delete { size: 11 }
        );
    }

    #[test]
    fn test_svg_never_optimized() {
        assert_eq!(
            policy().decide(Path::new("logo.svg"), 5_000_000, None),
            Action::Skip(SkipReason::Vector)
        );
    }

    #[test]
    fn test_skip_reasons() {
        let p = policy();
        assert_eq!(
            p.decide(Path::new("a.txt"), 10, None),
            Action::Skip(SkipReason::NotAnImage)
        );
        assert_eq!(
            p.decide(Path::new("a.png"), 0, Some(Format::Png)),
            Action::Skip(SkipReason::Empty)
        );
        assert_eq!(
            p.decide(Path::new("a.png"), 10, None),
            Action::Skip(SkipReason::NoMetadata)
        );
        assert_eq!(
            p.decide(Path::new("a.gif"), 10, Some(Format::Gif)),
            Action::Skip(SkipReason::UnsupportedFormat("gif".into()))
        );
    }

    #[test]
    fn test_jpeg_gets_conversion_plan() {
        match policy().decide(Path::new("photo.JPG"), 40_000, Some(Format::Jpeg)) {
            Action::ReEncode { format, params, convert } => {
                assert_eq!(format, Format::Jpeg);
                assert_eq!(params.quality, 75);
                let plan = convert.expect("jpeg is a conversion source");
                assert_eq!(plan.target, Format::Webp);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_no_conversion_for_target_or_non_source() {
        match policy().decide(Path::new("a.webp"), 10, Some(Format::Webp)) {
            Action::ReEncode { convert, .. } => assert!(convert.is_none()),
            other => panic!("unexpected action {other:?}"),
        }
        // webp content hiding behind a .png name is still not a source
        match policy().decide(Path::new("a.png"), 10, Some(Format::Webp)) {
            Action::ReEncode { convert, .. } => assert!(convert.is_none()),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_profitability_gate() {
        let conversion = policy().conversion.unwrap();
        assert!(conversion.is_profitable(1000, 699));
        assert!(!conversion.is_profitable(1000, 700));
        assert!(!conversion.is_profitable(1000, 1500));
    }

    #[test]
    fn test_noise_threshold() {
        let p = policy();
        assert!(p.is_noticeable(5.1));
        assert!(!p.is_noticeable(5.0));
        assert!(!p.is_noticeable(-3.0));
    }
}
