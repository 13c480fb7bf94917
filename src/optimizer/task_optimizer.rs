//! # Task Optimizer Module
//!
//! Questo modulo è il worker per un singolo file: l'executor di transcodifica.
//!
//! ## Pipeline per file:
//! 1. Legge la dimensione e sonda il formato tramite il codec
//! 2. Chiede alla policy cosa fare
//! 3. Ri-codifica in place (resize-fit + stesso formato, replace atomico)
//! 4. Opzionalmente converte al container target dietro il gate di
//!    profittabilità, partendo dai bytes appena ri-codificati e cancellando
//!    l'originale solo quando il nuovo file è su disco
//!
//! ## Garanzie:
//! - Un encode fallito lascia l'originale intatto
//! - Dopo una conversione esiste esattamente uno tra {originale, convertito}
//! - Nessun errore esce da `process`: produce sempre un `ActionResult`
//! - Dry run e run reale prendono le stesse decisioni sugli stessi bytes

use crate::{
    asset::{AssetKind, AssetRef, Format},
    cleanup,
    error::BudgetError,
    file_manager::FileManager,
    image_processor::{Codec, EncodedImage},
    optimizer::path_resolver::PathResolver,
    outcome::{ActionResult, SkipReason},
    policy::{Action, ConversionPlan, EncodeParams, OptimizationPolicy},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Knobs that are not policy
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Encode everything but never touch the disk
    pub dry_run: bool,
    /// Suffix of temp files created during atomic replace
    pub temp_suffix: String,
    /// Root used to shorten paths in log lines
    pub project_root: PathBuf,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            temp_suffix: ".optimized".to_string(),
            project_root: PathBuf::new(),
        }
    }
}

/// Transcode executor for individual files
pub struct TaskOptimizer {
    codec: Arc<dyn Codec>,
    policy: Arc<OptimizationPolicy>,
    options: ExecutorOptions,
}

impl TaskOptimizer {
    pub fn new(codec: Arc<dyn Codec>, policy: Arc<OptimizationPolicy>, options: ExecutorOptions) -> Self {
        Self { codec, policy, options }
    }

    fn display(&self, path: &Path) -> String {
        PathResolver::display_relative(path, &self.options.project_root)
    }

    /// Process one file to a terminal outcome
    pub fn process(&self, path: &Path) -> ActionResult {
        match self.try_process(path) {
            Ok(result) => result,
            Err(e) if e.is_decode() => {
                warn!("Skipping undecodable image {}: {}", self.display(path), e);
                ActionResult::Skipped(SkipReason::Undecodable(e.to_string()))
            }
            Err(e) => {
                error!("Error optimizing {}: {}", self.display(path), e);
                ActionResult::Failed(e.to_string())
            }
        }
    }

    fn try_process(&self, path: &Path) -> Result<ActionResult, BudgetError> {
        let original_size = FileManager::file_size(path)?;
        let asset_ref = AssetRef::new(path);
        let format = if original_size > 0 && asset_ref.kind() == AssetKind::Image {
            asset_ref.declared_format(self.codec.as_ref())
        } else {
            None
        };

        match self.policy.decide(path, original_size, format) {
            Action::Skip(reason) => {
                debug!("Skipping {}: {}", self.display(path), reason);
                Ok(ActionResult::Skipped(reason))
            }
            Action::Delete { size } => Ok(cleanup::delete_file(path, size, self.options.dry_run)),
            Action::ReEncode { format, params, convert } => {
                let reencoded = self.reencode_in_place(path, original_size, format, &params)?;
                match convert {
                    Some(plan) => self.convert(path, original_size, &reencoded.bytes, &plan),
                    None => Ok(ActionResult::ReEncoded {
                        original_size,
                        new_size: reencoded.len(),
                    }),
                }
            }
        }
    }

    /// Resize-fit and re-encode `path` in its own format, replacing it atomically
    ///
    /// Returns the encoded image, which may be larger than the original.
    /// In dry run the bytes are only kept in memory.
    pub fn reencode_in_place(
        &self,
        path: &Path,
        original_size: u64,
        format: Format,
        params: &EncodeParams,
    ) -> Result<EncodedImage, BudgetError> {
        let encoded = self
            .codec
            .resize_encode(path, &params.resize, format, params.quality)?;
        let new_size = encoded.len();

        if !self.options.dry_run {
            FileManager::replace_atomically(path, &encoded.bytes, &self.options.temp_suffix)?;
        }

        let saved = FileManager::calculate_reduction(original_size, new_size);
        if self.policy.is_noticeable(saved) {
            info!("✅ Optimized {} (saved {:.1}%)", self.display(path), saved);
        } else {
            debug!("Re-encoded {} ({:.1}% saved)", self.display(path), saved);
        }

        Ok(encoded)
    }

    /// Try to replace `path` by a sibling in the plan's target container
    ///
    /// `original_size` is the size before any work, `current` the re-encoded
    /// bytes. The candidate is decoded from `current` and the gate compares
    /// against its length, so dry runs see what a real run would write.
    pub fn convert(
        &self,
        path: &Path,
        original_size: u64,
        current: &[u8],
        plan: &ConversionPlan,
    ) -> Result<ActionResult, BudgetError> {
        let current_size = current.len() as u64;
        let kept = ActionResult::ReEncoded {
            original_size,
            new_size: current_size,
        };

        let Some(target_path) = PathResolver::conversion_path(path, plan.target) else {
            return Ok(kept);
        };
        if target_path.exists() {
            debug!(
                "Not converting {}: {} already exists",
                self.display(path),
                self.display(&target_path)
            );
            return Ok(kept);
        }

        let candidate = self
            .codec
            .transcode(path, current, &plan.params.resize, plan.target, plan.params.quality)?;
        let candidate_size = candidate.len();
        let rejected = ActionResult::ConversionRejected {
            original_size,
            new_size: current_size,
            candidate_size,
        };

        if !plan.is_profitable(current_size, candidate_size) {
            debug!(
                "{} is not smaller as {} ({} vs {}), keeping original",
                self.display(path),
                plan.target,
                FileManager::format_size(candidate_size),
                FileManager::format_size(current_size)
            );
            return Ok(rejected);
        }

        if !self.options.dry_run {
            match FileManager::create_atomically(&target_path, &candidate.bytes, &self.options.temp_suffix, path) {
                Ok(()) => {}
                Err(BudgetError::FileSystem { source, .. }) if source.kind() == ErrorKind::AlreadyExists => {
                    warn!(
                        "{} appeared while converting {}, keeping original",
                        self.display(&target_path),
                        self.display(path)
                    );
                    return Ok(rejected);
                }
                Err(e) => return Err(e),
            }

            if let Err(e) = std::fs::remove_file(path) {
                // never leave both files behind
                if let Err(rollback) = std::fs::remove_file(&target_path) {
                    error!(
                        "Failed to roll back {} after conversion error: {}",
                        self.display(&target_path),
                        rollback
                    );
                }
                return Err(BudgetError::fs(path, e));
            }
        }

        info!(
            "✅ Converted {} -> {} (saved {:.1}%)",
            self.display(path),
            plan.target,
            FileManager::calculate_reduction(current_size, candidate_size)
        );

        Ok(ActionResult::Converted {
            new_path: target_path,
            original_size,
            new_size: candidate_size,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::image_processor::{tests::noisy_image, EncodedImage, ImageMetadata, ImageProcessor};
    use crate::policy::ConversionPolicy;
    use crate::resize::ResizeBox;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Deterministic codec: output sizes are fixed per target format
    pub(crate) struct MockCodec {
        pub format: Format,
        pub sizes: BTreeMap<Format, usize>,
        pub fail_decode: bool,
        pub fail_encode: bool,
        /// Turn the source path into a non-empty directory while encoding to
        /// WebP, so the original can no longer be unlinked afterwards
        pub lock_source_on_convert: bool,
        /// Length of every input handed to `transcode`, in call order
        pub inputs: Mutex<Vec<usize>>,
    }

    impl MockCodec {
        pub(crate) fn new(format: Format, reencoded: usize, converted: usize) -> Self {
            let mut sizes = BTreeMap::new();
            sizes.insert(format, reencoded);
            sizes.insert(Format::Webp, converted);
            Self {
                format,
                sizes,
                fail_decode: false,
                fail_encode: false,
                lock_source_on_convert: false,
                inputs: Mutex::new(Vec::new()),
            }
        }
    }

    impl Codec for MockCodec {
        fn metadata(&self, _path: &Path) -> Result<ImageMetadata, BudgetError> {
            Ok(ImageMetadata {
                width: 1600,
                height: 1200,
                format: self.format,
            })
        }

        fn transcode(
            &self,
            path: &Path,
            data: &[u8],
            fit: &ResizeBox,
            format: Format,
            _quality: u8,
        ) -> Result<EncodedImage, BudgetError> {
            self.inputs.lock().unwrap().push(data.len());
            if self.lock_source_on_convert && format == Format::Webp {
                fs::remove_file(path).unwrap();
                fs::create_dir(path).unwrap();
                fs::write(path.join("pinned"), b"x").unwrap();
            }
            if self.fail_decode {
                return Err(BudgetError::decode(
                    path,
                    image::ImageError::IoError(std::io::Error::other("truncated")),
                ));
            }
            if self.fail_encode {
                return Err(BudgetError::encode(path, format, "mock failure"));
            }
            let (width, height) = fit.target_dimensions(1600, 1200);
            let len = self.sizes.get(&format).copied().unwrap_or(1);
            Ok(EncodedImage {
                bytes: vec![b'x'; len],
                width,
                height,
                format,
            })
        }
    }

    pub(crate) fn test_policy() -> OptimizationPolicy {
        let fit = ResizeBox::new(800, 800);
        let mut formats = BTreeMap::new();
        formats.insert(Format::Jpeg, EncodeParams::new(75, fit));
        formats.insert(Format::Png, EncodeParams::new(80, fit));
        formats.insert(Format::Webp, EncodeParams::new(80, fit));
        formats.insert(Format::Gif, EncodeParams::new(80, fit));
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

    fn executor(codec: impl Codec + 'static, dry_run: bool) -> TaskOptimizer {
        TaskOptimizer::new(
            Arc::new(codec),
            Arc::new(test_policy()),
            ExecutorOptions {
                dry_run,
                ..ExecutorOptions::default()
            },
        )
    }

    fn write(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![b'o'; len]).unwrap();
        path
    }

    #[test]
    fn test_profitable_conversion_replaces_original() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", 1000);

        let result = executor(MockCodec::new(Format::Jpeg, 900, 500), false).process(&path);

        let webp = dir.path().join("photo.webp");
        assert_eq!(
            result,
            ActionResult::Converted {
                new_path: webp.clone(),
                original_size: 1000,
                new_size: 500,
            }
        );
        assert!(!path.exists());
        assert_eq!(fs::read(&webp).unwrap().len(), 500);
    }

    #[test]
    fn test_unprofitable_conversion_keeps_reencoded_original() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", 1000);

        let result = executor(MockCodec::new(Format::Jpeg, 900, 700), false).process(&path);

        assert_eq!(
            result,
            ActionResult::ConversionRejected {
                original_size: 1000,
                new_size: 900,
                candidate_size: 700,
            }
        );
        assert_eq!(fs::read(&path).unwrap().len(), 900);
        assert!(!dir.path().join("photo.webp").exists());
    }

    #[test]
    fn test_rejected_conversion_leaves_file_byte_identical() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.png", 1000);
        let before = fs::read(&path).unwrap();
        let plan = ConversionPlan {
            target: Format::Webp,
            params: EncodeParams::new(80, ResizeBox::new(800, 800)),
            profitability_ratio: 0.7,
        };

        let exec = executor(MockCodec::new(Format::Png, 1000, 800), false);
        let result = exec.convert(&path, 1000, &before, &plan).unwrap();

        assert!(matches!(result, ActionResult::ConversionRejected { candidate_size: 800, .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!dir.path().join("a.webp").exists());
    }

    #[test]
    fn test_reencode_only_for_non_source_format() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "anim.gif", 1000);

        let result = executor(MockCodec::new(Format::Gif, 400, 10), false).process(&path);

        assert_eq!(result, ActionResult::ReEncoded { original_size: 1000, new_size: 400 });
        assert_eq!(fs::read(&path).unwrap().len(), 400);
        assert!(!dir.path().join("anim.webp").exists());
    }

    #[test]
    fn test_existing_sibling_is_never_clobbered() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "hero.png", 1000);
        let sibling = write(&dir, "hero.webp", 77);

        let result = executor(MockCodec::new(Format::Png, 900, 10), false).process(&path);

        assert_eq!(result, ActionResult::ReEncoded { original_size: 1000, new_size: 900 });
        assert!(path.exists());
        assert_eq!(fs::read(&sibling).unwrap().len(), 77);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", 1000);

        let result = executor(MockCodec::new(Format::Jpeg, 900, 100), true).process(&path);

        assert!(matches!(result, ActionResult::Converted { new_size: 100, .. }));
        assert_eq!(fs::read(&path).unwrap().len(), 1000);
        assert!(!dir.path().join("photo.webp").exists());
    }

    #[test]
    fn test_dry_run_converts_from_reencoded_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", 1000);
        let codec = Arc::new(MockCodec::new(Format::Jpeg, 900, 100));
        let exec = TaskOptimizer::new(
            Arc::clone(&codec) as Arc<dyn Codec>,
            Arc::new(test_policy()),
            ExecutorOptions {
                dry_run: true,
                ..ExecutorOptions::default()
            },
        );

        assert!(matches!(exec.process(&path), ActionResult::Converted { .. }));

        // re-encode reads the 1000 bytes on disk, conversion the 900 in memory
        assert_eq!(*codec.inputs.lock().unwrap(), vec![1000, 900]);
        assert_eq!(fs::read(&path).unwrap().len(), 1000);
    }

    #[test]
    fn test_failed_original_removal_rolls_back_conversion() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", 1000);
        let mut codec = MockCodec::new(Format::Jpeg, 900, 100);
        codec.lock_source_on_convert = true;

        let result = executor(codec, false).process(&path);

        assert!(result.is_failure(), "{result:?}");
        assert!(!dir.path().join("photo.webp").exists());
        assert!(path.exists());
        assert_eq!(FileManager::walk_files(dir.path()).count(), 1);
    }

    #[test]
    fn test_decode_failure_is_skip() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.png", 1000);
        let mut codec = MockCodec::new(Format::Png, 900, 100);
        codec.fail_decode = true;

        let result = executor(codec, false).process(&path);

        assert!(matches!(result, ActionResult::Skipped(SkipReason::Undecodable(_))));
        assert_eq!(fs::read(&path).unwrap().len(), 1000);
    }

    #[test]
    fn test_encode_failure_keeps_original() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", 1000);
        let before = fs::read(&path).unwrap();
        let mut codec = MockCodec::new(Format::Jpeg, 900, 100);
        codec.fail_encode = true;

        let result = executor(codec, false).process(&path);

        assert!(result.is_failure());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(FileManager::walk_files(dir.path()).count(), 1);
    }

    #[test]
    fn test_svg_and_empty_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let svg = write(&dir, "logo.svg", 5_000_000);
        let empty = write(&dir, "empty.png", 0);
        let exec = executor(MockCodec::new(Format::Png, 1, 1), false);

        assert_eq!(exec.process(&svg), ActionResult::Skipped(SkipReason::Vector));
        assert_eq!(exec.process(&empty), ActionResult::Skipped(SkipReason::Empty));
        assert_eq!(fs::read(&svg).unwrap().len(), 5_000_000);
    }

    #[test]
    fn test_vanished_file_fails() {
        let dir = TempDir::new().unwrap();
        let exec = executor(MockCodec::new(Format::Png, 1, 1), false);
        assert!(exec.process(&dir.path().join("gone.png")).is_failure());
    }

    #[test]
    fn test_real_codec_large_jpeg_scenario() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.jpg");
        noisy_image(1600, 1200).save(&path).unwrap();
        let webp = dir.path().join("big.webp");

        let exec = executor(ImageProcessor::default(), false);
        let result = exec.process(&path);

        // exactly one of the two survives, and it fits the box
        assert_ne!(path.exists(), webp.exists(), "result: {result:?}");
        let survivor = if path.exists() { &path } else { &webp };
        let (w, h) = image::image_dimensions(survivor).unwrap();
        assert!(w <= 800 && h <= 800, "{w}x{h}");

        match result {
            ActionResult::Converted { new_path, .. } => assert_eq!(new_path, webp),
            ActionResult::ConversionRejected { .. } => assert!(path.exists()),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_real_codec_truncated_png_is_skipped() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.png");
        noisy_image(64, 64).save(&good).unwrap();
        let bytes = fs::read(&good).unwrap();
        let broken = dir.path().join("broken.png");
        fs::write(&broken, &bytes[..bytes.len() / 2]).unwrap();

        let result = executor(ImageProcessor::default(), false).process(&broken);

        assert!(matches!(result, ActionResult::Skipped(_)), "{result:?}");
        assert_eq!(fs::read(&broken).unwrap(), &bytes[..bytes.len() / 2]);
    }
}
