//! # Image Processing Module
//!
//! Questo modulo è il collaboratore codec: tutto ciò che tocca i pixel passa
//! dal trait [`Codec`], così policy ed executor non dipendono da una libreria
//! di imaging concreta.
//!
//! ## Operazioni:
//!
//! | Operazione | Significato |
//! |------------|-------------|
//! | `metadata` | legge larghezza, altezza e container senza decodificare i pixel |
//! | `transcode` | decodifica da bytes in memoria, resize fit-inside, encode al formato e qualità richiesti |
//! | `resize_encode` | come `transcode`, leggendo prima il file da disco |
//!
//! ## Backend:
//!
//! [`ImageProcessor`] è l'implementazione di produzione, costruita sul crate
//! `image` per decode e resize, con encoder dedicati dove `image` non ha una
//! manopola di qualità:
//!
//! | Formato | Decode | Encode | Qualità |
//! |---------|--------|--------|---------|
//! | JPEG    | ✅     | ✅     | qualità JPEG 1-100 |
//! | PNG     | ✅     | ✅     | < 100: palette quantizzata (`color_quant`), 100: lossless |
//! | GIF     | ✅     | ✅     | velocità del quantizzatore, solo primo frame |
//! | WebP    | ✅     | ✅     | lossy via libwebp (`webp`), qualità 1-100 |
//! | AVIF    | ❌     | ❌     | segnalato come non supportato |
//!
//! ## Errori:
//! - Problemi di decodifica diventano `BudgetError::Decode`, che i chiamanti
//!   trattano come "salta questo file"
//! - Problemi di encoding diventano `BudgetError::Encode`

use crate::asset::Format;
use crate::error::BudgetError;
use crate::resize::{ResizeAlgorithm, ResizeBox};
use color_quant::NeuQuant;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Header-level information about an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Format,
}

/// Result of a resize + encode
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: Format,
}

impl EncodedImage {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decode/resize/encode operations the pipeline needs from an imaging library
pub trait Codec: Send + Sync {
    /// Probe dimensions and container format
    fn metadata(&self, path: &Path) -> Result<ImageMetadata, BudgetError>;

    /// Decode `data`, shrink it into `fit`, and encode it as `format`.
    /// `path` only names the source in errors and logs.
    fn transcode(
        &self,
        path: &Path,
        data: &[u8],
        fit: &ResizeBox,
        format: Format,
        quality: u8,
    ) -> Result<EncodedImage, BudgetError>;

    /// Same as `transcode`, reading `path` from disk first
    fn resize_encode(
        &self,
        path: &Path,
        fit: &ResizeBox,
        format: Format,
        quality: u8,
    ) -> Result<EncodedImage, BudgetError> {
        let data = std::fs::read(path).map_err(|e| BudgetError::fs(path, e))?;
        self.transcode(path, &data, fit, format, quality)
    }
}

/// `image`-crate backed codec
#[derive(Debug, Clone, Default)]
pub struct ImageProcessor {
    algorithm: ResizeAlgorithm,
}

impl ImageProcessor {
    pub fn new(algorithm: ResizeAlgorithm) -> Self {
        Self { algorithm }
    }

    fn decode(&self, path: &Path, data: &[u8]) -> Result<DynamicImage, BudgetError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| BudgetError::fs(path, e))?;

        match reader.format().and_then(Format::from_codec) {
            Some(Format::Avif) | None => {
                return Err(BudgetError::UnsupportedFormat(format!(
                    "{} has no decodable container",
                    path.display()
                )))
            }
            Some(_) => {}
        }

        reader.decode().map_err(|e| BudgetError::decode(path, e))
    }

    /// Encode an already-sized image
    pub fn encode(
        &self,
        path: &Path,
        img: &DynamicImage,
        format: Format,
        quality: u8,
    ) -> Result<Vec<u8>, BudgetError> {
        let quality = quality.clamp(1, 100);
        match format {
            Format::Jpeg => encode_jpeg(img, quality),
            Format::Png if quality < 100 => encode_png_palette(img, quality),
            Format::Png => encode_png_lossless(img),
            Format::Webp => encode_webp(img, quality),
            Format::Gif => encode_gif(img, quality),
            Format::Avif => Err("no AVIF encoder available".to_string()),
        }
        .map_err(|reason| BudgetError::encode(path, format, reason))
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    // JPEG non ha canale alpha
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

fn encode_png_lossless(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
    let (width, height) = (img.width(), img.height());
    let written = if img.color().has_alpha() {
        encoder.write_image(img.to_rgba8().as_raw(), width, height, ExtendedColorType::Rgba8)
    } else {
        encoder.write_image(img.to_rgb8().as_raw(), width, height, ExtendedColorType::Rgb8)
    };
    written.map_err(|e| e.to_string())?;
    Ok(buf)
}

/// Palette size for a PNG quality: 100 keeps 256 colours, lower qualities fewer
fn palette_size(quality: u8) -> usize {
    (usize::from(quality) * 256 / 100).clamp(16, 256)
}

/// Quantise to an indexed palette, pngquant-style
fn encode_png_palette(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels = rgba.as_raw();

    let quantizer = NeuQuant::new(10, palette_size(quality), pixels);
    let color_map = quantizer.color_map_rgba();
    let indices: Vec<u8> = pixels
        .chunks_exact(4)
        .map(|px| quantizer.index_of(px) as u8)
        .collect();

    let palette: Vec<u8> = color_map
        .chunks_exact(4)
        .flat_map(|c| [c[0], c[1], c[2]])
        .collect();
    let alphas: Vec<u8> = color_map.chunks_exact(4).map(|c| c[3]).collect();

    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        encoder.set_palette(palette);
        if alphas.iter().any(|&a| a < u8::MAX) {
            encoder.set_trns(alphas);
        }
        let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
        writer.write_image_data(&indices).map_err(|e| e.to_string())?;
        writer.finish().map_err(|e| e.to_string())?;
    }
    Ok(buf)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let (width, height) = (img.width(), img.height());
    let memory = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, f32::from(quality))
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, f32::from(quality))
    }
    .map_err(|e| format!("libwebp: {:?}", e))?;
    Ok(memory.to_vec())
}

fn encode_gif(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buf, gif_speed(quality));
        encoder
            .encode_frame(image::Frame::new(img.to_rgba8()))
            .map_err(|e| e.to_string())?;
    }
    Ok(buf)
}

/// GIF quantisation speed: 1 is slowest/best, 30 fastest/worst
fn gif_speed(quality: u8) -> i32 {
    1 + (100 - i32::from(quality.min(100))) * 29 / 100
}

impl Codec for ImageProcessor {
    fn metadata(&self, path: &Path) -> Result<ImageMetadata, BudgetError> {
        let reader = ImageReader::open(path)
            .map_err(|e| BudgetError::fs(path, e))?
            .with_guessed_format()
            .map_err(|e| BudgetError::fs(path, e))?;

        let format = reader
            .format()
            .and_then(Format::from_codec)
            .ok_or_else(|| BudgetError::UnsupportedFormat(path.display().to_string()))?;

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| BudgetError::decode(path, e))?;

        Ok(ImageMetadata { width, height, format })
    }

    fn transcode(
        &self,
        path: &Path,
        data: &[u8],
        fit: &ResizeBox,
        format: Format,
        quality: u8,
    ) -> Result<EncodedImage, BudgetError> {
        let img = self.decode(path, data)?;
        let (width, height) = (img.width(), img.height());

        let img = if fit.needs_resize(width, height) {
            let (target_w, target_h) = fit.target_dimensions(width, height);
            debug!(
                "Resizing {} from {}x{} to {}x{}",
                path.display(),
                width,
                height,
                target_w,
                target_h
            );
            img.resize_exact(target_w, target_h, self.algorithm.to_filter_type())
        } else {
            img
        };

        let bytes = self.encode(path, &img, format, quality)?;
        Ok(EncodedImage {
            bytes,
            width: img.width(),
            height: img.height(),
            format,
        })
    }
}
