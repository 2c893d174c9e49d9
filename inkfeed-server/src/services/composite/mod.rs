//! Composite image builder
//!
//! Layout (top to bottom): posture photo, work photo, white footer band with
//! three caption lines. Both photos are scaled to the same width. CPU-bound;
//! callers on the async runtime run it via `spawn_blocking`.

mod fonts;

pub use fonts::{CaptionFont, FontChain};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::io::Limits;
use image::{ColorType, Rgb, RgbImage};
use thiserror::Error;

use crate::config::CompositeSettings;

/// Left margin of caption lines
const TEXT_X: i32 = 30;

/// Composite errors
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("Cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Image has zero width: {0}")]
    EmptyImage(PathBuf),

    #[error("Composite of {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u64, limit: u64 },

    #[error("Composite worker failed: {0}")]
    Worker(String),
}

/// Inputs for one composite
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub posture_path: PathBuf,
    pub work_path: PathBuf,
    pub output_path: PathBuf,
    pub class_name: String,
    pub student_name: String,
    pub comment: String,
    /// First caption line's time, `YYYY-MM-DD HH:MM`
    pub caption_time: String,
}

/// Dimensions of the written composite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeInfo {
    pub width: u32,
    pub height: u32,
}

/// One caption line in the footer band
struct CaptionLine {
    offset: i32,
    size: f32,
    color: Rgb<u8>,
    text: String,
}

/// Builds annotated composites; the caption font is resolved once at construction
pub struct CompositeBuilder {
    settings: CompositeSettings,
    font: CaptionFont,
}

impl CompositeBuilder {
    /// Resolve fonts from configured paths and the platform chain
    pub fn new(settings: CompositeSettings) -> Self {
        let font = FontChain::with_platform_fonts(&settings.font_paths).resolve();
        Self { settings, font }
    }

    pub fn with_font(settings: CompositeSettings, font: CaptionFont) -> Self {
        Self { settings, font }
    }

    pub fn font(&self) -> &CaptionFont {
        &self.font
    }

    pub fn build(&self, request: &CompositeRequest) -> Result<CompositeInfo, CompositeError> {
        tracing::info!(student = %request.student_name, class_name = %request.class_name, "Building composite");

        let width = self.settings.target_width.max(1);
        let limits = self.decode_limits();
        let posture = decode_rgb(&request.posture_path, limits.clone())?;
        let work = decode_rgb(&request.work_path, limits)?;

        let posture_height = scaled_height(&posture, width, &request.posture_path)?;
        let work_height = scaled_height(&work, width, &request.work_path)?;
        let height = self.checked_canvas_height(width, posture_height + work_height)?;

        // Both heights fit in u32 once the canvas is within limits
        let posture = imageops::resize(&posture, width, posture_height as u32, FilterType::Lanczos3);
        let work = imageops::resize(&work, width, work_height as u32, FilterType::Lanczos3);

        let photos_height = posture.height() + work.height();
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        imageops::replace(&mut canvas, &posture, 0, 0);
        imageops::replace(&mut canvas, &work, 0, i64::from(posture.height()));

        let footer_top = photos_height as i32;
        for line in self.caption_lines(request) {
            self.font.draw_text(
                &mut canvas,
                TEXT_X,
                footer_top + line.offset,
                line.size,
                line.color,
                &line.text,
            );
        }

        write_jpeg(&canvas, &request.output_path, self.settings.jpeg_quality)?;

        tracing::info!(output = %request.output_path.display(), width, height, "Composite written");
        Ok(CompositeInfo { width, height })
    }

    /// Decoder limits derived from the canvas budget
    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.settings.max_canvas_pixels.saturating_mul(4));
        limits
    }

    /// Total canvas height, or `TooLarge` when the canvas would exceed the pixel limit
    fn checked_canvas_height(&self, width: u32, photos_height: u64) -> Result<u32, CompositeError> {
        let height = photos_height + u64::from(self.settings.footer_height);
        let limit = self.settings.max_canvas_pixels;
        let pixels = u64::from(width).saturating_mul(height);

        match u32::try_from(height) {
            Ok(h) if pixels <= limit => Ok(h),
            _ => {
                tracing::warn!(width, height, limit, "Composite exceeds pixel limit");
                Err(CompositeError::TooLarge { width, height, limit })
            }
        }
    }

    fn caption_lines(&self, request: &CompositeRequest) -> [CaptionLine; 3] {
        [
            CaptionLine {
                offset: 20,
                size: 28.0,
                color: Rgb([0x2c, 0x3e, 0x50]),
                text: format!("{} | {}", request.caption_time, request.class_name),
            },
            CaptionLine {
                offset: 60,
                size: 36.0,
                color: Rgb([0x27, 0xae, 0x60]),
                text: format!("{}：{}", request.student_name, request.comment),
            },
            CaptionLine {
                offset: 120,
                size: 28.0,
                color: Rgb([0x95, 0xa5, 0xa6]),
                text: self.settings.watermark.clone(),
            },
        ]
    }
}

/// Decode by content sniffing; uploads are stored as `.jpg` whatever they are
fn decode_rgb(path: &Path, limits: Limits) -> Result<RgbImage, CompositeError> {
    let mut reader = image::io::Reader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| CompositeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    reader.limits(limits);

    let decoded = reader.decode().map_err(|source| CompositeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.to_rgb8())
}

/// Height after scaling to `width` with the aspect ratio kept; at least one row
fn scaled_height(img: &RgbImage, width: u32, path: &Path) -> Result<u64, CompositeError> {
    if img.width() == 0 {
        return Err(CompositeError::EmptyImage(path.to_path_buf()));
    }
    let height = u64::from(img.height()) * u64::from(width) / u64::from(img.width());
    Ok(height.max(1))
}

fn write_jpeg(canvas: &RgbImage, path: &Path, quality: u8) -> Result<(), CompositeError> {
    let write_err = |source| CompositeError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode(canvas.as_raw(), canvas.width(), canvas.height(), ColorType::Rgb8)?;
    writer.flush().map_err(write_err)?;
    Ok(())
}
