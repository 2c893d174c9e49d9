//! Caption font resolution
//!
//! An ordered list of font files is tried in turn; each may fail on its own
//! (missing, unreadable, not a font). The chain always ends in the embedded
//! DejaVu Sans face, so resolution itself never fails.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontRef, FontVec, GlyphId, PxScale, ScaleFont};
use image::{Rgb, RgbImage};

/// Last-resort face compiled into the binary
static EMBEDDED_FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");

/// Platform CJK fonts, tried after any configured fonts
const PLATFORM_FONTS: &[&str] = &[
    // Windows
    "simhei.ttf",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "C:\\Windows\\Fonts\\msyh.ttc",
    // macOS
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    // Linux
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/wenquanyi/wqy-microhei/wqy-microhei.ttc",
];

/// A loaded caption font
pub enum CaptionFont {
    Vector { font: FontVec, origin: PathBuf },
    /// Embedded DejaVu Sans; no CJK coverage, missing glyphs render as boxes
    Builtin,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionFont::Vector { origin, .. } => {
                f.debug_struct("Vector").field("origin", origin).finish()
            }
            CaptionFont::Builtin => f.write_str("Builtin"),
        }
    }
}

/// Ordered font candidates
#[derive(Debug, Clone, Default)]
pub struct FontChain {
    candidates: Vec<PathBuf>,
}

impl FontChain {
    /// Configured fonts first, then the platform fonts
    pub fn with_platform_fonts(configured: &[PathBuf]) -> Self {
        let mut candidates = configured.to_vec();
        candidates.extend(PLATFORM_FONTS.iter().map(PathBuf::from));
        Self { candidates }
    }

    /// Only the given files; used where deterministic output matters
    pub fn only(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First loadable candidate, else the built-in font
    pub fn resolve(&self) -> CaptionFont {
        for path in &self.candidates {
            match load_font_file(path) {
                Ok(font) => {
                    tracing::info!(font = %path.display(), "Caption font loaded");
                    return CaptionFont::Vector {
                        font,
                        origin: path.clone(),
                    };
                }
                Err(reason) => {
                    tracing::debug!(font = %path.display(), %reason, "Font candidate skipped");
                }
            }
        }

        tracing::warn!("No CJK font found, using built-in font (Chinese text will render as boxes)");
        CaptionFont::Builtin
    }
}

fn load_font_file(path: &Path) -> Result<FontVec, String> {
    let data = std::fs::read(path).map_err(|e| e.to_string())?;
    // Collections (.ttc) load their first face
    FontVec::try_from_vec_and_index(data, 0).map_err(|e| e.to_string())
}

impl CaptionFont {
    pub fn is_builtin(&self) -> bool {
        matches!(self, CaptionFont::Builtin)
    }

    /// Draw one line with its top edge at `y`
    pub fn draw_text(
        &self,
        canvas: &mut RgbImage,
        x: i32,
        y: i32,
        size: f32,
        color: Rgb<u8>,
        text: &str,
    ) {
        match self {
            CaptionFont::Vector { font, .. } => draw_vector_text(canvas, font, x, y, size, color, text),
            CaptionFont::Builtin => match FontRef::try_from_slice(EMBEDDED_FONT) {
                Ok(font) => draw_vector_text(canvas, &font, x, y, size, color, text),
                Err(e) => tracing::error!(error = %e, "Embedded font unreadable, caption skipped"),
            },
        }
    }
}

fn draw_vector_text<F: Font>(
    canvas: &mut RgbImage,
    font: &F,
    x: i32,
    y: i32,
    size: f32,
    color: Rgb<u8>,
    text: &str,
) {
    let scale = PxScale::from(size);
    let scaled = font.as_scaled(scale);
    let baseline = y as f32 + scaled.ascent();
    let mut caret = x as f32;
    let mut previous: Option<GlyphId> = None;

    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, baseline));
        caret += scaled.h_advance(id);
        previous = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                blend(canvas, px, py, color, coverage);
            });
        }
    }
}

/// Alpha-blend `color` over the pixel at (`x`, `y`); off-canvas is ignored
fn blend(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for (dst, src) in pixel.0.iter_mut().zip(color.0) {
        *dst = (*dst as f32 * (1.0 - alpha) + src as f32 * alpha).round() as u8;
    }
}
