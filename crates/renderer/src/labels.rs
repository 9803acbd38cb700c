//! Text labels drawn with a TrueType font.

use rusttype::{point, Font, Scale};
use std::path::Path;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// A loaded label font.
pub struct LabelFont {
    font: Font<'static>,
}

impl LabelFont {
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        Font::try_from_vec(data).map(|font| Self { font })
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Option<Self>> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(data))
    }

    /// Draw `text` centred on (`x`, `y`).
    ///
    /// Glyph coverage is blended into the pixmap, which gives anti-aliased
    /// text edges. A halo is drawn first by offsetting the text one pixel in
    /// each direction.
    pub fn draw_centered(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: (u8, u8, u8, u8),
        halo: Option<(u8, u8, u8, u8)>,
    ) {
        if text.is_empty() || size <= 0.0 {
            return;
        }

        let scale = Scale::uniform(size);
        let v_metrics = self.font.v_metrics(scale);
        let width = self
            .font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);

        let origin_x = x - width / 2.0;
        let baseline = y + (v_metrics.ascent + v_metrics.descent) / 2.0;

        if let Some(halo) = halo {
            for (dx, dy) in [(-1.0, 0.0), (1.0, 0.0), (0.0, -1.0), (0.0, 1.0)] {
                self.draw_at(pixmap, text, scale, origin_x + dx, baseline + dy, halo);
            }
        }
        self.draw_at(pixmap, text, scale, origin_x, baseline, color);
    }

    fn draw_at(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        scale: Scale,
        x: f32,
        baseline: f32,
        color: (u8, u8, u8, u8),
    ) {
        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let pixels = pixmap.pixels_mut();

        for glyph in self.font.layout(text, scale, point(x, baseline)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let idx = (py * width + px) as usize;
                pixels[idx] = blend(pixels[idx], color, coverage);
            });
        }
    }
}

/// Source-over blend of a straight-alpha color with coverage onto a
/// premultiplied pixel.
fn blend(dst: PremultipliedColorU8, color: (u8, u8, u8, u8), coverage: f32) -> PremultipliedColorU8 {
    let (r, g, b, a) = color;
    let sa = (a as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let inv = 1.0 - sa;

    let channel = |s: u8, d: u8| (s as f32 * sa + d as f32 * inv).round().min(255.0) as u8;
    let out_a = (255.0 * sa + dst.alpha() as f32 * inv).round().min(255.0) as u8;
    let out_r = channel(r, dst.red()).min(out_a);
    let out_g = channel(g, dst.green()).min(out_a);
    let out_b = channel(b, dst.blue()).min(out_a);

    PremultipliedColorU8::from_rgba(out_r, out_g, out_b, out_a).unwrap_or(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_full_coverage_replaces_pixel() {
        let dst = PremultipliedColorU8::TRANSPARENT;
        let out = blend(dst, (10, 20, 30, 255), 1.0);
        assert_eq!((out.red(), out.green(), out.blue(), out.alpha()), (10, 20, 30, 255));
    }

    #[test]
    fn test_blend_zero_coverage_keeps_pixel() {
        let dst = PremultipliedColorU8::from_rgba(5, 5, 5, 200).unwrap();
        assert_eq!(blend(dst, (255, 0, 0, 255), 0.0), dst);
    }

    #[test]
    fn test_partial_coverage_is_translucent() {
        let out = blend(PremultipliedColorU8::TRANSPARENT, (255, 255, 255, 255), 0.5);
        assert!(out.alpha() > 100 && out.alpha() < 155);
    }

    #[test]
    fn test_invalid_font_bytes() {
        assert!(LabelFont::from_bytes(vec![0, 1, 2, 3]).is_none());
    }
}
