//! Feature rasterization.
//!
//! Each call builds its own viewport, pixmap and paints; nothing is shared
//! between requests and the pixmap is released before the image is returned.

use tiny_skia::{
    FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, StrokeDash,
    Transform,
};
use tracing::debug;

use wfs_common::feature::{Feature, FeatureCollection, Geometry, Position};
use wfs_common::{BoundingBox, CrsCode};

use crate::labels::LabelFont;
use crate::style::{
    Color, LabelSymbolizer, LineCapStyle, LineJoinStyle, MarkShape, MarkSymbolizer,
    StrokeSymbolizer, StyleDescriptor, StyleRule,
};

/// Errors that abort a draw.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Image width is missing")]
    MissingWidth,

    #[error("Image height is missing")]
    MissingHeight,

    #[error("Image location is missing")]
    MissingLocation,

    #[error("Style is missing")]
    MissingStyle,

    #[error("Image dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Viewport bounds are degenerate")]
    DegenerateBounds,

    #[error("Failed to allocate a {0}x{1} canvas")]
    Canvas(u32, u32),
}

/// A rendered image: straight-alpha RGBA, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// A fully transparent image.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// RGBA of the pixel at (`x`, `y`).
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// True when no pixel has any opacity.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }

    fn from_pixmap(pixmap: &Pixmap) -> Self {
        let mut pixels = Vec::with_capacity(pixmap.data().len());
        for p in pixmap.pixels() {
            let c = p.demultiply();
            pixels.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            pixels,
        }
    }
}

/// Pixel rectangle bound to a world extent in one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSpec {
    pub crs: CrsCode,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub bounds: BoundingBox,
    pub maintain_aspect_ratio: bool,
}

impl ViewportSpec {
    /// Validate the prerequisites of a draw. Each one is checked on its own.
    pub fn new(
        crs: CrsCode,
        width: Option<u32>,
        height: Option<u32>,
        location: Option<BoundingBox>,
    ) -> Result<Self, RenderError> {
        let pixel_width = width.ok_or(RenderError::MissingWidth)?;
        let pixel_height = height.ok_or(RenderError::MissingHeight)?;
        let bounds = location.ok_or(RenderError::MissingLocation)?;

        if pixel_width == 0 || pixel_height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: pixel_width,
                height: pixel_height,
            });
        }
        if bounds.is_degenerate() {
            return Err(RenderError::DegenerateBounds);
        }

        Ok(Self {
            crs,
            pixel_width,
            pixel_height,
            bounds,
            maintain_aspect_ratio: true,
        })
    }

    /// World extent actually shown.
    ///
    /// With a matching aspect ratio, the requested bounds are expanded about
    /// their centre along one axis until world and pixel ratios agree.
    pub fn display_bounds(&self) -> BoundingBox {
        if !self.maintain_aspect_ratio {
            return self.bounds;
        }

        let pixel_ratio = self.pixel_width as f64 / self.pixel_height as f64;
        let world_ratio = self.bounds.width() / self.bounds.height();
        let (cx, cy) = self.bounds.center();

        if world_ratio < pixel_ratio {
            let half_w = self.bounds.height() * pixel_ratio / 2.0;
            BoundingBox::new(cx - half_w, self.bounds.min_y, cx + half_w, self.bounds.max_y)
        } else if world_ratio > pixel_ratio {
            let half_h = self.bounds.width() / pixel_ratio / 2.0;
            BoundingBox::new(self.bounds.min_x, cy - half_h, self.bounds.max_x, cy + half_h)
        } else {
            self.bounds
        }
    }

    fn projector(&self) -> Projector {
        let world = self.display_bounds();
        Projector {
            min_x: world.min_x,
            max_y: world.max_y,
            sx: self.pixel_width as f64 / world.width(),
            sy: self.pixel_height as f64 / world.height(),
        }
    }
}

/// World to pixel mapping. Computed in f64 so projected metre coordinates
/// keep their precision until the final pixel value.
#[derive(Debug, Clone, Copy)]
struct Projector {
    min_x: f64,
    max_y: f64,
    sx: f64,
    sy: f64,
}

impl Projector {
    fn project(&self, p: Position) -> (f32, f32) {
        (
            ((p.x - self.min_x) * self.sx) as f32,
            ((self.max_y - p.y) * self.sy) as f32,
        )
    }
}

/// Inputs of a draw. Missing values are reported, not defaulted.
#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a> {
    pub crs: CrsCode,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub location: Option<BoundingBox>,
    pub style: Option<&'a StyleDescriptor>,
    pub features: &'a FeatureCollection,
}

/// Draws feature collections into images.
#[derive(Default)]
pub struct Rasterizer {
    font: Option<LabelFont>,
}

impl Rasterizer {
    pub fn new(font: Option<LabelFont>) -> Self {
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render a request, checking every prerequisite first.
    pub fn draw(&self, request: &DrawRequest<'_>) -> Result<RasterImage, RenderError> {
        let viewport = ViewportSpec::new(
            request.crs,
            request.width,
            request.height,
            request.location,
        )?;
        let style = request.style.ok_or(RenderError::MissingStyle)?;
        self.render(&viewport, style, request.features)
    }

    /// Render `features` with `style` into the viewport.
    pub fn render(
        &self,
        viewport: &ViewportSpec,
        style: &StyleDescriptor,
        features: &FeatureCollection,
    ) -> Result<RasterImage, RenderError> {
        let mut pixmap = Pixmap::new(viewport.pixel_width, viewport.pixel_height)
            .ok_or(RenderError::Canvas(viewport.pixel_width, viewport.pixel_height))?;

        if features.is_empty() {
            debug!(style = %style.name, "No features, rendering blank image");
            return Ok(RasterImage::from_pixmap(&pixmap));
        }

        let projector = viewport.projector();
        let mut labels = Vec::new();

        for feature in features.iter() {
            for rule in style.rules_for(feature) {
                draw_feature(&mut pixmap, &projector, feature, rule);
                if let Some(label) = &rule.label {
                    if let Some(placed) = place_label(&projector, feature, label) {
                        labels.push(placed);
                    }
                }
            }
        }

        // Labels go on top of all geometry
        if let Some(font) = &self.font {
            for (text, x, y, label) in &labels {
                font.draw_centered(
                    &mut pixmap,
                    text,
                    *x,
                    *y,
                    label.size,
                    label.color.to_rgba(),
                    label.halo_color.as_ref().map(Color::to_rgba),
                );
            }
        }

        Ok(RasterImage::from_pixmap(&pixmap))
    }
}

fn paint_for(color: &Color, opacity: f32) -> Paint<'static> {
    let (r, g, b, a) = color.to_rgba();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, (a as f32 * opacity.clamp(0.0, 1.0)).round() as u8);
    paint.anti_alias = true;
    paint
}

fn stroke_for(symbolizer: &StrokeSymbolizer) -> Stroke {
    let mut stroke = Stroke::default();
    stroke.width = symbolizer.width;
    stroke.line_cap = match symbolizer.line_cap {
        LineCapStyle::Butt => LineCap::Butt,
        LineCapStyle::Round => LineCap::Round,
        LineCapStyle::Square => LineCap::Square,
    };
    stroke.line_join = match symbolizer.line_join {
        LineJoinStyle::Miter => LineJoin::Miter,
        LineJoinStyle::Round => LineJoin::Round,
        LineJoinStyle::Bevel => LineJoin::Bevel,
    };
    if let Some(dash) = &symbolizer.dash {
        // An odd-length pattern repeats once to become even
        let mut intervals = dash.clone();
        if intervals.len() % 2 == 1 {
            intervals.extend_from_slice(dash);
        }
        stroke.dash = StrokeDash::new(intervals, 0.0);
    }
    stroke
}

fn line_path(projector: &Projector, line: &[Position], close: bool) -> Option<Path> {
    let (first, rest) = line.split_first()?;
    let mut pb = PathBuilder::new();
    let (x, y) = projector.project(*first);
    pb.move_to(x, y);
    for p in rest {
        let (x, y) = projector.project(*p);
        pb.line_to(x, y);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

fn polygon_path<'a>(projector: &Projector, rings: impl IntoIterator<Item = &'a Vec<Position>>) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for ring in rings {
        let Some((first, rest)) = ring.split_first() else {
            continue;
        };
        let (x, y) = projector.project(*first);
        pb.move_to(x, y);
        for p in rest {
            let (x, y) = projector.project(*p);
            pb.line_to(x, y);
        }
        pb.close();
    }
    pb.finish()
}

fn draw_feature(pixmap: &mut Pixmap, projector: &Projector, feature: &Feature, rule: &StyleRule) {
    let Some(geometry) = &feature.geometry else {
        return;
    };

    match geometry {
        Geometry::Point { coordinates } => draw_marks(pixmap, projector, std::slice::from_ref(coordinates), rule),
        Geometry::MultiPoint { coordinates } => draw_marks(pixmap, projector, coordinates, rule),
        Geometry::LineString { coordinates } => {
            draw_lines(pixmap, projector, std::slice::from_ref(coordinates), rule)
        }
        Geometry::MultiLineString { coordinates } => draw_lines(pixmap, projector, coordinates, rule),
        Geometry::Polygon { coordinates } => {
            draw_polygon(pixmap, polygon_path(projector, coordinates), rule)
        }
        Geometry::MultiPolygon { coordinates } => {
            let path = polygon_path(projector, coordinates.iter().flatten());
            draw_polygon(pixmap, path, rule)
        }
    }
}

fn draw_polygon(pixmap: &mut Pixmap, path: Option<Path>, rule: &StyleRule) {
    let Some(path) = path else {
        return;
    };
    if let Some(fill) = &rule.fill {
        let paint = paint_for(&fill.color, fill.opacity);
        pixmap.fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
    }
    if let Some(symbolizer) = &rule.stroke {
        let paint = paint_for(&symbolizer.color, symbolizer.opacity);
        pixmap.stroke_path(&path, &paint, &stroke_for(symbolizer), Transform::identity(), None);
    }
}

fn draw_lines(pixmap: &mut Pixmap, projector: &Projector, lines: &[Vec<Position>], rule: &StyleRule) {
    let Some(symbolizer) = &rule.stroke else {
        return;
    };
    let paint = paint_for(&symbolizer.color, symbolizer.opacity);
    let stroke = stroke_for(symbolizer);

    for line in lines {
        if line.len() < 2 {
            continue;
        }
        if let Some(path) = line_path(projector, line, false) {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}

fn draw_marks(pixmap: &mut Pixmap, projector: &Projector, points: &[Position], rule: &StyleRule) {
    let Some(mark) = &rule.mark else {
        return;
    };
    for p in points {
        let (x, y) = projector.project(*p);
        if let Some(path) = mark_path(mark, x, y) {
            if let Some(fill) = &mark.fill {
                if mark.shape != MarkShape::Cross {
                    let paint = paint_for(fill, 1.0);
                    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
            let outline = mark
                .stroke
                .as_ref()
                .or(if mark.shape == MarkShape::Cross { mark.fill.as_ref() } else { None });
            if let Some(color) = outline {
                let paint = paint_for(color, 1.0);
                let mut stroke = Stroke::default();
                stroke.width = mark.stroke_width.max(1.0);
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }
}

fn mark_path(mark: &MarkSymbolizer, x: f32, y: f32) -> Option<Path> {
    let half = mark.size / 2.0;
    if half <= 0.0 {
        return None;
    }
    match mark.shape {
        MarkShape::Circle => PathBuilder::from_circle(x, y, half),
        MarkShape::Square => Rect::from_xywh(x - half, y - half, mark.size, mark.size)
            .map(PathBuilder::from_rect),
        MarkShape::Triangle => {
            let mut pb = PathBuilder::new();
            pb.move_to(x, y - half);
            pb.line_to(x + half, y + half);
            pb.line_to(x - half, y + half);
            pb.close();
            pb.finish()
        }
        MarkShape::Cross => {
            let mut pb = PathBuilder::new();
            pb.move_to(x - half, y);
            pb.line_to(x + half, y);
            pb.move_to(x, y - half);
            pb.line_to(x, y + half);
            pb.finish()
        }
    }
}

/// Pixel anchor of a feature's label.
fn place_label<'a>(
    projector: &Projector,
    feature: &Feature,
    label: &'a LabelSymbolizer,
) -> Option<(String, f32, f32, &'a LabelSymbolizer)> {
    let text = feature.property_text(&label.property)?;
    let geometry = feature.geometry.as_ref()?;

    let anchor = match geometry {
        Geometry::Point { coordinates } => *coordinates,
        Geometry::LineString { coordinates } => *coordinates.get(coordinates.len() / 2)?,
        other => {
            let bbox = other.bbox()?;
            let (cx, cy) = bbox.center();
            Position::new(cx, cy)
        }
    };
    let (x, y) = projector.project(anchor);
    Some((text, x, y, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_expands_narrow_axis() {
        let viewport = ViewportSpec::new(
            CrsCode::Epsg3067,
            Some(256),
            Some(256),
            Some(BoundingBox::new(0.0, 0.0, 100.0, 50.0)),
        )
        .unwrap();

        let shown = viewport.display_bounds();
        assert_eq!(shown, BoundingBox::new(0.0, -25.0, 100.0, 75.0));
    }

    #[test]
    fn test_aspect_ratio_can_be_disabled() {
        let mut viewport = ViewportSpec::new(
            CrsCode::Epsg3067,
            Some(512),
            Some(256),
            Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0)),
        )
        .unwrap();
        assert_eq!(viewport.display_bounds(), BoundingBox::new(-50.0, 0.0, 150.0, 100.0));

        viewport.maintain_aspect_ratio = false;
        assert_eq!(viewport.display_bounds(), viewport.bounds);
    }

    #[test]
    fn test_projection_flips_y() {
        let viewport = ViewportSpec::new(
            CrsCode::Epsg3857,
            Some(100),
            Some(100),
            Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
        )
        .unwrap();
        let projector = viewport.projector();
        assert_eq!(projector.project(Position::new(0.0, 10.0)), (0.0, 0.0));
        assert_eq!(projector.project(Position::new(10.0, 0.0)), (100.0, 100.0));
    }

    #[test]
    fn test_odd_dash_pattern_is_repeated() {
        let symbolizer = StrokeSymbolizer {
            color: Color::Hex("#000000".to_string()),
            width: 1.0,
            opacity: 1.0,
            dash: Some(vec![4.0, 2.0, 1.0]),
            line_cap: LineCapStyle::Butt,
            line_join: LineJoinStyle::Miter,
        };
        assert!(stroke_for(&symbolizer).dash.is_some());
    }
}
