//! Vector style model.
//!
//! A style is a named list of rules. Each rule may be restricted to a
//! geometry kind and to a geometry property, and carries the symbolizers
//! used to draw matching features.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wfs_common::feature::{Feature, GeometryKind};

const DEFAULT_STYLE_JSON: &str = include_str!("../styles/default.json");
const HIGHLIGHT_STYLE_JSON: &str = include_str!("../styles/highlight.json");

/// A complete, immutable rendering style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDescriptor {
    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    pub rules: Vec<StyleRule>,
}

impl StyleDescriptor {
    /// Parse and validate a style document.
    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        let style: StyleDescriptor =
            serde_json::from_str(json).map_err(|e| StyleError::ParseError(e.to_string()))?;
        style.validate()?;
        Ok(style)
    }

    /// Parse and validate a style document held in layer configuration.
    pub fn from_value(value: &Value) -> Result<Self, StyleError> {
        let style = StyleDescriptor::deserialize(value)
            .map_err(|e| StyleError::ParseError(e.to_string()))?;
        style.validate()?;
        Ok(style)
    }

    /// Built-in style used when a layer defines none.
    pub fn builtin_default() -> Result<Self, StyleError> {
        Self::from_json(DEFAULT_STYLE_JSON)
    }

    /// Built-in style for selected features.
    pub fn builtin_highlight() -> Result<Self, StyleError> {
        Self::from_json(HIGHLIGHT_STYLE_JSON)
    }

    pub fn validate(&self) -> Result<(), StyleError> {
        if self.rules.is_empty() {
            return Err(StyleError::ValidationError(format!(
                "style '{}' has no rules",
                self.name
            )));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()
                .map_err(|e| StyleError::ValidationError(format!("{} rule {}: {}", self.name, i, e)))?;
        }
        Ok(())
    }

    /// Rules that apply to `feature`, in declaration order.
    pub fn rules_for<'a>(&'a self, feature: &'a Feature) -> impl Iterator<Item = &'a StyleRule> + 'a {
        self.rules.iter().filter(move |rule| rule.applies_to(feature))
    }
}

/// One rule of a style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    #[serde(default)]
    pub name: Option<String>,

    /// Restrict the rule to one geometry class
    #[serde(default)]
    pub geometry_kind: Option<GeometryKind>,

    /// Restrict the rule to features whose geometry comes from this property
    #[serde(default)]
    pub geometry_property: Option<String>,

    #[serde(default)]
    pub fill: Option<FillSymbolizer>,

    #[serde(default)]
    pub stroke: Option<StrokeSymbolizer>,

    #[serde(default)]
    pub mark: Option<MarkSymbolizer>,

    #[serde(default)]
    pub label: Option<LabelSymbolizer>,
}

impl StyleRule {
    pub fn applies_to(&self, feature: &Feature) -> bool {
        let Some(geometry) = &feature.geometry else {
            return false;
        };
        if let Some(kind) = self.geometry_kind {
            if kind != geometry.kind() {
                return false;
            }
        }
        match &self.geometry_property {
            Some(property) => property == &feature.geometry_name,
            None => true,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(fill) = &self.fill {
            fill.color.validate()?;
            check_opacity(fill.opacity)?;
        }
        if let Some(stroke) = &self.stroke {
            stroke.color.validate()?;
            check_opacity(stroke.opacity)?;
            check_size("stroke width", stroke.width)?;
            if let Some(dash) = &stroke.dash {
                if dash.iter().any(|d| !d.is_finite() || *d < 0.0) {
                    return Err("dash entries must be finite and non-negative".to_string());
                }
            }
        }
        if let Some(mark) = &self.mark {
            check_size("mark size", mark.size)?;
            check_size("mark stroke width", mark.stroke_width)?;
            if let Some(fill) = &mark.fill {
                fill.validate()?;
            }
            if let Some(stroke) = &mark.stroke {
                stroke.validate()?;
            }
        }
        if let Some(label) = &self.label {
            check_size("label size", label.size)?;
            label.color.validate()?;
            if let Some(halo) = &label.halo_color {
                halo.validate()?;
            }
        }
        Ok(())
    }
}

fn check_size(what: &str, value: f32) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be finite and non-negative, got {}", what, value))
    }
}

fn check_opacity(value: f32) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("opacity must be within 0..1, got {}", value))
    }
}

fn default_opacity() -> f32 {
    1.0
}

fn default_stroke_width() -> f32 {
    1.0
}

fn default_mark_size() -> f32 {
    6.0
}

fn default_label_size() -> f32 {
    12.0
}

/// Polygon interior fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillSymbolizer {
    pub color: Color,

    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

/// Outline of polygons and body of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSymbolizer {
    pub color: Color,

    #[serde(default = "default_stroke_width")]
    pub width: f32,

    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Dash pattern in pixels, alternating on/off
    #[serde(default)]
    pub dash: Option<Vec<f32>>,

    #[serde(default)]
    pub line_cap: LineCapStyle,

    #[serde(default)]
    pub line_join: LineJoinStyle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCapStyle {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineJoinStyle {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Symbol drawn at each point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkSymbolizer {
    #[serde(default)]
    pub shape: MarkShape,

    /// Symbol size in pixels
    #[serde(default = "default_mark_size")]
    pub size: f32,

    #[serde(default)]
    pub fill: Option<Color>,

    #[serde(default)]
    pub stroke: Option<Color>,

    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkShape {
    #[default]
    Circle,
    Square,
    Triangle,
    Cross,
}

/// Text drawn from a feature property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSymbolizer {
    /// Property whose value is drawn
    pub property: String,

    #[serde(default = "default_label_size")]
    pub size: f32,

    pub color: Color,

    #[serde(default)]
    pub halo_color: Option<Color>,
}

/// Color representation supporting multiple formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    /// Hex string: "#RRGGBB" or "#RRGGBBAA"
    Hex(String),

    /// RGB array: [r, g, b] or [r, g, b, a]
    Array(Vec<u8>),

    /// Explicit RGBA
    Rgba { r: u8, g: u8, b: u8, a: u8 },
}

impl Color {
    /// Convert to an RGBA tuple, `None` when the color is malformed.
    pub fn try_rgba(&self) -> Option<(u8, u8, u8, u8)> {
        match self {
            Color::Hex(s) => parse_hex_color(s).or_else(|| named_color(s)),
            Color::Array(arr) if arr.len() == 3 || arr.len() == 4 => {
                Some((arr[0], arr[1], arr[2], arr.get(3).copied().unwrap_or(255)))
            }
            Color::Array(_) => None,
            Color::Rgba { r, g, b, a } => Some((*r, *g, *b, *a)),
        }
    }

    /// Convert to an RGBA tuple; malformed colors render black.
    pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
        self.try_rgba().unwrap_or((0, 0, 0, 255))
    }

    fn validate(&self) -> Result<(), String> {
        match self.try_rgba() {
            Some(_) => Ok(()),
            None => Err(format!("invalid color {:?}", self)),
        }
    }
}

/// Parse "#RRGGBB" or "#RRGGBBAA".
pub fn parse_hex_color(s: &str) -> Option<(u8, u8, u8, u8)> {
    let hex = s.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        6 => Some((channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some((channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

fn named_color(name: &str) -> Option<(u8, u8, u8, u8)> {
    let rgba = match name.to_lowercase().as_str() {
        "transparent" => (0, 0, 0, 0),
        "black" => (0, 0, 0, 255),
        "white" => (255, 255, 255, 255),
        "red" => (255, 0, 0, 255),
        "green" => (0, 255, 0, 255),
        "blue" => (0, 0, 255, 255),
        "yellow" => (255, 255, 0, 255),
        "cyan" => (0, 255, 255, 255),
        "magenta" => (255, 0, 255, 255),
        "orange" => (255, 165, 0, 255),
        "purple" => (128, 0, 128, 255),
        "gray" | "grey" => (128, 128, 128, 255),
        _ => return None,
    };
    Some(rgba)
}

/// Errors that can occur when building a style.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("Failed to parse style: {0}")]
    ParseError(String),

    #[error("Style validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfs_common::feature::{Geometry, Position};

    #[test]
    fn test_builtin_styles_parse() {
        let default = StyleDescriptor::builtin_default().unwrap();
        assert_eq!(default.name, "default");
        assert!(!default.rules.is_empty());

        let highlight = StyleDescriptor::builtin_highlight().unwrap();
        assert_eq!(highlight.name, "highlight");
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff8000"), Some((255, 128, 0, 255)));
        assert_eq!(parse_hex_color("#ff800080"), Some((255, 128, 0, 128)));
        assert_eq!(parse_hex_color("ff8000"), None);
        assert_eq!(parse_hex_color("#ff80"), None);
        assert_eq!(parse_hex_color("#gg8000"), None);
    }

    #[test]
    fn test_color_formats() {
        assert_eq!(Color::Hex("red".to_string()).try_rgba(), Some((255, 0, 0, 255)));
        assert_eq!(Color::Array(vec![1, 2, 3]).try_rgba(), Some((1, 2, 3, 255)));
        assert_eq!(Color::Array(vec![1, 2]).try_rgba(), None);
        assert_eq!(Color::Hex("nope".to_string()).to_rgba(), (0, 0, 0, 255));
    }

    #[test]
    fn test_invalid_color_fails_validation() {
        let json = r##"{"name": "bad", "rules": [{"fill": {"color": "#12"}}]}"##;
        assert!(matches!(
            StyleDescriptor::from_json(json),
            Err(StyleError::ValidationError(_))
        ));
    }

    #[test]
    fn test_empty_rules_fail_validation() {
        let json = r#"{"name": "empty", "rules": []}"#;
        assert!(StyleDescriptor::from_json(json).is_err());
    }

    #[test]
    fn test_rule_matching() {
        let json = r##"{
            "name": "roads",
            "rules": [
                {"geometry_kind": "line", "stroke": {"color": "#333333", "width": 2}},
                {"geometry_kind": "polygon", "fill": {"color": "#00ff00"}},
                {"geometry_property": "the_geom", "stroke": {"color": "#ff0000"}}
            ]
        }"##;
        let style = StyleDescriptor::from_json(json).unwrap();

        let line = Feature::new(Geometry::LineString {
            coordinates: vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)],
        });
        assert_eq!(style.rules_for(&line).count(), 1);

        let named = line.clone().with_geometry_name("the_geom");
        assert_eq!(style.rules_for(&named).count(), 2);

        let mut empty = line;
        empty.geometry = None;
        assert_eq!(style.rules_for(&empty).count(), 0);
    }
}
