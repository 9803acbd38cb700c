//! Custom style templating.
//!
//! A client registers [`CustomStyleValues`] for a layer. At render time the
//! values are substituted into the built-in template together with the
//! layer's geometry property, producing a concrete style document.

use serde::{Deserialize, Serialize};

use crate::style::{parse_hex_color, LineCapStyle, LineJoinStyle, MarkShape, StyleDescriptor, StyleError};

const CUSTOM_TEMPLATE: &str = include_str!("../styles/custom_template.json");

/// Fill and line colour of highlighted features.
pub const HIGHLIGHT_FILL_COLOR: &str = "#f8ff3a";
pub const HIGHLIGHT_STROKE_COLOR: &str = "#e3ea00";

/// Request-scoped parameters of a custom style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomStyleContext {
    pub client_id: String,
    pub layer_id: String,
    pub geometry_property: String,
    pub is_highlight: bool,
}

/// Symbology values a client registers for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomStyleValues {
    pub fill_color: String,

    pub border_color: String,
    pub border_width: f32,
    #[serde(default)]
    pub border_dash: Option<Vec<f32>>,
    #[serde(default)]
    pub border_line_join: LineJoinStyle,

    pub stroke_color: String,
    pub stroke_width: f32,
    #[serde(default)]
    pub stroke_dash: Option<Vec<f32>>,
    #[serde(default)]
    pub stroke_line_cap: LineCapStyle,
    #[serde(default)]
    pub stroke_line_join: LineJoinStyle,

    pub dot_color: String,
    pub dot_size: f32,
    #[serde(default)]
    pub dot_shape: MarkShape,
}

impl Default for CustomStyleValues {
    fn default() -> Self {
        Self {
            fill_color: "#ffde00".to_string(),
            border_color: "#000000".to_string(),
            border_width: 1.0,
            border_dash: None,
            border_line_join: LineJoinStyle::Miter,
            stroke_color: "#3233ff".to_string(),
            stroke_width: 1.0,
            stroke_dash: None,
            stroke_line_cap: LineCapStyle::Butt,
            stroke_line_join: LineJoinStyle::Miter,
            dot_color: "#000000".to_string(),
            dot_size: 3.0,
            dot_shape: MarkShape::Circle,
        }
    }
}

impl CustomStyleValues {
    /// Check every value before it is written into a style document.
    pub fn validate(&self) -> Result<(), TemplateError> {
        for (field, color) in [
            ("fill_color", &self.fill_color),
            ("border_color", &self.border_color),
            ("stroke_color", &self.stroke_color),
            ("dot_color", &self.dot_color),
        ] {
            if color.len() != 7 || parse_hex_color(color).is_none() {
                return Err(TemplateError::InvalidValue {
                    field,
                    reason: format!("expected #RRGGBB, got '{}'", color),
                });
            }
        }

        for (field, size) in [
            ("border_width", self.border_width),
            ("stroke_width", self.stroke_width),
            ("dot_size", self.dot_size),
        ] {
            if !size.is_finite() || size < 0.0 {
                return Err(TemplateError::InvalidValue {
                    field,
                    reason: format!("must be finite and non-negative, got {}", size),
                });
            }
        }

        for (field, dash) in [("border_dash", &self.border_dash), ("stroke_dash", &self.stroke_dash)] {
            if let Some(dash) = dash {
                if dash.is_empty() || dash.iter().any(|d| !d.is_finite() || *d <= 0.0) {
                    return Err(TemplateError::InvalidValue {
                        field,
                        reason: "dash entries must be positive".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Errors raised while materializing a custom style.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Invalid geometry property name: '{0}'")]
    InvalidGeometryProperty(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Placeholder left unreplaced: {0}")]
    UnreplacedPlaceholder(String),

    #[error("Failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Style(#[from] StyleError),
}

fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
}

fn snake_case<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    // Unit enum variants serialize as plain strings
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

/// Replace every `${name}` placeholder in `template`.
fn substitute(template: &str, replacements: &[(&str, String)]) -> Result<String, TemplateError> {
    let mut out = template.to_string();
    for (name, value) in replacements {
        out = out.replace(&format!("${{{}}}", name), value);
    }

    if let Some(start) = out.find("${") {
        let rest = &out[start..];
        let end = rest.find('}').map(|i| i + 1).unwrap_or(rest.len());
        return Err(TemplateError::UnreplacedPlaceholder(rest[..end].to_string()));
    }
    Ok(out)
}

/// Build the style document text for `ctx` from the built-in template.
pub fn render_custom_style(
    ctx: &CustomStyleContext,
    values: &CustomStyleValues,
) -> Result<String, TemplateError> {
    render_template(CUSTOM_TEMPLATE, ctx, values)
}

fn render_template(
    template: &str,
    ctx: &CustomStyleContext,
    values: &CustomStyleValues,
) -> Result<String, TemplateError> {
    if !is_valid_property_name(&ctx.geometry_property) {
        return Err(TemplateError::InvalidGeometryProperty(
            ctx.geometry_property.clone(),
        ));
    }
    values.validate()?;

    let (fill, border, stroke, dot) = if ctx.is_highlight {
        (
            HIGHLIGHT_FILL_COLOR,
            HIGHLIGHT_STROKE_COLOR,
            HIGHLIGHT_FILL_COLOR,
            HIGHLIGHT_FILL_COLOR,
        )
    } else {
        (
            values.fill_color.as_str(),
            values.border_color.as_str(),
            values.stroke_color.as_str(),
            values.dot_color.as_str(),
        )
    };

    let replacements = [
        ("geometry", ctx.geometry_property.clone()),
        ("fill_color", fill.to_string()),
        ("border_color", border.to_string()),
        ("border_width", serde_json::to_string(&values.border_width)?),
        ("border_dash", serde_json::to_string(&values.border_dash)?),
        ("border_line_join", snake_case(&values.border_line_join)?),
        ("stroke_color", stroke.to_string()),
        ("stroke_width", serde_json::to_string(&values.stroke_width)?),
        ("stroke_dash", serde_json::to_string(&values.stroke_dash)?),
        ("stroke_line_cap", snake_case(&values.stroke_line_cap)?),
        ("stroke_line_join", snake_case(&values.stroke_line_join)?),
        ("dot_color", dot.to_string()),
        ("dot_size", serde_json::to_string(&values.dot_size)?),
        ("dot_shape", snake_case(&values.dot_shape)?),
    ];

    substitute(template, &replacements)
}

/// Materialize the custom style for `ctx`.
pub fn build_custom_style(
    ctx: &CustomStyleContext,
    values: &CustomStyleValues,
) -> Result<StyleDescriptor, TemplateError> {
    let document = render_custom_style(ctx, values)?;
    Ok(StyleDescriptor::from_json(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    fn ctx(is_highlight: bool) -> CustomStyleContext {
        CustomStyleContext {
            client_id: "client-1".to_string(),
            layer_id: "42".to_string(),
            geometry_property: "the_geom".to_string(),
            is_highlight,
        }
    }

    #[test]
    fn test_build_custom_style() {
        let values = CustomStyleValues {
            fill_color: "#112233".to_string(),
            border_dash: Some(vec![4.0, 2.0]),
            stroke_line_cap: LineCapStyle::Round,
            dot_shape: MarkShape::Square,
            ..Default::default()
        };

        let style = build_custom_style(&ctx(false), &values).unwrap();
        assert_eq!(style.name, "oskari_custom");
        assert_eq!(style.rules.len(), 3);
        assert!(style
            .rules
            .iter()
            .all(|r| r.geometry_property.as_deref() == Some("the_geom")));

        let area = &style.rules[0];
        assert_eq!(area.fill.as_ref().unwrap().color, Color::Hex("#112233".to_string()));
        assert_eq!(area.stroke.as_ref().unwrap().dash, Some(vec![4.0, 2.0]));

        let line = style.rules[1].stroke.as_ref().unwrap();
        assert_eq!(line.line_cap, LineCapStyle::Round);
        assert_eq!(line.dash, None);

        assert_eq!(style.rules[2].mark.as_ref().unwrap().shape, MarkShape::Square);
    }

    #[test]
    fn test_highlight_replaces_colors() {
        let style = build_custom_style(&ctx(true), &CustomStyleValues::default()).unwrap();
        let fill = &style.rules[0].fill.as_ref().unwrap().color;
        assert_eq!(fill, &Color::Hex(HIGHLIGHT_FILL_COLOR.to_string()));
    }

    #[test]
    fn test_rejects_bad_geometry_property() {
        let mut bad = ctx(false);
        bad.geometry_property = "geom\", \"x".to_string();
        assert!(matches!(
            build_custom_style(&bad, &CustomStyleValues::default()),
            Err(TemplateError::InvalidGeometryProperty(_))
        ));

        bad.geometry_property = String::new();
        assert!(build_custom_style(&bad, &CustomStyleValues::default()).is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        let values = CustomStyleValues {
            fill_color: "red".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_custom_style(&ctx(false), &values),
            Err(TemplateError::InvalidValue { field: "fill_color", .. })
        ));

        let values = CustomStyleValues {
            stroke_width: f32::NAN,
            ..Default::default()
        };
        assert!(build_custom_style(&ctx(false), &values).is_err());
    }

    #[test]
    fn test_unreplaced_placeholder() {
        let template = r#"{"name": "${unknown}", "rules": []}"#;
        let result = render_template(template, &ctx(false), &CustomStyleValues::default());
        match result {
            Err(TemplateError::UnreplacedPlaceholder(name)) => assert_eq!(name, "${unknown}"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_template_fails_to_parse() {
        let template = r#"{"name": "broken", "rules": [${geometry}]}"#;
        let document = render_template(template, &ctx(false), &CustomStyleValues::default()).unwrap();
        assert!(StyleDescriptor::from_json(&document).is_err());
    }
}
