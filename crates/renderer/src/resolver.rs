//! Style resolution.
//!
//! Precedence: a custom style (client specific, built from the template),
//! then the highlight style, then the layer's named or default style.

use tracing::{debug, error, warn};

use wfs_common::layer::{LayerDescriptor, CUSTOM_STYLE_PREFIX};

use crate::style::StyleDescriptor;
use crate::template::{build_custom_style, CustomStyleContext, CustomStyleValues};

/// Which role the requested style plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleKind<'a> {
    Custom { client_id: &'a str, is_highlight: bool },
    Highlight,
    Default(&'a str),
}

impl<'a> StyleKind<'a> {
    /// Classify a style request.
    pub fn classify(
        style_name: &'a str,
        highlight_style_name: Option<&'a str>,
        client_id: Option<&'a str>,
    ) -> Self {
        match client_id {
            Some(client_id) if style_name.starts_with(CUSTOM_STYLE_PREFIX) => StyleKind::Custom {
                client_id,
                is_highlight: highlight_style_name.is_some(),
            },
            _ if highlight_style_name.is_some() => StyleKind::Highlight,
            _ => StyleKind::Default(style_name),
        }
    }
}

/// Outcome of style resolution. There is no partially built style.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleResolution {
    Resolved(StyleDescriptor),
    Unresolved,
}

impl StyleResolution {
    pub fn into_option(self) -> Option<StyleDescriptor> {
        match self {
            StyleResolution::Resolved(style) => Some(style),
            StyleResolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, StyleResolution::Resolved(_))
    }
}

/// Resolve the style for `layer`.
///
/// `custom_values` are the client's registered values and are only consulted
/// for [`StyleKind::Custom`]. Failures are logged and yield `Unresolved`.
pub fn resolve_style(
    layer: &LayerDescriptor,
    kind: &StyleKind<'_>,
    custom_values: Option<&CustomStyleValues>,
) -> StyleResolution {
    let result = match kind {
        StyleKind::Custom {
            client_id,
            is_highlight,
        } => {
            let ctx = CustomStyleContext {
                client_id: client_id.to_string(),
                layer_id: layer.id.to_string(),
                geometry_property: layer.geometry_property.clone(),
                is_highlight: *is_highlight,
            };
            return resolve_custom(&ctx, custom_values);
        }
        StyleKind::Highlight => match &layer.selection_style {
            Some(document) => StyleDescriptor::from_value(document),
            None => StyleDescriptor::builtin_highlight(),
        },
        StyleKind::Default(name) => match layer.style(name).or_else(|| layer.default_style()) {
            Some(document) => StyleDescriptor::from_value(document),
            None => StyleDescriptor::builtin_default(),
        },
    };

    match result {
        Ok(style) => {
            debug!(layer = %layer.id, style = %style.name, "Style resolved");
            StyleResolution::Resolved(style)
        }
        Err(e) => {
            warn!(layer = %layer.id, kind = ?kind, error = %e, "Style could not be built");
            StyleResolution::Unresolved
        }
    }
}

fn resolve_custom(
    ctx: &CustomStyleContext,
    values: Option<&CustomStyleValues>,
) -> StyleResolution {
    let Some(values) = values else {
        error!(
            client = %ctx.client_id,
            layer = %ctx.layer_id,
            "No custom style registered for client"
        );
        return StyleResolution::Unresolved;
    };

    match build_custom_style(ctx, values) {
        Ok(style) => StyleResolution::Resolved(style),
        Err(e) => {
            error!(
                client = %ctx.client_id,
                layer = %ctx.layer_id,
                geometry = %ctx.geometry_property,
                error = %e,
                "Custom style could not be built"
            );
            StyleResolution::Unresolved
        }
    }
}
