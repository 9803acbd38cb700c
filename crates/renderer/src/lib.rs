//! Tile rendering for vector feature layers.
//!
//! - Style documents and their resolution (named, highlight, client custom)
//! - The custom style template
//! - Anti-aliased rasterization of feature collections
//! - PNG encoding and decoding

pub mod labels;
pub mod png;
pub mod raster;
pub mod resolver;
pub mod style;
pub mod template;

pub use labels::LabelFont;
pub use raster::{DrawRequest, RasterImage, Rasterizer, RenderError, ViewportSpec};
pub use resolver::{resolve_style, StyleKind, StyleResolution};
pub use style::{StyleDescriptor, StyleError};
pub use template::{build_custom_style, CustomStyleContext, CustomStyleValues, TemplateError};
