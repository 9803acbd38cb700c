//! Error types for the feature tile services.

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// Boxed cause carried by errors whose detail is kept for diagnostics only.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Primary error type for tile and feature operations.
#[derive(Debug, Error)]
pub enum MapError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    OutOfExtent(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    // === Rendering Errors ===
    /// No style could be built or found; the tile cannot be rendered.
    #[error("Cannot render: no style for '{0}'")]
    StyleUnresolved(String),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Failed to encode image")]
    EncodingFailure,

    #[error("Projection error: {0}")]
    ProjectionError(String),

    // === Retrieval Errors ===
    /// The message is generic; the cause is only reachable through `source()`.
    #[error("Failed to retrieve features")]
    RetrievalFailure(#[source] BoxedCause),

    // === Infrastructure Errors ===
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl MapError {
    pub fn invalid_bbox() -> Self {
        MapError::InvalidInput("Invalid bbox".to_string())
    }

    pub fn bbox_out_of_extent() -> Self {
        MapError::OutOfExtent("bbox not within CRS extent".to_string())
    }

    pub fn retrieval(cause: impl Into<BoxedCause>) -> Self {
        MapError::RetrievalFailure(cause.into())
    }

    /// Short machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            MapError::MissingParameter(_) => "MissingParameterValue",
            MapError::InvalidInput(_) => "InvalidParameterValue",
            MapError::OutOfExtent(_) => "OutOfExtent",
            MapError::LayerNotFound(_) => "LayerNotDefined",
            MapError::InvalidCrs(_) => "InvalidCRS",
            MapError::StyleUnresolved(_) => "StyleUnresolved",
            MapError::RetrievalFailure(_) => "RetrievalFailure",
            MapError::EncodingFailure => "EncodingFailure",
            _ => "NoApplicableCode",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            MapError::MissingParameter(_)
            | MapError::InvalidInput(_)
            | MapError::OutOfExtent(_)
            | MapError::InvalidCrs(_) => 400,

            MapError::LayerNotFound(_) | MapError::StyleUnresolved(_) => 404,

            MapError::RetrievalFailure(_) => 502,

            _ => 500,
        }
    }

    /// Request-level client errors are reported without any internal detail.
    pub fn is_client_error(&self) -> bool {
        self.http_status_code() < 500
    }
}

impl From<crate::bbox::BboxParseError> for MapError {
    fn from(_: crate::bbox::BboxParseError) -> Self {
        MapError::invalid_bbox()
    }
}

impl From<crate::crs::CrsParseError> for MapError {
    fn from(err: crate::crs::CrsParseError) -> Self {
        match err {
            crate::crs::CrsParseError::UnsupportedCrs(code) => MapError::InvalidCrs(code),
            other => MapError::ProjectionError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::InternalError(format!("JSON error: {}", err))
    }
}
