//! Error types for notebook export.

use nbsheet_renderer::RenderError;

use crate::image::ImageError;

/// Error from notebook export.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExportError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Notebook JSON could not be parsed.
    #[error("invalid notebook: {0}")]
    Json(#[from] serde_json::Error),

    /// A Markdown cell failed to render and fallback is disabled.
    #[error("markdown in cell {cell} could not be rendered: {source}")]
    Render {
        /// 1-based cell number.
        cell: usize,
        #[source]
        source: RenderError,
    },

    /// An embedded image could not be decoded.
    #[error("image in cell {cell} could not be decoded: {source}")]
    Image {
        /// 1-based cell number.
        cell: usize,
        #[source]
        source: ImageError,
    },

    /// The grid sink rejected a write.
    #[error("grid sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ExportError {
    pub(crate) fn sink<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Sink(Box::new(err))
    }
}
