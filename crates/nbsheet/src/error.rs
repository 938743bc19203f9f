//! CLI error types.

use nbsheet_config::ConfigError;
use nbsheet_export::{ExportError, XlsxSinkError};
use nbsheet_renderer::RenderError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Xlsx(#[from] XlsxSinkError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
