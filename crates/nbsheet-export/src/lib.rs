//! Notebook to spreadsheet export.
//!
//! Reads notebook JSON, walks its cells in order and writes them into a
//! [`GridSink`](nbsheet_renderer::GridSink), one block of rows per cell.
//! Markdown cells go through [`nbsheet_renderer`]; code cell outputs are
//! written as plain text, flattened HTML, numbers or images.
//!
//! # Quick Start
//!
//! ```
//! use nbsheet_export::{ExportOptions, Notebook, NotebookExporter};
//! use nbsheet_renderer::RecordingSink;
//!
//! let notebook = Notebook::from_json(
//!     r#"{"metadata": {}, "cells": [{"cell_type": "markdown", "source": "**Hi**"}]}"#,
//! )?;
//! let mut sink = RecordingSink::new();
//! let summary = NotebookExporter::new(ExportOptions::default()).export(&notebook, &mut sink)?;
//!
//! assert_eq!(summary.cells, 1);
//! assert_eq!(sink.cell_text(0, 1).as_deref(), Some("Hi"));
//! # Ok::<(), nbsheet_export::ExportError>(())
//! ```

mod error;
mod exporter;
mod html;
mod image;
mod notebook;
mod xlsx;

pub use error::ExportError;
pub use exporter::{ExportOptions, ExportSummary, NotebookExporter};
pub use html::{HtmlError, HtmlRow, flatten_html};
pub use image::{ImageError, PngImage};
pub use notebook::{Cell, LanguageInfo, MimeBundle, Notebook, NotebookMetadata, Output, mime_text};
pub use xlsx::{XlsxSink, XlsxSinkError};
