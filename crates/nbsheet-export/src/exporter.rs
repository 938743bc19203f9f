//! Notebook export driver.

use nbsheet_config::Config;
use nbsheet_renderer::{GridSink, MarkdownRenderer, StyleRegistry, WriteError, write_markdown};
use serde_json::Value;

use crate::error::ExportError;
use crate::html::{HtmlRow, flatten_html};
use crate::image::PngImage;
use crate::notebook::{Cell, MimeBundle, Notebook, Output, mime_text};

/// Layout and rendering options for an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub gfm: bool,
    pub escape_html: bool,
    /// Write Markdown source as plain text when it fails to render.
    pub fallback_to_plain_text: bool,
    pub max_nesting_depth: usize,
    /// Write the 1-based cell number in column 0.
    pub cell_numbers: bool,
    /// Column where cell content starts.
    pub content_column: usize,
}

impl ExportOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            gfm: config.markdown.gfm,
            escape_html: config.markdown.escape_html,
            fallback_to_plain_text: config.markdown.fallback_to_plain_text,
            max_nesting_depth: usize::from(config.markdown.max_nesting_depth),
            cell_numbers: config.layout.cell_numbers,
            content_column: usize::from(config.layout.content_column),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counters reported after an export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Notebook cells processed.
    pub cells: usize,
    /// Worksheet rows used.
    pub rows: usize,
    /// Markdown cells written as plain text after a render failure.
    pub markdown_fallbacks: usize,
    /// Cell write groups written in degraded form.
    pub degraded_groups: usize,
    /// Images inserted.
    pub images: usize,
}

/// Writes notebooks into a [`GridSink`].
///
/// Every call to [`export`](Self::export) builds one document with its own
/// style registry.
#[derive(Debug)]
pub struct NotebookExporter {
    options: ExportOptions,
    renderer: MarkdownRenderer,
}

impl NotebookExporter {
    #[must_use]
    pub fn new(options: ExportOptions) -> Self {
        let renderer = MarkdownRenderer::new()
            .with_gfm(options.gfm)
            .with_html_escaping(options.escape_html)
            .with_max_depth(options.max_nesting_depth);
        Self { options, renderer }
    }

    #[must_use]
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export every cell of `notebook`, starting at row 0.
    ///
    /// Output already written when an error occurs stays in the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Render`] for Markdown that fails to render while
    /// fallback is disabled, [`ExportError::Image`] for undecodable images and
    /// [`ExportError::Sink`] when the sink rejects a write.
    pub fn export<S>(&self, notebook: &Notebook, sink: &mut S) -> Result<ExportSummary, ExportError>
    where
        S: GridSink,
    {
        let mut document = Document {
            options: &self.options,
            renderer: &self.renderer,
            sink,
            registry: StyleRegistry::new(),
            row: 0,
            summary: ExportSummary::default(),
        };

        for (index, cell) in notebook.cells.iter().enumerate() {
            document.write_cell(index + 1, cell)?;
        }

        let mut summary = document.summary;
        summary.rows = document.row;
        tracing::info!(
            cells = summary.cells,
            rows = summary.rows,
            formats = document.registry.formats_created(),
            fallbacks = summary.markdown_fallbacks,
            degraded = summary.degraded_groups,
            "Exported notebook"
        );
        Ok(summary)
    }
}

/// State of one document build.
struct Document<'a, S: GridSink> {
    options: &'a ExportOptions,
    renderer: &'a MarkdownRenderer,
    sink: &'a mut S,
    registry: StyleRegistry<S::Format>,
    row: usize,
    summary: ExportSummary,
}

impl<S: GridSink> Document<'_, S> {
    fn write_cell(&mut self, number: usize, cell: &Cell) -> Result<(), ExportError> {
        tracing::debug!(cell = number, row = self.row, "Writing cell");
        if self.options.cell_numbers {
            self.sink
                .write_text(self.row, 0, &number.to_string(), None)
                .map_err(ExportError::sink)?;
        }

        match cell {
            Cell::Markdown { source } => self.write_markdown(number, source)?,
            Cell::Code { outputs, .. } => {
                for output in outputs {
                    self.write_output(number, output)?;
                }
            }
            Cell::Raw { .. } => {}
        }

        self.row += 1;
        self.summary.cells += 1;
        Ok(())
    }

    fn write_markdown(&mut self, number: usize, source: &str) -> Result<(), ExportError> {
        let result = write_markdown(
            source,
            self.renderer,
            &mut self.registry,
            &mut *self.sink,
            self.row,
            self.options.content_column,
        );
        match result {
            Ok(written) => {
                self.row += written.rows;
                self.summary.degraded_groups += written.degraded;
                Ok(())
            }
            Err(WriteError::Render(err)) if self.options.fallback_to_plain_text => {
                tracing::warn!(cell = number, error = %err, "Markdown failed to render, writing it as plain text");
                self.summary.markdown_fallbacks += 1;
                self.write_plain_text(source)
            }
            Err(WriteError::Render(err)) => Err(ExportError::Render {
                cell: number,
                source: err,
            }),
            Err(WriteError::Sink(err)) => Err(ExportError::sink(err)),
        }
    }

    fn write_output(&mut self, number: usize, output: &Output) -> Result<(), ExportError> {
        match output {
            Output::Stream { text, .. } => self.write_plain_text(text),
            Output::DisplayData { data, metadata }
            | Output::ExecuteResult { data, metadata, .. } => {
                self.write_mime_bundle(number, data, metadata)
            }
            Output::Error { ename, evalue, .. } => {
                self.write_plain_text(&format!("{ename}: {evalue}"))
            }
        }
    }

    fn write_mime_bundle(
        &mut self,
        number: usize,
        data: &MimeBundle,
        metadata: &MimeBundle,
    ) -> Result<(), ExportError> {
        if let Some(html) = data.get("text/html") {
            self.write_html(&mime_text(html))
        } else if let Some(png) = data.get("image/png") {
            self.write_png(number, &mime_text(png), metadata.get("image/png"))
        } else if let Some(json) = data.get("application/json") {
            self.write_plain_text(&mime_text(json))
        } else if let Some(text) = data.get("text/plain") {
            self.write_plain_text(&mime_text(text))
        } else {
            tracing::debug!(cell = number, "Skipping output without a supported MIME type");
            Ok(())
        }
    }

    /// One row per line at the content column.
    fn write_plain_text(&mut self, text: &str) -> Result<(), ExportError> {
        let col = self.options.content_column;
        for line in text.split('\n') {
            if !line.is_empty() {
                self.sink
                    .write_text(self.row, col, line, None)
                    .map_err(ExportError::sink)?;
            }
            self.row += 1;
        }
        Ok(())
    }

    fn write_html(&mut self, html: &str) -> Result<(), ExportError> {
        let rows = match flatten_html(html) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to parse HTML output, writing it as plain text");
                return self.write_plain_text(html);
            }
        };

        let base = self.options.content_column;
        for html_row in rows {
            match html_row {
                HtmlRow::Text(text) => {
                    self.sink
                        .write_text(self.row, base, &text, None)
                        .map_err(ExportError::sink)?;
                }
                HtmlRow::Cells(cells) => {
                    for (offset, text) in cells.iter().enumerate() {
                        self.write_table_cell(base + offset, text)?;
                    }
                }
            }
            self.row += 1;
        }
        Ok(())
    }

    /// Numeric cell text becomes a number.
    fn write_table_cell(&mut self, col: usize, text: &str) -> Result<(), ExportError> {
        let result = match text.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => self.sink.write_number(self.row, col, number, None),
            _ if text.is_empty() => return Ok(()),
            _ => self.sink.write_text(self.row, col, text, None),
        };
        result.map_err(ExportError::sink)
    }

    fn write_png(
        &mut self,
        number: usize,
        payload: &str,
        metadata: Option<&Value>,
    ) -> Result<(), ExportError> {
        let image = PngImage::from_base64(payload)
            .map_err(|source| ExportError::Image { cell: number, source })?;
        let (x_scale, y_scale) = image.scale(metadata);

        self.row += 1;
        self.sink
            .insert_image(
                self.row,
                self.options.content_column,
                &image.bytes,
                x_scale,
                y_scale,
            )
            .map_err(ExportError::sink)?;
        self.sink
            .set_row_height(self.row, f64::from(image.height) * y_scale)
            .map_err(ExportError::sink)?;
        self.row += 1;
        self.summary.images += 1;
        Ok(())
    }
}
