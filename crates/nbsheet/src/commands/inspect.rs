//! `nbsheet inspect` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use console::Term;
use nbsheet_config::Config;
use nbsheet_export::{ExportOptions, Notebook, NotebookExporter};
use nbsheet_renderer::{
    MarkdownRenderer, RecordingSink, SinkOp, StyleRegistry, WriteError, write_markdown,
};

use crate::error::CliError;

/// Arguments for the inspect command.
#[derive(Args)]
pub(crate) struct InspectArgs {
    /// Notebook or Markdown file.
    file: PathBuf,

    /// Treat the file as Markdown (default: by .md extension).
    #[arg(long)]
    markdown: bool,

    /// Path to configuration file (default: auto-discover nbsheet.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl InspectArgs {
    /// Execute the inspect command.
    ///
    /// Prints the recorded grid operations to stdout as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or rendered.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), None)?;

        let ops = if self.markdown || is_markdown_path(&self.file) {
            let markdown = std::fs::read_to_string(&self.file)?;
            inspect_markdown(&markdown, &config)?
        } else {
            let notebook = Notebook::from_path(&self.file)?;
            inspect_notebook(&notebook, &config)?
        };

        let json = serde_json::to_string_pretty(&ops)?;
        Term::stdout().write_line(&json)?;
        Ok(())
    }
}

fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

/// Record the operations for a single Markdown source.
fn inspect_markdown(markdown: &str, config: &Config) -> Result<Vec<SinkOp>, CliError> {
    let options = ExportOptions::from_config(config);
    let renderer = MarkdownRenderer::new()
        .with_gfm(options.gfm)
        .with_html_escaping(options.escape_html)
        .with_max_depth(options.max_nesting_depth);

    let mut sink = RecordingSink::new();
    let mut registry = StyleRegistry::new();
    match write_markdown(
        markdown,
        &renderer,
        &mut registry,
        &mut sink,
        0,
        options.content_column,
    ) {
        Ok(_) => Ok(sink.into_ops()),
        Err(WriteError::Render(err)) => Err(err.into()),
        Err(WriteError::Sink(never)) => match never {},
    }
}

fn inspect_notebook(notebook: &Notebook, config: &Config) -> Result<Vec<SinkOp>, CliError> {
    let exporter = NotebookExporter::new(ExportOptions::from_config(config));
    let mut sink = RecordingSink::new();
    exporter.export(notebook, &mut sink)?;
    Ok(sink.into_ops())
}
