//! `nbsheet convert` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use nbsheet_config::{CliSettings, Config};
use nbsheet_export::{ExportOptions, Notebook, NotebookExporter, XlsxSink};

use crate::error::CliError;
use crate::output::{Output, Tone};

/// Arguments for the convert command.
#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// Path to the notebook file.
    notebook: PathBuf,

    /// Output workbook path (default: notebook path with an .xlsx extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover nbsheet.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worksheet name (overrides config).
    #[arg(long, env = "NBSHEET_SHEET_NAME")]
    sheet_name: Option<String>,

    /// Write Markdown that fails to render as plain text (default: enabled).
    #[arg(long)]
    fallback: Option<bool>,

    /// Fail on Markdown that cannot be rendered.
    #[arg(long, conflicts_with = "fallback")]
    no_fallback: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ConvertArgs {
    /// Execute the convert command.
    ///
    /// # Errors
    ///
    /// Returns an error if the notebook cannot be read, exported or saved.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            fallback_to_plain_text: self.resolve_fallback(),
            sheet_name: self.sheet_name.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.say(
            Tone::Plain,
            &format!("Converting {}...", self.notebook.display()),
        );
        let notebook = Notebook::from_path(&self.notebook)?;

        let exporter = NotebookExporter::new(ExportOptions::from_config(&config));
        let mut sink = XlsxSink::new(&config.output.sheet_name)?;
        let summary = exporter.export(&notebook, &mut sink)?;

        let target = self
            .output
            .unwrap_or_else(|| default_output_path(&self.notebook));
        tracing::debug!(path = %target.display(), "Saving workbook");
        sink.save(&target)?;

        output.export_summary(&summary, &target);
        Ok(())
    }

    /// Resolve `fallback_to_plain_text` from --fallback/--no-fallback flags.
    fn resolve_fallback(&self) -> Option<bool> {
        self.no_fallback.then_some(false).or(self.fallback)
    }
}

fn default_output_path(notebook: &Path) -> PathBuf {
    notebook.with_extension("xlsx")
}
