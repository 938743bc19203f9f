//! Colored terminal output utilities.

use std::path::Path;

use console::{Style, Term};
use nbsheet_export::ExportSummary;

/// How a message is colored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tone {
    Plain,
    Success,
    Warning,
}

/// Messages on stderr, so `inspect` output on stdout stays parseable.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
        }
    }

    pub(crate) fn say(&self, tone: Tone, msg: &str) {
        let line = match tone {
            Tone::Plain => msg.to_owned(),
            Tone::Success => self.green.apply_to(msg).to_string(),
            Tone::Warning => self.yellow.apply_to(msg).to_string(),
        };
        let _ = self.term.write_line(&line);
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Report a finished conversion.
    pub(crate) fn export_summary(&self, summary: &ExportSummary, target: &Path) {
        for (tone, msg) in summary_messages(summary, target) {
            self.say(tone, &msg);
        }
    }
}

/// Lines reported after a conversion: warnings for lossy output first.
pub(crate) fn summary_messages(summary: &ExportSummary, target: &Path) -> Vec<(Tone, String)> {
    let mut messages = Vec::new();
    if summary.markdown_fallbacks > 0 {
        messages.push((
            Tone::Warning,
            format!(
                "{} Markdown cell(s) written as plain text",
                summary.markdown_fallbacks
            ),
        ));
    }
    if summary.degraded_groups > 0 {
        messages.push((
            Tone::Warning,
            format!(
                "{} cell group(s) written without formatting",
                summary.degraded_groups
            ),
        ));
    }
    let images = match summary.images {
        0 => String::new(),
        1 => ", 1 image".to_owned(),
        n => format!(", {n} images"),
    };
    messages.push((
        Tone::Success,
        format!(
            "Wrote {} cells ({} rows{images}) to {}",
            summary.cells,
            summary.rows,
            target.display()
        ),
    ));
    messages
}
