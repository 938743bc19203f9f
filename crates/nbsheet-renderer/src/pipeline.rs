//! End-to-end Markdown to grid pipeline.

use crate::error::RenderError;
use crate::linearize::{CellWriteGroup, linearize, resolve_group};
use crate::markdown::MarkdownRenderer;
use crate::sink::{GridSink, write_group};
use crate::style::{FormatFactory, StyleRegistry};

/// Result of writing one Markdown source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Rows consumed, one per cell write group.
    pub rows: usize,
    /// Groups written in degraded form.
    pub degraded: usize,
}

/// Error from [`write_markdown`].
#[derive(Debug, thiserror::Error)]
pub enum WriteError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("grid sink error: {0}")]
    Sink(#[source] E),
}

/// Render Markdown into resolved cell write groups without writing anything.
///
/// # Errors
///
/// Returns [`RenderError`] if the Markdown cannot be rendered.
pub fn render_groups<F, S>(
    markdown: &str,
    renderer: &MarkdownRenderer,
    registry: &mut StyleRegistry<F>,
    factory: &mut S,
) -> Result<Vec<CellWriteGroup<F>>, RenderError>
where
    S: FormatFactory<Format = F> + ?Sized,
{
    let lines = renderer.render_markdown(markdown)?;
    let drafts = linearize(&lines)?;
    Ok(drafts
        .into_iter()
        .map(|draft| resolve_group(draft, registry, &mut *factory))
        .collect())
}

/// Render Markdown and write it to `sink`, one row per group from `row`.
///
/// Rendering completes before the first write, so a render failure leaves
/// the sink untouched.
///
/// # Example
///
/// ```
/// use nbsheet_renderer::{MarkdownRenderer, RecordingSink, StyleRegistry, write_markdown};
///
/// let mut sink = RecordingSink::new();
/// let mut registry = StyleRegistry::new();
/// let summary = write_markdown(
///     "# Title\n\nBody",
///     &MarkdownRenderer::new(),
///     &mut registry,
///     &mut sink,
///     0,
///     1,
/// )
/// .unwrap();
///
/// assert_eq!(summary.rows, 2);
/// assert_eq!(sink.cell_text(1, 1).as_deref(), Some("Body"));
/// ```
///
/// # Errors
///
/// Returns [`WriteError::Render`] for Markdown that cannot be rendered and
/// [`WriteError::Sink`] if the sink rejects a write.
pub fn write_markdown<S>(
    markdown: &str,
    renderer: &MarkdownRenderer,
    registry: &mut StyleRegistry<S::Format>,
    sink: &mut S,
    row: usize,
    col: usize,
) -> Result<WriteSummary, WriteError<S::Error>>
where
    S: GridSink + ?Sized,
{
    let groups = render_groups(markdown, renderer, registry, &mut *sink)?;

    let mut summary = WriteSummary::default();
    for group in &groups {
        let defect =
            write_group(&mut *sink, row + summary.rows, col, group).map_err(WriteError::Sink)?;
        if defect.is_some() {
            summary.degraded += 1;
        }
        summary.rows += 1;
    }
    tracing::debug!(
        row,
        rows = summary.rows,
        degraded = summary.degraded,
        "Wrote markdown groups"
    );
    Ok(summary)
}
