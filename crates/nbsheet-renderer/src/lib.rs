//! Markdown to spreadsheet cell writes.
//!
//! This crate turns Markdown text into an ordered sequence of operations
//! against a [`GridSink`], one spreadsheet row per cell write group.
//!
//! # Architecture
//!
//! Conversion runs in three stages:
//! - [`MarkdownRenderer`] walks pulldown-cmark events and produces one
//!   [`Line`] of [`Token`]s per block-level construct, with list items nested
//!   as groups.
//! - The linearizer ([`linearize`], built on the [`step`] transition
//!   function) flattens each line and cuts it into [`GroupDraft`]s, handling
//!   indentation, list numbering and hyperlink grouping.
//! - [`resolve_group`] looks the drafts' style keys up in a per-document
//!   [`StyleRegistry`], and [`write_group`] translates the result into sink
//!   calls.
//!
//! [`write_markdown`] runs all three against a sink.
//!
//! # Example
//!
//! ```
//! use nbsheet_renderer::{MarkdownRenderer, RecordingSink, StyleRegistry, write_markdown};
//!
//! let mut sink = RecordingSink::new();
//! let mut registry = StyleRegistry::new();
//! write_markdown(
//!     "1. first\n2. **second**",
//!     &MarkdownRenderer::new(),
//!     &mut registry,
//!     &mut sink,
//!     0,
//!     0,
//! )
//! .unwrap();
//!
//! assert_eq!(sink.cell_text(0, 1).as_deref(), Some("1. first"));
//! assert_eq!(sink.cell_text(1, 1).as_deref(), Some("2. second"));
//! ```

mod error;
mod linearize;
mod markdown;
mod pipeline;
mod sink;
mod style;
mod tokens;
mod util;

pub use error::RenderError;
pub use linearize::{
    CellWriteGroup, DraftRun, GroupDraft, LineState, Run, linearize, linearize_line, resolve_group,
    step,
};
pub use markdown::{DEFAULT_MAX_NESTING_DEPTH, MarkdownRenderer};
pub use pipeline::{WriteError, WriteSummary, render_groups, write_markdown};
pub use sink::{
    GridSink, GroupDefect, RecordedElement, RecordedFormat, RecordingSink, RichElement, SinkOp,
    write_group,
};
pub use style::{FormatAttributes, FormatFactory, MONOSPACE_FONT, StyleKey, StyleRegistry};
pub use tokens::{Line, Token, TokenTree};
pub use util::escape_text;
