//! Grid sink contract and cell write group translation.
//!
//! [`GridSink`] is the minimal surface a spreadsheet backend implements.
//! [`write_group`] translates one resolved [`CellWriteGroup`] into sink
//! calls. [`RecordingSink`] keeps an in-memory operation log.

use std::convert::Infallible;
use std::fmt;

use crate::linearize::CellWriteGroup;
use crate::style::{FormatAttributes, FormatFactory};

/// One element of a rich text cell.
///
/// A format applies to the text fragment that follows it. A format with no
/// following fragment is the format of the cell itself.
#[derive(Debug, PartialEq)]
pub enum RichElement<'a, F> {
    Format(&'a F),
    Text(&'a str),
}

impl<F> Clone for RichElement<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for RichElement<'_, F> {}

/// Spreadsheet backend.
///
/// Rows and columns are zero-based. Backends with narrower coordinate types
/// report out-of-range positions through [`Self::Error`].
pub trait GridSink: FormatFactory {
    /// Backend error.
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_text(
        &mut self,
        row: usize,
        col: usize,
        text: &str,
        format: Option<&Self::Format>,
    ) -> Result<(), Self::Error>;

    fn write_number(
        &mut self,
        row: usize,
        col: usize,
        number: f64,
        format: Option<&Self::Format>,
    ) -> Result<(), Self::Error>;

    fn write_rich_text(
        &mut self,
        row: usize,
        col: usize,
        elements: &[RichElement<'_, Self::Format>],
    ) -> Result<(), Self::Error>;

    fn write_hyperlink(
        &mut self,
        row: usize,
        col: usize,
        url: &str,
        text: Option<&str>,
        format: Option<&Self::Format>,
    ) -> Result<(), Self::Error>;

    /// Insert an encoded image anchored at the cell, scaled per axis.
    fn insert_image(
        &mut self,
        row: usize,
        col: usize,
        image: &[u8],
        x_scale: f64,
        y_scale: f64,
    ) -> Result<(), Self::Error>;

    /// Set a row height in points.
    fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), Self::Error>;
}

/// A group that could not be written as it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum GroupDefect {
    /// A hyperlink group carried more than one run; only the first was used.
    LinkWithManyRuns {
        /// Number of runs in the group.
        runs: usize,
    },
    /// The group had no text to write and was skipped.
    NoText,
}

impl fmt::Display for GroupDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkWithManyRuns { runs } => {
                write!(f, "hyperlink with {runs} runs, kept the first")
            }
            Self::NoText => f.write_str("group without text, skipped"),
        }
    }
}

/// Write one resolved group at `row`, starting at `base_col`.
///
/// The group lands in column `base_col + group.indent`. Malformed groups are
/// degraded instead of failing and reported through the returned defect.
/// Two unformatted runs are written as one string, joined by a single space
/// only when neither side already has whitespace at the join.
///
/// # Errors
///
/// Returns the sink's error if a write fails.
pub fn write_group<S>(
    sink: &mut S,
    row: usize,
    base_col: usize,
    group: &CellWriteGroup<S::Format>,
) -> Result<Option<GroupDefect>, S::Error>
where
    S: GridSink + ?Sized,
{
    let col = base_col + group.indent;

    if let Some(url) = &group.link {
        let Some(first) = group.runs.first() else {
            return Ok(degraded(row, GroupDefect::NoText));
        };
        sink.write_hyperlink(row, col, url, Some(&first.text), first.format.as_deref())?;
        return Ok(match group.runs.len() {
            1 => None,
            runs => degraded(row, GroupDefect::LinkWithManyRuns { runs }),
        });
    }

    let mut elements = Vec::with_capacity(group.runs.len() * 2 + 1);
    for run in &group.runs {
        if let Some(format) = &run.format {
            elements.push(RichElement::Format(format.as_ref()));
        }
        elements.push(RichElement::Text(run.text.as_str()));
    }
    if let Some(format) = &group.cell_format {
        elements.push(RichElement::Format(format.as_ref()));
    }

    match elements.as_slice() {
        [_, _, _, ..] => sink.write_rich_text(row, col, &elements)?,
        [RichElement::Format(format), RichElement::Text(text)]
        | [RichElement::Text(text), RichElement::Format(format)] => {
            sink.write_text(row, col, text, Some(*format))?;
        }
        [RichElement::Text(first), RichElement::Text(second)] => {
            sink.write_text(row, col, &join_words(first, second), None)?;
        }
        [RichElement::Text(text)] => sink.write_text(row, col, text, None)?,
        _ => return Ok(degraded(row, GroupDefect::NoText)),
    }
    Ok(None)
}

fn degraded(row: usize, defect: GroupDefect) -> Option<GroupDefect> {
    tracing::warn!(row, defect = %defect, "Degraded malformed cell group");
    Some(defect)
}

/// Concatenate two fragments, adding a space unless one side already has
/// whitespace at the join.
fn join_words(first: &str, second: &str) -> String {
    let spaced = first.ends_with(char::is_whitespace) || second.starts_with(char::is_whitespace);
    if spaced || first.is_empty() || second.is_empty() {
        format!("{first}{second}")
    } else {
        format!("{first} {second}")
    }
}

/// A format issued by [`RecordingSink`], numbered in creation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedFormat {
    pub id: usize,
    pub attributes: FormatAttributes,
}

/// A rich text element as recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RecordedElement {
    Format(usize),
    Text(String),
}

/// One call made against a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum SinkOp {
    CreateFormat {
        id: usize,
        attributes: FormatAttributes,
    },
    Text {
        row: usize,
        col: usize,
        text: String,
        format: Option<usize>,
    },
    Number {
        row: usize,
        col: usize,
        value: f64,
        format: Option<usize>,
    },
    RichText {
        row: usize,
        col: usize,
        elements: Vec<RecordedElement>,
    },
    Hyperlink {
        row: usize,
        col: usize,
        url: String,
        text: Option<String>,
        format: Option<usize>,
    },
    Image {
        row: usize,
        col: usize,
        bytes: usize,
        x_scale: f64,
        y_scale: f64,
    },
    RowHeight {
        row: usize,
        height: f64,
    },
}

/// In-memory sink that logs every operation.
#[derive(Debug, Default)]
pub struct RecordingSink {
    ops: Vec<SinkOp>,
    formats: usize,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations in call order.
    #[must_use]
    pub fn ops(&self) -> &[SinkOp] {
        &self.ops
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<SinkOp> {
        self.ops
    }

    /// Operations that put content into cells, in call order.
    pub fn writes(&self) -> impl Iterator<Item = &SinkOp> {
        self.ops
            .iter()
            .filter(|op| !matches!(op, SinkOp::CreateFormat { .. } | SinkOp::RowHeight { .. }))
    }

    /// Visible text of the last write at a cell, if any.
    ///
    /// Rich text is concatenated and numbers are formatted with `Display`.
    #[must_use]
    pub fn cell_text(&self, row: usize, col: usize) -> Option<String> {
        self.ops.iter().rev().find_map(|op| match op {
            SinkOp::Text { row: r, col: c, text, .. } if (*r, *c) == (row, col) => {
                Some(text.clone())
            }
            SinkOp::Number { row: r, col: c, value, .. } if (*r, *c) == (row, col) => {
                Some(value.to_string())
            }
            SinkOp::RichText { row: r, col: c, elements } if (*r, *c) == (row, col) => Some(
                elements
                    .iter()
                    .filter_map(|e| match e {
                        RecordedElement::Text(text) => Some(text.as_str()),
                        RecordedElement::Format(_) => None,
                    })
                    .collect(),
            ),
            SinkOp::Hyperlink { row: r, col: c, url, text, .. } if (*r, *c) == (row, col) => {
                Some(text.clone().unwrap_or_else(|| url.clone()))
            }
            _ => None,
        })
    }
}

impl FormatFactory for RecordingSink {
    type Format = RecordedFormat;

    fn create_format(&mut self, attributes: &FormatAttributes) -> RecordedFormat {
        let id = self.formats;
        self.formats += 1;
        self.ops.push(SinkOp::CreateFormat {
            id,
            attributes: attributes.clone(),
        });
        RecordedFormat {
            id,
            attributes: attributes.clone(),
        }
    }
}

impl GridSink for RecordingSink {
    type Error = Infallible;

    fn write_text(
        &mut self,
        row: usize,
        col: usize,
        text: &str,
        format: Option<&RecordedFormat>,
    ) -> Result<(), Infallible> {
        self.ops.push(SinkOp::Text {
            row,
            col,
            text: text.to_owned(),
            format: format.map(|f| f.id),
        });
        Ok(())
    }

    fn write_number(
        &mut self,
        row: usize,
        col: usize,
        number: f64,
        format: Option<&RecordedFormat>,
    ) -> Result<(), Infallible> {
        self.ops.push(SinkOp::Number {
            row,
            col,
            value: number,
            format: format.map(|f| f.id),
        });
        Ok(())
    }

    fn write_rich_text(
        &mut self,
        row: usize,
        col: usize,
        elements: &[RichElement<'_, RecordedFormat>],
    ) -> Result<(), Infallible> {
        let elements = elements
            .iter()
            .map(|element| match element {
                RichElement::Format(format) => RecordedElement::Format(format.id),
                RichElement::Text(text) => RecordedElement::Text((*text).to_owned()),
            })
            .collect();
        self.ops.push(SinkOp::RichText { row, col, elements });
        Ok(())
    }

    fn write_hyperlink(
        &mut self,
        row: usize,
        col: usize,
        url: &str,
        text: Option<&str>,
        format: Option<&RecordedFormat>,
    ) -> Result<(), Infallible> {
        self.ops.push(SinkOp::Hyperlink {
            row,
            col,
            url: url.to_owned(),
            text: text.map(str::to_owned),
            format: format.map(|f| f.id),
        });
        Ok(())
    }

    fn insert_image(
        &mut self,
        row: usize,
        col: usize,
        image: &[u8],
        x_scale: f64,
        y_scale: f64,
    ) -> Result<(), Infallible> {
        self.ops.push(SinkOp::Image {
            row,
            col,
            bytes: image.len(),
            x_scale,
            y_scale,
        });
        Ok(())
    }

    fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), Infallible> {
        self.ops.push(SinkOp::RowHeight { row, height });
        Ok(())
    }
}
