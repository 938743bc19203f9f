//! XLSX grid sink.

use std::path::Path;

use nbsheet_renderer::{FormatAttributes, FormatFactory, GridSink, RichElement};
use rust_xlsxwriter::{Format, Image, Url, Workbook, Worksheet, XlsxError};

/// Rows in an Excel worksheet.
const MAX_ROWS: u32 = 1_048_576;

/// Columns in an Excel worksheet.
const MAX_COLS: u16 = 16_384;

/// Link prefixes a workbook stores as hyperlinks.
const LINK_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://", "mailto:", "file://"];

/// Error from [`XlsxSink`].
#[derive(Debug, thiserror::Error)]
pub enum XlsxSinkError {
    #[error("row {0} is outside the worksheet")]
    RowOutOfRange(usize),

    #[error("column {0} is outside the worksheet")]
    ColumnOutOfRange(usize),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Grid sink writing one worksheet of an XLSX workbook.
pub struct XlsxSink {
    worksheet: Worksheet,
    default_format: Format,
}

impl XlsxSink {
    /// Create a sink for a worksheet called `sheet_name`.
    ///
    /// # Errors
    ///
    /// Returns [`XlsxSinkError::Xlsx`] if the name is not a valid sheet name.
    pub fn new(sheet_name: &str) -> Result<Self, XlsxSinkError> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(sheet_name)?;
        Ok(Self {
            worksheet,
            default_format: Format::new(),
        })
    }

    /// Build a workbook holding the worksheet.
    #[must_use]
    pub fn into_workbook(self) -> Workbook {
        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.worksheet);
        workbook
    }

    /// Save the workbook to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`XlsxSinkError::Xlsx`] if the file cannot be written.
    pub fn save(self, path: &Path) -> Result<(), XlsxSinkError> {
        self.into_workbook().save(path)?;
        Ok(())
    }

    /// Serialize the workbook to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`XlsxSinkError::Xlsx`] if serialization fails.
    pub fn save_to_buffer(self) -> Result<Vec<u8>, XlsxSinkError> {
        Ok(self.into_workbook().save_to_buffer()?)
    }
}

/// Check a position against the worksheet limits.
fn cell(row: usize, col: usize) -> Result<(u32, u16), XlsxSinkError> {
    let row32 = u32::try_from(row)
        .ok()
        .filter(|r| *r < MAX_ROWS)
        .ok_or(XlsxSinkError::RowOutOfRange(row))?;
    let col16 = u16::try_from(col)
        .ok()
        .filter(|c| *c < MAX_COLS)
        .ok_or(XlsxSinkError::ColumnOutOfRange(col))?;
    Ok((row32, col16))
}

impl FormatFactory for XlsxSink {
    type Format = Format;

    fn create_format(&mut self, attributes: &FormatAttributes) -> Format {
        let mut format = Format::new();
        if attributes.bold == Some(true) {
            format = format.set_bold();
        }
        if attributes.italic == Some(true) {
            format = format.set_italic();
        }
        if attributes.strikeout == Some(true) {
            format = format.set_font_strikethrough();
        }
        if let Some(name) = &attributes.font_name {
            format = format.set_font_name(name);
        }
        if let Some(size) = attributes.font_size {
            format = format.set_font_size(f64::from(size));
        }
        format
    }
}

impl GridSink for XlsxSink {
    type Error = XlsxSinkError;

    fn write_text(
        &mut self,
        row: usize,
        col: usize,
        text: &str,
        format: Option<&Format>,
    ) -> Result<(), XlsxSinkError> {
        let (row, col) = cell(row, col)?;
        match format {
            Some(format) => self.worksheet.write_string_with_format(row, col, text, format)?,
            None => self.worksheet.write_string(row, col, text)?,
        };
        Ok(())
    }

    fn write_number(
        &mut self,
        row: usize,
        col: usize,
        number: f64,
        format: Option<&Format>,
    ) -> Result<(), XlsxSinkError> {
        let (row, col) = cell(row, col)?;
        match format {
            Some(format) => self.worksheet.write_number_with_format(row, col, number, format)?,
            None => self.worksheet.write_number(row, col, number)?,
        };
        Ok(())
    }

    fn write_rich_text(
        &mut self,
        row: usize,
        col: usize,
        elements: &[RichElement<'_, Format>],
    ) -> Result<(), XlsxSinkError> {
        let mut fragments: Vec<(&Format, &str)> = Vec::new();
        let mut pending: Option<&Format> = None;
        let mut cell_format: Option<&Format> = None;
        for (index, element) in elements.iter().enumerate() {
            match element {
                RichElement::Format(format) => {
                    if matches!(elements.get(index + 1), Some(RichElement::Text(_))) {
                        pending = Some(*format);
                    } else {
                        cell_format = Some(*format);
                    }
                }
                RichElement::Text(text) => {
                    let format = pending.take().unwrap_or(&self.default_format);
                    if !text.is_empty() {
                        fragments.push((format, *text));
                    }
                }
            }
        }

        // A workbook rich string needs at least two fragments
        if let [(format, text)] = fragments.as_slice() {
            let format = cell_format.unwrap_or(*format);
            let (row, col) = cell(row, col)?;
            self.worksheet
                .write_string_with_format(row, col, *text, format)?;
            return Ok(());
        }
        if fragments.is_empty() {
            return Ok(());
        }

        let (row, col) = cell(row, col)?;
        match cell_format {
            Some(format) => {
                self.worksheet
                    .write_rich_string_with_format(row, col, &fragments, format)?;
            }
            None => {
                self.worksheet.write_rich_string(row, col, &fragments)?;
            }
        }
        Ok(())
    }

    fn write_hyperlink(
        &mut self,
        row: usize,
        col: usize,
        url: &str,
        text: Option<&str>,
        format: Option<&Format>,
    ) -> Result<(), XlsxSinkError> {
        if !LINK_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            tracing::debug!(url = %url, "Writing relative link as text");
            return self.write_text(row, col, text.unwrap_or(url), format);
        }

        let (row, col) = cell(row, col)?;
        let mut link = Url::new(url);
        if let Some(text) = text {
            link = link.set_text(text);
        }
        match format {
            Some(format) => self.worksheet.write_url_with_format(row, col, link, format)?,
            None => self.worksheet.write_url(row, col, link)?,
        };
        Ok(())
    }

    fn insert_image(
        &mut self,
        row: usize,
        col: usize,
        image: &[u8],
        x_scale: f64,
        y_scale: f64,
    ) -> Result<(), XlsxSinkError> {
        let (row, col) = cell(row, col)?;
        let image = Image::new_from_buffer(image)?
            .set_scale_width(x_scale)
            .set_scale_height(y_scale);
        self.worksheet.insert_image(row, col, &image)?;
        Ok(())
    }

    fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), XlsxSinkError> {
        let (row, _) = cell(row, 0)?;
        self.worksheet.set_row_height(row, height)?;
        Ok(())
    }
}
