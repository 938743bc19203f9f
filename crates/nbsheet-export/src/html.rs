//! Flattening of `text/html` outputs into worksheet rows.
//!
//! The HTML is read leniently as XML: mismatched or unclosed tags do not
//! fail the parse. Loose text becomes one row per block, and every table
//! row becomes one row of cells.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// One worksheet row produced from HTML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HtmlRow {
    /// Whitespace-collapsed text outside of tables.
    Text(String),
    /// Text of the `th`/`td` cells of one `tr`.
    Cells(Vec<String>),
}

/// Error while reading HTML.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    /// XML parsing error.
    #[error("HTML parse error")]
    Xml(#[from] quick_xml::Error),

    /// Encoding error during parsing.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

/// Elements whose content is never shown.
const HIDDEN_ELEMENTS: &[&str] = &["style", "script", "head", "title"];

/// Elements that end a run of loose text.
const BLOCK_ELEMENTS: &[&str] = &[
    "div", "p", "body", "table", "thead", "tbody", "tfoot", "h1", "h2", "h3", "h4", "h5", "h6",
    "ul", "ol", "li", "pre", "blockquote", "hr",
];

#[derive(Default)]
struct Flattener {
    rows: Vec<HtmlRow>,
    hidden: usize,
    loose: String,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl Flattener {
    fn start(&mut self, name: &str) {
        if HIDDEN_ELEMENTS.contains(&name) {
            self.hidden += 1;
            return;
        }
        match name {
            "tr" => {
                self.flush_loose();
                self.finish_row();
                self.row = Some(Vec::new());
            }
            "td" | "th" => {
                self.finish_cell();
                self.cell = Some(String::new());
            }
            "br" => self.text(" "),
            _ if BLOCK_ELEMENTS.contains(&name) => self.flush_loose(),
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        if HIDDEN_ELEMENTS.contains(&name) {
            self.hidden = self.hidden.saturating_sub(1);
            return;
        }
        match name {
            "td" | "th" => self.finish_cell(),
            "tr" => self.finish_row(),
            "table" => {
                self.finish_row();
                self.flush_loose();
            }
            _ if BLOCK_ELEMENTS.contains(&name) => self.flush_loose(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.hidden > 0 {
            return;
        }
        if let Some(cell) = self.cell.as_mut() {
            cell.push_str(text);
        } else if self.row.is_none() {
            self.loose.push_str(text);
        }
    }

    fn finish_cell(&mut self) {
        if let Some(cell) = self.cell.take()
            && let Some(row) = self.row.as_mut()
        {
            row.push(collapse_whitespace(&cell));
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(row) = self.row.take() {
            self.rows.push(HtmlRow::Cells(row));
        }
    }

    fn flush_loose(&mut self) {
        let text = collapse_whitespace(&std::mem::take(&mut self.loose));
        if !text.is_empty() {
            self.rows.push(HtmlRow::Text(text));
        }
    }

    fn finish(mut self) -> Vec<HtmlRow> {
        self.finish_row();
        self.flush_loose();
        self.rows
    }
}

/// Flatten HTML into rows, in document order.
///
/// # Errors
///
/// Returns [`HtmlError`] if the markup cannot be tokenized at all.
pub fn flatten_html(html: &str) -> Result<Vec<HtmlRow>, HtmlError> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut flattener = Flattener::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = element_name(e.name().as_ref());
                flattener.start(&name);
            }
            Event::End(e) => {
                let name = element_name(e.name().as_ref());
                flattener.end(&name);
            }
            Event::Empty(e) => {
                let name = element_name(e.name().as_ref());
                if name == "br" {
                    flattener.text(" ");
                } else if BLOCK_ELEMENTS.contains(&name.as_str()) {
                    flattener.flush_loose();
                }
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?;
                flattener.text(&text);
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e)?;
                flattener.text(&decode_entity(&entity));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                flattener.text(&text);
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }
    Ok(flattener.finish())
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(entity: &str) -> String {
    match entity {
        "lt" => "<".to_owned(),
        "gt" => ">".to_owned(),
        "amp" => "&".to_owned(),
        "apos" => "'".to_owned(),
        "quot" => "\"".to_owned(),
        "nbsp" => "\u{a0}".to_owned(),
        s if s.starts_with('#') => {
            let code = if s.starts_with("#x") || s.starts_with("#X") {
                u32::from_str_radix(&s[2..], 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{entity};"), |c| c.to_string())
        }
        // Unknown entity - preserve as-is
        _ => format!("&{entity};"),
    }
}
