//! Jupyter notebook model (nbformat v4).
//!
//! Only the fields the exporter reads are modelled; everything else in the
//! JSON document is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ExportError;

/// MIME type to payload.
pub type MimeBundle = BTreeMap<String, Value>;

/// A parsed notebook.
#[derive(Debug, Default, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: NotebookMetadata,
}

impl Notebook {
    /// Parse a notebook from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if the text is not a valid notebook.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a notebook file.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] if the file cannot be read and
    /// [`ExportError::Json`] if it is not a valid notebook.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Notebook language, lowercased.
    #[must_use]
    pub fn language(&self) -> Option<String> {
        self.metadata
            .language_info
            .as_ref()
            .and_then(|info| info.name.as_deref())
            .or(self.metadata.language.as_deref())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default)]
    pub language_info: Option<LanguageInfo>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageInfo {
    #[serde(default)]
    pub name: Option<String>,
}

/// One notebook cell.
#[derive(Debug, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Markdown {
        #[serde(default, deserialize_with = "multiline")]
        source: String,
    },
    Code {
        #[serde(default, deserialize_with = "multiline")]
        source: String,
        #[serde(default)]
        outputs: Vec<Output>,
        #[serde(default)]
        execution_count: Option<u64>,
    },
    Raw {
        #[serde(default, deserialize_with = "multiline")]
        source: String,
    },
}

impl Cell {
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Markdown { source } | Self::Code { source, .. } | Self::Raw { source } => source,
        }
    }
}

/// One output of a code cell.
#[derive(Debug, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default)]
        name: String,
        #[serde(default, deserialize_with = "multiline")]
        text: String,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        metadata: MimeBundle,
    },
    ExecuteResult {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        metadata: MimeBundle,
        #[serde(default)]
        execution_count: Option<u64>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Text of a MIME payload.
///
/// Strings and string lists are joined as-is; any other JSON value is
/// pretty-printed.
#[must_use]
pub fn mime_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => {
            items.iter().filter_map(Value::as_str).collect()
        }
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// nbformat stores multiline strings either whole or as a list of lines.
fn multiline<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::One(text) => text,
        Multiline::Many(lines) => lines.concat(),
    })
}
