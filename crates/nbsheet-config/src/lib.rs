//! Configuration management for nbsheet.
//!
//! Parses `nbsheet.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the plain-text fallback for Markdown that fails to render.
    pub fallback_to_plain_text: Option<bool>,
    /// Override the worksheet name.
    pub sheet_name: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "nbsheet.toml";

/// Longest worksheet name a workbook accepts.
const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters a workbook rejects in worksheet names.
const INVALID_SHEET_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markdown rendering configuration.
    pub markdown: MarkdownConfig,
    /// Worksheet layout configuration.
    pub layout: LayoutConfig,
    /// Output workbook configuration.
    pub output: OutputConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Markdown rendering configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Enable GitHub Flavored Markdown (tables, strikethrough, task lists, footnotes).
    pub gfm: bool,
    /// Escape `&`, `<` and `>` in text.
    pub escape_html: bool,
    /// Write the Markdown source as plain text when rendering fails.
    pub fallback_to_plain_text: bool,
    /// Maximum list nesting depth.
    pub max_nesting_depth: u16,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            gfm: true,
            escape_html: true,
            fallback_to_plain_text: true,
            max_nesting_depth: 16,
        }
    }
}

/// Worksheet layout configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Write the 1-based notebook cell number in column 0.
    pub cell_numbers: bool,
    /// Column where cell content starts.
    pub content_column: u16,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            cell_numbers: true,
            content_column: 1,
        }
    }
}

/// Output workbook configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Name of the generated worksheet.
    pub sheet_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Sheet1".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `nbsheet.toml` in current directory and parents,
    /// falling back to defaults when none is found.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values. The result is validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(fallback) = settings.fallback_to_plain_text {
            self.markdown.fallback_to_plain_text = fallback;
        }
        if let Some(sheet_name) = &settings.sheet_name {
            self.output.sheet_name.clone_from(sheet_name);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically by [`Config::load`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_markdown()?;
        self.validate_layout()?;
        self.validate_output()?;
        Ok(())
    }

    fn validate_markdown(&self) -> Result<(), ConfigError> {
        if self.markdown.max_nesting_depth == 0 {
            return Err(ConfigError::Validation(
                "markdown.max_nesting_depth must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_layout(&self) -> Result<(), ConfigError> {
        // Column 0 holds the cell number
        if self.layout.cell_numbers && self.layout.content_column == 0 {
            return Err(ConfigError::Validation(
                "layout.content_column must be greater than 0 when layout.cell_numbers is enabled"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_output(&self) -> Result<(), ConfigError> {
        let name = &self.output.sheet_name;
        require_non_empty(name, "output.sheet_name")?;

        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(ConfigError::Validation(format!(
                "output.sheet_name cannot exceed {MAX_SHEET_NAME_LEN} characters"
            )));
        }
        if let Some(c) = name.chars().find(|c| INVALID_SHEET_NAME_CHARS.contains(c)) {
            return Err(ConfigError::Validation(format!(
                "output.sheet_name cannot contain '{c}'"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.markdown.gfm);
        assert!(config.markdown.escape_html);
        assert!(config.markdown.fallback_to_plain_text);
        assert_eq!(config.markdown.max_nesting_depth, 16);
        assert!(config.layout.cell_numbers);
        assert_eq!(config.layout.content_column, 1);
        assert_eq!(config.output.sheet_name, "Sheet1");
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.markdown.fallback_to_plain_text);
        assert_eq!(config.output.sheet_name, "Sheet1");
    }

    #[test]
    fn test_parse_markdown_config() {
        let toml = r"
[markdown]
gfm = false
fallback_to_plain_text = false
max_nesting_depth = 4
";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.markdown.gfm);
        assert!(config.markdown.escape_html); // Unchanged
        assert!(!config.markdown.fallback_to_plain_text);
        assert_eq!(config.markdown.max_nesting_depth, 4);
    }

    #[test]
    fn test_parse_layout_and_output_config() {
        let toml = r#"
[layout]
cell_numbers = false
content_column = 0

[output]
sheet_name = "Notebook"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.layout.cell_numbers);
        assert_eq!(config.layout.content_column, 0);
        assert_eq!(config.output.sheet_name, "Notebook");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let toml = r#"
[markdown]
gfm = "yes"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_apply_cli_settings_fallback() {
        let mut config = Config::default();
        let overrides = CliSettings {
            fallback_to_plain_text: Some(false),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert!(!config.markdown.fallback_to_plain_text);
        assert_eq!(config.output.sheet_name, "Sheet1"); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_sheet_name() {
        let mut config = Config::default();
        let overrides = CliSettings {
            sheet_name: Some("Results".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.output.sheet_name, "Results");
        assert!(config.markdown.fallback_to_plain_text); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default();
        config.apply_cli_settings(&CliSettings::default());
        assert!(config.markdown.fallback_to_plain_text);
        assert_eq!(config.output.sheet_name, "Sheet1");
    }

    #[test]
    fn test_validate_default_config_passes() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_validate_nesting_depth_zero() {
        let mut config = Config::default();
        config.markdown.max_nesting_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_nesting_depth"));
    }

    #[test]
    fn test_validate_content_column_overlaps_cell_numbers() {
        let mut config = Config::default();
        config.layout.content_column = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("content_column"));
    }

    #[test]
    fn test_validate_sheet_name_empty() {
        let mut config = Config::default();
        config.output.sheet_name = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output.sheet_name cannot be empty"));
    }

    #[test]
    fn test_validate_sheet_name_too_long() {
        let mut config = Config::default();
        config.output.sheet_name = "x".repeat(32);
        assert!(config.validate().is_err());

        config.output.sheet_name = "x".repeat(31);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_sheet_name_invalid_chars() {
        for name in ["a/b", "a\\b", "[a]", "a:b", "a*", "a?"] {
            let mut config = Config::default();
            config.output.sheet_name = name.to_owned();
            assert!(config.validate().is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/nbsheet.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_explicit_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nbsheet.toml");
        std::fs::write(
            &path,
            "[output]\nsheet_name = \"FromFile\"\n\n[markdown]\nfallback_to_plain_text = true\n",
        )
        .unwrap();

        let overrides = CliSettings {
            fallback_to_plain_text: Some(false),
            ..Default::default()
        };
        let config = Config::load(Some(&path), Some(&overrides)).unwrap();

        assert_eq!(config.output.sheet_name, "FromFile");
        assert!(!config.markdown.fallback_to_plain_text);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_validates_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nbsheet.toml");
        std::fs::write(&path, "").unwrap();

        let overrides = CliSettings {
            sheet_name: Some("bad/name".to_owned()),
            ..Default::default()
        };
        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nbsheet.toml");
        std::fs::write(&path, "[markdown\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
