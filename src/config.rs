use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::block::RenderMode;
use crate::error::{Error, Result};

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub render: RenderConfig,
    pub html: HtmlConfig,
    pub pdf: PdfConfig,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub mode: RenderMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlConfig {
    /// Left margin per unit of list indentation, in pixels
    pub list_indent_px: u32,
    /// Wrap the fragment in a full HTML page
    pub standalone: bool,
    /// Script loaded by standalone math-mode pages
    pub mathjax_url: String,
    pub title: String,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            list_indent_px: 20,
            standalone: false,
            mathjax_url: "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js".to_string(),
            title: "SpoonFeeder".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PdfConfig {
    /// Number the pages of exported PDFs
    pub page_numbers: bool,
}

impl Config {
    /// Defaults shipped with the crate, falling back to the built-in
    /// values if the embedded file cannot be parsed.
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from a TOML file. Keys missing from the file keep their
    /// default values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }
}
