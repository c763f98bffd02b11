use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How math and code are treated while rendering a text field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// LaTeX macros become Unicode glyphs, math delimiters are dropped
    #[default]
    Normal,
    /// Math regions are emitted with canonical `$` / `$$` delimiters
    Math,
    /// The whole text is a single preformatted block
    Code,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Normal => "normal",
            RenderMode::Math => "math",
            RenderMode::Code => "code",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "" => Ok(RenderMode::Normal),
            "math" => Ok(RenderMode::Math),
            "code" => Ok(RenderMode::Code),
            other => Err(crate::Error::UnknownMode(other.to_string())),
        }
    }
}

/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Span {
    Text { text: String },
    Bold { content: Vec<Span> },
    Italic { content: Vec<Span> },
    Strikethrough { content: Vec<Span> },
    Code { code: String },
    Link { url: String, content: Vec<Span> },
    Math { latex: String, display: bool },
}

impl Span {
    pub fn text(text: impl Into<String>) -> Self {
        Span::Text { text: text.into() }
    }
}

/// The formatted result of one line or table cell
pub type InlineRun = Vec<Span>;

/// A flat run of list items sharing type and indentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct List {
    pub ordered: bool,
    /// Literal number of the first item; 1 for unordered lists
    pub start: u64,
    /// Leading whitespace of the items, used as a visual offset only
    pub indent: usize,
    pub items: Vec<InlineRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub headers: Option<Vec<InlineRun>>,
    pub rows: Vec<Vec<InlineRun>>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        let header_cols = self.headers.as_ref().map_or(0, Vec::len);
        self.rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(header_cols)
    }
}

/// Block-level elements of a rendered text field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading {
        level: u8,
        content: InlineRun,
    },
    Paragraph {
        content: InlineRun,
    },
    List(List),
    Table(Table),
    Blockquote {
        content: InlineRun,
    },
    Rule,
    MathBlock {
        latex: String,
    },
    CodeBlock {
        content: String,
    },
}
