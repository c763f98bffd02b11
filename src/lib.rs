//! Renderer for the semi-structured text of notes, questions and answers.
//!
//! [`render`] turns a text field into a list of [`Block`]s. The back-ends in
//! [`html`] and [`typst`] present that tree; nothing in the tree is escaped.

mod block;
mod config;
mod error;
pub mod html;
mod inline;
pub mod math;
mod parser;
pub mod typst;
pub mod unicode;

pub use block::{Block, InlineRun, List, RenderMode, Span, Table};
pub use config::{Config, HtmlConfig, PdfConfig, RenderConfig};
pub use error::{Error, Result};
pub use inline::format_inline;
pub use parser::EMPTY_PLACEHOLDER;

use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

/// Render a text field into blocks. Never fails and never returns an empty
/// vector.
#[tracing::instrument(level = "debug", skip(source), fields(len = source.len()))]
pub fn render(source: &str, mode: RenderMode) -> Vec<Block> {
    let blocks = parser::parse(source, mode);
    tracing::debug!(blocks = blocks.len(), "rendered");
    blocks
}

/// Render a text field to an HTML fragment, or a full page when
/// `config.html.standalone` is set.
pub fn render_html(source: &str, mode: RenderMode, config: &Config) -> String {
    let fragment = html::blocks_to_html(&render(source, mode), &config.html);
    if config.html.standalone {
        html::standalone_document(&fragment, mode, &config.html)
    } else {
        fragment
    }
}

/// Render a text field to Typst markup.
pub fn render_typst(source: &str, mode: RenderMode, config: &Config) -> String {
    typst::blocks_to_typst(&render(source, mode), config)
}

/// Render the block tree as pretty-printed JSON.
pub fn render_json(source: &str, mode: RenderMode) -> Result<String> {
    Ok(serde_json::to_string_pretty(&render(source, mode))?)
}

/// Compile a text field to a Typst document.
fn compile_document(source: &str, mode: RenderMode, config: &Config) -> Result<PagedDocument> {
    let typst_content = render_typst(source, mode, config);

    let font_options = TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(false);

    let engine = TypstEngine::builder()
        .main_file(typst_content)
        .search_fonts_with(font_options)
        .build();

    engine
        .compile()
        .output
        .map_err(|e| Error::Typst(format!("{:?}", e)))
}

/// Render a text field to PDF bytes.
#[tracing::instrument(level = "debug", skip(source, config))]
pub fn render_pdf(source: &str, mode: RenderMode, config: &Config) -> Result<Vec<u8>> {
    let doc = compile_document(source, mode, config)?;

    typst_pdf::pdf(&doc, &PdfOptions::default()).map_err(|e| Error::Pdf(format!("{:?}", e)))
}
