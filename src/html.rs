//! HTML presentation of rendered blocks.
//!
//! All user text is escaped here. Math is written out with its `$` / `$$`
//! delimiters for a LaTeX typesetter to pick up after insertion.

use crate::block::{Block, List, RenderMode, Span, Table};
use crate::config::HtmlConfig;

const UNSAFE_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Convert blocks to an HTML fragment.
pub fn blocks_to_html(blocks: &[Block], config: &HtmlConfig) -> String {
    let mut out = String::new();
    for block in blocks {
        emit_block(block, config, &mut out);
    }
    out
}

/// Wrap a fragment in a complete page. Math mode pages load MathJax, which
/// typesets the `$` / `$$` spans once the document is loaded.
pub fn standalone_document(fragment: &str, mode: RenderMode, config: &HtmlConfig) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>");
    out.push_str(&escape_text(&config.title));
    out.push_str("</title>\n");
    if mode == RenderMode::Math {
        out.push_str(
            "<script>\nwindow.MathJax = { tex: { inlineMath: [['$', '$']], displayMath: [['$$', '$$']] } };\n</script>\n",
        );
        out.push_str("<script async src=\"");
        out.push_str(&escape_text(&config.mathjax_url));
        out.push_str("\"></script>\n");
    }
    out.push_str("</head>\n<body>\n");
    out.push_str(fragment);
    out.push_str("</body>\n</html>\n");
    out
}

fn emit_block(block: &Block, config: &HtmlConfig, out: &mut String) {
    match block {
        Block::Heading { level, content } => {
            let level = (*level).clamp(1, 6);
            out.push_str(&format!("<h{level}>"));
            spans_to_html(content, out);
            out.push_str(&format!("</h{level}>\n"));
        }
        Block::Paragraph { content } => {
            out.push_str("<p>");
            spans_to_html(content, out);
            out.push_str("</p>\n");
        }
        Block::List(list) => list_to_html(list, config, out),
        Block::Table(table) => table_to_html(table, out),
        Block::Blockquote { content } => {
            out.push_str("<blockquote>");
            spans_to_html(content, out);
            out.push_str("</blockquote>\n");
        }
        Block::Rule => out.push_str("<hr>\n"),
        Block::MathBlock { latex } => {
            out.push_str("<div class=\"math-block\">$$");
            out.push_str(&escape_code(latex));
            out.push_str("$$</div>\n");
        }
        Block::CodeBlock { content } => {
            out.push_str("<pre><code>");
            out.push_str(&escape_code(content));
            out.push_str("</code></pre>\n");
        }
    }
}

fn list_to_html(list: &List, config: &HtmlConfig, out: &mut String) {
    let tag = if list.ordered { "ol" } else { "ul" };
    out.push('<');
    out.push_str(tag);
    if list.ordered && list.start != 1 {
        out.push_str(&format!(" start=\"{}\"", list.start));
    }
    if list.indent > 0 {
        let margin = list.indent as u64 * u64::from(config.list_indent_px);
        out.push_str(&format!(" style=\"margin-left: {margin}px\""));
    }
    out.push_str(">\n");
    for item in &list.items {
        out.push_str("<li>");
        spans_to_html(item, out);
        out.push_str("</li>\n");
    }
    out.push_str(&format!("</{tag}>\n"));
}

fn table_to_html(table: &Table, out: &mut String) {
    let columns = table.column_count();
    out.push_str("<table>\n");
    if let Some(headers) = &table.headers {
        out.push_str("<thead>\n<tr>");
        for index in 0..columns {
            out.push_str("<th>");
            if let Some(cell) = headers.get(index) {
                spans_to_html(cell, out);
            }
            out.push_str("</th>");
        }
        out.push_str("</tr>\n</thead>\n");
    }
    out.push_str("<tbody>\n");
    for row in &table.rows {
        out.push_str("<tr>");
        // Short rows are padded so every row has the same width.
        for index in 0..columns {
            out.push_str("<td>");
            if let Some(cell) = row.get(index) {
                spans_to_html(cell, out);
            }
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
}

fn spans_to_html(spans: &[Span], out: &mut String) {
    for span in spans {
        span_to_html(span, out);
    }
}

fn span_to_html(span: &Span, out: &mut String) {
    match span {
        Span::Text { text } => out.push_str(&escape_text(text)),
        Span::Bold { content } => wrap("strong", content, out),
        Span::Italic { content } => wrap("em", content, out),
        Span::Strikethrough { content } => wrap("del", content, out),
        Span::Code { code } => {
            out.push_str("<code>");
            out.push_str(&escape_code(code));
            out.push_str("</code>");
        }
        Span::Link { url, content } => {
            out.push_str("<a href=\"");
            out.push_str(&escape_text(safe_url(url)));
            out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
            spans_to_html(content, out);
            out.push_str("</a>");
        }
        Span::Math { latex, display } => {
            if *display {
                out.push_str("<span class=\"math\">$$");
                out.push_str(&escape_code(latex));
                out.push_str("$$</span>");
            } else {
                out.push_str("<span class=\"math\">$");
                out.push_str(&escape_code(latex));
                out.push_str("$</span>");
            }
        }
    }
}

fn wrap(tag: &str, content: &[Span], out: &mut String) {
    out.push_str(&format!("<{tag}>"));
    spans_to_html(content, out);
    out.push_str(&format!("</{tag}>"));
}

fn safe_url(url: &str) -> &str {
    let scheme: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(11)
        .collect::<String>()
        .to_ascii_lowercase();
    if UNSAFE_SCHEMES.iter().any(|s| scheme.starts_with(s)) {
        "#"
    } else {
        url
    }
}

/// Escape text for element content and attribute values.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape code and math, where quotes are left alone.
pub fn escape_code(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
