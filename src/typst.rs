use crate::block::{Block, List, Span, Table};
use crate::config::Config;
use crate::unicode::convert_latex_to_unicode;

/// Lists with more items than this may break across pages.
const SMALL_LIST_ITEMS: usize = 5;

/// Width of one column of list indentation.
const INDENT_PT: usize = 6;

/// Convert blocks to Typst markup
pub fn blocks_to_typst(blocks: &[Block], config: &Config) -> String {
    let mut out = String::new();

    if config.pdf.page_numbers {
        out.push_str("#set page(numbering: \"1\")\n");
    }
    // Set up paragraph settings to prevent widows/orphans
    out.push_str("#set par(linebreaks: \"optimized\")\n\n");

    let mut i = 0;
    while i < blocks.len() {
        let block = &blocks[i];

        match block {
            Block::Heading { .. } => {
                // Keep heading with following content using a block that prevents breaks
                out.push_str("#block(breakable: false)[\n");
                emit_heading(block, &mut out);

                if let Some(next) = blocks.get(i + 1) {
                    i += 1;
                    emit_block(next, &mut out);
                }
                out.push_str("]\n\n");
            }
            _ => emit_block(block, &mut out),
        }

        i += 1;
    }

    out
}

fn emit_heading(block: &Block, out: &mut String) {
    if let Block::Heading { level, content } = block {
        for _ in 0..*level {
            out.push('=');
        }
        out.push(' ');
        spans_to_typst(content, out);
        out.push_str("\n\n");
    }
}

fn emit_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { .. } => emit_heading(block, out),
        Block::Paragraph { content } => {
            spans_to_typst(content, out);
            out.push_str("\n\n");
        }
        Block::CodeBlock { content } => {
            let fence = code_fence(content);
            out.push_str("#block(breakable: false)[\n");
            out.push_str(&fence);
            out.push('\n');
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out.push_str("\n]\n\n");
        }
        Block::List(list) => {
            // Wrap list to keep together when small, allow breaks when large
            if list.items.len() <= SMALL_LIST_ITEMS {
                out.push_str("#block(breakable: false)[\n");
                list_to_typst(list, out);
                out.push_str("]\n\n");
            } else {
                list_to_typst(list, out);
                out.push('\n');
            }
        }
        Block::Table(table) => {
            out.push_str("#block(breakable: false)[\n");
            table_to_typst(table, out);
            out.push_str("]\n\n");
        }
        Block::Blockquote { content } => {
            out.push_str("#quote(block: true)[");
            spans_to_typst(content, out);
            out.push_str("]\n\n");
        }
        Block::Rule => out.push_str("#line(length: 100%)\n\n"),
        Block::MathBlock { latex } => {
            out.push_str("#align(center)[");
            escape_text(&convert_latex_to_unicode(latex), out);
            out.push_str("]\n\n");
        }
    }
}

/// A backtick fence longer than any backtick run inside `content`.
fn code_fence(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn spans_to_typst(spans: &[Span], out: &mut String) {
    for span in spans {
        span_to_typst(span, out);
    }
}

fn span_to_typst(span: &Span, out: &mut String) {
    match span {
        Span::Text { text } => escape_text(text, out),
        Span::Bold { content } => {
            out.push('*');
            spans_to_typst(content, out);
            out.push('*');
        }
        Span::Italic { content } => {
            out.push('_');
            spans_to_typst(content, out);
            out.push('_');
        }
        Span::Strikethrough { content } => {
            out.push_str("#strike[");
            spans_to_typst(content, out);
            out.push(']');
        }
        Span::Code { code } => {
            if code.contains('`') {
                out.push_str("#raw(");
                push_string_literal(code, out);
                out.push(')');
            } else {
                out.push('`');
                out.push_str(code);
                out.push('`');
            }
        }
        Span::Link { url, content } => {
            out.push_str("#link(");
            push_string_literal(url, out);
            out.push_str(")[");
            spans_to_typst(content, out);
            out.push(']');
        }
        Span::Math { latex, .. } => escape_text(&convert_latex_to_unicode(latex), out),
    }
}

/// Escape characters with a markup meaning in Typst
fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '#' | '*' | '_' | '@' | '$' | '\\' | '`' | '<' | '>' | '[' | ']' | '/' | '~' | '=' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

fn push_string_literal(value: &str, out: &mut String) {
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out.push('"');
}

fn list_to_typst(list: &List, out: &mut String) {
    if list.indent > 0 {
        out.push_str(&format!("#pad(left: {}pt)[\n", list.indent * INDENT_PT));
    }

    for (index, item) in list.items.iter().enumerate() {
        if list.ordered {
            // Explicit numbers keep the source numbering across split lists.
            out.push_str(&format!("{}. ", list.start + index as u64));
        } else {
            out.push_str("- ");
        }
        spans_to_typst(item, out);
        out.push('\n');
    }

    if list.indent > 0 {
        out.push_str("]\n");
    }
}

fn table_to_typst(table: &Table, out: &mut String) {
    let col_count = table.column_count();
    if col_count == 0 {
        return;
    }

    out.push_str("#table(\n");
    out.push_str(&format!("  columns: {},\n", col_count));

    // Header cells (bold)
    if let Some(headers) = &table.headers {
        for index in 0..col_count {
            out.push_str("  [");
            if let Some(cell) = headers.get(index).filter(|cell| !cell.is_empty()) {
                out.push('*');
                spans_to_typst(cell, out);
                out.push('*');
            }
            out.push_str("],\n");
        }
    }

    for row in &table.rows {
        for index in 0..col_count {
            out.push_str("  [");
            if let Some(cell) = row.get(index) {
                spans_to_typst(cell, out);
            }
            out.push_str("],\n");
        }
    }

    out.push_str(")\n");
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::{RenderMode, render_typst};
    use pretty_assertions::assert_eq;

    const PREAMBLE: &str = "#set par(linebreaks: \"optimized\")\n\n";

    fn typst(source: &str) -> String {
        render_typst(source, RenderMode::Normal, &Config::default())
    }

    fn typst_math(source: &str) -> String {
        render_typst(source, RenderMode::Math, &Config::default())
    }

    #[test]
    fn heading() {
        assert_eq!(
            typst("# Hello"),
            format!("{PREAMBLE}#block(breakable: false)[\n= Hello\n\n]\n\n")
        );
    }

    #[test]
    fn heading_with_following_content() {
        // Heading should be grouped with following paragraph
        let result = typst("# Title\n\nSome text.");
        assert!(result.contains("#block(breakable: false)[\n= Title\n\nSome text.\n\n]\n\n"));
    }

    #[test]
    fn paragraph() {
        assert_eq!(typst("Hello world"), format!("{PREAMBLE}Hello world\n\n"));
    }

    #[test]
    fn page_numbers() {
        let mut config = Config::default();
        config.pdf.page_numbers = true;
        assert_eq!(
            render_typst("Hi", RenderMode::Normal, &config),
            format!("#set page(numbering: \"1\")\n{PREAMBLE}Hi\n\n")
        );
    }

    #[test]
    fn bold_italic_and_strike() {
        assert_eq!(typst("**bold**"), format!("{PREAMBLE}*bold*\n\n"));
        assert_eq!(typst("*italic*"), format!("{PREAMBLE}_italic_\n\n"));
        assert_eq!(typst("***both***"), format!("{PREAMBLE}*_both_*\n\n"));
        assert_eq!(typst("~~gone~~"), format!("{PREAMBLE}#strike[gone]\n\n"));
    }

    #[test]
    fn inline_code() {
        assert_eq!(typst("`code`"), format!("{PREAMBLE}`code`\n\n"));
    }

    #[test]
    fn code_block() {
        assert_eq!(
            render_typst("let x = 1;", RenderMode::Code, &Config::default()),
            format!("{PREAMBLE}#block(breakable: false)[\n```\nlet x = 1;\n```\n]\n\n")
        );
        assert_eq!(
            render_typst("a ```` b", RenderMode::Code, &Config::default()),
            format!("{PREAMBLE}#block(breakable: false)[\n`````\na ```` b\n`````\n]\n\n")
        );
    }

    #[test]
    fn unordered_list() {
        assert_eq!(
            typst("- one\n- two"),
            format!("{PREAMBLE}#block(breakable: false)[\n- one\n- two\n]\n\n")
        );
    }

    #[test]
    fn ordered_list_keeps_numbers() {
        assert_eq!(
            typst("1. one\n2. two\n\n3. three"),
            format!(
                "{PREAMBLE}#block(breakable: false)[\n1. one\n2. two\n]\n\n#block(breakable: false)[\n3. three\n]\n\n"
            )
        );
    }

    #[test]
    fn indented_list() {
        assert_eq!(
            typst("  - inner"),
            format!("{PREAMBLE}#block(breakable: false)[\n#pad(left: 12pt)[\n- inner\n]\n]\n\n")
        );
    }

    #[test]
    fn escapes_special_chars() {
        assert_eq!(typst("a * b"), format!("{PREAMBLE}a \\* b\n\n"));
        assert_eq!(typst("a # b"), format!("{PREAMBLE}a \\# b\n\n"));
        assert_eq!(typst("a_b"), format!("{PREAMBLE}a\\_b\n\n"));
        assert_eq!(typst("see a//b"), format!("{PREAMBLE}see a\\/\\/b\n\n"));
    }

    #[test]
    fn link() {
        assert_eq!(
            typst("[docs](https://a.io/x)"),
            format!("{PREAMBLE}#link(\"https://a.io/x\")[docs]\n\n")
        );
    }

    #[test]
    fn table() {
        let source = "| A | B |\n|---|---|\n| 1 | 2 |";
        let expected = format!(
            "{PREAMBLE}#block(breakable: false)[\n#table(\n  columns: 2,\n  [*A*],\n  [*B*],\n  [1],\n  [2],\n)\n]\n\n"
        );
        assert_eq!(typst(source), expected);
    }

    #[test]
    fn blockquote_and_rule() {
        assert_eq!(
            typst("> quoted\n---"),
            format!("{PREAMBLE}#quote(block: true)[quoted]\n\n#line(length: 100%)\n\n")
        );
    }

    #[test]
    fn math_is_approximated_with_unicode() {
        assert_eq!(
            typst_math("[x^2 \\leq \\alpha]"),
            format!("{PREAMBLE}#align(center)[x² ≤ α]\n\n")
        );
        assert_eq!(
            typst_math("area $\\pi r^2$"),
            format!("{PREAMBLE}area π r²\n\n")
        );
    }
}
