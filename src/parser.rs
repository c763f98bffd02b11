use std::sync::LazyLock;

use regex::Regex;

use crate::block::{Block, InlineRun, List, RenderMode, Span, Table};
use crate::inline::format_inline;
use crate::math::{balance_left_right, standalone_math};

/// Text of the block returned for empty input.
pub const EMPTY_PLACEHOLDER: &str = "No content available.";

/// Columns of width a tab counts for in list indentation.
const TAB_WIDTH: usize = 4;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})(?:\s+(.*?))?\s*$").unwrap());

static ORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)(\d{1,9})\.\s+(.*?)\s*$").unwrap());

static BULLET_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)[-*+]\s+(.*?)\s*$").unwrap());

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:-{3,}|\*{3,}|_{3,})$").unwrap());

static SEPARATOR_CELL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?-+:?$").unwrap());

static DOT_DELIMITER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\.\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    /// `| a | b |`, header marked by a separator row
    Markdown,
    /// `a | b` or `a . b . c`, header only on the first line of the text
    Legacy,
}

/// One input line, classified.
#[derive(Debug, PartialEq)]
enum Line<'a> {
    Blank,
    Bracket,
    MathFence,
    TableSeparator,
    TableRow {
        kind: TableKind,
        cells: Vec<&'a str>,
    },
    Heading {
        level: u8,
        text: &'a str,
    },
    Blockquote(&'a str),
    Rule,
    ListItem {
        ordered: bool,
        number: u64,
        indent: usize,
        text: &'a str,
    },
    MathLine(String),
    Text(&'a str),
}

/// Classification order matters: table rows win over headings, headings
/// over lists.
fn classify(raw: &str, mode: RenderMode) -> Line<'_> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if trimmed == "[" || trimmed == "]" {
        return Line::Bracket;
    }
    if trimmed == "$$" {
        return Line::MathFence;
    }
    if is_table_separator(trimmed) {
        return Line::TableSeparator;
    }
    if let Some((kind, cells)) = table_row(trimmed) {
        return Line::TableRow { kind, cells };
    }
    if let Some(caps) = HEADING_RE.captures(trimmed) {
        return Line::Heading {
            level: caps[1].len() as u8,
            text: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    if let Some(quoted) = trimmed.strip_prefix('>') {
        return Line::Blockquote(quoted.trim());
    }
    if RULE_RE.is_match(trimmed) {
        return Line::Rule;
    }
    if let Some(caps) = ORDERED_ITEM_RE.captures(raw) {
        return Line::ListItem {
            ordered: true,
            number: caps[2].parse().unwrap_or(1),
            indent: indent_width(caps.get(1).map_or("", |m| m.as_str())),
            text: caps.get(3).map_or("", |m| m.as_str()),
        };
    }
    if let Some(caps) = BULLET_ITEM_RE.captures(raw) {
        return Line::ListItem {
            ordered: false,
            number: 1,
            indent: indent_width(caps.get(1).map_or("", |m| m.as_str())),
            text: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    if mode == RenderMode::Math {
        if let Some(latex) = standalone_math(trimmed) {
            return Line::MathLine(latex);
        }
    }
    Line::Text(trimmed)
}

fn indent_width(leading: &str) -> usize {
    leading
        .chars()
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

fn is_table_separator(line: &str) -> bool {
    if !line.contains('|') {
        return false;
    }
    let inner = line.trim_start_matches('|').trim_end_matches('|');
    !inner.is_empty()
        && inner
            .split('|')
            .all(|cell| SEPARATOR_CELL_RE.is_match(cell.trim()))
}

fn table_row(line: &str) -> Option<(TableKind, Vec<&str>)> {
    if line.len() >= 2 && line.starts_with('|') && line.ends_with('|') {
        let cells = line[1..line.len() - 1].split('|').map(str::trim).collect();
        return Some((TableKind::Markdown, cells));
    }

    // Math and code use both delimiters too often.
    if line.contains(['$', '`', '\\']) {
        return None;
    }

    if line.contains('|') {
        let cells: Vec<&str> = line.split('|').map(str::trim).collect();
        if cells.iter().filter(|c| !c.is_empty()).count() >= 2 {
            return Some((TableKind::Legacy, cells));
        }
        return None;
    }

    let cells: Vec<&str> = DOT_DELIMITER_RE.split(line).map(str::trim).collect();
    if cells.len() >= 3 && cells.iter().all(|c| !c.is_empty()) {
        return Some((TableKind::Legacy, cells));
    }
    None
}

/// Parse a text field into blocks. Never returns an empty vector.
pub fn parse(source: &str, mode: RenderMode) -> Vec<Block> {
    if mode == RenderMode::Code {
        return vec![Block::CodeBlock {
            content: source.to_string(),
        }];
    }

    let mut blocks = Vec::new();
    let mut state = ParseState::new(mode);

    for (index, raw) in source.lines().enumerate() {
        process_line(raw, index, &mut state, &mut blocks);
    }
    state.finish(&mut blocks);

    if blocks.is_empty() {
        blocks.push(Block::Paragraph {
            content: vec![Span::text(EMPTY_PLACEHOLDER)],
        });
    }
    blocks
}

struct ParseState {
    mode: RenderMode,
    list: Option<List>,
    table: Option<TableBuilder>,
    // Lines of an open `$$` fence
    math_fence: Option<Vec<String>>,
}

struct TableBuilder {
    kind: TableKind,
    headers: Option<Vec<InlineRun>>,
    rows: Vec<Vec<InlineRun>>,
}

impl ParseState {
    fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            list: None,
            table: None,
            math_fence: None,
        }
    }

    fn format(&self, text: &str) -> InlineRun {
        format_inline(text, self.mode)
    }

    fn format_cells(&self, cells: &[&str]) -> Vec<InlineRun> {
        cells.iter().map(|cell| self.format(cell)).collect()
    }

    fn flush_list(&mut self, blocks: &mut Vec<Block>) {
        if let Some(list) = self.list.take() {
            tracing::debug!(items = list.items.len(), "flushing list");
            blocks.push(Block::List(list));
        }
    }

    fn flush_table(&mut self, blocks: &mut Vec<Block>) {
        if let Some(table) = self.table.take() {
            tracing::debug!(rows = table.rows.len(), "flushing table");
            blocks.push(Block::Table(Table {
                headers: table.headers,
                rows: table.rows,
            }));
        }
    }

    fn flush_all(&mut self, blocks: &mut Vec<Block>) {
        self.flush_list(blocks);
        self.flush_table(blocks);
    }

    fn finish(&mut self, blocks: &mut Vec<Block>) {
        if let Some(lines) = self.math_fence.take() {
            tracing::debug!("closing unterminated display math at end of input");
            self.close_fence(&lines, blocks);
        }
        self.flush_all(blocks);
    }

    /// Math mode keeps the fence body as display math. Normal mode shows it
    /// as one paragraph of converted text.
    fn close_fence(&self, lines: &[String], blocks: &mut Vec<Block>) {
        if lines.iter().all(|line| line.trim().is_empty()) {
            tracing::debug!("dropping empty display math fence");
            return;
        }
        match self.mode {
            RenderMode::Math => blocks.push(math_block(&lines.join("\n"))),
            _ => {
                let text = lines
                    .iter()
                    .map(|line| line.trim())
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                blocks.push(Block::Paragraph {
                    content: self.format(&text),
                });
            }
        }
    }
}

fn math_block(latex: &str) -> Block {
    Block::MathBlock {
        latex: balance_left_right(latex.trim()),
    }
}

fn process_line(raw: &str, index: usize, state: &mut ParseState, blocks: &mut Vec<Block>) {
    if let Some(lines) = state.math_fence.as_mut() {
        if raw.trim() == "$$" {
            if let Some(lines) = state.math_fence.take() {
                state.close_fence(&lines, blocks);
            }
        } else {
            lines.push(raw.to_string());
        }
        return;
    }

    match classify(raw, state.mode) {
        Line::Blank => state.flush_all(blocks),

        Line::Bracket => {
            tracing::debug!(line = index, "skipping standalone bracket line");
        }

        Line::MathFence => {
            state.flush_all(blocks);
            state.math_fence = Some(Vec::new());
        }

        Line::TableSeparator => match state.table.as_mut() {
            Some(table)
                if table.kind == TableKind::Markdown
                    && table.headers.is_none()
                    && table.rows.len() == 1 =>
            {
                table.headers = table.rows.pop();
            }
            _ => tracing::debug!(line = index, "skipping table separator row"),
        },

        Line::TableRow { kind, cells } => {
            state.flush_list(blocks);
            if state.table.as_ref().is_some_and(|t| t.kind != kind) {
                state.flush_table(blocks);
            }
            let row = state.format_cells(&cells);
            match state.table.as_mut() {
                Some(table) => table.rows.push(row),
                None if kind == TableKind::Legacy && index == 0 => {
                    state.table = Some(TableBuilder {
                        kind,
                        headers: Some(row),
                        rows: Vec::new(),
                    });
                }
                None => {
                    state.table = Some(TableBuilder {
                        kind,
                        headers: None,
                        rows: vec![row],
                    });
                }
            }
        }

        Line::Heading { level, text } => {
            state.flush_all(blocks);
            let content = state.format(text);
            blocks.push(Block::Heading { level, content });
        }

        Line::Blockquote(text) => {
            state.flush_all(blocks);
            let content = state.format(text);
            blocks.push(Block::Blockquote { content });
        }

        Line::Rule => {
            state.flush_all(blocks);
            blocks.push(Block::Rule);
        }

        Line::ListItem {
            ordered,
            number,
            indent,
            text,
        } => {
            state.flush_table(blocks);
            let item = state.format(text);
            match state.list.as_mut() {
                Some(list) if list.ordered == ordered && list.indent == indent => {
                    list.items.push(item);
                }
                _ => {
                    state.flush_list(blocks);
                    state.list = Some(List {
                        ordered,
                        start: if ordered { number } else { 1 },
                        indent,
                        items: vec![item],
                    });
                }
            }
        }

        Line::MathLine(latex) => {
            state.flush_all(blocks);
            blocks.push(math_block(&latex));
        }

        Line::Text(text) => {
            state.flush_all(blocks);
            let content = state.format(text);
            blocks.push(Block::Paragraph { content });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Vec<Span> {
        vec![Span::text(s)]
    }

    fn items(list: &[&str]) -> Vec<InlineRun> {
        list.iter().map(|s| text(s)).collect()
    }

    #[test]
    fn classify_precedence() {
        let mode = RenderMode::Normal;
        assert_eq!(classify("", mode), Line::Blank);
        assert_eq!(classify(" ]", mode), Line::Bracket);
        assert_eq!(
            classify("# A | B", mode),
            Line::TableRow {
                kind: TableKind::Legacy,
                cells: vec!["# A", "B"]
            }
        );
        assert_eq!(
            classify("## Title", mode),
            Line::Heading {
                level: 2,
                text: "Title"
            }
        );
        assert_eq!(classify("#", mode), Line::Heading { level: 1, text: "" });
        assert_eq!(classify("#hashtag", mode), Line::Text("#hashtag"));
        assert_eq!(classify("---", mode), Line::Rule);
        assert_eq!(classify("|---|:--:|", mode), Line::TableSeparator);
        assert_eq!(
            classify("  - nested", mode),
            Line::ListItem {
                ordered: false,
                number: 1,
                indent: 2,
                text: "nested"
            }
        );
        assert_eq!(classify("**bold** start", mode), Line::Text("**bold** start"));
        assert_eq!(classify("x = 5", mode), Line::Text("x = 5"));
        assert_eq!(
            classify("x = 5", RenderMode::Math),
            Line::MathLine("x = 5".to_string())
        );
    }

    #[test]
    fn list_split_by_blank_line_keeps_numbering() {
        let blocks = parse("1. First\n2. Second\n\n3. Third", RenderMode::Normal);
        assert_eq!(
            blocks,
            vec![
                Block::List(List {
                    ordered: true,
                    start: 1,
                    indent: 0,
                    items: items(&["First", "Second"]),
                }),
                Block::List(List {
                    ordered: true,
                    start: 3,
                    indent: 0,
                    items: items(&["Third"]),
                }),
            ]
        );
    }

    #[test]
    fn list_type_and_indent_changes_start_new_lists() {
        let blocks = parse("- a\n- b\n  - c\n1. d", RenderMode::Normal);
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::List(l) if !l.ordered && l.items.len() == 2));
        assert!(matches!(&blocks[1], Block::List(l) if l.indent == 2));
        assert!(matches!(&blocks[2], Block::List(l) if l.ordered && l.start == 1));
    }

    #[test]
    fn markdown_table_with_separator() {
        let blocks = parse("| A | B |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |", RenderMode::Normal);
        assert_eq!(
            blocks,
            vec![Block::Table(Table {
                headers: Some(vec![text("A"), text("B")]),
                rows: vec![vec![text("1"), text("2")], vec![text("3"), text("4")]],
            })]
        );
    }

    #[test]
    fn markdown_table_without_separator_has_no_header() {
        let blocks = parse("intro\n| 1 | 2 |", RenderMode::Normal);
        assert_eq!(
            blocks[1],
            Block::Table(Table {
                headers: None,
                rows: vec![vec![text("1"), text("2")]],
            })
        );
    }

    #[test]
    fn legacy_table_header_only_on_first_line() {
        let blocks = parse("Name | Age\nAda | 36", RenderMode::Normal);
        assert_eq!(
            blocks,
            vec![Block::Table(Table {
                headers: Some(vec![text("Name"), text("Age")]),
                rows: vec![vec![text("Ada"), text("36")]],
            })]
        );

        let blocks = parse("People\nName | Age\nAda | 36", RenderMode::Normal);
        assert!(matches!(&blocks[1], Block::Table(t) if t.headers.is_none() && t.rows.len() == 2));
    }

    #[test]
    fn legacy_dot_table() {
        let blocks = parse("H . Hydrogen . 1\nHe . Helium . 2", RenderMode::Normal);
        assert_eq!(
            blocks,
            vec![Block::Table(Table {
                headers: Some(vec![text("H"), text("Hydrogen"), text("1")]),
                rows: vec![vec![text("He"), text("Helium"), text("2")]],
            })]
        );
    }

    #[test]
    fn blank_line_ends_tables() {
        let blocks = parse("a | b\n\nc | d", RenderMode::Normal);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| matches!(b, Block::Table(_))));
    }

    #[test]
    fn headings_quotes_and_rules_flush_lists() {
        let blocks = parse("- a\n# H\n> quote\n***\n- b", RenderMode::Normal);
        assert_eq!(
            blocks,
            vec![
                Block::List(List {
                    ordered: false,
                    start: 1,
                    indent: 0,
                    items: items(&["a"]),
                }),
                Block::Heading {
                    level: 1,
                    content: text("H")
                },
                Block::Blockquote {
                    content: text("quote")
                },
                Block::Rule,
                Block::List(List {
                    ordered: false,
                    start: 1,
                    indent: 0,
                    items: items(&["b"]),
                }),
            ]
        );
    }

    #[test]
    fn bracket_lines_are_skipped() {
        let blocks = parse("[\nx^2 + 1 = y\n]", RenderMode::Math);
        assert_eq!(
            blocks,
            vec![Block::MathBlock {
                latex: "x^2 + 1 = y".to_string()
            }]
        );
    }

    #[test]
    fn bracketed_math_line_becomes_math_block() {
        assert_eq!(
            parse("[x^2 + y^2 = 4]", RenderMode::Math),
            vec![Block::MathBlock {
                latex: "x^2 + y^2 = 4".to_string()
            }]
        );
    }

    #[test]
    fn bracketed_math_line_in_normal_mode_is_text() {
        assert_eq!(
            parse("[x^2 + y^2 = 4]", RenderMode::Normal),
            vec![Block::Paragraph {
                content: text("x² + y² = 4")
            }]
        );
    }

    #[test]
    fn fenced_display_math() {
        let blocks = parse("Solve:\n$$\n\\left( a +\nb\n$$\ndone", RenderMode::Math);
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph {
                    content: text("Solve:")
                },
                Block::MathBlock {
                    latex: "\\left( a +\nb\\right.".to_string()
                },
                Block::Paragraph {
                    content: text("done")
                },
            ]
        );
    }

    #[test]
    fn unterminated_math_fence_is_closed() {
        assert_eq!(
            parse("$$\nx^2", RenderMode::Math),
            vec![Block::MathBlock {
                latex: "x^2".to_string()
            }]
        );
    }

    #[test]
    fn math_fence_in_normal_mode_is_converted_text() {
        assert_eq!(
            parse("$$\n\\frac{1}{2}\n$$", RenderMode::Normal),
            vec![Block::Paragraph {
                content: text("1/2")
            }]
        );
        assert_eq!(
            parse("before\n$$\nx^2\n  + 1\n", RenderMode::Normal),
            vec![
                Block::Paragraph {
                    content: text("before")
                },
                Block::Paragraph {
                    content: text("x² + 1")
                },
            ]
        );
    }

    #[test]
    fn empty_math_fence_is_dropped() {
        assert_eq!(
            parse("$$\n\n$$\nafter", RenderMode::Math),
            vec![Block::Paragraph {
                content: text("after")
            }]
        );
        assert_eq!(
            parse("$$", RenderMode::Normal),
            vec![Block::Paragraph {
                content: text(EMPTY_PLACEHOLDER)
            }]
        );
    }

    #[test]
    fn whole_line_math_with_markdown_is_demoted() {
        assert_eq!(
            parse("$# Heading$", RenderMode::Math),
            vec![Block::Paragraph {
                content: text("# Heading")
            }]
        );
        assert_eq!(
            parse("$$- item one$$", RenderMode::Math),
            vec![Block::Paragraph {
                content: text("- item one")
            }]
        );
        assert_eq!(
            parse("$**bold**$", RenderMode::Math),
            vec![Block::Paragraph {
                content: vec![Span::Bold {
                    content: text("bold")
                }]
            }]
        );
        assert_eq!(
            parse("[**x** + 1]", RenderMode::Math),
            vec![Block::Paragraph {
                content: vec![
                    Span::Bold {
                        content: text("x")
                    },
                    Span::text(" + 1"),
                ]
            }]
        );
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn flushes_are_logged_at_debug() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            parse("- a\n\n| x | y |", RenderMode::Normal);
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("flushing list"), "{output}");
        assert!(output.contains("flushing table"), "{output}");
    }

    #[test]
    fn empty_input_gives_placeholder() {
        for source in ["", "   ", "\n\n", "[\n]"] {
            assert_eq!(
                parse(source, RenderMode::Normal),
                vec![Block::Paragraph {
                    content: text(EMPTY_PLACEHOLDER)
                }]
            );
        }
    }

    #[test]
    fn code_mode_is_verbatim() {
        let source = "# not a heading\n  - *raw* $x$\n";
        assert_eq!(
            parse(source, RenderMode::Code),
            vec![Block::CodeBlock {
                content: source.to_string()
            }]
        );
        assert_eq!(
            parse("", RenderMode::Code),
            vec![Block::CodeBlock {
                content: String::new()
            }]
        );
    }
}
