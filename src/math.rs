//! Math detection and normalization.
//!
//! Everything here is heuristic: input is never rejected, malformed LaTeX is
//! passed through with only two repairs applied (closing unterminated
//! delimiters and padding unmatched `\left`).

use std::sync::LazyLock;

use regex::Regex;

use crate::unicode::convert_latex_to_unicode;

/// Inline spans longer than this are shown as display math.
const INLINE_MATH_MAX_CHARS: usize = 50;

/// Longest line still considered for bare formula detection.
const STANDALONE_MATH_MAX_CHARS: usize = 120;

static LATEX_COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+").unwrap());

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]{3,}").unwrap());

static BLOCK_MACRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:frac|sum|prod|int|lim|partial|nabla)(?:[^A-Za-z]|$)").unwrap()
});

static RELATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=|\\(?:neq|ne|leq|le|geq|ge|approx|equiv)(?:[^A-Za-z]|$)").unwrap()
});

static MARKDOWN_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:#{1,6}(?:\s|$)|[-*+]\s|\d+\.\s|>)").unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)").unwrap());

/// A run of text produced by [`scan_math`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathSegment<'a> {
    Text(&'a str),
    Math {
        content: &'a str,
        display: bool,
        closed: bool,
    },
}

/// Splits `text` into plain runs and `$` / `$$` math spans.
///
/// `$$` is only closed by `$$`, `$` by the next `$`. Outside math, `\$` is a
/// literal dollar and backtick code spans are skipped over whole.
pub(crate) fn scan_math(text: &str) -> Vec<MathSegment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut open: Option<bool> = None;
    let mut i = 0;

    while i < bytes.len() {
        match (open, bytes[i]) {
            (None, b'\\') if bytes.get(i + 1) == Some(&b'$') => i += 2,
            (None, b'`') => match text[i + 1..].find('`') {
                Some(end) => i += end + 2,
                None => i += 1,
            },
            (None, b'$') => {
                if start < i {
                    segments.push(MathSegment::Text(&text[start..i]));
                }
                let display = bytes.get(i + 1) == Some(&b'$');
                i += if display { 2 } else { 1 };
                start = i;
                open = Some(display);
            }
            (Some(true), b'$') if bytes.get(i + 1) == Some(&b'$') => {
                segments.push(MathSegment::Math {
                    content: &text[start..i],
                    display: true,
                    closed: true,
                });
                i += 2;
                start = i;
                open = None;
            }
            (Some(false), b'$') => {
                segments.push(MathSegment::Math {
                    content: &text[start..i],
                    display: false,
                    closed: true,
                });
                i += 1;
                start = i;
                open = None;
            }
            _ => i += 1,
        }
    }

    match open {
        Some(display) => segments.push(MathSegment::Math {
            content: &text[start..],
            display,
            closed: false,
        }),
        None if start < text.len() => segments.push(MathSegment::Text(&text[start..])),
        None => {}
    }

    segments
}

fn push_span(out: &mut String, content: &str, display: bool) {
    let delimiter = if display { "$$" } else { "$" };
    out.push_str(delimiter);
    out.push_str(content);
    // A trailing `$` would merge with the closing delimiter.
    if display && content.ends_with('$') {
        out.push(' ');
    }
    out.push_str(delimiter);
}

/// Closes every unterminated `$` / `$$` span at the end of the text.
///
/// An unterminated opener with nothing after it is dropped instead, since
/// closing it would produce a new opener.
pub fn normalize_math_delimiters(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for segment in scan_math(text) {
        match segment {
            MathSegment::Text(t) => out.push_str(t),
            MathSegment::Math {
                content,
                display,
                closed,
            } => {
                if !closed && content.trim().is_empty() {
                    tracing::debug!("dropping empty unterminated math delimiter");
                    out.push_str(content);
                } else {
                    push_span(&mut out, content, display);
                }
            }
        }
    }
    out
}

/// Appends `\right.` for every `\left` without a partner.
///
/// Surplus `\right` tokens are kept as they are.
pub fn balance_left_right(latex: &str) -> String {
    let count = |name: &str| {
        LATEX_COMMAND_RE
            .find_iter(latex)
            .filter(|m| m.as_str() == name)
            .count()
    };
    let lefts = count(r"\left");
    let rights = count(r"\right");
    if lefts <= rights {
        return latex.to_string();
    }

    let mut out = latex.to_string();
    if out.ends_with('\\') {
        out.push(' ');
    }
    for _ in rights..lefts {
        out.push_str(r"\right.");
    }
    out
}

/// Splits a delimited span into its content and display flag.
fn unwrap_span(span: &str) -> Option<(&str, bool)> {
    if span.len() >= 4 {
        if let Some(inner) = span.strip_prefix("$$").and_then(|s| s.strip_suffix("$$")) {
            return Some((inner, true));
        }
    }
    if span.len() >= 2 {
        if let Some(inner) = span.strip_prefix('$').and_then(|s| s.strip_suffix('$')) {
            return Some((inner, false));
        }
    }
    None
}

fn looks_like_markdown(content: &str) -> bool {
    let trimmed = content.trim();
    MARKDOWN_START_RE.is_match(trimmed)
        || trimmed.contains("**")
        || trimmed.contains("```")
        || (trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.contains(" | "))
}

/// Returns the bare content of a math span that actually holds markdown.
pub fn reject_markdown_in_math(span: &str) -> String {
    match unwrap_span(span) {
        Some((content, _)) if looks_like_markdown(content) => {
            tracing::debug!(content, "demoting math span that contains markdown");
            content.to_string()
        }
        _ => span.to_string(),
    }
}

fn is_complex(content: &str) -> bool {
    content.contains('\n')
        || BLOCK_MACRO_RE.is_match(content)
        || RELATION_RE.is_match(content)
        || content.chars().count() > INLINE_MATH_MAX_CHARS
}

/// Rewraps an inline `$...$` span as display math when it is too involved
/// to read inline.
pub fn promote_complex_inline_to_block(span: &str) -> String {
    match unwrap_span(span) {
        Some((content, false)) if is_complex(content) => format!("$${content}$$"),
        _ => span.to_string(),
    }
}

fn has_bare_words(text: &str) -> bool {
    WORD_RE.is_match(&LATEX_COMMAND_RE.replace_all(text, " "))
}

/// Wraps a delimiter-free line in `$$` when it is made of LaTeX commands,
/// symbols and short identifiers only.
pub fn auto_wrap_bare_math(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || line.contains('$')
        || !LATEX_COMMAND_RE.is_match(line)
        || has_bare_words(line)
        || URL_RE.is_match(line)
    {
        return line.to_string();
    }
    format!("$${trimmed}$$")
}

fn is_math_char(c: char) -> bool {
    matches!(c, '\\' | '^' | '_' | '{' | '}' | '(' | ')' | '=' | '<' | '>')
        || c.is_ascii_digit()
        || is_math_symbol(c)
}

fn is_math_symbol(c: char) -> bool {
    "±∓×÷·∘≤≥≠≈≡∼∝∞∑∏∫∮√∂∇∈∉⊂⊆⊃⊇∪∩∅∀∃¬∧∨→←↔⇒⇐⇔⟹⟺πθαβγδελμσφωΔΣΩΓΘΛΠΦΨ°⁰¹²³⁴⁵⁶⁷⁸⁹⁺⁻₀₁₂₃₄₅₆₇₈₉ℝℕℤℚℂ"
        .contains(c)
}

/// Operator-like characters that mark a bare line as a formula.
fn is_math_operator(c: char) -> bool {
    matches!(c, '\\' | '^' | '_' | '{' | '}' | '=' | '<' | '>') || is_math_symbol(c)
}

/// Bracketed content worth treating as math: longer than two characters
/// with at least one math-class character.
pub fn is_math_like(content: &str) -> bool {
    content.chars().count() > 2 && content.chars().any(is_math_char)
}

fn has_markdown_marker(line: &str) -> bool {
    MARKDOWN_START_RE.is_match(line)
        || line.contains("**")
        || line.contains('`')
        || line.contains('|')
        || line.contains("](")
}

/// Extracts the LaTeX of a line that is nothing but math.
pub(crate) fn standalone_math(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let bracketed = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']'));
    let display = trimmed.strip_prefix(r"\[").and_then(|s| s.strip_suffix(r"\]"));
    let delimited = if let Some(inner) = bracketed {
        Some((!inner.contains(['[', ']']) && is_math_like(inner)).then_some(inner))
    } else if let Some(inner) = display {
        Some(Some(inner))
    } else if trimmed.starts_with('$') {
        Some(match scan_math(trimmed).as_slice() {
            [MathSegment::Math {
                content,
                closed: true,
                ..
            }] if !content.trim().is_empty() => Some(*content),
            _ => None,
        })
    } else {
        None
    };

    if let Some(inner) = delimited {
        return inner
            .filter(|inner| !looks_like_markdown(inner))
            .map(|inner| inner.trim().to_string());
    }

    let bare = trimmed.chars().count() <= STANDALONE_MATH_MAX_CHARS
        && !trimmed.contains('$')
        && !has_markdown_marker(trimmed)
        && !URL_RE.is_match(trimmed)
        && trimmed.chars().any(is_math_operator)
        && !has_bare_words(trimmed);
    bare.then(|| trimmed.to_string())
}

/// True when the line holds a formula and nothing else.
pub fn detect_standalone_math_line(line: &str) -> bool {
    standalone_math(line).is_some()
}

/// Rewrites `text` outside backtick code spans.
fn map_outside_code(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('`') {
        let Some(close) = rest[open + 1..].find('`') else {
            break;
        };
        let close = open + 1 + close;
        out.push_str(&f(&rest[..open]));
        out.push_str(&rest[open..=close]);
        rest = &rest[close + 1..];
    }
    out.push_str(&f(rest));
    out
}

/// Applies `replace` to every math-like `[...]` span that is not a link.
fn rewrite_bracket_math(text: &str, replace: impl Fn(&str) -> String) -> String {
    map_outside_code(text, |run| {
        let mut out = String::with_capacity(run.len());
        let mut rest = run;
        while let Some(open) = rest.find('[') {
            let after = &rest[open + 1..];
            let Some(close) = after.find(']') else {
                break;
            };
            let inner = &after[..close];
            let tail = &after[close + 1..];
            out.push_str(&rest[..open]);
            if inner.contains('[') {
                // Restart from the innermost opening bracket.
                out.push('[');
                rest = after;
                continue;
            }
            if !tail.starts_with('(') && is_math_like(inner) {
                out.push_str(&replace(inner));
            } else {
                out.push('[');
                out.push_str(inner);
                out.push(']');
            }
            rest = tail;
        }
        out.push_str(rest);
        out
    })
}

/// Turns `\[..\]` and `\(..\)` into `$$..$$` and `$..$`.
fn convert_latex_delimiters(text: &str) -> String {
    map_outside_code(text, |run| {
        run.replace(r"\[", "$$")
            .replace(r"\]", "$$")
            .replace(r"\(", "$")
            .replace(r"\)", "$")
    })
}

/// Prepares a line for math mode: every math region ends up in a closed,
/// canonical `$` / `$$` span.
pub(crate) fn prepare_math_line(line: &str) -> String {
    let line = convert_latex_delimiters(line);
    let line = rewrite_bracket_math(&line, |inner| format!("${inner}$"));
    let line = auto_wrap_bare_math(&line);
    let line = normalize_math_delimiters(&line);

    let mut out = String::with_capacity(line.len());
    for segment in scan_math(&line) {
        match segment {
            MathSegment::Text(t) => out.push_str(t),
            MathSegment::Math {
                content, display, ..
            } => {
                if looks_like_markdown(content) {
                    tracing::debug!(content, "demoting math span that contains markdown");
                    out.push_str(content);
                    continue;
                }
                let display = display || is_complex(content);
                push_span(&mut out, &balance_left_right(content), display);
            }
        }
    }
    out
}

/// Prepares a line for the plain presentation: macros become glyphs and
/// math-like brackets are dropped.
pub(crate) fn prepare_plain_line(line: &str) -> String {
    let line = convert_latex_delimiters(line);
    let line = map_outside_code(&line, convert_latex_to_unicode);
    rewrite_bracket_math(&line, str::to_string)
}
