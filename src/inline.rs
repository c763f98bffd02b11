use std::sync::LazyLock;

use regex::Regex;

use crate::block::{InlineRun, RenderMode, Span};
use crate::math::{self, MathSegment};

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\[\]]+)\]\(([^()\s]+)\)").unwrap());

/// A unit seen by the emphasis parser: a character that may be a delimiter,
/// or an already finished span that emphasis can wrap but never split.
#[derive(Debug, Clone)]
enum Tok {
    Char(char),
    Atom(Span),
}

impl Tok {
    fn is(&self, c: char) -> bool {
        matches!(self, Tok::Char(x) if *x == c)
    }

    fn is_whitespace(&self) -> bool {
        matches!(self, Tok::Char(c) if c.is_whitespace())
    }
}

/// Format one line or table cell into an inline span tree.
pub fn format_inline(text: &str, mode: RenderMode) -> InlineRun {
    let prepared = match mode {
        RenderMode::Normal => math::prepare_plain_line(text),
        RenderMode::Math => math::prepare_math_line(text),
        RenderMode::Code => return vec![Span::text(text)],
    };
    let tokens = tokenize(&prepared, mode);
    parse_emphasis(&tokens)
}

fn tokenize(text: &str, mode: RenderMode) -> Vec<Tok> {
    let mut toks = Vec::with_capacity(text.len());
    for segment in math::scan_math(text) {
        match segment {
            MathSegment::Text(t) => tokenize_text(t, mode, true, &mut toks),
            MathSegment::Math {
                content,
                display,
                closed: true,
            } if mode == RenderMode::Math => toks.push(Tok::Atom(Span::Math {
                latex: content.trim().to_string(),
                display,
            })),
            MathSegment::Math {
                content,
                closed: true,
                ..
            } => toks.extend(content.chars().map(Tok::Char)),
            MathSegment::Math {
                content, display, ..
            } => {
                let opener = if display { "$$" } else { "$" };
                toks.extend(opener.chars().chain(content.chars()).map(Tok::Char));
            }
        }
    }
    toks
}

fn tokenize_text(text: &str, mode: RenderMode, allow_links: bool, toks: &mut Vec<Tok>) {
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match ch {
            '`' => {
                if let Some(end) = rest[1..].find('`').filter(|&end| end > 0) {
                    toks.push(Tok::Atom(Span::Code {
                        code: rest[1..1 + end].to_string(),
                    }));
                    rest = &rest[end + 2..];
                    continue;
                }
            }
            '\\' if rest[1..].starts_with('$') => {
                // Math mode keeps the escape for the typesetter.
                if mode == RenderMode::Math {
                    toks.push(Tok::Char('\\'));
                }
                toks.push(Tok::Char('$'));
                rest = &rest[2..];
                continue;
            }
            '[' if allow_links => {
                if let Some(caps) = LINK_RE.captures(rest) {
                    let mut label = Vec::new();
                    tokenize_text(&caps[1], mode, false, &mut label);
                    toks.push(Tok::Atom(Span::Link {
                        url: caps[2].to_string(),
                        content: parse_emphasis(&label),
                    }));
                    rest = &rest[caps[0].len()..];
                    continue;
                }
            }
            _ => {}
        }
        toks.push(Tok::Char(ch));
        rest = &rest[ch.len_utf8()..];
    }
}

/// Builds spans from tokens: `***x***`, `**x**`, `*x*` and `~~x~~`.
/// Unmatched delimiters stay literal.
fn parse_emphasis(toks: &[Tok]) -> Vec<Span> {
    Emphasis::new(toks).parse(0, toks.len())
}

/// Emphasis matching over one token sequence. Closers are indexed up front
/// so each opener is resolved by lookup instead of a forward scan.
struct Emphasis<'a> {
    toks: &'a [Tok],
    /// Length of the star run starting at each position.
    run_from: Vec<usize>,
    /// Per width 1 to 3, the first valid star closer at or after each
    /// position, `toks.len()` when there is none.
    star_closers: [Vec<usize>; 3],
    /// First `~~` at or after each position.
    strike_closers: Vec<usize>,
}

impl<'a> Emphasis<'a> {
    fn new(toks: &'a [Tok]) -> Self {
        let n = toks.len();
        let mut run_from = vec![0; n + 1];
        for j in (0..n).rev() {
            if toks[j].is('*') {
                run_from[j] = run_from[j + 1] + 1;
            }
        }

        let mut star_closers = [vec![n; n + 1], vec![n; n + 1], vec![n; n + 1]];
        let mut strike_closers = vec![n; n + 1];
        for j in (0..n).rev() {
            for (index, next) in star_closers.iter_mut().enumerate() {
                next[j] = if can_close(toks, &run_from, j, index + 1) {
                    j
                } else {
                    next[j + 1]
                };
            }
            let pair = toks[j].is('~') && toks.get(j + 1).is_some_and(|t| t.is('~'));
            strike_closers[j] = if pair {
                j
            } else {
                strike_closers[j + 1]
            };
        }

        Self {
            toks,
            run_from,
            star_closers,
            strike_closers,
        }
    }

    fn parse(&self, start: usize, end: usize) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut text = String::new();
        let mut i = start;

        while i < end {
            let c = match &self.toks[i] {
                Tok::Atom(span) => {
                    flush_text(&mut text, &mut spans);
                    spans.push(span.clone());
                    i += 1;
                    continue;
                }
                Tok::Char(c) => *c,
            };

            let matched = match c {
                '*' => self.match_stars(i, end),
                '~' if i + 1 < end && self.toks[i + 1].is('~') => self.match_strike(i, end),
                _ => None,
            };

            if let Some((span, next)) = matched {
                flush_text(&mut text, &mut spans);
                spans.push(span);
                i = next;
            } else if c == '*' {
                // A failed opener of up to three stars gives up one star,
                // the stars after it may still open something shorter.
                let run = self.run(i, end);
                let literal = if run <= 3 { 1 } else { run };
                text.extend(std::iter::repeat_n('*', literal));
                i += literal;
            } else {
                text.push(c);
                i += 1;
            }
        }

        flush_text(&mut text, &mut spans);
        spans
    }

    fn run(&self, at: usize, end: usize) -> usize {
        self.run_from[at].min(end - at)
    }

    /// First closer of `width` in `from..end`.
    fn next_closer(&self, from: usize, end: usize, width: usize) -> Option<usize> {
        let j = self.star_closers[width - 1][from];
        if j + width <= end {
            return Some(j);
        }
        // A single star that ends the range closes even when the run goes on
        // past `end`.
        let last = end.checked_sub(1)?;
        (width == 1 && j >= end && last >= from && last >= 1 && {
            let prev = &self.toks[last - 1];
            self.toks[last].is('*') && !prev.is('*') && !prev.is_whitespace()
        })
        .then_some(last)
    }

    /// Closer of `width` for content starting at `start`. Content must be
    /// non-empty and must not begin with whitespace.
    fn closer(&self, start: usize, end: usize, width: usize) -> Option<usize> {
        if start >= end || self.toks[start].is_whitespace() {
            return None;
        }
        self.next_closer(start + 1, end, width)
    }

    /// Tries the emphasis forms that open at `i`, strongest first.
    fn match_stars(&self, i: usize, end: usize) -> Option<(Span, usize)> {
        match self.run(i, end) {
            1 => {
                let close = self.closer(i + 1, end, 1)?;
                let content = self.parse(i + 1, close);
                Some((Span::Italic { content }, close + 1))
            }
            2 => {
                let close = self.closer(i + 2, end, 2)?;
                let content = self.parse(i + 2, close);
                Some((Span::Bold { content }, close + 2))
            }
            3 => self.match_triple(i, end),
            _ => None,
        }
    }

    /// `***` opens bold and italic together. They may close together or one
    /// after the other, in either order.
    fn match_triple(&self, i: usize, end: usize) -> Option<(Span, usize)> {
        let start = i + 3;

        if let Some(close) = self.closer(start, end, 3) {
            let inner = self.parse(start, close);
            let span = Span::Bold {
                content: vec![Span::Italic { content: inner }],
            };
            return Some((span, close + 3));
        }

        if let Some(bold_close) = self.closer(start, end, 2) {
            if let Some(close) = self.next_closer(bold_close + 2, end, 1) {
                let mut content = vec![Span::Bold {
                    content: self.parse(start, bold_close),
                }];
                content.extend(self.parse(bold_close + 2, close));
                return Some((Span::Italic { content }, close + 1));
            }
        }

        let italic_close = self.closer(start, end, 1)?;
        let close = self.next_closer(italic_close + 1, end, 2)?;
        let mut content = vec![Span::Italic {
            content: self.parse(start, italic_close),
        }];
        content.extend(self.parse(italic_close + 1, close));
        Some((Span::Bold { content }, close + 2))
    }

    fn match_strike(&self, i: usize, end: usize) -> Option<(Span, usize)> {
        let start = i + 2;
        if start >= end || self.toks[start].is('~') {
            return None;
        }
        let close = self.strike_closers[start + 1];
        if close + 2 > end {
            return None;
        }
        let content = self.parse(start, close);
        Some((Span::Strikethrough { content }, close + 2))
    }
}

/// Whether the star at `j` can close emphasis of `width`: it follows
/// non-whitespace, and a single star must stand alone.
fn can_close(toks: &[Tok], run_from: &[usize], j: usize, width: usize) -> bool {
    let Some(prev) = j.checked_sub(1).map(|p| &toks[p]) else {
        return false;
    };
    if !toks[j].is('*') || prev.is_whitespace() {
        return false;
    }
    if width == 1 {
        run_from[j] == 1 && !prev.is('*')
    } else {
        run_from[j] >= width
    }
}

fn flush_text(text: &mut String, spans: &mut Vec<Span>) {
    if !text.is_empty() {
        spans.push(Span::text(std::mem::take(text)));
    }
}
