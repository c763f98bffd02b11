//! LaTeX to Unicode approximation used by the plain-text presentation mode.

use std::sync::LazyLock;

/// Macro names without the leading backslash. Order here is irrelevant,
/// [`SYMBOLS`] sorts them longest first.
const SYMBOL_TABLE: &[(&str, &str)] = &[
    // Relations
    ("leq", "≤"),
    ("le", "≤"),
    ("geq", "≥"),
    ("ge", "≥"),
    ("neq", "≠"),
    ("ne", "≠"),
    ("approx", "≈"),
    ("equiv", "≡"),
    ("sim", "∼"),
    ("propto", "∝"),
    ("perp", "⊥"),
    ("parallel", "∥"),
    // Operators
    ("pm", "±"),
    ("mp", "∓"),
    ("times", "×"),
    ("div", "÷"),
    ("cdot", "·"),
    ("circ", "∘"),
    ("infty", "∞"),
    ("partial", "∂"),
    ("nabla", "∇"),
    ("sum", "∑"),
    ("prod", "∏"),
    ("int", "∫"),
    ("oint", "∮"),
    ("angle", "∠"),
    ("degree", "°"),
    // Sets and logic
    ("in", "∈"),
    ("notin", "∉"),
    ("subset", "⊂"),
    ("subseteq", "⊆"),
    ("supset", "⊃"),
    ("supseteq", "⊇"),
    ("cup", "∪"),
    ("cap", "∩"),
    ("emptyset", "∅"),
    ("forall", "∀"),
    ("exists", "∃"),
    ("neg", "¬"),
    ("land", "∧"),
    ("lor", "∨"),
    ("therefore", "∴"),
    ("because", "∵"),
    // Arrows
    ("to", "→"),
    ("rightarrow", "→"),
    ("leftarrow", "←"),
    ("leftrightarrow", "↔"),
    ("Rightarrow", "⇒"),
    ("Leftarrow", "⇐"),
    ("Leftrightarrow", "⇔"),
    ("implies", "⟹"),
    ("iff", "⟺"),
    // Dots and spacing
    ("ldots", "…"),
    ("dots", "…"),
    ("cdots", "⋯"),
    ("quad", " "),
    ("qquad", "  "),
    // Sizing commands carry no glyph of their own
    ("left", ""),
    ("right", ""),
    // Named functions
    ("lim", "lim"),
    ("log", "log"),
    ("ln", "ln"),
    ("exp", "exp"),
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("max", "max"),
    ("min", "min"),
    // Greek
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ε"),
    ("varepsilon", "ε"),
    ("zeta", "ζ"),
    ("eta", "η"),
    ("theta", "θ"),
    ("iota", "ι"),
    ("kappa", "κ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("pi", "π"),
    ("rho", "ρ"),
    ("sigma", "σ"),
    ("tau", "τ"),
    ("phi", "φ"),
    ("varphi", "φ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("omega", "ω"),
    ("Gamma", "Γ"),
    ("Delta", "Δ"),
    ("Theta", "Θ"),
    ("Lambda", "Λ"),
    ("Pi", "Π"),
    ("Sigma", "Σ"),
    ("Phi", "Φ"),
    ("Psi", "Ψ"),
    ("Omega", "Ω"),
];

/// Longest names first, so `\geq` is never read as `\ge` followed by `q`.
static SYMBOLS: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut table = SYMBOL_TABLE.to_vec();
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    table
});

/// Brace groups nested deeper than this are copied through unconverted.
const MAX_GROUP_DEPTH: usize = 32;

/// What an open brace group turns into once its `}` is reached.
#[derive(Debug)]
enum Group {
    Plain,
    Sqrt,
    FracNumerator,
    FracDenominator(String),
    Mathbb,
    Script(char),
}

#[derive(Debug)]
struct Frame {
    group: Group,
    out: String,
}

impl Frame {
    fn new(group: Group) -> Self {
        Self {
            group,
            out: String::new(),
        }
    }
}

/// Replace LaTeX macros, square roots, fractions and digit scripts with
/// their closest Unicode rendering. Unknown commands are left untouched.
///
/// Single pass over the input with an explicit stack of open brace groups.
/// Groups still open at the end are written back with their opener.
pub fn convert_latex_to_unicode(text: &str) -> String {
    // The root frame is never popped.
    let mut stack = vec![Frame::new(Group::Plain)];
    // Braces opened past the depth limit, copied as text.
    let mut literal_depth = 0usize;
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        let after = &rest[ch.len_utf8()..];
        let can_open = literal_depth == 0 && stack.len() <= MAX_GROUP_DEPTH;

        match ch {
            '\\' => {
                if can_open {
                    if let Some((group, inner)) = group_command(after) {
                        stack.push(Frame::new(group));
                        rest = inner;
                        continue;
                    }
                }
                if let Some((symbol, remaining)) = lookup_symbol(after) {
                    top(&mut stack).push_str(symbol);
                    rest = remaining;
                } else {
                    top(&mut stack).push('\\');
                    rest = after;
                }
            }
            '^' | '_' if can_open && after.starts_with('{') => {
                stack.push(Frame::new(Group::Script(ch)));
                rest = &after[1..];
            }
            '^' | '_' => {
                let map = if ch == '^' { superscript } else { subscript };
                match after.chars().next().filter(char::is_ascii_digit).and_then(map) {
                    Some(scripted) => {
                        top(&mut stack).push(scripted);
                        rest = &after[1..];
                    }
                    None => {
                        top(&mut stack).push(ch);
                        rest = after;
                    }
                }
            }
            '{' if can_open => {
                stack.push(Frame::new(Group::Plain));
                rest = after;
            }
            '{' => {
                literal_depth += 1;
                top(&mut stack).push('{');
                rest = after;
            }
            '}' if literal_depth > 0 => {
                literal_depth -= 1;
                top(&mut stack).push('}');
                rest = after;
            }
            '}' if stack.len() > 1 => {
                rest = close_group(&mut stack, after);
            }
            _ => {
                top(&mut stack).push(ch);
                rest = after;
            }
        }
    }

    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            let parent = top(&mut stack);
            push_opener(&frame.group, parent);
            parent.push_str(&frame.out);
        }
    }
    stack.pop().map(|root| root.out).unwrap_or_default()
}

fn top(stack: &mut [Frame]) -> &mut String {
    let last = stack.len() - 1;
    &mut stack[last].out
}

/// `input` starts right after a backslash. Matches a command taking a brace
/// group and returns the text after its `{`.
fn group_command(input: &str) -> Option<(Group, &str)> {
    let (group, rest) = if let Some(rest) = strip_command(input, "sqrt") {
        (Group::Sqrt, rest)
    } else if let Some(rest) = strip_command(input, "frac") {
        (Group::FracNumerator, rest)
    } else {
        (Group::Mathbb, strip_command(input, "mathbb")?)
    };
    Some((group, rest.strip_prefix('{')?))
}

/// `input` starts right after a backslash.
fn lookup_symbol(input: &str) -> Option<(&'static str, &str)> {
    SYMBOLS
        .iter()
        .find_map(|(name, symbol)| strip_command(input, name).map(|rest| (*symbol, rest)))
}

/// Pops the innermost group at its `}` and writes the converted group into
/// the enclosing one. Returns the remaining input.
fn close_group<'a>(stack: &mut Vec<Frame>, after: &'a str) -> &'a str {
    let Some(Frame { group, out: inner }) = stack.pop() else {
        return after;
    };

    if let Group::FracNumerator = group {
        if let Some(denominator) = after.strip_prefix('{') {
            stack.push(Frame::new(Group::FracDenominator(inner)));
            return denominator;
        }
    }

    let parent = top(stack);
    match group {
        Group::Plain => {
            parent.push('{');
            parent.push_str(&inner);
            parent.push('}');
        }
        Group::Sqrt => {
            parent.push_str("√(");
            parent.push_str(&inner);
            parent.push(')');
        }
        Group::FracNumerator => {
            parent.push_str("\\frac{");
            parent.push_str(&inner);
            parent.push('}');
        }
        Group::FracDenominator(numerator) => {
            parent.push_str(&format!("{}/{}", operand(&numerator), operand(&inner)));
        }
        Group::Mathbb => parent.extend(inner.chars().map(double_struck)),
        Group::Script(marker) => {
            let map = if marker == '^' { superscript } else { subscript };
            let scripted: Option<String> = if inner.is_empty() {
                None
            } else {
                inner.chars().map(map).collect()
            };
            match scripted {
                Some(s) => parent.push_str(&s),
                None => {
                    parent.push(marker);
                    parent.push('{');
                    parent.push_str(&inner);
                    parent.push('}');
                }
            }
        }
    }
    after
}

fn push_opener(group: &Group, out: &mut String) {
    match group {
        Group::Plain => out.push('{'),
        Group::Sqrt => out.push_str("\\sqrt{"),
        Group::FracNumerator => out.push_str("\\frac{"),
        Group::FracDenominator(numerator) => {
            out.push_str("\\frac{");
            out.push_str(numerator);
            out.push_str("}{");
        }
        Group::Mathbb => out.push_str("\\mathbb{"),
        Group::Script(marker) => {
            out.push(*marker);
            out.push('{');
        }
    }
}

/// Strips `name` when it is a whole command name, i.e. not followed by
/// another ASCII letter.
fn strip_command<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(name)?;
    match rest.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => None,
        _ => Some(rest),
    }
}

fn operand(text: &str) -> String {
    if text.chars().count() <= 1 {
        text.to_string()
    } else {
        format!("({text})")
    }
}

fn superscript(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        'i' => 'ⁱ',
        _ => return None,
    })
}

fn subscript(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        _ => return None,
    })
}

fn double_struck(c: char) -> char {
    match c {
        'C' => 'ℂ',
        'H' => 'ℍ',
        'N' => 'ℕ',
        'P' => 'ℙ',
        'Q' => 'ℚ',
        'R' => 'ℝ',
        'Z' => 'ℤ',
        'A'..='Z' => char::from_u32(0x1D538 + (c as u32 - 'A' as u32)).unwrap_or(c),
        'a'..='z' => char::from_u32(0x1D552 + (c as u32 - 'a' as u32)).unwrap_or(c),
        '0'..='9' => char::from_u32(0x1D7D8 + (c as u32 - '0' as u32)).unwrap_or(c),
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn sqrt_with_superscript() {
        assert_eq!(convert_latex_to_unicode(r"\sqrt{x^2+1}"), "√(x²+1)");
    }

    #[test]
    fn nested_sqrt() {
        assert_eq!(convert_latex_to_unicode(r"\sqrt{1+\sqrt{x}}"), "√(1+√(x))");
    }

    #[test]
    fn unbalanced_sqrt_is_left_alone() {
        assert_eq!(convert_latex_to_unicode(r"\sqrt{x"), r"\sqrt{x");
    }

    #[test]
    fn prefix_commands_do_not_collide() {
        assert_eq!(convert_latex_to_unicode(r"a \geq b \ge c"), "a ≥ b ≥ c");
        assert_eq!(convert_latex_to_unicode(r"\int_0^1 \infty \in"), "∫₀¹ ∞ ∈");
        assert_eq!(convert_latex_to_unicode(r"x \leftarrow y"), "x ← y");
    }

    #[test]
    fn unknown_command_untouched() {
        assert_eq!(convert_latex_to_unicode(r"\foo + \alpha"), r"\foo + α");
    }

    #[test]
    fn greek_and_sets() {
        assert_eq!(
            convert_latex_to_unicode(r"\forall x \in \mathbb{R}, \Delta \neq \emptyset"),
            "∀ x ∈ ℝ, Δ ≠ ∅"
        );
    }

    #[test]
    fn fractions() {
        assert_eq!(convert_latex_to_unicode(r"\frac{1}{2}"), "1/2");
        assert_eq!(convert_latex_to_unicode(r"\frac{a+b}{c}"), "(a+b)/c");
    }

    #[test]
    fn scripts() {
        assert_eq!(convert_latex_to_unicode("x^{10} + a_1 + b_{23}"), "x¹⁰ + a₁ + b₂₃");
        assert_eq!(convert_latex_to_unicode("e^{x}"), "e^{x}");
        assert_eq!(convert_latex_to_unicode("x^{}"), "x^{}");
    }

    #[test]
    fn left_right_dropped() {
        assert_eq!(convert_latex_to_unicode(r"\left( x \right)"), "( x )");
    }

    #[test]
    fn deep_nesting_is_copied_past_the_limit() {
        let depth = 10_000;
        let source = format!("{}x{}", r"\sqrt{".repeat(depth), "}".repeat(depth));
        let literal = depth - MAX_GROUP_DEPTH;
        let expected = format!(
            "{}{}x{}{}",
            "√(".repeat(MAX_GROUP_DEPTH),
            r"\sqrt{".repeat(literal),
            "}".repeat(literal),
            ")".repeat(MAX_GROUP_DEPTH)
        );
        assert_eq!(convert_latex_to_unicode(&source), expected);
    }

    #[test]
    fn long_unclosed_input_is_returned_as_is() {
        let source = r"\sqrt{".repeat(20_000);
        assert_eq!(convert_latex_to_unicode(&source), source);

        let braces = format!("x^{{{}", "{".repeat(20_000));
        assert_eq!(convert_latex_to_unicode(&braces), braces);
    }

    #[test]
    fn unclosed_fraction_keeps_numerator() {
        assert_eq!(convert_latex_to_unicode(r"\frac{1}{2"), r"\frac{1}{2");
        assert_eq!(convert_latex_to_unicode(r"\frac{1} x"), r"\frac{1} x");
    }

    proptest! {
        #[test]
        fn conversion_is_idempotent(s in "[a-zA-Z0-9 +=^_{}()αβπ√²≤.-]{0,40}") {
            let once = convert_latex_to_unicode(&s);
            prop_assert_eq!(convert_latex_to_unicode(&once), once);
        }

        #[test]
        fn converted_commands_are_stable(s in r"(\\(alpha|geq|sqrt\{x\^2\}|frac\{1\}\{2\}|mathbb\{R\})| |[a-z0-9+=])*") {
            let once = convert_latex_to_unicode(&s);
            prop_assert_eq!(convert_latex_to_unicode(&once), once);
        }
    }
}
