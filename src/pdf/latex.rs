//! LaTeX to Unicode approximation
//!
//! Not math typesetting: macros, Greek letters and operators map to Unicode
//! through fixed tables, `\frac`/`\sqrt` become linear text and scripts use
//! Unicode super/subscript characters where every char has one.

use crate::shared::errors::LatexError;

fn symbol(name: &str) -> Option<&'static str> {
    let s = match name {
        // Greek
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" => "ε",
        "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "vartheta" => "ϑ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "pi" => "π",
        "varpi" => "ϖ",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" => "φ",
        "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Xi" => "Ξ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Upsilon" => "Υ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        // Operators
        "times" => "×",
        "div" => "÷",
        "pm" => "±",
        "mp" => "∓",
        "cdot" => "·",
        "ast" => "∗",
        "circ" => "∘",
        "bullet" => "•",
        "sum" => "∑",
        "prod" => "∏",
        "int" => "∫",
        "iint" => "∬",
        "oint" => "∮",
        "partial" => "∂",
        "nabla" => "∇",
        "infty" => "∞",
        // Relations
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "neq" | "ne" => "≠",
        "approx" => "≈",
        "equiv" => "≡",
        "sim" => "∼",
        "simeq" => "≃",
        "propto" => "∝",
        "ll" => "≪",
        "gg" => "≫",
        "in" => "∈",
        "notin" => "∉",
        "ni" => "∋",
        "subset" => "⊂",
        "supset" => "⊃",
        "subseteq" => "⊆",
        "supseteq" => "⊇",
        "cup" => "∪",
        "cap" => "∩",
        "emptyset" | "varnothing" => "∅",
        "forall" => "∀",
        "exists" => "∃",
        "neg" | "lnot" => "¬",
        "land" | "wedge" => "∧",
        "lor" | "vee" => "∨",
        "perp" => "⊥",
        "parallel" => "∥",
        "angle" => "∠",
        // Arrows
        "to" | "rightarrow" => "→",
        "leftarrow" | "gets" => "←",
        "leftrightarrow" => "↔",
        "Rightarrow" | "implies" => "⇒",
        "Leftarrow" => "⇐",
        "Leftrightarrow" | "iff" => "⇔",
        "mapsto" => "↦",
        "uparrow" => "↑",
        "downarrow" => "↓",
        // Misc
        "ldots" | "dots" | "cdots" => "…",
        "prime" => "′",
        "degree" => "°",
        "hbar" => "ℏ",
        "ell" => "ℓ",
        "Re" => "ℜ",
        "Im" => "ℑ",
        "aleph" => "ℵ",
        "langle" => "⟨",
        "rangle" => "⟩",
        "lfloor" => "⌊",
        "rfloor" => "⌋",
        "lceil" => "⌈",
        "rceil" => "⌉",
        "{" => "{",
        "}" => "}",
        "%" => "%",
        "$" => "$",
        "&" => "&",
        "#" => "#",
        "_" => "_",
        "|" => "‖",
        // Spacing
        "," | ";" | ":" | "!" | " " => " ",
        "quad" => "  ",
        "qquad" => "    ",
        // Named functions print as-is
        "sin" => "sin",
        "cos" => "cos",
        "tan" => "tan",
        "log" => "log",
        "ln" => "ln",
        "exp" => "exp",
        "lim" => "lim",
        "max" => "max",
        "min" => "min",
        "det" => "det",
        _ => return None,
    };
    Some(s)
}

fn double_struck(c: char) -> Option<char> {
    Some(match c {
        'R' => 'ℝ',
        'N' => 'ℕ',
        'Z' => 'ℤ',
        'Q' => 'ℚ',
        'C' => 'ℂ',
        'P' => 'ℙ',
        'H' => 'ℍ',
        _ => return None,
    })
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
        '-' | '−' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        'i' => 'ⁱ',
        'T' => 'ᵀ',
        'x' => 'ˣ',
        'y' => 'ʸ',
        'a' => 'ᵃ',
        'b' => 'ᵇ',
        'k' => 'ᵏ',
        '′' => '′',
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
        '-' | '−' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'n' => 'ₙ',
        'o' => 'ₒ',
        'x' => 'ₓ',
        't' => 'ₜ',
        _ => return None,
    })
}

/// Convert a formula body (without `$` delimiters) to Unicode text
pub fn latex_to_unicode(source: &str) -> Result<String, LatexError> {
    if source.trim().is_empty() {
        return Err(LatexError::Empty);
    }
    check_braces(source)?;
    let chars: Vec<char> = source.chars().collect();
    let mut parser = Parser { chars: &chars, pos: 0, depth: 0 };
    let out = parser.parse_until(None)?;
    Ok(collapse_spaces(&out))
}

fn check_braces(source: &str) -> Result<(), LatexError> {
    let mut depth: i32 = 0;
    let mut escaped = false;
    for c in source.chars() {
        match c {
            '\\' if !escaped => {
                escaped = true;
                continue;
            }
            '{' if !escaped => depth += 1,
            '}' if !escaped => {
                depth -= 1;
                if depth < 0 {
                    return Err(LatexError::UnbalancedBraces);
                }
            }
            _ => {}
        }
        escaped = false;
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(LatexError::UnbalancedBraces)
    }
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.trim().chars() {
        if c == ' ' {
            if !last_space {
                out.push(c);
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Deepest group/macro nesting accepted before giving up
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_until(&mut self, end: Option<char>) -> Result<String, LatexError> {
        self.nested(|parser| parser.parse_group(end))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, LatexError>) -> Result<T, LatexError> {
        if self.depth >= MAX_NESTING {
            return Err(LatexError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_group(&mut self, end: Option<char>) -> Result<String, LatexError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if Some(c) == end {
                self.pos += 1;
                return Ok(out);
            }
            self.pos += 1;
            match c {
                '\\' => out.push_str(&self.command()?),
                '{' => out.push_str(&self.parse_until(Some('}'))?),
                '^' => {
                    let arg = self.argument("^")?;
                    out.push_str(&script(&arg, superscript, '^'));
                }
                '_' => {
                    let arg = self.argument("_")?;
                    out.push_str(&script(&arg, subscript, '_'));
                }
                '&' => out.push(' '),
                '~' => out.push(' '),
                '-' => out.push('−'),
                '\n' | '\t' => out.push(' '),
                other => out.push(other),
            }
        }
        match end {
            Some(_) => Err(LatexError::UnbalancedBraces),
            None => Ok(out),
        }
    }

    /// Braced group or single token following a macro or script marker
    fn argument(&mut self, owner: &str) -> Result<String, LatexError> {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.parse_until(Some('}'))
            }
            Some('\\') => {
                self.pos += 1;
                self.command()
            }
            Some('}') | None => Err(LatexError::MissingArgument(owner.to_string())),
            Some(c) => {
                self.pos += 1;
                Ok(c.to_string())
            }
        }
    }

    fn optional_argument(&mut self) -> Result<Option<String>, LatexError> {
        if self.peek() != Some('[') {
            return Ok(None);
        }
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == ']' {
                return Ok(Some(out));
            }
            out.push(c);
        }
        Err(LatexError::MissingArgument("]".to_string()))
    }

    fn command_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if name.is_empty() {
            if let Some(c) = self.peek() {
                self.pos += 1;
                name.push(c);
            }
        }
        name
    }

    fn command(&mut self) -> Result<String, LatexError> {
        self.nested(|parser| parser.expand_command())
    }

    fn expand_command(&mut self) -> Result<String, LatexError> {
        let name = self.command_name();
        match name.as_str() {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.argument(&name)?;
                let den = self.argument(&name)?;
                Ok(format!("{}/{}", wrap_compound(&num), wrap_compound(&den)))
            }
            "sqrt" => {
                let index = self.optional_argument()?;
                let body = self.argument("sqrt")?;
                let root = match index.as_deref() {
                    Some("3") => "∛",
                    Some("4") => "∜",
                    _ => "√",
                };
                Ok(format!("{}{}", root, wrap_compound(&body)))
            }
            "mathbb" => {
                let body = self.argument("mathbb")?;
                Ok(body.chars().map(|c| double_struck(c).unwrap_or(c)).collect())
            }
            "text" | "mathrm" | "mathbf" | "mathit" | "mathsf" | "mathtt" | "textbf" | "textit" | "operatorname"
            | "boldsymbol" | "mathcal" => self.argument(&name),
            "vec" => Ok(format!("{}\u{20D7}", self.argument("vec")?)),
            "hat" => Ok(format!("{}\u{0302}", self.argument("hat")?)),
            "bar" | "overline" => Ok(format!("{}\u{0305}", self.argument(&name)?)),
            "dot" => Ok(format!("{}\u{0307}", self.argument("dot")?)),
            "left" | "right" | "big" | "Big" | "bigg" | "Bigg" | "displaystyle" | "limits" => Ok(String::new()),
            "\\" => Ok("; ".to_string()),
            "begin" | "end" => {
                // Environment names are dropped; their rows come through as text
                self.argument(&name)?;
                Ok(" ".to_string())
            }
            "" => Ok("\\".to_string()),
            other => Ok(symbol(other).map(String::from).unwrap_or_else(|| other.to_string())),
        }
    }
}

fn wrap_compound(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= 1 || text.chars().all(|c| c.is_alphanumeric()) {
        text.to_string()
    } else {
        format!("({})", text)
    }
}

fn script(arg: &str, table: fn(char) -> Option<char>, marker: char) -> String {
    let mapped: Option<String> = arg.chars().map(table).collect();
    match mapped {
        Some(s) if !s.is_empty() => s,
        _ if arg.chars().count() == 1 => format!("{}{}", marker, arg),
        _ => format!("{}({})", marker, arg),
    }
}

/// Piece of a text line: plain text or an inline formula body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathSegment {
    Text(String),
    Formula(String),
}

/// Split a line on `$...$` pairs. `\$` is a literal dollar and dollars inside
/// backtick code spans are left alone.
///
/// A `$` opens a formula only when followed by a non-space character and a
/// matching close exists; the close must follow a non-space character and
/// must not be followed by a digit. Any other `$` is plain text, so prices
/// like "$5 and $10" stay prose.
pub fn split_inline_math(text: &str) -> Vec<MathSegment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_code = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '`' => {
                in_code = !in_code;
                current.push('`');
                i += 1;
            }
            c if in_code => {
                current.push(c);
                i += 1;
            }
            '\\' if chars.get(i + 1) == Some(&'$') => {
                current.push('$');
                i += 2;
            }
            '$' if opens_math(&chars, i) => match closing_dollar(&chars, i + 1) {
                Some(end) => {
                    if !current.is_empty() {
                        segments.push(MathSegment::Text(std::mem::take(&mut current)));
                    }
                    segments.push(MathSegment::Formula(chars[i + 1..end].iter().collect()));
                    i = end + 1;
                }
                None => {
                    current.push('$');
                    i += 1;
                }
            },
            c => {
                current.push(c);
                i += 1;
            }
        }
    }

    if !current.is_empty() {
        segments.push(MathSegment::Text(current));
    }
    segments
}

fn opens_math(chars: &[char], at: usize) -> bool {
    chars.get(at + 1).is_some_and(|c| !c.is_whitespace() && *c != '$')
}

/// Index of the `$` closing a formula whose body starts at `start`
fn closing_dollar(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '$' => {
                let after_text = j > start && !chars[j - 1].is_whitespace();
                let before_digit = chars.get(j + 1).is_some_and(|c| c.is_ascii_digit());
                if after_text && !before_digit {
                    return Some(j);
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_and_scripts() {
        assert_eq!(latex_to_unicode(r"\alpha + \beta \leq \pi").unwrap(), "α + β ≤ π");
        assert_eq!(latex_to_unicode("x^2 + y_1").unwrap(), "x² + y₁");
        assert_eq!(latex_to_unicode("e^{i\\pi}").unwrap(), "e^(iπ)");
        assert_eq!(latex_to_unicode(r"\sum_{i=1}^{n} i").unwrap(), "∑ᵢ₌₁ⁿ i");
    }

    #[test]
    fn test_frac_and_sqrt() {
        assert_eq!(latex_to_unicode(r"\frac{1}{2}").unwrap(), "1/2");
        assert_eq!(latex_to_unicode(r"\frac{a+b}{c}").unwrap(), "(a+b)/c");
        assert_eq!(latex_to_unicode(r"\sqrt{x^2 + 1}").unwrap(), "√(x² + 1)");
        assert_eq!(latex_to_unicode(r"\sqrt[3]{8}").unwrap(), "∛8");
        assert_eq!(latex_to_unicode(r"\mathbb{R}^n").unwrap(), "ℝⁿ");
    }

    #[test]
    fn test_text_and_unknown_macros() {
        assert_eq!(latex_to_unicode(r"\text{if } x \to 0").unwrap(), "if x → 0");
        assert_eq!(latex_to_unicode(r"\foo x").unwrap(), "foo x");
        assert_eq!(latex_to_unicode(r"\left( x \right)").unwrap(), "( x )");
    }

    #[test]
    fn test_errors() {
        assert_eq!(latex_to_unicode(r"\frac{1}{2"), Err(LatexError::UnbalancedBraces));
        assert_eq!(latex_to_unicode("x}"), Err(LatexError::UnbalancedBraces));
        assert_eq!(latex_to_unicode("  "), Err(LatexError::Empty));
        assert_eq!(latex_to_unicode(r"\frac{1}"), Err(LatexError::MissingArgument("frac".into())));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let braces = format!("{}x{}", "{".repeat(10_000), "}".repeat(10_000));
        assert_eq!(latex_to_unicode(&braces), Err(LatexError::TooDeep(MAX_NESTING)));

        let roots = format!("{}x", r"\sqrt".repeat(10_000));
        assert_eq!(latex_to_unicode(&roots), Err(LatexError::TooDeep(MAX_NESTING)));

        let shallow = format!("{}x{}", "{".repeat(10), "}".repeat(10));
        assert_eq!(latex_to_unicode(&shallow).unwrap(), "x");
    }

    #[test]
    fn test_split_inline_math() {
        let segments = split_inline_math("Area is $\\pi r^2$ for \\$5");
        assert_eq!(
            segments,
            vec![
                MathSegment::Text("Area is ".into()),
                MathSegment::Formula("\\pi r^2".into()),
                MathSegment::Text(" for $5".into()),
            ]
        );
        assert_eq!(split_inline_math("run `echo $HOME`"), vec![MathSegment::Text("run `echo $HOME`".into())]);
        assert_eq!(split_inline_math("plain"), vec![MathSegment::Text("plain".into())]);
    }

    #[test]
    fn test_currency_is_not_math() {
        for text in ["costs $5 and $10", "costs $5", "from $ 3 to $4"] {
            assert_eq!(split_inline_math(text), vec![MathSegment::Text(text.into())], "{}", text);
        }
        assert_eq!(
            split_inline_math("$x$ costs $5"),
            vec![MathSegment::Formula("x".into()), MathSegment::Text(" costs $5".into())]
        );
        assert_eq!(
            split_inline_math("set $a = b$, then"),
            vec![
                MathSegment::Text("set ".into()),
                MathSegment::Formula("a = b".into()),
                MathSegment::Text(", then".into()),
            ]
        );
    }
}
