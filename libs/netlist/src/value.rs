//! Parameter value classification.
//!
//! A SPICE model parameter carries either a numeric literal with an optional
//! SI multiplier suffix, an opaque string, or an arithmetic expression.
//! Expressions require an evaluator this crate does not embed, so they are
//! detected here and rejected by the parser.

use arcstr::Substr;
use lazy_static::lazy_static;
use regex::Regex;

/// Reserved SPICE function names.
///
/// A value invoking one of these denotes an expression.
pub const FUNCTIONS: &[&str] = &[
    "abs", "acos", "acosh", "asin", "asinh", "atan", "atanh", "cos", "cosh", "exp", "ln", "log",
    "log10", "max", "min", "pow", "pwr", "sin", "sinh", "sqrt", "tan", "tanh", "uramp", "ceil",
    "floor", "nint", "sgn", "buf", "inv", "table",
];

lazy_static! {
    static ref FUNCTION_CALL: Regex = Regex::new(r"\w+\s*\(").unwrap();
    static ref LEADING_FUNCTION: Regex = {
        let names = FUNCTIONS.join("|");
        Regex::new(&format!(r"(?i)^(?:{names})[\s(]")).unwrap()
    };
}

/// A classified model parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// A numeric literal, possibly SI-suffixed.
    ///
    /// `raw` is the value as written (suffix intact); `scaled` is the parsed
    /// double multiplied by the suffix.
    Numeric {
        /// The source text of the value.
        raw: Substr,
        /// The finite scaled value.
        scaled: f64,
    },
    /// An opaque string value, stored verbatim.
    String {
        /// The source text of the value.
        raw: Substr,
    },
}

impl ParameterValue {
    /// Classify a raw parameter value.
    ///
    /// Values containing expressions classify as strings; the parser is
    /// responsible for dropping the enclosing model directive in that case.
    pub fn classify(raw: Substr) -> Self {
        if !is_expression(&raw) {
            if let Some(scaled) = parse_numeric(&raw) {
                return Self::Numeric { raw, scaled };
            }
        }
        Self::String { raw }
    }

    /// Classify a quoted parameter value.
    ///
    /// Quoted values are stored verbatim and never treated as numeric.
    pub fn from_quoted(raw: Substr) -> Self {
        Self::String { raw }
    }

    /// The value as it appeared in the source.
    pub fn raw(&self) -> &Substr {
        match self {
            Self::Numeric { raw, .. } | Self::String { raw } => raw,
        }
    }

    /// The scaled numeric value, if this value is numeric.
    pub fn scaled(&self) -> Option<f64> {
        match self {
            Self::Numeric { scaled, .. } => Some(*scaled),
            Self::String { .. } => None,
        }
    }

    /// Whether this value is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric { .. })
    }
}

/// The multiplier denoted by a single-character SI suffix.
fn si_multiplier(suffix: char) -> Option<f64> {
    Some(match suffix.to_ascii_lowercase() {
        't' => 1e12,
        'g' => 1e9,
        'k' => 1e3,
        'm' => 1e-3,
        'u' => 1e-6,
        'n' => 1e-9,
        'p' => 1e-12,
        _ => return None,
    })
}

/// Split a trailing SI suffix off a value, returning the numeric body and the
/// multiplier. `meg` is tested before the single-character suffixes so that
/// `1meg` resolves to 1e6 rather than 1e-3 with a dangling `eg`.
fn split_suffix(text: &str) -> (&str, f64) {
    let b = text.as_bytes();
    if b.len() > 3 && b[b.len() - 3..].eq_ignore_ascii_case(b"meg") {
        return (&text[..text.len() - 3], 1e6);
    }
    if let Some(last) = text.chars().last() {
        if let Some(mult) = si_multiplier(last) {
            return (&text[..text.len() - last.len_utf8()], mult);
        }
    }
    (text, 1.0)
}

/// Parse a numeric literal with an optional SI suffix.
///
/// Returns the scaled value, or `None` when the text is not a plain, finite
/// numeric literal.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (body, mult) = split_suffix(text);
    let parsed = body.parse::<f64>().ok()?;
    let scaled = parsed * mult;
    scaled.is_finite().then_some(scaled)
}

/// Decide whether a raw value denotes an arithmetic expression.
///
/// Fires on parentheses, `*`, `/`, `,`, on anything shaped like a function
/// call, on a leading reserved function name, and on `+`/`-` signs that are
/// not part of a numeric literal (so `-0.7` and `1e-3` pass, while
/// `0.18u+0.02u` does not).
pub fn is_expression(text: &str) -> bool {
    if text.contains(['(', ')', '*', '/', ',']) {
        return true;
    }
    if FUNCTION_CALL.is_match(text) || LEADING_FUNCTION.is_match(text) {
        return true;
    }
    if text.contains(['+', '-']) {
        return text
            .split(|c: char| c.is_whitespace() || c == '=')
            .filter(|chunk| !chunk.is_empty())
            .any(|chunk| chunk.contains(['+', '-']) && parse_numeric(chunk).is_none());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn si_suffixes_scale() {
        assert_relative_eq!(parse_numeric("1meg").unwrap(), 1e6);
        assert_relative_eq!(parse_numeric("1m").unwrap(), 1e-3);
        assert_relative_eq!(parse_numeric("1u").unwrap(), 1e-6);
        assert_relative_eq!(parse_numeric("1g").unwrap(), 1e9);
        assert_relative_eq!(parse_numeric("2.5k").unwrap(), 2.5e3);
        assert_relative_eq!(parse_numeric("3p").unwrap(), 3e-12);
        assert_relative_eq!(parse_numeric("4n").unwrap(), 4e-9);
        assert_relative_eq!(parse_numeric("5t").unwrap(), 5e12);
        assert_relative_eq!(parse_numeric("1.0").unwrap(), 1.0);
    }

    #[test]
    fn suffixes_fold_case() {
        assert_relative_eq!(parse_numeric("1MEG").unwrap(), 1e6);
        assert_relative_eq!(parse_numeric("0.18U").unwrap(), 0.18e-6);
        assert_relative_eq!(parse_numeric("1K").unwrap(), 1e3);
    }

    #[test]
    fn exponents_parse() {
        assert_relative_eq!(parse_numeric("1.4e-8").unwrap(), 1.4e-8);
        assert_relative_eq!(parse_numeric("2E3").unwrap(), 2e3);
        assert_relative_eq!(parse_numeric("1e3k").unwrap(), 1e6);
    }

    #[test]
    fn signed_literals_are_numeric() {
        assert_relative_eq!(parse_numeric("-0.7").unwrap(), -0.7);
        assert_relative_eq!(parse_numeric("+0.5u").unwrap(), 0.5e-6);
        assert!(!is_expression("-0.7"));
        assert!(!is_expression("1e-3"));
    }

    #[test]
    fn non_numeric_values_rejected() {
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("m"), None);
        assert_eq!(parse_numeric("nan"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric("1k2"), None);
    }

    #[test]
    fn expressions_detected() {
        assert!(is_expression("0.18u+0.02u"));
        assert!(is_expression("0.18u + 0.02u"));
        assert!(is_expression("max(0.18u,0.2u)"));
        assert!(is_expression("sqrt(2)"));
        assert!(is_expression("sqrt 2"));
        assert!(is_expression("a/b"));
        assert!(is_expression("1,2"));
        assert!(is_expression("(5)"));
    }

    #[test]
    fn plain_values_pass() {
        assert!(!is_expression("0.18u"));
        assert!(!is_expression("hello"));
        assert!(!is_expression("1meg"));
        // A word merely containing a function name is not a call.
        assert!(!is_expression("exponent"));
    }

    #[test]
    fn classify_tags_values() {
        let v = ParameterValue::classify("1meg".into());
        assert!(v.is_numeric());
        assert_relative_eq!(v.scaled().unwrap(), 1e6);
        assert_eq!(v.raw(), "1meg");

        let v = ParameterValue::classify("ako".into());
        assert!(!v.is_numeric());
        assert_eq!(v.scaled(), None);

        let v = ParameterValue::from_quoted("1meg".into());
        assert!(!v.is_numeric());
    }
}
