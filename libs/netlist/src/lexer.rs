//! SPICE netlist lexer.
//!
//! Single-pass, byte-oriented tokenizer over a shared string buffer. SPICE
//! mixes identifier-like model types with values that may carry SI suffixes
//! on the same line, so tokens are recognized by progressive character-class
//! dispatch rather than a single pattern. Newlines are significant and are
//! emitted as tokens; other whitespace separates tokens.

use arcstr::Substr;

/// The kind of a lexed token.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// A dot-directive word, e.g. `.model`, `.subckt`, `.ends`.
    DotCommand,
    /// An identifier: a letter or underscore, then letters, digits, underscores.
    Ident,
    /// An equal sign.
    Equals,
    /// A numeric literal. The lexeme keeps any SI suffix.
    Number,
    /// A bare arithmetic operator: `+`, `-`, `*`, `/`, `^`.
    Operator,
    /// An opening parenthesis.
    LParen,
    /// A closing parenthesis.
    RParen,
    /// A comma.
    Comma,
    /// A quoted string. The lexeme is the interior, quotes removed.
    Str,
    /// A generic value read up to the next delimiter.
    Value,
    /// A line break.
    Newline,
    /// End of input.
    Eof,
    /// A byte the lexer does not recognize.
    Unknown,
}

/// A lexed token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The lexeme.
    pub text: Substr,
    /// The 1-based source line the token starts on.
    pub line: u32,
}

#[inline]
fn is_space(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r'
}

#[inline]
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '=' | '(' | ')' | ',')
}

/// Tokenizes a SPICE netlist.
pub struct Lexer {
    rem: Substr,
    line: u32,
}

impl Lexer {
    /// Makes a new lexer over the given source text.
    pub fn new(data: impl Into<Substr>) -> Self {
        Self {
            rem: data.into(),
            line: 1,
        }
    }

    /// Returns the next token, advancing past it.
    ///
    /// Once the input is exhausted, every further call returns [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Token {
        self.take_while(is_space);
        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, self.rem.clone());
        };
        match c {
            '\n' => {
                let text = self.take(1);
                let tok = Token {
                    kind: TokenKind::Newline,
                    text,
                    line: self.line,
                };
                self.line += 1;
                tok
            }
            '.' => {
                let text = self.take_while(|c| !c.is_whitespace());
                self.token(TokenKind::DotCommand, text)
            }
            '=' => {
                let text = self.take(1);
                self.token(TokenKind::Equals, text)
            }
            '(' => {
                let text = self.take(1);
                self.token(TokenKind::LParen, text)
            }
            ')' => {
                let text = self.take(1);
                self.token(TokenKind::RParen, text)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                self.token(TokenKind::Ident, text)
            }
            '\'' | '"' => self.quoted(c),
            ',' => {
                let text = self.take(1);
                self.token(TokenKind::Comma, text)
            }
            '*' | '/' | '^' => {
                let text = self.take(1);
                self.token(TokenKind::Operator, text)
            }
            '+' | '-' | '0'..='9' => self.number_or_operator(),
            c if c.is_ascii_graphic() => {
                let text = self.take_while(|c| !is_delimiter(c));
                self.token(TokenKind::Value, text)
            }
            _ => {
                let text = self.take(1);
                self.token(TokenKind::Unknown, text)
            }
        }
    }

    /// Reads a quoted string; the emitted lexeme is the interior. An
    /// unterminated string runs to end of input.
    fn quoted(&mut self, quote: char) -> Token {
        self.take(1);
        let interior = match self.rem.find(quote) {
            Some(end) => {
                let interior = self.take(end);
                self.take(1);
                interior
            }
            None => self.take(self.rem.len()),
        };
        let tok = Token {
            kind: TokenKind::Str,
            text: interior.clone(),
            line: self.line,
        };
        self.line += interior.matches('\n').count() as u32;
        tok
    }

    /// Reads a numeric literal, or falls back to a single-character operator
    /// when a bare sign is not followed by a number.
    fn number_or_operator(&mut self) -> Token {
        match scan_number(&self.rem) {
            Some(len) => {
                let text = self.take(len);
                self.token(TokenKind::Number, text)
            }
            None => {
                let text = self.take(1);
                self.token(TokenKind::Operator, text)
            }
        }
    }

    fn token(&self, kind: TokenKind, text: Substr) -> Token {
        Token {
            kind,
            text,
            line: self.line,
        }
    }

    fn peek(&self) -> Option<char> {
        self.rem.chars().next()
    }

    fn take(&mut self, n: usize) -> Substr {
        let text = self.rem.substr(..n);
        self.rem = self.rem.substr(n..);
        text
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> Substr {
        let end = self.rem.find(|c| !f(c)).unwrap_or(self.rem.len());
        self.take(end)
    }
}

/// An iterator over a lexer's tokens, ending after the first `Eof`.
pub struct Tokens {
    lexer: Lexer,
    done: bool,
}

impl Iterator for Tokens {
    type Item = Token;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let tok = self.lexer.next_token();
        if tok.kind == TokenKind::Eof {
            self.done = true;
            return None;
        }
        Some(tok)
    }
}

impl IntoIterator for Lexer {
    type Item = Token;
    type IntoIter = Tokens;
    fn into_iter(self) -> Self::IntoIter {
        Tokens {
            lexer: self,
            done: false,
        }
    }
}

/// Returns the byte length of the numeric literal at the start of `s`, SI
/// suffix included, or `None` if `s` does not start with a number.
fn scan_number(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(&(b'+' | b'-'))) {
        i += 1;
    }
    let int_start = i;
    while b.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let mut digits = i - int_start;
    if b.get(i) == Some(&b'.') {
        i += 1;
        let frac_start = i;
        while b.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        digits += i - frac_start;
    }
    if digits == 0 {
        return None;
    }
    if matches!(b.get(i), Some(&(b'e' | b'E'))) {
        let mut j = i + 1;
        if matches!(b.get(j), Some(&(b'+' | b'-'))) {
            j += 1;
        }
        if b.get(j).is_some_and(u8::is_ascii_digit) {
            while b.get(j).is_some_and(u8::is_ascii_digit) {
                j += 1;
            }
            i = j;
        }
    }
    if b.len() - i >= 3 && b[i..i + 3].eq_ignore_ascii_case(b"meg") {
        i += 3;
    } else if b
        .get(i)
        .is_some_and(|c| matches!(c.to_ascii_lowercase(), b'p' | b'n' | b'u' | b'm' | b'k' | b'g' | b't'))
    {
        i += 1;
    }
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(input)
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    #[test]
    fn model_line_tokens() {
        let toks = kinds(".model test_prefix nmos vth=1.0 cap=1meg\n");
        assert_eq!(
            toks,
            vec![
                (TokenKind::DotCommand, ".model".to_string()),
                (TokenKind::Ident, "test_prefix".to_string()),
                (TokenKind::Ident, "nmos".to_string()),
                (TokenKind::Ident, "vth".to_string()),
                (TokenKind::Equals, "=".to_string()),
                (TokenKind::Number, "1.0".to_string()),
                (TokenKind::Ident, "cap".to_string()),
                (TokenKind::Equals, "=".to_string()),
                (TokenKind::Number, "1meg".to_string()),
                (TokenKind::Newline, "\n".to_string()),
            ]
        );
    }

    #[test]
    fn numbers_keep_si_suffixes() {
        assert_eq!(kinds("0.18u"), vec![(TokenKind::Number, "0.18u".to_string())]);
        assert_eq!(kinds("1.4e-8"), vec![(TokenKind::Number, "1.4e-8".to_string())]);
        assert_eq!(kinds("-0.7"), vec![(TokenKind::Number, "-0.7".to_string())]);
        assert_eq!(kinds("1meg"), vec![(TokenKind::Number, "1meg".to_string())]);
    }

    #[test]
    fn bare_signs_are_operators() {
        assert_eq!(
            kinds("1u + 2u"),
            vec![
                (TokenKind::Number, "1u".to_string()),
                (TokenKind::Operator, "+".to_string()),
                (TokenKind::Number, "2u".to_string()),
            ]
        );
    }

    #[test]
    fn quoted_strings_drop_quotes() {
        assert_eq!(
            kinds("l='0.18u + 0.02u'"),
            vec![
                (TokenKind::Ident, "l".to_string()),
                (TokenKind::Equals, "=".to_string()),
                (TokenKind::Str, "0.18u + 0.02u".to_string()),
            ]
        );
        // Unterminated strings run to end of input.
        assert_eq!(kinds("\"abc"), vec![(TokenKind::Str, "abc".to_string())]);
    }

    #[test]
    fn parens_and_commas() {
        assert_eq!(
            kinds("max(1,2)"),
            vec![
                (TokenKind::Ident, "max".to_string()),
                (TokenKind::LParen, "(".to_string()),
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Comma, ",".to_string()),
                (TokenKind::Number, "2".to_string()),
                (TokenKind::RParen, ")".to_string()),
            ]
        );
    }

    #[test]
    fn lines_are_tracked() {
        let mut lexer = Lexer::new(".model a\n.model b\n");
        assert_eq!(lexer.next_token().line, 1);
        assert_eq!(lexer.next_token().line, 1);
        assert_eq!(lexer.next_token().line, 1); // newline token
        let tok = lexer.next_token();
        assert_eq!(tok.text, ".model");
        assert_eq!(tok.line, 2);
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Ident);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn fallback_value_token() {
        assert_eq!(kinds("[x]"), vec![(TokenKind::Value, "[x]".to_string())]);
    }
}
