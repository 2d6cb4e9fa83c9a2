//! SPICE netlist parser.
//!
//! Extracts `.model` and `.subckt` definitions from a netlist. All other
//! lines, including component instantiations and unrecognized directives,
//! are skipped. Parse anomalies are never fatal: they are reported through
//! an [`AnomalyLog`] and parsing resumes at the next line.


use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arcstr::{ArcStr, Substr};
use itertools::Itertools;
use thiserror::Error;

use crate::anomaly::AnomalyLog;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::{is_expression, ParameterValue};

/// A device model extracted from a netlist.
///
/// Model names are unique within a single `.model` statement's scope only;
/// two files may each define a model with the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord {
    /// The model name.
    pub name: Substr,
    /// The device class, e.g. `nmos`, `pmos`, `diode`.
    pub model_type: Substr,
    /// The file the model came from.
    pub source_file: ArcStr,
    /// The 1-based line of the `.model` directive.
    pub line: u32,
    /// The model's parameters.
    pub params: Params,
}

/// A subcircuit definition extracted from a netlist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SubcircuitRecord {
    /// The subcircuit name.
    pub name: Substr,
    /// The raw body, from the `.subckt` header line through the matching
    /// `.ends` line inclusive, in the original (pre-normalization) case.
    pub content: ArcStr,
    /// The file the subcircuit came from.
    pub source_file: ArcStr,
    /// The 1-based line of the `.subckt` header.
    pub line: u32,
}

/// A record emitted by the parser as directives complete.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A `.model` definition.
    Model(ModelRecord),
    /// A `.subckt` … `.ends` definition.
    Subcircuit(SubcircuitRecord),
}

/// Model parameter values, keyed by lowercase parameter name.
///
/// Insertion order is not preserved.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    values: HashMap<Substr, ParameterValue>,
}

impl Params {
    /// Create a new, empty parameter set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous binding of the same name.
    pub fn insert(&mut self, name: impl Into<Substr>, value: ParameterValue) {
        self.values.insert(name.into(), value);
    }

    /// Get the value bound to the given parameter name.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// An iterator over all parameter bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&Substr, &ParameterValue)> {
        self.values.iter()
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An error surfaced to the extraction driver.
///
/// Parse anomalies are not errors; only file-level failures escape.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Error trying to read the given netlist file.
    #[error("failed to read netlist at `{path}`: {err}")]
    FailedToRead {
        /// The path we attempted to read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

/// All records extracted from one netlist.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extracted {
    /// Models, in source order.
    pub models: Vec<ModelRecord>,
    /// Subcircuits, in source order.
    pub subcircuits: Vec<SubcircuitRecord>,
}

/// Parses SPICE netlists, streaming out [`Record`]s.
///
/// The whole input is lowercased before lexing so that identifiers, model
/// types, and parameter names compare case-insensitively downstream; a
/// parallel un-normalized line buffer preserves the original case of
/// captured subcircuit bodies.
pub struct Parser {
    lexer: Lexer,
    file: ArcStr,
    lines: Vec<Substr>,
    log: AnomalyLog,
}

impl Parser {
    /// Makes a new parser over the given netlist text.
    ///
    /// `file` names the source in records and anomaly reports.
    pub fn new(data: impl Into<ArcStr>, file: impl Into<ArcStr>, log: AnomalyLog) -> Self {
        let data = data.into();
        // Line endings are normalized by stripping carriage returns.
        let data: ArcStr = if data.contains('\r') {
            data.replace('\r', "").into()
        } else {
            data
        };
        let lowered: ArcStr = data.as_str().to_ascii_lowercase().into();
        Self {
            lexer: Lexer::new(Substr::full(lowered)),
            file: file.into(),
            lines: split_lines(&Substr::full(data)),
            log,
        }
    }

    /// Parse the given netlist text to completion.
    pub fn parse(data: impl Into<ArcStr>, file: impl Into<ArcStr>) -> Extracted {
        Self::new(data, file, AnomalyLog::disabled()).collect()
    }

    /// Read and parse the netlist at `path` to completion.
    pub fn parse_path(path: impl AsRef<Path>, log: AnomalyLog) -> Result<Extracted, ParserError> {
        Ok(Self::from_path(path, log)?.collect())
    }

    /// Makes a parser reading the netlist at `path`.
    pub fn from_path(path: impl AsRef<Path>, log: AnomalyLog) -> Result<Self, ParserError> {
        let path = path.as_ref();
        tracing::debug!("reading SPICE netlist: {:?}", path);
        let data = std::fs::read_to_string(path).map_err(|err| ParserError::FailedToRead {
            path: path.into(),
            err,
        })?;
        Ok(Self::new(data, path.to_string_lossy().into_owned(), log))
    }

    /// Returns the next complete record, or `None` at end of input.
    pub fn next_record(&mut self) -> Option<Record> {
        loop {
            let tok = self.lexer.next_token();
            match tok.kind {
                TokenKind::Eof => return None,
                TokenKind::Newline => continue,
                TokenKind::DotCommand => {
                    if tok.text.eq_ignore_ascii_case(".model") {
                        if let Some(model) = self.parse_model(tok.line) {
                            return Some(Record::Model(model));
                        }
                    } else if tok.text.eq_ignore_ascii_case(".subckt") {
                        if let Some(subckt) = self.parse_subckt(tok.line) {
                            return Some(Record::Subcircuit(subckt));
                        }
                    } else if tok.text.eq_ignore_ascii_case(".ends") {
                        self.anomaly(tok.line, "unexpected .ends outside a subcircuit");
                        self.skip_line();
                    } else {
                        self.skip_line();
                    }
                }
                _ => self.skip_line(),
            }
        }
    }

    /// Parse a `.model` directive. Returns `None` when the model is dropped;
    /// the reason is logged.
    fn parse_model(&mut self, line: u32) -> Option<ModelRecord> {
        let name = match self.expect_ident() {
            Ok(tok) => tok.text,
            Err(found) => {
                self.anomaly(line, ".model directive is missing a model name");
                self.recover(found);
                return None;
            }
        };
        let model_type = match self.expect_ident() {
            Ok(tok) => tok.text,
            Err(found) => {
                self.anomaly(line, &format!(".model '{name}' is missing a model type"));
                self.recover(found);
                return None;
            }
        };

        // Buffer the remainder of the directive, unwrapping an optional
        // enclosing paren pair around the parameter list.
        let mut tok = self.lexer.next_token();
        let wrapped = if tok.kind == TokenKind::LParen {
            tok = self.lexer.next_token();
            true
        } else {
            false
        };
        let mut buf = Vec::new();
        while !matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
            buf.push(tok);
            tok = self.lexer.next_token();
        }
        if wrapped {
            if matches!(buf.last().map(|t| t.kind), Some(TokenKind::RParen)) {
                buf.pop();
            } else {
                self.anomaly(line, &format!(".model '{name}' has an unterminated '('"));
            }
        }

        if directive_has_expression(&buf) {
            let joined = buf.iter().map(|t| t.text.as_str()).join(" ");
            self.anomaly(
                line,
                &format!("model '{name}' dropped: parameter list contains an expression: {joined}"),
            );
            return None;
        }

        let params = self.collect_params(&name, line, &buf);
        Some(ModelRecord {
            name,
            model_type,
            source_file: self.file.clone(),
            line,
            params,
        })
    }

    /// Collect `name=value` bindings from an expression-free directive
    /// remainder, tolerating `(name)=value` decoration and recovering past
    /// malformed entries.
    fn collect_params(&mut self, model: &Substr, line: u32, buf: &[Token]) -> Params {
        let mut params = Params::new();
        let mut i = 0;
        while i < buf.len() {
            let name = if paren_wrapped_name(buf, i) {
                i += 3;
                buf[i - 2].text.clone()
            } else if buf[i].kind == TokenKind::Ident {
                i += 1;
                buf[i - 1].text.clone()
            } else {
                self.anomaly(
                    line,
                    &format!("model '{model}': skipping unexpected token `{}`", buf[i].text),
                );
                i += 1;
                continue;
            };
            match buf.get(i).map(|t| t.kind) {
                Some(TokenKind::Equals) => i += 1,
                _ => {
                    self.anomaly(
                        line,
                        &format!("model '{model}': expected '=' after parameter '{name}'"),
                    );
                    continue;
                }
            }
            let Some(value) = buf.get(i) else {
                self.anomaly(
                    line,
                    &format!("model '{model}': missing value for parameter '{name}'"),
                );
                break;
            };
            let value = match value.kind {
                TokenKind::Str => ParameterValue::from_quoted(value.text.clone()),
                TokenKind::Number
                | TokenKind::Ident
                | TokenKind::Value
                | TokenKind::DotCommand
                | TokenKind::Unknown => ParameterValue::classify(value.text.clone()),
                _ => {
                    self.anomaly(
                        line,
                        &format!(
                            "model '{model}': unexpected token `{}` as value of '{name}'",
                            value.text
                        ),
                    );
                    i += 1;
                    continue;
                }
            };
            params.insert(name, value);
            i += 1;
        }
        params
    }

    /// Parse a `.subckt` … `.ends` block, capturing the raw body. Nested
    /// subcircuit declarations are dropped but their `.ends` pairing is
    /// still tracked so the outer block terminates correctly. Any `.model`
    /// inside the body is dropped.
    fn parse_subckt(&mut self, header_line: u32) -> Option<SubcircuitRecord> {
        let name = match self.expect_ident() {
            Ok(tok) => tok.text,
            Err(found) => {
                self.anomaly(header_line, ".subckt directive is missing a name");
                self.recover(found);
                return None;
            }
        };
        self.skip_line();

        let mut depth = 0usize;
        loop {
            let tok = self.lexer.next_token();
            match tok.kind {
                TokenKind::Eof => {
                    self.anomaly(
                        header_line,
                        &format!("subcircuit '{name}' has no matching .ends"),
                    );
                    return None;
                }
                TokenKind::Newline => continue,
                TokenKind::DotCommand => {
                    if tok.text.eq_ignore_ascii_case(".ends") {
                        let end_line = tok.line;
                        self.skip_line();
                        if depth == 0 {
                            return Some(SubcircuitRecord {
                                content: self.capture(header_line, end_line),
                                name,
                                source_file: self.file.clone(),
                                line: header_line,
                            });
                        }
                        depth -= 1;
                    } else if tok.text.eq_ignore_ascii_case(".subckt") {
                        depth += 1;
                        self.anomaly(
                            tok.line,
                            &format!("nested .subckt inside '{name}' dropped"),
                        );
                        self.skip_line();
                    } else if tok.text.eq_ignore_ascii_case(".model") {
                        self.anomaly(
                            tok.line,
                            &format!(".model inside subcircuit '{name}' dropped"),
                        );
                        self.skip_line();
                    } else {
                        self.skip_line();
                    }
                }
                _ => self.skip_line(),
            }
        }
    }

    /// The original-case text of lines `start..=end` (1-based, inclusive).
    fn capture(&self, start: u32, end: u32) -> ArcStr {
        let start = start.saturating_sub(1) as usize;
        let end = (end as usize).min(self.lines.len());
        self.lines[start..end]
            .iter()
            .map(|line| line.as_str())
            .join("\n")
            .into()
    }

    fn expect_ident(&mut self) -> Result<Token, Token> {
        let tok = self.lexer.next_token();
        if tok.kind == TokenKind::Ident {
            Ok(tok)
        } else {
            Err(tok)
        }
    }

    /// Skip to the start of the next line, unless `found` already ended one.
    fn recover(&mut self, found: Token) {
        if !matches!(found.kind, TokenKind::Newline | TokenKind::Eof) {
            self.skip_line();
        }
    }

    fn skip_line(&mut self) {
        loop {
            match self.lexer.next_token().kind {
                TokenKind::Newline | TokenKind::Eof => return,
                _ => continue,
            }
        }
    }

    fn anomaly(&self, line: u32, message: &str) {
        self.log.record(&self.file, line, message);
    }
}

impl Iterator for Parser {
    type Item = Record;
    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

impl FromIterator<Record> for Extracted {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let mut out = Self::default();
        for record in iter {
            match record {
                Record::Model(m) => out.models.push(m),
                Record::Subcircuit(s) => out.subcircuits.push(s),
            }
        }
        out
    }
}

/// Whether `buf[i..]` starts with a `(name)=` decoration.
fn paren_wrapped_name(buf: &[Token], i: usize) -> bool {
    buf[i].kind == TokenKind::LParen
        && buf.get(i + 1).map(|t| t.kind) == Some(TokenKind::Ident)
        && buf.get(i + 2).map(|t| t.kind) == Some(TokenKind::RParen)
        && buf.get(i + 3).map(|t| t.kind) == Some(TokenKind::Equals)
}

/// Expression scan over a buffered `.model` directive remainder.
///
/// A model is dropped wholesale when any of its parameters carries an
/// expression, and an expression may span several tokens, so the test runs
/// over the whole remainder before any parameter is bound. Fires on operator
/// and comma tokens anywhere, on quoted formulas, on function-call shapes,
/// on parenthesized values, and on a signed number where a parameter name
/// belongs (the tail of a split arithmetic expression).
fn directive_has_expression(buf: &[Token]) -> bool {
    #[derive(Copy, Clone, Eq, PartialEq)]
    enum Expect {
        Name,
        Equals,
        Value,
    }
    let mut state = Expect::Name;
    let mut i = 0;
    while i < buf.len() {
        let tok = &buf[i];
        match tok.kind {
            TokenKind::Operator | TokenKind::Comma => return true,
            TokenKind::Str if is_expression(&tok.text) => return true,
            TokenKind::Ident | TokenKind::Value
                if buf.get(i + 1).map(|t| t.kind) == Some(TokenKind::LParen) =>
            {
                return true;
            }
            TokenKind::Value | TokenKind::DotCommand if is_expression(&tok.text) => return true,
            _ => {}
        }
        match state {
            Expect::Name => match tok.kind {
                TokenKind::LParen if paren_wrapped_name(buf, i) => {
                    // Land on the '=' so the next iteration consumes it.
                    i += 2;
                    state = Expect::Equals;
                }
                TokenKind::LParen | TokenKind::RParen => return true,
                TokenKind::Number if tok.text.starts_with(['+', '-']) => return true,
                TokenKind::Ident => state = Expect::Equals,
                _ => {}
            },
            Expect::Equals => {
                if tok.kind == TokenKind::Equals {
                    state = Expect::Value;
                } else {
                    // Missing '='; reconsider this token as a name.
                    state = Expect::Name;
                    continue;
                }
            }
            Expect::Value => match tok.kind {
                TokenKind::LParen | TokenKind::RParen => return true,
                _ => state = Expect::Name,
            },
        }
        i += 1;
    }
    false
}

fn split_lines(data: &Substr) -> Vec<Substr> {
    let mut lines = Vec::new();
    let mut rest = data.clone();
    loop {
        match rest.find('\n') {
            Some(i) => {
                lines.push(rest.substr(..i));
                rest = rest.substr(i + 1..);
            }
            None => {
                lines.push(rest);
                return lines;
            }
        }
    }
}
