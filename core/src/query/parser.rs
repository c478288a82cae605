//! Hand-written parser for ConfigXQL statements.
//!
//! Columns in `Parse` errors are 1-based character offsets within the
//! offending line. Script errors also name the line.

use std::iter::Peekable;
use std::str::Chars;

use super::Operation;
use crate::error::{ConfigError, Result};
use crate::tree::{ConfigPath, Scalar};

/// Parse a single statement.
pub fn parse(input: &str) -> Result<Operation> {
    let mut p = Parser::new(input, false);
    p.skip_ws();
    if p.at_end() {
        return Err(p.error("empty statement"));
    }
    let op = p.statement()?;
    p.skip_ws();
    if let Some(c) = p.peek() {
        return Err(p.error(format!("unexpected '{}' after statement", c)));
    }
    Ok(op)
}

/// Parse statements separated by `;` or newlines. Blank statements are
/// skipped.
pub fn parse_script(input: &str) -> Result<Vec<Operation>> {
    let mut p = Parser::new(input, true);
    let mut ops = Vec::new();
    loop {
        p.skip_separators();
        if p.at_end() {
            break;
        }
        ops.push(p.statement()?);
        p.skip_ws();
        match p.peek() {
            None | Some(';') | Some('\n') => {}
            Some(c) => return Err(p.error(format!("unexpected '{}' after statement", c))),
        }
    }
    Ok(ops)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    script: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, script: bool) -> Self {
        Parser {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
            script,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        self.error_at(self.line, self.column, message)
    }

    fn error_at(&self, line: usize, column: usize, message: impl Into<String>) -> ConfigError {
        let message = message.into();
        ConfigError::Parse {
            position: column,
            message: if self.script {
                format!("line {}: {}", line, message)
            } else {
                message
            },
        }
    }

    /// Skip insignificant whitespace. Newlines separate statements in a
    /// script, so they are only skipped in single-statement mode.
    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            let skip = match c {
                '\n' => !self.script,
                c => c.is_whitespace(),
            };
            if !skip {
                break;
            }
            self.bump();
        }
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' || c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    // -------------------------------------------------------------------
    // Grammar
    // -------------------------------------------------------------------

    fn statement(&mut self) -> Result<Operation> {
        let path = self.path()?;
        self.skip_ws();
        match self.peek() {
            Some('!') => {
                self.bump();
                Ok(Operation::Read { path, safe: true })
            }
            Some('-') => {
                self.bump();
                Ok(Operation::Delete { path })
            }
            Some('=') => {
                self.bump();
                self.skip_ws();
                let value = self.value()?;
                Ok(Operation::Write { path, value })
            }
            _ => Ok(Operation::Read { path, safe: false }),
        }
    }

    fn path(&mut self) -> Result<ConfigPath> {
        let (line, column) = (self.line, self.column);
        let mut segments = vec![self.identifier()?];
        loop {
            self.skip_ws();
            if self.peek() != Some('.') {
                break;
            }
            self.bump();
            self.skip_ws();
            segments.push(self.identifier()?);
        }
        ConfigPath::from_segments(segments).map_err(|e| match e {
            ConfigError::InvalidPath(msg) => self.error_at(line, column, msg),
            other => other,
        })
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(c) => return Err(self.error(format!("expected a path segment, found '{}'", c))),
            None => return Err(self.error("expected a path segment, found end of input")),
        }
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(ident)
    }

    fn value(&mut self) -> Result<Scalar> {
        match self.peek() {
            Some('"') => self.string().map(Scalar::Str),
            Some('\'') => Err(self.error("strings must use double quotes")),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(c) => Err(self.error(format!("expected a value, found '{}'", c))),
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn string(&mut self) -> Result<String> {
        let (line, column) = (self.line, self.column);
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => {
                    let escaped = match self.peek() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(c) => return Err(self.error(format!("unknown escape '\\{}'", c))),
                        None => break,
                    };
                    self.bump();
                    out.push(escaped);
                }
                Some('\n') if self.script => break,
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(self.error_at(line, column, "unterminated string"))
    }

    fn number(&mut self) -> Result<Scalar> {
        let column = self.column;
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        if !self.digits(&mut text) {
            return Err(self.error("expected digits"));
        }
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.bump();
            if !self.digits(&mut text) {
                return Err(self.error("expected digits after '.'"));
            }
        }
        if let Some(e @ ('e' | 'E')) = self.peek() {
            is_float = true;
            text.push(e);
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.bump();
            }
            if !self.digits(&mut text) {
                return Err(self.error("expected digits in exponent"));
            }
        }

        if is_float {
            match text.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Scalar::Float(x)),
                _ => Err(self.error_at(self.line, column, format!("float out of range: {}", text))),
            }
        } else {
            text.parse::<i64>()
                .map(Scalar::Int)
                .map_err(|_| self.error_at(self.line, column, format!("integer out of range: {}", text)))
        }
    }

    fn digits(&mut self, out: &mut String) -> bool {
        let start = out.len();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out.len() > start
    }

    fn keyword(&mut self) -> Result<Scalar> {
        let column = self.column;
        let word = self.identifier()?;
        match word.as_str() {
            "true" => Ok(Scalar::Bool(true)),
            "false" => Ok(Scalar::Bool(false)),
            _ => Err(self.error_at(
                self.line,
                column,
                format!("expected a value, found '{}' (strings need double quotes)", word),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ConfigPath {
        ConfigPath::parse(s).unwrap()
    }

    fn parse_err(input: &str) -> (usize, String) {
        match parse(input) {
            Err(ConfigError::Parse { position, message }) => (position, message),
            other => panic!("expected parse error for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn plain_read() {
        assert_eq!(
            parse("app.ui.theme").unwrap(),
            Operation::Read { path: path("app.ui.theme"), safe: false }
        );
    }

    #[test]
    fn safe_read() {
        assert_eq!(
            parse("app.ui.missing!").unwrap(),
            Operation::Read { path: path("app.ui.missing"), safe: true }
        );
    }

    #[test]
    fn delete() {
        assert_eq!(
            parse("app.ui.theme-").unwrap(),
            Operation::Delete { path: path("app.ui.theme") }
        );
    }

    #[test]
    fn write_string() {
        assert_eq!(
            parse(r#"appsettings.language="python""#).unwrap(),
            Operation::Write {
                path: path("appsettings.language"),
                value: Scalar::from("python"),
            }
        );
    }

    #[test]
    fn write_typed_values() {
        let value = |src: &str| match parse(src).unwrap() {
            Operation::Write { value, .. } => value,
            other => panic!("not a write: {:?}", other),
        };
        assert_eq!(value("a=42"), Scalar::Int(42));
        assert_eq!(value("a=-7"), Scalar::Int(-7));
        assert_eq!(value("a=3.5"), Scalar::Float(3.5));
        assert_eq!(value("a=-0.25"), Scalar::Float(-0.25));
        assert_eq!(value("a=1e3"), Scalar::Float(1000.0));
        assert_eq!(value("a=2.5E-1"), Scalar::Float(0.25));
        assert_eq!(value("a=true"), Scalar::Bool(true));
        assert_eq!(value("a=false"), Scalar::Bool(false));
    }

    #[test]
    fn string_escapes() {
        match parse(r#"msg="say \"hi\"\n\tbye \\ end""#).unwrap() {
            Operation::Write { value, .. } => {
                assert_eq!(value, Scalar::from("say \"hi\"\n\tbye \\ end"))
            }
            other => panic!("not a write: {:?}", other),
        }
    }

    #[test]
    fn string_keeps_statement_characters() {
        match parse(r#"a="x; y! z- = .""#).unwrap() {
            Operation::Write { value, .. } => assert_eq!(value, Scalar::from("x; y! z- = .")),
            other => panic!("not a write: {:?}", other),
        }
    }

    #[test]
    fn whitespace_between_tokens() {
        assert_eq!(
            parse("  a . b = 1  ").unwrap(),
            Operation::Write { path: path("a.b"), value: Scalar::Int(1) }
        );
        assert_eq!(parse(" a.b ! ").unwrap(), parse("a.b!").unwrap());
    }

    #[test]
    fn identifiers_allow_underscore_and_digits() {
        assert_eq!(
            parse("_tmp.node2").unwrap(),
            Operation::Read { path: path("_tmp.node2"), safe: false }
        );
    }

    #[test]
    fn empty_statement_rejected() {
        let (pos, msg) = parse_err("   ");
        assert_eq!(pos, 4);
        assert_eq!(msg, "empty statement");
    }

    #[test]
    fn single_quotes_rejected() {
        let (pos, msg) = parse_err("a='dark'");
        assert_eq!(pos, 3);
        assert!(msg.contains("double quotes"), "{}", msg);
    }

    #[test]
    fn bare_word_value_rejected() {
        let (pos, msg) = parse_err("a=dark");
        assert_eq!(pos, 3);
        assert!(msg.contains("'dark'"), "{}", msg);
    }

    #[test]
    fn unterminated_string_points_at_quote() {
        let (pos, msg) = parse_err(r#"a.b="open"#);
        assert_eq!(pos, 5);
        assert_eq!(msg, "unterminated string");
    }

    #[test]
    fn unknown_escape_rejected() {
        let (_, msg) = parse_err(r#"a="\q""#);
        assert!(msg.contains("unknown escape"), "{}", msg);
    }

    #[test]
    fn bad_segment_rejected() {
        let (pos, _) = parse_err("a..b");
        assert_eq!(pos, 3);
        let (pos, _) = parse_err("1a");
        assert_eq!(pos, 1);
        assert!(parse("a.").is_err());
    }

    #[test]
    fn trailing_garbage_rejected() {
        let (pos, msg) = parse_err("a.b=1 2");
        assert_eq!(pos, 7);
        assert!(msg.contains("'2'"), "{}", msg);
        assert!(parse("a.b!!").is_err());
    }

    #[test]
    fn malformed_numbers_rejected() {
        assert!(parse("a=1.").is_err());
        assert!(parse("a=-").is_err());
        assert!(parse("a=1e").is_err());
        let (_, msg) = parse_err("a=99999999999999999999");
        assert!(msg.contains("integer out of range"), "{}", msg);
        let (_, msg) = parse_err("a=1e999");
        assert!(msg.contains("float out of range"), "{}", msg);
    }

    #[test]
    fn missing_value_rejected() {
        let (_, msg) = parse_err("a=");
        assert!(msg.contains("end of input"), "{}", msg);
    }

    #[test]
    fn too_deep_path_is_parse_error() {
        let src = vec!["n"; crate::tree::MAX_DEPTH + 1].join(".");
        let (pos, _) = parse_err(&src);
        assert_eq!(pos, 1);
    }

    #[test]
    fn script_splits_on_semicolons_and_newlines() {
        let ops = parse_script("a=1; b=\"x;y\"\n\n c!\n;d-;").unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[1], Operation::Write { path: path("b"), value: Scalar::from("x;y") });
        assert_eq!(ops[2], Operation::Read { path: path("c"), safe: true });
        assert_eq!(ops[3], Operation::Delete { path: path("d") });
    }

    #[test]
    fn empty_script_is_empty() {
        assert!(parse_script("").unwrap().is_empty());
        assert!(parse_script(" ;\n ; ").unwrap().is_empty());
    }

    #[test]
    fn script_error_names_line() {
        match parse_script("a=1\nb=oops") {
            Err(ConfigError::Parse { position, message }) => {
                assert_eq!(position, 3);
                assert!(message.starts_with("line 2:"), "{}", message);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn script_string_cannot_span_lines() {
        assert!(parse_script("a=\"one\ntwo\"").is_err());
    }
}
