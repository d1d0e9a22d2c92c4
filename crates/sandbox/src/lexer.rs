//! Tokenizer for generator scripts.
//!
//! Produces an indentation-aware token stream (`Indent`/`Dedent`/`Newline`)
//! with implicit line joining inside brackets. f-strings are split into
//! literal and replacement-field pieces here; the parser turns each field's
//! source into an expression.

use std::fmt;

const MAX_INDENT_LEVELS: usize = 100;

/// Operators, longest first so that matching is greedy.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "!=", "%=", "&=", "**", "*=", "+=", "-=", "->", "//", "/=",
    ":=", "<<", "<=", "==", ">=", ">>", "@=", "^=", "|=", "%", "&", "(", ")", "*", "+", ",", "-",
    ".", "/", ":", ";", "<", "=", ">", "@", "[", "]", "^", "{", "|", "}", "~",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes,
    FString(Vec<FPiece>),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// One piece of an f-string.
#[derive(Debug, Clone, PartialEq)]
pub enum FPiece {
    Literal(String),
    Field {
        source: String,
        conversion: Option<char>,
        spec: Option<Vec<FPiece>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

type LexResult<T> = std::result::Result<T, SyntaxError>;

pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    brackets: usize,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: 0,
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn error<T>(&self, message: impl Into<String>) -> LexResult<T> {
        Err(SyntaxError::new(message, self.line))
    }

    fn run(mut self) -> LexResult<Vec<Token>> {
        loop {
            if self.at_line_start && self.brackets == 0 {
                if !self.indentation()? {
                    break;
                }
                continue;
            }

            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\x0c' | '\r' => self.pos += 1,
                '\n' => {
                    self.pos += 1;
                    if self.brackets == 0 {
                        self.end_logical_line();
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                '#' => self.skip_comment(),
                '\\' => {
                    if self.peek_at(1) == Some('\n') {
                        self.pos += 2;
                        self.line += 1;
                    } else if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') {
                        self.pos += 3;
                        self.line += 1;
                    } else {
                        return self.error("unexpected character after line continuation character");
                    }
                }
                '0'..='9' => {
                    let kind = self.number()?;
                    self.push(kind);
                }
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    let kind = self.number()?;
                    self.push(kind);
                }
                '"' | '\'' => {
                    let kind = self.string("")?;
                    self.push(kind);
                }
                c if c.is_alphabetic() || c == '_' => self.word()?,
                _ => self.operator()?,
            }
        }

        if self.brackets > 0 {
            return self.error("unexpected EOF while parsing: bracket was never closed");
        }
        self.end_logical_line();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent);
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn end_logical_line(&mut self) {
        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline))
        {
            self.push(TokenKind::Newline);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Measure leading whitespace and emit indentation tokens.
    /// Returns false at end of input.
    fn indentation(&mut self) -> LexResult<bool> {
        let mut column = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => column += 1,
                '\t' => column = (column / 8 + 1) * 8,
                '\x0c' => column = 0,
                '\r' => {}
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            Some(_) => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if column > current {
            if self.indents.len() > MAX_INDENT_LEVELS {
                return self.error("too many levels of indentation");
            }
            self.indents.push(column);
            self.push(TokenKind::Indent);
        } else if column < current {
            while self.indents.last().is_some_and(|&level| level > column) {
                self.indents.pop();
                self.push(TokenKind::Dedent);
            }
            if self.indents.last().copied().unwrap_or(0) != column {
                return self.error("unindent does not match any outer indentation level");
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn word(&mut self) -> LexResult<()> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('"') | Some('\'')) {
            let prefix = word.to_lowercase();
            if matches!(
                prefix.as_str(),
                "r" | "u" | "f" | "b" | "rb" | "br" | "fr" | "rf"
            ) {
                let kind = self.string(&prefix)?;
                self.push(kind);
                return Ok(());
            }
        }
        self.push(TokenKind::Name(word));
        Ok(())
    }

    fn operator(&mut self) -> LexResult<()> {
        for op in OPERATORS {
            let len = op.chars().count();
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matches {
                self.pos += len;
                match *op {
                    "(" | "[" | "{" => self.brackets += 1,
                    ")" | "]" | "}" => self.brackets = self.brackets.saturating_sub(1),
                    _ => {}
                }
                self.push(TokenKind::Op(op));
                return Ok(());
            }
        }
        let c = self.peek().unwrap_or(' ');
        self.error(format!("invalid character '{}' (U+{:04X})", c, c as u32))
    }

    fn number(&mut self) -> LexResult<TokenKind> {
        let start = self.pos;

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                    self.pos += 1;
                }
                let digits: String = self.chars[digits_start..self.pos]
                    .iter()
                    .filter(|&&c| c != '_')
                    .collect();
                return match i64::from_str_radix(&digits, radix) {
                    Ok(value) => Ok(TokenKind::Int(value)),
                    Err(_) => self.error("invalid numeric literal"),
                };
            }
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += digit_at;
                self.digits();
            }
        }
        match self.peek() {
            Some('j' | 'J') => return self.error("complex literals are not supported"),
            Some(c) if c.is_alphanumeric() || c == '_' => {
                return self.error("invalid decimal literal")
            }
            _ => {}
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        if is_float {
            return match text.parse::<f64>() {
                Ok(value) => Ok(TokenKind::Float(value)),
                Err(_) => self.error("invalid decimal literal"),
            };
        }
        if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
            return self.error(
                "leading zeros in decimal integer literals are not permitted; use an 0o prefix for octal integers",
            );
        }
        match text.parse::<i64>() {
            Ok(value) => Ok(TokenKind::Int(value)),
            Err(_) => self.error("integer literal is too large"),
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }

    fn string(&mut self, prefix: &str) -> LexResult<TokenKind> {
        let raw = prefix.contains('r');
        let start_line = self.line;
        let Some(quote) = self.peek() else {
            return self.error("unterminated string literal");
        };
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut body = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new(
                    if triple {
                        "unterminated triple-quoted string literal"
                    } else {
                        "unterminated string literal"
                    },
                    start_line,
                ));
            };
            if c == '\\' {
                body.push(c);
                self.pos += 1;
                if let Some(next) = self.peek() {
                    if next == '\n' {
                        self.line += 1;
                    }
                    body.push(next);
                    self.pos += 1;
                }
                continue;
            }
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\n' {
                if !triple {
                    return self.error("unterminated string literal");
                }
                self.line += 1;
            }
            body.push(c);
            self.pos += 1;
        }

        if prefix.contains('b') {
            return Ok(TokenKind::Bytes);
        }
        if prefix.contains('f') {
            let chars: Vec<char> = body.chars().collect();
            let mut index = 0;
            let pieces = fstring_pieces(&chars, &mut index, raw, false, start_line)?;
            return Ok(TokenKind::FString(pieces));
        }
        if raw {
            Ok(TokenKind::Str(body))
        } else {
            unescape(&body, start_line).map(TokenKind::Str)
        }
    }
}

/// Process backslash escapes in a non-raw literal.
pub fn unescape(body: &str, line: usize) -> LexResult<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 >= chars.len() {
            out.push(c);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        i += 2;
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                let mut taken = 1;
                while taken < 3 && i < chars.len() && ('0'..='7').contains(&chars[i]) {
                    value = value * 8 + chars[i].to_digit(8).unwrap_or(0);
                    i += 1;
                    taken += 1;
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.iter().skip(i).take(width).collect();
                let decoded = (hex.chars().count() == width)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(SyntaxError::new(
                            format!("truncated \\{} escape", next),
                            line,
                        ))
                    }
                }
                i += width;
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// Split f-string text into pieces. With `in_spec`, stops at the `}` closing
/// the enclosing replacement field (without consuming it).
fn fstring_pieces(
    chars: &[char],
    index: &mut usize,
    raw: bool,
    in_spec: bool,
    line: usize,
) -> LexResult<Vec<FPiece>> {
    let mut pieces = Vec::new();
    let mut literal = String::new();

    let flush = |literal: &mut String, pieces: &mut Vec<FPiece>| -> LexResult<()> {
        if literal.is_empty() {
            return Ok(());
        }
        let text = if raw || in_spec {
            std::mem::take(literal)
        } else {
            unescape(&std::mem::take(literal), line)?
        };
        pieces.push(FPiece::Literal(text));
        Ok(())
    };

    while *index < chars.len() {
        let c = chars[*index];
        match c {
            '{' if !in_spec && chars.get(*index + 1) == Some(&'{') => {
                literal.push('{');
                *index += 2;
            }
            '}' if in_spec => break,
            '}' if chars.get(*index + 1) == Some(&'}') => {
                literal.push('}');
                *index += 2;
            }
            '}' => {
                return Err(SyntaxError::new(
                    "f-string: single '}' is not allowed",
                    line,
                ))
            }
            '{' => {
                flush(&mut literal, &mut pieces)?;
                *index += 1;
                pieces.push(fstring_field(chars, index, raw, line)?);
            }
            '\\' if !raw && !in_spec => {
                literal.push(c);
                if let Some(&next) = chars.get(*index + 1) {
                    literal.push(next);
                }
                *index += 2;
            }
            _ => {
                literal.push(c);
                *index += 1;
            }
        }
    }
    flush(&mut literal, &mut pieces)?;
    Ok(pieces)
}

/// Parse one `{expr[!conv][:spec]}` field; `index` points just past `{`.
fn fstring_field(chars: &[char], index: &mut usize, raw: bool, line: usize) -> LexResult<FPiece> {
    let mut source = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    while *index < chars.len() {
        let c = chars[*index];
        if let Some(q) = quote {
            source.push(c);
            if c == q {
                quote = None;
            }
            *index += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth > 0 => depth -= 1,
            '}' => break,
            '!' if depth == 0 && chars.get(*index + 1) != Some(&'=') => break,
            ':' if depth == 0 => break,
            _ => {}
        }
        source.push(c);
        *index += 1;
    }

    if source.trim().is_empty() {
        return Err(SyntaxError::new(
            "f-string: empty expression not allowed",
            line,
        ));
    }

    let mut conversion = None;
    if chars.get(*index) == Some(&'!') {
        match chars.get(*index + 1) {
            Some(&c @ ('r' | 's' | 'a')) => conversion = Some(c),
            _ => {
                return Err(SyntaxError::new(
                    "f-string: invalid conversion character: expected 's', 'r', or 'a'",
                    line,
                ))
            }
        }
        *index += 2;
    }

    let mut spec = None;
    if chars.get(*index) == Some(&':') {
        *index += 1;
        spec = Some(fstring_pieces(chars, index, raw, true, line)?);
    }

    if chars.get(*index) != Some(&'}') {
        return Err(SyntaxError::new("f-string: expecting '}'", line));
    }
    *index += 1;

    Ok(FPiece::Field {
        source,
        conversion,
        spec,
    })
}
