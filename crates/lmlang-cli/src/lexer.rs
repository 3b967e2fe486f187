//! Lexer for the textual IR (SPEC §6), grounded in the original
//! prototype's `parse_token`/`KEYWORDS`/`OPERATORS` tables but adapted
//! to a conventional owned-`Token` stream instead of threading a
//! remaining-source string through every call site.

use thiserror::Error;

const KEYWORDS: &[&str] = &["jmp", "print", "ret", "free", "br", "set", "get", "end", "ref", "move", "brw", "alloc", "nop"];

/// Two-character operators are tried before their one-character prefix,
/// so `>=` lexes whole rather than as `>` followed by `=`.
const TWO_CHAR_OPERATORS: &[&str] = &[">=", "<=", "==", "!="];
const ONE_CHAR_OPERATORS: &[char] = &['+', '-', '*', '/', '%', '>', '<'];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    /// A newline, or end-of-block `end`/`eof` equivalent -- the textual
    /// IR's statement separator.
    End,
    Number(i64),
    Ident(String),
    Keyword(String),
    Operator(String),
    /// `@`, `$`, `:`, `=`, or the two-character `->`.
    Special(String),
    Paren(char),
    /// `,` or `.`.
    Period(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{0}' at line {1}, column {2}")]
    UnexpectedChar(char, u32, u32),
}

pub struct Lexer<'a> {
    rest: &'a str,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { rest: source, line: 1, column: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.rest.chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let mut chars = self.rest.chars();
        let c = chars.next()?;
        self.rest = chars.as_str();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_spaces_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => {
                    self.advance();
                }
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_spaces_and_comments();
        let (line, column) = (self.line, self.column);

        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, line, column });
        };

        if c == '\n' {
            // Collapse a run of blank lines (and any interleaved
            // whitespace) into a single `End` token.
            while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
                self.advance();
            }
            return Ok(Token { kind: TokenKind::End, line, column });
        }

        if c.is_ascii_digit() {
            let mut digits = String::new();
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                digits.push(self.advance().unwrap());
            }
            let n: i64 = digits.parse().expect("scanned only ascii digits");
            return Ok(Token { kind: TokenKind::Number(n), line, column });
        }

        if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_' || ch == '*') {
                ident.push(self.advance().unwrap());
            }
            let kind = if KEYWORDS.contains(&ident.as_str()) { TokenKind::Keyword(ident) } else { TokenKind::Ident(ident) };
            return Ok(Token { kind, line, column });
        }

        if c == '-' && self.peek2() == Some('>') {
            self.advance();
            self.advance();
            return Ok(Token { kind: TokenKind::Special("->".to_string()), line, column });
        }

        if let (Some(a), Some(b)) = (self.peek(), self.peek2()) {
            let two: String = [a, b].iter().collect();
            if TWO_CHAR_OPERATORS.contains(&two.as_str()) {
                self.advance();
                self.advance();
                return Ok(Token { kind: TokenKind::Operator(two), line, column });
            }
        }

        if ONE_CHAR_OPERATORS.contains(&c) {
            self.advance();
            return Ok(Token { kind: TokenKind::Operator(c.to_string()), line, column });
        }

        match c {
            '@' | '$' | ':' | '=' => {
                self.advance();
                Ok(Token { kind: TokenKind::Special(c.to_string()), line, column })
            }
            '(' | '[' | '{' | ')' | ']' | '}' => {
                self.advance();
                Ok(Token { kind: TokenKind::Paren(c), line, column })
            }
            ',' | '.' => {
                self.advance();
                Ok(Token { kind: TokenKind::Period(c), line, column })
            }
            other => Err(LexError::UnexpectedChar(other, line, column)),
        }
    }
}
