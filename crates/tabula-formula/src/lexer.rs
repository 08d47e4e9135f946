//! Formula lexer
//!
//! Turns formula text into a token stream. Positions are 0-based character offsets.

use crate::error::ParseError;
use std::fmt;

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Identifiers (function names)
    Identifier(String),

    // Keywords / logical operators
    And,
    Or,
    Not,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    EqualEqual,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Conditional
    Question,
    Colon,

    // Delimiters
    Comma,
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::And => f.write_str("'and'"),
            TokenKind::Or => f.write_str("'or'"),
            TokenKind::Not => f.write_str("'not'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::EqualEqual => f.write_str("'=='"),
            TokenKind::NotEqual => f.write_str("'!='"),
            TokenKind::Greater => f.write_str("'>'"),
            TokenKind::GreaterEqual => f.write_str("'>='"),
            TokenKind::Less => f.write_str("'<'"),
            TokenKind::LessEqual => f.write_str("'<='"),
            TokenKind::Question => f.write_str("'?'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

/// A token with its starting position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Tokenize a formula.
///
/// The returned stream always ends with a [`TokenKind::Eof`] token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(input).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let position = self.pos;
            let Some(c) = self.peek_char() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    position,
                });
                return Ok(tokens);
            };
            let kind = self.scan_token(c)?;
            tokens.push(Token { kind, position });
        }
    }

    // === Token scanning ===

    fn scan_token(&mut self, c: char) -> Result<TokenKind, ParseError> {
        // String literal
        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return Ok(self.scan_number());
        }

        // Identifier or keyword
        if c.is_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        // Two-character operators
        let next = self.peek_char_at(1);
        let two = match (c, next) {
            ('=', Some('=')) => Some(TokenKind::EqualEqual),
            ('!', Some('=')) => Some(TokenKind::NotEqual),
            ('>', Some('=')) => Some(TokenKind::GreaterEqual),
            ('<', Some('=')) => Some(TokenKind::LessEqual),
            ('&', Some('&')) => Some(TokenKind::And),
            ('|', Some('|')) => Some(TokenKind::Or),
            _ => None,
        };
        if let Some(kind) = two {
            self.advance();
            self.advance();
            return Ok(kind);
        }

        // Single-character tokens
        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ',' => TokenKind::Comma,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '>' => TokenKind::Greater,
            '<' => TokenKind::Less,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '!' => TokenKind::Not,
            other => {
                return Err(ParseError::new(
                    format!("Unexpected character '{}'", other),
                    self.pos,
                ))
            }
        };
        self.advance();
        Ok(kind)
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(ParseError::new("Unterminated string literal", start));
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(TokenKind::String(s));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self
                        .peek_char()
                        .ok_or_else(|| ParseError::new("Unterminated string literal", start))?;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;

        // Integer part
        self.skip_digits();

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = self.peek_char_at(1).map_or(false, |c| c == '+' || c == '-');
            let digit_at = if sign { 2 } else { 1 };
            if self
                .peek_char_at(digit_at)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        TokenKind::Number(text.parse().unwrap_or(0.0))
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        match text.to_ascii_lowercase().as_str() {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Identifier(text),
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}
