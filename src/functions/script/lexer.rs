//! Transform-script lexer

use std::iter::Peekable;
use std::str::CharIndices;

use super::token::{Span, Token, TokenKind};

/// Lexer for transform scripts
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
        }
    }

    /// Tokenize the whole source; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                ';' => self.single(TokenKind::Semicolon),
                '.' => self.single(TokenKind::Dot),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                '=' => self.pair('=', TokenKind::Eq, TokenKind::Assign),
                '!' => self.pair('=', TokenKind::Ne, TokenKind::Not),
                '<' => self.pair('=', TokenKind::Le, TokenKind::Lt),
                '>' => self.pair('=', TokenKind::Ge, TokenKind::Gt),
                '&' => self.pair(
                    '&',
                    TokenKind::AndAnd,
                    TokenKind::Error("Unexpected character: &".into()),
                ),
                '|' => self.pair(
                    '|',
                    TokenKind::OrOr,
                    TokenKind::Error("Unexpected character: |".into()),
                ),
                '"' => self.scan_string(),
                c if c.is_ascii_digit() => self.scan_number(),
                c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),
                c => {
                    self.advance();
                    TokenKind::Error(format!("Unexpected character: {}", c))
                }
            },
        };

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// One-character token, or a two-character one when followed by `next`
    fn pair(&mut self, next: char, matched: TokenKind, alone: TokenKind) -> TokenKind {
        self.advance();
        if self.peek_char() == Some(next) {
            self.advance();
            matched
        } else {
            alone
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        match &self.source[start..self.pos] {
            "fn" => TokenKind::Fn,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            ident => TokenKind::Identifier(ident.to_string()),
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        self.consume_digits();

        let mut is_float = false;
        if self.peek_char() == Some('.') && self.peek_second().map_or(false, |c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            self.consume_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                return TokenKind::Error("Malformed exponent".into());
            }
            self.consume_digits();
        }

        let text = &self.source[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => TokenKind::Float(v),
                _ => TokenKind::Error(format!("Invalid number: {}", text)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                Err(_) => TokenKind::Error(format!("Integer literal out of range: {}", text)),
            }
        }
    }

    fn consume_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None | Some('\n') => return TokenKind::Error("Unterminated string".to_string()),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(c) => return TokenKind::Error(format!("Unknown escape: \\{}", c)),
                        None => return TokenKind::Error("Unterminated string".to_string()),
                    };
                    self.advance();
                    value.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::String(value)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut rest = self.source[self.pos..].chars();
        rest.next();
        rest.next()
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}
