//! Transform-script parser
//!
//! Recursive descent, one function per precedence level:
//! `||` < `&&` < equality < comparison < additive < multiplicative < unary
//! < postfix (`.field`, `[index]`) < primary.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Number, Value};

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};

/// Nesting bound for blocks and expressions
const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Lex and parse a script
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize();
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    loops: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            loops: 0,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        if let Some(token) = self
            .tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Error(_)))
        {
            let message = match &token.kind {
                TokenKind::Error(msg) => msg.clone(),
                _ => "Lexer error".to_string(),
            };
            return Err(ParseError {
                message,
                line: token.span.line,
                column: token.span.column,
            });
        }

        let mut functions: Vec<FnDef> = Vec::new();
        while !self.is_at_end() {
            let span = self.current().span;
            let function = self.parse_fn()?;
            if functions.iter().any(|f| f.name == function.name) {
                return Err(error_at(
                    span,
                    format!("Function '{}' is defined twice", function.name),
                ));
            }
            functions.push(function);
        }

        if functions.is_empty() {
            return Err(self.error("Expected at least one function definition"));
        }
        Ok(Program { functions })
    }

    fn parse_fn(&mut self) -> Result<FnDef, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Fn)?;
        let name = self.expect_identifier()?;

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut seen = HashSet::new();
        while !self.check(&TokenKind::RParen) {
            let param_span = self.current().span;
            let param = self.expect_identifier()?;
            if !seen.insert(param.clone()) {
                return Err(error_at(
                    param_span,
                    format!("Duplicate parameter '{}'", param),
                ));
            }
            params.push(param);
            if !self.check(&TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(FnDef {
            name,
            params,
            body,
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.enter()?;
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(self.error("Expected '}'"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        self.leave();
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let span = self.current().span;
        match &self.current().kind {
            TokenKind::Let => {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Let { name, value })
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => {
                self.advance();
                let var = self.expect_identifier()?;
                self.expect(TokenKind::In)?;
                let iterable = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                Ok(Stmt::For {
                    var,
                    iterable,
                    body,
                })
            }
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                Ok(Stmt::While { condition, body })
            }
            TokenKind::Break => {
                self.ensure_in_loop("break")?;
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Break(span))
            }
            TokenKind::Continue => {
                self.ensure_in_loop("continue")?;
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Continue(span))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Return(value))
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.check(&TokenKind::Assign) {
                    if !matches!(
                        expr.kind,
                        ExprKind::Var(_) | ExprKind::Field { .. } | ExprKind::Index { .. }
                    ) {
                        return Err(error_at(expr.span, "Invalid assignment target".into()));
                    }
                    self.advance();
                    let value = self.parse_expr()?;
                    self.expect(TokenKind::Semicolon)?;
                    return Ok(Stmt::Assign {
                        target: expr,
                        value,
                    });
                }
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.loops += 1;
        let body = self.parse_block();
        self.loops -= 1;
        body
    }

    fn ensure_in_loop(&self, keyword: &str) -> Result<(), ParseError> {
        if self.loops == 0 {
            return Err(self.error(&format!("'{}' outside of a loop", keyword)));
        }
        Ok(())
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let mut branches = Vec::new();
        let mut otherwise = None;

        self.expect(TokenKind::If)?;
        let condition = self.parse_expr()?;
        branches.push((condition, self.parse_block()?));

        while self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                self.advance();
                let condition = self.parse_expr()?;
                branches.push((condition, self.parse_block()?));
            } else {
                otherwise = Some(self.parse_block()?);
                break;
            }
        }

        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current().span;
        let op = match self.current().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand?),
            },
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.current().span;
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_field_name()?;
                    expr = Expr {
                        kind: ExprKind::Field {
                            target: Box::new(expr),
                            name,
                        },
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr {
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current().span;
        let kind = match self.current().kind.clone() {
            TokenKind::Int(v) => {
                self.advance();
                ExprKind::Literal(Value::from(v))
            }
            TokenKind::Float(v) => {
                self.advance();
                let number = Number::from_f64(v).ok_or_else(|| self.error("Invalid number"))?;
                ExprKind::Literal(Value::Number(number))
            }
            TokenKind::String(s) => {
                self.advance();
                ExprKind::Literal(Value::String(s))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Value::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(Value::Null)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_list(TokenKind::RParen)?;
                    ExprKind::Call { name, args }
                } else {
                    ExprKind::Var(name)
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::Array(self.parse_list(TokenKind::RBracket)?)
            }
            TokenKind::LBrace => {
                self.advance();
                ExprKind::Object(self.parse_entries()?)
            }
            other => {
                return Err(self.error(&format!("Unexpected {}", other.describe())));
            }
        };
        Ok(Expr { kind, span })
    }

    /// Comma-separated expressions up to `close`; trailing comma allowed
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.check(&close) {
            items.push(self.parse_expr()?);
            if !self.check(&close) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_entries(&mut self) -> Result<Vec<(String, Expr)>, ParseError> {
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = match self.current().kind.clone() {
                TokenKind::String(s) => {
                    self.advance();
                    s
                }
                _ => self.expect_field_name()?,
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.check(&TokenKind::RBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(entries)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "Expected {}, found {}",
                kind.describe(),
                self.current().kind.describe()
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(&format!("Expected identifier, found {}", other.describe()))),
        }
    }

    /// Field names may be identifiers, keywords or integers (`row.0`)
    fn expect_field_name(&mut self) -> Result<String, ParseError> {
        let name = match &self.current().kind {
            TokenKind::Identifier(s) => s.clone(),
            TokenKind::Int(v) => v.to_string(),
            TokenKind::Fn => "fn".into(),
            TokenKind::Let => "let".into(),
            TokenKind::If => "if".into(),
            TokenKind::Else => "else".into(),
            TokenKind::For => "for".into(),
            TokenKind::In => "in".into(),
            TokenKind::While => "while".into(),
            TokenKind::Break => "break".into(),
            TokenKind::Continue => "continue".into(),
            TokenKind::Return => "return".into(),
            TokenKind::True => "true".into(),
            TokenKind::False => "false".into(),
            TokenKind::Null => "null".into(),
            other => {
                return Err(self.error(&format!("Expected field name, found {}", other.describe())))
            }
        };
        self.advance();
        Ok(name)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("Nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn error(&self, msg: &str) -> ParseError {
        error_at(self.current().span, msg.to_string())
    }
}

fn error_at(span: Span, message: String) -> ParseError {
    ParseError {
        message,
        line: span.line,
        column: span.column,
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span;
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let program = parse(
            r#"
            fn process(x) {
                let out = [];
                for row in x {
                    out = push(out, {value: row.value * 2});
                }
                return {y: out};
            }
            "#,
        )
        .unwrap();
        let process = program.function("process").unwrap();
        assert_eq!(process.params, vec!["x"]);
        assert_eq!(process.body.len(), 3);
    }

    #[test]
    fn test_precedence() {
        let program = parse("fn f() { return 1 + 2 * 3 == 7 || false; }").unwrap();
        let Stmt::Return(Some(expr)) = &program.functions[0].body[0] else {
            panic!("expected return");
        };
        let ExprKind::Binary { op, left, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(
            left.kind,
            ExprKind::Binary {
                op: BinaryOp::Eq,
                ..
            }
        ));
    }

    #[test]
    fn test_else_if_chain() {
        let program =
            parse("fn f(a) { if a { return 1; } else if !a { return 2; } else { return 3; } }")
                .unwrap();
        let Stmt::If {
            branches,
            otherwise,
        } = &program.functions[0].body[0]
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_error_positions() {
        let err = parse("fn process(x) {\n  let = 1;\n}").unwrap_err();
        assert_eq!((err.line, err.column), (2, 7));
        assert!(err.to_string().contains("line 2, column 7"));
    }

    #[test]
    fn test_lexer_errors_surface() {
        let err = parse("fn f() { return \"open; }").unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse("fn f() { 1 = 2; }").is_err());
        assert!(parse("fn f(r) { r.a[0] = 2; }").is_ok());
    }

    #[test]
    fn test_duplicate_definitions_rejected() {
        assert!(parse("fn f() {} fn f() {}").is_err());
        assert!(parse("fn f(a, a) {}").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(parse("fn f() { break; }").is_err());
        assert!(parse("fn f() { while true { if true { break; } } }").is_ok());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let source = format!("fn f() {{ return {}1{}; }}", "(".repeat(500), ")".repeat(500));
        let err = parse(&source).unwrap_err();
        assert!(err.message.contains("Nesting"));
    }

    #[test]
    fn test_keyword_fields_and_string_keys() {
        let program = parse(r#"fn f(r) { return {"in": r.in, if: 1}; }"#).unwrap();
        assert_eq!(program.functions.len(), 1);
    }
}
