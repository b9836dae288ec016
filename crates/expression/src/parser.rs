//! A small recursive-descent parser for the safe expression grammar.
//!
//! Grammar (loosest-binding first):
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := not_expr ("and" not_expr)*
//! not_expr   := "not" not_expr | comparison
//! comparison := membership (("==" | "!=" | "<" | "<=" | ">" | ">=") membership)?
//! membership := postfix (("in" | "not" "in") postfix)?
//! postfix    := primary ("." IDENT ("(" args ")")? | "[" expr "]")*
//! primary    := literal | IDENT ("(" args ")")? | "(" expr ")"
//! args       := (expr ("," expr)*)?
//! ```

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExpressionError, ExpressionSecurityError};

const BOUND_NAMES: &[&str] = &["context", "body", "headers"];
const CALL_WHITELIST: &[&str] = &["len", "str", "int", "float"];
const METHOD_WHITELIST: &[&str] = &["get"];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eof,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            if self.pos >= self.src.len() {
                tokens.push((Token::Eof, start));
                break;
            }
            let c = self.current_char();
            let token = match c {
                '(' => { self.pos += 1; Token::LParen }
                ')' => { self.pos += 1; Token::RParen }
                '[' => { self.pos += 1; Token::LBracket }
                ']' => { self.pos += 1; Token::RBracket }
                '.' => { self.pos += 1; Token::Dot }
                ',' => { self.pos += 1; Token::Comma }
                '=' if self.peek(1) == Some('=') => { self.pos += 2; Token::Eq }
                '!' if self.peek(1) == Some('=') => { self.pos += 2; Token::Ne }
                '<' if self.peek(1) == Some('=') => { self.pos += 2; Token::Le }
                '<' => { self.pos += 1; Token::Lt }
                '>' if self.peek(1) == Some('=') => { self.pos += 2; Token::Ge }
                '>' => { self.pos += 1; Token::Gt }
                '"' | '\'' => self.lex_string(c)?,
                c if c.is_ascii_digit() => self.lex_number(),
                c if c.is_alphabetic() || c == '_' => self.lex_ident_or_keyword(),
                other => {
                    return Err(ExpressionError::Syntax(start, format!("unexpected character {other:?}")));
                }
            };
            tokens.push((token, start));
        }
        Ok(tokens)
    }

    fn current_char(&self) -> char {
        self.src[self.pos..].chars().next().unwrap()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(offset)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.src.len() && self.current_char().is_whitespace() {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, ExpressionError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            if self.pos >= self.src.len() {
                return Err(ExpressionError::Syntax(start, "unterminated string literal".to_string()));
            }
            let c = self.current_char();
            if c == quote {
                self.pos += 1;
                break;
            }
            value.push(c);
            self.pos += c.len_utf8();
        }
        Ok(Token::Str(value))
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        let mut is_float = false;
        while self.pos < self.src.len() {
            let c = self.current_char();
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !is_float && self.peek(1).is_some_and(|n| n.is_ascii_digit()) {
                is_float = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            Token::Float(text.parse().unwrap_or(0.0))
        } else {
            Token::Int(text.parse().unwrap_or(0))
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.src.len() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        match text {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "true" | "True" => Token::Ident("true".to_string()),
            "false" | "False" => Token::Ident("false".to_string()),
            "null" | "None" => Token::Ident("null".to_string()),
            other => Token::Ident(other.to_string()),
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_pos(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::Syntax(self.peek_pos(), format!("expected {expected:?}, found {:?}", self.peek())))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.parse_membership()?;
        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::Ne => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_membership()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_membership(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.parse_postfix()?;
        if matches!(self.peek(), Token::In) {
            self.advance();
            let rhs = self.parse_postfix()?;
            return Ok(Expr::Binary(BinaryOp::In, Box::new(lhs), Box::new(rhs)));
        }
        if matches!(self.peek(), Token::Not) {
            let save = self.pos;
            self.advance();
            if matches!(self.peek(), Token::In) {
                self.advance();
                let rhs = self.parse_postfix()?;
                return Ok(Expr::Binary(BinaryOp::NotIn, Box::new(lhs), Box::new(rhs)));
            }
            self.pos = save;
        }
        Ok(lhs)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        Token::Ident(name) => name,
                        other => {
                            return Err(ExpressionError::Syntax(self.peek_pos(), format!("expected attribute name, found {other:?}")));
                        }
                    };
                    if name.starts_with('_') {
                        return Err(ExpressionSecurityError::ForbiddenAttribute(name).into());
                    }
                    if matches!(self.peek(), Token::LParen) {
                        if !METHOD_WHITELIST.contains(&name.as_str()) {
                            return Err(ExpressionSecurityError::ForbiddenCall(name).into());
                        }
                        self.advance();
                        let args = self.parse_args()?;
                        expr = Expr::MethodCall(Box::new(expr), name, args);
                    } else {
                        expr = Expr::Attr(Box::new(expr), name);
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(ExpressionError::Syntax(self.peek_pos(), format!("expected , or ), found {other:?}")));
                }
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let pos = self.peek_pos();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                _ => {
                    if matches!(self.peek(), Token::LParen) {
                        if !CALL_WHITELIST.contains(&name.as_str()) {
                            return Err(ExpressionSecurityError::ForbiddenCall(name).into());
                        }
                        self.advance();
                        let args = self.parse_args()?;
                        Ok(Expr::Call(name, args))
                    } else {
                        if !BOUND_NAMES.contains(&name.as_str()) {
                            return Err(ExpressionSecurityError::UnboundIdentifier(name).into());
                        }
                        Ok(Expr::Ident(name))
                    }
                }
            },
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExpressionError::Syntax(pos, format!("unexpected token {other:?}"))),
        }
    }
}

/// Parses an expression string into an [`Expr`] tree.
///
/// Rejects (at parse time, via [`ExpressionSecurityError`]) any identifier
/// outside `context`/`body`/`headers`, any attribute starting with `_`, and
/// any call to a function or method outside the fixed whitelist.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if !matches!(parser.peek(), Token::Eof) {
        return Err(ExpressionError::Syntax(parser.peek_pos(), format!("unexpected trailing token {:?}", parser.peek())));
    }
    Ok(expr)
}
