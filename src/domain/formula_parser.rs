//! Formula parser.
//!
//! Recursive descent parser for the indicator formula grammar. Converts text to
//! an [`Expr`] with error messages carrying the byte offset of the problem.
//!
//! The depth limit bounds the height of the resulting tree: parentheses,
//! calls, unary operators and every link of an operator chain each count as
//! one level, so evaluating or dropping an accepted tree never recurses
//! deeper than the limit.
//!
//! ```text
//! expr       := or
//! or         := and ( "|" and )*
//! and        := comparison ( "&" comparison )*
//! comparison := additive ( ("<" | "<=" | ">" | ">=" | "==" | "!=") additive )?
//! additive   := term ( ("+" | "-") term )*
//! term       := unary ( ("*" | "/") unary )*
//! unary      := ("-" | "+") unary | power
//! power      := primary ( "**" unary )?
//! primary    := NUMBER | IDENT | IDENT "(" args ")" | "(" expr ")"
//! ```

use crate::domain::error::ParseError;
use crate::domain::formula::{BinaryOp, Expr, UnaryOp};

pub const DEFAULT_MAX_FORMULA_LEN: usize = 4096;
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Limits applied while parsing untrusted formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_len: usize,
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_FORMULA_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, max_depth: usize) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Consume `op` if the input continues with it and not with any of `unless`.
    fn consume_operator(&mut self, op: &str, unless: &[&str]) -> bool {
        self.skip_whitespace();
        let remaining = self.remaining();
        if remaining.starts_with(op) && !unless.iter().any(|u| remaining.starts_with(u)) {
            self.pos += op.len();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error(format!(
                "formula nesting exceeds maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        // Exponent only counts when digits follow, so "2E" stays an error below.
        if matches!(self.peek(), Some('e') | Some('E')) {
            let rest = &self.remaining()[1..];
            let sign_len = usize::from(rest.starts_with('+') || rest.starts_with('-'));
            if rest[sign_len..].starts_with(|c: char| c.is_ascii_digit()) {
                self.pos += 1 + sign_len;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        if self
            .peek()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            return Err(self.error(format!(
                "invalid number: '{}{}'",
                &self.input[start..self.pos],
                self.peek_word()
            )));
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut left = self.parse_and()?;
        while self.consume_operator("|", &[]) {
            self.enter()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut left = self.parse_comparison()?;
        while self.consume_operator("&", &[]) {
            self.enter()?;
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        let op = if self.consume_operator("<=", &[]) {
            BinaryOp::Le
        } else if self.consume_operator(">=", &[]) {
            BinaryOp::Ge
        } else if self.consume_operator("==", &[]) {
            BinaryOp::Eq
        } else if self.consume_operator("!=", &[]) {
            BinaryOp::Ne
        } else if self.consume_operator("<", &[]) {
            BinaryOp::Lt
        } else if self.consume_operator(">", &[]) {
            BinaryOp::Gt
        } else {
            if self.peek() == Some('=') {
                return Err(self.error("assignment is not allowed, use '==' to compare"));
            }
            return Ok(left);
        };

        self.enter()?;
        let right = self.parse_additive();
        self.leave();
        Ok(binary(op, left, right?))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut left = self.parse_term()?;
        loop {
            let op = if self.consume_operator("+", &[]) {
                BinaryOp::Add
            } else if self.consume_operator("-", &[]) {
                BinaryOp::Sub
            } else {
                break;
            };
            self.enter()?;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.consume_operator("*", &["**"]) {
                BinaryOp::Mul
            } else if self.consume_operator("/", &[]) {
                BinaryOp::Div
            } else {
                break;
            };
            self.enter()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = if self.consume_operator("-", &[]) {
            UnaryOp::Neg
        } else if self.consume_operator("+", &[]) {
            UnaryOp::Plus
        } else {
            return self.parse_power();
        };

        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.consume_operator("**", &[]) {
            // Right-associative and binds tighter than a unary minus on its left.
            self.enter()?;
            let exponent = self.parse_unary();
            self.leave();
            return Ok(binary(BinaryOp::Pow, base, exponent?));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();

        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => Ok(Expr::Number(self.parse_number()?)),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let name = self.parse_identifier();
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    self.advance();
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Some('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            _ => {
                let word = self.peek_word();
                Err(self.error(format!("expected expression, found '{}'", word)))
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(args);
        }

        args.push(self.parse_expr()?);
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.advance();
                    break;
                }
                Some(',') => {
                    self.advance();
                    args.push(self.parse_expr()?);
                }
                Some(ch) => {
                    return Err(self.error(format!("expected ',' or ')', found '{}'", ch)));
                }
                None => return Err(self.error("expected ')', found end of input")),
            }
        }
        Ok(args)
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after expression: '{}'",
                self.remaining()
            )));
        }
        Ok(expr)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    parse_with_limits(input, &ParseLimits::default())
}

pub fn parse_with_limits(input: &str, limits: &ParseLimits) -> Result<Expr, ParseError> {
    if input.len() > limits.max_len {
        return Err(ParseError {
            message: format!(
                "formula is {} bytes, maximum is {}",
                input.len(),
                limits.max_len
            ),
            position: limits.max_len,
        });
    }
    let mut parser = Parser::new(input, limits.max_depth);
    parser.parse()
}
