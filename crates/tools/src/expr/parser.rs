//! Recursive-descent parser producing the expression AST.
//!
//! Precedence, loosest first:
//! `or`/`||`, `and`/`&&`, `not`, comparisons and membership,
//! `+ -`, `* / %`, unary `! -`, primary.

use serde_json::Value;

use super::lexer::{Token, TokenKind};
use super::ExprError;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Expression syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Array(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>, source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end: source_len,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(self.error_here("empty expression"));
        }
        let expr = self.parse_or()?;
        if self.pos < self.tokens.len() {
            return Err(self.error_here("unexpected token"));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos).map(|t| t.kind.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: &str) -> ExprError {
        let position = self
            .tokens
            .get(self.pos)
            .map(|t| t.position)
            .unwrap_or(self.end);
        ExprError::Parse {
            position,
            message: message.to_string(),
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(TokenKind::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn eat_keyword(&mut self, word: &'static str) -> bool {
        if matches!(self.peek(), Some(TokenKind::Keyword(k)) if *k == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat_op(&["||"]).is_some() || self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.eat_op(&["&&"]).is_some() || self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;

        let op = if let Some(op) = self.eat_op(&["==", "!=", ">=", "<=", ">", "<"]) {
            match op {
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                ">=" => BinaryOp::Gte,
                "<=" => BinaryOp::Lte,
                ">" => BinaryOp::Gt,
                _ => BinaryOp::Lt,
            }
        } else if self.eat_keyword("in") {
            BinaryOp::In
        } else if self.eat_keyword("contains") {
            BinaryOp::Contains
        } else {
            return Ok(left);
        };

        let right = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.parse_multiplicative()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let right = self.parse_unary()?;
            let op = match op {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(op) = self.eat_op(&["!", "-"]) {
            let inner = self.parse_unary()?;
            let op = if op == "!" { UnaryOp::Not } else { UnaryOp::Neg };
            return Ok(Expr::Unary(op, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let err = self.error_here("expected a value, path or '('");
        match self.advance() {
            Some(TokenKind::Literal(value)) => Ok(Expr::Literal(value)),
            Some(TokenKind::Path(segments)) => {
                if matches!(self.peek(), Some(TokenKind::LParen)) {
                    return Err(self.error_here("function calls are not supported"));
                }
                Ok(Expr::Path(segments))
            }
            Some(TokenKind::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(TokenKind::RParen) => Ok(inner),
                    _ => Err(self.error_here("expected ')'")),
                }
            }
            Some(TokenKind::LBracket) => self.parse_array(),
            _ => Err(err),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ExprError> {
        let mut items = Vec::new();
        if matches!(self.peek(), Some(TokenKind::RBracket)) {
            self.pos += 1;
            return Ok(Expr::Array(items));
        }
        loop {
            items.push(self.parse_or()?);
            match self.advance() {
                Some(TokenKind::Comma) => continue,
                Some(TokenKind::RBracket) => return Ok(Expr::Array(items)),
                _ => return Err(self.error_here("expected ',' or ']'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;
    use serde_json::json;

    fn parse(src: &str) -> Result<Expr, ExprError> {
        Parser::new(tokenize(src)?, src.len()).parse()
    }

    fn path(p: &str) -> Box<Expr> {
        Box::new(Expr::Path(p.split('.').map(String::from).collect()))
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let expr = parse("a + b * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                path("a"),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    path("b"),
                    Box::new(Expr::Literal(json!(2)))
                ))
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a || b && c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                path("a"),
                Box::new(Expr::Binary(BinaryOp::And, path("b"), path("c")))
            )
        );
    }

    #[test]
    fn test_array_literal() {
        let expr = parse("x in [1, 'two']").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::In,
                path("x"),
                Box::new(Expr::Array(vec![
                    Expr::Literal(json!(1)),
                    Expr::Literal(json!("two"))
                ]))
            )
        );
    }

    #[test]
    fn test_function_call_rejected() {
        let err = parse("exec('rm -rf /')").unwrap_err();
        assert_eq!(
            err,
            ExprError::Parse {
                position: 4,
                message: "function calls are not supported".to_string()
            }
        );
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse("a b").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("").is_err());
    }
}
