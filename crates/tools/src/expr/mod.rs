//! Restricted expression language.
//!
//! Used by `condition` and `transform` steps. Supports literals, dotted paths,
//! comparisons, membership, boolean connectives and basic arithmetic. There is
//! no function call syntax and no assignment, so evaluating an expression can
//! only ever read from the value tree it is given.
//!
//! ```text
//! input.n > 0 && status != 'failed'
//! 'Hello, ' + value
//! not (region in ['eu', 'us'])
//! ```

mod eval;
mod lexer;
mod parser;

use serde_json::Value;
use thiserror::Error;

pub use eval::{is_truthy, value_to_f64};
pub use parser::{BinaryOp, Expr, UnaryOp};

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    /// Syntax error at the given byte offset.
    #[error("parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// Runtime type or arithmetic error.
    #[error("evaluation error: {0}")]
    Eval(String),
}

/// A parsed expression ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    /// Parse an expression from source text.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(source)?;
        let ast = parser::Parser::new(tokens, source.len()).parse()?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// Original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed syntax tree.
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluate against a root value; paths are looked up from the root.
    pub fn evaluate(&self, root: &Value) -> Result<Value, ExprError> {
        eval::evaluate(&self.ast, root)
    }

    /// Evaluate and reduce the result to a boolean by truthiness.
    pub fn evaluate_bool(&self, root: &Value) -> Result<bool, ExprError> {
        self.evaluate(root).map(|v| is_truthy(&v))
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::str::FromStr for Expression {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(src: &str, root: &Value) -> Value {
        Expression::parse(src).unwrap().evaluate(root).unwrap()
    }

    #[test]
    fn test_comparisons_against_context() {
        let root = json!({"input": {"n": 5, "name": "Ada"}, "status": "ok"});
        assert_eq!(eval("input.n > 0", &root), json!(true));
        assert_eq!(eval("input.n <= 4", &root), json!(false));
        assert_eq!(eval("status == 'ok'", &root), json!(true));
        assert_eq!(eval("status === \"ok\"", &root), json!(true));
        assert_eq!(eval("input.name != 'Bob'", &root), json!(true));
    }

    #[test]
    fn test_boolean_connectives() {
        let root = json!({"a": true, "b": false, "n": -1});
        assert_eq!(eval("a && !b", &root), json!(true));
        assert_eq!(eval("a and b", &root), json!(false));
        assert_eq!(eval("b || n < 0", &root), json!(true));
        assert_eq!(eval("not a == b", &root), json!(true));
        assert_eq!(eval("!(a || b)", &root), json!(false));
    }

    #[test]
    fn test_string_concat_and_arithmetic() {
        let root = json!({"value": "Ada", "x": 7, "y": 2});
        assert_eq!(eval("'Hello, ' + value", &root), json!("Hello, Ada"));
        assert_eq!(eval("x + y * 3", &root), json!(13));
        assert_eq!(eval("(x + y) * 3", &root), json!(27));
        assert_eq!(eval("x / y", &root), json!(3.5));
        assert_eq!(eval("x % y", &root), json!(1));
        assert_eq!(eval("-x + 1", &root), json!(-6));
    }

    #[test]
    fn test_membership() {
        let root = json!({"tags": ["a", "b"], "msg": "hello world", "env": "eu"});
        assert_eq!(eval("'a' in tags", &root), json!(true));
        assert_eq!(eval("msg contains 'world'", &root), json!(true));
        assert_eq!(eval("env in ['us', 'eu']", &root), json!(true));
        assert_eq!(eval("tags contains 'z'", &root), json!(false));
    }

    #[test]
    fn test_missing_path_is_null() {
        let root = json!({});
        assert_eq!(eval("missing.path", &root), Value::Null);
        assert_eq!(eval("missing == null", &root), json!(true));
        assert!(!Expression::parse("missing").unwrap().evaluate_bool(&root).unwrap());
    }

    #[test]
    fn test_parse_errors_report_offset() {
        let err = Expression::parse("a == ").unwrap_err();
        assert!(matches!(err, ExprError::Parse { .. }));

        let err = Expression::parse("a = 1").unwrap_err();
        assert!(matches!(err, ExprError::Parse { position: 2, .. }));

        assert!(Expression::parse("foo(1)").is_err());
        assert!(Expression::parse("'unterminated").is_err());
    }

    #[test]
    fn test_display_roundtrips_source() {
        let expr: Expression = "input.n > 0".parse().unwrap();
        assert_eq!(expr.to_string(), "input.n > 0");
        assert_eq!(expr.source(), "input.n > 0");
    }
}
