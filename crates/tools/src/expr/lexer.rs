//! Tokenizer for the expression language.

use serde_json::Value;

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Number, string or keyword literal.
    Literal(Value),
    /// Dotted path such as `input.user.0.name`.
    Path(Vec<String>),
    /// Word operators: `and`, `or`, `not`, `in`, `contains`.
    Keyword(&'static str),
    /// Symbolic operators.
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", ">=", "<=", "&&", "||", ">", "<", "!", "+", "-", "*", "/", "%",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = match c {
            '(' => {
                pos += 1;
                TokenKind::LParen
            }
            ')' => {
                pos += 1;
                TokenKind::RParen
            }
            '[' => {
                pos += 1;
                TokenKind::LBracket
            }
            ']' => {
                pos += 1;
                TokenKind::RBracket
            }
            ',' => {
                pos += 1;
                TokenKind::Comma
            }
            '\'' | '"' => {
                let (s, next) = lex_string(source, pos)?;
                pos = next;
                TokenKind::Literal(Value::String(s))
            }
            c if c.is_ascii_digit() => {
                let (n, next) = lex_number(source, pos)?;
                pos = next;
                TokenKind::Literal(n)
            }
            c if is_ident_start(c) => {
                let (segments, next) = lex_path(source, pos)?;
                pos = next;
                classify_word(segments)
            }
            _ => {
                let rest = &source[pos..];
                let op = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| ExprError::Parse {
                        position: pos,
                        message: format!("unexpected character '{}'", c),
                    })?;
                pos += op.len();
                // Strict equality is accepted as an alias for plain equality.
                match *op {
                    "===" => TokenKind::Op("=="),
                    "!==" => TokenKind::Op("!="),
                    other => TokenKind::Op(other),
                }
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn classify_word(segments: Vec<String>) -> TokenKind {
    if segments.len() == 1 {
        match segments[0].as_str() {
            "true" => return TokenKind::Literal(Value::Bool(true)),
            "false" => return TokenKind::Literal(Value::Bool(false)),
            "null" => return TokenKind::Literal(Value::Null),
            "and" => return TokenKind::Keyword("and"),
            "or" => return TokenKind::Keyword("or"),
            "not" => return TokenKind::Keyword("not"),
            "in" => return TokenKind::Keyword("in"),
            "contains" => return TokenKind::Keyword("contains"),
            _ => {}
        }
    }
    TokenKind::Path(segments)
}

fn lex_path(source: &str, start: usize) -> Result<(Vec<String>, usize), ExprError> {
    let bytes = source.as_bytes();
    let mut segments = Vec::new();
    let mut pos = start;

    loop {
        let seg_start = pos;
        while pos < bytes.len() && is_segment_char(bytes[pos] as char) {
            pos += 1;
        }
        if pos == seg_start {
            return Err(ExprError::Parse {
                position: pos,
                message: "empty path segment".to_string(),
            });
        }
        segments.push(source[seg_start..pos].to_string());

        if pos < bytes.len() && bytes[pos] == b'.' {
            pos += 1;
        } else {
            break;
        }
    }

    Ok((segments, pos))
}

fn lex_number(source: &str, start: usize) -> Result<(Value, usize), ExprError> {
    let bytes = source.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }

    let mut is_float = false;
    if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
        is_float = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    let text = &source[start..pos];
    let invalid = || ExprError::Parse {
        position: start,
        message: format!("invalid number '{}'", text),
    };

    let value = if is_float {
        let f: f64 = text.parse().map_err(|_| invalid())?;
        serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(invalid)?
    } else {
        match text.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => {
                let f: f64 = text.parse().map_err(|_| invalid())?;
                serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(invalid)?
            }
        }
    };

    Ok((value, pos))
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars.next().ok_or_else(|| ExprError::Parse {
        position: start,
        message: "expected string".to_string(),
    })?;

    let mut out = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next().ok_or_else(|| ExprError::Parse {
                    position: start + offset,
                    message: "dangling escape in string".to_string(),
                })?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
            c if c == quote => return Ok((out, start + offset + c.len_utf8())),
            c => out.push(c),
        }
    }

    Err(ExprError::Parse {
        position: start,
        message: "unterminated string literal".to_string(),
    })
}
