// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expression evaluation for edge and loop conditions.
//!
//! Two disjoint modes with distinct security postures:
//!
//! - **Property paths** (the default, used by edge conditions, transforms,
//!   and subflow input mapping): dot-separated identifiers resolved against
//!   a data object. Any character outside `[A-Za-z0-9_.]` rejects the whole
//!   expression.
//! - **Restricted predicates** (opt-in per run, used by loop conditions):
//!   comparisons, `&&`/`||`/`!`, parens, and literals over a fixed binding
//!   object. Every failure — lex, parse, type mismatch, absent operand —
//!   yields absent rather than an error; nothing here can throw into the
//!   runtime.

use serde_json::Value;

/// True when `expr` is a legal property path: non-empty, charset
/// `[A-Za-z0-9_.]`, no empty segments.
pub fn is_path(expr: &str) -> bool {
    !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && expr.split('.').all(|seg| !seg.is_empty())
}

/// Resolve a dot path against a data object. Numeric segments index
/// arrays. Absent segments, charset violations, and non-container hops all
/// yield `None`.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if !is_path(path) {
        return None;
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// JSON truthiness: absent, `null`, `false`, `0`, and `""` are falsy;
/// everything else (including empty arrays and objects) is truthy.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Edge-condition semantics: property-path mode, truthiness of the
/// resolved value.
pub fn path_condition(expr: &str, scope: &Value) -> bool {
    truthy(resolve_path(scope, expr))
}

/// Loop-condition semantics: the restricted predicate evaluator when the
/// run permits it, plain path truthiness otherwise.
pub fn loop_condition(expr: &str, scope: &Value, unsafe_conditions: bool) -> bool {
    if unsafe_conditions {
        truthy(eval_predicate(expr, scope).as_ref())
    } else {
        if !is_path(expr) {
            tracing::warn!(
                expr,
                "loop condition needs unsafe_conditions; evaluating as property path"
            );
        }
        path_condition(expr, scope)
    }
}

/// Evaluate a restricted predicate over a fixed binding object.
///
/// Grammar: `or := and ("||" and)*`, `and := cmp ("&&" cmp)*`,
/// `cmp := unary (op unary)?` with `op ∈ {==, !=, <, <=, >, >=}`,
/// `unary := "!" unary | literal | path | "(" or ")"`.
pub fn eval_predicate(expr: &str, bindings: &Value) -> Option<Value> {
    let tokens = lex(expr)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let ast = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return None;
    }
    eval(&ast, bindings)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Open,
    Close,
}

fn lex(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' => {
                if bytes.get(i + 1) != Some(&b'&') {
                    return None;
                }
                tokens.push(Token::And);
                i += 2;
            }
            '|' => {
                if bytes.get(i + 1) != Some(&b'|') {
                    return None;
                }
                tokens.push(Token::Or);
                i += 2;
            }
            '=' => {
                if bytes.get(i + 1) != Some(&b'=') {
                    return None;
                }
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = bytes[i];
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != quote {
                    end += 1;
                }
                if end >= bytes.len() {
                    return None;
                }
                tokens.push(Token::Str(expr[start..end].to_string()));
                i = end + 1;
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.')
                {
                    i += 1;
                }
                tokens.push(Token::Number(expr[start..i].parse().ok()?));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(match &expr[start..i] {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    word => Token::Path(word.to_string()),
                });
            }
            _ => return None,
        }
    }
    Some(tokens)
}

#[derive(Debug)]
enum Ast {
    Literal(Value),
    Path(String),
    Not(Box<Ast>),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Cmp(CmpOp, Box<Ast>, Box<Ast>),
}

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(token)
    }

    fn or_expr(&mut self) -> Option<Ast> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Ast::Or(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn and_expr(&mut self) -> Option<Ast> {
        let mut left = self.cmp_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.cmp_expr()?;
            left = Ast::And(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn cmp_expr(&mut self) -> Option<Ast> {
        let left = self.unary()?;
        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Some(left),
        };
        self.pos += 1;
        let right = self.unary()?;
        Some(Ast::Cmp(op, Box::new(left), Box::new(right)))
    }

    fn unary(&mut self) -> Option<Ast> {
        match self.bump()? {
            Token::Not => Some(Ast::Not(Box::new(self.unary()?))),
            Token::Open => {
                let inner = self.or_expr()?;
                if self.bump()? == Token::Close {
                    Some(inner)
                } else {
                    None
                }
            }
            Token::Path(path) => Some(Ast::Path(path)),
            Token::Number(n) => Some(Ast::Literal(
                serde_json::Number::from_f64(n).map(Value::Number)?,
            )),
            Token::Str(s) => Some(Ast::Literal(Value::String(s))),
            Token::True => Some(Ast::Literal(Value::Bool(true))),
            Token::False => Some(Ast::Literal(Value::Bool(false))),
            Token::Null => Some(Ast::Literal(Value::Null)),
            _ => None,
        }
    }
}

fn eval(ast: &Ast, bindings: &Value) -> Option<Value> {
    match ast {
        Ast::Literal(v) => Some(v.clone()),
        Ast::Path(path) => resolve_path(bindings, path).cloned(),
        Ast::Not(inner) => {
            let value = eval(inner, bindings)?;
            Some(Value::Bool(!truthy(Some(&value))))
        }
        Ast::And(a, b) => {
            let left = eval(a, bindings)?;
            if !truthy(Some(&left)) {
                return Some(Value::Bool(false));
            }
            let right = eval(b, bindings)?;
            Some(Value::Bool(truthy(Some(&right))))
        }
        Ast::Or(a, b) => {
            let left = eval(a, bindings)?;
            if truthy(Some(&left)) {
                return Some(Value::Bool(true));
            }
            let right = eval(b, bindings)?;
            Some(Value::Bool(truthy(Some(&right))))
        }
        Ast::Cmp(op, a, b) => {
            let left = eval(a, bindings)?;
            let right = eval(b, bindings)?;
            compare(*op, &left, &right)
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Option<Value> {
    let result = match op {
        CmpOp::Eq => left == right,
        CmpOp::Ne => left != right,
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => {
                    a.as_f64()?.partial_cmp(&b.as_f64()?)?
                }
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => return None,
            };
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                CmpOp::Eq | CmpOp::Ne => return None,
            }
        }
    };
    Some(Value::Bool(result))
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod tests;
