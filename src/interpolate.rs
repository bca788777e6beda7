//! Template interpolation for declarative configs
//!
//! Handles `{{ ... }}` interpolation in connector configurations.
//! Beyond plain lookups like `{{ config.api_key }}` the expression language
//! supports bracket access (`config['api-key']`), arithmetic, comparisons,
//! and the `now_utc()` / `unix_timestamp()` helpers.
//!
//! Unresolved references evaluate to `null` rather than failing, so a
//! partially-populated context (e.g. no slice yet) never crashes a caller.

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Regex for locating template spans: {{ expression }}
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").unwrap());

// ============================================================================
// Context
// ============================================================================

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Connector configuration values
    pub config: Value,
    /// Stream state values (cursor checkpoints)
    pub stream_state: Value,
    /// Current stream slice values
    pub stream_slice: Value,
    /// Pagination token for the upcoming request
    pub next_page_token: Value,
    /// Most recent response body
    pub response: Value,
    /// Most recent response headers
    pub headers: Value,
    /// Additional caller-supplied variables
    pub extra: serde_json::Map<String, Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set config values
    pub fn set_config(&mut self, config: Value) -> &mut Self {
        self.config = config;
        self
    }

    /// Set stream state values
    pub fn set_stream_state(&mut self, state: Value) -> &mut Self {
        self.stream_state = state;
        self
    }

    /// Set stream slice values
    pub fn set_stream_slice(&mut self, slice: Value) -> &mut Self {
        self.stream_slice = slice;
        self
    }

    /// Set the next page token
    pub fn set_next_page_token(&mut self, token: Value) -> &mut Self {
        self.next_page_token = token;
        self
    }

    /// Set the response body
    pub fn set_response(&mut self, response: Value) -> &mut Self {
        self.response = response;
        self
    }

    /// Set the response headers
    pub fn set_headers(&mut self, headers: Value) -> &mut Self {
        self.headers = headers;
        self
    }

    /// Set an additional variable
    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Resolve a root name to its value.
    ///
    /// Unknown names fall back to config fields, then extra variables,
    /// so `{{ api_key }}` works as shorthand for `{{ config.api_key }}`.
    fn root(&self, name: &str) -> Value {
        match name {
            "config" => self.config.clone(),
            "stream_state" => self.stream_state.clone(),
            "stream_slice" => self.stream_slice.clone(),
            "next_page_token" => self.next_page_token.clone(),
            "response" => self.response.clone(),
            "headers" => self.headers.clone(),
            other => {
                if let Some(v) = self.config.get(other) {
                    v.clone()
                } else if let Some(v) = self.extra.get(other) {
                    v.clone()
                } else {
                    Value::Null
                }
            }
        }
    }
}

// ============================================================================
// Value kinds
// ============================================================================

/// The kind of an evaluated value, used for accepted-type checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Determine the kind of a JSON value
pub fn kind_of(value: &Value) -> ValueKind {
    match value {
        Value::Null => ValueKind::Null,
        Value::Bool(_) => ValueKind::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                ValueKind::Integer
            } else {
                ValueKind::Number
            }
        }
        Value::String(_) => ValueKind::String,
        Value::Array(_) => ValueKind::Array,
        Value::Object(_) => ValueKind::Object,
    }
}

// ============================================================================
// Public evaluation API
// ============================================================================

/// Evaluate a template to a typed value.
///
/// A template that is exactly one `{{ ... }}` span returns the expression's
/// value with its type preserved. Any other template returns the string
/// concatenation of literal text and rendered spans.
pub fn eval(template: &str, ctx: &Context) -> Result<Value> {
    let trimmed = template.trim();
    if let Some(caps) = TEMPLATE_REGEX.captures(trimmed) {
        let whole = caps.get(0).unwrap();
        if whole.start() == 0 && whole.end() == trimmed.len() {
            return eval_expression(caps.get(1).unwrap().as_str(), ctx);
        }
    }
    Ok(Value::String(render(template, ctx)?))
}

/// Evaluate a template and check the result against a set of accepted kinds.
///
/// An empty `accepted` slice disables the check. `Number` accepts `Integer`
/// results, since every integer is a valid number.
pub fn eval_typed(template: &str, ctx: &Context, accepted: &[ValueKind]) -> Result<Value> {
    let value = eval(template, ctx)?;
    if accepted.is_empty() {
        return Ok(value);
    }
    let actual = kind_of(&value);
    let ok = accepted.iter().any(|k| {
        *k == actual || (*k == ValueKind::Number && actual == ValueKind::Integer)
    });
    if ok {
        Ok(value)
    } else {
        Err(Error::TypeCheck {
            expected: accepted
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            actual: actual.to_string(),
        })
    }
}

/// Render a template into a string.
///
/// Unresolved references render as the empty string.
pub fn eval_string(template: &str, ctx: &Context) -> Result<String> {
    match eval(template, ctx)? {
        Value::String(s) => Ok(s),
        other => Ok(value_to_string(&other)),
    }
}

/// Evaluate a template to a boolean by truthiness.
///
/// `null`, `false`, `0`, and the empty string/array/object are falsy.
pub fn eval_bool(template: &str, ctx: &Context) -> Result<bool> {
    Ok(is_truthy(&eval(template, ctx)?))
}

/// Render a template string, substituting every span
pub fn render(template: &str, ctx: &Context) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    for caps in TEMPLATE_REGEX.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        result.push_str(&template[last..whole.start()]);
        let value = eval_expression(caps.get(1).unwrap().as_str(), ctx)?;
        result.push_str(&value_to_string(&value));
        last = whole.end();
    }
    result.push_str(&template[last..]);
    Ok(result)
}

/// Check if a string contains template spans
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Render all string values (and keys) in a JSON value tree
pub fn render_value(value: &Value, ctx: &Context) -> Result<Value> {
    match value {
        Value::String(s) => {
            if has_templates(s) {
                eval(s, ctx)
            } else {
                Ok(value.clone())
            }
        }
        Value::Object(map) => {
            let mut new_map = serde_json::Map::new();
            for (k, v) in map {
                let new_key = if has_templates(k) {
                    render(k, ctx)?
                } else {
                    k.clone()
                };
                new_map.insert(new_key, render_value(v, ctx)?);
            }
            Ok(Value::Object(new_map))
        }
        Value::Array(arr) => {
            let new_arr: Result<Vec<Value>> = arr.iter().map(|v| render_value(v, ctx)).collect();
            Ok(Value::Array(new_arr?))
        }
        _ => Ok(value.clone()),
    }
}

/// Truthiness of a JSON value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For complex types, use JSON serialization
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

// ============================================================================
// Expression evaluation
// ============================================================================

/// Evaluate one expression (the inside of a `{{ ... }}` span)
fn eval_expression(input: &str, ctx: &Context) -> Result<Value> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        ctx,
    };
    let value = parser.comparison()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::template(format!(
            "Unexpected trailing input in expression: {input}"
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(Error::template("Single '=' is not a valid operator"));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    return Err(Error::template("Expected '!=' operator"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            s.push(*ch);
                            i += 1;
                        }
                        None => return Err(Error::template("Unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || (chars[i] == '.' && !is_float))
                {
                    // A dot only belongs to the number when followed by a digit
                    if chars[i] == '.' {
                        if chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                            is_float = true;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    let f = text
                        .parse::<f64>()
                        .map_err(|_| Error::template(format!("Invalid number: {text}")))?;
                    tokens.push(Token::Float(f));
                } else {
                    let n = text
                        .parse::<i64>()
                        .map_err(|_| Error::template(format!("Invalid number: {text}")))?;
                    tokens.push(Token::Int(n));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(Error::template(format!(
                    "Unexpected character '{other}' in expression"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a Context,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(Error::template(format!(
                "Expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn comparison(&mut self) -> Result<Value> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => Some("=="),
            Some(Token::NotEq) => Some("!="),
            Some(Token::Lt) => Some("<"),
            Some(Token::Le) => Some("<="),
            Some(Token::Gt) => Some(">"),
            Some(Token::Ge) => Some(">="),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let right = self.additive()?;
            return Ok(Value::Bool(compare(op, &left, &right)));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Value> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = arith('+', &left, &right)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = arith('-', &left, &right)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Value> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = arith('*', &left, &right)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = arith('/', &left, &right)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            let value = self.unary()?;
            return arith('-', &Value::from(0), &value);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Value::from(n)),
            Some(Token::Float(f)) => Ok(Value::from(f)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::LParen) => {
                let value = self.comparison()?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => {
                    if matches!(self.peek(), Some(Token::LParen)) {
                        self.pos += 1;
                        self.expect(&Token::RParen)?;
                        return call_helper(&name);
                    }
                    let root = self.ctx.root(&name);
                    self.path_suffix(root)
                }
            },
            other => Err(Error::template(format!(
                "Unexpected token in expression: {other:?}"
            ))),
        }
    }

    /// Walk `.field` and `[index]` accessors. Missing segments resolve
    /// to `null` so partial contexts stay usable.
    fn path_suffix(&mut self, mut current: Value) -> Result<Value> {
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(field)) => {
                            current = current.get(&field).cloned().unwrap_or(Value::Null);
                        }
                        other => {
                            return Err(Error::template(format!(
                                "Expected field name after '.', found {other:?}"
                            )))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.advance();
                    self.expect(&Token::RBracket)?;
                    current = match key {
                        Some(Token::Str(field)) => {
                            current.get(&field).cloned().unwrap_or(Value::Null)
                        }
                        Some(Token::Int(idx)) if idx >= 0 => {
                            current.get(idx as usize).cloned().unwrap_or(Value::Null)
                        }
                        other => {
                            return Err(Error::template(format!(
                                "Expected string or index inside brackets, found {other:?}"
                            )))
                        }
                    };
                }
                _ => break,
            }
        }
        Ok(current)
    }
}

/// Built-in helper functions
fn call_helper(name: &str) -> Result<Value> {
    match name {
        "now_utc" => Ok(Value::String(Utc::now().to_rfc3339())),
        "unix_timestamp" => Ok(Value::from(Utc::now().timestamp())),
        other => Err(Error::template(format!("Unknown helper function: {other}"))),
    }
}

/// Arithmetic over JSON values. Null coerces to 0 (or "" under string
/// concatenation) so absent references stay falsy instead of fatal.
fn arith(op: char, left: &Value, right: &Value) -> Result<Value> {
    if op == '+' {
        if let (Value::String(a), Value::String(b)) = (left, right) {
            return Ok(Value::String(format!("{a}{b}")));
        }
        if let (Value::String(a), Value::Null) = (left, right) {
            return Ok(Value::String(a.clone()));
        }
        if let (Value::Null, Value::String(b)) = (left, right) {
            return Ok(Value::String(b.clone()));
        }
    }

    let both_int = is_integral(left) && is_integral(right);
    let a = as_number(left)?;
    let b = as_number(right)?;

    if both_int {
        let a = a as i64;
        let b = b as i64;
        let result = match op {
            '+' => a + b,
            '-' => a - b,
            '*' => a * b,
            '/' => {
                if b == 0 {
                    return Err(Error::template("Division by zero"));
                }
                a / b
            }
            _ => unreachable!(),
        };
        return Ok(Value::from(result));
    }

    let result = match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' => {
            if b == 0.0 {
                return Err(Error::template("Division by zero"));
            }
            a / b
        }
        _ => unreachable!(),
    };
    Ok(Value::from(result))
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::template("Number out of range")),
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| Error::template(format!("'{s}' is not a number"))),
        other => Err(Error::template(format!(
            "Cannot use {} in arithmetic",
            kind_of(other)
        ))),
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        _ => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => {
                    a.as_f64().partial_cmp(&b.as_f64())
                }
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                Some(ord) => match op {
                    "<" => ord == std::cmp::Ordering::Less,
                    "<=" => ord != std::cmp::Ordering::Greater,
                    ">" => ord == std::cmp::Ordering::Greater,
                    ">=" => ord != std::cmp::Ordering::Less,
                    _ => false,
                },
                None => false,
            }
        }
    }
}
