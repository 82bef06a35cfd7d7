//! Built-in expression functions
//!
//! Functions are looked up case-insensitively (`fromJSON` and `fromJson` are
//! the same function). Each entry carries its arity bounds, which the
//! evaluator checks before calling.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::Value;
use thiserror::Error;

use super::evaluator::Evaluation;
use super::value::{loose_eq, to_display_string};

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid format string '{0}'")]
    InvalidFormat(String),
    #[error("format argument {{{0}}} is out of range")]
    MissingFormatArgument(usize),
    #[error("{0} expects a string argument")]
    ExpectedString(&'static str),
}

/// Implementation of a built-in, called with fully known arguments.
pub type Builtin = fn(&[Value]) -> Result<Evaluation, FunctionError>;

#[derive(Debug, Clone, Copy)]
pub struct Function {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
    pub call: Builtin,
}

impl Function {
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Registry of callable functions, keyed by lowercased name.
#[derive(Debug, Clone, Default)]
pub struct Functions {
    entries: HashMap<String, Function>,
}

impl Functions {
    /// Registry with no functions at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in.
    pub fn builtins() -> Self {
        let mut functions = Self::empty();
        functions.register("contains", 2, Some(2), contains);
        functions.register("startsWith", 2, Some(2), starts_with);
        functions.register("endsWith", 2, Some(2), ends_with);
        functions.register("format", 1, None, format);
        functions.register("join", 1, Some(2), join);
        functions.register("toJson", 1, Some(1), to_json);
        functions.register("fromJson", 1, Some(1), from_json);
        functions.register("hashFiles", 1, None, |_| Ok(Evaluation::Indeterminate));
        functions.register("success", 0, Some(0), |_| Ok(Evaluation::Known(Value::Bool(true))));
        functions.register("always", 0, Some(0), |_| Ok(Evaluation::Known(Value::Bool(true))));
        functions.register("failure", 0, Some(0), |_| Ok(Evaluation::Known(Value::Bool(false))));
        functions.register("cancelled", 0, Some(0), |_| Ok(Evaluation::Known(Value::Bool(false))));
        functions
    }

    pub fn register(&mut self, name: &'static str, min_args: usize, max_args: Option<usize>, call: Builtin) {
        self.entries.insert(
            name.to_ascii_lowercase(),
            Function {
                name,
                min_args,
                max_args,
                call,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    /// Canonical names, sorted, for completion.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|f| f.name).collect();
        names.sort_unstable();
        names
    }
}

lazy_static! {
    pub static ref BUILTINS: Functions = Functions::builtins();
}

fn known(value: impl Into<Value>) -> Result<Evaluation, FunctionError> {
    Ok(Evaluation::Known(value.into()))
}

fn lowered(value: &Value) -> String {
    to_display_string(value).to_lowercase()
}

fn contains(args: &[Value]) -> Result<Evaluation, FunctionError> {
    let found = match &args[0] {
        Value::Array(items) => items.iter().any(|item| loose_eq(item, &args[1])),
        search => lowered(search).contains(&lowered(&args[1])),
    };
    known(found)
}

fn starts_with(args: &[Value]) -> Result<Evaluation, FunctionError> {
    known(lowered(&args[0]).starts_with(&lowered(&args[1])))
}

fn ends_with(args: &[Value]) -> Result<Evaluation, FunctionError> {
    known(lowered(&args[0]).ends_with(&lowered(&args[1])))
}

/// `format('{0} and {1}', a, b)`; `{{` and `}}` escape braces.
fn format(args: &[Value]) -> Result<Evaluation, FunctionError> {
    let template = to_display_string(&args[0]);
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(FunctionError::InvalidFormat(template.clone())),
                    }
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| FunctionError::InvalidFormat(template.clone()))?;
                let arg = args
                    .get(index + 1)
                    .ok_or(FunctionError::MissingFormatArgument(index))?;
                out.push_str(&to_display_string(arg));
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(FunctionError::InvalidFormat(template.clone())),
            other => out.push(other),
        }
    }

    known(out)
}

fn join(args: &[Value]) -> Result<Evaluation, FunctionError> {
    let separator = args.get(1).map_or_else(|| ",".to_string(), to_display_string);
    let joined = match &args[0] {
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(&separator),
        other => to_display_string(other),
    };
    known(joined)
}

fn to_json(args: &[Value]) -> Result<Evaluation, FunctionError> {
    known(serde_json::to_string_pretty(&args[0])?)
}

fn from_json(args: &[Value]) -> Result<Evaluation, FunctionError> {
    let Value::String(text) = &args[0] else {
        return Err(FunctionError::ExpectedString("fromJson"));
    };
    known(serde_json::from_str::<Value>(text.trim())?)
}
