//! Expression error types.

use thiserror::Error;

use super::ast::Span;

/// Message reported for any expression that cannot be lexed, parsed or
/// evaluated.
pub const INVALID_EXPRESSION: &str = "Invalid expression";

/// Lexical or grammatical failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Unknown function, bad arity, malformed JSON or format string
    InvalidExpression,
    /// A recognized context with a path that does not exist
    UnknownContextAccess { path: String },
}

/// Evaluation failure, pinned to the AST node that caused it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", describe(.kind))]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
}

impl EvalError {
    pub fn invalid(span: Span) -> Self {
        Self {
            kind: EvalErrorKind::InvalidExpression,
            span,
        }
    }

    pub fn unknown_access(path: impl Into<String>, span: Span) -> Self {
        Self {
            kind: EvalErrorKind::UnknownContextAccess { path: path.into() },
            span,
        }
    }

    /// User-facing message.
    pub fn message(&self) -> String {
        describe(&self.kind)
    }
}

fn describe(kind: &EvalErrorKind) -> String {
    match kind {
        EvalErrorKind::InvalidExpression => INVALID_EXPRESSION.to_string(),
        EvalErrorKind::UnknownContextAccess { path } => {
            format!("Unknown context access: '{}'", path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(EvalError::invalid((0, 1)).to_string(), "Invalid expression");
        assert_eq!(
            EvalError::unknown_access("github.test", (4, 15)).to_string(),
            "Unknown context access: 'github.test'"
        );
        assert_eq!(ParseError::new("unexpected end", (3, 3)).to_string(), "unexpected end");
    }
}
