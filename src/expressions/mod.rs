//! The `${{ }}` expression language
//!
//! Markers are found in scalar text ([`embedding`]), tokenized and parsed
//! into a spanned AST ([`lexer`], [`parser`]) and evaluated against the
//! contexts available at the scalar's position ([`context`], [`evaluator`]).

pub mod ast;
pub mod context;
pub mod embedding;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod validator;
pub mod value;

pub use ast::{Expr, SpannedExpr};
pub use context::{
    ContextProvider, ContextProviderFactory, ContextResolver, ContextSnapshot, ContextValue,
    Resolution,
};
pub use error::{EvalError, EvalErrorKind, ParseError, INVALID_EXPRESSION};
pub use evaluator::{evaluate, Evaluation, Evaluator};
pub use functions::{Functions, BUILTINS};
pub use parser::parse_expression;
pub use validator::{validate_expressions, validate_implicit_expression, MarkerOutcome, ScalarExpressions};
