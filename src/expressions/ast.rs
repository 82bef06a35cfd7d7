//! Expression syntax tree

pub use crate::position::Span;

/// AST node with its source span.
///
/// Spans are relative to the expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

pub type SpannedExpr = Spanned<Expr>;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A named root namespace such as `github` or `env`
    Context(String),
    /// `target.name`
    Property {
        target: Box<SpannedExpr>,
        name: String,
    },
    /// `target[index]`
    Index {
        target: Box<SpannedExpr>,
        index: Box<SpannedExpr>,
    },
    /// `name(args...)`
    Call {
        name: String,
        args: Vec<SpannedExpr>,
    },
    /// `callee(args...)` where the callee is an access chain such as `a.b.c`
    Apply {
        callee: Box<SpannedExpr>,
        args: Vec<SpannedExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SpannedExpr>,
        right: Box<SpannedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<SpannedExpr>,
    },
}

/// Root context names the language recognizes.
pub const CONTEXTS: &[&str] = &[
    "github", "env", "vars", "job", "jobs", "steps", "runner", "secrets", "strategy", "matrix",
    "needs", "inputs",
];

/// Whether `name` is a recognized root context (case-insensitive).
pub fn is_context(name: &str) -> bool {
    CONTEXTS.iter().any(|c| c.eq_ignore_ascii_case(name))
}
