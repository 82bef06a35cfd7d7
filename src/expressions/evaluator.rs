//! Expression evaluator
//!
//! Evaluation is three-valued: a concrete JSON value, an indeterminate value
//! (structurally valid, not known statically), or an [`EvalError`].
//! Indeterminate operands make the result indeterminate unless `&&`/`||`
//! short-circuits on a known left operand.

use serde_json::Value;
use tracing::debug;

use super::ast::{BinaryOp, Expr, Literal, SpannedExpr, UnaryOp};
use super::context::{ContextResolver, Resolution};
use super::error::EvalError;
use super::functions::{Functions, BUILTINS};
use super::value::{is_truthy, loose_cmp, loose_eq, number};
use crate::path::PathSegment;

/// Result of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Known(Value),
    Indeterminate,
}

impl Evaluation {
    pub fn known(&self) -> Option<&Value> {
        match self {
            Evaluation::Known(value) => Some(value),
            Evaluation::Indeterminate => None,
        }
    }
}

/// One step of a flattened access chain.
enum Accessor<'e> {
    Property(&'e str),
    Index(&'e SpannedExpr),
}

pub struct Evaluator<'a> {
    resolver: &'a dyn ContextResolver,
    functions: &'a Functions,
}

impl<'a> Evaluator<'a> {
    pub fn new(resolver: &'a dyn ContextResolver) -> Self {
        Self {
            resolver,
            functions: &BUILTINS,
        }
    }

    pub fn with_functions(resolver: &'a dyn ContextResolver, functions: &'a Functions) -> Self {
        Self {
            resolver,
            functions,
        }
    }

    pub fn evaluate(&self, expr: &SpannedExpr) -> Result<Evaluation, EvalError> {
        match &expr.node {
            Expr::Literal(literal) => Ok(Evaluation::Known(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => number(*n),
                Literal::String(s) => Value::String(s.clone()),
            })),
            Expr::Context(_) | Expr::Property { .. } | Expr::Index { .. } => self.access(expr),
            Expr::Call { name, args } => self.call(expr, name, args),
            Expr::Apply { args, .. } => {
                // Only named built-ins can be called
                for arg in args {
                    self.evaluate(arg)?;
                }
                Err(EvalError::invalid(expr.span))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => Ok(match self.evaluate(operand)? {
                Evaluation::Known(value) => Evaluation::Known(Value::Bool(!is_truthy(&value))),
                Evaluation::Indeterminate => Evaluation::Indeterminate,
            }),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &SpannedExpr,
        right: &SpannedExpr,
    ) -> Result<Evaluation, EvalError> {
        // Both sides are always evaluated so errors on a short-circuited
        // side are still reported
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match op {
            BinaryOp::And => Ok(match left {
                Evaluation::Known(l) if is_truthy(&l) => right,
                Evaluation::Known(l) => Evaluation::Known(l),
                Evaluation::Indeterminate => Evaluation::Indeterminate,
            }),
            BinaryOp::Or => Ok(match left {
                Evaluation::Known(l) if is_truthy(&l) => Evaluation::Known(l),
                Evaluation::Known(_) => right,
                Evaluation::Indeterminate => Evaluation::Indeterminate,
            }),
            _ => match (left, right) {
                (Evaluation::Known(l), Evaluation::Known(r)) => {
                    Ok(Evaluation::Known(Value::Bool(compare(op, &l, &r))))
                }
                _ => Ok(Evaluation::Indeterminate),
            },
        }
    }

    fn call(
        &self,
        expr: &SpannedExpr,
        name: &str,
        args: &[SpannedExpr],
    ) -> Result<Evaluation, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        let mut indeterminate = false;
        for arg in args {
            match self.evaluate(arg)? {
                Evaluation::Known(value) => values.push(value),
                Evaluation::Indeterminate => indeterminate = true,
            }
        }

        let function = match self.functions.get(name) {
            Some(function) if function.accepts(args.len()) => function,
            Some(_) => {
                debug!(function = name, args = args.len(), "wrong number of arguments");
                return Err(EvalError::invalid(expr.span));
            }
            None => {
                debug!(function = name, "unknown function");
                return Err(EvalError::invalid(expr.span));
            }
        };
        if indeterminate {
            return Ok(Evaluation::Indeterminate);
        }

        (function.call)(&values).map_err(|err| {
            debug!(function = function.name, error = %err, "function call failed");
            EvalError::invalid(expr.span)
        })
    }

    /// Evaluate a property/index chain. Chains rooted at a context are
    /// resolved as one path so errors name the whole access.
    fn access(&self, expr: &SpannedExpr) -> Result<Evaluation, EvalError> {
        let (root, accessors) = flatten(expr);

        let mut path = Vec::with_capacity(accessors.len());
        let mut indeterminate = false;
        let mut invalid_index = false;
        for accessor in accessors {
            match accessor {
                Accessor::Property(name) => path.push(PathSegment::Key(name.to_string())),
                Accessor::Index(index) => match self.evaluate(index)? {
                    Evaluation::Known(value) => match segment(&value) {
                        Some(segment) => path.push(segment),
                        None => invalid_index = true,
                    },
                    Evaluation::Indeterminate => indeterminate = true,
                },
            }
        }

        let base = match &root.node {
            Expr::Context(context) => {
                if indeterminate {
                    return Ok(Evaluation::Indeterminate);
                }
                if invalid_index {
                    return Ok(Evaluation::Known(Value::Null));
                }
                return match self.resolver.resolve(context, &path) {
                    Resolution::Known(value) => Ok(Evaluation::Known(value)),
                    Resolution::Indeterminate => Ok(Evaluation::Indeterminate),
                    Resolution::Unknown => {
                        Err(EvalError::unknown_access(format_path(context, &path), expr.span))
                    }
                };
            }
            _ => self.evaluate(root)?,
        };

        match base {
            Evaluation::Indeterminate => Ok(Evaluation::Indeterminate),
            _ if indeterminate => Ok(Evaluation::Indeterminate),
            _ if invalid_index => Ok(Evaluation::Known(Value::Null)),
            Evaluation::Known(value) => Ok(Evaluation::Known(navigate(value, &path))),
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    match op {
        BinaryOp::Eq => loose_eq(left, right),
        BinaryOp::Ne => !loose_eq(left, right),
        BinaryOp::Lt => loose_cmp(left, right).map_or(false, |o| o.is_lt()),
        BinaryOp::Le => loose_cmp(left, right).map_or(false, |o| o.is_le()),
        BinaryOp::Gt => loose_cmp(left, right).map_or(false, |o| o.is_gt()),
        BinaryOp::Ge => loose_cmp(left, right).map_or(false, |o| o.is_ge()),
        BinaryOp::And | BinaryOp::Or => false,
    }
}

/// Evaluate `expr` with the built-in functions.
pub fn evaluate(expr: &SpannedExpr, resolver: &dyn ContextResolver) -> Result<Evaluation, EvalError> {
    Evaluator::new(resolver).evaluate(expr)
}

fn flatten(expr: &SpannedExpr) -> (&SpannedExpr, Vec<Accessor<'_>>) {
    let mut accessors = Vec::new();
    let mut current = expr;
    loop {
        match &current.node {
            Expr::Property { target, name } => {
                accessors.push(Accessor::Property(name));
                current = &**target;
            }
            Expr::Index { target, index } => {
                accessors.push(Accessor::Index(index));
                current = &**target;
            }
            _ => break,
        }
    }
    accessors.reverse();
    (current, accessors)
}

/// Path segment for an evaluated index; booleans index as 0/1.
fn segment(value: &Value) -> Option<PathSegment> {
    match value {
        Value::String(key) => Some(PathSegment::Key(key.clone())),
        Value::Bool(b) => Some(PathSegment::Index(usize::from(*b))),
        Value::Number(n) => {
            let n = n.as_f64()?;
            (n >= 0.0 && n.fract() == 0.0).then(|| PathSegment::Index(n as usize))
        }
        _ => None,
    }
}

/// Property access on a concrete value; anything missing is null.
fn navigate(value: Value, path: &[PathSegment]) -> Value {
    let mut current = value;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(mut object), PathSegment::Key(key)) => {
                let exact = object.remove(key.as_str());
                exact
                    .or_else(|| {
                        let found = object.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned();
                        found.and_then(|k| object.remove(&k))
                    })
                    .unwrap_or(Value::Null)
            }
            (Value::Array(mut items), PathSegment::Index(index)) if *index < items.len() => {
                items.swap_remove(*index)
            }
            _ => Value::Null,
        };
    }
    current
}

/// `secrets.AWS_TOKEN`, `matrix.include[0].os`
fn format_path(context: &str, path: &[PathSegment]) -> String {
    let mut out = context.to_string();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::context::ContextValue;
    use crate::expressions::error::EvalErrorKind;
    use crate::expressions::parser::parse_expression;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    struct Contexts(HashMap<&'static str, ContextValue>);

    impl ContextResolver for Contexts {
        fn resolve(&self, context: &str, path: &[PathSegment]) -> Resolution {
            self.0
                .get(context)
                .map_or(Resolution::Unknown, |value| value.resolve(path))
        }
    }

    fn contexts() -> Contexts {
        Contexts(HashMap::from([
            ("env", ContextValue::Known(json!({"FOO": "AWS_TOKEN", "R": 2, "secret_name": "test", "test": 42}))),
            ("secrets", ContextValue::Known(json!({"AWS_TOKEN": true}))),
            ("vars", ContextValue::Dynamic),
            (
                "github",
                ContextValue::object([
                    ("event_name".to_string(), ContextValue::Known(json!("push"))),
                    ("sha".to_string(), ContextValue::Dynamic),
                ]),
            ),
        ]))
    }

    fn eval(input: &str) -> Result<Evaluation, EvalError> {
        evaluate(&parse_expression(input).unwrap(), &contexts())
    }

    fn known(input: &str) -> Value {
        match eval(input) {
            Ok(Evaluation::Known(value)) => value,
            other => panic!("{} evaluated to {:?}", input, other),
        }
    }

    #[test]
    fn test_literals_and_operators() {
        assert_eq!(known("1 == 1"), json!(true));
        assert_eq!(known("'a' != 'A'"), json!(false));
        assert_eq!(known("!0"), json!(true));
        assert_eq!(known("1 < 2 && 3 >= 3"), json!(true));
        assert_eq!(known("null || 'fallback'"), json!("fallback"));
        assert_eq!(known("'' && 'never'"), json!(""));
        assert_eq!(known("'x' > 1"), json!(false));
    }

    #[test]
    fn test_context_access() {
        assert_eq!(known("env.FOO"), json!("AWS_TOKEN"));
        assert_eq!(known("secrets[env.FOO]"), json!(true));
        assert_eq!(known("env[env.secret_name]"), json!(42));
        assert_eq!(known("github.event_name == 'PUSH'"), json!(true));
    }

    #[test]
    fn test_unknown_access_names_whole_chain() {
        let err = eval("github.test").unwrap_err();
        assert_eq!(
            err.kind,
            EvalErrorKind::UnknownContextAccess {
                path: "github.test".into()
            }
        );
        assert_eq!(err.span, (0, 11));
        assert_eq!(err.to_string(), "Unknown context access: 'github.test'");

        assert_matches!(
            eval("secrets.NOPE").unwrap_err().kind,
            EvalErrorKind::UnknownContextAccess { ref path } if path == "secrets.NOPE"
        );
        assert_matches!(
            eval("steps.build.outputs").unwrap_err().kind,
            EvalErrorKind::UnknownContextAccess { ref path } if path == "steps.build.outputs"
        );
    }

    #[test]
    fn test_indeterminate_propagation() {
        assert_eq!(eval("vars.ANY").unwrap(), Evaluation::Indeterminate);
        assert_eq!(eval("github.sha == 'abc'").unwrap(), Evaluation::Indeterminate);
        assert_eq!(eval("!vars.X").unwrap(), Evaluation::Indeterminate);
        assert_eq!(eval("contains(vars.X, 'a')").unwrap(), Evaluation::Indeterminate);
        assert_eq!(eval("env[vars.KEY]").unwrap(), Evaluation::Indeterminate);
        // Short-circuit on a known left operand
        assert_eq!(known("false && vars.X"), json!(false));
        assert_eq!(known("'yes' || vars.X"), json!("yes"));
        assert_eq!(eval("true && vars.X").unwrap(), Evaluation::Indeterminate);
    }

    #[test]
    fn test_errors_on_short_circuited_side_propagate() {
        assert!(eval("false && github.test").is_err());
        assert!(eval("vars.X || unknownFn()").is_err());
    }

    #[test]
    fn test_computed_index() {
        assert_eq!(
            known("fromJson('[\"ubuntu-latest\",\"self-hosted\"]')[1 == 2]"),
            json!("ubuntu-latest")
        );
        assert_eq!(
            known("fromJson('[\"ubuntu-latest\",\"does-not-exist\"]')[env.R == 2]"),
            json!("does-not-exist")
        );
        assert_eq!(known("fromJson('{\"a\": {\"B\": 1}}').a.b"), json!(1));
        assert_eq!(known("fromJson('[1]')[5]"), json!(null));
        assert_eq!(known("fromJson('[1]').missing"), json!(null));
    }

    #[test]
    fn test_function_errors() {
        let err = eval("fromJson('[1,')").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::InvalidExpression);
        assert_eq!(err.span, (0, 15));
        assert_eq!(eval("nope()").unwrap_err().kind, EvalErrorKind::InvalidExpression);
        assert_eq!(
            eval("contains('a')").unwrap_err().kind,
            EvalErrorKind::InvalidExpression
        );
    }

    #[test]
    fn test_arguments_evaluate_before_lookup() {
        assert_matches!(
            eval("nope(github.test)").unwrap_err().kind,
            EvalErrorKind::UnknownContextAccess { ref path } if path == "github.test"
        );
        assert_matches!(
            eval("contains(github.test)").unwrap_err().kind,
            EvalErrorKind::UnknownContextAccess { ref path } if path == "github.test"
        );
        assert_eq!(
            eval("nope(vars.X)").unwrap_err().kind,
            EvalErrorKind::InvalidExpression
        );
        assert_eq!(
            eval("fromJson(1)").unwrap_err().kind,
            EvalErrorKind::InvalidExpression
        );
        assert_eq!(
            eval("fromJson(true)").unwrap_err().kind,
            EvalErrorKind::InvalidExpression
        );
    }

    #[test]
    fn test_call_on_access_chain() {
        let err = eval("github.event_name.d(env.FOO)").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::InvalidExpression);
        assert_eq!(err.span, (0, 28));
        assert_matches!(
            eval("env.FOO.d(github.test)").unwrap_err().kind,
            EvalErrorKind::UnknownContextAccess { ref path } if path == "github.test"
        );
    }

    #[test]
    fn test_status_functions() {
        assert_eq!(known("failure()"), json!(false));
        assert_eq!(known("success() && always()"), json!(true));
        assert_eq!(eval("hashFiles('**/*.lock')").unwrap(), Evaluation::Indeterminate);
    }

    #[test]
    fn test_custom_functions() {
        let mut functions = Functions::empty();
        functions.register("answer", 0, Some(0), |_| Ok(Evaluation::Known(json!(42))));
        let resolver = contexts();
        let evaluator = Evaluator::with_functions(&resolver, &functions);
        let expr = parse_expression("answer()").unwrap();
        assert_eq!(evaluator.evaluate(&expr).unwrap(), Evaluation::Known(json!(42)));
        let expr = parse_expression("success()").unwrap();
        assert!(evaluator.evaluate(&expr).is_err());
    }
}
