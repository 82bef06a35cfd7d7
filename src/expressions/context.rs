//! Context resolution
//!
//! A [`ContextProvider`] supplies, per document position, the contents of
//! each named context (`env`, `secrets`, `steps`, ...). Contents are a
//! [`ContextValue`] tree mixing concrete values, structurally known objects
//! with unknown field values, and fully dynamic parts.
//!
//! Resolving a path yields one of three outcomes: the concrete value
//! ([`Resolution::Known`]), "valid but not statically known"
//! ([`Resolution::Indeterminate`]), or "not a valid access"
//! ([`Resolution::Unknown`]).

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tower_lsp::async_trait;

use super::ast::{Expr, SpannedExpr};
use crate::parser::Workflow;
use crate::path::{PathSegment, PropertyPath};

/// Contents of one context, as far as they are known.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    /// A concrete value. Missing keys of a known object are invalid.
    Known(Value),
    /// An object whose field names are known.
    ///
    /// When `open`, names outside `fields` are still valid but their values
    /// are not known.
    Object {
        fields: IndexMap<String, ContextValue>,
        open: bool,
    },
    /// Any access below this point is valid but not statically known.
    Dynamic,
}

impl ContextValue {
    pub fn object(fields: impl IntoIterator<Item = (String, ContextValue)>) -> Self {
        ContextValue::Object {
            fields: fields.into_iter().collect(),
            open: false,
        }
    }

    pub fn open_object(fields: impl IntoIterator<Item = (String, ContextValue)>) -> Self {
        ContextValue::Object {
            fields: fields.into_iter().collect(),
            open: true,
        }
    }

    /// Resolve `path` below this value.
    pub fn resolve(&self, path: &[PathSegment]) -> Resolution {
        let Some((first, rest)) = path.split_first() else {
            return self.materialize();
        };

        match self {
            ContextValue::Dynamic => Resolution::Indeterminate,
            ContextValue::Known(value) => resolve_known(value, path),
            ContextValue::Object { fields, open } => {
                let child = match first {
                    PathSegment::Key(key) => lookup(fields, key),
                    PathSegment::Index(_) => None,
                };
                match child {
                    Some(child) => child.resolve(rest),
                    None if *open => Resolution::Indeterminate,
                    None => Resolution::Unknown,
                }
            }
        }
    }

    /// Known only when every part of the tree is concrete.
    fn materialize(&self) -> Resolution {
        match self {
            ContextValue::Known(value) => Resolution::Known(value.clone()),
            ContextValue::Dynamic | ContextValue::Object { open: true, .. } => {
                Resolution::Indeterminate
            }
            ContextValue::Object { fields, open: false } => {
                let mut object = Map::new();
                for (key, field) in fields {
                    match field.materialize() {
                        Resolution::Known(value) => {
                            object.insert(key.clone(), value);
                        }
                        _ => return Resolution::Indeterminate,
                    }
                }
                Resolution::Known(Value::Object(object))
            }
        }
    }

    /// Field names visible at `path`, for completion.
    pub fn field_names(&self, path: &[PathSegment]) -> Vec<String> {
        let fields = match (self, path.split_first()) {
            (ContextValue::Object { fields, .. }, None) => return fields.keys().cloned().collect(),
            (ContextValue::Object { fields, .. }, Some((PathSegment::Key(key), rest))) => {
                return lookup(fields, key).map_or_else(Vec::new, |child| child.field_names(rest))
            }
            (ContextValue::Known(value), _) => known_at(value, path),
            _ => None,
        };
        fields
            .and_then(Value::as_object)
            .map(|object| object.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        ContextValue::Known(value)
    }
}

fn lookup<'a, V>(fields: &'a IndexMap<String, V>, key: &str) -> Option<&'a V> {
    fields.get(key).or_else(|| {
        fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

fn known_at<'v>(value: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(object), PathSegment::Key(key)) => object.get(key.as_str()).or_else(|| {
                object
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })?,
            (Value::Array(items), PathSegment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_known(value: &Value, path: &[PathSegment]) -> Resolution {
    match known_at(value, path) {
        Some(found) => Resolution::Known(found.clone()),
        // Out of range array access is null, not an invalid access
        None if indexes_array(value, path) => Resolution::Known(Value::Null),
        None => Resolution::Unknown,
    }
}

fn indexes_array(value: &Value, path: &[PathSegment]) -> bool {
    let Some((last, parent)) = path.split_last() else {
        return false;
    };
    matches!(
        (known_at(value, parent), last),
        (Some(Value::Array(_)), PathSegment::Index(_))
    )
}

/// Outcome of resolving a context access path.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Known(Value),
    Indeterminate,
    Unknown,
}

/// Supplies context contents for one document position.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Contents of `context`, or `None` when the context is not available
    /// at this position.
    async fn get(&self, context: &str) -> Option<ContextValue>;
}

/// Creates the [`ContextProvider`] for one position of a workflow.
#[async_trait]
pub trait ContextProviderFactory: Send + Sync {
    async fn get(&self, workflow: &Workflow, path: &PropertyPath) -> Arc<dyn ContextProvider>;
}

/// Synchronous resolution used by the evaluator.
pub trait ContextResolver {
    fn resolve(&self, context: &str, path: &[PathSegment]) -> Resolution;
}

/// The contexts an expression refers to, fetched ahead of evaluation.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    contexts: HashMap<String, Option<ContextValue>>,
}

impl ContextSnapshot {
    /// Fetch every context referenced by `expr` from `provider`.
    pub async fn capture(provider: &dyn ContextProvider, expr: &SpannedExpr) -> Self {
        let mut names = Vec::new();
        collect_contexts(expr, &mut names);

        let mut contexts = HashMap::new();
        for name in names {
            if !contexts.contains_key(&name) {
                let value = provider.get(&name).await;
                contexts.insert(name, value);
            }
        }
        Self { contexts }
    }
}

impl ContextResolver for ContextSnapshot {
    fn resolve(&self, context: &str, path: &[PathSegment]) -> Resolution {
        match self.contexts.get(context) {
            Some(Some(value)) => value.resolve(path),
            _ => Resolution::Unknown,
        }
    }
}

fn collect_contexts(expr: &SpannedExpr, names: &mut Vec<String>) {
    match &expr.node {
        Expr::Literal(_) => {}
        Expr::Context(name) => names.push(name.clone()),
        Expr::Property { target, .. } => collect_contexts(target, names),
        Expr::Index { target, index } => {
            collect_contexts(target, names);
            collect_contexts(index, names);
        }
        Expr::Call { args, .. } => args.iter().for_each(|arg| collect_contexts(arg, names)),
        Expr::Apply { callee, args } => {
            collect_contexts(callee, names);
            args.iter().for_each(|arg| collect_contexts(arg, names));
        }
        Expr::Binary { left, right, .. } => {
            collect_contexts(left, names);
            collect_contexts(right, names);
        }
        Expr::Unary { operand, .. } => collect_contexts(operand, names),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::parser::parse_expression;
    use serde_json::json;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    fn steps() -> ContextValue {
        ContextValue::object([(
            "build".to_string(),
            ContextValue::object([
                ("outputs".to_string(), ContextValue::open_object([])),
                ("outcome".to_string(), ContextValue::Dynamic),
            ]),
        )])
    }

    #[test]
    fn test_known_object() {
        let env = ContextValue::Known(json!({"FOO": "AWS_TOKEN", "list": [1, 2]}));
        assert_eq!(env.resolve(&[key("FOO")]), Resolution::Known(json!("AWS_TOKEN")));
        assert_eq!(env.resolve(&[key("foo")]), Resolution::Known(json!("AWS_TOKEN")));
        assert_eq!(env.resolve(&[key("BAR")]), Resolution::Unknown);
        assert_eq!(
            env.resolve(&[key("list"), PathSegment::Index(1)]),
            Resolution::Known(json!(2))
        );
        assert_eq!(
            env.resolve(&[key("list"), PathSegment::Index(7)]),
            Resolution::Known(Value::Null)
        );
    }

    #[test]
    fn test_structural_object() {
        let steps = steps();
        assert_eq!(
            steps.resolve(&[key("build"), key("outputs"), key("did_warn")]),
            Resolution::Indeterminate
        );
        assert_eq!(steps.resolve(&[key("build"), key("outcome")]), Resolution::Indeterminate);
        assert_eq!(steps.resolve(&[key("test"), key("outputs")]), Resolution::Unknown);
        assert_eq!(steps.resolve(&[key("build"), key("result")]), Resolution::Unknown);
    }

    #[test]
    fn test_dynamic_and_materialize() {
        assert_eq!(ContextValue::Dynamic.resolve(&[key("ANY")]), Resolution::Indeterminate);
        let closed = ContextValue::object([("a".to_string(), ContextValue::Known(json!(1)))]);
        assert_eq!(closed.resolve(&[]), Resolution::Known(json!({"a": 1})));
        assert_eq!(steps().resolve(&[]), Resolution::Indeterminate);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(steps().field_names(&[]), vec!["build".to_string()]);
        assert_eq!(
            steps().field_names(&[key("build")]),
            vec!["outputs".to_string(), "outcome".to_string()]
        );
        let env = ContextValue::Known(json!({"A": 1, "B": 2}));
        assert_eq!(env.field_names(&[]), vec!["A".to_string(), "B".to_string()]);
    }

    struct EnvOnly;

    #[async_trait]
    impl ContextProvider for EnvOnly {
        async fn get(&self, context: &str) -> Option<ContextValue> {
            (context == "env").then(|| ContextValue::Known(json!({"FOO": "bar"})))
        }
    }

    #[tokio::test]
    async fn test_snapshot_fetches_referenced_contexts() {
        let expr = parse_expression("env.FOO == secrets.BAR").unwrap();
        let snapshot = ContextSnapshot::capture(&EnvOnly, &expr).await;
        assert_eq!(snapshot.resolve("env", &[key("FOO")]), Resolution::Known(json!("bar")));
        assert_eq!(snapshot.resolve("secrets", &[key("BAR")]), Resolution::Unknown);
        assert_eq!(snapshot.resolve("github", &[]), Resolution::Unknown);
    }
}
