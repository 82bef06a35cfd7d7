//! YAML syntax checking and workflow value construction
//!
//! The positioned tree from [`super::tree`] is error tolerant and never fails;
//! syntax errors are reported by running serde_yaml over the same text. The
//! workflow value handed to value and context providers is deserialized by
//! serde_yaml too, and only rebuilt from the positioned tree when the
//! document does not deserialize.

use serde::de::IgnoredAny;
use serde_yaml::{Mapping, Value};

use super::ast::{Kind, NodeId, ScalarStyle, SyntaxTree};
use crate::diagnostics::DiagnosticCollector;
use crate::position::CharIndex;

/// The deserialized workflow document.
pub type Workflow = Value;

/// Check `text` for YAML syntax errors, reporting at most one diagnostic.
///
/// Returns `true` when the document is syntactically valid.
pub fn check_syntax(text: &str, index: &CharIndex, collector: &mut DiagnosticCollector) -> bool {
    match serde_yaml::from_str::<IgnoredAny>(text) {
        Ok(_) => true,
        Err(err) => {
            let offset = err
                .location()
                .map(|location| index.to_char(location.index()))
                .unwrap_or(0);
            let message = clean_error_message(&err.to_string());

            tracing::debug!("YAML syntax error at {}: {}", offset, message);
            collector.add_error(message, (offset, offset));
            false
        }
    }
}

/// Clean up the error message by removing position information
///
/// Since we provide position via the diagnostic range, we can simplify
/// the message by removing the "at line X column Y" suffix.
fn clean_error_message(message: &str) -> String {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        static ref POSITION_SUFFIX_RE: Regex =
            Regex::new(r",?\s+at line \d+ column \d+$").unwrap();
    }

    POSITION_SUFFIX_RE.replace(message, "").to_string()
}

/// Deserialize the workflow value.
///
/// A document serde_yaml rejects (a syntax error or a duplicate key) falls
/// back to the value of whatever the positioned tree recovered, where later
/// duplicate keys overwrite earlier ones.
pub fn to_workflow(text: &str, tree: &SyntaxTree) -> Workflow {
    match serde_yaml::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!("Building workflow from the recovered tree: {}", err);
            match tree.root() {
                Some(root) => node_to_value(tree, root),
                None => Value::Null,
            }
        }
    }
}

fn node_to_value(tree: &SyntaxTree, id: NodeId) -> Value {
    let node = tree.node(id);
    match node.kind {
        Kind::Map => {
            let mut mapping = Mapping::new();
            for (key, value) in &node.mappings {
                mapping.insert(
                    Value::String(tree.node(*key).value.clone()),
                    node_to_value(tree, *value),
                );
            }
            Value::Mapping(mapping)
        }
        Kind::Sequence => Value::Sequence(
            node.items
                .iter()
                .map(|item| node_to_value(tree, *item))
                .collect(),
        ),
        Kind::Scalar => match node.style {
            ScalarStyle::Plain => resolve_plain(&node.value),
            ScalarStyle::Empty => Value::Null,
            _ => Value::String(node.value.clone()),
        },
    }
}

/// Resolve a plain scalar the way serde_yaml does for a whole document.
fn resolve_plain(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(text.to_string()),
    }
}
