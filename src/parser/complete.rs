//! Completion items for a position in a workflow document
//!
//! Outside of `${{ }}` the schema drives completion: missing keys of the
//! enclosing mapping, or the allowed values of a scalar. Inside a marker the
//! context provider for the scalar's position lists context names,
//! functions and the properties of the access chain left of the cursor.

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::{find_node, Kind, NodeId, SyntaxNode, WorkflowDocument};
use crate::expressions::ast::CONTEXTS;
use crate::expressions::embedding::markers;
use crate::expressions::{ContextProviderFactory, BUILTINS};
use crate::path::PathSegment;
use crate::schema::{DescKind, NodeDesc};

lazy_static! {
    /// `github.event.na` at the end of the text before the cursor
    static ref ACCESS_CHAIN: Regex =
        Regex::new(r"[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]*)*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Key,
    Value,
    Context,
    Function,
    Property,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub description: Option<String>,
    pub kind: CompletionKind,
}

impl Completion {
    fn new(label: impl Into<String>, kind: CompletionKind) -> Self {
        Self {
            label: label.into(),
            description: None,
            kind,
        }
    }
}

/// Completion items at `offset`.
pub async fn complete(
    doc: &WorkflowDocument,
    offset: usize,
    factory: &dyn ContextProviderFactory,
) -> Vec<Completion> {
    let Some(id) = find_node(&doc.tree, offset) else {
        return Vec::new();
    };
    let node = doc.tree.node(id);

    if node.kind == Kind::Scalar {
        if let Some(before) = expression_before(node, offset) {
            return complete_expression(doc, id, before, factory).await;
        }
    }

    match key_owner(doc, id) {
        Some(map) => missing_keys(doc, map, Some(id)),
        None if node.kind == Kind::Map => missing_keys(doc, id, None),
        None => allowed_values(doc, id).await,
    }
}

/// Map that holds `id` as one of its keys.
fn key_owner(doc: &WorkflowDocument, id: NodeId) -> Option<NodeId> {
    let parent = doc.tree.node(id).parent?;
    doc.tree
        .node(parent)
        .mappings
        .iter()
        .any(|(key, _)| *key == id)
        .then_some(parent)
}

/// Keys of the map description at `map` that the document does not set yet.
/// `editing` is the key under the cursor, which may be replaced.
fn missing_keys(doc: &WorkflowDocument, map: NodeId, editing: Option<NodeId>) -> Vec<Completion> {
    let Some(desc) = doc.node_to_desc.get(&map) else {
        return Vec::new();
    };
    let DescKind::Map { keys, .. } = &desc.kind else {
        return Vec::new();
    };

    let present: HashSet<&str> = doc
        .tree
        .node(map)
        .mappings
        .iter()
        .filter(|(key, _)| Some(*key) != editing)
        .map(|(key, _)| doc.tree.node(*key).value.as_str())
        .collect();

    keys.iter()
        .filter(|(name, _)| !present.contains(name.as_str()))
        .map(|(name, key_desc)| Completion {
            label: name.clone(),
            description: key_desc.description.clone(),
            kind: CompletionKind::Key,
        })
        .collect()
}

async fn allowed_values(doc: &WorkflowDocument, id: NodeId) -> Vec<Completion> {
    let Some(desc) = value_desc(doc, id) else {
        return Vec::new();
    };
    let path = doc.tree.path_of(id);
    desc.allowed_values(&doc.workflow, &path)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|value| Completion {
            label: value.value,
            description: value.description,
            kind: CompletionKind::Value,
        })
        .collect()
}

/// Value description at `id`, looking through a sequence description
/// recorded for a lone item.
fn value_desc(doc: &WorkflowDocument, id: NodeId) -> Option<&Arc<NodeDesc>> {
    let desc = doc.node_to_desc.get(&id)?;
    match &desc.kind {
        DescKind::Value { .. } => Some(desc),
        DescKind::Sequence { item_desc } if matches!(item_desc.kind, DescKind::Value { .. }) => {
            Some(item_desc)
        }
        _ => None,
    }
}

/// Expression text between the start of the marker holding `offset` and
/// `offset`, if the cursor is inside one.
fn expression_before(node: &SyntaxNode, offset: usize) -> Option<&str> {
    let relative = offset.checked_sub(node.start_offset)?;
    let cursor = node
        .raw
        .char_indices()
        .nth(relative)
        .map_or(node.raw.len(), |(byte, _)| byte);

    markers(&node.raw).find_map(|marker| {
        let (start, end) = match marker {
            Ok(marker) => (marker.expression_offset(), marker.end - 2),
            Err(unterminated) => (unterminated.start + 3, unterminated.end),
        };
        (start <= cursor && cursor <= end).then(|| &node.raw[start..cursor])
    })
}

async fn complete_expression(
    doc: &WorkflowDocument,
    id: NodeId,
    before: &str,
    factory: &dyn ContextProviderFactory,
) -> Vec<Completion> {
    let chain = ACCESS_CHAIN.find(before).map_or("", |found| found.as_str());
    let mut parts: Vec<&str> = chain.split('.').collect();
    // The last part is what is being typed
    parts.pop();

    let Some((root, rest)) = parts.split_first() else {
        return roots();
    };

    let provider = factory.get(&doc.workflow, &doc.tree.path_of(id)).await;
    let Some(context) = provider.get(&root.to_ascii_lowercase()).await else {
        return Vec::new();
    };
    let path: Vec<PathSegment> = rest
        .iter()
        .map(|part| PathSegment::Key(part.to_string()))
        .collect();

    context
        .field_names(&path)
        .into_iter()
        .map(|name| Completion::new(name, CompletionKind::Property))
        .collect()
}

fn roots() -> Vec<Completion> {
    CONTEXTS
        .iter()
        .map(|name| Completion::new(*name, CompletionKind::Context))
        .chain(
            BUILTINS
                .names()
                .into_iter()
                .map(|name| Completion::new(name, CompletionKind::Function)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::schema::{workflow_schema, Context, EditContextProviderFactory};

    const WORKFLOW: &str = "on: push
env:
  GLOBAL: x
jobs:
  build:
    name: Build it
    runs-on: ubuntu-latest
    steps:
      - id: setup
        run: make
      - run: echo ${{ steps.setup.outputs.dir }} ${{ env.G }}
  test:
    needs: build
    runs-on: [macos-14]
";

    async fn labels_at(needle: &str, delta: usize) -> Vec<(String, CompletionKind)> {
        let schema = Arc::new(workflow_schema());
        let factory = EditContextProviderFactory::new(Context::default());
        let doc = parse("workflow.yml", WORKFLOW, &schema, &factory).await;
        let offset = WORKFLOW.find(needle).expect("needle in workflow") + delta;
        complete(&doc, offset, &factory)
            .await
            .into_iter()
            .map(|completion| (completion.label, completion.kind))
            .collect()
    }

    fn labels(items: &[(String, CompletionKind)]) -> Vec<&str> {
        items.iter().map(|(label, _)| label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_missing_keys() {
        let items = labels_at("name: Build", 1).await;
        let names = labels(&items);
        assert!(!names.contains(&"steps"));
        assert!(names.contains(&"name"));
        assert!(names.contains(&"needs"));
        assert!(!names.contains(&"runs-on"));
        assert!(items.iter().all(|(_, kind)| *kind == CompletionKind::Key));
    }

    #[tokio::test]
    async fn test_allowed_values() {
        let items = labels_at("ubuntu-latest", 2).await;
        assert!(labels(&items).contains(&"windows-latest"));

        // Jobs other than the current one
        let items = labels_at("needs: build", 8).await;
        assert_eq!(labels(&items), vec!["build"]);
    }

    #[tokio::test]
    async fn test_expression_roots() {
        let items = labels_at("${{ steps", 4).await;
        let names = labels(&items);
        assert!(names.contains(&"github"));
        assert!(names.contains(&"fromJson"));
    }

    #[tokio::test]
    async fn test_expression_properties() {
        let items = labels_at("setup.outputs", 0).await;
        assert_eq!(labels(&items), vec!["setup"]);

        let items = labels_at("outputs.dir", 0).await;
        assert_eq!(labels(&items), vec!["outputs", "outcome", "conclusion"]);

        let items = labels_at("env.G }}", 4).await;
        assert_eq!(labels(&items), vec!["GLOBAL"]);
    }
}
