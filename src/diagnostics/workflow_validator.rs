//! Schema-driven validation of a workflow document
//!
//! Walks the positioned tree together with the schema description tree,
//! reporting shape violations, unknown and duplicate keys, missing required
//! keys, disallowed values and failing expressions. Every visited node is
//! mapped to the description it was validated against.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use super::DiagnosticCollector;
use crate::expressions::embedding::{has_markers, markers};
use crate::expressions::value::to_display_string;
use crate::expressions::{
    validate_expressions, validate_implicit_expression, ContextProviderFactory, Evaluation,
    ScalarExpressions,
};
use crate::parser::{Kind, NodeId, ScalarStyle, SyntaxNode, SyntaxTree, Workflow};
use crate::path::PropertyPath;
use crate::position::{char_offset, Span};
use crate::schema::{DescKind, NodeDesc, ValueDesc};

/// Description each node was validated against.
pub type NodeDescriptions = HashMap<NodeId, Arc<NodeDesc>>;

/// Validate `tree` against `schema`.
///
/// Siblings are visited in document order, one at a time, so diagnostics
/// come out in a deterministic order.
pub async fn validate(
    tree: &SyntaxTree,
    workflow: &Workflow,
    schema: &Arc<NodeDesc>,
    factory: &dyn ContextProviderFactory,
    collector: &mut DiagnosticCollector,
) -> NodeDescriptions {
    let Some(root) = tree.root() else {
        return NodeDescriptions::new();
    };

    let mut walker = Walker {
        tree,
        workflow,
        factory,
        collector,
        node_to_desc: NodeDescriptions::new(),
    };
    walker
        .visit(root, Arc::clone(schema), PropertyPath::root(), None)
        .await;

    debug!(nodes = walker.node_to_desc.len(), "schema validation finished");
    walker.node_to_desc
}

struct Walker<'a> {
    tree: &'a SyntaxTree,
    workflow: &'a Workflow,
    factory: &'a dyn ContextProviderFactory,
    collector: &'a mut DiagnosticCollector,
    node_to_desc: NodeDescriptions,
}

type VisitFuture<'s> = Pin<Box<dyn Future<Output = ()> + Send + 's>>;

impl<'a> Walker<'a> {
    /// `owner` is the key node whose value is `id`, if any.
    fn visit<'s>(
        &'s mut self,
        id: NodeId,
        desc: Arc<NodeDesc>,
        path: PropertyPath,
        owner: Option<NodeId>,
    ) -> VisitFuture<'s> {
        Box::pin(async move {
            if let DescKind::OneOf(alternatives) = &desc.kind {
                match self.choose(id, alternatives) {
                    Some(chosen) => self.visit(id, chosen, path, owner).await,
                    None => {
                        self.record(id, &desc);
                        let node = self.tree.node(id);
                        self.collector
                            .add_error(format!("Expected {}", expected(alternatives)), node.span());
                    }
                }
                return;
            }

            self.record(id, &desc);
            match &desc.kind {
                DescKind::Value {
                    implicit_expression,
                    ..
                } => self.visit_value(id, &desc, *implicit_expression, &path).await,
                DescKind::Sequence { item_desc } => {
                    self.visit_sequence(id, item_desc, path, owner).await
                }
                DescKind::Map { required, .. } => {
                    self.visit_map(id, &desc, required, path, owner).await
                }
                DescKind::OneOf(_) => {}
            }
        })
    }

    fn record(&mut self, id: NodeId, desc: &Arc<NodeDesc>) {
        self.node_to_desc
            .entry(id)
            .or_insert_with(|| Arc::clone(desc));
    }

    /// Alternative whose shape matches the node. A scalar may stand in for
    /// a one-item sequence.
    fn choose(&self, id: NodeId, alternatives: &[Arc<NodeDesc>]) -> Option<Arc<NodeDesc>> {
        let node = self.tree.node(id);
        alternatives
            .iter()
            .find(|alt| alt.matches_kind(node))
            .or_else(|| {
                (node.kind == Kind::Scalar)
                    .then(|| {
                        alternatives
                            .iter()
                            .find(|alt| matches!(alt.kind, DescKind::Sequence { .. }))
                    })
                    .flatten()
            })
            .or_else(|| {
                node.is_null()
                    .then(|| alternatives.first())
                    .flatten()
            })
            .cloned()
    }

    async fn visit_sequence(
        &mut self,
        id: NodeId,
        item_desc: &Arc<NodeDesc>,
        path: PropertyPath,
        owner: Option<NodeId>,
    ) {
        let tree = self.tree;
        let node = tree.node(id);
        match node.kind {
            Kind::Sequence => {
                for (i, item) in node.items.iter().enumerate() {
                    self.visit(*item, Arc::clone(item_desc), path.with_index(i), None)
                        .await;
                }
            }
            _ if node.is_null() => {}
            // A lone value is accepted in place of a one-item sequence
            _ => self.visit(id, Arc::clone(item_desc), path, owner).await,
        }
    }

    async fn visit_map(
        &mut self,
        id: NodeId,
        desc: &Arc<NodeDesc>,
        required: &[String],
        path: PropertyPath,
        owner: Option<NodeId>,
    ) {
        let tree = self.tree;
        let node = tree.node(id);
        match node.kind {
            Kind::Map => {}
            _ if node.is_null() => return,
            _ => {
                self.collector.add_error("Expected a mapping", node.span());
                return;
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for (key_id, value_id) in &node.mappings {
            let key_node = tree.node(*key_id);
            let key = key_node.value.as_str();

            if !seen.insert(key) {
                self.collector
                    .add_error(format!("Key '{}' is already defined", key), key_node.span());
                continue;
            }

            match desc.key_desc(key) {
                Some(child) => {
                    self.record(*key_id, child);
                    self.visit(*value_id, Arc::clone(child), path.with_key(key), Some(*key_id))
                        .await;
                }
                None => {
                    self.collector
                        .add_error(format!("Key '{}' is not allowed", key), key_node.span());
                }
            }
        }

        for name in required {
            if seen.contains(name.as_str()) {
                continue;
            }
            let anchor = owner.or_else(|| node.mappings.first().map(|(key, _)| *key));
            let span = anchor.map_or(node.span(), |key| tree.node(key).span());
            self.collector
                .add_error(format!("Missing required key '{}'", name), span);
        }
    }

    async fn visit_value(
        &mut self,
        id: NodeId,
        desc: &NodeDesc,
        implicit_expression: bool,
        path: &PropertyPath,
    ) {
        let tree = self.tree;
        let node = tree.node(id);
        if node.kind != Kind::Scalar {
            self.collector.add_error("Expected a scalar value", node.span());
            return;
        }
        if node.is_null() {
            return;
        }

        if has_markers(&node.raw) {
            let provider = self.factory.get(self.workflow, path).await;
            let result =
                validate_expressions(&node.raw, node.start_offset, &mut *self.collector, &*provider)
                    .await;
            if result.failed {
                return;
            }
            if let Some(allowed) = desc.allowed_values(self.workflow, path).await {
                self.check_evaluated(node, &result, &allowed);
            }
        } else if implicit_expression {
            let (source, span) = implicit_source(node);
            let provider = self.factory.get(self.workflow, path).await;
            validate_implicit_expression(source, span, &mut *self.collector, &*provider).await;
        } else if let Some(allowed) = desc.allowed_values(self.workflow, path).await {
            self.check_allowed(&node.value, node.span(), &allowed);
        }
    }

    /// Check evaluated expressions against the allowed values. A scalar
    /// that is exactly one marker is checked by the marker's value at the
    /// marker; otherwise the interpolated text is checked at the scalar.
    /// Anything indeterminate is exempt.
    fn check_evaluated(&mut self, node: &SyntaxNode, result: &ScalarExpressions, allowed: &[ValueDesc]) {
        let (source, _) = scalar_source(node);

        if let [outcome] = result.outcomes.as_slice() {
            if is_single_marker(source) {
                if let Evaluation::Known(value) = &outcome.evaluation {
                    self.check_allowed(&to_display_string(value), outcome.span, allowed);
                }
                return;
            }
        }

        let mut values = Vec::with_capacity(result.outcomes.len());
        for outcome in &result.outcomes {
            match &outcome.evaluation {
                Evaluation::Known(value) => values.push(to_display_string(value)),
                Evaluation::Indeterminate => return,
            }
        }

        let mut text = String::with_capacity(source.len());
        let mut last = 0;
        for (marker, value) in markers(source).filter_map(Result::ok).zip(&values) {
            text.push_str(&source[last..marker.start]);
            text.push_str(value);
            last = marker.end;
        }
        text.push_str(&source[last..]);
        self.check_allowed(&text, node.span(), allowed);
    }

    fn check_allowed(&mut self, value: &str, span: Span, allowed: &[ValueDesc]) {
        if !allowed.iter().any(|candidate| candidate.value == value) {
            self.collector.add_error(
                format!("'{}' is not in the list of allowed values", value),
                span,
            );
        }
    }
}

/// Scalar text without surrounding quotes, with its absolute start.
fn scalar_source(node: &SyntaxNode) -> (&str, usize) {
    match node.style {
        ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted if node.raw.len() >= 2 => {
            (&node.raw[1..node.raw.len() - 1], node.start_offset + 1)
        }
        ScalarStyle::Block => (&node.value, node.start_offset),
        _ => (&node.raw, node.start_offset),
    }
}

/// Condition text of an `if:` scalar and the span of its content. A block
/// scalar's content starts below its `|` or `>` header.
fn implicit_source(node: &SyntaxNode) -> (&str, Span) {
    if node.style != ScalarStyle::Block {
        let (source, base) = scalar_source(node);
        return (source, (base, base + source.chars().count()));
    }

    let raw = &node.raw;
    let body = raw.find('\n').map_or(raw.len(), |newline| newline + 1);
    let indent = raw[body..].len() - raw[body..].trim_start().len();
    let start = node.start_offset + char_offset(raw, body + indent);
    let end = node.start_offset + char_offset(raw, raw.trim_end().len());
    (&node.value, (start, end.max(start)))
}

fn is_single_marker(source: &str) -> bool {
    let trimmed = source.trim();
    let mut found = markers(trimmed);
    matches!(
        (found.next(), found.next()),
        (Some(Ok(marker)), None) if marker.start == 0 && marker.end == trimmed.len()
    )
}

/// "a mapping or a sequence"
fn expected(alternatives: &[Arc<NodeDesc>]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for alt in alternatives {
        let name = alt.kind_name();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    match names.split_last() {
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        None => "nothing".to_string(),
    }
}
