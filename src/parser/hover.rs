//! Hover text for a position in a workflow document

use std::sync::Arc;

use super::{find_node, Kind, NodeId, WorkflowDocument};
use crate::schema::{DescKind, NodeDesc};

/// Hover text for the node at `offset`.
///
/// For a scalar whose value is one of the allowed values, that value's
/// description wins over the description of the position.
pub async fn hover(doc: &WorkflowDocument, offset: usize) -> Option<String> {
    let id = find_node(&doc.tree, offset)?;
    let node = doc.tree.node(id);
    let desc = effective_desc(doc, id)?;

    if matches!(desc.kind, DescKind::Value { .. }) && node.kind == Kind::Scalar {
        let path = doc.tree.path_of(id);
        let value_text = desc
            .allowed_values(&doc.workflow, &path)
            .await
            .into_iter()
            .flatten()
            .find(|allowed| allowed.value == node.value)
            .and_then(|allowed| allowed.description);
        if value_text.is_some() {
            return value_text;
        }
    }

    desc.description.clone().or_else(|| {
        // Alternatives of a `one_of` carry no text of their own
        let key = doc.tree.key_of(id)?;
        doc.node_to_desc.get(&key)?.description.clone()
    })
}

/// Description governing `id`. A lone node under a sequence description
/// stands for the sequence's single item.
fn effective_desc(doc: &WorkflowDocument, id: NodeId) -> Option<&Arc<NodeDesc>> {
    let desc = doc.node_to_desc.get(&id)?;
    let node = doc.tree.node(id);
    let is_key = node.parent.map_or(false, |parent| {
        doc.tree.node(parent).mappings.iter().any(|(key, _)| *key == id)
    });
    match &desc.kind {
        DescKind::Sequence { item_desc } if !is_key && node.kind != Kind::Sequence => {
            Some(item_desc)
        }
        _ => Some(desc),
    }
}
