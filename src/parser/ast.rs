//! Positioned syntax tree for a YAML document

use crate::path::{PathSegment, PropertyPath};
use crate::position::{span_contains, Span};

/// Identity of a node within one [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// The three node shapes of a YAML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Map,
    Sequence,
    Scalar,
}

/// How a scalar was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Block,
    /// Implicit null, e.g. a key with nothing after the colon
    Empty,
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: Kind,
    /// Decoded scalar text (empty for maps and sequences)
    pub value: String,
    /// Source text of the scalar exactly as written, including quotes
    pub raw: String,
    pub style: ScalarStyle,
    /// Key/value pairs in document order (maps only)
    pub mappings: Vec<(NodeId, NodeId)>,
    /// Items in document order (sequences only)
    pub items: Vec<NodeId>,
    pub start_offset: usize,
    pub end_offset: usize,
    pub parent: Option<NodeId>,
}

impl SyntaxNode {
    pub(crate) fn new(kind: Kind, start_offset: usize, end_offset: usize) -> Self {
        Self {
            kind,
            value: String::new(),
            raw: String::new(),
            style: ScalarStyle::Plain,
            mappings: Vec::new(),
            items: Vec::new(),
            start_offset,
            end_offset,
            parent: None,
        }
    }

    pub fn span(&self) -> Span {
        (self.start_offset, self.end_offset)
    }

    /// YAML null: an empty value, `~` or a plain `null`.
    pub fn is_null(&self) -> bool {
        self.kind == Kind::Scalar
            && match self.style {
                ScalarStyle::Empty => true,
                ScalarStyle::Plain => matches!(self.value.as_str(), "" | "~" | "null" | "Null" | "NULL"),
                _ => false,
            }
    }
}

/// Arena holding every node of one parsed document.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    root: Option<NodeId>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: SyntaxNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SyntaxNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Value node of `key` in the map `id`.
    pub fn get(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.node(id)
            .mappings
            .iter()
            .find(|(k, _)| self.node(*k).value == key)
            .map(|(_, v)| *v)
    }

    /// Key node that owns the value `id`, if `id` is a map value.
    pub fn key_of(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        self.node(parent)
            .mappings
            .iter()
            .find(|(_, v)| *v == id)
            .map(|(k, _)| *k)
    }

    /// Document path of `id`. A key node has the path of its value.
    pub fn path_of(&self, id: NodeId) -> PropertyPath {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            let parent_node = self.node(parent);
            match parent_node.kind {
                Kind::Map => {
                    if let Some((key, _)) = parent_node
                        .mappings
                        .iter()
                        .find(|(k, v)| *k == current || *v == current)
                    {
                        segments.push(PathSegment::Key(self.node(*key).value.clone()));
                    }
                }
                Kind::Sequence => {
                    if let Some(i) = parent_node.items.iter().position(|item| *item == current) {
                        segments.push(PathSegment::Index(i));
                    }
                }
                Kind::Scalar => {}
            }
            current = parent;
        }
        segments.reverse();
        PropertyPath::from(segments)
    }
}

/// Find the innermost node whose range contains `offset`.
///
/// Descends one level per step, so the cost is proportional to the depth of
/// the tree times the fan-out scanned at each level.
pub fn find_node(tree: &SyntaxTree, offset: usize) -> Option<NodeId> {
    let mut current = tree.root()?;
    if !span_contains(tree.node(current).span(), offset) {
        return None;
    }

    // Siblings are in document order and do not overlap, so only the last
    // one starting at or before `offset` can contain it.
    loop {
        let node = tree.node(current);
        let next = match node.kind {
            Kind::Map => {
                let at = node
                    .mappings
                    .partition_point(|(key, _)| tree.node(*key).start_offset <= offset);
                at.checked_sub(1).and_then(|i| {
                    let (key, value) = node.mappings[i];
                    let value_node = tree.node(value);
                    if span_contains(tree.node(key).span(), offset) {
                        Some(key)
                    } else if value_node.style != ScalarStyle::Empty
                        && span_contains(value_node.span(), offset)
                    {
                        Some(value)
                    } else {
                        None
                    }
                })
            }
            Kind::Sequence => {
                let at = node
                    .items
                    .partition_point(|item| tree.node(*item).start_offset <= offset);
                at.checked_sub(1)
                    .map(|i| node.items[i])
                    .filter(|item| span_contains(tree.node(*item).span(), offset))
            }
            Kind::Scalar => None,
        };
        match next {
            Some(next) => current = next,
            None => return Some(current),
        }
    }
}
