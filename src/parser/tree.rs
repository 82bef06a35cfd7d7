//! tree-sitter YAML adapter
//!
//! Converts the concrete syntax tree produced by tree-sitter into the
//! uniform [`SyntaxTree`] model: maps, sequences and decoded scalars with
//! character offsets. Anchors, tags and comments are dropped; aliases are kept
//! as plain scalars holding their source text. The tree-sitter parser is error
//! tolerant, so a document with a syntax error still yields every node that
//! could be recovered.

use tree_sitter::{Language, Node, Parser};

use super::ast::{Kind, NodeId, ScalarStyle, SyntaxNode, SyntaxTree};
use crate::position::CharIndex;

/// Parse `text` into a positioned syntax tree.
pub fn build_tree(text: &str) -> SyntaxTree {
    let mut parser = Parser::new();
    let language: Language = tree_sitter_yaml::LANGUAGE.into();
    if let Err(err) = parser.set_language(&language) {
        tracing::warn!("Failed to load YAML grammar: {}", err);
        return SyntaxTree::new();
    }

    let parsed = match parser.parse(text, None) {
        Some(parsed) => parsed,
        None => return SyntaxTree::new(),
    };

    let mut builder = TreeBuilder {
        text,
        index: CharIndex::new(text),
        tree: SyntaxTree::new(),
    };
    if let Some(root) = builder.convert(parsed.root_node()) {
        builder.tree.set_root(root);
    }
    builder.tree
}

struct TreeBuilder<'t> {
    text: &'t str,
    index: CharIndex,
    tree: SyntaxTree,
}

impl TreeBuilder<'_> {
    fn convert(&mut self, node: Node) -> Option<NodeId> {
        match node.kind() {
            "stream" | "document" | "ERROR" => named_children(node)
                .into_iter()
                .find_map(|child| self.convert(child)),
            "block_node" | "flow_node" => {
                let content = named_children(node)
                    .into_iter()
                    .find(|child| !matches!(child.kind(), "anchor" | "tag" | "comment"));
                match content {
                    Some(content) => self.convert(content),
                    // Only properties, e.g. `key: !!str`
                    None => Some(self.empty_at(node.end_byte())),
                }
            }
            "block_mapping" | "flow_mapping" => Some(self.convert_map(node)),
            "block_sequence" | "flow_sequence" => Some(self.convert_sequence(node)),
            "block_mapping_pair" | "flow_pair" => {
                let id = self.push(Kind::Map, node);
                if let Some((key, value)) = self.convert_pair(node) {
                    self.attach_pair(id, key, value);
                }
                Some(id)
            }
            "plain_scalar" | "single_quote_scalar" | "double_quote_scalar" | "block_scalar"
            | "alias" => Some(self.convert_scalar(node)),
            _ => None,
        }
    }

    fn convert_map(&mut self, node: Node) -> NodeId {
        let id = self.push(Kind::Map, node);
        for child in named_children(node) {
            match child.kind() {
                "block_mapping_pair" | "flow_pair" => {
                    if let Some((key, value)) = self.convert_pair(child) {
                        self.attach_pair(id, key, value);
                    }
                }
                // `{ a, b }` - keys without values
                "flow_node" => {
                    if let Some(key) = self.convert(child) {
                        let value = self.empty_at(child.end_byte());
                        self.attach_pair(id, key, value);
                    }
                }
                _ => {}
            }
        }
        id
    }

    fn convert_pair(&mut self, pair: Node) -> Option<(NodeId, NodeId)> {
        let key = pair
            .child_by_field_name("key")
            .and_then(|key| self.convert(key))?;
        let value = match pair
            .child_by_field_name("value")
            .and_then(|value| self.convert(value))
        {
            Some(value) => value,
            None => {
                let key_end = pair
                    .child_by_field_name("key")
                    .map(|key| key.end_byte())
                    .unwrap_or_else(|| pair.end_byte());
                self.empty_at(key_end)
            }
        };
        Some((key, value))
    }

    fn attach_pair(&mut self, map: NodeId, key: NodeId, value: NodeId) {
        self.tree.node_mut(key).parent = Some(map);
        self.tree.node_mut(value).parent = Some(map);
        self.tree.node_mut(map).mappings.push((key, value));
    }

    fn convert_sequence(&mut self, node: Node) -> NodeId {
        let id = self.push(Kind::Sequence, node);
        for child in named_children(node) {
            let item = match child.kind() {
                "block_sequence_item" => {
                    let content = named_children(child)
                        .into_iter()
                        .find_map(|inner| self.convert(inner));
                    Some(content.unwrap_or_else(|| self.empty_at(child.end_byte())))
                }
                "comment" => None,
                _ => self.convert(child),
            };
            if let Some(item) = item {
                self.tree.node_mut(item).parent = Some(id);
                self.tree.node_mut(id).items.push(item);
            }
        }
        id
    }

    fn convert_scalar(&mut self, node: Node) -> NodeId {
        let raw = &self.text[node.byte_range()];
        let (style, value) = match node.kind() {
            "single_quote_scalar" => (ScalarStyle::SingleQuoted, decode_single_quoted(raw)),
            "double_quote_scalar" => (ScalarStyle::DoubleQuoted, decode_double_quoted(raw)),
            "block_scalar" => (ScalarStyle::Block, decode_block(raw)),
            _ => (ScalarStyle::Plain, fold_lines(raw)),
        };

        let id = self.push(Kind::Scalar, node);
        let scalar = self.tree.node_mut(id);
        scalar.raw = raw.to_string();
        scalar.value = value;
        scalar.style = style;
        id
    }

    /// Zero-width null scalar at `byte`.
    fn empty_at(&mut self, byte: usize) -> NodeId {
        let offset = self.index.to_char(byte);
        let mut node = SyntaxNode::new(Kind::Scalar, offset, offset);
        node.style = ScalarStyle::Empty;
        self.tree.push(node)
    }

    fn push(&mut self, kind: Kind, node: Node) -> NodeId {
        let start = self.index.to_char(node.start_byte());
        let end = self.index.to_char(node.end_byte());
        self.tree.push(SyntaxNode::new(kind, start, end))
    }
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Fold a multi-line flow scalar: line breaks become single spaces.
fn fold_lines(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn decode_single_quoted(raw: &str) -> String {
    let inner = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    fold_lines(&inner.replace("''", "'"))
}

fn decode_double_quoted(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let folded = fold_lines(inner);

    let mut result = String::with_capacity(folded.len());
    let mut chars = folded.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('x') => push_hex(&mut result, &mut chars, 2),
            Some('u') => push_hex(&mut result, &mut chars, 4),
            Some('U') => push_hex(&mut result, &mut chars, 8),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

fn push_hex(result: &mut String, chars: &mut std::str::Chars, digits: usize) {
    let hex: String = chars.by_ref().take(digits).collect();
    if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
        result.push(ch);
    }
}

/// Decode a literal (`|`) or folded (`>`) block scalar, including its
/// chomping indicator.
fn decode_block(raw: &str) -> String {
    let mut lines = raw.lines();
    let header = lines.next().unwrap_or_default();
    let folded = header.trim_start().starts_with('>');
    let chomping = if header.contains('-') {
        '-'
    } else if header.contains('+') {
        '+'
    } else {
        ' '
    };

    let body: Vec<&str> = lines.collect();
    let indent = body
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let body: Vec<&str> = body
        .iter()
        .map(|line| line.get(indent..).unwrap_or(""))
        .collect();

    let mut value = if folded {
        let mut out = String::new();
        for (i, line) in body.iter().enumerate() {
            if i > 0 {
                out.push(if line.is_empty() { '\n' } else { ' ' });
            }
            out.push_str(line);
        }
        out
    } else {
        body.join("\n")
    };

    match chomping {
        '-' => value.truncate(value.trim_end_matches('\n').len()),
        '+' => value.push('\n'),
        _ => {
            value.truncate(value.trim_end_matches('\n').len());
            value.push('\n');
        }
    }
    value
}
