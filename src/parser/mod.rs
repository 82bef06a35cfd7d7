//! Workflow document parsing
//!
//! Text is turned into a positioned [`SyntaxTree`] and a deserialized
//! [`Workflow`] value, then validated against a schema by
//! [`parse`]. Hover and completion read the resulting [`WorkflowDocument`].

mod ast;
pub mod complete;
mod document;
pub mod hover;
mod tree;
mod yaml;

pub use ast::{find_node, Kind, NodeId, ScalarStyle, SyntaxNode, SyntaxTree};
pub use document::{parse, WorkflowDocument};
pub use tree::build_tree;
pub use yaml::{check_syntax, to_workflow, Workflow};
