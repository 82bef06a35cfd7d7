//! actions-workflow-lsp: static analysis and LSP server library for GitHub
//! Actions workflow files
//!
//! This library provides the core functionality for the actions-workflow-lsp server:
//! - A positioned YAML syntax tree with character offsets
//! - Schema validation of workflow documents
//! - Parsing and evaluation of `${{ }}` expressions against the contexts
//!   available at each position
//! - Hover and completion driven by the same schema
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use actions_workflow_lsp::parser::parse;
//! use actions_workflow_lsp::schema::{workflow_schema, Context, EditContextProviderFactory};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let text = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    if: ${{ github.nope }}\n";
//! let schema = Arc::new(workflow_schema());
//! let factory = EditContextProviderFactory::new(Context::default());
//! let doc = parse("ci.yml", text, &schema, &factory).await;
//! assert_eq!(doc.diagnostics[0].message, "Unknown context access: 'github.nope'");
//! # });
//! ```

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod expressions;
pub mod parser;
pub mod path;
pub mod position;
pub mod schema;

mod backend;

pub use backend::Backend;
