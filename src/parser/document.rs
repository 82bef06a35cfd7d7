//! Document assembly: syntax check, tree, workflow value and validation

use std::sync::Arc;

use tracing::debug;

use super::{build_tree, check_syntax, to_workflow, SyntaxTree, Workflow};
use crate::diagnostics::{validate, Diagnostic, DiagnosticCollector, NodeDescriptions};
use crate::expressions::ContextProviderFactory;
use crate::position::CharIndex;
use crate::schema::NodeDesc;

/// A parsed and validated workflow document.
#[derive(Debug)]
pub struct WorkflowDocument {
    pub tree: SyntaxTree,
    pub workflow: Workflow,
    /// Description each node was validated against
    pub node_to_desc: NodeDescriptions,
    /// Diagnostics in document order
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse `input` and validate it against `schema`.
///
/// `filename` only identifies the document in logs. A YAML syntax error is
/// reported but does not stop validation of whatever the error tolerant
/// tree recovered.
pub async fn parse(
    filename: &str,
    input: &str,
    schema: &Arc<NodeDesc>,
    factory: &dyn ContextProviderFactory,
) -> WorkflowDocument {
    let index = CharIndex::new(input);
    let mut collector = DiagnosticCollector::new();

    let well_formed = check_syntax(input, &index, &mut collector);
    let tree = build_tree(input);
    let workflow = to_workflow(input, &tree);
    let node_to_desc = validate(&tree, &workflow, schema, factory, &mut collector).await;

    let diagnostics = collector.into_diagnostics();
    debug!(
        filename,
        well_formed,
        nodes = tree.len(),
        diagnostics = diagnostics.len(),
        "parsed workflow"
    );

    WorkflowDocument {
        tree,
        workflow,
        node_to_desc,
        diagnostics,
    }
}
