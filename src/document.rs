//! Document state management

use crate::parser::WorkflowDocument;
use crate::position::LineIndex;

/// An open text document and its latest analysis
#[derive(Debug)]
pub struct Document {
    /// The document text content
    pub text: String,
    /// The document version
    pub version: i32,
    pub line_index: LineIndex,
    pub parsed: WorkflowDocument,
}

impl Document {
    pub fn new(text: String, version: i32, parsed: WorkflowDocument) -> Self {
        let line_index = LineIndex::new(&text);
        Self {
            text,
            version,
            line_index,
            parsed,
        }
    }
}
