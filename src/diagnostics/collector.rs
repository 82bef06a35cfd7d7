//! Diagnostic values and their collection

use serde::Serialize;
use tower_lsp::lsp_types::{self, DiagnosticSeverity};

use crate::position::{LineIndex, Span};

/// Severity of a diagnostic. Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum DiagnosticKind {
    Error = 0,
    Warning = 1,
    Information = 2,
    Hint = 3,
}

impl From<DiagnosticKind> for u8 {
    fn from(kind: DiagnosticKind) -> Self {
        kind as u8
    }
}

/// A reported issue: `{ message, pos: [start, end], kind }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub pos: Span,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, pos: Span) -> Self {
        Self {
            message: message.into(),
            pos,
            kind: DiagnosticKind::Error,
        }
    }

    /// Convert into an LSP diagnostic using the document's line index.
    pub fn to_lsp(&self, line_index: &LineIndex) -> lsp_types::Diagnostic {
        lsp_types::Diagnostic {
            range: line_index.range(self.pos),
            severity: Some(match self.kind {
                DiagnosticKind::Error => DiagnosticSeverity::ERROR,
                DiagnosticKind::Warning => DiagnosticSeverity::WARNING,
                DiagnosticKind::Information => DiagnosticSeverity::INFORMATION,
                DiagnosticKind::Hint => DiagnosticSeverity::HINT,
            }),
            code: None,
            code_description: None,
            source: Some("actions-workflow-lsp".to_string()),
            message: self.message.clone(),
            related_information: None,
            tags: None,
            data: None,
        }
    }
}

/// Collects diagnostics during parsing and validation
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add an error diagnostic
    pub fn add_error(&mut self, message: impl Into<String>, pos: Span) {
        self.add(Diagnostic::error(message, pos));
    }

    /// Convert into the final list of diagnostics, in document order.
    ///
    /// The sort is stable, so diagnostics starting at the same offset keep
    /// the order in which they were reported.
    pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by_key(|d| d.pos.0);
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let diagnostic = Diagnostic::error("Invalid expression", (0, 14));
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "message": "Invalid expression", "pos": [0, 14], "kind": 0 })
        );
    }

    #[test]
    fn test_document_order() {
        let mut collector = DiagnosticCollector::new();
        collector.add_error("second", (10, 12));
        collector.add(Diagnostic {
            message: "first".to_string(),
            pos: (0, 1),
            kind: DiagnosticKind::Hint,
        });
        collector.add(Diagnostic {
            message: "also second".to_string(),
            pos: (10, 11),
            kind: DiagnosticKind::Warning,
        });

        let diagnostics = collector.into_diagnostics();
        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "also second"]);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Hint);
    }

    #[test]
    fn test_to_lsp() {
        let line_index = LineIndex::new("on: push\njobs: x");
        let diagnostic = Diagnostic::error("Key 'x' is not allowed", (15, 16));
        let lsp = diagnostic.to_lsp(&line_index);
        assert_eq!(lsp.range.start, lsp_types::Position::new(1, 6));
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(lsp.source.as_deref(), Some("actions-workflow-lsp"));
    }
}
