//! Diagnostic collection and schema validation

mod collector;
mod workflow_validator;

pub use collector::{Diagnostic, DiagnosticCollector, DiagnosticKind};
pub use workflow_validator::{validate, NodeDescriptions};
