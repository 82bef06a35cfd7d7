//! Validation of the expressions embedded in one scalar

use tracing::debug;

use super::context::{ContextProvider, ContextSnapshot};
use super::embedding::{markers, Unterminated};
use super::error::INVALID_EXPRESSION;
use super::evaluator::{evaluate, Evaluation};
use super::parser::parse_expression;
use crate::diagnostics::DiagnosticCollector;
use crate::position::{char_offset, Span};

/// Result of one marker that parsed and evaluated without error.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOutcome {
    /// Absolute character span of the whole `${{ ... }}` marker
    pub span: Span,
    pub evaluation: Evaluation,
}

/// Per-scalar result of [`validate_expressions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarExpressions {
    pub outcomes: Vec<MarkerOutcome>,
    /// Whether any marker produced a diagnostic
    pub failed: bool,
}

/// Parse and evaluate every `${{ }}` marker in `input`.
///
/// `base_offset` is the absolute character offset of `input` in the
/// document. Failures are reported at the span of the marker they occur
/// in, in left to right order.
pub async fn validate_expressions(
    input: &str,
    base_offset: usize,
    collector: &mut DiagnosticCollector,
    provider: &dyn ContextProvider,
) -> ScalarExpressions {
    let absolute = |byte: usize| base_offset + char_offset(input, byte);
    let mut result = ScalarExpressions::default();

    for marker in markers(input) {
        let marker = match marker {
            Ok(marker) => marker,
            Err(Unterminated { start, end }) => {
                collector.add_error(INVALID_EXPRESSION, (absolute(start), absolute(end)));
                result.failed = true;
                continue;
            }
        };

        let span = (absolute(marker.start), absolute(marker.end));
        match check(marker.expression, provider).await {
            Ok(evaluation) => result.outcomes.push(MarkerOutcome { span, evaluation }),
            Err(message) => {
                collector.add_error(message, span);
                result.failed = true;
            }
        }
    }

    result
}

/// Evaluate `input` as one expression without `${{ }}` delimiters, as
/// `if:` conditions allow. Failures are reported at `span`, the scalar's
/// content.
pub async fn validate_implicit_expression(
    input: &str,
    span: Span,
    collector: &mut DiagnosticCollector,
    provider: &dyn ContextProvider,
) -> Option<Evaluation> {
    if input.trim().is_empty() {
        return None;
    }

    match check(input, provider).await {
        Ok(evaluation) => Some(evaluation),
        Err(message) => {
            collector.add_error(message, span);
            None
        }
    }
}

/// Parse and evaluate one expression; the error is the diagnostic message.
async fn check(source: &str, provider: &dyn ContextProvider) -> Result<Evaluation, String> {
    let expr = parse_expression(source).map_err(|err| {
        debug!(expression = source, error = %err, "expression failed to parse");
        INVALID_EXPRESSION.to_string()
    })?;

    let snapshot = ContextSnapshot::capture(provider, &expr).await;
    evaluate(&expr, &snapshot).map_err(|err| err.message())
}
