//! Integration tests for the actions-workflow-lsp analysis pipeline
//!
//! These tests run whole workflow documents through parsing, schema
//! validation and expression evaluation and check the exact diagnostics.

use std::fs;
use std::sync::Arc;

use actions_workflow_lsp::diagnostics::{Diagnostic, DiagnosticKind};
use actions_workflow_lsp::parser::complete::{complete, CompletionKind};
use actions_workflow_lsp::parser::hover::hover;
use actions_workflow_lsp::parser::{parse, WorkflowDocument};
use actions_workflow_lsp::position::LineIndex;
use actions_workflow_lsp::schema::{workflow_schema, Context, EditContextProviderFactory};
use assert_matches::assert_matches;

/// Known repository, no secrets beyond `GITHUB_TOKEN`
fn closed_context() -> Context {
    Context {
        owner: Some("owner".to_string()),
        repository: Some("repository".to_string()),
        secrets: Some(Vec::new()),
        variables: Some(Vec::new()),
    }
}

async fn parse_with(text: &str, context: Context) -> WorkflowDocument {
    let schema = Arc::new(workflow_schema());
    let factory = EditContextProviderFactory::new(context);
    parse("workflow.yml", text, &schema, &factory).await
}

async fn validate(text: &str) -> Vec<Diagnostic> {
    parse_with(text, closed_context()).await.diagnostics
}

#[tokio::test]
async fn test_valid_workflow_no_diagnostics() {
    let text = fs::read_to_string("tests/fixtures/valid/ci.yml").expect("Failed to read fixture");

    let diagnostics = parse_with(&text, Context::default()).await.diagnostics;

    assert!(
        diagnostics.is_empty(),
        "Expected no diagnostics for valid workflow, got: {:?}",
        diagnostics
    );
}

#[tokio::test]
async fn test_expression_in_string() {
    let text = r#"on: push
env:
  secret_name: test
  test: 42
jobs:
  first:
    runs-on: [ubuntu-latest]
    steps:
      - name: pass secret value
        run: echo "::set-env name=secret_value::${{ env[env.secret_name] }}""#;

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_status_function_in_steps() {
    let text = r#"on: push
env:
  secret_name: test
  test: 42
jobs:
  first:
    runs-on: [ubuntu-latest]
    steps:
      - run: ./doSomething
      - if: ${{ failure() }}
        run: echo "Previous step failed""#;

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_environment_as_string_or_object() {
    let as_string = "on: push
jobs:
  first:
    runs-on: [ubuntu-latest]
    environment: Prod
    steps:
      - run: echo Hello";
    assert_eq!(validate(as_string).await, vec![]);

    let as_object = "on: push
jobs:
  first:
    runs-on: [ubuntu-latest]
    environment:
      name: prod
      url: https://www.github.com
    steps:
      - run: echo Hello";
    assert_eq!(validate(as_object).await, vec![]);
}

#[tokio::test]
async fn test_environment_invalid_key() {
    let text = "on: push
jobs:
  first:
    runs-on: [ubuntu-latest]
    environment:
      name: prod
      url2: https://www.github.com
    steps:
      - run: echo Hello";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error("Key 'url2' is not allowed", (93, 97))]
    );
}

#[tokio::test]
async fn test_needs_existing_job() {
    let text = "on: push
jobs:
  build:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo 1
  test:
    runs-on: [ubuntu-latest]
    needs: build
    steps:
      - run: echo 1";

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_needs_missing_job() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    needs: build
    steps:
      - run: echo 1";

    let diagnostics = validate(text).await;
    assert_eq!(
        diagnostics,
        vec![Diagnostic::error("'build' is not in the list of allowed values", (63, 68))]
    );
    assert_matches!(diagnostics[0].kind, DiagnosticKind::Error);
}

#[tokio::test]
async fn test_needs_some_missing_jobs() {
    let text = "on: push
jobs:
  build:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo 1
  test:
    runs-on: [ubuntu-latest]
    needs: [build, setup]
    steps:
      - run: echo 1";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error("'setup' is not in the list of allowed values", (140, 145))]
    );
}

#[tokio::test]
async fn test_step_outputs_of_undeclared_step() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo 1
        if: ${{ steps.build.outputs.did_warn }}";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error(
            "Unknown context access: 'steps.build.outputs.did_warn'",
            (95, 130)
        )]
    );
}

#[tokio::test]
async fn test_step_outputs_of_earlier_step() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - id: build
        run: echo
      - if: ${{ steps.build.outputs.did_warn }}
        run: echo 1";

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_secrets_without_enumeration() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo ${{ secrets.TEST }}";

    assert_eq!(parse_with(text, Context::default()).await.diagnostics, vec![]);

    // With a known, empty set of secrets the access is invalid
    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error("Unknown context access: 'secrets.TEST'", (81, 100))]
    );
}

#[tokio::test]
async fn test_workflow_env_cannot_reference_itself() {
    let text = "on: push
env:
  A: x
  B: ${{ env.A }}
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo 1";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error("Unknown context access: 'env.A'", (26, 38))]
    );
}

#[tokio::test]
async fn test_runs_on_expression() {
    let text = "on: push
env:
  R: ubuntu-latest

jobs:
  test:
    runs-on: ${{ env.R }}

    steps:
      - run: echo hello";

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_runs_on_expression_not_allowed() {
    let text = "on: push
env:
  R: does-not-exist

jobs:
  test:
    runs-on: ${{ env.R }}

    steps:
      - run: echo hello";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error(
            "'does-not-exist' is not in the list of allowed values",
            (62, 74)
        )]
    );
}

#[tokio::test]
async fn test_runs_on_from_json() {
    let text = r#"on: push

jobs:
  test:
    runs-on: ${{ fromJson('["ubuntu-latest", "self-hosted"]')[1 == 2] }}

    steps:
      - run: echo hello"#;

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_runs_on_from_json_not_allowed() {
    let text = r#"on: push

env:
  R: 2

jobs:
  test:
    runs-on: ${{ fromJson('["ubuntu-latest", "does-not-exist"]')[env.R == 2] }}

    steps:
      - run: echo hello"#;

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error(
            "'does-not-exist' is not in the list of allowed values",
            (50, 116)
        )]
    );
}

#[tokio::test]
async fn test_matrix_arbitrary_keys() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]

    strategy:
      matrix:
        os: [win, linux]
        node: [8, 12]

    steps:
      - run: echo ${{ matrix.os }}";

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_matrix_include_keys() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]

    strategy:
      matrix:
        include:
          - os: win
            node: 8
          - os: linux
            node: 12
            experimental: true

    steps:
      - run: echo ${{ matrix.os }} ${{ matrix.node }} ${{ matrix.experimental }}";

    assert_eq!(validate(text).await, vec![]);
}

#[tokio::test]
async fn test_folded_if_condition() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo 1
        if: >-
          github.nope";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error("Unknown context access: 'github.nope'", (108, 119))]
    );
}

#[tokio::test]
async fn test_unknown_function_reports_argument_first() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo ${{ nope(github.test) }}";

    assert_eq!(
        validate(text).await,
        vec![Diagnostic::error("Unknown context access: 'github.test'", (81, 105))]
    );
}

#[tokio::test]
async fn test_multiple_invalid_expressions_in_order() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo ${{ foo.test }} ${{ github.nope }}";

    assert_eq!(
        validate(text).await,
        vec![
            Diagnostic::error("Invalid expression", (81, 96)),
            Diagnostic::error("Unknown context access: 'github.nope'", (97, 115)),
        ]
    );
}

#[tokio::test]
async fn test_missing_required_root_keys() {
    let diagnostics = validate("name: CI\n").await;
    let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Missing required key 'on'", "Missing required key 'jobs'"]
    );
    assert!(diagnostics.iter().all(|d| d.pos == (0, 4)));
}

#[tokio::test]
async fn test_yaml_syntax_error() {
    let diagnostics = validate("on: push\njobs:\n  build: [unclosed\n").await;
    assert!(!diagnostics.is_empty());
    assert_matches!(diagnostics[0].kind, DiagnosticKind::Error);
}

#[tokio::test]
async fn test_lsp_conversion() {
    let text = "on: push
jobs:
  test:
    runs-on: [ubuntu-latest]
    needs: build
    steps:
      - run: echo 1";

    let diagnostics = validate(text).await;
    let line_index = LineIndex::new(text);
    let lsp = diagnostics[0].to_lsp(&line_index);
    assert_eq!(lsp.range.start.line, 4);
    assert_eq!(lsp.range.start.character, 11);
    assert_eq!(lsp.range.end.character, 16);
}

#[tokio::test]
async fn test_hover_and_completion() {
    let text = "on: push
jobs:
  build:
    runs-on: [ubuntu-latest]
    steps:
      - run: echo ${{ github. }}";

    let doc = parse_with(text, closed_context()).await;

    let offset = text.find("ubuntu").unwrap();
    assert_eq!(
        hover(&doc, offset).await.as_deref(),
        Some("Latest Ubuntu runner")
    );

    let factory = EditContextProviderFactory::new(closed_context());
    let offset = text.find("github.").unwrap() + "github.".len();
    let items = complete(&doc, offset, &factory).await;
    assert!(items
        .iter()
        .any(|item| item.label == "repository" && item.kind == CompletionKind::Property));
}
