//! Expression contexts derived from the workflow being edited
//!
//! What an expression may reference depends on where it sits: `steps` only
//! lists steps declared earlier in the same job, `matrix` only exists inside
//! a job with a matrix strategy, `env` merges the workflow, job and step
//! scopes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::Value;
use tower_lsp::async_trait;
use tracing::debug;

use crate::expressions::embedding::has_markers;
use crate::expressions::{ContextProvider, ContextProviderFactory, ContextValue};
use crate::parser::Workflow;
use crate::path::{iterate_path, PropertyPath};

const GITHUB_FIELDS: &[&str] = &[
    "action",
    "action_path",
    "action_ref",
    "action_repository",
    "action_status",
    "actor",
    "actor_id",
    "api_url",
    "base_ref",
    "env",
    "event",
    "event_name",
    "event_path",
    "graphql_url",
    "head_ref",
    "job",
    "path",
    "ref",
    "ref_name",
    "ref_protected",
    "ref_type",
    "repository",
    "repository_id",
    "repository_owner",
    "repository_owner_id",
    "repositoryUrl",
    "retention_days",
    "run_attempt",
    "run_id",
    "run_number",
    "secret_source",
    "server_url",
    "sha",
    "token",
    "triggering_actor",
    "workflow",
    "workflow_ref",
    "workflow_sha",
    "workspace",
];

const JOB_FIELDS: &[&str] = &["container", "services", "status"];

const RUNNER_FIELDS: &[&str] = &["arch", "debug", "environment", "name", "os", "temp", "tool_cache"];

const STRATEGY_FIELDS: &[&str] = &["fail-fast", "job-index", "job-total", "max-parallel"];

/// Repository the workflow belongs to and what is known about its secrets
/// and configuration variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Context {
    pub owner: Option<String>,
    pub repository: Option<String>,
    /// Secret names; `None` when they cannot be enumerated
    pub secrets: Option<Vec<String>>,
    /// Configuration variable names; `None` when they cannot be enumerated
    pub variables: Option<Vec<String>>,
}

/// Context provider for one position of a workflow.
///
/// All contexts are computed up front from the workflow.
#[derive(Debug, Clone)]
pub struct EditContextProvider {
    contexts: HashMap<&'static str, ContextValue>,
}

/// Where in the workflow an expression sits.
struct Scope<'w> {
    workflow: &'w Workflow,
    job: Option<&'w Value>,
    /// Index of the enclosing step within the job
    step: Option<usize>,
    path: &'w PropertyPath,
}

impl EditContextProvider {
    pub fn new(workflow: &Workflow, path: &PropertyPath, context: &Context) -> Self {
        let job = match (path.key(0), path.key(1)) {
            (Some("jobs"), Some(_)) => iterate_path(&path.segments()[..2], workflow),
            _ => None,
        };
        let step = match (job, path.key(2)) {
            (Some(_), Some("steps")) => path.index(3),
            _ => None,
        };
        let scope = Scope {
            workflow,
            job,
            step,
            path,
        };

        let mut contexts = HashMap::new();
        contexts.insert("github", github(context));
        contexts.insert("env", env(&scope));
        contexts.insert("secrets", secrets(workflow, context));
        contexts.insert("vars", dynamic_names(context.variables.as_deref()));
        contexts.insert("inputs", inputs(workflow));
        if let Some(jobs) = jobs_context(&scope) {
            contexts.insert("jobs", jobs);
        }
        if let Some(job) = scope.job {
            contexts.insert("job", fields(JOB_FIELDS));
            contexts.insert("runner", fields(RUNNER_FIELDS));
            contexts.insert("strategy", fields(STRATEGY_FIELDS));
            contexts.insert("steps", steps(job, scope.step));
            contexts.insert("needs", needs(workflow, job));
            if let Some(matrix) = matrix(job) {
                contexts.insert("matrix", matrix);
            }
        }

        debug!(path = %path, contexts = contexts.len(), "built expression contexts");
        Self { contexts }
    }
}

#[async_trait]
impl ContextProvider for EditContextProvider {
    async fn get(&self, context: &str) -> Option<ContextValue> {
        self.contexts.get(context).cloned()
    }
}

/// Builds an [`EditContextProvider`] per expression position.
#[derive(Debug, Clone, Default)]
pub struct EditContextProviderFactory {
    context: Context,
}

impl EditContextProviderFactory {
    pub fn new(context: Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ContextProviderFactory for EditContextProviderFactory {
    async fn get(&self, workflow: &Workflow, path: &PropertyPath) -> Arc<dyn ContextProvider> {
        Arc::new(EditContextProvider::new(workflow, path, &self.context))
    }
}

fn fields(names: &[&str]) -> ContextValue {
    ContextValue::object(names.iter().map(|name| (name.to_string(), ContextValue::Dynamic)))
}

/// Closed object of the given names with unknown values, or fully dynamic
/// when the names cannot be enumerated.
fn dynamic_names(names: Option<&[String]>) -> ContextValue {
    match names {
        Some(names) => ContextValue::object(names.iter().map(|name| (name.clone(), ContextValue::Dynamic))),
        None => ContextValue::Dynamic,
    }
}

fn mapping_keys(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_mapping)
        .map(|mapping| mapping.keys().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Scalar values are known unless they are themselves expressions.
fn yaml_value(value: &Value) -> ContextValue {
    if value.as_str().map_or(false, has_markers) {
        return ContextValue::Dynamic;
    }
    serde_json::to_value(value).map_or(ContextValue::Dynamic, ContextValue::Known)
}

fn github(context: &Context) -> ContextValue {
    ContextValue::object(GITHUB_FIELDS.iter().map(|field| {
        let known = match *field {
            "repository" => context.repository.as_ref(),
            "repository_owner" => context.owner.as_ref(),
            _ => None,
        };
        let value = match known {
            Some(value) => ContextValue::Known(value.clone().into()),
            None => ContextValue::Dynamic,
        };
        (field.to_string(), value)
    }))
}

fn env(scope: &Scope<'_>) -> ContextValue {
    // A scope's own `env` block only sees the enclosing scopes
    let mut sources = Vec::new();
    if scope.path.key(0) != Some("env") {
        sources.push(scope.workflow.get("env"));
    }
    if let Some(job) = scope.job {
        if scope.path.key(2) != Some("env") {
            sources.push(job.get("env"));
        }
        if let Some(step) = scope.step.and_then(|i| job.get("steps")?.get(i)) {
            if scope.path.key(4) != Some("env") {
                sources.push(step.get("env"));
            }
        }
    }

    let mut fields = indexmap::IndexMap::new();
    for mapping in sources.into_iter().flatten().filter_map(Value::as_mapping) {
        for (key, value) in mapping {
            if let Some(key) = key.as_str() {
                fields.insert(key.to_string(), yaml_value(value));
            }
        }
    }
    ContextValue::Object { fields, open: false }
}

fn secrets(workflow: &Workflow, context: &Context) -> ContextValue {
    let Some(configured) = &context.secrets else {
        return ContextValue::Dynamic;
    };

    let mut names = vec!["GITHUB_TOKEN".to_string()];
    names.extend(configured.iter().cloned());
    names.extend(mapping_keys(
        workflow
            .get("on")
            .and_then(|on| on.get("workflow_call"))
            .and_then(|call| call.get("secrets")),
    ));
    dynamic_names(Some(&names))
}

fn inputs(workflow: &Workflow) -> ContextValue {
    let on = workflow.get("on");
    let mut names = Vec::new();
    for event in ["workflow_dispatch", "workflow_call"] {
        names.extend(mapping_keys(
            on.and_then(|on| on.get(event)).and_then(|e| e.get("inputs")),
        ));
    }
    dynamic_names(Some(&names))
}

/// `jobs` is only available to the outputs of a reusable workflow.
fn jobs_context(scope: &Scope<'_>) -> Option<ContextValue> {
    if scope.path.key(0) != Some("on") || scope.path.key(1) != Some("workflow_call") {
        return None;
    }
    let jobs = mapping_keys(scope.workflow.get("jobs"));
    Some(ContextValue::object(jobs.into_iter().map(|id| {
        (
            id,
            ContextValue::object([
                ("outputs".to_string(), ContextValue::open_object([])),
                ("result".to_string(), ContextValue::Dynamic),
            ]),
        )
    })))
}

/// Steps with an `id` declared before `current`; every step of the job
/// when the expression is outside of the steps.
fn steps(job: &Value, current: Option<usize>) -> ContextValue {
    let Some(steps) = job.get("steps").and_then(Value::as_sequence) else {
        return ContextValue::object([]);
    };
    let visible = current.unwrap_or(steps.len()).min(steps.len());

    ContextValue::object(steps[..visible].iter().filter_map(|step| {
        let id = step.get("id")?.as_str()?;
        Some((
            id.to_string(),
            ContextValue::object([
                ("outputs".to_string(), ContextValue::open_object([])),
                ("outcome".to_string(), ContextValue::Dynamic),
                ("conclusion".to_string(), ContextValue::Dynamic),
            ]),
        ))
    }))
}

fn needs(workflow: &Workflow, job: &Value) -> ContextValue {
    let ids: Vec<&str> = match job.get("needs") {
        Some(Value::String(id)) => vec![id.as_str()],
        Some(Value::Sequence(ids)) => ids.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    ContextValue::object(ids.into_iter().map(|id| {
        let needed = workflow.get("jobs").and_then(|jobs| jobs.get(id));
        let outputs = match needed {
            Some(needed) => ContextValue::object(
                mapping_keys(needed.get("outputs"))
                    .into_iter()
                    .map(|name| (name, ContextValue::Dynamic)),
            ),
            // Reported by the `needs` value check
            None => ContextValue::open_object([]),
        };
        (
            id.to_string(),
            ContextValue::object([
                ("outputs".to_string(), outputs),
                ("result".to_string(), ContextValue::Dynamic),
            ]),
        )
    }))
}

/// Matrix variables plus the keys introduced by `include` entries.
fn matrix(job: &Value) -> Option<ContextValue> {
    let matrix = job.get("strategy")?.get("matrix")?;
    let Some(mapping) = matrix.as_mapping() else {
        return Some(ContextValue::Dynamic);
    };

    let mut names: Vec<String> = mapping
        .keys()
        .filter_map(Value::as_str)
        .filter(|key| *key != "include" && *key != "exclude")
        .map(str::to_string)
        .collect();
    if let Some(include) = mapping.get("include").and_then(Value::as_sequence) {
        for entry in include {
            for key in mapping_keys(Some(entry)) {
                if !names.contains(&key) {
                    names.push(key);
                }
            }
        }
    }
    Some(dynamic_names(Some(&names)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::Resolution;
    use crate::parser::{build_tree, to_workflow};
    use crate::path::PathSegment;
    use serde_json::json;

    fn provider(text: &str, path: PropertyPath, context: &Context) -> EditContextProvider {
        EditContextProvider::new(&to_workflow(text, &build_tree(text)), &path, context)
    }

    fn resolve(provider: &EditContextProvider, context: &str, path: &[&str]) -> Resolution {
        let path: Vec<_> = path.iter().map(|p| PathSegment::Key(p.to_string())).collect();
        provider
            .contexts
            .get(context)
            .map_or(Resolution::Unknown, |value| value.resolve(&path))
    }

    fn step_path(job: &str, step: usize) -> PropertyPath {
        PropertyPath::root()
            .with_key("jobs")
            .with_key(job)
            .with_key("steps")
            .with_index(step)
            .with_key("run")
    }

    const WORKFLOW: &str = "\
on:
  workflow_dispatch:
    inputs:
      level: {}
env:
  R: ubuntu-latest
  N: 2
  E: ${{ github.sha }}
jobs:
  build:
    outputs:
      version: ${{ steps.v.outputs.version }}
    env:
      JOB: job-level
    strategy:
      matrix:
        os: [a, b]
        include:
          - experimental: true
    steps:
      - id: v
        run: echo
      - run: echo
      - id: later
        run: echo
  test:
    needs: [build]
    steps:
      - run: echo
";

    #[test]
    fn test_env_scopes() {
        let p = provider(WORKFLOW, step_path("build", 1), &Context::default());
        assert_eq!(resolve(&p, "env", &["R"]), Resolution::Known(json!("ubuntu-latest")));
        assert_eq!(resolve(&p, "env", &["N"]), Resolution::Known(json!(2)));
        assert_eq!(resolve(&p, "env", &["JOB"]), Resolution::Known(json!("job-level")));
        assert_eq!(resolve(&p, "env", &["E"]), Resolution::Indeterminate);
        assert_eq!(resolve(&p, "env", &["MISSING"]), Resolution::Unknown);

        let root = provider(WORKFLOW, PropertyPath::root().with_key("name"), &Context::default());
        assert_eq!(resolve(&root, "env", &["JOB"]), Resolution::Unknown);
    }

    #[test]
    fn test_env_block_does_not_see_itself() {
        let workflow_env = PropertyPath::root().with_key("env").with_key("E");
        let p = provider(WORKFLOW, workflow_env, &Context::default());
        assert_eq!(resolve(&p, "env", &["R"]), Resolution::Unknown);

        let job_env = PropertyPath::root()
            .with_key("jobs")
            .with_key("build")
            .with_key("env")
            .with_key("JOB");
        let p = provider(WORKFLOW, job_env, &Context::default());
        assert_eq!(resolve(&p, "env", &["R"]), Resolution::Known(json!("ubuntu-latest")));
        assert_eq!(resolve(&p, "env", &["JOB"]), Resolution::Unknown);
    }

    #[test]
    fn test_steps_only_earlier_ids() {
        let p = provider(WORKFLOW, step_path("build", 1), &Context::default());
        assert_eq!(resolve(&p, "steps", &["v", "outputs", "version"]), Resolution::Indeterminate);
        assert_eq!(resolve(&p, "steps", &["later", "outputs", "x"]), Resolution::Unknown);

        let first = provider(WORKFLOW, step_path("build", 0), &Context::default());
        assert_eq!(resolve(&first, "steps", &["v", "outcome"]), Resolution::Unknown);

        let outputs = PropertyPath::root()
            .with_key("jobs")
            .with_key("build")
            .with_key("outputs")
            .with_key("version");
        let job_level = provider(WORKFLOW, outputs, &Context::default());
        assert_eq!(resolve(&job_level, "steps", &["later", "outcome"]), Resolution::Indeterminate);
    }

    #[test]
    fn test_matrix_and_needs() {
        let p = provider(WORKFLOW, step_path("build", 0), &Context::default());
        assert_eq!(resolve(&p, "matrix", &["os"]), Resolution::Indeterminate);
        assert_eq!(resolve(&p, "matrix", &["experimental"]), Resolution::Indeterminate);
        assert_eq!(resolve(&p, "matrix", &["include"]), Resolution::Unknown);

        let t = provider(WORKFLOW, step_path("test", 0), &Context::default());
        assert_eq!(resolve(&t, "matrix", &["os"]), Resolution::Unknown);
        assert_eq!(resolve(&t, "needs", &["build", "outputs", "version"]), Resolution::Indeterminate);
        assert_eq!(resolve(&t, "needs", &["build", "outputs", "nope"]), Resolution::Unknown);
        assert_eq!(resolve(&t, "needs", &["build", "result"]), Resolution::Indeterminate);
    }

    #[test]
    fn test_secrets_and_github() {
        let dynamic = provider(WORKFLOW, step_path("test", 0), &Context::default());
        assert_eq!(resolve(&dynamic, "secrets", &["ANYTHING"]), Resolution::Indeterminate);
        assert_eq!(resolve(&dynamic, "vars", &["ANYTHING"]), Resolution::Indeterminate);

        let context = Context {
            owner: Some("owner".into()),
            repository: Some("owner/repository".into()),
            secrets: Some(vec!["DEPLOY_KEY".into()]),
            variables: Some(vec![]),
        };
        let known = provider(WORKFLOW, step_path("test", 0), &context);
        assert_eq!(resolve(&known, "secrets", &["deploy_key"]), Resolution::Indeterminate);
        assert_eq!(resolve(&known, "secrets", &["GITHUB_TOKEN"]), Resolution::Indeterminate);
        assert_eq!(resolve(&known, "secrets", &["OTHER"]), Resolution::Unknown);
        assert_eq!(resolve(&known, "vars", &["X"]), Resolution::Unknown);
        assert_eq!(
            resolve(&known, "github", &["repository"]),
            Resolution::Known(json!("owner/repository"))
        );
        assert_eq!(resolve(&known, "github", &["sha"]), Resolution::Indeterminate);
        assert_eq!(resolve(&known, "github", &["test"]), Resolution::Unknown);
    }

    #[test]
    fn test_inputs() {
        let p = provider(WORKFLOW, step_path("test", 0), &Context::default());
        assert_eq!(resolve(&p, "inputs", &["level"]), Resolution::Indeterminate);
        assert_eq!(resolve(&p, "inputs", &["other"]), Resolution::Unknown);
    }
}
