//! Allowed values computed from the document

use serde_yaml::Value;
use tower_lsp::async_trait;

use super::{CustomValueProvider, NodeDesc, ProviderError, ValueDesc};
use crate::parser::Workflow;
use crate::path::PropertyPath;

/// Job ids a job may depend on: every job of the workflow except the one
/// at `path` (`jobs.<id>.needs`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NeedsProvider;

#[async_trait]
impl CustomValueProvider for NeedsProvider {
    async fn values(
        &self,
        _desc: &NodeDesc,
        workflow: &Workflow,
        path: &PropertyPath,
    ) -> Result<Vec<ValueDesc>, ProviderError> {
        let current = path.key(1);
        let jobs = match workflow.get("jobs") {
            Some(Value::Mapping(jobs)) => jobs,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(ProviderError::MissingValue(PropertyPath::root().with_key("jobs"))),
        };

        Ok(jobs
            .iter()
            .filter_map(|(id, job)| {
                let id = id.as_str()?;
                if Some(id) == current {
                    return None;
                }
                Some(match job.get("name").and_then(Value::as_str) {
                    Some(name) => ValueDesc::described(id, name),
                    None => ValueDesc::new(id),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{build_tree, to_workflow};
    use assert_matches::assert_matches;

    async fn needs(text: &str, job: &str) -> Result<Vec<ValueDesc>, ProviderError> {
        let workflow = to_workflow(text, &build_tree(text));
        let path = PropertyPath::root().with_key("jobs").with_key(job).with_key("needs");
        NeedsProvider.values(&NodeDesc::value(), &workflow, &path).await
    }

    #[tokio::test]
    async fn test_lists_other_jobs() {
        let values = needs(
            "jobs:\n  build:\n    name: Build it\n  lint: {}\n  test:\n    needs: build\n",
            "test",
        )
        .await
        .unwrap();
        assert_eq!(
            values,
            vec![ValueDesc::described("build", "Build it"), ValueDesc::new("lint")]
        );
    }

    #[tokio::test]
    async fn test_no_jobs() {
        assert_eq!(needs("on: push\n", "test").await.unwrap(), vec![]);
        assert_matches!(
            needs("jobs: nope\n", "test").await,
            Err(ProviderError::MissingValue(_))
        );
    }
}
