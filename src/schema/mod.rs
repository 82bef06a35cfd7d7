//! Schema descriptions for workflow documents
//!
//! A schema is a tree of [`NodeDesc`]s built once and shared read-only by
//! every validation pass. Each description says which shape is expected at
//! one position of the document and, for scalars, which values are allowed.
//! Values that depend on the document itself (job names for `needs`) come
//! from a [`CustomValueProvider`] attached to the description.

mod context_provider;
mod providers;
mod workflows;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tower_lsp::async_trait;
use tracing::warn;

use crate::parser::{Kind, SyntaxNode, Workflow};
use crate::path::PropertyPath;

pub use context_provider::{Context, EditContextProvider, EditContextProviderFactory};
pub use providers::NeedsProvider;
pub use workflows::{workflow_schema, RUNNER_LABELS};

/// One allowed value with its hover text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDesc {
    pub value: String,
    pub description: Option<String>,
}

impl ValueDesc {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    pub fn described(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: Some(description.into()),
        }
    }
}

/// Failure inside a [`CustomValueProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no value at {0}")]
    MissingValue(PropertyPath),
}

/// Supplies allowed values computed from the document being validated.
#[async_trait]
pub trait CustomValueProvider: Send + Sync {
    async fn values(
        &self,
        desc: &NodeDesc,
        workflow: &Workflow,
        path: &PropertyPath,
    ) -> Result<Vec<ValueDesc>, ProviderError>;
}

/// Expected shape at one document position.
#[derive(Debug)]
pub enum DescKind {
    Value {
        allowed_values: Vec<ValueDesc>,
        /// The whole scalar is an expression even without `${{ }}`
        implicit_expression: bool,
    },
    Sequence {
        item_desc: Arc<NodeDesc>,
    },
    Map {
        keys: IndexMap<String, Arc<NodeDesc>>,
        /// Description for keys not listed in `keys`; `None` rejects them
        additional: Option<Arc<NodeDesc>>,
        required: Vec<String>,
    },
    /// The first alternative whose shape matches the node applies
    OneOf(Vec<Arc<NodeDesc>>),
}

pub struct NodeDesc {
    pub kind: DescKind,
    pub description: Option<String>,
    pub custom_value_provider: Option<Arc<dyn CustomValueProvider>>,
}

impl fmt::Debug for NodeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDesc")
            .field("kind", &self.kind_name())
            .field("description", &self.description)
            .field("custom_value_provider", &self.custom_value_provider.is_some())
            .finish()
    }
}

impl NodeDesc {
    fn with_kind(kind: DescKind) -> Self {
        Self {
            kind,
            description: None,
            custom_value_provider: None,
        }
    }

    /// Any scalar.
    pub fn value() -> Self {
        Self::with_kind(DescKind::Value {
            allowed_values: Vec::new(),
            implicit_expression: false,
        })
    }

    /// A scalar restricted to `values`.
    pub fn allowed(values: impl IntoIterator<Item = ValueDesc>) -> Self {
        Self::with_kind(DescKind::Value {
            allowed_values: values.into_iter().collect(),
            implicit_expression: false,
        })
    }

    /// A scalar evaluated as an expression, `${{ }}` optional.
    pub fn expression() -> Self {
        Self::with_kind(DescKind::Value {
            allowed_values: Vec::new(),
            implicit_expression: true,
        })
    }

    pub fn sequence(item_desc: NodeDesc) -> Self {
        Self::with_kind(DescKind::Sequence {
            item_desc: Arc::new(item_desc),
        })
    }

    /// A mapping with a fixed set of keys.
    pub fn map<K: Into<String>>(keys: impl IntoIterator<Item = (K, NodeDesc)>) -> Self {
        Self::with_kind(DescKind::Map {
            keys: keys
                .into_iter()
                .map(|(key, desc)| (key.into(), Arc::new(desc)))
                .collect(),
            additional: None,
            required: Vec::new(),
        })
    }

    /// A mapping with arbitrary keys, each described by `value_desc`.
    pub fn open_map(value_desc: NodeDesc) -> Self {
        Self::with_kind(DescKind::Map {
            keys: IndexMap::new(),
            additional: Some(Arc::new(value_desc)),
            required: Vec::new(),
        })
    }

    pub fn one_of(alternatives: impl IntoIterator<Item = NodeDesc>) -> Self {
        Self::with_kind(DescKind::OneOf(
            alternatives.into_iter().map(Arc::new).collect(),
        ))
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn provider(mut self, provider: impl CustomValueProvider + 'static) -> Self {
        self.custom_value_provider = Some(Arc::new(provider));
        self
    }

    /// Mark keys as required. No effect on non-map descriptions.
    pub fn require(mut self, names: &[&str]) -> Self {
        if let DescKind::Map { required, .. } = &mut self.kind {
            required.extend(names.iter().map(|name| name.to_string()));
        }
        self
    }

    /// Accept keys outside the fixed set, described by `value_desc`.
    pub fn additional(mut self, value_desc: NodeDesc) -> Self {
        if let DescKind::Map { additional, .. } = &mut self.kind {
            *additional = Some(Arc::new(value_desc));
        }
        self
    }

    /// Human readable shape, used in "Expected ..." messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DescKind::Value { .. } => "a scalar value",
            DescKind::Sequence { .. } => "a sequence",
            DescKind::Map { .. } => "a mapping",
            DescKind::OneOf(_) => "one of several shapes",
        }
    }

    /// Whether this description's shape matches `node` exactly.
    pub fn matches_kind(&self, node: &SyntaxNode) -> bool {
        match &self.kind {
            DescKind::Value { .. } => node.kind == Kind::Scalar,
            DescKind::Sequence { .. } => node.kind == Kind::Sequence,
            DescKind::Map { .. } => node.kind == Kind::Map,
            DescKind::OneOf(alternatives) => alternatives.iter().any(|alt| alt.matches_kind(node)),
        }
    }

    /// Description of the value under `key` in a map description.
    pub fn key_desc(&self, key: &str) -> Option<&Arc<NodeDesc>> {
        match &self.kind {
            DescKind::Map {
                keys, additional, ..
            } => keys.get(key).or(additional.as_ref()),
            _ => None,
        }
    }

    /// Static allowed values plus the provider's values for `path`.
    ///
    /// `None` means no restriction applies. A failing provider is logged
    /// and contributes no values.
    pub async fn allowed_values(
        &self,
        workflow: &Workflow,
        path: &PropertyPath,
    ) -> Option<Vec<ValueDesc>> {
        let DescKind::Value { allowed_values, .. } = &self.kind else {
            return None;
        };

        let mut values = allowed_values.clone();
        let mut restricted = !values.is_empty();
        if let Some(provider) = &self.custom_value_provider {
            match provider.values(self, workflow, path).await {
                Ok(dynamic) => {
                    values.extend(dynamic);
                    restricted = true;
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "custom value provider failed");
                }
            }
        }

        restricted.then_some(values)
    }
}
