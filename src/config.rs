//! Client configuration sent in `initializationOptions`

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::schema::Context;

/// Server settings supplied by the editor.
///
/// ```json
/// { "owner": "octo-org", "repository": "octo-repo", "secrets": ["NPM_TOKEN"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub owner: Option<String>,
    pub repository: Option<String>,
    /// Names of the repository secrets; leave unset when unknown
    pub secrets: Option<Vec<String>>,
    /// Names of the configuration variables; leave unset when unknown
    pub variables: Option<Vec<String>>,
}

impl Config {
    /// Read the options, falling back to the defaults when they are
    /// missing or malformed.
    pub fn from_options(options: Option<Value>) -> Self {
        match options {
            None | Some(Value::Null) => Self::default(),
            Some(options) => serde_json::from_value(options).unwrap_or_else(|err| {
                warn!("Invalid initialization options, using defaults: {}", err);
                Self::default()
            }),
        }
    }

    pub fn context(&self) -> Context {
        Context {
            owner: self.owner.clone(),
            repository: self.repository.clone(),
            secrets: self.secrets.clone(),
            variables: self.variables.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_options() {
        let config = Config::from_options(Some(json!({
            "owner": "octo-org",
            "repository": "octo-repo",
            "secrets": ["NPM_TOKEN"]
        })));
        assert_eq!(config.owner.as_deref(), Some("octo-org"));
        assert_eq!(config.secrets, Some(vec!["NPM_TOKEN".to_string()]));
        assert_eq!(config.variables, None);

        let context = config.context();
        assert_eq!(context.repository.as_deref(), Some("octo-repo"));
    }

    #[test]
    fn test_invalid_options_fall_back() {
        assert_eq!(Config::from_options(None), Config::default());
        assert_eq!(Config::from_options(Some(json!({"secrets": 3}))), Config::default());
        assert_eq!(Config::from_options(Some(json!(null))), Config::default());
    }
}
