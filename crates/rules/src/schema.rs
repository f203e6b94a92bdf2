//! YAML schema for metric rule files.
//!
//! ```yaml
//! apiVersion: v1
//! kind: MetricRule
//! metadata:
//!   id: api-latency
//!   name: API latency
//!   enabled: true
//! spec:
//!   pattern: "timer.mean_90.api.*"
//! ```

use serde::{Deserialize, Serialize};

use vigil_core::Rule;

use crate::loader::{Result, RuleError};

/// The only `apiVersion` this crate understands.
pub const API_VERSION: &str = "v1";

/// The only `kind` this crate understands.
pub const KIND: &str = "MetricRule";

/// A rule file: header fields plus the pattern to watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRule {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: RuleMetadata,
    pub spec: MetricRuleSpec,
}

/// Identity and lifecycle fields of a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleMetadata {
    /// Stable rule id. Also the file stem used by [`RuleLoader::write_document`].
    ///
    /// [`RuleLoader::write_document`]: crate::RuleLoader::write_document
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Disabled rules are kept on disk and in the loader but never published.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricRuleSpec {
    /// Dotted glob, e.g. `timer.*.api.login`.
    pub pattern: String,
}

fn default_true() -> bool {
    true
}

impl MetricRule {
    /// Build an enabled `v1` rule.
    pub fn new(id: impl Into<String>, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: RuleMetadata {
                id: id.into(),
                name: name.into(),
                description: None,
                tags: None,
                enabled: true,
            },
            spec: MetricRuleSpec {
                pattern: pattern.into(),
            },
        }
    }

    /// Parse YAML text and validate the result.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let doc: MetricRule = serde_yaml::from_str(contents)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn is_enabled(&self) -> bool {
        self.metadata.enabled
    }

    /// Check the header and the id. The pattern is checked by [`compile`](Self::compile).
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(RuleError::Validation(format!(
                "unsupported apiVersion '{}', expected '{}'",
                self.api_version, API_VERSION
            )));
        }
        if self.kind != KIND {
            return Err(RuleError::Validation(format!(
                "unknown rule kind: '{}'",
                self.kind
            )));
        }

        let id = self.metadata.id.as_str();
        if id.is_empty() {
            return Err(RuleError::Validation(
                "rule metadata.id must not be empty".to_string(),
            ));
        }
        if id.starts_with('.') || id.contains(['/', '\\', ':']) {
            return Err(RuleError::Validation(format!(
                "rule id '{}' must not start with '.' or contain ':' or path separators",
                id
            )));
        }
        Ok(())
    }

    /// Validate and turn the document into a filter [`Rule`] keyed by `metadata.id`.
    pub fn compile(&self) -> Result<Rule> {
        self.validate()?;
        Rule::with_id(self.metadata.id.as_str(), &self.spec.pattern).map_err(|e| {
            RuleError::Validation(format!("rule '{}': {}", self.metadata.id, e))
        })
    }
}
