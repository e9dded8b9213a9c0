//! Declarative rule-set configuration
//!
//! A rule-set is a record with a `rules` array. Each entry names the rule
//! class to instantiate, its selector and the getters that feed its
//! properties; file order becomes registration order. Everything is
//! validated while loading, so a bad rule-set never reaches a transform.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Rule, RuleRegistry};
use crate::getter::GetterConfig;
use crate::selector::SelectorError;

/// Errors raised while loading a rule-set
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown rule class: {0}")]
    UnknownRuleClass(String),
    #[error("{owner} is missing required key '{key}'")]
    MissingKey { owner: String, key: String },
    #[error(transparent)]
    InvalidSelector(#[from] SelectorError),
    #[error("{rule} declares unknown context type '{context}'")]
    UnknownContext { rule: String, context: String },
    #[error("Invalid JSON rule-set: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML rule-set: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to read rule-set {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One rule entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule class to instantiate
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Property name to getter, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, GetterConfig>,
    /// Overrides the class's default context types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

impl RuleConfig {
    pub fn new(class: impl Into<String>, selector: impl Into<String>) -> Self {
        RuleConfig {
            class: class.into(),
            selector: Some(selector.into()),
            properties: IndexMap::new(),
            contexts: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, getter: GetterConfig) -> Self {
        self.properties.insert(name.into(), getter);
        self
    }

    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = Some(contexts.into_iter().map(Into::into).collect());
        self
    }
}

/// A rule-set document as written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub rules: Vec<RuleConfig>,
}

impl RuleSetConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a rule-set file; `.yml`/`.yaml` files are YAML, anything else JSON
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }
}

/// A loaded, validated rule-set
///
/// Cheap to clone and safe to share between threads; each transform run
/// still gets its own transformer.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleSet {
    /// Instantiate every entry through `registry`
    pub fn from_config(config: &RuleSetConfig, registry: &RuleRegistry) -> Result<Self, ConfigError> {
        let rules = config
            .rules
            .iter()
            .map(|rule| registry.build(rule))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet { rules })
    }

    /// Parse and instantiate a JSON rule-set with the built-in rule classes
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Self::from_config(&RuleSetConfig::from_json(text)?, &RuleRegistry::builtin())
    }

    /// Parse and instantiate a YAML rule-set with the built-in rule classes
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Self::from_config(&RuleSetConfig::from_yaml(text)?, &RuleRegistry::builtin())
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_config(&RuleSetConfig::from_path(path)?, &RuleRegistry::builtin())
    }

    /// The rule-set shipped with the library
    pub fn default_rules() -> Result<Self, ConfigError> {
        Self::from_json(crate::rules::DEFAULT_RULES)
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn push(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
