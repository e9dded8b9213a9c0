//! Rule classes by name
//!
//! Configuration refers to rule implementations by their `class` string.
//! The registry maps those names either to a configured class (default
//! contexts plus an apply function, see [`ConfiguredRule`]) or to a factory
//! for rules that implement [`Rule`] themselves.

use std::collections::HashMap;
use std::sync::Arc;

use super::selector_rule::SelectorRule;
use super::{ApplyFn, ConfigError, ConfiguredRule, Rule, RuleConfig};

/// Builds a rule from its configuration entry
pub type RuleFactory = fn(&RuleConfig) -> Result<Arc<dyn Rule>, ConfigError>;

#[derive(Clone, Copy)]
enum RuleClass {
    Configured {
        contexts: &'static [&'static str],
        apply: ApplyFn,
    },
    Factory(RuleFactory),
}

#[derive(Clone, Default)]
pub struct RuleRegistry {
    classes: HashMap<String, RuleClass>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.class_names()).finish()
    }
}

impl RuleRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in rule class
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::rules::register_builtin(&mut registry);
        registry
    }

    /// Register a class backed by a [`SelectorRule`] and an apply function
    pub fn register_configured(
        &mut self,
        class: &str,
        contexts: &'static [&'static str],
        apply: ApplyFn,
    ) {
        self.classes
            .insert(class.to_string(), RuleClass::Configured { contexts, apply });
    }

    /// Register a class with its own [`Rule`] implementation
    pub fn register(&mut self, class: &str, factory: RuleFactory) {
        self.classes.insert(class.to_string(), RuleClass::Factory(factory));
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Default context types of a configured class
    pub fn default_contexts(&self, class: &str) -> Option<&'static [&'static str]> {
        match self.classes.get(class)? {
            RuleClass::Configured { contexts, .. } => Some(*contexts),
            RuleClass::Factory(_) => None,
        }
    }

    /// Instantiate one configuration entry
    pub fn build(&self, config: &RuleConfig) -> Result<Arc<dyn Rule>, ConfigError> {
        match self.classes.get(&config.class) {
            Some(RuleClass::Configured { contexts, apply }) => {
                let rule = SelectorRule::from_config(config, contexts)?;
                Ok(Arc::new(ConfiguredRule::new(rule, *apply)))
            }
            Some(RuleClass::Factory(factory)) => factory(config),
            None => Err(ConfigError::UnknownRuleClass(config.class.clone())),
        }
    }
}
