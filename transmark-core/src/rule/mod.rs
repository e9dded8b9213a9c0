//! Rules: the unit of transformation
//!
//! A rule declares the context types it may run under, decides whether it
//! matches a source node, and when applied builds target elements and
//! returns the context that following siblings should use.
//!
//! Most rules are data: a [`SelectorRule`] (selector plus named getters)
//! paired with a plain apply function, registered by class name in a
//! [`RuleRegistry`]. Anything more unusual can implement [`Rule`] directly.

mod config;
mod registry;
mod selector_rule;

pub use config::{ConfigError, RuleConfig, RuleSet, RuleSetConfig};
pub use registry::{RuleFactory, RuleRegistry};
pub use selector_rule::SelectorRule;

use std::fmt;

use xot::Node;

use crate::article::{ElementId, ElementKind, InstantArticle};
use crate::source::SourceDocument;
use crate::transformer::{TransformError, Transformer};

/// A transformation rule
///
/// Rules are immutable once built and carry no per-run state, so a single
/// rule-set can be shared by any number of transformers.
pub trait Rule: fmt::Debug + Send + Sync {
    /// Class name, used in diagnostics
    fn name(&self) -> &str;

    /// Kind and capability names this rule applies under
    fn context_types(&self) -> &[String];

    fn matches_context(&self, kind: ElementKind) -> bool {
        self.context_types().iter().any(|name| kind.is_a(name))
    }

    fn matches_node(&self, source: &mut SourceDocument, node: Node) -> bool;

    /// Apply to a matched node, returning the context for the node's
    /// following siblings
    fn apply(
        &self,
        transformer: &mut Transformer,
        article: &mut InstantArticle,
        context: ElementId,
        source: &mut SourceDocument,
        node: Node,
    ) -> Result<ElementId, TransformError>;
}

/// Behavior of a configured rule class
pub type ApplyFn = fn(
    &SelectorRule,
    &mut Transformer,
    &mut InstantArticle,
    ElementId,
    &mut SourceDocument,
    Node,
) -> Result<ElementId, TransformError>;

/// A [`SelectorRule`] plus the function that applies it
pub struct ConfiguredRule {
    rule: SelectorRule,
    apply: ApplyFn,
}

impl ConfiguredRule {
    pub fn new(rule: SelectorRule, apply: ApplyFn) -> Self {
        ConfiguredRule { rule, apply }
    }

    pub fn selector_rule(&self) -> &SelectorRule {
        &self.rule
    }
}

impl fmt::Debug for ConfiguredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfiguredRule").field(&self.rule).finish()
    }
}

impl Rule for ConfiguredRule {
    fn name(&self) -> &str {
        self.rule.class_name()
    }

    fn context_types(&self) -> &[String] {
        self.rule.contexts()
    }

    fn matches_node(&self, source: &mut SourceDocument, node: Node) -> bool {
        self.rule.matches_node(source, node)
    }

    fn apply(
        &self,
        transformer: &mut Transformer,
        article: &mut InstantArticle,
        context: ElementId,
        source: &mut SourceDocument,
        node: Node,
    ) -> Result<ElementId, TransformError> {
        (self.apply)(&self.rule, transformer, article, context, source, node)
    }
}
