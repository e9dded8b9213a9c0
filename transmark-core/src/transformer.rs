//! The transformer: walks a source tree and applies rules
//!
//! Rules are indexed by the context-type names they declare. For a given
//! context kind the candidates are the union of the buckets of every name
//! the kind answers to (its own name plus its capabilities), tried from the
//! most recently registered down. The first rule whose selector matches a
//! child is applied, and whatever context it returns is used for that
//! child's following siblings.
//!
//! Each source node is applied at most once per run: the first match marks
//! it processed in the source document, and every visit (nested ones
//! included) skips processed nodes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};
use xot::Node;

use crate::article::{Capability, ElementId, ElementKind, InstantArticle};
use crate::rule::{ConfigError, Rule, RuleSet};
use crate::source::{ParseError, SourceDocument};
use crate::warnings::TransformerWarning;
use crate::{GENERATOR_NAME, GENERATOR_VERSION};

/// Fatal transformation errors
///
/// These indicate a rule-set that doesn't fit the target model (a rule
/// applied where it can't build anything), not problems with the input.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("{rule} cannot be applied in {actual} (expected {expected})")]
    InvalidContext {
        rule: String,
        expected: String,
        actual: ElementKind,
    },
    #[error("{parent} cannot contain {child}")]
    InvalidChild { parent: ElementKind, child: ElementKind },
    #[error("{0} cannot contain text")]
    NotTextContainer(ElementKind),
    #[error("{0} cannot hold embedded markup")]
    NoEmbeds(ElementKind),
    #[error("element does not belong to this article")]
    UnknownElement,
    #[error("Failed to update tree: {0}")]
    Tree(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Rule index plus per-run state
#[derive(Debug, Default)]
pub struct Transformer {
    rules: Vec<Arc<dyn Rule>>,
    /// Context-type name to insertion positions
    index: HashMap<String, BTreeSet<usize>>,
    /// Candidate positions per context kind, latest first
    candidates: HashMap<ElementKind, Arc<[usize]>>,
    warnings: Vec<TransformerWarning>,
    suppress_warnings: bool,
    suppress_depth: usize,
    root: Option<ElementId>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transformer loaded with every rule of `rule_set`
    pub fn with_rule_set(rule_set: &RuleSet) -> Self {
        let mut transformer = Self::new();
        transformer.load_rule_set(rule_set);
        transformer
    }

    /// Register a rule after all existing ones, so it takes precedence over
    /// them wherever both match
    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        let position = self.rules.len();
        for name in rule.context_types() {
            let inserted = self.index.entry(name.clone()).or_default().insert(position);
            debug_assert!(inserted, "rule position {position} registered twice under {name}");
        }
        self.rules.push(rule);
        self.candidates.clear();
    }

    /// Replace all rules
    pub fn set_rules(&mut self, rules: impl IntoIterator<Item = Arc<dyn Rule>>) {
        self.reset_rules();
        for rule in rules {
            self.add_rule(rule);
        }
    }

    pub fn reset_rules(&mut self) {
        self.rules.clear();
        self.index.clear();
        self.candidates.clear();
    }

    /// Rules in registration order
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Append every rule of a loaded rule-set
    pub fn load_rule_set(&mut self, rule_set: &RuleSet) {
        for rule in rule_set.rules() {
            self.add_rule(Arc::clone(rule));
        }
    }

    /// Load a JSON rule-set, appending its rules in file order
    pub fn load_rules(&mut self, configuration: &str) -> Result<(), ConfigError> {
        let rule_set = RuleSet::from_json(configuration)?;
        self.load_rule_set(&rule_set);
        Ok(())
    }

    /// Load a YAML rule-set, appending its rules in file order
    pub fn load_rules_yaml(&mut self, configuration: &str) -> Result<(), ConfigError> {
        let rule_set = RuleSet::from_yaml(configuration)?;
        self.load_rule_set(&rule_set);
        Ok(())
    }

    /// Candidate rule positions for a context kind, latest registered first
    fn candidates_for(&mut self, kind: ElementKind) -> Arc<[usize]> {
        if let Some(candidates) = self.candidates.get(&kind) {
            return Arc::clone(candidates);
        }
        let mut positions = BTreeSet::new();
        for name in kind.type_names() {
            if let Some(bucket) = self.index.get(*name) {
                positions.extend(bucket.iter().copied());
            }
        }
        let candidates: Arc<[usize]> = positions.into_iter().rev().collect();
        self.candidates.insert(kind, Arc::clone(&candidates));
        candidates
    }

    /// Remember the article root and stamp the generator on it.
    ///
    /// A transformer may be reused across articles, so the root is replaced
    /// on every root context and each article is stamped once.
    fn note_root(&mut self, article: &mut InstantArticle, context: ElementId, kind: ElementKind) {
        if kind.has_capability(Capability::InstantArticleRoot) {
            self.root = Some(context);
            if article.generator().is_none() {
                article.set_generator(GENERATOR_NAME, GENERATOR_VERSION);
            }
        }
    }

    /// Transform the children of `node` into `context`.
    ///
    /// Returns the context in effect after the last child, which differs
    /// from `context` when a rule swapped it.
    pub fn transform(
        &mut self,
        article: &mut InstantArticle,
        context: ElementId,
        source: &mut SourceDocument,
        node: Node,
    ) -> Result<ElementId, TransformError> {
        let context_kind = article.kind(context).ok_or(TransformError::UnknownElement)?;
        self.note_root(article, context, context_kind);
        let mut current = context;

        for child in source.children(node) {
            if source.is_processed(child) {
                continue;
            }

            let kind = article.kind(current).ok_or(TransformError::UnknownElement)?;

            let mut matched = false;
            for &position in self.candidates_for(kind).iter() {
                let Some(rule) = self.rules.get(position).map(Arc::clone) else {
                    continue;
                };
                trace!(rule = rule.name(), position, "testing rule");
                if !rule.matches_node(source, child) {
                    continue;
                }

                source.mark_processed(child);
                debug!(
                    rule = rule.name(),
                    context = %kind,
                    node = %source.describe(child),
                    "applying rule"
                );
                current = rule.apply(self, article, current, source, child)?;
                matched = true;
                break;
            }

            if !matched && !source.is_ignorable(child) && !self.is_suppressing_warnings() {
                self.warnings.push(TransformerWarning::UnrecognizedNode {
                    context: kind.to_string(),
                    node: source.describe(child),
                });
            }
        }

        Ok(current)
    }

    /// Parse `markup` (decoded with `encoding`, UTF-8 when `None`) and
    /// transform its top-level nodes into `context`
    pub fn transform_from_markup(
        &mut self,
        article: &mut InstantArticle,
        context: ElementId,
        markup: &[u8],
        encoding: Option<&str>,
    ) -> Result<ElementId, TransformError> {
        let mut source = SourceDocument::parse_bytes(markup, encoding)?;
        let root = source.root();
        self.transform(article, context, &mut source, root)
    }

    /// [`transform_from_markup`](Self::transform_from_markup) for UTF-8 text
    pub fn transform_markup_str(
        &mut self,
        article: &mut InstantArticle,
        context: ElementId,
        markup: &str,
    ) -> Result<ElementId, TransformError> {
        let mut source = SourceDocument::parse(markup)?;
        let root = source.root();
        self.transform(article, context, &mut source, root)
    }

    /// Diagnostics collected so far, in order
    pub fn warnings(&self) -> &[TransformerWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<TransformerWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn add_warning(&mut self, warning: TransformerWarning) {
        self.warnings.push(warning);
    }

    /// Set the base suppression flag for unrecognized-node warnings
    pub fn set_suppress_warnings(&mut self, suppress: bool) {
        self.suppress_warnings = suppress;
    }

    pub fn is_suppressing_warnings(&self) -> bool {
        self.suppress_warnings || self.suppress_depth > 0
    }

    /// Run `f` with unrecognized-node warnings suppressed.
    ///
    /// Suppression nests: it is lifted only when the outermost call returns.
    pub fn with_warnings_suppressed<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.suppress_depth += 1;
        let result = f(self);
        self.suppress_depth -= 1;
        result
    }

    /// The article root, once a root context has been seen
    pub fn instant_article(&self) -> Option<ElementId> {
        self.root
    }
}
