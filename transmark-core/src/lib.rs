//! transmark-core: rule-driven HTML to article transformation
//!
//! This library provides:
//! - TreeSitter-based HTML parsing into an XPath-queryable xot tree
//! - Selector matching (tag / class fast paths, CSS and XPath fallback)
//! - Typed getters that pull values out of matched source nodes
//! - A rule abstraction with declarative (JSON/YAML) configuration
//! - The transformer that walks the source tree and applies rules
//! - A small target article model with HTML rendering

pub mod article;
pub mod getter;
pub mod html_builder;
pub mod parallel;
pub mod rule;
pub mod rules;
pub mod selector;
pub mod source;
pub mod transformer;
pub mod warnings;
pub mod xot_tree;
pub mod xpath;

pub use article::{Capability, ElementId, ElementKind, InstantArticle, RenderOptions};
pub use getter::{Getter, GetterConfig, GetterValue};
pub use parallel::{
    convert_file, convert_markup, expand_globs, filter_html_files, transform_files_parallel,
    BatchOptions, Conversion, FileError, FileOutcome, RenderedArticle,
};
pub use rule::{ConfigError, Rule, RuleConfig, RuleRegistry, RuleSet, RuleSetConfig, SelectorRule};
pub use rules::{TextNodeRule, DEFAULT_RULES};
pub use selector::Selector;
pub use source::{ParseError, SourceDocument};
pub use transformer::{TransformError, Transformer};
pub use warnings::TransformerWarning;

/// Name stamped onto every article produced by the transformer
pub const GENERATOR_NAME: &str = "transmark";

/// Version stamped next to [`GENERATOR_NAME`]
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
