//! Selector matching against source nodes
//!
//! Most rule-sets match on a bare tag name or a single class, so those shapes
//! are recognized up front and answered by inspecting the node directly.
//! Everything else is compiled to XPath (CSS selectors are converted first)
//! and answered by evaluating the expression over the node's tree and looking
//! for the node among the results. The fast paths exist only for speed: for
//! any selector they accept they give the same answer as the XPath path.

mod css;

pub use css::to_xpath as css_to_xpath;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use xot::{Node, Xot};

use crate::source::SourceDocument;
use crate::xot_tree;
use crate::xpath;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]*$").unwrap());
static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.(-?[_a-zA-Z][_a-zA-Z0-9-]*)$").unwrap());
static TAG_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z][a-zA-Z0-9-]*)\.(-?[_a-zA-Z][_a-zA-Z0-9-]*)$").unwrap()
});

/// Errors raised while compiling a selector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("invalid CSS selector '{selector}': {reason}")]
    Css { selector: String, reason: String },
    #[error("invalid XPath selector '{selector}': {reason}")]
    XPath { selector: String, reason: String },
}

/// Shapes answered without evaluating XPath
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastPath {
    Tag(String),
    Class(String),
    TagClass { tag: String, class: String },
}

impl FastPath {
    fn classify(text: &str) -> Option<Self> {
        if TAG_RE.is_match(text) {
            return Some(FastPath::Tag(text.to_ascii_lowercase()));
        }
        if let Some(caps) = CLASS_RE.captures(text) {
            return Some(FastPath::Class(caps[1].to_string()));
        }
        if let Some(caps) = TAG_CLASS_RE.captures(text) {
            return Some(FastPath::TagClass {
                tag: caps[1].to_ascii_lowercase(),
                class: caps[2].to_string(),
            });
        }
        None
    }

    fn matches(&self, xot: &Xot, node: Node) -> bool {
        match self {
            FastPath::Tag(tag) => xot_tree::element_name(xot, node) == Some(tag.as_str()),
            FastPath::Class(class) => has_class(xot, node, class),
            FastPath::TagClass { tag, class } => {
                xot_tree::element_name(xot, node) == Some(tag.as_str()) && has_class(xot, node, class)
            }
        }
    }
}

fn has_class(xot: &Xot, node: Node, class: &str) -> bool {
    xot_tree::attribute(xot, node, "class")
        .map_or(false, |value| xot_tree::attribute_tokens(&value).any(|c| c == class))
}

/// A compiled selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    text: String,
    fast: Option<FastPath>,
    xpath: String,
}

impl Selector {
    /// Compile a selector.
    ///
    /// Text starting with `/` or `(` is taken as XPath; anything else is a
    /// CSS selector. Either way the resulting expression is compiled once
    /// here so that broken selectors surface while a rule-set loads.
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SelectorError::Empty);
        }

        let is_xpath = text.starts_with('/') || text.starts_with('(');
        let xpath = if is_xpath {
            text.to_string()
        } else {
            css::to_xpath(text).map_err(|reason| SelectorError::Css {
                selector: text.to_string(),
                reason,
            })?
        };

        xpath::compile_check(&xpath).map_err(|e| SelectorError::XPath {
            selector: text.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Selector {
            text: text.to_string(),
            fast: if is_xpath { None } else { FastPath::classify(text) },
            xpath,
        })
    }

    /// The selector as written in configuration
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The XPath expression used by the generic path
    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    pub fn fast_path(&self) -> Option<&FastPath> {
        self.fast.as_ref()
    }

    /// Whether `node` itself matches
    pub fn matches(&self, source: &mut SourceDocument, node: Node) -> bool {
        match &self.fast {
            Some(fast) => fast.matches(source.xot(), node),
            None => self.matches_generic(source, node),
        }
    }

    /// Answer `matches` by evaluating the XPath expression over the node's
    /// whole tree and testing identity against the results
    pub fn matches_generic(&self, source: &mut SourceDocument, node: Node) -> bool {
        if source.xot().element(node).is_none() {
            return false;
        }
        let root = xot_tree::tree_root(source.xot(), node);
        match source.query_nodes(&self.xpath, root) {
            Ok(nodes) => nodes.contains(&node),
            Err(e) => {
                tracing::debug!(selector = %self.text, error = %e, "selector evaluation failed");
                false
            }
        }
    }

    /// First match at or below `node`, in document order
    pub fn find_first(&self, source: &mut SourceDocument, node: Node) -> Option<Node> {
        match &self.fast {
            Some(fast) => {
                let xot = source.xot();
                xot_tree::self_and_descendants(xot, node).find(|&n| fast.matches(xot, n))
            }
            None => match source.query_nodes(&self.xpath, node) {
                Ok(nodes) => nodes.into_iter().next(),
                Err(e) => {
                    tracing::debug!(selector = %self.text, error = %e, "selector evaluation failed");
                    None
                }
            },
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}
