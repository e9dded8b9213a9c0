//! Typed value extraction from source nodes
//!
//! A getter is built once from its configuration record and then asked for
//! values node by node. `get` never fails: a missing element, a missing
//! attribute or a value that doesn't coerce all come back as `None`, and the
//! rule using the getter decides whether that deserves a warning.
//!
//! Getters that hand whole elements to a rule (`children`, `element`,
//! `sibling`) mark the element they matched as processed, so the traversal
//! won't also visit it on its own.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use xot::Node;

use crate::rule::ConfigError;
use crate::selector::Selector;
use crate::source::SourceDocument;
use crate::xot_tree::Snapshot;
use crate::xpath::QueryItem;

/// Declarative getter configuration, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GetterConfig {
    String {
        selector: Option<String>,
        attribute: Option<String>,
        prefix: Option<String>,
        suffix: Option<String>,
    },
    Int {
        selector: Option<String>,
        attribute: Option<String>,
    },
    Date {
        selector: Option<String>,
        attribute: Option<String>,
        /// chrono `strftime` format; RFC 3339 and a few common shapes when absent
        format: Option<String>,
    },
    Exists {
        selector: Option<String>,
        attribute: Option<String>,
    },
    Children {
        selector: Option<String>,
    },
    Element {
        selector: Option<String>,
    },
    Sibling {
        selector: Option<String>,
    },
    Fragment {
        fragment: Option<String>,
    },
    Unescaped {
        selector: Option<String>,
        attribute: Option<String>,
    },
    Outerunescaped {
        selector: Option<String>,
    },
    Json {
        selector: Option<String>,
        attribute: Option<String>,
    },
    Xpath {
        selector: Option<String>,
        attribute: Option<String>,
    },
    Multiple {
        children: Option<Vec<GetterConfig>>,
    },
}

impl GetterConfig {
    /// The `type` tag as written in configuration
    pub fn type_name(&self) -> &'static str {
        match self {
            GetterConfig::String { .. } => "string",
            GetterConfig::Int { .. } => "int",
            GetterConfig::Date { .. } => "date",
            GetterConfig::Exists { .. } => "exists",
            GetterConfig::Children { .. } => "children",
            GetterConfig::Element { .. } => "element",
            GetterConfig::Sibling { .. } => "sibling",
            GetterConfig::Fragment { .. } => "fragment",
            GetterConfig::Unescaped { .. } => "unescaped",
            GetterConfig::Outerunescaped { .. } => "outerunescaped",
            GetterConfig::Json { .. } => "json",
            GetterConfig::Xpath { .. } => "xpath",
            GetterConfig::Multiple { .. } => "multiple",
        }
    }
}

/// A value produced by a getter
#[derive(Debug, Clone, PartialEq)]
pub enum GetterValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Date(DateTime<FixedOffset>),
    /// An element of the source document
    Node(Node),
    /// A detached `fragment` element whose children are the result
    Fragment(Node),
    Json(serde_json::Value),
    /// Serialized markup, embedded verbatim
    Markup(String),
}

impl GetterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            GetterValue::Text(text) | GetterValue::Markup(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<Node> {
        match self {
            GetterValue::Node(node) | GetterValue::Fragment(node) => Some(*node),
            _ => None,
        }
    }
}

/// Where a getter reads from: the matched node (or its first selector
/// match), and either its text or one of its attributes
#[derive(Debug, Clone)]
pub struct Target {
    selector: Option<Selector>,
    attribute: Option<String>,
}

impl Target {
    fn new(selector: &Option<String>, attribute: &Option<String>) -> Result<Self, ConfigError> {
        Ok(Target {
            selector: compile_selector(selector)?,
            attribute: attribute.clone(),
        })
    }

    fn locate(&self, source: &mut SourceDocument, node: Node) -> Option<Node> {
        locate(&self.selector, source, node)
    }

    fn read(&self, source: &mut SourceDocument, node: Node) -> Option<String> {
        let element = self.locate(source, node)?;
        match &self.attribute {
            Some(attribute) => source.attribute(element, attribute),
            None => Some(source.text_content(element)),
        }
    }
}

fn compile_selector(selector: &Option<String>) -> Result<Option<Selector>, ConfigError> {
    selector
        .as_deref()
        .map(Selector::parse)
        .transpose()
        .map_err(ConfigError::from)
}

fn locate(selector: &Option<Selector>, source: &mut SourceDocument, node: Node) -> Option<Node> {
    match selector {
        Some(selector) => selector.find_first(source, node),
        None => Some(node),
    }
}

/// A compiled getter
#[derive(Debug, Clone)]
pub enum Getter {
    String {
        target: Target,
        prefix: Option<String>,
        suffix: Option<String>,
    },
    Int(Target),
    Date {
        target: Target,
        format: Option<String>,
    },
    Exists(Target),
    Children(Option<Selector>),
    Element(Option<Selector>),
    Sibling(Option<Selector>),
    Fragment(String),
    Unescaped(Target),
    OuterUnescaped(Option<Selector>),
    Json(Target),
    XPath {
        xpath: String,
        attribute: Option<String>,
    },
    Multiple(Vec<Getter>),
}

impl Getter {
    /// Validate a configuration record and compile its selectors
    pub fn from_config(config: &GetterConfig) -> Result<Self, ConfigError> {
        Ok(match config {
            GetterConfig::String { selector, attribute, prefix, suffix } => Getter::String {
                target: Target::new(selector, attribute)?,
                prefix: prefix.clone(),
                suffix: suffix.clone(),
            },
            GetterConfig::Int { selector, attribute } => Getter::Int(Target::new(selector, attribute)?),
            GetterConfig::Date { selector, attribute, format } => Getter::Date {
                target: Target::new(selector, attribute)?,
                format: format.clone(),
            },
            GetterConfig::Exists { selector, attribute } => {
                Getter::Exists(Target::new(selector, attribute)?)
            }
            GetterConfig::Children { selector } => Getter::Children(compile_selector(selector)?),
            GetterConfig::Element { selector } => Getter::Element(compile_selector(selector)?),
            GetterConfig::Sibling { selector } => Getter::Sibling(compile_selector(selector)?),
            GetterConfig::Fragment { fragment } => {
                let fragment = fragment.clone().ok_or_else(|| missing("fragment", "fragment"))?;
                Getter::Fragment(fragment)
            }
            GetterConfig::Unescaped { selector, attribute } => {
                Getter::Unescaped(Target::new(selector, attribute)?)
            }
            GetterConfig::Outerunescaped { selector } => {
                Getter::OuterUnescaped(compile_selector(selector)?)
            }
            GetterConfig::Json { selector, attribute } => Getter::Json(Target::new(selector, attribute)?),
            GetterConfig::Xpath { selector, attribute } => {
                let xpath = selector.clone().ok_or_else(|| missing("xpath", "selector"))?;
                crate::xpath::compile_check(&xpath).map_err(|e| {
                    ConfigError::from(crate::selector::SelectorError::XPath {
                        selector: xpath.clone(),
                        reason: e.to_string(),
                    })
                })?;
                Getter::XPath {
                    xpath,
                    attribute: attribute.clone(),
                }
            }
            GetterConfig::Multiple { children } => {
                let children = children.as_ref().ok_or_else(|| missing("multiple", "children"))?;
                Getter::Multiple(
                    children
                        .iter()
                        .map(Getter::from_config)
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
        })
    }

    /// Extract a value from `node`
    pub fn get(&self, source: &mut SourceDocument, node: Node) -> Option<GetterValue> {
        match self {
            Getter::String { target, prefix, suffix } => {
                let text = target.read(source, node)?;
                let text = text.trim();
                Some(GetterValue::Text(format!(
                    "{}{}{}",
                    prefix.as_deref().unwrap_or(""),
                    text,
                    suffix.as_deref().unwrap_or("")
                )))
            }
            Getter::Int(target) => {
                let text = target.read(source, node)?;
                text.trim().parse::<i64>().ok().map(GetterValue::Int)
            }
            Getter::Date { target, format } => {
                let text = target.read(source, node)?;
                parse_date(text.trim(), format.as_deref()).map(GetterValue::Date)
            }
            Getter::Exists(target) => {
                let found = match target.locate(source, node) {
                    Some(element) => match &target.attribute {
                        Some(attribute) => source.has_attribute(element, attribute),
                        None => true,
                    },
                    None => false,
                };
                Some(GetterValue::Bool(found))
            }
            Getter::Children(selector) => {
                let element = locate(selector, source, node)?;
                let fragment = source
                    .clone_children(element)
                    .map_err(|e| tracing::debug!(error = %e, "cloning children failed"))
                    .ok()?;
                source.mark_processed(element);
                Some(GetterValue::Fragment(fragment))
            }
            Getter::Element(selector) => {
                let element = locate(selector, source, node)?;
                if !source.is_element(element) {
                    return None;
                }
                source.mark_processed(element);
                Some(GetterValue::Node(element))
            }
            Getter::Sibling(selector) => {
                let element = locate(selector, source, node)?;
                let sibling = source.next_element_sibling(element)?;
                source.mark_processed(sibling);
                Some(GetterValue::Node(sibling))
            }
            Getter::Fragment(markup) => parse_markup(source, markup),
            Getter::Unescaped(target) => {
                let markup = target.read(source, node)?;
                parse_markup(source, &markup)
            }
            Getter::OuterUnescaped(selector) => {
                let element = locate(selector, source, node)?;
                Some(GetterValue::Markup(source.outer_markup(element)))
            }
            Getter::Json(target) => {
                let text = target.read(source, node)?;
                serde_json::from_str(text.trim()).ok().map(GetterValue::Json)
            }
            Getter::XPath { xpath, attribute } => {
                let items = source
                    .query(xpath, node)
                    .map_err(|e| tracing::debug!(xpath = %xpath, error = %e, "xpath getter failed"))
                    .ok()?;
                match items.into_iter().next()? {
                    QueryItem::Node(found) => match attribute {
                        Some(attribute) => source.attribute(found, attribute).map(GetterValue::Text),
                        None => Some(GetterValue::Text(source.text_content(found))),
                    },
                    QueryItem::Atomic(value) => Some(GetterValue::Text(value)),
                }
            }
            Getter::Multiple(children) => {
                let mut snapshots = Vec::new();
                for child in children {
                    match child.get(source, node) {
                        Some(GetterValue::Node(found)) => snapshots.extend(source.snapshot(found)),
                        Some(GetterValue::Fragment(fragment)) => {
                            for part in source.children(fragment) {
                                snapshots.extend(source.snapshot(part));
                            }
                        }
                        Some(GetterValue::Text(text)) => snapshots.push(Snapshot::Text(text)),
                        _ => {}
                    }
                }
                if snapshots.is_empty() {
                    return None;
                }
                source
                    .new_fragment(&snapshots)
                    .map_err(|e| tracing::debug!(error = %e, "building fragment failed"))
                    .ok()
                    .map(GetterValue::Fragment)
            }
        }
    }
}

fn missing(getter: &str, key: &str) -> ConfigError {
    ConfigError::MissingKey {
        owner: format!("{getter} getter"),
        key: key.to_string(),
    }
}

fn parse_markup(source: &mut SourceDocument, markup: &str) -> Option<GetterValue> {
    source
        .parse_fragment(markup)
        .map_err(|e| tracing::debug!(error = %e, "parsing markup fragment failed"))
        .ok()
        .map(GetterValue::Fragment)
}

/// Parse a date-time, treating values without an offset as UTC
fn parse_date(text: &str, format: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let utc = FixedOffset::east_opt(0)?;
    let naive_to_fixed = |naive: NaiveDateTime| naive.and_local_timezone(utc).single();

    if let Some(format) = format {
        return DateTime::parse_from_str(text, format)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(text, format).ok().and_then(naive_to_fixed))
            .or_else(|| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .and_then(naive_to_fixed)
            });
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(text).ok())
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .and_then(naive_to_fixed)
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .and_then(naive_to_fixed)
        })
}
