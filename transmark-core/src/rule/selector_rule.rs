//! Selector plus named getters: the configurable part of a rule

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use xot::Node;

use super::{ConfigError, RuleConfig};
use crate::article::{self, ElementId, ElementKind, InstantArticle};
use crate::getter::{Getter, GetterValue};
use crate::selector::Selector;
use crate::source::SourceDocument;
use crate::transformer::{TransformError, Transformer};
use crate::warnings::TransformerWarning;

#[derive(Debug, Clone)]
pub struct SelectorRule {
    class: String,
    selector: Selector,
    properties: IndexMap<String, Getter>,
    contexts: Vec<String>,
}

impl SelectorRule {
    pub fn new<S: Into<String>>(
        class: impl Into<String>,
        selector: Selector,
        contexts: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for context in contexts {
            let context = context.into();
            if !unique.contains(&context) {
                unique.push(context);
            }
        }
        SelectorRule {
            class: class.into(),
            selector,
            properties: IndexMap::new(),
            contexts: unique,
        }
    }

    /// Build from a configuration entry. `default_contexts` apply unless the
    /// entry lists its own.
    pub fn from_config(config: &RuleConfig, default_contexts: &[&str]) -> Result<Self, ConfigError> {
        let selector = config.selector.as_deref().ok_or_else(|| ConfigError::MissingKey {
            owner: config.class.clone(),
            key: "selector".to_string(),
        })?;
        let selector = Selector::parse(selector)?;

        let contexts = resolve_contexts(config, default_contexts)?;
        let mut rule = SelectorRule::new(config.class.clone(), selector, contexts);
        for (name, getter) in &config.properties {
            rule.properties.insert(name.clone(), Getter::from_config(getter)?);
        }
        Ok(rule)
    }

    pub fn with_property(mut self, name: impl Into<String>, getter: Getter) -> Self {
        self.properties.insert(name.into(), getter);
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn matches_context(&self, kind: ElementKind) -> bool {
        self.contexts.iter().any(|name| kind.is_a(name))
    }

    pub fn matches_node(&self, source: &mut SourceDocument, node: Node) -> bool {
        self.selector.matches(source, node)
    }

    /// Kind of `context`, failing the run if this rule can't apply there
    pub fn context_kind(&self, article: &InstantArticle, context: ElementId) -> Result<ElementKind, TransformError> {
        let kind = article.kind(context).ok_or(TransformError::UnknownElement)?;
        if self.matches_context(kind) {
            Ok(kind)
        } else {
            Err(TransformError::InvalidContext {
                rule: self.class.clone(),
                expected: self.contexts.join(", "),
                actual: kind,
            })
        }
    }

    /// Raw getter result for a declared property
    pub fn property(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<GetterValue> {
        self.properties.get(name)?.get(source, node)
    }

    pub fn property_string(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<String> {
        match self.property(name, source, node)? {
            GetterValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn property_int(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<i64> {
        match self.property(name, source, node)? {
            GetterValue::Int(value) => Some(value),
            _ => None,
        }
    }

    /// False when absent or not a boolean
    pub fn property_bool(&self, name: &str, source: &mut SourceDocument, node: Node) -> bool {
        matches!(self.property(name, source, node), Some(GetterValue::Bool(true)))
    }

    pub fn property_date(
        &self,
        name: &str,
        source: &mut SourceDocument,
        node: Node,
    ) -> Option<DateTime<FixedOffset>> {
        match self.property(name, source, node)? {
            GetterValue::Date(date) => Some(date),
            _ => None,
        }
    }

    /// A source node or fragment
    pub fn property_node(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<Node> {
        match self.property(name, source, node)? {
            GetterValue::Node(found) | GetterValue::Fragment(found) => Some(found),
            _ => None,
        }
    }

    /// A source element (not a fragment)
    pub fn property_element(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<Node> {
        match self.property(name, source, node)? {
            GetterValue::Node(found) if source.is_element(found) => Some(found),
            _ => None,
        }
    }

    pub fn property_fragment(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<Node> {
        match self.property(name, source, node)? {
            GetterValue::Fragment(fragment) => Some(fragment),
            _ => None,
        }
    }

    pub fn property_json(
        &self,
        name: &str,
        source: &mut SourceDocument,
        node: Node,
    ) -> Option<serde_json::Value> {
        match self.property(name, source, node)? {
            GetterValue::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The nodes a property yields: a fragment's children, or a single node
    pub fn property_array(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<Vec<Node>> {
        match self.property(name, source, node)? {
            GetterValue::Fragment(fragment) => Some(source.children(fragment)),
            GetterValue::Node(found) => Some(vec![found]),
            _ => None,
        }
    }

    /// Markup to embed verbatim
    pub fn property_markup(&self, name: &str, source: &mut SourceDocument, node: Node) -> Option<String> {
        match self.property(name, source, node)? {
            GetterValue::Markup(markup) | GetterValue::Text(markup) => Some(markup),
            GetterValue::Fragment(fragment) => Some(source.inner_markup(fragment)),
            GetterValue::Node(found) => Some(source.outer_markup(found)),
            _ => None,
        }
    }

    /// Record that a required property came back empty
    pub fn warn_missing(
        &self,
        name: &str,
        transformer: &mut Transformer,
        context: ElementKind,
        source: &SourceDocument,
        node: Node,
    ) {
        transformer.add_warning(TransformerWarning::MissingProperty {
            property: name.to_string(),
            rule: self.class.clone(),
            context: context.to_string(),
            node: source.describe(node),
        });
    }

    /// `property_string`, warning when it yields nothing
    pub fn require_string(
        &self,
        name: &str,
        transformer: &mut Transformer,
        context: ElementKind,
        source: &mut SourceDocument,
        node: Node,
    ) -> Option<String> {
        let value = self.property_string(name, source, node).filter(|text| !text.is_empty());
        if value.is_none() {
            self.warn_missing(name, transformer, context, source, node);
        }
        value
    }

    /// `property_date`, warning when it yields nothing
    pub fn require_date(
        &self,
        name: &str,
        transformer: &mut Transformer,
        context: ElementKind,
        source: &mut SourceDocument,
        node: Node,
    ) -> Option<DateTime<FixedOffset>> {
        let value = self.property_date(name, source, node);
        if value.is_none() {
            self.warn_missing(name, transformer, context, source, node);
        }
        value
    }

    /// `property_node`, warning when it yields nothing
    pub fn require_node(
        &self,
        name: &str,
        transformer: &mut Transformer,
        context: ElementKind,
        source: &mut SourceDocument,
        node: Node,
    ) -> Option<Node> {
        let value = self.property_node(name, source, node);
        if value.is_none() {
            self.warn_missing(name, transformer, context, source, node);
        }
        value
    }
}

fn resolve_contexts(config: &RuleConfig, default_contexts: &[&str]) -> Result<Vec<String>, ConfigError> {
    let contexts: Vec<String> = match &config.contexts {
        Some(contexts) => contexts.clone(),
        None => default_contexts.iter().map(|name| name.to_string()).collect(),
    };
    if let Some(unknown) = contexts.iter().find(|name| !article::is_known_type_name(name)) {
        return Err(ConfigError::UnknownContext {
            rule: config.class.clone(),
            context: unknown.clone(),
        });
    }
    Ok(contexts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getter::GetterConfig;

    fn image_rule() -> SelectorRule {
        let config = RuleConfig::new("ImageRule", "figure")
            .with_property(
                "image.url",
                GetterConfig::String {
                    selector: Some("img".into()),
                    attribute: Some("src".into()),
                    prefix: None,
                    suffix: None,
                },
            )
            .with_property(
                "image.caption",
                GetterConfig::Element { selector: Some("figcaption".into()) },
            )
            .with_property(
                "image.fullscreen",
                GetterConfig::Exists { selector: None, attribute: Some("data-fullscreen".into()) },
            );
        SelectorRule::from_config(&config, &["InstantArticle", "Paragraph"]).unwrap()
    }

    #[test]
    fn test_context_matching_uses_capabilities() {
        let config = RuleConfig::new("BoldRule", "b");
        let rule = SelectorRule::from_config(&config, &["TextContainer"]).unwrap();
        assert!(rule.matches_context(ElementKind::Paragraph));
        assert!(rule.matches_context(ElementKind::Caption));
        assert!(!rule.matches_context(ElementKind::InstantArticle));
    }

    #[test]
    fn test_typed_accessors() {
        let mut source = SourceDocument::parse(
            r#"<figure data-fullscreen><img src="cat.jpg"><figcaption>Cat</figcaption></figure>"#,
        )
        .unwrap();
        let figure = source.xot().document_element(source.root()).unwrap();
        let rule = image_rule();

        assert!(rule.matches_node(&mut source, figure));
        assert_eq!(rule.property_string("image.url", &mut source, figure).as_deref(), Some("cat.jpg"));
        assert!(rule.property_bool("image.fullscreen", &mut source, figure));
        // wrong runtime type
        assert_eq!(rule.property_int("image.url", &mut source, figure), None);
        assert_eq!(rule.property_string("image.caption", &mut source, figure), None);
        // undeclared
        assert_eq!(rule.property("image.credit", &mut source, figure), None);

        let caption = rule.property_element("image.caption", &mut source, figure).unwrap();
        assert_eq!(source.tag_name(caption), Some("figcaption"));
        assert_eq!(
            rule.property_markup("image.caption", &mut source, figure).as_deref(),
            Some("<figcaption>Cat</figcaption>")
        );
    }

    #[test]
    fn test_json_and_array_accessors() {
        let mut source = SourceDocument::parse(
            r#"<div data-params='{"autoplay": true}'><h3>Title</h3><p>Body</p></div>"#,
        )
        .unwrap();
        let div = source.xot().document_element(source.root()).unwrap();
        let config = RuleConfig::new("InteractiveRule", "div")
            .with_property(
                "interactive.params",
                GetterConfig::Json { selector: None, attribute: Some("data-params".into()) },
            )
            .with_property(
                "interactive.parts",
                GetterConfig::Multiple {
                    children: Some(vec![
                        GetterConfig::Element { selector: Some("h3".into()) },
                        GetterConfig::Element { selector: Some("p".into()) },
                    ]),
                },
            );
        let rule = SelectorRule::from_config(&config, &["InstantArticle"]).unwrap();

        assert_eq!(
            rule.property_json("interactive.params", &mut source, div),
            Some(serde_json::json!({"autoplay": true}))
        );
        let parts = rule.property_array("interactive.parts", &mut source, div).unwrap();
        let tags: Vec<&str> = parts.iter().filter_map(|&part| source.tag_name(part)).collect();
        assert_eq!(tags, ["h3", "p"]);
        assert_eq!(rule.property_json("interactive.parts", &mut source, div), None);
    }

    #[test]
    fn test_config_errors() {
        let missing_selector = RuleConfig {
            class: "ParagraphRule".into(),
            selector: None,
            properties: IndexMap::new(),
            contexts: None,
        };
        assert!(matches!(
            SelectorRule::from_config(&missing_selector, &["InstantArticle"]),
            Err(ConfigError::MissingKey { .. })
        ));

        let bad_context = RuleConfig::new("ParagraphRule", "p").with_contexts(["Sidebar"]);
        assert!(matches!(
            SelectorRule::from_config(&bad_context, &["InstantArticle"]),
            Err(ConfigError::UnknownContext { .. })
        ));
    }

    #[test]
    fn test_context_kind_rejects_foreign_context() {
        let mut article = InstantArticle::new();
        let root = article.root();
        let header = article.append_element(root, ElementKind::Header).unwrap();
        let rule = image_rule();
        assert!(rule.context_kind(&article, root).is_ok());
        assert!(matches!(
            rule.context_kind(&article, header),
            Err(TransformError::InvalidContext { .. })
        ));
    }
}
