//! Text, inline and structural rules

use std::sync::Arc;

use xot::Node;

use super::block::nest;
use crate::article::{ElementId, ElementKind, InstantArticle};
use crate::rule::{ConfigError, Rule, RuleConfig, SelectorRule};
use crate::source::SourceDocument;
use crate::transformer::{TransformError, Transformer};

/// Copies text nodes into the current text container
#[derive(Debug, Clone)]
pub struct TextNodeRule {
    contexts: Vec<String>,
}

impl Default for TextNodeRule {
    fn default() -> Self {
        TextNodeRule {
            contexts: vec!["TextContainer".to_string()],
        }
    }
}

impl TextNodeRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only `contexts` is read from the entry; a selector is ignored
    pub fn from_config(config: &RuleConfig) -> Result<Arc<dyn Rule>, ConfigError> {
        let mut rule = TextNodeRule::new();
        if let Some(contexts) = &config.contexts {
            if let Some(unknown) = contexts
                .iter()
                .find(|name| !crate::article::is_known_type_name(name))
            {
                return Err(ConfigError::UnknownContext {
                    rule: config.class.clone(),
                    context: unknown.clone(),
                });
            }
            rule.contexts = contexts.clone();
        }
        Ok(Arc::new(rule))
    }
}

impl Rule for TextNodeRule {
    fn name(&self) -> &str {
        "TextNodeRule"
    }

    fn context_types(&self) -> &[String] {
        &self.contexts
    }

    fn matches_node(&self, source: &mut SourceDocument, node: Node) -> bool {
        source.is_text(node)
    }

    fn apply(
        &self,
        _transformer: &mut Transformer,
        article: &mut InstantArticle,
        context: ElementId,
        source: &mut SourceDocument,
        node: Node,
    ) -> Result<ElementId, TransformError> {
        if let Some(text) = source.xot().text_str(node) {
            let text = text.to_string();
            article.append_text(context, &text)?;
        }
        Ok(context)
    }
}

/// Transform the node's children into the current context as if the node
/// weren't there
pub(super) fn pass_through(
    _rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    transformer.transform(article, context, source, node)
}

/// Drop the node and everything below it
pub(super) fn ignore(
    _rule: &SelectorRule,
    _transformer: &mut Transformer,
    _article: &mut InstantArticle,
    context: ElementId,
    _source: &mut SourceDocument,
    _node: Node,
) -> Result<ElementId, TransformError> {
    Ok(context)
}

pub(super) fn bold(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    nest(rule, ElementKind::Bold, transformer, article, context, source, node)
}

pub(super) fn italic(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    nest(rule, ElementKind::Italic, transformer, article, context, source, node)
}

/// A link; without a usable `anchor.href` its content stays in place as
/// plain text
pub(super) fn anchor(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let Some(href) = rule.require_string("anchor.href", transformer, kind, source, node) else {
        transformer.transform(article, context, source, node)?;
        return Ok(context);
    };

    let anchor = article.append_element(context, ElementKind::Anchor)?;
    article.set_attribute(anchor, "href", &href);
    if let Some(rel) = rule.property_string("anchor.rel", source, node).filter(|rel| !rel.is_empty()) {
        article.set_attribute(anchor, "rel", &rel);
    }
    transformer.transform(article, anchor, source, node)?;
    Ok(context)
}

pub(super) fn line_break(
    rule: &SelectorRule,
    _transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    _source: &mut SourceDocument,
    _node: Node,
) -> Result<ElementId, TransformError> {
    rule.context_kind(article, context)?;
    article.append_element(context, ElementKind::LineBreak)?;
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getter::GetterConfig;
    use crate::rule::{RuleRegistry, RuleSet, RuleSetConfig};

    fn transformer(rules: Vec<RuleConfig>) -> Transformer {
        let rule_set = RuleSet::from_config(&RuleSetConfig { rules }, &RuleRegistry::builtin()).unwrap();
        Transformer::with_rule_set(&rule_set)
    }

    fn text_rule() -> RuleConfig {
        RuleConfig {
            class: "TextNodeRule".into(),
            selector: None,
            properties: Default::default(),
            contexts: None,
        }
    }

    fn attribute(name: &str) -> GetterConfig {
        GetterConfig::String {
            selector: None,
            attribute: Some(name.into()),
            prefix: None,
            suffix: None,
        }
    }

    #[test]
    fn test_inline_nesting_keeps_whitespace() {
        let mut t = transformer(vec![
            text_rule(),
            RuleConfig::new("ParagraphRule", "p"),
            RuleConfig::new("BoldRule", "b, strong"),
            RuleConfig::new("ItalicRule", "em"),
            RuleConfig::new("LineBreakRule", "br"),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        t.transform_markup_str(&mut article, root, "<p>One <strong>two <em>three</em></strong><br>four</p>")
            .unwrap();
        assert!(t.warnings().is_empty(), "{:?}", t.warnings());
        assert_eq!(article.render_body(), "<p>One <b>two <i>three</i></b><br>four</p>");
    }

    #[test]
    fn test_anchor_without_href_keeps_text() {
        let mut t = transformer(vec![
            text_rule(),
            RuleConfig::new("ParagraphRule", "p"),
            RuleConfig::new("AnchorRule", "a")
                .with_property("anchor.href", attribute("href"))
                .with_property("anchor.rel", attribute("rel")),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        t.transform_markup_str(
            &mut article,
            root,
            r#"<p><a href="/x" rel="nofollow">linked</a> <a>bare</a></p>"#,
        )
        .unwrap();
        assert_eq!(
            article.render_body(),
            r#"<p><a href="/x" rel="nofollow">linked</a> bare</p>"#
        );
        assert_eq!(t.warnings().len(), 1);
        assert_eq!(t.warnings()[0].kind(), "missing_property");
    }

    #[test]
    fn test_text_rule_context_override() {
        let config = text_rule().with_contexts(["Paragraph"]);
        let rule = TextNodeRule::from_config(&config).unwrap();
        assert_eq!(rule.context_types(), &["Paragraph".to_string()]);

        let bad = text_rule().with_contexts(["Margin"]);
        assert!(TextNodeRule::from_config(&bad).is_err());
    }

    #[test]
    fn test_ignore_drops_subtree() {
        let mut t = transformer(vec![
            text_rule(),
            RuleConfig::new("ParagraphRule", "p"),
            RuleConfig::new("IgnoreRule", "script"),
            RuleConfig::new("PassThroughRule", "div"),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        t.transform_markup_str(&mut article, root, "<div><script>x()</script><p>kept</p></div>")
            .unwrap();
        assert!(t.warnings().is_empty());
        assert_eq!(article.render_body(), "<p>kept</p>");
    }
}
