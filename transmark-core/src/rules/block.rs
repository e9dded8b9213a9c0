//! Block and container rules

use xot::Node;

use crate::article::{ElementId, ElementKind, InstantArticle};
use crate::rule::SelectorRule;
use crate::source::SourceDocument;
use crate::transformer::{TransformError, Transformer};

/// Append a `kind` element to the context and transform the node's
/// children into it. The context is unchanged for following siblings.
pub(super) fn nest(
    rule: &SelectorRule,
    kind: ElementKind,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    rule.context_kind(article, context)?;
    let element = article.append_element(context, kind)?;
    transformer.transform(article, element, source, node)?;
    Ok(context)
}

macro_rules! nesting_rule {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub(super) fn $name(
                rule: &SelectorRule,
                transformer: &mut Transformer,
                article: &mut InstantArticle,
                context: ElementId,
                source: &mut SourceDocument,
                node: Node,
            ) -> Result<ElementId, TransformError> {
                nest(rule, ElementKind::$kind, transformer, article, context, source, node)
            }
        )*
    };
}

nesting_rule! {
    paragraph => Paragraph,
    h1 => H1,
    h2 => H2,
    blockquote => Blockquote,
    pullquote => Pullquote,
    cite => Cite,
    list_item => ListItem,
    footer => Footer,
    caption => Caption,
}

/// `<ol>` sources become ordered lists
pub(super) fn list(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    rule.context_kind(article, context)?;
    let list = article.append_element(context, ElementKind::ListElement)?;
    if source.tag_name(node) == Some("ol") {
        article.set_ordered(list, true)?;
    }
    transformer.transform(article, list, source, node)?;
    Ok(context)
}

#[cfg(test)]
mod tests {
    use crate::article::InstantArticle;
    use crate::rule::{RuleConfig, RuleRegistry, RuleSet, RuleSetConfig};
    use crate::transformer::{TransformError, Transformer};

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

    #[test]
    fn test_lists() {
        let mut t = transformer(vec![
            text_rule(),
            RuleConfig::new("PassThroughRule", "div"),
            RuleConfig::new("ListElementRule", "ul, ol"),
            RuleConfig::new("ListItemRule", "li"),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        t.transform_markup_str(
            &mut article,
            root,
            "<div>\n<ol>\n  <li>one</li>\n  <li>two</li>\n</ol>\n<ul><li>three</li></ul>\n</div>",
        )
        .unwrap();
        assert!(t.warnings().is_empty(), "{:?}", t.warnings());
        assert_eq!(
            article.render_body(),
            "<ol><li>one</li><li>two</li></ol><ul><li>three</li></ul>"
        );
    }

    #[test]
    fn test_pullquote_with_cite() {
        let mut t = transformer(vec![
            text_rule(),
            RuleConfig::new("PullquoteRule", "aside"),
            RuleConfig::new("CiteRule", "cite"),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        t.transform_markup_str(&mut article, root, "<aside>Words<cite>Someone</cite></aside>")
            .unwrap();
        assert_eq!(article.render_body(), "<aside>Words<cite>Someone</cite></aside>");
    }

    #[test]
    fn test_paragraphs_inside_footer() {
        let mut t = transformer(vec![
            text_rule(),
            RuleConfig::new("FooterRule", "footer"),
            RuleConfig::new("ParagraphRule", "p"),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        t.transform_markup_str(&mut article, root, "<footer><p>Credits</p></footer>")
            .unwrap();
        assert_eq!(article.render_body(), "<footer><p>Credits</p></footer>");
        assert!(article.footer().is_some());
    }

    #[test]
    fn test_context_override_outside_containment_fails() {
        // Paragraphs can't hold headings, so forcing the context is fatal
        let mut t = transformer(vec![
            RuleConfig::new("ParagraphRule", "p"),
            RuleConfig::new("H1Rule", "span").with_contexts(["Paragraph"]),
        ]);
        let mut article = InstantArticle::new();
        let root = article.root();
        let result = t.transform_markup_str(&mut article, root, "<p><span>x</span></p>");
        assert!(matches!(result, Err(TransformError::InvalidChild { .. })));
    }
}
