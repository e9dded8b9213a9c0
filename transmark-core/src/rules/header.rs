//! Article-level and header rules

use xot::Node;

use crate::article::{ElementId, ElementKind, InstantArticle};
use crate::getter::GetterValue;
use crate::rule::SelectorRule;
use crate::source::SourceDocument;
use crate::transformer::{TransformError, Transformer};

const DEFAULT_TIME_TYPE: &str = "published";

/// Reads the article metadata, then carries on with the node's children in
/// the same context
pub(super) fn instant_article(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    if let Some(canonical) = rule.require_string("article.canonical", transformer, kind, source, node) {
        article.set_canonical_url(canonical);
    }
    if let Some(charset) = non_empty(rule.property_string("article.charset", source, node)) {
        article.set_charset(charset);
    }
    if let Some(id) = non_empty(rule.property_string("article.markup.id", source, node)) {
        article.set_markup_id(id);
    }
    transformer.transform(article, context, source, node)
}

/// The article has one header; later header markup is merged into it
pub(super) fn header(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    rule.context_kind(article, context)?;
    let header = match article.header() {
        Some(header) => header,
        None => article.append_element(context, ElementKind::Header)?,
    };
    transformer.transform(article, header, source, node)?;
    Ok(context)
}

/// Heading from `property`, or from the node's own children when the
/// property isn't declared or finds nothing
fn heading(
    rule: &SelectorRule,
    property: &str,
    kind: ElementKind,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    rule.context_kind(article, context)?;
    let heading = article.append_element(context, kind)?;
    match rule.property(property, source, node) {
        Some(GetterValue::Text(text)) if !text.is_empty() => article.append_text(heading, &text)?,
        Some(GetterValue::Node(found)) | Some(GetterValue::Fragment(found)) => {
            transformer.transform(article, heading, source, found)?;
        }
        _ => {
            transformer.transform(article, heading, source, node)?;
        }
    }
    Ok(context)
}

pub(super) fn title(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    heading(rule, "h1.title", ElementKind::H1, transformer, article, context, source, node)
}

pub(super) fn subtitle(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    heading(rule, "h2.title", ElementKind::H2, transformer, article, context, source, node)
}

/// `<address>` with the author's name, linked when `author.url` is known,
/// followed by `author.description`
pub(super) fn author(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let author = article.append_element(context, ElementKind::Author)?;
    if let Some(name) = rule.require_string("author.name", transformer, kind, source, node) {
        match non_empty(rule.property_string("author.url", source, node)) {
            Some(url) => {
                let link = article.append_element(author, ElementKind::Anchor)?;
                article.set_attribute(link, "href", &url);
                article.append_text(link, &name)?;
            }
            None => article.append_text(author, &name)?,
        }
    }
    if let Some(description) = non_empty(rule.property_string("author.description", source, node)) {
        article.append_text(author, &description)?;
    }
    Ok(context)
}

/// `<time class="op-published" datetime="...">` from `article.time`.
/// `article.time_type` picks another class (`modified`, ...).
pub(super) fn time(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let time_type = non_empty(rule.property_string("article.time_type", source, node))
        .unwrap_or_else(|| DEFAULT_TIME_TYPE.to_string());

    let time = article.append_element(context, ElementKind::Time)?;
    article.set_attribute(time, "class", &format!("op-{time_type}"));
    if let Some(date) = rule.require_date("article.time", transformer, kind, source, node) {
        article.set_attribute(time, "datetime", &date.to_rfc3339());
        article.set_text(time, &date.format("%B %-d, %Y").to_string())?;
    }
    Ok(context)
}

/// Cover image of the header
pub(super) fn image(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let image = article.append_element(context, ElementKind::Image)?;
    if let Some(url) = rule.require_string("image.url", transformer, kind, source, node) {
        article.append_embed(image, "img", &[("src", &url)])?;
    }
    if let Some(caption) = rule.property_node("image.caption", source, node) {
        let element = article.append_element(image, ElementKind::Caption)?;
        transformer.transform(article, element, source, caption)?;
    }
    Ok(context)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
