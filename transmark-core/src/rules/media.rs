//! Media rules
//!
//! Media blocks belong to the article root. When one turns up inside a
//! paragraph the rule escapes: the block goes in right after the
//! paragraph's top-level block, a fresh paragraph goes in after the media,
//! and that fresh paragraph becomes the context for the following
//! siblings. Empty paragraphs left behind are dropped when rendering.
//!
//! A media element is placed before its required property is read, so a
//! missing URL leaves an empty element behind for validation to report.

use xot::Node;

use crate::article::{Capability, ElementId, ElementKind, InstantArticle};
use crate::getter::GetterValue;
use crate::rule::SelectorRule;
use crate::source::SourceDocument;
use crate::transformer::{TransformError, Transformer};
use crate::warnings::TransformerWarning;
use crate::xot_tree::Snapshot;

/// Place a media element for the current context.
///
/// Returns the media element and the context for following siblings, or
/// `None` (with a warning) when the context has no top-level block to
/// escape from.
fn place(
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    context_kind: ElementKind,
    media: ElementKind,
) -> Result<Option<(ElementId, ElementId)>, TransformError> {
    if context_kind.has_capability(Capability::InstantArticleRoot) {
        return Ok(Some((article.append_element(context, media)?, context)));
    }

    let Some(block) = article.top_level_block(context) else {
        transformer.add_warning(TransformerWarning::InvalidElement {
            element: media.to_string(),
            reason: format!("no top-level block to place it after in {context_kind}"),
        });
        return Ok(None);
    };
    let element = article.insert_after(block, media)?;
    let resumed = article.insert_after(element, context_kind)?;
    Ok(Some((element, resumed)))
}

/// Caption from the `<prefix>.caption` property, if declared and found
fn caption(
    rule: &SelectorRule,
    property: &str,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    media: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<(), TransformError> {
    match rule.property(property, source, node) {
        Some(GetterValue::Node(found)) | Some(GetterValue::Fragment(found)) => {
            let caption = article.append_element(media, ElementKind::Caption)?;
            transformer.transform(article, caption, source, found)?;
        }
        Some(GetterValue::Text(text)) if !text.is_empty() => {
            let caption = article.append_element(media, ElementKind::Caption)?;
            article.append_text(caption, &text)?;
        }
        _ => {}
    }
    Ok(())
}

/// Remaining children (a `<figcaption>` picked up by a caption rule, for
/// instance) without reporting the markup the media rule consumed
fn finish(
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    media: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<(), TransformError> {
    transformer.with_warnings_suppressed(|t| t.transform(article, media, source, node))?;
    Ok(())
}

pub(super) fn image(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let Some((image, next)) = place(transformer, article, context, kind, ElementKind::Image)? else {
        return Ok(context);
    };
    if let Some(url) = rule.require_string("image.url", transformer, kind, source, node) {
        article.append_embed(image, "img", &[("src", &url)])?;
    }
    caption(rule, "image.caption", transformer, article, image, source, node)?;
    finish(transformer, article, image, source, node)?;
    Ok(next)
}

pub(super) fn video(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let Some((video, next)) = place(transformer, article, context, kind, ElementKind::Video)? else {
        return Ok(context);
    };

    if let Some(url) = rule.require_string("video.url", transformer, kind, source, node) {
        let mut attributes = vec![("src".to_string(), url)];
        if let Some(media_type) = rule
            .property_string("video.type", source, node)
            .filter(|media_type| !media_type.is_empty())
        {
            attributes.push(("type".to_string(), media_type));
        }
        let element = Snapshot::Element {
            name: "video".to_string(),
            attributes: Vec::new(),
            children: vec![Snapshot::Element {
                name: "source".to_string(),
                attributes,
                children: Vec::new(),
            }],
        };
        article.import_fragment(video, &[element])?;
    }
    caption(rule, "video.caption", transformer, article, video, source, node)?;
    finish(transformer, article, video, source, node)?;
    Ok(next)
}

/// An embed given either by URL (`interactive.url`) or by raw markup
/// (`interactive.iframe`), sized by `interactive.width`/`interactive.height`
pub(super) fn interactive(
    rule: &SelectorRule,
    transformer: &mut Transformer,
    article: &mut InstantArticle,
    context: ElementId,
    source: &mut SourceDocument,
    node: Node,
) -> Result<ElementId, TransformError> {
    let kind = rule.context_kind(article, context)?;
    let Some((interactive, next)) = place(transformer, article, context, kind, ElementKind::Interactive)? else {
        return Ok(context);
    };

    let mut size = Vec::new();
    for (property, attribute) in [("interactive.width", "width"), ("interactive.height", "height")] {
        if let Some(value) = rule.property_int(property, source, node) {
            size.push((attribute.to_string(), value.to_string()));
        }
    }

    let url = rule
        .property_string("interactive.url", source, node)
        .filter(|url| !url.is_empty());
    let embed = match url {
        Some(url) => {
            let mut attributes = vec![("src".to_string(), url)];
            attributes.extend(size);
            Some(Snapshot::Element {
                name: "iframe".to_string(),
                attributes,
                children: Vec::new(),
            })
        }
        None => markup_embed(rule, source, node, size),
    };
    match embed {
        Some(embed) => article.import_fragment(interactive, &[embed])?,
        None => rule.warn_missing("interactive.url", transformer, kind, source, node),
    }
    caption(rule, "interactive.caption", transformer, article, interactive, source, node)?;
    finish(transformer, article, interactive, source, node)?;
    Ok(next)
}

/// Raw `interactive.iframe` markup wrapped in an `<iframe>` unless it already
/// is one
fn markup_embed(
    rule: &SelectorRule,
    source: &mut SourceDocument,
    node: Node,
    size: Vec<(String, String)>,
) -> Option<Snapshot> {
    let content: Vec<Snapshot> = match rule.property("interactive.iframe", source, node)? {
        GetterValue::Fragment(fragment) => source
            .children(fragment)
            .into_iter()
            .filter_map(|child| source.snapshot(child))
            .collect(),
        GetterValue::Node(found) => {
            let snapshot = source.snapshot(found)?;
            if source.tag_name(found) == Some("iframe") {
                return Some(snapshot);
            }
            vec![snapshot]
        }
        GetterValue::Markup(markup) | GetterValue::Text(markup) if !markup.trim().is_empty() => {
            let fragment = source.parse_fragment(&markup).ok()?;
            source
                .children(fragment)
                .into_iter()
                .filter_map(|child| source.snapshot(child))
                .collect()
        }
        _ => return None,
    };
    if content.is_empty() {
        return None;
    }
    Some(Snapshot::Element {
        name: "iframe".to_string(),
        attributes: size,
        children: content,
    })
}
