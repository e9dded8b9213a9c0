//! Built-in rule classes
//!
//! Each class is either a configured class (default context types plus an
//! apply function over a [`SelectorRule`](crate::rule::SelectorRule)) or,
//! for text nodes, a dedicated [`Rule`](crate::rule::Rule) implementation.

mod block;
mod header;
mod media;
mod text;

pub use text::TextNodeRule;

use crate::rule::RuleRegistry;

/// Rule-set used when no configuration is given
pub const DEFAULT_RULES: &str = include_str!("default_rules.json");

const ELEMENT: &[&str] = &["Element"];
const ARTICLE: &[&str] = &["InstantArticle"];
const TEXT_CONTAINER: &[&str] = &["TextContainer"];
const HEADER: &[&str] = &["Header"];
const ARTICLE_OR_HEADER: &[&str] = &["InstantArticle", "Header"];
const ARTICLE_OR_FOOTER: &[&str] = &["InstantArticle", "Footer"];
const ARTICLE_OR_PARAGRAPH: &[&str] = &["InstantArticle", "Paragraph"];
const MEDIA: &[&str] = &["Image", "Video", "Interactive"];

/// Register every built-in class
pub fn register_builtin(registry: &mut RuleRegistry) {
    registry.register("TextNodeRule", TextNodeRule::from_config);
    registry.register_configured("PassThroughRule", ELEMENT, text::pass_through);
    registry.register_configured("IgnoreRule", ELEMENT, text::ignore);

    registry.register_configured("ParagraphRule", ARTICLE_OR_FOOTER, block::paragraph);
    registry.register_configured("H1Rule", ARTICLE_OR_HEADER, block::h1);
    registry.register_configured("H2Rule", ARTICLE_OR_HEADER, block::h2);
    registry.register_configured("BlockquoteRule", ARTICLE, block::blockquote);
    registry.register_configured("PullquoteRule", ARTICLE, block::pullquote);
    registry.register_configured("CiteRule", &["Pullquote"], block::cite);
    registry.register_configured("ListElementRule", ARTICLE, block::list);
    registry.register_configured("ListItemRule", &["ListElement"], block::list_item);
    registry.register_configured("FooterRule", ARTICLE, block::footer);
    registry.register_configured("CaptionRule", MEDIA, block::caption);

    registry.register_configured("BoldRule", TEXT_CONTAINER, text::bold);
    registry.register_configured("ItalicRule", TEXT_CONTAINER, text::italic);
    registry.register_configured("AnchorRule", TEXT_CONTAINER, text::anchor);
    registry.register_configured("LineBreakRule", TEXT_CONTAINER, text::line_break);

    registry.register_configured("ImageRule", ARTICLE_OR_PARAGRAPH, media::image);
    registry.register_configured("VideoRule", ARTICLE_OR_PARAGRAPH, media::video);
    registry.register_configured("InteractiveRule", ARTICLE_OR_PARAGRAPH, media::interactive);

    registry.register_configured("InstantArticleRule", ARTICLE, header::instant_article);
    registry.register_configured("HeaderRule", ARTICLE, header::header);
    registry.register_configured("HeaderTitleRule", HEADER, header::title);
    registry.register_configured("HeaderSubTitleRule", HEADER, header::subtitle);
    registry.register_configured("AuthorRule", HEADER, header::author);
    registry.register_configured("TimeRule", HEADER, header::time);
    registry.register_configured("HeaderImageRule", HEADER, header::image);
}
