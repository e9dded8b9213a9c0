//! Article rendering
//!
//! `render` produces the compact HTML document handed to publishing;
//! `render_pretty` walks the same tree with indentation and optional ANSI
//! colors for reading in a terminal. Empty paragraphs are left out of both.

use quick_xml::escape::{escape, partial_escape};
use xot::{Node, Value};

use super::{ElementKind, InstantArticle, MARKUP_VERSION};
use crate::xot_tree::{self, VOID_ELEMENTS};

/// ANSI color codes
pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BLUE: &str = "\x1b[34m"; // element names
    pub const CYAN: &str = "\x1b[36m"; // attribute names
    pub const YELLOW: &str = "\x1b[33m"; // attribute values
}

/// Options for pretty rendering
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Whether to use ANSI colors
    pub use_color: bool,
    /// Indentation string (default: 2 spaces)
    pub indent: String,
    /// Maximum depth to render (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        RenderOptions {
            use_color: false,
            indent: "  ".to_string(),
            max_depth: None,
        }
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }
}

/// `<head>` entries as (tag, attributes)
fn head_entries(article: &InstantArticle) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    let mut entries = Vec::new();
    if let Some(url) = article.canonical_url() {
        entries.push(("link", vec![("rel", "canonical".to_string()), ("href", url.to_string())]));
    }
    entries.push((
        "meta",
        vec![("charset", article.charset().unwrap_or("utf-8").to_string())],
    ));
    if let Some((name, version)) = article.generator() {
        entries.push((
            "meta",
            vec![("property", "op:generator".to_string()), ("content", name.to_string())],
        ));
        entries.push((
            "meta",
            vec![
                ("property", "op:generator:version".to_string()),
                ("content", version.to_string()),
            ],
        ));
    }
    entries.push((
        "meta",
        vec![
            ("property", "op:markup_version".to_string()),
            ("content", MARKUP_VERSION.to_string()),
        ],
    ));
    if let Some(id) = article.markup_id() {
        entries.push((
            "meta",
            vec![("property", "op:markup_id".to_string()), ("content", id.to_string())],
        ));
    }
    entries
}

/// Paragraphs without visible content are never rendered
fn is_skipped(article: &InstantArticle, node: Node) -> bool {
    article.kinds.get(&node) == Some(&ElementKind::Paragraph) && article.is_node_empty(node)
}

pub(super) fn render_body(article: &InstantArticle) -> String {
    let mut output = String::new();
    let skip = |node: Node| is_skipped(article, node);
    for child in article.xot.children(article.root) {
        xot_tree::write_html_filtered(&article.xot, child, &mut output, &skip);
    }
    output
}

pub(super) fn render_document(article: &InstantArticle) -> String {
    let mut output = String::from("<!doctype html><html><head>");
    for (tag, attributes) in head_entries(article) {
        output.push('<');
        output.push_str(tag);
        for (name, value) in &attributes {
            output.push_str(&format!(" {name}=\"{}\"", escape(value.as_str())));
        }
        output.push('>');
    }
    output.push_str("</head><body>");
    let skip = |node: Node| is_skipped(article, node);
    xot_tree::write_html_filtered(&article.xot, article.root, &mut output, &skip);
    output.push_str("</body></html>");
    output
}

pub(super) fn render_pretty(article: &InstantArticle, options: &RenderOptions) -> String {
    let mut output = String::new();
    paint(&mut output, options, ansi::DIM, "<!doctype html>");
    output.push('\n');
    open_line(&mut output, options, 0, "html", &[]);
    open_line(&mut output, options, 1, "head", &[]);
    for (tag, attributes) in head_entries(article) {
        let attributes: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        open_line(&mut output, options, 2, tag, &attributes);
    }
    close_line(&mut output, options, 1, "head");
    open_line(&mut output, options, 1, "body", &[]);
    render_pretty_node(article, article.root, options, 2, &mut output);
    close_line(&mut output, options, 1, "body");
    close_line(&mut output, options, 0, "html");
    output
}

fn paint(output: &mut String, options: &RenderOptions, color: &str, text: &str) {
    if options.use_color {
        output.push_str(color);
        output.push_str(text);
        output.push_str(ansi::RESET);
    } else {
        output.push_str(text);
    }
}

fn open_tag(output: &mut String, options: &RenderOptions, name: &str, attributes: &[(&str, &str)]) {
    paint(output, options, ansi::DIM, "<");
    paint(output, options, ansi::BLUE, name);
    for (attr_name, value) in attributes {
        output.push(' ');
        paint(output, options, ansi::CYAN, attr_name);
        paint(output, options, ansi::DIM, "=\"");
        paint(output, options, ansi::YELLOW, &escape(*value));
        paint(output, options, ansi::DIM, "\"");
    }
    paint(output, options, ansi::DIM, ">");
}

fn close_tag(output: &mut String, options: &RenderOptions, name: &str) {
    paint(output, options, ansi::DIM, "</");
    paint(output, options, ansi::BLUE, name);
    paint(output, options, ansi::DIM, ">");
}

fn open_line(output: &mut String, options: &RenderOptions, depth: usize, name: &str, attributes: &[(&str, &str)]) {
    output.push_str(&options.indent.repeat(depth));
    open_tag(output, options, name, attributes);
    output.push('\n');
}

fn close_line(output: &mut String, options: &RenderOptions, depth: usize, name: &str) {
    output.push_str(&options.indent.repeat(depth));
    close_tag(output, options, name);
    output.push('\n');
}

/// Count all descendant elements (recursive)
fn count_descendants(article: &InstantArticle, node: Node) -> usize {
    article
        .xot
        .children(node)
        .filter(|&child| article.xot.element(child).is_some())
        .map(|child| 1 + count_descendants(article, child))
        .sum()
}

fn render_pretty_node(
    article: &InstantArticle,
    node: Node,
    options: &RenderOptions,
    depth: usize,
    output: &mut String,
) {
    let xot = &article.xot;
    let indent = options.indent.repeat(depth);

    match xot.value(node) {
        Value::Element(element) => {
            if is_skipped(article, node) {
                return;
            }
            let name = xot.local_name_str(element.name());
            let attributes: Vec<(String, String)> = xot
                .attributes(node)
                .iter()
                .map(|(name_id, value)| (xot.local_name_str(name_id).to_string(), value.to_string()))
                .collect();
            let attributes: Vec<(&str, &str)> = attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();

            output.push_str(&indent);
            open_tag(output, options, name, &attributes);
            if VOID_ELEMENTS.contains(&name) {
                output.push('\n');
                return;
            }

            let children: Vec<Node> = xot
                .children(node)
                .filter(|&child| !xot_tree::is_whitespace_text(xot, child) && !is_skipped(article, child))
                .collect();
            let truncate_children = options.max_depth.map_or(false, |max| depth >= max);

            if children.is_empty() {
                close_tag(output, options, name);
            } else if let [only] = children.as_slice() {
                if let Some(text) = xot.text_str(*only) {
                    output.push_str(&partial_escape(text.trim()));
                    close_tag(output, options, name);
                } else {
                    render_children(article, &children, options, depth, output, truncate_children, node);
                    output.push_str(&indent);
                    close_tag(output, options, name);
                }
            } else {
                render_children(article, &children, options, depth, output, truncate_children, node);
                output.push_str(&indent);
                close_tag(output, options, name);
            }
            output.push('\n');
        }
        Value::Text(text) => {
            let trimmed = text.get().trim();
            if !trimmed.is_empty() {
                output.push_str(&indent);
                output.push_str(&partial_escape(trimmed));
                output.push('\n');
            }
        }
        Value::Comment(comment) => {
            output.push_str(&indent);
            paint(output, options, ansi::DIM, &format!("<!--{}-->", comment.get()));
            output.push('\n');
        }
        _ => {}
    }
}

fn render_children(
    article: &InstantArticle,
    children: &[Node],
    options: &RenderOptions,
    depth: usize,
    output: &mut String,
    truncate: bool,
    parent: Node,
) {
    output.push('\n');
    if truncate {
        // At max depth - show truncation comment instead of children
        output.push_str(&options.indent.repeat(depth + 1));
        let comment = format!("<!-- ... ({} more) -->", count_descendants(article, parent));
        paint(output, options, ansi::DIM, &comment);
        output.push('\n');
        return;
    }
    for &child in children {
        render_pretty_node(article, child, options, depth + 1, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ElementKind;

    fn sample() -> InstantArticle {
        let mut article = InstantArticle::new();
        let root = article.root();
        article.set_canonical_url("https://example.com/story");
        article.set_generator("transmark", "1.2.3");
        let p = article.append_element(root, ElementKind::Paragraph).unwrap();
        article.append_text(p, "Hello ").unwrap();
        let b = article.append_element(p, ElementKind::Bold).unwrap();
        article.append_text(b, "world").unwrap();
        article.append_element(root, ElementKind::Paragraph).unwrap();
        let image = article.append_element(root, ElementKind::Image).unwrap();
        article.append_embed(image, "img", &[("src", "a.jpg")]).unwrap();
        article
    }

    #[test]
    fn test_render_body_skips_empty_paragraphs() {
        assert_eq!(
            sample().render_body(),
            r#"<p>Hello <b>world</b></p><figure><img src="a.jpg"></figure>"#
        );
    }

    #[test]
    fn test_render_document_head() {
        let html = sample().render();
        assert!(html.starts_with("<!doctype html><html><head>"));
        assert!(html.contains(r#"<link rel="canonical" href="https://example.com/story">"#));
        assert!(html.contains(r#"<meta charset="utf-8">"#));
        assert!(html.contains(r#"<meta property="op:generator" content="transmark">"#));
        assert!(html.contains(r#"<meta property="op:generator:version" content="1.2.3">"#));
        assert!(html.ends_with("</article></body></html>"));
    }

    #[test]
    fn test_render_pretty_plain() {
        let pretty = sample().render_pretty(&RenderOptions::new());
        assert!(pretty.contains("    <article>\n      <p>\n        Hello\n        <b>world</b>\n      </p>\n"));
        assert!(pretty.contains("      <figure>\n        <img src=\"a.jpg\">\n      </figure>\n"));
        assert!(!pretty.contains("\x1b["));
    }

    #[test]
    fn test_render_pretty_color_and_depth() {
        let pretty = sample().render_pretty(&RenderOptions::new().with_color(true).with_max_depth(Some(2)));
        assert!(pretty.contains(ansi::BLUE));
        assert!(pretty.contains("<!-- ... (5 more) -->"));
    }
}
