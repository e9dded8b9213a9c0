//! Source HTML documents
//!
//! HTML is parsed with TreeSitter and built straight into the xot arena owned
//! by an xee `Documents` instance (the shell-document workflow: register a
//! tiny document, then grow it through `xot_mut()`), so the same tree can be
//! walked node by node and queried with XPath without a serialize/parse
//! roundtrip.
//!
//! The document also owns the processed-node registry used by the
//! transformer. It lives beside the tree rather than in it, so cloned or
//! embedded nodes never carry traversal bookkeeping.

use std::collections::HashSet;

use encoding_rs::Encoding;
use thiserror::Error;
use xee_xpath::{DocumentHandle, Documents};
use xot::{Node, Value, Xot};

use crate::html_builder::HtmlBuilder;
use crate::xot_tree::{self, Snapshot};
use crate::xpath::{QueryCache, QueryItem, XPathError};

const SHELL_URI: &str = "file:///source.html";
const SHELL_MARKUP: &str = "<fragment/>";
const FRAGMENT_NAME: &str = "fragment";

/// Errors that can occur while loading a source document
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
    #[error("TreeSitter error: {0}")]
    TreeSitter(String),
    #[error("Failed to parse: {0}")]
    Parse(String),
    #[error("Failed to build tree: {0}")]
    Tree(String),
}

/// Parse HTML markup into a TreeSitter tree
fn parse_html(markup: &str) -> Result<tree_sitter::Tree, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_html::LANGUAGE.into())
        .map_err(|e| ParseError::TreeSitter(e.to_string()))?;
    parser
        .parse(markup, None)
        .ok_or_else(|| ParseError::Parse("Failed to parse source".to_string()))
}

/// A parsed HTML document ready for rule matching
pub struct SourceDocument {
    documents: Documents,
    handle: DocumentHandle,
    /// Node whose children are the top-level nodes of the input
    root: Node,
    processed: HashSet<Node>,
    queries: QueryCache,
}

impl SourceDocument {
    /// Parse UTF-8 markup
    pub fn parse(markup: &str) -> Result<Self, ParseError> {
        let tree = parse_html(markup)?;

        let mut documents = Documents::new();
        let handle = documents
            .add_string(
                SHELL_URI
                    .try_into()
                    .map_err(|_| ParseError::Parse(format!("invalid document uri {SHELL_URI}")))?,
                SHELL_MARKUP,
            )
            .map_err(|e| ParseError::Parse(e.to_string()))?;
        let doc_node = documents
            .document_node(handle)
            .ok_or_else(|| ParseError::Parse("shell document has no root".to_string()))?;

        let xot = documents.xot_mut();
        let shell = xot
            .document_element(doc_node)
            .map_err(|e| ParseError::Tree(e.to_string()))?;
        HtmlBuilder::new(xot)
            .build(tree.root_node(), markup, shell)
            .map_err(|e| ParseError::Tree(e.to_string()))?;
        let root = promote_single_element(xot, doc_node, shell)
            .map_err(|e| ParseError::Tree(e.to_string()))?;

        Ok(SourceDocument {
            documents,
            handle,
            root,
            processed: HashSet::new(),
            queries: QueryCache::new(),
        })
    }

    /// Decode `bytes` with the given encoding label (UTF-8 when `None`) and parse
    ///
    /// A byte order mark overrides the label.
    pub fn parse_bytes(bytes: &[u8], encoding: Option<&str>) -> Result<Self, ParseError> {
        let encoding = match encoding {
            Some(label) => Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| ParseError::UnknownEncoding(label.to_string()))?,
            None => encoding_rs::UTF_8,
        };
        let (text, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            tracing::debug!(encoding = used.name(), "malformed input replaced while decoding");
        }
        Self::parse(&text)
    }

    pub fn xot(&self) -> &Xot {
        self.documents.xot()
    }

    /// Node whose children are the top-level nodes of the input.
    ///
    /// For input with a single top-level element (`<html>...</html>`, or a
    /// lone `<p>`) this is the document node and that element is the
    /// document element; otherwise it is a `fragment` wrapper element.
    pub fn root(&self) -> Node {
        self.root
    }

    /// The xee document node (target of absolute XPath expressions)
    pub fn document_node(&self) -> Option<Node> {
        self.documents.document_node(self.handle)
    }

    /// The `<body>` element, if the input has one
    pub fn body(&self) -> Option<Node> {
        let xot = self.xot();
        xot_tree::self_and_descendants(xot, self.root)
            .find(|&node| xot_tree::element_name(xot, node) == Some("body"))
    }

    pub fn children(&self, node: Node) -> Vec<Node> {
        self.xot().children(node).collect()
    }

    pub fn is_element(&self, node: Node) -> bool {
        self.xot().element(node).is_some()
    }

    pub fn is_text(&self, node: Node) -> bool {
        self.xot().text_str(node).is_some()
    }

    /// Lower-case tag name of an element
    pub fn tag_name(&self, node: Node) -> Option<&str> {
        xot_tree::element_name(self.xot(), node)
    }

    pub fn attribute(&self, node: Node, name: &str) -> Option<String> {
        xot_tree::attribute(self.xot(), node, name)
    }

    pub fn has_attribute(&self, node: Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Space-separated entries of the `class` attribute
    pub fn classes(&self, node: Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|class| xot_tree::attribute_tokens(&class).map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: Node, class: &str) -> bool {
        self.attribute(node, "class")
            .map_or(false, |value| xot_tree::attribute_tokens(&value).any(|c| c == class))
    }

    /// Text of the node and all its descendants
    pub fn text_content(&self, node: Node) -> String {
        xot_tree::text_content(self.xot(), node)
    }

    pub fn next_element_sibling(&self, node: Node) -> Option<Node> {
        let xot = self.xot();
        xot.following_siblings(node)
            .filter(|&sibling| sibling != node)
            .find(|&sibling| xot.element(sibling).is_some())
    }

    /// Whitespace-only text, comments and other markup-less nodes never need
    /// a rule
    pub fn is_ignorable(&self, node: Node) -> bool {
        let xot = self.xot();
        match xot.value(node) {
            Value::Text(text) => text.get().chars().all(char::is_whitespace),
            Value::Element(_) => false,
            _ => true,
        }
    }

    /// Short human-readable label used in diagnostics
    pub fn describe(&self, node: Node) -> String {
        let xot = self.xot();
        match xot.value(node) {
            Value::Element(element) => {
                let mut label = format!("<{}", xot.local_name_str(element.name()));
                if let Some(id) = self.attribute(node, "id") {
                    label.push_str(&format!(" id=\"{id}\""));
                }
                if let Some(class) = self.attribute(node, "class") {
                    label.push_str(&format!(" class=\"{class}\""));
                }
                label.push('>');
                label
            }
            Value::Text(text) => {
                let text = text.get().trim();
                let mut excerpt: String = text.chars().take(40).collect();
                if excerpt.len() < text.len() {
                    excerpt.push('…');
                }
                format!("text \"{excerpt}\"")
            }
            Value::Comment(_) => "comment".to_string(),
            Value::Document => "document".to_string(),
            _ => "node".to_string(),
        }
    }

    /// Markup of the node's children
    pub fn inner_markup(&self, node: Node) -> String {
        let xot = self.xot();
        let mut output = String::new();
        for child in xot.children(node) {
            xot_tree::write_html(xot, child, &mut output);
        }
        output
    }

    /// Markup of the node itself
    pub fn outer_markup(&self, node: Node) -> String {
        let mut output = String::new();
        xot_tree::write_html(self.xot(), node, &mut output);
        output
    }

    /// Owned copy of a subtree, for embedding into an article
    pub fn snapshot(&self, node: Node) -> Option<Snapshot> {
        Snapshot::capture(self.xot(), node)
    }

    /// Parse markup into a detached `fragment` element in this document
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Node, ParseError> {
        let tree = parse_html(markup)?;
        let xot = self.documents.xot_mut();
        let name = xot.add_name(FRAGMENT_NAME);
        let fragment = xot.new_element(name);
        HtmlBuilder::new(xot)
            .build(tree.root_node(), markup, fragment)
            .map_err(|e| ParseError::Tree(e.to_string()))?;
        Ok(fragment)
    }

    /// Detached `fragment` element holding deep copies of `node`'s children
    pub fn clone_children(&mut self, node: Node) -> Result<Node, ParseError> {
        let snapshots: Vec<Snapshot> = self
            .xot()
            .children(node)
            .filter_map(|child| Snapshot::capture(self.xot(), child))
            .collect();
        self.new_fragment(&snapshots)
    }

    /// Detached `fragment` element built from snapshots
    pub fn new_fragment(&mut self, snapshots: &[Snapshot]) -> Result<Node, ParseError> {
        let xot = self.documents.xot_mut();
        let name = xot.add_name(FRAGMENT_NAME);
        let fragment = xot.new_element(name);
        for snapshot in snapshots {
            let copy = snapshot
                .materialize(xot)
                .map_err(|e| ParseError::Tree(e.to_string()))?;
            xot.append(fragment, copy)
                .map_err(|e| ParseError::Tree(e.to_string()))?;
        }
        Ok(fragment)
    }

    /// Evaluate an XPath expression with `context` as the context item
    pub fn query(&mut self, xpath: &str, context: Node) -> Result<Vec<QueryItem>, XPathError> {
        self.queries.items(&mut self.documents, xpath, context)
    }

    /// Evaluate an XPath expression and keep the node results
    pub fn query_nodes(&mut self, xpath: &str, context: Node) -> Result<Vec<Node>, XPathError> {
        self.queries.nodes(&mut self.documents, xpath, context)
    }

    pub fn is_processed(&self, node: Node) -> bool {
        self.processed.contains(&node)
    }

    pub fn mark_processed(&mut self, node: Node) {
        self.processed.insert(node);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

/// When the input has exactly one top-level element, make it the document
/// element: the shell takes over its name, attributes and children.
/// Returns the node whose children are the input's top-level nodes.
fn promote_single_element(xot: &mut Xot, doc_node: Node, shell: Node) -> Result<Node, xot::Error> {
    let significant: Vec<Node> = xot
        .children(shell)
        .filter(|&child| match xot.value(child) {
            Value::Text(text) => !text.get().chars().all(char::is_whitespace),
            Value::Comment(_) => false,
            _ => true,
        })
        .collect();

    let [only] = significant.as_slice() else {
        return Ok(shell);
    };
    let only = *only;
    let Some(name) = xot.element(only).map(|element| element.name()) else {
        return Ok(shell);
    };

    // Whitespace and comments around the element would otherwise end up
    // inside it
    let surrounding: Vec<Node> = xot.children(shell).filter(|&child| child != only).collect();
    for node in surrounding {
        xot.remove(node)?;
    }

    if let Some(element) = xot.element_mut(shell) {
        element.set_name(name);
    }
    let attributes: Vec<_> = xot
        .attributes(only)
        .iter()
        .map(|(name_id, value)| (name_id, value.to_string()))
        .collect();
    for (name_id, value) in attributes {
        xot.attributes_mut(shell).insert(name_id, value);
    }

    // Flatten: move the element's children into its place, then drop it
    let children: Vec<Node> = xot.children(only).collect();
    for child in children {
        xot.detach(child)?;
        xot.insert_before(only, child)?;
    }
    xot.detach(only)?;

    Ok(doc_node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_children(source: &SourceDocument, node: Node) -> Vec<Node> {
        source
            .children(node)
            .into_iter()
            .filter(|&child| source.is_element(child))
            .collect()
    }

    #[test]
    fn test_single_element_is_promoted() {
        let source = SourceDocument::parse("<p class=\"lead\">Hello</p>").unwrap();
        let root = source.root();
        assert_eq!(Some(root), source.document_node());
        let children = source.children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(source.tag_name(children[0]), Some("p"));
        assert!(source.has_class(children[0], "lead"));
        assert_eq!(source.text_content(children[0]), "Hello");
    }

    #[test]
    fn test_fragment_root_for_several_top_level_nodes() {
        let source = SourceDocument::parse("<p>one</p><p>two</p>").unwrap();
        let root = source.root();
        assert_eq!(source.tag_name(root), Some("fragment"));
        assert_eq!(element_children(&source, root).len(), 2);
    }

    #[test]
    fn test_text_whitespace_survives() {
        let source = SourceDocument::parse("<p>Hello <b>world</b></p>").unwrap();
        let p = source.children(source.root())[0];
        let children = source.children(p);
        assert_eq!(source.xot().text_str(children[0]), Some("Hello "));
        assert_eq!(source.outer_markup(p), "<p>Hello <b>world</b></p>");
    }

    #[test]
    fn test_ignorable_nodes() {
        let source = SourceDocument::parse("<div>\n  <!-- note -->\n  <span>x</span>\n</div>").unwrap();
        let div = source.children(source.root())[0];
        let ignorable: Vec<bool> = source
            .children(div)
            .into_iter()
            .map(|child| source.is_ignorable(child))
            .collect();
        assert!(ignorable.iter().filter(|&&i| !i).count() == 1);
        assert!(ignorable.len() >= 3);
    }

    #[test]
    fn test_describe() {
        let source = SourceDocument::parse(r#"<div id="main" class="a b">text</div>"#).unwrap();
        let div = source.children(source.root())[0];
        assert_eq!(source.describe(div), r#"<div id="main" class="a b">"#);
        assert_eq!(source.describe(source.children(div)[0]), "text \"text\"");
        assert_eq!(source.classes(div), vec!["a", "b"]);
    }

    #[test]
    fn test_decoding() {
        let source = SourceDocument::parse_bytes(b"<p>\xa3 5</p>", Some("windows-1252")).unwrap();
        let p = source.children(source.root())[0];
        assert_eq!(source.text_content(p), "£ 5");

        assert!(matches!(
            SourceDocument::parse_bytes(b"<p></p>", Some("klingon")),
            Err(ParseError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_fragments_and_clones() {
        let mut source = SourceDocument::parse("<div><em>a</em>b</div>").unwrap();
        let div = source.children(source.root())[0];

        let clone = source.clone_children(div).unwrap();
        assert_eq!(source.inner_markup(clone), "<em>a</em>b");
        assert_ne!(source.children(clone)[0], source.children(div)[0]);

        let fragment = source.parse_fragment("<img src=\"x.png\"><br>").unwrap();
        assert_eq!(source.inner_markup(fragment), "<img src=\"x.png\"><br>");
    }

    #[test]
    fn test_processed_registry() {
        let mut source = SourceDocument::parse("<p>a</p><p>b</p>").unwrap();
        let first = element_children(&source, source.root())[0];
        assert!(!source.is_processed(first));
        source.mark_processed(first);
        source.mark_processed(first);
        assert!(source.is_processed(first));
        assert_eq!(source.processed_count(), 1);

        let clone = source.clone_children(first).unwrap();
        assert!(source.children(clone).iter().all(|&node| !source.is_processed(node)));
    }

    #[test]
    fn test_body_and_query() {
        let mut source =
            SourceDocument::parse("<html><head></head><body><p>a</p><p>b</p></body></html>").unwrap();
        let body = source.body().unwrap();
        assert_eq!(source.tag_name(body), Some("body"));
        let paragraphs = source.query_nodes("//p", body).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(source.next_element_sibling(paragraphs[0]), Some(paragraphs[1]));
    }
}
