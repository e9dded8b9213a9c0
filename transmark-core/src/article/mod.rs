//! Target article model
//!
//! An article is a small, constrained tree of typed content elements. The
//! tree lives in its own xot arena: every typed element is an xot element
//! named after the HTML tag it renders to, and a side table records its
//! [`ElementKind`]. Untyped nodes (the `<img>` inside an image figure, raw
//! embed markup) may only hang below media elements and are rendered as-is.
//!
//! Rules only ever hold [`ElementId`] handles, so a rule deep in the tree can
//! still reach the root and insert top-level blocks next to the element it is
//! working in.

mod render;

pub use render::RenderOptions;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use xot::{Node, Value, Xot};

use crate::transformer::TransformError;
use crate::warnings::TransformerWarning;
use crate::xot_tree::{self, Snapshot};

/// Version of the markup format written into rendered articles
pub const MARKUP_VERSION: &str = "v1.0";

/// Concrete element kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
pub enum ElementKind {
    InstantArticle,
    Header,
    Footer,
    Paragraph,
    H1,
    H2,
    Bold,
    Italic,
    Anchor,
    LineBreak,
    Image,
    Video,
    Interactive,
    Caption,
    Blockquote,
    Pullquote,
    Cite,
    ListElement,
    ListItem,
    Author,
    Time,
}

/// Abstract capabilities an element kind can provide
///
/// Rules may declare a capability as their context and then apply under
/// every kind that provides it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
pub enum Capability {
    /// Every element
    Element,
    /// Holds block-level children
    Container,
    /// Holds text and inline children
    TextContainer,
    /// The document root
    InstantArticleRoot,
}

/// Context-type names per kind: the kind itself followed by its capabilities
static TYPE_NAMES: Lazy<HashMap<ElementKind, Vec<&'static str>>> = Lazy::new(|| {
    ElementKind::iter()
        .map(|kind| {
            let mut names: Vec<&'static str> = vec![kind.into()];
            names.extend(kind.capabilities().iter().map(|&cap| -> &'static str { cap.into() }));
            (kind, names)
        })
        .collect()
});

impl ElementKind {
    /// Capabilities provided by this kind
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        use ElementKind as K;
        match self {
            K::InstantArticle => &[Element, Container, InstantArticleRoot],
            K::Header | K::Image | K::Video | K::Interactive | K::ListElement => {
                &[Element, Container]
            }
            K::Footer | K::Pullquote => &[Element, Container, TextContainer],
            K::Paragraph
            | K::H1
            | K::H2
            | K::Bold
            | K::Italic
            | K::Anchor
            | K::Caption
            | K::Blockquote
            | K::Cite
            | K::ListItem
            | K::Author => &[Element, TextContainer],
            K::LineBreak | K::Time => &[Element],
        }
    }

    pub fn has_capability(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Every context-type name this kind answers to
    pub fn type_names(self) -> &'static [&'static str] {
        TYPE_NAMES.get(&self).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `name` (a kind or capability name) applies to this kind
    pub fn is_a(self, name: &str) -> bool {
        self.type_names().contains(&name)
    }

    /// Tag the element renders to
    pub fn tag(self) -> &'static str {
        use ElementKind as K;
        match self {
            K::InstantArticle => "article",
            K::Header => "header",
            K::Footer => "footer",
            K::Paragraph => "p",
            K::H1 => "h1",
            K::H2 => "h2",
            K::Bold => "b",
            K::Italic => "i",
            K::Anchor => "a",
            K::LineBreak => "br",
            K::Image | K::Video | K::Interactive => "figure",
            K::Caption => "figcaption",
            K::Blockquote => "blockquote",
            K::Pullquote => "aside",
            K::Cite => "cite",
            K::ListElement => "ul",
            K::ListItem => "li",
            K::Author => "address",
            K::Time => "time",
        }
    }

    pub fn is_inline(self) -> bool {
        matches!(
            self,
            ElementKind::Bold | ElementKind::Italic | ElementKind::Anchor | ElementKind::LineBreak
        )
    }

    /// Media elements may hold untyped embed markup
    pub fn accepts_embeds(self) -> bool {
        matches!(self, ElementKind::Image | ElementKind::Video | ElementKind::Interactive)
    }

    /// Whether an element of this kind may hold a `child` element
    pub fn accepts(self, child: ElementKind) -> bool {
        use ElementKind as K;
        match self {
            K::InstantArticle => matches!(
                child,
                K::Header
                    | K::Footer
                    | K::Paragraph
                    | K::H1
                    | K::H2
                    | K::Image
                    | K::Video
                    | K::Interactive
                    | K::Blockquote
                    | K::Pullquote
                    | K::ListElement
            ),
            K::Header => matches!(child, K::H1 | K::H2 | K::Author | K::Time | K::Image | K::Video),
            K::Image | K::Video | K::Interactive => child == K::Caption,
            K::ListElement => child == K::ListItem,
            K::Pullquote => child == K::Cite || child.is_inline(),
            K::Footer => child == K::Paragraph || child.is_inline(),
            kind if kind.has_capability(Capability::TextContainer) => child.is_inline(),
            _ => false,
        }
    }
}

/// Whether `name` is a known context-type name (kind or capability)
pub fn is_known_type_name(name: &str) -> bool {
    name.parse::<ElementKind>().is_ok() || name.parse::<Capability>().is_ok()
}

/// Handle to a typed element of an [`InstantArticle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(Node);

/// The article being built
pub struct InstantArticle {
    xot: Xot,
    root: Node,
    kinds: HashMap<Node, ElementKind>,
    canonical_url: Option<String>,
    charset: Option<String>,
    markup_id: Option<String>,
    generator: Option<(String, String)>,
}

impl Default for InstantArticle {
    fn default() -> Self {
        Self::new()
    }
}

impl InstantArticle {
    pub fn new() -> Self {
        let mut xot = Xot::new();
        let name = xot.add_name(ElementKind::InstantArticle.tag());
        let root = xot.new_element(name);
        let mut kinds = HashMap::new();
        kinds.insert(root, ElementKind::InstantArticle);
        InstantArticle {
            xot,
            root,
            kinds,
            canonical_url: None,
            charset: None,
            markup_id: None,
            generator: None,
        }
    }

    pub fn root(&self) -> ElementId {
        ElementId(self.root)
    }

    pub fn kind(&self, id: ElementId) -> Option<ElementKind> {
        self.kinds.get(&id.0).copied()
    }

    fn expect_kind(&self, id: ElementId) -> Result<ElementKind, TransformError> {
        self.kind(id).ok_or(TransformError::UnknownElement)
    }

    /// Number of typed elements, the root included
    pub fn element_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.xot
            .parent(id.0)
            .filter(|parent| self.kinds.contains_key(parent))
            .map(ElementId)
    }

    /// Typed children in order
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.xot
            .children(id.0)
            .filter(|child| self.kinds.contains_key(child))
            .map(ElementId)
            .collect()
    }

    /// The ancestor-or-self that is a direct child of the root
    pub fn top_level_block(&self, id: ElementId) -> Option<ElementId> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if parent.0 == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    fn new_element(&mut self, kind: ElementKind) -> Node {
        let name = self.xot.add_name(kind.tag());
        let node = self.xot.new_element(name);
        if kind == ElementKind::Interactive {
            xot_tree::set_attribute(&mut self.xot, node, "class", "op-interactive");
        }
        self.kinds.insert(node, kind);
        node
    }

    /// Create an element of `kind` as the last child of `parent`
    pub fn append_element(&mut self, parent: ElementId, kind: ElementKind) -> Result<ElementId, TransformError> {
        let parent_kind = self.expect_kind(parent)?;
        if !parent_kind.accepts(kind) {
            return Err(TransformError::InvalidChild {
                parent: parent_kind,
                child: kind,
            });
        }
        let node = self.new_element(kind);
        self.xot.append(parent.0, node).map_err(tree_error)?;
        Ok(ElementId(node))
    }

    /// Create an element of `kind` as the next sibling of `anchor`
    pub fn insert_after(&mut self, anchor: ElementId, kind: ElementKind) -> Result<ElementId, TransformError> {
        let parent = self.parent(anchor).ok_or(TransformError::UnknownElement)?;
        let parent_kind = self.expect_kind(parent)?;
        if !parent_kind.accepts(kind) {
            return Err(TransformError::InvalidChild {
                parent: parent_kind,
                child: kind,
            });
        }
        let node = self.new_element(kind);
        self.xot.insert_after(anchor.0, node).map_err(tree_error)?;
        Ok(ElementId(node))
    }

    /// Append text to a text-bearing element
    pub fn append_text(&mut self, parent: ElementId, text: &str) -> Result<(), TransformError> {
        let kind = self.expect_kind(parent)?;
        if !kind.has_capability(Capability::TextContainer) {
            return Err(TransformError::NotTextContainer(kind));
        }
        if text.is_empty() {
            return Ok(());
        }
        self.xot.append_text(parent.0, text).map_err(tree_error)
    }

    /// Replace an element's content with `text`, for leaf kinds such as `Time`
    pub fn set_text(&mut self, id: ElementId, text: &str) -> Result<(), TransformError> {
        self.expect_kind(id)?;
        let children: Vec<Node> = self.xot.children(id.0).collect();
        for child in children {
            self.remove_subtree(child)?;
        }
        if !text.is_empty() {
            let node = self.xot.new_text(text);
            self.xot.append(id.0, node).map_err(tree_error)?;
        }
        Ok(())
    }

    fn remove_subtree(&mut self, node: Node) -> Result<(), TransformError> {
        let nodes: Vec<Node> = self.xot.descendants(node).collect();
        for n in nodes {
            self.kinds.remove(&n);
        }
        self.xot.remove(node).map_err(tree_error)
    }

    /// Remove an element and everything below it
    pub fn remove(&mut self, id: ElementId) -> Result<(), TransformError> {
        if id.0 == self.root {
            return Err(TransformError::UnknownElement);
        }
        self.expect_kind(id)?;
        self.remove_subtree(id.0)
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        xot_tree::set_attribute(&mut self.xot, id.0, name, value);
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        xot_tree::attribute(&self.xot, id.0, name)
    }

    /// Render a list as `<ol>` instead of `<ul>`
    pub fn set_ordered(&mut self, list: ElementId, ordered: bool) -> Result<(), TransformError> {
        if self.expect_kind(list)? != ElementKind::ListElement {
            return Err(TransformError::UnknownElement);
        }
        let name = self.xot.add_name(if ordered { "ol" } else { "ul" });
        if let Some(element) = self.xot.element_mut(list.0) {
            element.set_name(name);
        }
        Ok(())
    }

    pub fn is_ordered(&self, list: ElementId) -> bool {
        xot_tree::element_name(&self.xot, list.0) == Some("ol")
    }

    /// Append an untyped element (an `<img>`, `<source>`, ...) to a media element
    pub fn append_embed(
        &mut self,
        parent: ElementId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<(), TransformError> {
        let kind = self.expect_kind(parent)?;
        if !kind.accepts_embeds() {
            return Err(TransformError::NoEmbeds(kind));
        }
        let name = self.xot.add_name(tag);
        let node = self.xot.new_element(name);
        for (attr, value) in attributes {
            xot_tree::set_attribute(&mut self.xot, node, attr, value);
        }
        self.xot.append(parent.0, node).map_err(tree_error)
    }

    /// Copy source nodes verbatim into a media element
    pub fn import_fragment(&mut self, parent: ElementId, snapshots: &[Snapshot]) -> Result<(), TransformError> {
        let kind = self.expect_kind(parent)?;
        if !kind.accepts_embeds() {
            return Err(TransformError::NoEmbeds(kind));
        }
        for snapshot in snapshots {
            let node = snapshot.materialize(&mut self.xot).map_err(tree_error)?;
            self.xot.append(parent.0, node).map_err(tree_error)?;
        }
        Ok(())
    }

    /// Untyped embed elements below a media element
    pub fn embeds(&self, id: ElementId) -> Vec<(String, Vec<(String, String)>)> {
        self.xot
            .children(id.0)
            .filter(|child| self.xot.element(*child).is_some() && !self.kinds.contains_key(child))
            .filter_map(|child| match Snapshot::capture(&self.xot, child)? {
                Snapshot::Element { name, attributes, .. } => Some((name, attributes)),
                _ => None,
            })
            .collect()
    }

    /// Text of the element and its descendants
    pub fn text_content(&self, id: ElementId) -> String {
        xot_tree::text_content(&self.xot, id.0)
    }

    /// No visible content: no non-blank text and no media below
    pub fn is_empty(&self, id: ElementId) -> bool {
        self.is_node_empty(id.0)
    }

    fn is_node_empty(&self, node: Node) -> bool {
        self.xot.children(node).all(|child| match self.xot.value(child) {
            Value::Text(text) => text.get().trim().is_empty(),
            Value::Element(_) => match self.kinds.get(&child) {
                Some(kind) if kind.is_inline() && *kind != ElementKind::LineBreak => {
                    self.is_node_empty(child)
                }
                Some(ElementKind::LineBreak) => true,
                _ => false,
            },
            _ => true,
        })
    }

    pub fn header(&self) -> Option<ElementId> {
        self.first_child_of_kind(ElementKind::Header)
    }

    pub fn footer(&self) -> Option<ElementId> {
        self.first_child_of_kind(ElementKind::Footer)
    }

    fn first_child_of_kind(&self, kind: ElementKind) -> Option<ElementId> {
        self.children(self.root()).into_iter().find(|&child| self.kind(child) == Some(kind))
    }

    pub fn canonical_url(&self) -> Option<&str> {
        self.canonical_url.as_deref()
    }

    pub fn set_canonical_url(&mut self, url: impl Into<String>) {
        self.canonical_url = Some(url.into());
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = Some(charset.into());
    }

    pub fn markup_id(&self) -> Option<&str> {
        self.markup_id.as_deref()
    }

    pub fn set_markup_id(&mut self, id: impl Into<String>) {
        self.markup_id = Some(id.into());
    }

    /// Generator name and version
    pub fn generator(&self) -> Option<(&str, &str)> {
        self.generator
            .as_ref()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }

    pub fn set_generator(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.generator = Some((name.into(), version.into()));
    }

    /// Check the built tree against the target format
    pub fn validate(&self) -> Vec<TransformerWarning> {
        let mut warnings = Vec::new();
        if self.canonical_url.as_deref().map_or(true, str::is_empty) {
            warnings.push(invalid(ElementKind::InstantArticle, "missing canonical URL"));
        }
        if self.children(self.root()).iter().all(|&child| {
            self.kind(child) == Some(ElementKind::Header) || self.is_empty(child)
        }) {
            warnings.push(invalid(ElementKind::InstantArticle, "article has no content"));
        }

        let nodes: Vec<Node> = self.xot.descendants(self.root).collect();
        for node in nodes {
            let Some(&kind) = self.kinds.get(&node) else {
                continue;
            };
            let id = ElementId(node);
            match kind {
                ElementKind::Image => {
                    if !self.has_embed_with(id, "img", "src") {
                        warnings.push(invalid(kind, "missing image URL"));
                    }
                }
                ElementKind::Video => {
                    if !self.has_embed_with(id, "video", "src")
                        && !self.has_embed_with(id, "source", "src")
                    {
                        warnings.push(invalid(kind, "missing video URL"));
                    }
                }
                ElementKind::Interactive => {
                    if !self.has_embed_with(id, "iframe", "src")
                        && self.xot.children(node).all(|child| self.kinds.contains_key(&child))
                    {
                        warnings.push(invalid(kind, "missing embed source or markup"));
                    }
                }
                ElementKind::Anchor => {
                    if self.attribute(id, "href").map_or(true, |href| href.is_empty()) {
                        warnings.push(invalid(kind, "missing href"));
                    }
                }
                ElementKind::H1 | ElementKind::Author => {
                    if self.is_empty(id) {
                        warnings.push(invalid(kind, "element is empty"));
                    }
                }
                ElementKind::Time => {
                    if self.attribute(id, "datetime").is_none() {
                        warnings.push(invalid(kind, "missing datetime"));
                    }
                }
                _ => {}
            }
        }
        warnings
    }

    fn has_embed_with(&self, id: ElementId, tag: &str, attribute: &str) -> bool {
        self.xot
            .descendants(id.0)
            .filter(|&node| !self.kinds.contains_key(&node))
            .any(|node| {
                xot_tree::element_name(&self.xot, node) == Some(tag)
                    && xot_tree::attribute(&self.xot, node, attribute).map_or(false, |v| !v.is_empty())
            })
    }

    /// Complete HTML document
    pub fn render(&self) -> String {
        render::render_document(self)
    }

    /// Markup of the article body only (the children of `<article>`)
    pub fn render_body(&self) -> String {
        render::render_body(self)
    }

    /// Indented, optionally colored rendering for terminals
    pub fn render_pretty(&self, options: &RenderOptions) -> String {
        render::render_pretty(self, options)
    }
}

fn tree_error(error: xot::Error) -> TransformError {
    TransformError::Tree(error.to_string())
}

fn invalid(kind: ElementKind, reason: &str) -> TransformerWarning {
    TransformerWarning::InvalidElement {
        element: kind.to_string(),
        reason: reason.to_string(),
    }
}
