//! Small reusable operations on xot trees
//!
//! Both the source document and the produced article are xot arenas. These
//! helpers cover the handful of node operations the rest of the crate needs,
//! plus [`Snapshot`], an owned copy of a subtree used to move nodes between
//! arenas (or to clone within one without aliasing borrows).

use xot::{Node, Value, Xot};

/// Get the local name of an element node
pub fn element_name(xot: &Xot, node: Node) -> Option<&str> {
    xot.element(node).map(|element| xot.local_name_str(element.name()))
}

/// Get an attribute value from an element
pub fn attribute(xot: &Xot, node: Node, attr_name: &str) -> Option<String> {
    xot.element(node)?;
    let attrs = xot.attributes(node);
    for (name_id, value) in attrs.iter() {
        if xot.local_name_str(name_id) == attr_name {
            return Some(value.to_string());
        }
    }
    None
}

/// Set an attribute on an element, creating the name if needed
pub fn set_attribute(xot: &mut Xot, node: Node, attr_name: &str, value: &str) {
    let name_id = xot.add_name(attr_name);
    xot.attributes_mut(node).insert(name_id, value.to_string());
}

/// Tokens of a space-separated attribute such as `class`.
///
/// Splits on the XML whitespace that `normalize-space` collapses (space,
/// tab, CR, LF) so that direct checks agree with XPath class tests.
pub fn attribute_tokens(value: &str) -> impl Iterator<Item = &str> {
    value
        .split([' ', '\t', '\r', '\n'])
        .filter(|token| !token.is_empty())
}

/// Get all element children of a node
pub fn element_children(xot: &Xot, node: Node) -> Vec<Node> {
    xot.children(node)
        .filter(|&child| xot.element(child).is_some())
        .collect()
}

/// Whether a node is a text node consisting only of whitespace
pub fn is_whitespace_text(xot: &Xot, node: Node) -> bool {
    xot.text_str(node)
        .map_or(false, |text| text.chars().all(char::is_whitespace))
}

/// Concatenated text of all descendant text nodes
pub fn text_content(xot: &Xot, node: Node) -> String {
    match xot.value(node) {
        Value::Text(text) => text.get().to_string(),
        Value::Comment(_) => String::new(),
        _ => xot.string_value(node),
    }
}

/// Topmost ancestor of a node (the document node for attached nodes)
pub fn tree_root(xot: &Xot, node: Node) -> Node {
    let mut current = node;
    while let Some(parent) = xot.parent(current) {
        current = parent;
    }
    current
}

/// The node itself followed by all its descendants, in document order
pub fn self_and_descendants(xot: &Xot, node: Node) -> impl Iterator<Item = Node> + '_ {
    std::iter::once(node).chain(xot.descendants(node).filter(move |&n| n != node))
}

/// HTML elements that never have content or a closing tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Serialize a node as HTML markup (void elements, raw script/style text)
pub fn write_html(xot: &Xot, node: Node, output: &mut String) {
    write_html_filtered(xot, node, output, &|_| false);
}

/// Serialize a node as HTML markup, leaving out elements for which `skip`
/// returns true
pub fn write_html_filtered(xot: &Xot, node: Node, output: &mut String, skip: &dyn Fn(Node) -> bool) {
    match xot.value(node) {
        Value::Document => {
            for child in xot.children(node) {
                write_html_filtered(xot, child, output, skip);
            }
        }
        Value::Element(element) => {
            if skip(node) {
                return;
            }
            let name = xot.local_name_str(element.name());
            output.push('<');
            output.push_str(name);
            for (name_id, value) in xot.attributes(node).iter() {
                output.push(' ');
                output.push_str(xot.local_name_str(name_id));
                output.push_str("=\"");
                output.push_str(&quick_xml::escape::escape(value.as_str()));
                output.push('"');
            }
            output.push('>');
            if VOID_ELEMENTS.contains(&name) {
                return;
            }
            let raw = matches!(name, "script" | "style");
            for child in xot.children(node) {
                match xot.value(child) {
                    Value::Text(text) if raw => output.push_str(text.get()),
                    _ => write_html_filtered(xot, child, output, skip),
                }
            }
            output.push_str("</");
            output.push_str(name);
            output.push('>');
        }
        Value::Text(text) => output.push_str(&quick_xml::escape::partial_escape(text.get())),
        Value::Comment(comment) => {
            output.push_str("<!--");
            output.push_str(comment.get());
            output.push_str("-->");
        }
        _ => {}
    }
}

/// Owned copy of a subtree, independent of any arena
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Snapshot>,
    },
    Text(String),
    Comment(String),
}

impl Snapshot {
    /// Capture a node and its descendants. Returns `None` for node types that
    /// carry no content (documents, processing instructions).
    pub fn capture(xot: &Xot, node: Node) -> Option<Self> {
        match xot.value(node) {
            Value::Element(element) => {
                let attributes = xot
                    .attributes(node)
                    .iter()
                    .map(|(name_id, value)| {
                        (xot.local_name_str(name_id).to_string(), value.to_string())
                    })
                    .collect();
                let children = xot
                    .children(node)
                    .filter_map(|child| Snapshot::capture(xot, child))
                    .collect();
                Some(Snapshot::Element {
                    name: xot.local_name_str(element.name()).to_string(),
                    attributes,
                    children,
                })
            }
            Value::Text(text) => Some(Snapshot::Text(text.get().to_string())),
            Value::Comment(comment) => Some(Snapshot::Comment(comment.get().to_string())),
            _ => None,
        }
    }

    /// Build the snapshot as a new detached subtree in `xot`
    pub fn materialize(&self, xot: &mut Xot) -> Result<Node, xot::Error> {
        match self {
            Snapshot::Element { name, attributes, children } => {
                let name_id = xot.add_name(name);
                let element = xot.new_element(name_id);
                for (attr_name, value) in attributes {
                    set_attribute(xot, element, attr_name, value);
                }
                for child in children {
                    let child_node = child.materialize(xot)?;
                    xot.append(element, child_node)?;
                }
                Ok(element)
            }
            Snapshot::Text(text) => Ok(xot.new_text(text)),
            Snapshot::Comment(comment) => Ok(xot.new_comment(comment)),
        }
    }
}
