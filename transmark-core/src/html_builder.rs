//! Build xot trees from the TreeSitter HTML AST
//!
//! The HTML grammar trims whitespace off its `text` tokens, so text is not
//! copied token by token. Instead every run of source between two structural
//! nodes (tags, elements, comments) becomes one text node, taken verbatim
//! from the source bytes and entity-decoded. That keeps the space in
//! `Hello <b>world</b>` and turns indentation into whitespace-only text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use tree_sitter::Node as TsNode;
use xot::{NameId, Node as XotNode, Xot};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_.\-]*$").unwrap());

/// Elements whose content is kept as raw text (no entity decoding)
const RAW_TEXT_ELEMENTS: &[&str] = &["script_element", "style_element"];

/// Builder that writes HTML nodes into an existing xot arena
pub struct HtmlBuilder<'x> {
    xot: &'x mut Xot,
    /// Cache of name strings to NameIds
    name_cache: HashMap<String, NameId>,
}

impl<'x> HtmlBuilder<'x> {
    pub fn new(xot: &'x mut Xot) -> Self {
        HtmlBuilder {
            xot,
            name_cache: HashMap::new(),
        }
    }

    /// Get or create a NameId for the given name
    fn get_name(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.name_cache.get(name) {
            id
        } else {
            let id = self.xot.add_name(name);
            self.name_cache.insert(name.to_string(), id);
            id
        }
    }

    /// Append the content of a parsed HTML document (or fragment) to `parent`
    pub fn build(&mut self, root: TsNode, source: &str, parent: XotNode) -> Result<(), xot::Error> {
        self.build_content(root, source, parent)
    }

    /// Walk the children of a container node (document, element, ERROR)
    fn build_content(&mut self, ts_node: TsNode, source: &str, parent: XotNode) -> Result<(), xot::Error> {
        let mut text_start = ts_node.start_byte();
        let mut cursor = ts_node.walk();

        for child in ts_node.children(&mut cursor) {
            match child.kind() {
                "start_tag" | "end_tag" | "self_closing_tag" | "erroneous_end_tag" | "doctype" => {
                    self.flush_text(source, text_start, child.start_byte(), parent)?;
                    text_start = child.end_byte();
                }
                "element" | "script_element" | "style_element" => {
                    self.flush_text(source, text_start, child.start_byte(), parent)?;
                    self.build_element(child, source, parent)?;
                    text_start = child.end_byte();
                }
                "comment" => {
                    self.flush_text(source, text_start, child.start_byte(), parent)?;
                    if let Ok(raw) = child.utf8_text(source.as_bytes()) {
                        let body = raw
                            .trim_start_matches("<!--")
                            .trim_end_matches("-->");
                        let comment = self.xot.new_comment(body);
                        self.xot.append(parent, comment)?;
                    }
                    text_start = child.end_byte();
                }
                "ERROR" => {
                    // Recovery node: keep whatever structure it still holds
                    self.flush_text(source, text_start, child.start_byte(), parent)?;
                    self.build_content(child, source, parent)?;
                    text_start = child.end_byte();
                }
                // text, entity, raw_text: part of the surrounding text run
                _ => {}
            }
        }

        self.flush_text(source, text_start, ts_node.end_byte(), parent)
    }

    /// Build one element (with attributes) and its content
    fn build_element(&mut self, ts_node: TsNode, source: &str, parent: XotNode) -> Result<(), xot::Error> {
        let Some(tag) = find_child(ts_node, &["start_tag", "self_closing_tag"]) else {
            return self.build_content(ts_node, source, parent);
        };

        let tag_name = find_child(tag, &["tag_name"])
            .and_then(|n| n.utf8_text(source.as_bytes()).ok())
            .map(|name| name.to_ascii_lowercase())
            .unwrap_or_default();

        // Names that can't be XML names (custom namespaces, stray punctuation)
        // lose their wrapper but keep their content
        if !NAME_RE.is_match(&tag_name) {
            return self.build_content(ts_node, source, parent);
        }

        let name_id = self.get_name(&tag_name);
        let element = self.xot.new_element(name_id);
        self.build_attributes(tag, source, element);

        if RAW_TEXT_ELEMENTS.contains(&ts_node.kind()) {
            if let Some(raw) = find_child(ts_node, &["raw_text"]) {
                if let Ok(text) = raw.utf8_text(source.as_bytes()) {
                    let text_node = self.xot.new_text(text);
                    self.xot.append(element, text_node)?;
                }
            }
        } else {
            self.build_content(ts_node, source, element)?;
        }

        self.xot.append(parent, element)?;
        Ok(())
    }

    fn build_attributes(&mut self, tag: TsNode, source: &str, element: XotNode) {
        let mut cursor = tag.walk();
        for attr in tag.named_children(&mut cursor) {
            if attr.kind() != "attribute" {
                continue;
            }
            let Some(name) = find_child(attr, &["attribute_name"])
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .map(|n| n.to_ascii_lowercase())
            else {
                continue;
            };
            if !NAME_RE.is_match(&name) || name.starts_with("xmlns") {
                continue;
            }

            let value = match find_child(attr, &["attribute_value", "quoted_attribute_value"]) {
                Some(value_node) if value_node.kind() == "quoted_attribute_value" => {
                    find_child(value_node, &["attribute_value"])
                        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                        .unwrap_or("")
                }
                Some(value_node) => value_node.utf8_text(source.as_bytes()).unwrap_or(""),
                None => "",
            };

            let name_id = self.get_name(&name);
            self.xot
                .attributes_mut(element)
                .insert(name_id, decode_entities(value).into_owned());
        }
    }

    /// Append `source[start..end]` as a text node, if non-empty
    fn flush_text(&mut self, source: &str, start: usize, end: usize, parent: XotNode) -> Result<(), xot::Error> {
        if start >= end {
            return Ok(());
        }
        let Some(raw) = source.get(start..end) else {
            return Ok(());
        };
        let text_node = self.xot.new_text(&decode_entities(raw));
        self.xot.append(parent, text_node)
    }
}

/// First direct child whose kind is one of `kinds`
fn find_child<'t>(node: TsNode<'t>, kinds: &[&str]) -> Option<TsNode<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| kinds.contains(&child.kind()));
    found
}

/// Decode HTML character references (`&amp;`, `&eacute;`, `&#39;`,
/// `&#x2014;`, ...) against the full HTML5 entity table
///
/// Unknown named references are left untouched.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_and_numeric_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&#39;quoted&#x27;"), "'quoted'");
        assert_eq!(decode_entities("a&mdash;b"), "a\u{2014}b");
    }

    #[test]
    fn test_decode_full_entity_table() {
        assert_eq!(decode_entities("caf&eacute;"), "caf\u{e9}");
        assert_eq!(decode_entities("&auml;&szlig; &hearts;"), "\u{e4}\u{df} \u{2665}");
    }

    #[test]
    fn test_unknown_entity_is_kept() {
        assert_eq!(decode_entities("&bogus; &"), "&bogus; &");
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(decode_entities("plain"), Cow::Borrowed("plain")));
    }
}
