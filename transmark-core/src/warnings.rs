//! Diagnostics collected while transforming
//!
//! Warnings never stop a run. They are accumulated in order and handed back
//! next to the (possibly partial) article, for the caller to present.

use serde::Serialize;
use std::fmt;

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerWarning {
    /// No rule for the current context matched a meaningful source node
    UnrecognizedNode { context: String, node: String },
    /// A rule matched but a property it requires came back empty
    MissingProperty {
        property: String,
        rule: String,
        context: String,
        node: String,
    },
    /// A built element doesn't satisfy the target format
    InvalidElement { element: String, reason: String },
}

impl TransformerWarning {
    /// Stable snake_case name of the warning kind
    pub fn kind(&self) -> &'static str {
        match self {
            TransformerWarning::UnrecognizedNode { .. } => "unrecognized_node",
            TransformerWarning::MissingProperty { .. } => "missing_property",
            TransformerWarning::InvalidElement { .. } => "invalid_element",
        }
    }
}

impl fmt::Display for TransformerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformerWarning::UnrecognizedNode { context, node } => {
                write!(f, "no rule matched {node} in {context}")
            }
            TransformerWarning::MissingProperty {
                property,
                rule,
                context,
                node,
            } => write!(
                f,
                "{rule} could not resolve required property '{property}' on {node} in {context}"
            ),
            TransformerWarning::InvalidElement { element, reason } => {
                write!(f, "invalid {element}: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let warning = TransformerWarning::MissingProperty {
            property: "image.url".into(),
            rule: "ImageRule".into(),
            context: "InstantArticle".into(),
            node: "<img>".into(),
        };
        assert_eq!(
            warning.to_string(),
            "ImageRule could not resolve required property 'image.url' on <img> in InstantArticle"
        );
    }

    #[test]
    fn test_serialize_is_tagged() {
        let warning = TransformerWarning::UnrecognizedNode {
            context: "Paragraph".into(),
            node: "<iframe>".into(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "unrecognized_node");
        assert_eq!(json["node"], "<iframe>");
        assert_eq!(warning.kind(), "unrecognized_node");
    }
}
