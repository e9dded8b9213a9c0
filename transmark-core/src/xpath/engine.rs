//! Compiled query cache and execution against xee `Documents`

use super::XPathError;
use std::collections::HashMap;
use xee_xpath::{query::SequenceQuery, Documents, Queries, Query};
use xot::Node;

/// A single XPath result item
#[derive(Debug, Clone, PartialEq)]
pub enum QueryItem {
    Node(Node),
    Atomic(String),
}

/// Compile an XPath expression without keeping it, to validate configuration
pub fn compile_check(xpath: &str) -> Result<(), XPathError> {
    let queries = Queries::default();
    queries
        .sequence(xpath)
        .map(|_| ())
        .map_err(|e| XPathError::Compile(e.to_string()))
}

/// Per-document cache of compiled XPath queries
///
/// Rule-sets reuse a small number of selectors across thousands of nodes, so
/// every expression is compiled once and kept for the life of the document.
#[derive(Default)]
pub struct QueryCache {
    compiled: HashMap<String, SequenceQuery>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct expressions compiled so far
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    fn compiled(&mut self, xpath: &str) -> Result<&SequenceQuery, XPathError> {
        if !self.compiled.contains_key(xpath) {
            let queries = Queries::default();
            let query = queries
                .sequence(xpath)
                .map_err(|e| XPathError::Compile(e.to_string()))?;
            self.compiled.insert(xpath.to_string(), query);
        }
        self.compiled
            .get(xpath)
            .ok_or_else(|| XPathError::Compile(xpath.to_string()))
    }

    /// Evaluate `xpath` with `context` as the context item
    pub fn items(
        &mut self,
        documents: &mut Documents,
        xpath: &str,
        context: Node,
    ) -> Result<Vec<QueryItem>, XPathError> {
        let query = self.compiled(xpath)?;
        let results = query
            .execute(documents, context)
            .map_err(|e: xee_xpath::error::Error| XPathError::Execute(e.to_string()))?;

        let mut items = Vec::new();
        for item in results.iter() {
            match item {
                xee_xpath::Item::Node(node) => items.push(QueryItem::Node(node)),
                xee_xpath::Item::Atomic(atomic) => {
                    items.push(QueryItem::Atomic(atomic.to_string().unwrap_or_default()));
                }
                xee_xpath::Item::Function(_) => {}
            }
        }
        Ok(items)
    }

    /// Evaluate `xpath` and keep only node results, in document order
    pub fn nodes(
        &mut self,
        documents: &mut Documents,
        xpath: &str,
        context: Node,
    ) -> Result<Vec<Node>, XPathError> {
        Ok(self
            .items(documents, xpath, context)?
            .into_iter()
            .filter_map(|item| match item {
                QueryItem::Node(node) => Some(node),
                QueryItem::Atomic(_) => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_check() {
        assert!(compile_check("//p[@class = 'lead']").is_ok());
        assert!(compile_check("//p[").is_err());
    }

    #[test]
    fn test_query_nodes_and_cache_reuse() {
        let mut documents = Documents::new();
        let doc = documents
            .add_string(
                "file:///query".try_into().unwrap(),
                "<root><item>a</item><item>b</item></root>",
            )
            .unwrap();
        let doc_node = documents.document_node(doc).unwrap();

        let mut cache = QueryCache::new();
        let first = cache.nodes(&mut documents, "//item", doc_node).unwrap();
        let second = cache.nodes(&mut documents, "//item", doc_node).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_atomic_results() {
        let mut documents = Documents::new();
        let doc = documents
            .add_string("file:///query".try_into().unwrap(), "<root><n>4</n></root>")
            .unwrap();
        let doc_node = documents.document_node(doc).unwrap();

        let mut cache = QueryCache::new();
        let items = cache.items(&mut documents, "string(//n)", doc_node).unwrap();
        assert_eq!(items, vec![QueryItem::Atomic("4".to_string())]);
    }
}
