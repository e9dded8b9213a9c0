//! XPath 3.1 query engine using xee-xpath
//!
//! Selectors that don't fit a fast path, and `xpath` getters, are evaluated
//! here against the source document held in xee's `Documents`.

mod engine;

pub use engine::{compile_check, QueryCache, QueryItem};

use thiserror::Error;

/// Errors that can occur during XPath evaluation
#[derive(Error, Debug)]
pub enum XPathError {
    #[error("Failed to compile XPath: {0}")]
    Compile(String),
    #[error("Failed to execute XPath: {0}")]
    Execute(String),
}
