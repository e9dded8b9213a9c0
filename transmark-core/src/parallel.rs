//! Parallel file processing using Rayon
//!
//! Rule-sets are shared; every file gets its own transformer, source
//! document and article, so runs never see each other's state.

use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;

use crate::article::InstantArticle;
use crate::rule::RuleSet;
use crate::source::{ParseError, SourceDocument};
use crate::transformer::{TransformError, Transformer};
use crate::warnings::TransformerWarning;

const HTML_EXTENSIONS: &[&str] = &["html", "htm", "xhtml"];

/// Why a single file could not be converted
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// A converted article plus everything reported while building it
pub struct Conversion {
    pub article: InstantArticle,
    pub warnings: Vec<TransformerWarning>,
}

/// Transform already-loaded markup with a fresh transformer.
///
/// With `validate`, the article's own validation warnings are appended
/// after the transformer's.
pub fn convert_markup(
    markup: &[u8],
    rule_set: &RuleSet,
    encoding: Option<&str>,
    validate: bool,
) -> Result<Conversion, FileError> {
    let mut source = SourceDocument::parse_bytes(markup, encoding)?;
    let mut transformer = Transformer::with_rule_set(rule_set);
    let mut article = InstantArticle::new();

    let context = article.root();
    let root = source.root();
    transformer.transform(&mut article, context, &mut source, root)?;

    let mut warnings = transformer.take_warnings();
    if validate {
        warnings.extend(article.validate());
    }
    Ok(Conversion { article, warnings })
}

/// Read and transform one file
pub fn convert_file(
    path: &Path,
    rule_set: &RuleSet,
    encoding: Option<&str>,
    validate: bool,
) -> Result<Conversion, FileError> {
    let markup = std::fs::read(path).map_err(|source| FileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    convert_markup(&markup, rule_set, encoding, validate)
}

/// Outcome for one input file, rendered on the worker thread
#[derive(Debug)]
pub struct FileOutcome {
    pub path: String,
    pub result: Result<RenderedArticle, FileError>,
}

#[derive(Debug, Clone)]
pub struct RenderedArticle {
    pub output: String,
    pub warnings: Vec<TransformerWarning>,
}

/// Options shared by every file of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Encoding label for decoding input (UTF-8 when `None`)
    pub encoding: Option<String>,
    /// Also report the article's own validation warnings
    pub validate: bool,
    /// Worker threads; Rayon's default when `None`
    pub concurrency: Option<usize>,
}

/// Convert files in parallel, rendering each article with `render`.
///
/// Outcomes come back in input order.
pub fn transform_files_parallel<P, F>(
    files: &[P],
    rule_set: &RuleSet,
    options: &BatchOptions,
    render: F,
) -> Vec<FileOutcome>
where
    P: AsRef<Path> + Sync,
    F: Fn(&InstantArticle) -> String + Sync,
{
    let run = || {
        files
            .par_iter()
            .map(|path| {
                let path = path.as_ref();
                tracing::debug!(path = %path.display(), "converting");
                let result = convert_file(path, rule_set, options.encoding.as_deref(), options.validate)
                    .map(|conversion| RenderedArticle {
                        output: render(&conversion.article),
                        warnings: conversion.warnings,
                    });
                FileOutcome {
                    path: path.display().to_string(),
                    result,
                }
            })
            .collect::<Vec<FileOutcome>>()
    };

    let pool = options.concurrency.and_then(|threads| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| tracing::debug!(error = %e, "falling back to the global thread pool"))
            .ok()
    });
    match pool {
        Some(pool) => pool.install(run),
        None => run(),
    }
}

/// Expand glob patterns to file paths
pub fn expand_globs(patterns: &[String]) -> Vec<String> {
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            match glob::glob(pattern) {
                Ok(paths) => {
                    for entry in paths.flatten() {
                        if entry.is_file() {
                            if let Some(path) = entry.to_str() {
                                files.push(path.to_string());
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "invalid glob pattern");
                }
            }
        } else {
            files.push(pattern.clone());
        }
    }

    files
}

/// Keep files with an HTML extension
pub fn filter_html_files(files: Vec<String>) -> Vec<String> {
    files
        .into_iter()
        .filter(|file| {
            Path::new(file)
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| {
                    HTML_EXTENSIONS.iter().any(|html| ext.eq_ignore_ascii_case(html))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_set() -> RuleSet {
        RuleSet::from_json(
            r#"{"rules": [
                {"class": "TextNodeRule"},
                {"class": "ParagraphRule", "selector": "p"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_expand_globs_non_glob() {
        let patterns = vec!["page.html".to_string()];
        assert_eq!(expand_globs(&patterns), vec!["page.html"]);
    }

    #[test]
    fn test_expand_globs_matches_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.html"), "<p>a</p>").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::create_dir(dir.path().join("c.html")).unwrap();

        let pattern = format!("{}/*.html", dir.path().display());
        let files = expand_globs(&[pattern]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.html"));
    }

    #[test]
    fn test_filter_html_files() {
        let files = vec![
            "index.html".to_string(),
            "legacy.HTM".to_string(),
            "feed.xhtml".to_string(),
            "style.css".to_string(),
            "README".to_string(),
        ];
        assert_eq!(filter_html_files(files), vec!["index.html", "legacy.HTM", "feed.xhtml"]);
    }

    #[test]
    fn test_parallel_outcomes_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..8 {
            let path = dir.path().join(format!("{i}.html"));
            std::fs::write(&path, format!("<p>article {i}</p><iframe></iframe>")).unwrap();
            paths.push(path);
        }
        paths.push(dir.path().join("missing.html"));

        let options = BatchOptions {
            concurrency: Some(2),
            ..BatchOptions::default()
        };
        let outcomes = transform_files_parallel(&paths, &rule_set(), &options, |article| article.render_body());

        assert_eq!(outcomes.len(), 9);
        for (i, outcome) in outcomes.iter().take(8).enumerate() {
            let rendered = outcome.result.as_ref().unwrap();
            assert_eq!(rendered.output, format!("<p>article {i}</p>"));
            assert_eq!(rendered.warnings.len(), 1);
        }
        assert!(matches!(outcomes[8].result, Err(FileError::Io { .. })));
    }

    #[test]
    fn test_convert_markup_with_validation() {
        let conversion = convert_markup(b"<p>text</p>", &rule_set(), None, true).unwrap();
        let kinds: Vec<&str> = conversion.warnings.iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, ["invalid_element"]);

        let latin1 = b"<p>caf\xe9</p>";
        let conversion = convert_markup(latin1, &rule_set(), Some("latin1"), false).unwrap();
        assert_eq!(conversion.article.render_body(), "<p>café</p>");

        assert!(matches!(
            convert_markup(b"<p></p>", &rule_set(), Some("no-such-charset"), false),
            Err(FileError::Parse(ParseError::UnknownEncoding(_)))
        ));
    }
}
