//! End-to-end transformation scenarios

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use transmark_core::{
    ConfigError, ElementId, ElementKind, InstantArticle, Rule, RuleSet, Selector, SourceDocument,
    TransformError, Transformer, TransformerWarning,
};
use xot::Node;

fn transformer(rules: &str) -> Transformer {
    let mut transformer = Transformer::new();
    transformer.load_rules(rules).unwrap();
    transformer
}

fn run(transformer: &mut Transformer, markup: &str) -> InstantArticle {
    let mut article = InstantArticle::new();
    let root = article.root();
    transformer.transform_markup_str(&mut article, root, markup).unwrap();
    article
}

const BASIC_RULES: &str = r#"{"rules": [
    {"class": "TextNodeRule"},
    {"class": "ParagraphRule", "selector": "p"},
    {"class": "BoldRule", "selector": "b"}
]}"#;

#[test]
fn paragraph_with_bold() {
    let mut t = transformer(BASIC_RULES);
    let article = run(&mut t, "<p>Hello <b>world</b></p>");
    assert!(t.warnings().is_empty());
    assert_eq!(article.render_body(), "<p>Hello <b>world</b></p>");
}

#[test]
fn unmatched_element_is_reported_once() {
    let mut t = transformer(BASIC_RULES);
    let article = run(&mut t, r#"<iframe src="https://example.com"><p>inside</p></iframe>"#);

    assert_eq!(t.warnings().len(), 1);
    assert!(matches!(
        &t.warnings()[0],
        TransformerWarning::UnrecognizedNode { context, node }
            if context == "InstantArticle" && node == "<iframe>"
    ));
    assert_eq!(article.element_count(), 1);
    assert_eq!(article.render_body(), "");
}

#[test]
fn missing_required_property() {
    let mut t = transformer(
        r#"{"rules": [
            {"class": "ImageRule", "selector": "img",
             "properties": {"image.url": {"type": "string", "attribute": "data-src"}}}
        ]}"#,
    );
    let article = run(&mut t, r#"<img src="a.jpg">"#);

    assert_eq!(t.warnings().len(), 1);
    match &t.warnings()[0] {
        TransformerWarning::MissingProperty { property, rule, context, node } => {
            assert_eq!(property, "image.url");
            assert_eq!(rule, "ImageRule");
            assert_eq!(context, "InstantArticle");
            assert_eq!(node, "<img>");
        }
        other => panic!("unexpected warning {other:?}"),
    }

    let children = article.children(article.root());
    assert_eq!(children.len(), 1);
    assert_eq!(article.kind(children[0]), Some(ElementKind::Image));
    assert!(article.validate().contains(&TransformerWarning::InvalidElement {
        element: "Image".into(),
        reason: "missing image URL".into(),
    }));
}

#[test]
fn last_registered_rule_wins() {
    let mut t = transformer(
        r#"{"rules": [
            {"class": "TextNodeRule"},
            {"class": "ParagraphRule", "selector": "div"},
            {"class": "BlockquoteRule", "selector": "div"}
        ]}"#,
    );
    let article = run(&mut t, "<div>quoted</div>");
    assert_eq!(article.render_body(), "<blockquote>quoted</blockquote>");
}

#[test]
fn capability_and_kind_contexts_share_precedence() {
    // The TextContainer-wide rule is registered last, so it beats the
    // Paragraph-only one even though the latter is more specific
    let mut t = transformer(
        r#"{"rules": [
            {"class": "TextNodeRule"},
            {"class": "ParagraphRule", "selector": "p"},
            {"class": "BoldRule", "selector": "span", "contexts": ["Paragraph"]},
            {"class": "ItalicRule", "selector": "span"}
        ]}"#,
    );
    let article = run(&mut t, "<p><span>x</span></p>");
    assert_eq!(article.render_body(), "<p><i>x</i></p>");
}

/// Passes children through and records every node it was applied to
#[derive(Debug)]
struct CountingRule {
    contexts: Vec<String>,
    applied: AtomicUsize,
    seen: Mutex<HashSet<Node>>,
    duplicates: AtomicUsize,
}

impl CountingRule {
    fn new() -> Self {
        CountingRule {
            contexts: vec!["Element".to_string()],
            applied: AtomicUsize::new(0),
            seen: Mutex::new(HashSet::new()),
            duplicates: AtomicUsize::new(0),
        }
    }
}

impl Rule for CountingRule {
    fn name(&self) -> &str {
        "CountingRule"
    }

    fn context_types(&self) -> &[String] {
        &self.contexts
    }

    fn matches_node(&self, source: &mut SourceDocument, node: Node) -> bool {
        source.is_element(node)
    }

    fn apply(
        &self,
        transformer: &mut Transformer,
        article: &mut InstantArticle,
        context: ElementId,
        source: &mut SourceDocument,
        node: Node,
    ) -> Result<ElementId, TransformError> {
        self.applied.fetch_add(1, Ordering::SeqCst);
        if !self.seen.lock().unwrap().insert(node) {
            self.duplicates.fetch_add(1, Ordering::SeqCst);
        }
        // visit the children twice: the second pass must find them all processed
        transformer.transform(article, context, source, node)?;
        transformer.transform(article, context, source, node)
    }
}

#[test]
fn each_node_is_applied_at_most_once() {
    let counting = Arc::new(CountingRule::new());
    let mut t = Transformer::new();
    t.add_rule(counting.clone());

    run(&mut t, "<div><section><span>a</span><span>b</span></section><em>c</em></div>");

    assert_eq!(counting.applied.load(Ordering::SeqCst), 5);
    assert_eq!(counting.duplicates.load(Ordering::SeqCst), 0);
}

#[test]
fn getter_claimed_nodes_are_skipped() {
    let mut t = transformer(
        r#"{"rules": [
            {"class": "TextNodeRule"},
            {"class": "ParagraphRule", "selector": "p"},
            {"class": "ImageRule", "selector": "figure",
             "properties": {
                "image.url": {"type": "string", "selector": "img", "attribute": "src"},
                "image.caption": {"type": "element", "selector": "p"}
             }}
        ]}"#,
    );
    let article = run(&mut t, r#"<figure><img src="a.jpg"><p>Caption</p></figure>"#);
    assert!(t.warnings().is_empty(), "{:?}", t.warnings());
    assert_eq!(
        article.render_body(),
        r#"<figure><img src="a.jpg"><figcaption>Caption</figcaption></figure>"#
    );
}

#[test]
fn whitespace_and_comments_never_warn() {
    let mut t = transformer(BASIC_RULES);
    run(&mut t, "\n  <!-- lead -->\n  <p>x</p>\n\n  <!-- tail -->\n");
    assert!(t.warnings().is_empty(), "{:?}", t.warnings());
}

#[test]
fn heading_inside_header() {
    let mut t = transformer(
        r#"{"rules": [
            {"class": "TextNodeRule"},
            {"class": "HeaderRule", "selector": "header"},
            {"class": "HeaderTitleRule", "selector": "h1"}
        ]}"#,
    );
    let article = run(&mut t, "<header><h1>Title</h1></header>");
    assert!(t.warnings().is_empty(), "{:?}", t.warnings());
    let header = article.header().unwrap();
    let children = article.children(header);
    assert_eq!(children.len(), 1);
    assert_eq!(article.kind(children[0]), Some(ElementKind::H1));
    assert_eq!(article.text_content(children[0]), "Title");
}

#[test]
fn warnings_resume_after_media_block() {
    let mut t = transformer(
        r#"{"rules": [
            {"class": "TextNodeRule"},
            {"class": "ImageRule", "selector": "figure",
             "properties": {"image.url": {"type": "string", "selector": "img", "attribute": "src"}}}
        ]}"#,
    );
    run(
        &mut t,
        r#"<figure><img src="a.jpg"><figcaption>credit</figcaption></figure><aside>after</aside>"#,
    );
    assert!(!t.is_suppressing_warnings());
    assert_eq!(t.warnings().len(), 1, "{:?}", t.warnings());
    assert!(matches!(
        &t.warnings()[0],
        TransformerWarning::UnrecognizedNode { node, .. } if node == "<aside>"
    ));
}

#[test]
fn media_inside_paragraph_moves_to_top_level() {
    let mut t = transformer(
        r#"{"rules": [
            {"class": "TextNodeRule"},
            {"class": "ParagraphRule", "selector": "p"},
            {"class": "BoldRule", "selector": "b"},
            {"class": "ImageRule", "selector": "img",
             "properties": {"image.url": {"type": "string", "attribute": "src"}}}
        ]}"#,
    );
    let article = run(&mut t, r#"<p>One <b>two</b><img src="x.png"> three</p><p>four</p>"#);
    assert_eq!(
        article.render_body(),
        r#"<p>One <b>two</b></p><figure><img src="x.png"></figure><p> three</p><p>four</p>"#
    );
    assert!(t.warnings().is_empty());
}

#[test]
fn fast_path_agrees_with_generic_matching() {
    let mut source = SourceDocument::parse(
        r#"<div class="x"><p class="foo bar">a</p><p>b</p><img class="foo"><span class="food">c</span></div>"#,
    )
    .unwrap();
    let root = source.root();
    let nodes: Vec<Node> = source.query_nodes("//*", root).unwrap();
    assert!(nodes.len() >= 5);

    for text in ["p", "img", ".foo", "p.foo", "span.food", "div"] {
        let selector = Selector::parse(text).unwrap();
        assert!(selector.fast_path().is_some(), "{text} should use a fast path");
        for &node in &nodes {
            assert_eq!(
                selector.matches(&mut source, node),
                selector.matches_generic(&mut source, node),
                "{text} disagrees on {}",
                source.describe(node)
            );
        }
    }
}

#[test]
fn configuration_errors_surface_at_load_time() {
    let unknown_class = RuleSet::from_json(r#"{"rules": [{"class": "BlinkRule", "selector": "blink"}]}"#);
    assert!(matches!(unknown_class, Err(ConfigError::UnknownRuleClass(_))));

    let bad_selector = RuleSet::from_json(r#"{"rules": [{"class": "ParagraphRule", "selector": "p::before"}]}"#);
    assert!(matches!(bad_selector, Err(ConfigError::InvalidSelector(_))));

    let bad_xpath = RuleSet::from_json(r#"{"rules": [{"class": "ParagraphRule", "selector": "//p[@"}]}"#);
    assert!(matches!(bad_xpath, Err(ConfigError::InvalidSelector(_))));

    let missing_fragment = RuleSet::from_json(
        r#"{"rules": [{"class": "InteractiveRule", "selector": "div",
            "properties": {"interactive.iframe": {"type": "fragment"}}}]}"#,
    );
    assert!(matches!(missing_fragment, Err(ConfigError::MissingKey { .. })));

    let mut t = Transformer::new();
    assert!(t.load_rules("not json").is_err());
    assert!(t.rules().is_empty());
}

#[test]
fn yaml_rule_sets() {
    let mut t = Transformer::new();
    t.load_rules_yaml(
        "rules:\n  - class: TextNodeRule\n  - class: ParagraphRule\n    selector: p\n  - class: ItalicRule\n    selector: em\n",
    )
    .unwrap();
    let article = run(&mut t, "<p>an <em>emphasis</em></p>");
    assert_eq!(article.render_body(), "<p>an <i>emphasis</i></p>");
}

#[test]
fn default_rules_convert_a_full_page() {
    let rules = RuleSet::default_rules().unwrap();
    let mut t = Transformer::with_rule_set(&rules);
    let article = run(
        &mut t,
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <link rel="canonical" href="https://example.com/story">
    <title>Story</title>
    <script>track()</script>
  </head>
  <body>
    <header>
      <h1>Story</h1>
      <time datetime="2023-11-02T08:30:00+01:00">yesterday</time>
    </header>
    <div class="content">
      <p>First <strong>bold</strong> and <a href="/more">a link</a>.</p>
      <figure><img src="photo.jpg"><figcaption>A photo</figcaption></figure>
      <ul><li>one</li><li>two</li></ul>
    </div>
  </body>
</html>"#,
    );

    assert!(t.warnings().is_empty(), "{:?}", t.warnings());
    assert!(article.validate().is_empty(), "{:?}", article.validate());
    assert_eq!(article.canonical_url(), Some("https://example.com/story"));
    assert_eq!(article.generator().map(|(name, _)| name), Some("transmark"));

    let html = article.render();
    assert!(html.contains(r#"<time class="op-published" datetime="2023-11-02T08:30:00+01:00">November 2, 2023</time>"#));
    assert!(html.contains(r#"<p>First <b>bold</b> and <a href="/more">a link</a>.</p>"#));
    assert!(html.contains(r#"<figure><img src="photo.jpg"><figcaption>A photo</figcaption></figure>"#));
    assert!(html.contains("<ul><li>one</li><li>two</li></ul>"));
    assert!(!html.contains("track()"));
}

#[test]
fn rule_sets_are_shared_between_threads() {
    let rules = Arc::new(RuleSet::from_json(BASIC_RULES).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let rules = Arc::clone(&rules);
            std::thread::spawn(move || {
                let mut t = Transformer::with_rule_set(&rules);
                let mut article = InstantArticle::new();
                let root = article.root();
                t.transform_markup_str(&mut article, root, &format!("<p>n{i}</p>"))
                    .unwrap();
                article.render_body()
            })
        })
        .collect();
    let rendered: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(rendered[3], "<p>n3</p>");
}
