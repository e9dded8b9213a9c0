//! CLI argument parsing using clap

use std::path::PathBuf;

use clap::Parser;

/// Convert HTML pages into structured articles using declarative rule-sets
#[derive(Parser, Debug)]
#[command(name = "transmark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Convert a page with the built-in rule-set
    transmark story.html

    # Convert a whole site with custom rules, four workers
    transmark "site/**/*.html" -r rules.json -c 4 -o json

    # Inspect the produced tree
    curl -s https://example.com/story | transmark -o pretty

    # CI: fail when the rule-set leaves anything unhandled
    transmark "pages/*.html" -r rules.yaml -o warnings --strict

LOGGING:
    Set TRANSMARK_LOG (e.g. TRANSMARK_LOG=transmark_core=debug) to see which
    rule handled which node.
"#)]
pub struct Args {
    /// Files to convert (supports glob patterns like "site/**/*.html")
    #[arg()]
    pub files: Vec<String>,

    /// Rule-set file (JSON, or YAML for .yml/.yaml); the built-in rules otherwise
    #[arg(short = 'r', long = "rules")]
    pub rules: Option<PathBuf>,

    /// Rule-set format, overriding the file extension: json, yaml
    #[arg(long = "format")]
    pub format: Option<String>,

    /// Output format: html (default), body, pretty, json, warnings
    #[arg(short = 'o', long = "output", default_value = "html")]
    pub output: String,

    /// Input encoding label (e.g. utf-8, windows-1252)
    #[arg(long = "encoding")]
    pub encoding: Option<String>,

    /// Also report problems found by validating the finished article
    #[arg(long = "validate")]
    pub validate: bool,

    /// Exit with status 2 when any warning was produced
    #[arg(long = "strict")]
    pub strict: bool,

    /// Limit pretty output to N levels
    #[arg(short = 'd', long = "depth")]
    pub depth: Option<usize>,

    /// Color output: auto (default), always, never
    #[arg(long = "color", default_value = "auto")]
    pub color: String,

    /// Disable color output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Number of parallel workers
    #[arg(short = 'c', long = "concurrency")]
    pub concurrency: Option<usize>,

    /// List the built-in rule classes and exit
    #[arg(long = "list-classes")]
    pub list_classes: bool,

    /// Show debug logging
    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}
