//! transmark - rule-driven HTML to article converter
//!
//! CLI entry point: loads a rule-set, converts the given pages in parallel
//! and prints the articles and the warnings collected for each.

mod cli;

use std::io::{self, Read, Write};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde::Serialize;
use transmark_core::{
    convert_markup, expand_globs, filter_html_files, transform_files_parallel, BatchOptions,
    InstantArticle, RenderOptions, RuleRegistry, RuleSet, TransformerWarning,
};

use cli::Args;

/// What to print for each converted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Body,
    Pretty,
    Json,
    Warnings,
}

impl OutputFormat {
    const VALID: &'static [&'static str] = &["html", "body", "pretty", "json", "warnings"];

    fn parse(name: &str) -> Option<Self> {
        match name {
            "html" => Some(OutputFormat::Html),
            "body" => Some(OutputFormat::Body),
            "pretty" => Some(OutputFormat::Pretty),
            "json" => Some(OutputFormat::Json),
            "warnings" => Some(OutputFormat::Warnings),
            _ => None,
        }
    }
}

/// One line of `-o json` output
#[derive(Serialize)]
struct JsonRecord<'a> {
    file: &'a str,
    article: &'a str,
    warnings: &'a [TransformerWarning],
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.quiet, args.verbose) {
        eprintln!("warning: {e}");
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TRANSMARK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn should_use_color(args: &Args) -> bool {
    if args.no_color {
        return false;
    }
    match args.color.as_str() {
        "always" => true,
        "never" => false,
        _ => atty::is(atty::Stream::Stdout),
    }
}

fn load_rule_set(args: &Args) -> anyhow::Result<RuleSet> {
    let Some(path) = &args.rules else {
        return RuleSet::default_rules().context("built-in rule-set is invalid");
    };

    let rule_set = match args.format.as_deref() {
        None => RuleSet::from_path(path),
        Some(format) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match format {
                "json" => RuleSet::from_json(&text),
                "yaml" | "yml" => RuleSet::from_yaml(&text),
                other => bail!("invalid rule-set format '{other}'. Valid formats: json, yaml"),
            }
        }
    };
    let rule_set = rule_set.with_context(|| format!("failed to load rules from {}", path.display()))?;
    tracing::debug!(rules = rule_set.len(), path = %path.display(), "loaded rule-set");
    Ok(rule_set)
}

fn render(article: &InstantArticle, format: OutputFormat, options: &RenderOptions) -> String {
    match format {
        OutputFormat::Html => article.render(),
        OutputFormat::Body | OutputFormat::Json => article.render_body(),
        OutputFormat::Pretty => article.render_pretty(options),
        OutputFormat::Warnings => String::new(),
    }
}

/// Print one converted page. Returns the number of warnings.
fn emit(
    out: &mut impl Write,
    label: &str,
    output: &str,
    warnings: &[TransformerWarning],
    format: OutputFormat,
    show_label: bool,
) -> anyhow::Result<usize> {
    match format {
        OutputFormat::Json => {
            let record = JsonRecord {
                file: label,
                article: output,
                warnings,
            };
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        }
        OutputFormat::Warnings => {
            for warning in warnings {
                writeln!(out, "{label}: {}: {warning}", warning.kind())?;
            }
        }
        OutputFormat::Html | OutputFormat::Body | OutputFormat::Pretty => {
            if show_label {
                writeln!(out, "<!-- {label} -->")?;
            }
            writeln!(out, "{output}")?;
            for warning in warnings {
                eprintln!("warning: {label}: {warning}");
            }
        }
    }
    Ok(warnings.len())
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    if args.list_classes {
        for class in RuleRegistry::builtin().class_names() {
            println!("{class}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let format = OutputFormat::parse(&args.output).ok_or_else(|| {
        anyhow!(
            "invalid output format '{}'. Valid formats: {}",
            args.output,
            OutputFormat::VALID.join(", ")
        )
    })?;
    let render_options = RenderOptions::new()
        .with_color(should_use_color(&args))
        .with_max_depth(args.depth);
    let rule_set = load_rule_set(&args)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.files.is_empty() {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("Usage: transmark <files...> [OPTIONS]");
            eprintln!("   or: cat page.html | transmark [OPTIONS]");
            eprintln!("\nUse --help for more information.");
            return Ok(ExitCode::FAILURE);
        }

        let mut markup = Vec::new();
        io::stdin()
            .read_to_end(&mut markup)
            .context("failed to read stdin")?;
        let conversion = convert_markup(&markup, &rule_set, args.encoding.as_deref(), args.validate)?;
        let output = render(&conversion.article, format, &render_options);
        let warnings = emit(&mut out, "<stdin>", &output, &conversion.warnings, format, false)?;
        return Ok(ExitCode::from(exit_status(0, warnings, args.strict)));
    }

    let files = filter_html_files(expand_globs(&args.files));
    if files.is_empty() {
        bail!("no HTML files matched {}", args.files.join(" "));
    }

    let options = BatchOptions {
        encoding: args.encoding.clone(),
        validate: args.validate,
        concurrency: Some(args.concurrency.unwrap_or_else(num_cpus::get)),
    };
    let outcomes = transform_files_parallel(&files, &rule_set, &options, |article| {
        render(article, format, &render_options)
    });

    let show_label = files.len() > 1;
    let mut failures = 0;
    let mut warnings = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(rendered) => {
                warnings += emit(&mut out, &outcome.path, &rendered.output, &rendered.warnings, format, show_label)?;
            }
            Err(e) => {
                eprintln!("error: {}: {e}", outcome.path);
                failures += 1;
            }
        }
    }
    out.flush()?;

    tracing::debug!(files = outcomes.len(), failures, warnings, "done");
    Ok(ExitCode::from(exit_status(failures, warnings, args.strict)))
}

/// 1 when any file failed, 2 for warnings under `--strict`
fn exit_status(failures: usize, warnings: usize, strict: bool) -> u8 {
    if failures > 0 {
        1
    } else if strict && warnings > 0 {
        2
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_formats() {
        for name in OutputFormat::VALID {
            assert!(OutputFormat::parse(name).is_some(), "{name}");
        }
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_emit_json_record() {
        let warnings = vec![TransformerWarning::UnrecognizedNode {
            context: "InstantArticle".into(),
            node: "<iframe>".into(),
        }];
        let mut buffer = Vec::new();
        let count = emit(&mut buffer, "a.html", "<p>x</p>", &warnings, OutputFormat::Json, false).unwrap();
        assert_eq!(count, 1);

        let line = String::from_utf8(buffer).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["file"], "a.html");
        assert_eq!(value["article"], "<p>x</p>");
        assert_eq!(value["warnings"][0]["kind"], "unrecognized_node");
    }

    #[test]
    fn test_emit_warnings_lines() {
        let warnings = vec![TransformerWarning::InvalidElement {
            element: "Image".into(),
            reason: "missing image URL".into(),
        }];
        let mut buffer = Vec::new();
        emit(&mut buffer, "a.html", "", &warnings, OutputFormat::Warnings, false).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "a.html: invalid_element: invalid Image: missing image URL\n"
        );
    }

    #[test]
    fn test_rule_set_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        std::fs::write(&path, "rules:\n  - class: TextNodeRule\n  - class: ParagraphRule\n    selector: p\n").unwrap();

        let args = Args::parse_from(["transmark", "-r", path.to_str().unwrap()]);
        assert_eq!(load_rule_set(&args).unwrap().len(), 2);

        let args = Args::parse_from(["transmark", "-r", path.to_str().unwrap(), "--format", "json"]);
        assert!(load_rule_set(&args).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_status(0, 3, false), 0);
        assert_eq!(exit_status(0, 3, true), 2);
        assert_eq!(exit_status(1, 3, true), 1);
    }
}
