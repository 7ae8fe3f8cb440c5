mod cli;
mod reporting;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, SortArgs};
use imgsort_core::{
    collect_candidates, count_entries, normalize_extension, prepend_to_captions, progress,
    write_json, FolderSorter, LabelClassifier, ProgressBarSink, SorterConfig,
};
use indicatif::ProgressBar;
use std::io;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Sort(args) => run_sort(args),
        Command::Count {
            root,
            companion_extension,
        } => run_count(&root, &companion_extension),
        Command::PrefixCaptions {
            root,
            text,
            extension,
        } => run_prefix_captions(&root, &text, &extension),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn run_sort(args: SortArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SorterConfig::load(path)?,
        None => SorterConfig::load_or_default(),
    };
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.no_companion {
        config.companion_extension = None;
    } else if let Some(extension) = args.companion_extension {
        config.companion_extension = Some(extension);
    }

    tracing::debug!(?config, "effective configuration");
    let sorter = FolderSorter::from_config(&config).context("invalid configuration")?;
    let classifier = build_classifier(&config)?;

    let total = collect_candidates(&args.root, sorter.companion_extension())?.len();
    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(progress::default_style());
    let sink = ProgressBarSink::new(progress_bar);

    let report = sorter.sort(&args.root, classifier.as_ref(), &sink)?;
    reporting::print_summary(&report)?;

    if let Some(path) = &args.report {
        write_json(&report, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("JSON report written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_classifier(config: &SorterConfig) -> Result<Box<dyn LabelClassifier>> {
    let classifier = imgsort_core::OnnxClassifier::from_config(&config.model)
        .context("failed to load the classification model")?;
    Ok(Box::new(classifier))
}

#[cfg(not(feature = "onnx"))]
fn build_classifier(_config: &SorterConfig) -> Result<Box<dyn LabelClassifier>> {
    anyhow::bail!("imgsort was built without the `onnx` feature; no classifier is available")
}

fn run_count(root: &Path, companion_extension: &str) -> Result<()> {
    let companion_extension =
        normalize_extension(companion_extension).context("invalid --companion-ext")?;
    let entries = count_entries(root);
    let candidates = collect_candidates(root, Some(&companion_extension))?.len();
    reporting::print_count(&mut io::stdout().lock(), root, entries, candidates)?;
    Ok(())
}

fn run_prefix_captions(root: &Path, text: &str, extension: &str) -> Result<()> {
    let report = prepend_to_captions(root, text, extension)?;
    reporting::print_caption_report(&mut io::stdout().lock(), &report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_rejects_malformed_companion_extension() {
        let error = run_count(Path::new("."), "a/b").unwrap_err();
        assert!(error.to_string().contains("--companion-ext"));
    }
}
