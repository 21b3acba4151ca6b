//! Paper Scout - Entry Point
//!
//! Runs every configured interest group once and prints a Markdown digest.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use paper_scout::{
    Config, Pipeline,
    config::SinkToggles,
    formatters::{format_papers_markdown, format_stats_markdown, handoff_document},
};

#[derive(Parser, Debug)]
#[command(name = "paper-scout")]
#[command(about = "Find new papers on PubMed, arXiv and bioRxiv for each interest group")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short, default_value = "paper-scout.json", env = "PAPER_SCOUT_CONFIG")]
    config: PathBuf,

    /// Search the last N days (overrides the config file)
    #[arg(long, conflicts_with = "since")]
    since_days: Option<u32>,

    /// First day of the window, YYYY-MM-DD
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Last day of the window, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    until: Option<NaiveDate>,

    /// Search and filter as usual, print the digest, but never hand off to sinks
    #[arg(long)]
    dry_run: bool,

    /// Validate the configuration and print the translated queries without searching
    #[arg(long)]
    show_queries: bool,

    /// Write the sink hand-off document here (ignored with --dry-run)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the digest.
    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %cli.config.display(), "Starting paper scout");

    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(days) = cli.since_days {
        config.since_days = Some(days);
        config.since = None;
    }
    if cli.since.is_some() {
        config.since = cli.since;
    }
    if cli.until.is_some() {
        config.until = cli.until;
    }

    let window = config.window(Local::now().date_naive())?;
    let pipeline = Pipeline::new(config)?;

    if cli.show_queries {
        print_plans(&pipeline);
        return Ok(());
    }

    let reports = pipeline.run(window).await;

    for report in &reports {
        println!("{}", format_papers_markdown(&report.stats.group, &report.papers));
        println!("{}", format_stats_markdown(&report.stats));
    }

    let sinks = &pipeline.config().sinks;
    if cli.dry_run {
        tracing::info!("dry run, sinks not invoked");
    }
    if let Some(path) = handoff_target(cli.output, cli.dry_run, sinks, pipeline.store().root()) {
        let doc = handoff_document(&reports, sinks, Utc::now());
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.with_context(|| format!("creating {}", dir.display()))?;
        }
        tokio::fs::write(&path, serde_json::to_vec_pretty(&doc)?)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote hand-off document");
    }

    Ok(())
}

/// Where the hand-off document goes, if anywhere.
///
/// A dry run never writes it. Otherwise an explicit path wins, and the work
/// directory is used only when some sink asks for publishing.
fn handoff_target(output: Option<PathBuf>, dry_run: bool, sinks: &SinkToggles, work_dir: &Path) -> Option<PathBuf> {
    if dry_run {
        return None;
    }
    output.or_else(|| sinks.publishing_requested().then(|| work_dir.join("handoff.json")))
}

fn print_plans(pipeline: &Pipeline) {
    let policy = pipeline.config().degradation;
    for plan in pipeline.plans() {
        println!("# {}", plan.name);
        for &source in &plan.sources {
            let Some(expr) = plan.expression_for(source) else {
                continue;
            };
            let query = paper_scout::query::translate(expr, source, policy);
            println!("- {source}: {}", if query.is_empty() { "(skipped)" } else { query.text.as_str() });
            for warning in &query.warnings {
                println!("  - warning: {warning}");
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack_enabled() -> SinkToggles {
        SinkToggles { slack: Some(serde_json::json!({"channel": "#papers"})), ..SinkToggles::default() }
    }

    #[test]
    fn test_dry_run_never_hands_off() {
        let work_dir = Path::new("work");
        assert_eq!(handoff_target(Some(PathBuf::from("out.json")), true, &slack_enabled(), work_dir), None);
        assert_eq!(handoff_target(None, true, &slack_enabled(), work_dir), None);
    }

    #[test]
    fn test_handoff_target_selection() {
        let work_dir = Path::new("work");
        assert_eq!(
            handoff_target(Some(PathBuf::from("out.json")), false, &SinkToggles::default(), work_dir),
            Some(PathBuf::from("out.json"))
        );
        assert_eq!(
            handoff_target(None, false, &slack_enabled(), work_dir),
            Some(PathBuf::from("work/handoff.json"))
        );
        assert_eq!(handoff_target(None, false, &SinkToggles::default(), work_dir), None);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["paper-scout", "--dry-run", "-o", "out.json"]).unwrap();
        assert!(cli.dry_run);
        assert!(!cli.show_queries);
        assert!(Cli::try_parse_from(["paper-scout", "--since-days", "2", "--since", "2024-10-01"]).is_err());
    }
}
