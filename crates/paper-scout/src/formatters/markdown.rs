//! Markdown output formatting.

use std::borrow::Cow;

use crate::models::{PaperRecord, RunStats, SourceStatus};

const ABSTRACT_PREVIEW: usize = 300;

/// Format a group's papers as Markdown.
#[must_use]
pub fn format_papers_markdown(group: &str, papers: &[PaperRecord]) -> String {
    if papers.is_empty() {
        return format!("# {group}\n\nNo new papers.\n");
    }

    let mut output = format!("# {group} ({} papers)\n\n", papers.len());

    for (i, paper) in papers.iter().enumerate() {
        output.push_str(&format_paper_markdown(paper, i + 1));
        output.push_str("\n---\n\n");
    }

    output
}

/// Format a single paper as Markdown.
#[must_use]
pub fn format_paper_markdown(paper: &PaperRecord, index: usize) -> String {
    let mut output = String::new();

    let title = match &paper.url {
        Some(url) => format!("[{}]({url})", paper.title),
        None => paper.title.clone(),
    };
    output.push_str(&format!("## {index}. {title}\n\n"));

    let mut meta = vec![
        format!("**Date**: {}", paper.published_date),
        format!("**Source**: {}", paper.source),
    ];
    if paper.is_preprint() {
        meta.push("**Preprint**".to_string());
    }
    if let Some(journal) = paper.metadata_str("journal") {
        meta.push(format!("**Journal**: {journal}"));
    }
    output.push_str(&format!("{}\n\n", meta.join(" | ")));

    if let Some(doi) = &paper.identifier {
        output.push_str(&format!("**DOI**: [{doi}](https://doi.org/{doi})\n\n"));
    }

    if !paper.keywords.is_empty() {
        output.push_str(&format!("**Keywords**: {}\n\n", paper.keywords.join(", ")));
    }

    if !paper.also_found_in.is_empty() {
        let others: Vec<String> = paper.also_found_in.iter().map(ToString::to_string).collect();
        output.push_str(&format!("**Also in**: {}\n\n", others.join(", ")));
    }

    if let Some(abs) = paper.metadata_str("abstract") {
        output.push_str(&format!("**Abstract**: {}\n", preview(abs)));
    }

    output
}

/// Format run statistics as a Markdown summary.
#[must_use]
pub fn format_stats_markdown(stats: &RunStats) -> String {
    let mut output = format!(
        "## Run summary: {} ({} to {})\n\n",
        stats.group, stats.window.since, stats.window.until
    );

    output.push_str("| Source | Status | Records |\n|---|---|---|\n");
    for source in &stats.per_source {
        let status = match source.status {
            SourceStatus::Queried => "queried",
            SourceStatus::Skipped => "skipped",
            SourceStatus::Failed => "failed",
            SourceStatus::TimedOut => "timed out",
        };
        output.push_str(&format!("| {} | {status} | {} |\n", source.source, source.raw_count));
    }
    output.push('\n');

    output.push_str(&format!(
        "**Raw**: {} | **Resolved**: {} | **After dedup**: {} | **Final**: {}\n\n",
        stats.raw_count, stats.resolved_count, stats.deduplicated_count, stats.filtered_count
    ));

    if stats.filtering_enabled {
        let j = &stats.judging;
        output.push_str(&format!(
            "**Judge**: {} accepted, {} rejected, {} ambiguous, {} failed",
            j.accepted, j.rejected, j.ambiguous, j.failed
        ));
        if j.unjudged > 0 {
            output.push_str(&format!(", {} unjudged", j.unjudged));
        }
        output.push_str("\n\n");
    }

    if stats.truncated {
        output.push_str("> Run stopped early: time budget exhausted.\n\n");
    }

    if !stats.warnings.is_empty() {
        output.push_str("**Warnings**:\n\n");
        for warning in &stats.warnings {
            output.push_str(&format!("- {warning}\n"));
        }
    }

    output
}

fn preview(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(ABSTRACT_PREVIEW) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}
