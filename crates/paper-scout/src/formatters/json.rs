//! JSON output: compact records and the sink hand-off document.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::config::SinkToggles;
use crate::models::PaperRecord;
use crate::pipeline::RunReport;

/// Create a compact paper representation for the hand-off file.
///
/// Drops the raw source payload, keeping what a sink posts.
#[must_use]
pub fn compact_paper(paper: &PaperRecord) -> Value {
    let mut obj = json!({
        "title": paper.title,
        "date": paper.published_date,
        "source": paper.source,
        "preprint": paper.is_preprint(),
    });

    if let Some(url) = &paper.url {
        obj["url"] = json!(url);
    }

    if let Some(doi) = &paper.identifier {
        obj["doi"] = json!(doi);
    }

    if !paper.keywords.is_empty() {
        obj["keywords"] = json!(paper.keywords);
    }

    if let Some(journal) = paper.metadata_str("journal") {
        obj["journal"] = json!(journal);
    }

    if !paper.also_found_in.is_empty() {
        obj["alsoFoundIn"] = json!(paper.also_found_in);
    }

    obj
}

/// Build the document handed to the publishing sinks.
///
/// Sinks read `groups[].papers`; `stats` travels along for their summaries.
#[must_use]
pub fn handoff_document(reports: &[RunReport], sinks: &SinkToggles, generated_at: DateTime<Utc>) -> Value {
    let groups: Vec<Value> = reports
        .iter()
        .map(|report| {
            json!({
                "group": report.stats.group,
                "papers": report.papers.iter().map(compact_paper).collect::<Vec<_>>(),
                "stats": report.stats,
            })
        })
        .collect();

    json!({
        "generatedAt": generated_at.to_rfc3339(),
        "sinks": sinks,
        "groups": groups,
    })
}
