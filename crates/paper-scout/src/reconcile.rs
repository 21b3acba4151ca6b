//! Cross-source deduplication.
//!
//! Records are keyed by identifier when both copies carry one, otherwise by
//! normalized title. The first-seen copy (in source priority order) survives
//! and absorbs the duplicates' keywords and missing links.

use serde::Serialize;

use crate::models::{PaperRecord, Source};

/// Records returned by one source.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    /// Source of every record in the batch.
    pub source: Source,
    /// Records in source order.
    pub records: Vec<PaperRecord>,
}

impl SourceBatch {
    /// Create a batch.
    #[must_use]
    pub const fn new(source: Source, records: Vec<PaperRecord>) -> Self {
        Self { source, records }
    }
}

/// Result of [`merge`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeOutcome {
    /// Surviving records in first-seen order.
    pub records: Vec<PaperRecord>,
    /// Records folded into an earlier copy.
    pub duplicates_removed: usize,
}

/// Lowercase, drop punctuation and collapse whitespace.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_lowercase().next().unwrap_or(c) } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identifiers compare case-insensitively.
#[must_use]
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_ascii_lowercase()
}

/// Deduplicate records across batches.
///
/// Batches are visited in `priority` order; sources missing from `priority`
/// follow in their input order. Deterministic and idempotent.
#[must_use]
pub fn merge(mut batches: Vec<SourceBatch>, priority: &[Source]) -> MergeOutcome {
    let rank = |source: Source| priority.iter().position(|p| *p == source).unwrap_or(priority.len());
    batches.sort_by_key(|b| rank(b.source));

    let mut outcome = MergeOutcome::default();
    for record in batches.into_iter().flat_map(|b| b.records) {
        match find_match(&mut outcome.records, &record) {
            Some(kept) => {
                absorb(kept, record);
                outcome.duplicates_removed += 1;
            }
            None => outcome.records.push(record),
        }
    }
    outcome
}

/// An identifier match anywhere beats an earlier title match.
fn find_match<'a>(kept: &'a mut [PaperRecord], record: &PaperRecord) -> Option<&'a mut PaperRecord> {
    let by_identifier = record.identifier.as_deref().map(normalize_identifier).and_then(|id| {
        kept.iter().position(|k| k.identifier.as_deref().is_some_and(|x| normalize_identifier(x) == id))
    });
    let index = by_identifier.or_else(|| kept.iter().position(|k| same_paper(k, record)))?;
    kept.get_mut(index)
}

fn same_paper(a: &PaperRecord, b: &PaperRecord) -> bool {
    match (a.identifier.as_deref(), b.identifier.as_deref()) {
        (Some(x), Some(y)) => normalize_identifier(x) == normalize_identifier(y),
        _ => {
            let title = normalize_title(&a.title);
            !title.is_empty() && title == normalize_title(&b.title)
        }
    }
}

fn absorb(kept: &mut PaperRecord, dup: PaperRecord) {
    for keyword in dup.keywords {
        if !kept.keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            kept.keywords.push(keyword);
        }
    }
    if kept.identifier.is_none() && dup.identifier.is_some() {
        kept.identifier = dup.identifier;
        if dup.url.is_some() {
            kept.url = dup.url;
        }
    } else if !kept.has_url() && dup.url.is_some() {
        kept.url = dup.url;
    }
    for source in std::iter::once(dup.source).chain(dup.also_found_in) {
        if source != kept.source && !kept.also_found_in.contains(&source) {
            kept.also_found_in.push(source);
        }
    }
}
