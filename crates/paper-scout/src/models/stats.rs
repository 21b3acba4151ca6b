//! Run statistics returned with every report.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SearchWindow, Source};

/// Outcome of one source for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Queried and returned (possibly zero) records.
    Queried,
    /// Not part of the source-set, or no usable query for it.
    Skipped,
    /// Query raised a transport or parse error.
    Failed,
    /// Query exceeded its time bound.
    TimedOut,
}

/// Per-source breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    /// Which source.
    pub source: Source,
    /// What happened.
    pub status: SourceStatus,
    /// Records read back from the source's artifact.
    pub raw_count: usize,
}

/// Counters for each identifier resolution stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStats {
    /// Identifier already present.
    pub existing: usize,
    /// Identifier extracted from a known URL template.
    pub url_extracted: usize,
    /// Identifier found by remote registry lookup.
    pub registry: usize,
    /// No identifier, existing landing page kept.
    pub landing_page: usize,
    /// No identifier, search link constructed.
    pub fallback: usize,
    /// Registry lookups that came back empty or failed.
    pub lookup_misses: usize,
    /// Registry lookups cut off by the timeout.
    pub lookup_timeouts: usize,
}

impl ResolutionStats {
    /// Records that ended up with a canonical identifier.
    #[must_use]
    pub const fn resolved(&self) -> usize {
        self.existing + self.url_extracted + self.registry
    }

    /// Records that only have a non-canonical link.
    #[must_use]
    pub const fn unresolved(&self) -> usize {
        self.landing_page + self.fallback
    }
}

/// Counters for the relevance filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeStats {
    /// Clear acceptances.
    pub accepted: usize,
    /// Clear rejections.
    pub rejected: usize,
    /// Answers matching neither token set (or both).
    pub ambiguous: usize,
    /// Calls that errored or timed out.
    pub failed: usize,
    /// Records left unjudged because the run deadline passed.
    pub unjudged: usize,
}

impl JudgeStats {
    /// Number of judge calls made.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.accepted + self.rejected + self.ambiguous + self.failed
    }
}

/// Statistics for one interest-group run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Run identifier (also on the tracing span).
    pub run_id: Uuid,
    /// Interest group name.
    pub group: String,
    /// Searched date window.
    pub window: SearchWindow,
    /// Records collected from all sources.
    pub raw_count: usize,
    /// Records with a canonical identifier after resolution.
    pub resolved_count: usize,
    /// Records left after deduplication.
    pub deduplicated_count: usize,
    /// Duplicates merged away.
    pub duplicates_removed: usize,
    /// Records in the final list.
    pub filtered_count: usize,
    /// Per-source breakdown.
    pub per_source: Vec<SourceStats>,
    /// Identifier resolution stages.
    pub resolution: ResolutionStats,
    /// Relevance filter outcomes.
    pub judging: JudgeStats,
    /// Whether the relevance filter ran.
    pub filtering_enabled: bool,
    /// Translation and other non-fatal warnings.
    pub warnings: Vec<String>,
    /// Run stopped early on the time budget.
    pub truncated: bool,
}

impl RunStats {
    /// Fresh statistics for a run.
    #[must_use]
    pub fn new(group: impl Into<String>, window: SearchWindow) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            group: group.into(),
            window,
            raw_count: 0,
            resolved_count: 0,
            deduplicated_count: 0,
            duplicates_removed: 0,
            filtered_count: 0,
            per_source: Vec::new(),
            resolution: ResolutionStats::default(),
            judging: JudgeStats::default(),
            filtering_enabled: false,
            warnings: Vec::new(),
            truncated: false,
        }
    }

    /// Raw count for a source; zero when it was never queried.
    #[must_use]
    pub fn raw_count_for(&self, source: Source) -> usize {
        self.source_stats(source).map_or(0, |s| s.raw_count)
    }

    /// Status for a source, if it appears in this run.
    #[must_use]
    pub fn status_for(&self, source: Source) -> Option<SourceStatus> {
        self.source_stats(source).map(|s| s.status)
    }

    fn source_stats(&self, source: Source) -> Option<&SourceStats> {
        self.per_source.iter().find(|s| s.source == source)
    }
}
