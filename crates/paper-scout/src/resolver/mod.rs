//! Identifier resolution.
//!
//! Every record leaves with a non-empty URL. Stages, first hit wins:
//!
//! 1. an identifier the record already carries,
//! 2. a DOI embedded in the record's URL,
//! 3. a remote registry lookup (bounded by a timeout, skipped past the deadline),
//! 4. the record's own landing page, or a search link built from its title.

mod doi;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::time::Instant;

pub use doi::{doi_url, extract_doi, is_doi_link, normalize_doi, search_link};

use crate::error::ClientResult;
use crate::models::{PaperRecord, ResolutionStats};

/// Remote DOI registry.
#[async_trait]
pub trait RegistryLookup: Send + Sync + fmt::Debug {
    /// Whether this registry can say anything about `record`.
    fn covers(&self, _record: &PaperRecord) -> bool {
        true
    }

    /// Look up the DOI for `record`. `Ok(None)` means the registry has none.
    async fn lookup(&self, record: &PaperRecord) -> ClientResult<Option<String>>;
}

/// Resolves canonical identifiers for one run.
pub struct IdentifierResolver {
    registry: Option<Arc<dyn RegistryLookup>>,
    lookup_timeout: Duration,
    deadline: Option<Instant>,
    memo: Cache<String, Option<String>>,
}

impl IdentifierResolver {
    /// Create a resolver. Without a registry, stage 3 is skipped.
    #[must_use]
    pub fn new(registry: Option<Arc<dyn RegistryLookup>>, lookup_timeout: Duration) -> Self {
        Self { registry, lookup_timeout, deadline: None, memo: Cache::new(10_000) }
    }

    /// Stop remote lookups once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolve every record, preserving order.
    pub async fn resolve_all(
        &self,
        records: Vec<PaperRecord>,
        stats: &mut ResolutionStats,
    ) -> Vec<PaperRecord> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.resolve(record, stats).await);
        }
        out
    }

    /// Resolve one record. Never fails and never drops the record.
    pub async fn resolve(&self, mut record: PaperRecord, stats: &mut ResolutionStats) -> PaperRecord {
        let existing = record
            .identifier
            .as_deref()
            .and_then(normalize_doi)
            .or_else(|| record.metadata_str("doi").and_then(normalize_doi));
        if let Some(doi) = existing {
            stats.existing += 1;
            return with_doi(record, doi);
        }

        if let Some(doi) = record.url.as_deref().and_then(extract_doi) {
            stats.url_extracted += 1;
            return with_doi(record, doi);
        }

        if let Some(doi) = self.lookup(&record, stats).await {
            stats.registry += 1;
            return with_doi(record, doi);
        }

        record.identifier = None;
        let landing = record
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .filter(|u| !is_doi_link(u))
            .map(str::to_string);
        if let Some(url) = landing {
            stats.landing_page += 1;
            record.url = Some(url);
        } else {
            stats.fallback += 1;
            record.url = Some(search_link(Some(record.source), &record.title));
        }
        record
    }

    async fn lookup(&self, record: &PaperRecord, stats: &mut ResolutionStats) -> Option<String> {
        let registry = self.registry.as_ref().filter(|r| r.covers(record))?;
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::debug!(title = %record.title, "run deadline passed, skipping registry lookup");
            return None;
        }

        let key = memo_key(record);
        if let Some(known) = self.memo.get(&key).await {
            return known;
        }

        match tokio::time::timeout(self.lookup_timeout, registry.lookup(record)).await {
            Ok(Ok(found)) => {
                let found = found.as_deref().and_then(normalize_doi);
                if found.is_none() {
                    stats.lookup_misses += 1;
                }
                self.memo.insert(key, found.clone()).await;
                found
            }
            Ok(Err(e)) => {
                tracing::warn!(title = %record.title, error = %e, "registry lookup failed");
                stats.lookup_misses += 1;
                None
            }
            Err(_) => {
                tracing::warn!(
                    title = %record.title,
                    timeout = ?self.lookup_timeout,
                    "registry lookup timed out"
                );
                stats.lookup_timeouts += 1;
                None
            }
        }
    }
}

impl fmt::Debug for IdentifierResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierResolver")
            .field("registry", &self.registry)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

fn memo_key(record: &PaperRecord) -> String {
    record.pmid().map_or_else(
        || format!("title:{}", crate::reconcile::normalize_title(&record.title)),
        |pmid| format!("pmid:{pmid}"),
    )
}

fn with_doi(mut record: PaperRecord, doi: String) -> PaperRecord {
    record.url = Some(doi_url(&doi));
    record.identifier = Some(doi);
    record
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::Source;

    fn record(source: Source) -> PaperRecord {
        PaperRecord::new("Clonal dynamics in hematopoiesis", source, NaiveDate::from_ymd_opt(2024, 10, 15).unwrap())
    }

    #[tokio::test]
    async fn test_existing_identifier_wins() {
        let resolver = IdentifierResolver::new(None, Duration::from_secs(1));
        let mut stats = ResolutionStats::default();
        let out = resolver.resolve(record(Source::PubMed).with_metadata("doi", "doi:10.1/abc"), &mut stats).await;
        assert_eq!(out.identifier.as_deref(), Some("10.1/abc"));
        assert_eq!(out.url.as_deref(), Some("https://doi.org/10.1/abc"));
        assert_eq!(stats.existing, 1);
    }

    #[tokio::test]
    async fn test_landing_page_is_kept() {
        let resolver = IdentifierResolver::new(None, Duration::from_secs(1));
        let mut stats = ResolutionStats::default();
        let out = resolver
            .resolve(record(Source::PubMed).with_url("https://pubmed.ncbi.nlm.nih.gov/1/"), &mut stats)
            .await;
        assert_eq!(out.url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/1/"));
        assert_eq!(out.identifier, None);
        assert_eq!(stats.landing_page, 1);
    }

    #[tokio::test]
    async fn test_fallback_search_link() {
        let resolver = IdentifierResolver::new(None, Duration::from_secs(1));
        let mut stats = ResolutionStats::default();
        let out = resolver.resolve(record(Source::BioRxiv), &mut stats).await;
        assert!(out.url.as_deref().unwrap().starts_with("https://www.biorxiv.org/search/"));
        assert_eq!(stats.fallback, 1);
        assert_eq!(stats.resolved() + stats.unresolved(), 1);
    }
}
