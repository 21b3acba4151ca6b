//! bioRxiv details API.
//!
//! The API has no search endpoint: every posting in the window is paged
//! through with a cursor and matched locally against the query's terms.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;

use super::{SourceClient, dated, normalize_ws, parse_day};
use crate::client::{HttpClient, Pacer};
use crate::config::Config;
use crate::error::ClientResult;
use crate::models::{PaperRecord, SearchWindow, Source};
use crate::query::SourceQuery;

/// bioRxiv client.
#[derive(Debug, Clone)]
pub struct BioRxivClient {
    http: HttpClient,
    base_url: String,
    pacer: Pacer,
}

/// One page of `/details/biorxiv/{since}/{until}/{cursor}/json`.
#[derive(Debug, Default, Deserialize)]
pub struct BioRxivPage {
    /// Status block; the first entry carries the cursor totals.
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Postings on this page.
    #[serde(default)]
    pub collection: Vec<BioRxivItem>,
}

/// One posting (a single version of a preprint).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BioRxivItem {
    /// Preprint DOI.
    pub doi: String,
    /// Title.
    pub title: String,
    /// Semicolon-separated author list.
    pub authors: String,
    /// Posting date.
    pub date: String,
    /// Version number as a string.
    pub version: String,
    /// Subject category.
    pub category: String,
    /// Abstract.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// DOI of the published version, or `NA`.
    pub published: String,
}

impl BioRxivPage {
    /// Total postings in the window, when reported.
    #[must_use]
    pub fn total(&self) -> Option<usize> {
        let total = self.messages.first()?.get("total")?;
        match total {
            Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl BioRxivItem {
    fn version_number(&self) -> u32 {
        self.version.trim().parse().unwrap_or(1)
    }

    fn matches(&self, terms: &[String]) -> bool {
        matches_any(terms, &[&self.title, &self.abstract_text, &self.category])
    }

    fn into_record(self, fallback: NaiveDate) -> PaperRecord {
        let date = parse_day(&self.date);
        let doi = self.doi.trim().to_string();
        let authors: Vec<String> = self
            .authors
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        let mut record = PaperRecord::new(normalize_ws(&self.title), Source::BioRxiv, fallback)
            .with_url(format!("https://www.biorxiv.org/content/{doi}v{}", self.version_number()))
            .with_metadata("doi", doi)
            .with_metadata("version", self.version_number());
        let category = self.category.trim();
        if !category.is_empty() {
            record = record.with_keywords([category]).with_metadata("category", category);
        }
        if !self.abstract_text.trim().is_empty() {
            record = record.with_metadata("abstract", normalize_ws(&self.abstract_text));
        }
        if !authors.is_empty() {
            record = record.with_metadata("authors", authors);
        }
        let published = self.published.trim();
        if !published.is_empty() && !published.eq_ignore_ascii_case("NA") {
            record = record.with_metadata("published_doi", published);
        }
        dated(record, date, fallback)
    }
}

/// Whether any term occurs (case-insensitively) in any of the fields.
///
/// An empty term list matches nothing.
#[must_use]
pub fn matches_any(terms: &[String], fields: &[&str]) -> bool {
    let fields: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();
    terms.iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).any(|term| {
        fields.iter().any(|field| field.contains(&term))
    })
}

/// Keep only the newest version of each DOI, in first-appearance order.
///
/// Postings without a DOI are dropped.
fn newest_versions(items: Vec<BioRxivItem>) -> Vec<BioRxivItem> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<BioRxivItem> = Vec::with_capacity(items.len());
    for item in items {
        let key = item.doi.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&i) if item.version_number() > out[i].version_number() => out[i] = item,
            Some(_) => {}
            None => {
                index.insert(key, out.len());
                out.push(item);
            }
        }
    }
    out
}

impl BioRxivClient {
    /// Create a client.
    #[must_use]
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            base_url: config.endpoints.biorxiv.trim_end_matches('/').to_string(),
            pacer: Pacer::unpaced(),
        }
    }

    async fn page(&self, window: SearchWindow, cursor: usize) -> ClientResult<BioRxivPage> {
        let url = format!(
            "{}/details/biorxiv/{}/{}/{cursor}/json",
            self.base_url, window.since, window.until
        );
        self.http.get_json(&url, &[], &self.pacer).await
    }
}

#[async_trait]
impl SourceClient for BioRxivClient {
    fn source(&self) -> Source {
        Source::BioRxiv
    }

    fn records<'a>(
        &'a self,
        query: &'a SourceQuery,
        window: SearchWindow,
        limit: usize,
    ) -> BoxStream<'a, ClientResult<PaperRecord>> {
        Box::pin(async_stream::try_stream! {
            let terms = query.any_of();

            // Revisions of one preprint can straddle page boundaries, so the
            // window is drained before versions are compared.
            let mut postings = Vec::new();
            let mut cursor = 0;
            let mut more = !terms.is_empty();
            while more {
                let page = self.page(window, cursor).await?;
                let received = page.collection.len();
                let total = page.total();
                tracing::debug!(cursor, received, total = ?total, "bioRxiv page");

                postings.extend(page.collection);
                cursor += received;
                more = received > 0 && total.is_none_or(|total| cursor < total);
            }

            let matching = newest_versions(postings).into_iter().filter(|item| item.matches(terms));
            for item in matching.take(limit) {
                yield item.into_record(window.until);
            }
        })
    }
}
