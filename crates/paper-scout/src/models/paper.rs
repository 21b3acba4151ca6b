//! Paper record flowing through the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Source;

/// One discovered publication.
///
/// Created by a source client, completed by the identifier resolver and
/// judged by the relevance filter. Nothing outlives the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    /// Paper title.
    pub title: String,

    /// Source the first-seen copy came from.
    pub source: Source,

    /// Canonical identifier (bare DOI, e.g. `10.1101/2024.01.01.123456`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Resolved DOI link or fallback link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Publication or posting date.
    pub published_date: NaiveDate,

    /// Keywords in source order.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Source-specific fields (pmid, arxiv_id, abstract, authors, ...).
    #[serde(default)]
    pub raw_metadata: Map<String, Value>,

    /// Other sources that returned a duplicate of this paper.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_found_in: Vec<Source>,

    /// Relevance verdict; `None` until judged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relevance: Option<bool>,
}

impl PaperRecord {
    /// Create a record with only the required fields.
    #[must_use]
    pub fn new(title: impl Into<String>, source: Source, published_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            source,
            identifier: None,
            url: None,
            published_date,
            keywords: Vec::new(),
            raw_metadata: Map::new(),
            also_found_in: Vec::new(),
            relevance: None,
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set the URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the keyword list.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.raw_metadata.insert(key.to_string(), value.into());
        self
    }

    /// String-valued metadata field, if present and non-empty.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.raw_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// PubMed accession number, if the record carries one.
    #[must_use]
    pub fn pmid(&self) -> Option<&str> {
        self.metadata_str("pmid")
    }

    /// Relevance verdict, if the filter has run.
    #[must_use]
    pub const fn relevance(&self) -> Option<bool> {
        self.relevance
    }

    /// Record the relevance verdict.
    ///
    /// The verdict is written once; later calls are ignored and return `false`.
    pub fn set_relevance(&mut self, relevant: bool) -> bool {
        if self.relevance.is_some() {
            return false;
        }
        self.relevance = Some(relevant);
        true
    }

    /// Whether the record has a usable link.
    #[must_use]
    pub fn has_url(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Preprints are anything not indexed by PubMed.
    #[must_use]
    pub fn is_preprint(&self) -> bool {
        self.source != Source::PubMed && !self.also_found_in.contains(&Source::PubMed)
    }
}
