//! Bibliographic source clients.
//!
//! Every source implements [`SourceClient`]: a lazy, paginated stream of
//! [`PaperRecord`]s for one translated query and date window. The provided
//! [`SourceClient::search`] drains that stream up to the record budget and
//! turns any fault into an empty result.

mod arxiv;
mod biorxiv;
mod pubmed;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use futures::stream::BoxStream;

pub use arxiv::{ArxivClient, ArxivFeed, parse_feed};
pub use biorxiv::{BioRxivClient, BioRxivPage, matches_any};
pub use pubmed::{PubMedClient, parse_efetch};

use crate::client::HttpClient;
use crate::config::Config;
use crate::error::ClientResult;
use crate::models::{PaperRecord, SearchLimits, SearchWindow, Source};
use crate::query::SourceQuery;

/// A searchable bibliographic source.
#[async_trait]
pub trait SourceClient: Send + Sync + fmt::Debug {
    /// Which source this client queries.
    fn source(&self) -> Source;

    /// Stream records matching `query` within `window`, at most `limit` of them.
    ///
    /// Pages are fetched lazily as the stream is polled.
    fn records<'a>(
        &'a self,
        query: &'a SourceQuery,
        window: SearchWindow,
        limit: usize,
    ) -> BoxStream<'a, ClientResult<PaperRecord>>;

    /// Collect records up to the effective per-source budget.
    ///
    /// # Errors
    ///
    /// Returns the first transport or parse error; records read before it are discarded.
    async fn try_search(
        &self,
        query: &SourceQuery,
        window: SearchWindow,
        limits: SearchLimits,
    ) -> ClientResult<Vec<PaperRecord>> {
        let limit = limits.effective_per_source();
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stream = self.records(query, window, limit);
        let mut records = Vec::new();
        while let Some(record) = stream.next().await {
            records.push(record?);
            if records.len() >= limit {
                break;
            }
        }
        Ok(records)
    }

    /// Like [`SourceClient::try_search`], but an unavailable source yields no records.
    async fn search(
        &self,
        query: &SourceQuery,
        window: SearchWindow,
        limits: SearchLimits,
    ) -> Vec<PaperRecord> {
        match self.try_search(query, window, limits).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(source = %self.source(), error = %e, "source unavailable, continuing without it");
                Vec::new()
            }
        }
    }
}

/// Build the client for `source`.
#[must_use]
pub fn client_for(source: Source, http: &HttpClient, config: &Config) -> Arc<dyn SourceClient> {
    match source {
        Source::PubMed => Arc::new(PubMedClient::new(http.clone(), config)),
        Source::ArXiv => Arc::new(ArxivClient::new(http.clone(), config)),
        Source::BioRxiv => Arc::new(BioRxivClient::new(http.clone(), config)),
    }
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp.
pub(crate) fn parse_day(text: &str) -> Option<NaiveDate> {
    let head = text.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Attach a date, falling back to `fallback` and flagging the record when unparsable.
pub(crate) fn dated(
    mut record: PaperRecord,
    date: Option<NaiveDate>,
    fallback: NaiveDate,
) -> PaperRecord {
    if let Some(date) = date {
        record.published_date = date;
        return record;
    }
    record.published_date = fallback;
    record.with_metadata("date_inferred", true)
}

/// Collapse runs of whitespace to single spaces.
pub(crate) fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
