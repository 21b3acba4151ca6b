//! arXiv Atom API (`export.arxiv.org/api/query`).

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{SourceClient, dated, normalize_ws, parse_day};
use crate::client::{HttpClient, Pacer};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{PaperRecord, SearchWindow, Source};
use crate::query::SourceQuery;

/// Entries per page.
const PAGE_SIZE: usize = 100;

/// arXiv client.
#[derive(Debug, Clone)]
pub struct ArxivClient {
    http: HttpClient,
    base_url: String,
    pacer: Pacer,
}

/// One parsed page of the Atom feed.
#[derive(Debug, Default)]
pub struct ArxivFeed {
    /// `opensearch:totalResults`, when present.
    pub total_results: Option<usize>,
    /// Entries on this page.
    pub records: Vec<PaperRecord>,
}

impl ArxivClient {
    /// Create a client paced by the configured arXiv delay.
    #[must_use]
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            base_url: config.endpoints.arxiv.clone(),
            pacer: Pacer::new(config.arxiv_delay),
        }
    }

    async fn page(&self, search_query: &str, start: usize, size: usize, fallback: NaiveDate) -> ClientResult<ArxivFeed> {
        let params = vec![
            ("search_query".to_string(), search_query.to_string()),
            ("start".to_string(), start.to_string()),
            ("max_results".to_string(), size.to_string()),
            ("sortBy".to_string(), "submittedDate".to_string()),
            ("sortOrder".to_string(), "descending".to_string()),
        ];
        let body = self.http.get_text(&self.base_url, &params, &self.pacer).await?;
        parse_feed(&body, fallback)
    }
}

/// Combine a rendered expression with the submission-date window.
fn windowed_query(text: &str, window: SearchWindow) -> String {
    format!(
        "({text}) AND submittedDate:[{}0000 TO {}2359]",
        window.since.format("%Y%m%d"),
        window.until.format("%Y%m%d")
    )
}

#[async_trait]
impl SourceClient for ArxivClient {
    fn source(&self) -> Source {
        Source::ArXiv
    }

    fn records<'a>(
        &'a self,
        query: &'a SourceQuery,
        window: SearchWindow,
        limit: usize,
    ) -> BoxStream<'a, ClientResult<PaperRecord>> {
        Box::pin(async_stream::try_stream! {
            let search_query = windowed_query(&query.text, window);
            let mut start = 0;
            let runnable = !query.text.trim().is_empty();

            while runnable && start < limit {
                let size = PAGE_SIZE.min(limit - start);
                let feed = self.page(&search_query, start, size, window.until).await?;
                let received = feed.records.len();
                tracing::debug!(start, received, total = ?feed.total_results, "arXiv page");

                for record in feed.records {
                    yield record;
                }

                start += received;
                let exhausted = feed.total_results.is_some_and(|total| start >= total);
                if received < size || exhausted {
                    break;
                }
            }
        })
    }
}

#[derive(Debug, Default)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: String,
    doi: Option<String>,
    journal_ref: Option<String>,
    categories: Vec<String>,
    authors: Vec<String>,
}

impl Entry {
    fn build(self, fallback: NaiveDate) -> Option<PaperRecord> {
        let title = normalize_ws(&self.title);
        if title.is_empty() {
            return None;
        }
        let mut record = PaperRecord::new(title, Source::ArXiv, fallback).with_keywords(self.categories);
        if !self.id.is_empty() {
            if let Some(arxiv_id) = arxiv_id_from_url(&self.id) {
                record = record.with_metadata("arxiv_id", arxiv_id);
            }
            record = record.with_url(self.id);
        }
        if let Some(doi) = self.doi {
            record = record.with_metadata("doi", doi);
        }
        if let Some(journal_ref) = self.journal_ref {
            record = record.with_metadata("journal_ref", journal_ref);
        }
        if !self.summary.is_empty() {
            record = record.with_metadata("abstract", self.summary);
        }
        if !self.authors.is_empty() {
            record = record.with_metadata("authors", self.authors);
        }
        Some(dated(record, parse_day(&self.published), fallback))
    }
}

/// Extract the versionless identifier from an abs URL.
fn arxiv_id_from_url(url: &str) -> Option<String> {
    let (_, tail) = url.split_once("/abs/")?;
    let id = tail.trim_end_matches('/');
    let id = match id.rfind('v') {
        Some(i) if i > 0 && id[i + 1..].chars().all(|c| c.is_ascii_digit()) && i + 1 < id.len() => &id[..i],
        _ => id,
    };
    (!id.is_empty()).then(|| id.to_string())
}

fn category_term(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"term")
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse one page of the arXiv Atom feed.
///
/// # Errors
///
/// Returns [`ClientError::Xml`] for a document that is not well-formed and
/// [`ClientError::BadRequest`] when arXiv answers with its error entry.
pub fn parse_feed(xml: &str, fallback: NaiveDate) -> ClientResult<ArxivFeed> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut feed = ArxivFeed::default();
    let mut entry: Option<Entry> = None;
    let mut in_author = false;
    let mut text = String::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                match e.local_name().as_ref() {
                    b"entry" => entry = Some(Entry::default()),
                    b"author" => in_author = true,
                    b"category" => {
                        if let (Some(entry), Some(term)) = (entry.as_mut(), category_term(&e)) {
                            entry.categories.push(term);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"category" {
                    if let (Some(entry), Some(term)) = (entry.as_mut(), category_term(&e)) {
                        entry.categories.push(term);
                    }
                }
            }
            Event::Text(t) => {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&t.unescape()?);
            }
            Event::End(e) => {
                let value = normalize_ws(&text);
                text.clear();
                let local = e.local_name();
                let Some(current) = entry.as_mut() else {
                    if local.as_ref() == b"totalResults" {
                        feed.total_results = value.parse().ok();
                    }
                    continue;
                };
                match local.as_ref() {
                    b"id" => current.id = value,
                    b"title" => current.title = value,
                    b"summary" => current.summary = value,
                    b"published" => current.published = value,
                    b"doi" if !value.is_empty() => current.doi = Some(value),
                    b"journal_ref" if !value.is_empty() => current.journal_ref = Some(value),
                    b"name" if in_author && !value.is_empty() => current.authors.push(value),
                    b"author" => in_author = false,
                    b"entry" => {
                        if let Some(done) = entry.take() {
                            if done.id.contains("/api/errors") {
                                return Err(ClientError::bad_request(done.summary));
                            }
                            if let Some(record) = done.build(fallback) {
                                feed.records.push(record);
                            }
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <opensearch:totalResults>1</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2410.01234v2</id>
    <published>2024-10-14T17:59:59Z</published>
    <title>Single-cell
      atlas of &amp; blood</title>
    <summary>We profile cells.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:doi>10.1000/xyz</arxiv:doi>
    <arxiv:primary_category term="q-bio.GN"/>
    <category term="q-bio.GN" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    fn fallback() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    #[test]
    fn test_parse_feed_entry() {
        let feed = parse_feed(FEED, fallback()).unwrap();
        assert_eq!(feed.total_results, Some(1));
        assert_eq!(feed.records.len(), 1);

        let record = &feed.records[0];
        assert_eq!(record.title, "Single-cell atlas of & blood");
        assert_eq!(record.url.as_deref(), Some("http://arxiv.org/abs/2410.01234v2"));
        assert_eq!(record.metadata_str("arxiv_id"), Some("2410.01234"));
        assert_eq!(record.metadata_str("doi"), Some("10.1000/xyz"));
        assert_eq!(record.keywords, vec!["q-bio.GN", "cs.LG"]);
        assert_eq!(record.published_date, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap());
        assert_eq!(record.raw_metadata["authors"], serde_json::json!(["Ada Lovelace", "Alan Turing"]));
    }

    #[test]
    fn test_error_entry_is_reported() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format</id>
            <title>Error</title><summary>incorrect id format</summary></entry></feed>"#;
        let result = parse_feed(xml, fallback());
        assert!(matches!(result, Err(ClientError::BadRequest { .. })));
    }

    #[test]
    fn test_arxiv_id_from_url() {
        assert_eq!(arxiv_id_from_url("http://arxiv.org/abs/2410.01234v2").as_deref(), Some("2410.01234"));
        assert_eq!(arxiv_id_from_url("http://arxiv.org/abs/q-bio/0601001").as_deref(), Some("q-bio/0601001"));
        assert_eq!(arxiv_id_from_url("http://example.org/x"), None);
    }

    #[test]
    fn test_windowed_query() {
        let day = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();
        let window = SearchWindow::new(day, day);
        assert_eq!(
            windowed_query(r#"all:"A""#, window),
            r#"(all:"A") AND submittedDate:[202410150000 TO 202410152359]"#
        );
    }
}
