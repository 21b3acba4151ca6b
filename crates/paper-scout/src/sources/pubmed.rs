//! PubMed via NCBI E-utilities.
//!
//! `esearch.fcgi` (JSON) returns PMIDs for the rendered query and window,
//! `efetch.fcgi` (XML) returns the article records in batches.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;

use super::{SourceClient, dated, normalize_ws};
use crate::client::{HttpClient, Pacer};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{PaperRecord, SearchWindow, Source};
use crate::query::SourceQuery;
use crate::reconcile::normalize_title;
use crate::resolver::{RegistryLookup, normalize_doi};

/// PMIDs per efetch request.
const EFETCH_BATCH: usize = 200;

/// Candidates fetched when looking a paper up by title.
const TITLE_CANDIDATES: usize = 3;

/// PubMed client. Also serves as the DOI registry lookup.
#[derive(Clone)]
pub struct PubMedClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    pacer: Pacer,
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

impl PubMedClient {
    /// Create a client paced by the configured NCBI delay.
    #[must_use]
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            base_url: config.endpoints.ncbi.trim_end_matches('/').to_string(),
            api_key: config.ncbi_api_key.clone().filter(|k| !k.trim().is_empty()),
            pacer: Pacer::new(config.ncbi_rate_limit_delay()),
        }
    }

    fn with_key(&self, mut params: Vec<(String, String)>) -> Vec<(String, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }
        params
    }

    /// Run an esearch and return the matching PMIDs.
    async fn esearch(&self, term: &str, window: Option<SearchWindow>, retmax: usize) -> ClientResult<Vec<String>> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut params = vec![
            ("db".to_string(), "pubmed".to_string()),
            ("term".to_string(), term.to_string()),
            ("retmode".to_string(), "json".to_string()),
            ("retmax".to_string(), retmax.to_string()),
        ];
        if let Some(window) = window {
            params.push(("datetype".to_string(), "pdat".to_string()));
            params.push(("mindate".to_string(), window.since.format("%Y/%m/%d").to_string()));
            params.push(("maxdate".to_string(), window.until.format("%Y/%m/%d").to_string()));
        }
        let params = self.with_key(params);

        let response: ESearchResponse = self.http.get_json(&url, &params, &self.pacer).await?;
        if let Some(error) = response.esearchresult.error {
            return Err(ClientError::bad_request(error));
        }
        Ok(response.esearchresult.idlist)
    }

    /// Fetch and parse articles by PMID.
    async fn efetch(&self, ids: &[String], fallback: NaiveDate) -> ClientResult<Vec<PaperRecord>> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let params = self.with_key(vec![
            ("db".to_string(), "pubmed".to_string()),
            ("id".to_string(), ids.join(",")),
            ("retmode".to_string(), "xml".to_string()),
        ]);
        let body = self.http.get_text(&url, &params, &self.pacer).await?;
        parse_efetch(&body, fallback)
    }
}

#[async_trait]
impl SourceClient for PubMedClient {
    fn source(&self) -> Source {
        Source::PubMed
    }

    fn records<'a>(
        &'a self,
        query: &'a SourceQuery,
        window: SearchWindow,
        limit: usize,
    ) -> BoxStream<'a, ClientResult<PaperRecord>> {
        Box::pin(async_stream::try_stream! {
            let ids = self.esearch(&query.text, Some(window), limit).await?;
            tracing::debug!(count = ids.len(), "PubMed esearch");

            for batch in ids.chunks(EFETCH_BATCH) {
                for record in self.efetch(batch, window.until).await? {
                    yield record;
                }
            }
        })
    }
}

#[async_trait]
impl RegistryLookup for PubMedClient {
    fn covers(&self, record: &PaperRecord) -> bool {
        record.source == Source::PubMed || record.pmid().is_some()
    }

    async fn lookup(&self, record: &PaperRecord) -> ClientResult<Option<String>> {
        let fallback = record.published_date;

        if let Some(pmid) = record.pmid() {
            let found = self.efetch(&[pmid.to_string()], fallback).await?;
            return Ok(found.iter().find_map(|r| r.metadata_str("doi")).and_then(normalize_doi));
        }

        let wanted = normalize_title(&record.title);
        if wanted.is_empty() {
            return Ok(None);
        }
        let term = format!("{}[Title]", record.title.replace(['[', ']'], " "));
        let ids = self.esearch(&term, None, TITLE_CANDIDATES).await?;
        if ids.is_empty() {
            return Ok(None);
        }
        let found = self.efetch(&ids, fallback).await?;
        Ok(found
            .iter()
            .filter(|r| normalize_title(&r.title) == wanted)
            .find_map(|r| r.metadata_str("doi"))
            .and_then(normalize_doi))
    }
}

impl std::fmt::Debug for PubMedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubMedClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct DateParts {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl DateParts {
    fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    /// `MedlineDate` values such as `2024 Oct-Nov` or `2023 Winter`.
    fn from_medline(text: &str) -> Self {
        let mut parts = text.split_whitespace();
        let year = parts.next().and_then(|y| y.get(..4)).and_then(|y| y.parse().ok());
        let month = parts.next().and_then(|m| parse_month(m.split('-').next().unwrap_or(m)));
        Self { year, month, day: None }
    }
}

fn parse_month(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Ok(n) = text.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] =
        ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    let head = text.get(..3)?.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == head).and_then(|i| u32::try_from(i + 1).ok())
}

#[derive(Debug, Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: String,
    abstract_parts: Vec<String>,
    doi: Option<String>,
    journal: Option<String>,
    article_date: DateParts,
    pub_date: DateParts,
    keywords: Vec<String>,
    authors: Vec<String>,
    last_name: Option<String>,
    fore_name: Option<String>,
}

impl ArticleBuilder {
    fn push_keyword(&mut self, keyword: String) {
        if !keyword.is_empty() && !self.keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            self.keywords.push(keyword);
        }
    }

    fn finish_author(&mut self) {
        let name = match (self.fore_name.take(), self.last_name.take()) {
            (Some(fore), Some(last)) => format!("{fore} {last}"),
            (None, Some(last)) => last,
            (Some(fore), None) => fore,
            (None, None) => return,
        };
        self.authors.push(name);
    }

    fn build(self, fallback: NaiveDate) -> Option<PaperRecord> {
        let title = normalize_ws(&self.title);
        if title.is_empty() {
            return None;
        }
        let date = self.article_date.to_date().or_else(|| self.pub_date.to_date());

        let mut record = PaperRecord::new(title, Source::PubMed, fallback).with_keywords(self.keywords);
        if let Some(pmid) = self.pmid {
            record = record
                .with_url(format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"))
                .with_metadata("pmid", pmid);
        }
        if let Some(doi) = self.doi {
            record = record.with_metadata("doi", doi);
        }
        if let Some(journal) = self.journal {
            record = record.with_metadata("journal", journal);
        }
        if !self.abstract_parts.is_empty() {
            record = record.with_metadata("abstract", self.abstract_parts.join(" "));
        }
        if !self.authors.is_empty() {
            record = record.with_metadata("authors", self.authors);
        }
        Some(dated(record, date, fallback))
    }
}

/// Elements whose text content is captured.
const CAPTURED: &[&str] = &[
    "PMID",
    "ArticleTitle",
    "AbstractText",
    "ELocationID",
    "ArticleId",
    "Title",
    "Year",
    "Month",
    "Day",
    "MedlineDate",
    "Keyword",
    "DescriptorName",
    "LastName",
    "ForeName",
    "CollectiveName",
];

fn id_type(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| matches!(a.key.local_name().as_ref(), b"EIdType" | b"IdType"))
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_ascii_lowercase())
}

/// Parse an efetch `PubmedArticleSet` document.
///
/// Inline markup inside titles and abstracts is flattened. Articles without a
/// title are skipped; an unparsable publication date becomes `fallback` and the
/// record is flagged with `date_inferred`.
///
/// # Errors
///
/// Returns [`ClientError::Xml`] when the document is not well-formed.
pub fn parse_efetch(xml: &str, fallback: NaiveDate) -> ClientResult<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut records = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut pending_id_type: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "PubmedArticle" {
                    current = Some(ArticleBuilder::default());
                }
                if CAPTURED.contains(&name.as_str()) {
                    text.clear();
                }
                if matches!(name.as_str(), "ELocationID" | "ArticleId") {
                    pending_id_type = id_type(&e);
                }
                stack.push(name);
            }
            Event::Text(t) => {
                if current.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(ClientError::Xml("unbalanced end tag".to_string()));
                };
                let parent = stack.last().map(String::as_str).unwrap_or_default();
                let grandparent =
                    stack.len().checked_sub(2).and_then(|i| stack.get(i)).map(String::as_str);

                if name == "PubmedArticle" {
                    if let Some(article) = current.take().and_then(|a| a.build(fallback)) {
                        records.push(article);
                    }
                    continue;
                }
                let Some(article) = current.as_mut() else {
                    continue;
                };
                let value = normalize_ws(&text);

                match (name.as_str(), parent) {
                    ("PMID", "MedlineCitation") if article.pmid.is_none() => {
                        article.pmid = Some(value);
                    }
                    ("ArticleTitle", _) => article.title = value,
                    ("AbstractText", _) if !value.is_empty() => article.abstract_parts.push(value),
                    ("ELocationID", _) | ("ArticleId", "ArticleIdList")
                        if article.doi.is_none()
                            && pending_id_type.as_deref() == Some("doi")
                            && (name == "ELocationID" || grandparent == Some("PubmedData"))
                            && !value.is_empty() =>
                    {
                        article.doi = Some(value);
                    }
                    ("Title", "Journal") => article.journal = Some(value),
                    ("Year" | "Month" | "Day", "ArticleDate" | "PubDate") => {
                        let parts = if parent == "ArticleDate" {
                            &mut article.article_date
                        } else {
                            &mut article.pub_date
                        };
                        match name.as_str() {
                            "Year" => parts.year = value.parse().ok(),
                            "Month" => parts.month = parse_month(&value),
                            _ => parts.day = value.parse().ok(),
                        }
                    }
                    ("MedlineDate", "PubDate") => article.pub_date = DateParts::from_medline(&value),
                    ("Keyword" | "DescriptorName", _) => article.push_keyword(value),
                    ("LastName", "Author") => article.last_name = Some(value),
                    ("ForeName", "Author") => article.fore_name = Some(value),
                    ("CollectiveName", "Author") => article.authors.push(value),
                    ("Author", _) => article.finish_author(),
                    _ => {}
                }
                if CAPTURED.contains(&name.as_str()) {
                    text.clear();
                }
            }
            _ => {}
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">39000001</PMID>
      <Article>
        <Journal>
          <JournalIssue><PubDate><Year>2024</Year><Month>Oct</Month></PubDate></JournalIssue>
          <Title>Nature Genetics</Title>
        </Journal>
        <ArticleTitle>Somatic <i>TET2</i> mutations &amp; clonal hematopoiesis.</ArticleTitle>
        <ELocationID EIdType="doi" ValidYN="Y">10.1038/s41588-024-0001-x</ELocationID>
        <Abstract><AbstractText Label="BACKGROUND">First part.</AbstractText><AbstractText>Second part.</AbstractText></Abstract>
        <AuthorList><Author><LastName>Doe</LastName><ForeName>Jane</ForeName></Author></AuthorList>
        <ArticleDate DateType="Electronic"><Year>2024</Year><Month>10</Month><Day>14</Day></ArticleDate>
      </Article>
      <MeshHeadingList><MeshHeading><DescriptorName UI="D1">Hematopoiesis</DescriptorName></MeshHeading></MeshHeadingList>
      <KeywordList><Keyword>CHIP</Keyword><Keyword>hematopoiesis</Keyword></KeywordList>
      <CommentsCorrectionsList><CommentsCorrections><PMID>123</PMID></CommentsCorrections></CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList><ArticleId IdType="pubmed">39000001</ArticleId><ArticleId IdType="doi">10.9999/ignored</ArticleId></ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>39000002</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><MedlineDate>2024 Sep-Oct</MedlineDate></PubDate></JournalIssue></Journal>
        <ArticleTitle>No DOI here</ArticleTitle>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ReferenceList><Reference><ArticleIdList><ArticleId IdType="doi">10.1/ref</ArticleId></ArticleIdList></Reference></ReferenceList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    fn fallback() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    #[test]
    fn test_parse_efetch_fields() {
        let records = parse_efetch(SAMPLE, fallback()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Somatic TET2 mutations & clonal hematopoiesis.");
        assert_eq!(first.pmid(), Some("39000001"));
        assert_eq!(first.metadata_str("doi"), Some("10.1038/s41588-024-0001-x"));
        assert_eq!(first.metadata_str("journal"), Some("Nature Genetics"));
        assert_eq!(first.metadata_str("abstract"), Some("First part. Second part."));
        assert_eq!(first.published_date, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap());
        assert_eq!(first.keywords, vec!["Hematopoiesis", "CHIP"]);
        assert_eq!(first.url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/39000001/"));
        assert_eq!(first.raw_metadata["authors"], serde_json::json!(["Jane Doe"]));
    }

    #[test]
    fn test_reference_dois_are_ignored() {
        let records = parse_efetch(SAMPLE, fallback()).unwrap();
        let second = &records[1];
        assert_eq!(second.metadata_str("doi"), None);
        assert_eq!(second.published_date, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert!(second.raw_metadata.get("date_inferred").is_none());
    }

    #[test]
    fn test_missing_date_is_inferred() {
        let xml = "<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>1</PMID>\
                   <Article><ArticleTitle>Undated</ArticleTitle></Article>\
                   </MedlineCitation></PubmedArticle></PubmedArticleSet>";
        let records = parse_efetch(xml, fallback()).unwrap();
        assert_eq!(records[0].published_date, fallback());
        assert_eq!(records[0].raw_metadata["date_inferred"], serde_json::json!(true));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = parse_efetch("<PubmedArticleSet><PubmedArticle></Oops>", fallback());
        assert!(matches!(result, Err(ClientError::Xml(_))));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("Oct"), Some(10));
        assert_eq!(parse_month("03"), Some(3));
        assert_eq!(parse_month("13"), None);
        assert_eq!(parse_month("Winter"), None);
    }
}
