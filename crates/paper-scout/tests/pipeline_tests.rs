//! End-to-end runs against mocked upstreams.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use paper_scout::config::{Config, InterestGroup};
use paper_scout::models::{PaperRecord, SearchWindow, Source, SourceStatus};
use paper_scout::store::WorkDir;
use paper_scout::{ConfigError, Pipeline};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
}

fn window() -> SearchWindow {
    SearchWindow::new(day(14), day(15))
}

fn test_config(mock_server: &MockServer, work_dir: &Path, databases: &[&str], query: &str) -> Config {
    let mut config = Config::for_testing(&mock_server.uri());
    config.databases = databases.iter().map(ToString::to_string).collect();
    config.work_dir = work_dir.to_path_buf();
    config.interests = vec![InterestGroup {
        name: "blood".to_string(),
        query: Some(query.to_string()),
        ..InterestGroup::default()
    }];
    config
}

fn efetch_xml(articles: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from("<PubmedArticleSet>");
    for (pmid, title, doi) in articles {
        xml.push_str(&format!(
            "<PubmedArticle><MedlineCitation><PMID>{pmid}</PMID><Article>\
             <ArticleTitle>{title}</ArticleTitle>\
             <ELocationID EIdType=\"doi\">{doi}</ELocationID>\
             <ArticleDate><Year>2024</Year><Month>10</Month><Day>14</Day></ArticleDate>\
             </Article></MedlineCitation></PubmedArticle>"
        ));
    }
    xml.push_str("</PubmedArticleSet>");
    xml
}

async fn mount_pubmed(mock_server: &MockServer, articles: &[(&str, &str, &str)]) {
    let ids: Vec<&str> = articles.iter().map(|a| a.0).collect();
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"esearchresult": {"idlist": ids}})))
        .mount(mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(efetch_xml(articles)))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_unqueried_source_reports_zero() {
    let mock_server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_pubmed(&mock_server, &[("1", "Clonal hematopoiesis in aging", "10.1/one")]).await;

    let config = test_config(&mock_server, tmp.path(), &["pubmed"], "[clonal hematopoiesis]");
    let pipeline = Pipeline::new(config).unwrap();
    let reports = pipeline.run(window()).await;

    assert_eq!(reports.len(), 1);
    let stats = &reports[0].stats;
    assert_eq!(stats.raw_count_for(Source::BioRxiv), 0);
    assert_eq!(stats.status_for(Source::PubMed), Some(SourceStatus::Queried));
    assert_eq!(stats.raw_count_for(Source::PubMed), 1);
    assert_eq!(reports[0].papers[0].url.as_deref(), Some("https://doi.org/10.1/one"));
    assert_eq!(stats.resolved_count, 1);
}

#[tokio::test]
async fn test_leftover_artifacts_are_not_read() {
    let mock_server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_pubmed(&mock_server, &[("1", "Fresh paper", "10.1/fresh")]).await;

    let store = WorkDir::new(tmp.path());
    let leftover = vec![PaperRecord::new("Leftover preprint", Source::BioRxiv, day(15))];
    store.save("blood", day(15), Source::BioRxiv, &leftover).await.unwrap();
    store.save("blood", day(13), Source::PubMed, &leftover).await.unwrap();

    let config = test_config(&mock_server, tmp.path(), &["pubmed"], "[fresh]");
    let reports = Pipeline::new(config).unwrap().run(window()).await;

    let titles: Vec<&str> = reports[0].papers.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["Fresh paper"]);
    assert!(!store.artifact_path("blood", day(13), Source::PubMed).exists());
    assert!(store.artifact_path("blood", day(15), Source::PubMed).exists());
}

#[tokio::test]
async fn test_empty_results() {
    let mock_server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/entrez/eutils/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"esearchresult": {"idlist": []}})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server, tmp.path(), &["pubmed"], "[nothing]");
    let reports = Pipeline::new(config).unwrap().run(window()).await;

    assert!(reports[0].papers.is_empty());
    assert_eq!(reports[0].stats.raw_count, 0);
    assert_eq!(reports[0].stats.status_for(Source::PubMed), Some(SourceStatus::Queried));
}

#[tokio::test]
async fn test_failed_source_does_not_abort_run() {
    let mock_server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_pubmed(&mock_server, &[("1", "Single-cell atlas of marrow", "10.1101/2024.10.14.1")]).await;

    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/details/biorxiv/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"status": "ok", "total": 1}],
            "collection": [{
                "doi": "10.1101/2024.10.14.1",
                "title": "Single-cell atlas of marrow",
                "date": "2024-10-14",
                "version": "1",
                "category": "genomics",
                "published": "NA"
            }]
        })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server, tmp.path(), &["pubmed", "biorxiv", "arxiv"], "[single-cell] AND [atlas]");
    let reports = Pipeline::new(config).unwrap().run(window()).await;
    let report = &reports[0];

    assert_eq!(report.stats.status_for(Source::ArXiv), Some(SourceStatus::Failed));
    assert_eq!(report.stats.status_for(Source::BioRxiv), Some(SourceStatus::Queried));
    assert_eq!(report.stats.raw_count, 2);
    assert_eq!(report.papers.len(), 1);
    assert_eq!(report.papers[0].source, Source::PubMed);
    assert_eq!(report.papers[0].also_found_in, vec![Source::BioRxiv]);
    assert_eq!(report.stats.duplicates_removed, 1);
    assert!(report.stats.warnings.iter().any(|w| w.contains("widened")));
    assert!(report.stats.warnings.iter().any(|w| w.contains("arXiv")));
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let mock_server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/entrez/eutils/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"esearchresult": {"idlist": []}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server, tmp.path(), &["pubmed"], "[x]");
    config.source_timeout = Duration::from_millis(200);
    let reports = Pipeline::new(config).unwrap().run(window()).await;

    assert_eq!(reports[0].stats.status_for(Source::PubMed), Some(SourceStatus::TimedOut));
    assert!(!reports[0].stats.truncated);
}

#[tokio::test]
async fn test_time_budget_stops_judging() {
    let mock_server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_pubmed(
        &mock_server,
        &[("1", "First", "10.1/1"), ("2", "Second", "10.1/2"), ("3", "Third", "10.1/3")],
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": "yes"}}]}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server, tmp.path(), &["pubmed"], "[x]");
    config.llm.enabled = true;
    config.filter_prompt = Some("Is this about blood?".to_string());
    // The second call starts near 2 s and the third near 4 s, a full
    // second either side of the budget.
    config.time_budget = Some(Duration::from_secs(3));
    let reports = Pipeline::new(config).unwrap().run(window()).await;
    let stats = &reports[0].stats;

    assert!(stats.truncated);
    assert!(stats.filtering_enabled);
    assert_eq!(stats.judging.accepted, 2);
    assert_eq!(stats.judging.unjudged, 1);
    assert_eq!(reports[0].papers.len(), 2);
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&mock_server).await;

    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server, tmp.path(), &["pubmed"], "([unbalanced]");

    assert!(matches!(Pipeline::new(config), Err(ConfigError::Query { .. })));
}
