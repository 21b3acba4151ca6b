//! Configuration loading and validation.

use std::io::Write;
use std::time::Duration;

use chrono::NaiveDate;

use paper_scout::ConfigError;
use paper_scout::config::Config;
use paper_scout::models::{DegradationPolicy, FallbackPolicy, LlmProvider, Source};

const FULL: &str = r#"{
    "databases": ["pubmed", "biorxiv", "arxiv"],
    "source_priority": ["biorxiv"],
    "since_days": 2,
    "total_limit": 50,
    "per_source_limit": 20,
    "degradation": "strict",
    "time_budget_secs": 90,
    "arxiv_delay_secs": 3.5,
    "filter_prompt": "Is this about hematopoiesis?",
    "interests": [
        {"name": "blood", "query": "[hematopoiesis] AND NOT [zebrafish]"},
        {
            "name": "atlas",
            "query_pubmed_arxiv": "[cell atlas]",
            "query_biorxiv": "[atlas] OR [single-cell]",
            "databases": ["biorxiv"]
        }
    ],
    "llm": {
        "enabled": true,
        "provider": "ollama",
        "model": "llama3",
        "fallback": "reject",
        "min_delay_secs": 0.5
    }
}"#;

#[test]
fn test_full_config_parses_and_validates() {
    let config = Config::from_json(FULL).unwrap();

    assert_eq!(config.degradation, DegradationPolicy::Strict);
    assert_eq!(config.time_budget, Some(Duration::from_secs(90)));
    assert_eq!(config.arxiv_delay, Duration::from_millis(3500));
    assert_eq!(config.llm.provider, LlmProvider::Ollama);
    assert_eq!(config.llm.fallback, FallbackPolicy::Reject);
    assert_eq!(config.llm.min_delay(), Duration::from_millis(500));
    assert_eq!(config.priority().unwrap(), vec![Source::BioRxiv, Source::PubMed, Source::ArXiv]);

    let plans = config.validate().unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].sources, vec![Source::BioRxiv, Source::PubMed, Source::ArXiv]);
    assert_eq!(plans[0].filter_prompt, "Is this about hematopoiesis?");
    assert_eq!(plans[1].sources, vec![Source::BioRxiv]);
    assert_eq!(plans[1].expression_for(Source::BioRxiv).unwrap().to_string(), "[atlas] OR [single-cell]");
}

#[test]
fn test_window_from_since_days() {
    let config = Config::from_json(FULL).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();
    let window = config.window(today).unwrap();

    assert_eq!(window.since, NaiveDate::from_ymd_opt(2024, 10, 13).unwrap());
    assert_eq!(window.until, today);
}

#[test]
fn test_reversed_window_is_rejected() {
    let config = Config::from_json(r#"{"since": "2024-10-15", "until": "2024-10-01"}"#).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 10, 20).unwrap();
    assert!(matches!(config.window(today), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_openai_requires_key() {
    let mut config = Config::from_json(r#"{"interests": [{"name": "g", "query": "[x]"}], "filter_prompt": "p"}"#).unwrap();
    config.llm.enabled = true;
    config.llm.api_key = None;

    match config.validate() {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "llm.api_key"),
        other => panic!("expected llm.api_key error, got {other:?}"),
    }
}

#[test]
fn test_unknown_source_is_rejected() {
    let config = Config::from_json(r#"{"databases": ["scopus"], "interests": [{"query": "[x]"}]}"#).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_group_source_outside_set_is_rejected() {
    let config = Config::from_json(
        r#"{"databases": ["pubmed"], "interests": [{"name": "g", "query": "[x]", "databases": ["arxiv"]}]}"#,
    )
    .unwrap();
    match config.validate() {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "interests[0].databases"),
        other => panic!("expected databases error, got {other:?}"),
    }
}

#[test]
fn test_bad_expression_names_the_field() {
    let config = Config::from_json(r#"{"interests": [{"name": "g", "query": "[x] AND"}]}"#).unwrap();
    match config.validate() {
        Err(ConfigError::Query { field, .. }) => assert_eq!(field, "interests[0].query"),
        other => panic!("expected query error, got {other:?}"),
    }
}

#[test]
fn test_deeply_nested_query_is_a_config_error() {
    let query = format!("{}[x]{}", "(".repeat(10_000), ")".repeat(10_000));
    let config = Config::from_json(&serde_json::json!({"interests": [{"name": "g", "query": query}]}).to_string()).unwrap();
    match config.validate() {
        Err(ConfigError::Query { field, source }) => {
            assert_eq!(field, "interests[0].query");
            assert!(matches!(source, paper_scout::QueryError::TooDeep { .. }));
        }
        other => panic!("expected nesting error, got {other:?}"),
    }
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.interests.len(), 2);

    let missing = Config::from_file(file.path().with_extension("missing"));
    assert!(matches!(missing, Err(ConfigError::Io { .. })));
}
