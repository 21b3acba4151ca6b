//! Configuration for the discovery pipeline.
//!
//! A run is configured from a JSON file. Secrets may be left out of the file
//! and supplied through the environment (`OPENAI_API_KEY`, `NCBI_API_KEY`).
//! [`Config::validate`] checks everything before any network call is made.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{
    DegradationPolicy, FallbackPolicy, LlmProvider, SearchLimits, SearchWindow, Source,
};
use crate::query::Expr;

/// API configuration constants.
pub mod api {
    use std::time::Duration;

    /// NCBI E-utilities base URL.
    pub const NCBI_EUTILS: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

    /// arXiv export API query endpoint.
    pub const ARXIV_API: &str = "https://export.arxiv.org/api/query";

    /// bioRxiv details API base URL.
    pub const BIORXIV_API: &str = "https://api.biorxiv.org";

    /// Default OpenAI-compatible base URL.
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

    /// Default local Ollama server.
    pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

    /// Default model for relevance judging.
    pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

    /// Per-request timeout (NCBI can be slow under load).
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Time bound for one source's whole search.
    pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(300);

    /// Time bound for one registry lookup, retries included.
    pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(60);

    /// Time bound for one judge call.
    pub const LLM_TIMEOUT: Duration = Duration::from_secs(60);

    /// Retries for transient failures.
    pub const MAX_RETRIES: u32 = 3;

    /// Delay between NCBI requests without API key (3 req/s allowed).
    pub const NCBI_RATE_LIMIT_DELAY: Duration = Duration::from_millis(400);

    /// Delay between NCBI requests with API key (10 req/s allowed).
    pub const NCBI_RATE_LIMIT_DELAY_WITH_KEY: Duration = Duration::from_millis(110);

    /// arXiv asks clients to wait 3 seconds between calls.
    pub const ARXIV_RATE_LIMIT_DELAY: Duration = Duration::from_secs(3);

    /// Cache TTL for registry lookups.
    pub const CACHE_TTL: Duration = Duration::from_secs(3600);

    /// Maximum cache size.
    pub const CACHE_MAX_SIZE: u64 = 5000;

    /// Maximum keepalive connections.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);

    /// Default cap across all sources.
    pub const TOTAL_LIMIT: usize = 1200;

    /// Default cap per source.
    pub const PER_SOURCE_LIMIT: usize = 400;

    /// User agent sent to every API.
    pub const USER_AGENT: &str = concat!("paper-scout/", env!("CARGO_PKG_VERSION"));
}

/// Relevance-judge defaults.
pub mod judge {
    use std::time::Duration;

    use crate::models::LlmProvider;

    /// Default acceptance tokens.
    pub const ACCEPTANCE_TOKENS: &[&str] = &["yes", "relevant", "accept", "include"];

    /// Default rejection tokens.
    pub const REJECTION_TOKENS: &[&str] = &["no", "not relevant", "reject", "exclude"];

    /// Minimum delay between judge calls when the config sets none.
    ///
    /// Hosted models have per-minute request ceilings that differ by family:
    /// Gemini Flash Lite allows ~13 RPM, GPT-4 ~20 RPM, GPT-3.5 ~60 RPM.
    #[must_use]
    pub fn default_min_delay(provider: LlmProvider, model: &str) -> Duration {
        if provider == LlmProvider::Ollama {
            return Duration::ZERO;
        }
        let model = model.to_ascii_lowercase();
        if model.contains("gemini") {
            Duration::from_millis(4500)
        } else if model.contains("gpt-4") {
            Duration::from_millis(3100)
        } else {
            Duration::from_millis(200)
        }
    }
}

/// Serde helpers for durations written as (fractional) seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.serialize_some(&d.as_secs_f64()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<f64>::deserialize(deserializer)?
                .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// Base URLs of the remote APIs (overridable for testing with mock servers).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// NCBI E-utilities base URL.
    pub ncbi: String,
    /// arXiv query endpoint.
    pub arxiv: String,
    /// bioRxiv API base URL.
    pub biorxiv: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ncbi: api::NCBI_EUTILS.to_string(),
            arxiv: api::ARXIV_API.to_string(),
            biorxiv: api::BIORXIV_API.to_string(),
        }
    }
}

/// Relevance judge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Run the relevance filter at all.
    pub enabled: bool,

    /// Which API flavour to speak.
    pub provider: LlmProvider,

    /// Model name.
    pub model: String,

    /// Endpoint base URL; provider default when absent.
    pub base_url: Option<String>,

    /// API key (OpenAI-compatible providers).
    pub api_key: Option<String>,

    /// Minimum delay between calls; per-model default when absent.
    #[serde(with = "secs::option", rename = "min_delay_secs")]
    pub min_delay: Option<Duration>,

    /// Time bound for one call.
    #[serde(with = "secs", rename = "timeout_secs")]
    pub timeout: Duration,

    /// All interest groups draw from one provider quota.
    pub shared_quota: bool,

    /// Sampling temperature.
    pub temperature: f32,

    /// Answers accepted as "relevant".
    pub acceptance_tokens: Vec<String>,

    /// Answers accepted as "not relevant".
    pub rejection_tokens: Vec<String>,

    /// Verdict for ambiguous answers and failed calls.
    pub fallback: FallbackPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LlmProvider::OpenAi,
            model: api::DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key: None,
            min_delay: None,
            timeout: api::LLM_TIMEOUT,
            shared_quota: true,
            temperature: 0.1,
            acceptance_tokens: judge::ACCEPTANCE_TOKENS.iter().map(ToString::to_string).collect(),
            rejection_tokens: judge::REJECTION_TOKENS.iter().map(ToString::to_string).collect(),
            fallback: FallbackPolicy::Accept,
        }
    }
}

impl LlmConfig {
    /// Endpoint base URL, falling back to the provider default.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(match self.provider {
            LlmProvider::OpenAi => api::OPENAI_BASE_URL,
            LlmProvider::Ollama => api::OLLAMA_BASE_URL,
        })
    }

    /// Minimum delay between calls.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay.unwrap_or_else(|| judge::default_min_delay(self.provider, &self.model))
    }
}

/// Publishing toggles. Opaque to the pipeline beyond "is anything on".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkToggles {
    /// Slack channel settings.
    pub slack: Option<serde_json::Value>,
    /// Telegram channel settings.
    pub telegram: Option<serde_json::Value>,
    /// Zulip stream settings.
    pub zulip: Option<serde_json::Value>,
    /// Google Sheets settings.
    pub google_sheets: Option<serde_json::Value>,
}

impl SinkToggles {
    /// Whether any sink is configured.
    #[must_use]
    pub fn publishing_requested(&self) -> bool {
        [&self.slack, &self.telegram, &self.zulip, &self.google_sheets]
            .iter()
            .any(|sink| sink.as_ref().is_some_and(|v| !v.is_null() && v != &false))
    }
}

/// One named set of interests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestGroup {
    /// Group name, used for artifact directories and logs.
    pub name: String,

    /// One expression for every source.
    pub query: Option<String>,

    /// Expression for PubMed and arXiv (used with `query_biorxiv`).
    pub query_pubmed_arxiv: Option<String>,

    /// Expression for bioRxiv (used with `query_pubmed_arxiv`).
    pub query_biorxiv: Option<String>,

    /// Prompt override for this group.
    pub filter_prompt: Option<String>,

    /// Subset of the source-set to query for this group.
    pub databases: Option<Vec<String>>,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source-set: which bibliographic sources may be queried.
    pub databases: Vec<String>,

    /// Interest groups to run.
    pub interests: Vec<InterestGroup>,

    /// Window length in days ending today (ignored when `since` is set).
    pub since_days: Option<u32>,

    /// Explicit window start.
    pub since: Option<NaiveDate>,

    /// Explicit window end; today when absent.
    pub until: Option<NaiveDate>,

    /// Cap across all sources.
    pub total_limit: usize,

    /// Cap per source.
    pub per_source_limit: usize,

    /// Order in which duplicates keep their first-seen copy.
    pub source_priority: Vec<String>,

    /// Working directory for per-run artifacts.
    pub work_dir: PathBuf,

    /// How expressions are fitted to OR-only sources.
    pub degradation: DegradationPolicy,

    /// Wall-clock budget for one group run.
    #[serde(with = "secs::option", rename = "time_budget_secs")]
    pub time_budget: Option<Duration>,

    /// Time bound for one source's search.
    #[serde(with = "secs", rename = "source_timeout_secs")]
    pub source_timeout: Duration,

    /// Time bound for one registry lookup.
    #[serde(with = "secs", rename = "lookup_timeout_secs")]
    pub lookup_timeout: Duration,

    /// Per-request HTTP timeout.
    #[serde(with = "secs", rename = "request_timeout_secs")]
    pub request_timeout: Duration,

    /// Connection timeout.
    #[serde(with = "secs", rename = "connect_timeout_secs")]
    pub connect_timeout: Duration,

    /// Retries for transient HTTP failures.
    pub max_retries: u32,

    /// Delay between NCBI requests; derived from key presence when absent.
    #[serde(with = "secs::option", rename = "ncbi_delay_secs")]
    pub ncbi_delay: Option<Duration>,

    /// Delay between arXiv requests.
    #[serde(with = "secs", rename = "arxiv_delay_secs")]
    pub arxiv_delay: Duration,

    /// Query PubMed for DOIs of PubMed records that lack one.
    pub registry_lookup: bool,

    /// NCBI API key (optional, enables higher rate limits).
    pub ncbi_api_key: Option<String>,

    /// Prompt used by every group without an override.
    pub filter_prompt: Option<String>,

    /// Relevance judge.
    pub llm: LlmConfig,

    /// Publishing toggles.
    pub sinks: SinkToggles,

    /// Remote API base URLs.
    pub endpoints: Endpoints,

    /// Cache TTL for registry lookups.
    #[serde(skip)]
    pub cache_ttl: Duration,

    /// Maximum cache size.
    #[serde(skip)]
    pub cache_max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            databases: vec!["biorxiv".to_string(), "pubmed".to_string()],
            interests: Vec::new(),
            since_days: None,
            since: None,
            until: None,
            total_limit: api::TOTAL_LIMIT,
            per_source_limit: api::PER_SOURCE_LIMIT,
            source_priority: Vec::new(),
            work_dir: PathBuf::from("paper-scout-work"),
            degradation: DegradationPolicy::Union,
            time_budget: None,
            source_timeout: api::SOURCE_TIMEOUT,
            lookup_timeout: api::LOOKUP_TIMEOUT,
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            max_retries: api::MAX_RETRIES,
            ncbi_delay: None,
            arxiv_delay: api::ARXIV_RATE_LIMIT_DELAY,
            registry_lookup: true,
            ncbi_api_key: None,
            filter_prompt: None,
            llm: LlmConfig::default(),
            sinks: SinkToggles::default(),
            endpoints: Endpoints::default(),
            cache_ttl: api::CACHE_TTL,
            cache_max_size: api::CACHE_MAX_SIZE,
        }
    }
}

/// A validated interest group, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    /// Group name.
    pub name: String,
    /// Sources to query, in priority order.
    pub sources: Vec<Source>,
    /// Expression for the boolean source family.
    pub boolean_query: Option<Expr>,
    /// Expression for the disjunctive source family.
    pub disjunctive_query: Option<Expr>,
    /// Relevance prompt (empty when filtering is off).
    pub filter_prompt: String,
}

impl GroupPlan {
    /// Expression to translate for `source`, if the group has one.
    #[must_use]
    pub fn expression_for(&self, source: Source) -> Option<&Expr> {
        match source.family() {
            crate::models::SourceFamily::Boolean => self.boolean_query.as_ref(),
            crate::models::SourceFamily::Disjunctive => self.disjunctive_query.as_ref(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and overlay secrets from the environment.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let mut config = Self::from_json(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from JSON text.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Fill unset secrets from environment variables.
    pub fn apply_env(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = env_var("OPENAI_API_KEY");
        }
        if self.ncbi_api_key.is_none() {
            self.ncbi_api_key = env_var("NCBI_API_KEY");
        }
    }

    /// Create a test configuration with every endpoint pointing at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            databases: vec!["pubmed".to_string(), "arxiv".to_string(), "biorxiv".to_string()],
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            source_timeout: Duration::from_secs(10),
            lookup_timeout: Duration::from_secs(2),
            max_retries: 0,
            ncbi_delay: Some(Duration::ZERO), // No delay in tests
            arxiv_delay: Duration::ZERO,
            cache_ttl: Duration::from_secs(0), // No caching in tests
            cache_max_size: 0,
            endpoints: Endpoints {
                ncbi: format!("{base_url}/entrez/eutils"),
                arxiv: format!("{base_url}/api/query"),
                biorxiv: base_url.to_string(),
            },
            llm: LlmConfig {
                base_url: Some(format!("{base_url}/v1")),
                api_key: Some("test-key".to_string()),
                min_delay: Some(Duration::ZERO),
                timeout: Duration::from_secs(5),
                ..LlmConfig::default()
            },
            ..Self::default()
        }
    }

    /// Delay between NCBI requests, faster when an API key is present.
    #[must_use]
    pub fn ncbi_rate_limit_delay(&self) -> Duration {
        self.ncbi_delay.unwrap_or(if self.has_ncbi_key() {
            api::NCBI_RATE_LIMIT_DELAY_WITH_KEY
        } else {
            api::NCBI_RATE_LIMIT_DELAY
        })
    }

    /// Check if an NCBI API key is configured.
    #[must_use]
    pub fn has_ncbi_key(&self) -> bool {
        self.ncbi_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Record budgets.
    #[must_use]
    pub const fn limits(&self) -> SearchLimits {
        SearchLimits { total: self.total_limit, per_source: self.per_source_limit }
    }

    /// The configured source-set, deduplicated, in config order.
    pub fn source_set(&self) -> ConfigResult<Vec<Source>> {
        if self.databases.is_empty() {
            return Err(ConfigError::invalid("databases", "at least one source is required"));
        }
        parse_sources("databases", &self.databases)
    }

    /// Source priority for deduplication: configured order, then the rest of
    /// the source-set in config order.
    pub fn priority(&self) -> ConfigResult<Vec<Source>> {
        let set = self.source_set()?;
        let mut order = parse_sources("source_priority", &self.source_priority)?;
        if let Some(stray) = order.iter().find(|s| !set.contains(s)) {
            return Err(ConfigError::invalid(
                "source_priority",
                format!("{} is not in the configured databases", stray.as_str()),
            ));
        }
        for source in set {
            if !order.contains(&source) {
                order.push(source);
            }
        }
        Ok(order)
    }

    /// Search window relative to `today`.
    pub fn window(&self, today: NaiveDate) -> ConfigResult<SearchWindow> {
        let until = self.until.unwrap_or(today);
        let window = match self.since {
            Some(since) => SearchWindow::new(since, until),
            None => SearchWindow::last_days(self.since_days.unwrap_or(1), until),
        };
        if !window.is_valid() {
            return Err(ConfigError::invalid(
                "since",
                format!("window start {} is after end {}", window.since, window.until),
            ));
        }
        Ok(window)
    }

    /// Validate the whole configuration and build one plan per interest group.
    pub fn validate(&self) -> ConfigResult<Vec<GroupPlan>> {
        let source_set = self.source_set()?;
        let priority = self.priority()?;

        if self.total_limit == 0 {
            return Err(ConfigError::invalid("total_limit", "must be greater than zero"));
        }
        if self.per_source_limit == 0 {
            return Err(ConfigError::invalid("per_source_limit", "must be greater than zero"));
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(ConfigError::invalid("since", "must not be after 'until'"));
            }
        }
        if self.interests.is_empty() {
            return Err(ConfigError::invalid("interests", "at least one interest group is required"));
        }
        if self.llm.enabled {
            self.validate_llm()?;
        }

        let mut names = HashSet::new();
        let mut plans = Vec::with_capacity(self.interests.len());
        for (i, group) in self.interests.iter().enumerate() {
            let plan = self.plan_group(i, group, &source_set, &priority)?;
            if !names.insert(plan.name.clone()) {
                return Err(ConfigError::invalid(
                    format!("interests[{i}].name"),
                    format!("duplicate group name '{}'", plan.name),
                ));
            }
            plans.push(plan);
        }
        Ok(plans)
    }

    fn validate_llm(&self) -> ConfigResult<()> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::invalid("llm.model", "must not be empty"));
        }
        if self.llm.provider == LlmProvider::OpenAi
            && self.llm.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "llm.api_key",
                "required for the openai provider (or set OPENAI_API_KEY)",
            ));
        }
        if self.llm.acceptance_tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::invalid("llm.acceptance_tokens", "must not be empty"));
        }
        url::Url::parse(self.llm.base_url())
            .map_err(|e| ConfigError::invalid("llm.base_url", e.to_string()))?;
        Ok(())
    }

    fn plan_group(
        &self,
        index: usize,
        group: &InterestGroup,
        source_set: &[Source],
        priority: &[Source],
    ) -> ConfigResult<GroupPlan> {
        let field = |name: &str| format!("interests[{index}].{name}");

        let name = if group.name.trim().is_empty() {
            format!("group-{}", index + 1)
        } else {
            group.name.trim().to_string()
        };
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ConfigError::invalid(field("name"), "must be usable as a directory name"));
        }

        let requested = match &group.databases {
            Some(list) => {
                let sources = parse_sources(&field("databases"), list)?;
                if let Some(stray) = sources.iter().find(|s| !source_set.contains(s)) {
                    return Err(ConfigError::invalid(
                        field("databases"),
                        format!("{} is not in the configured databases", stray.as_str()),
                    ));
                }
                sources
            }
            None => source_set.to_vec(),
        };
        let sources: Vec<Source> =
            priority.iter().copied().filter(|s| requested.contains(s)).collect();

        let (boolean_query, disjunctive_query) = match (
            non_blank(group.query.as_deref()),
            non_blank(group.query_pubmed_arxiv.as_deref()),
            non_blank(group.query_biorxiv.as_deref()),
        ) {
            (Some(query), _, _) => {
                let expr = parse_query(&field("query"), query)?;
                (Some(expr.clone()), Some(expr))
            }
            (None, Some(pub_arx), Some(biorxiv)) => (
                Some(parse_query(&field("query_pubmed_arxiv"), pub_arx)?),
                Some(parse_query(&field("query_biorxiv"), biorxiv)?),
            ),
            _ => {
                return Err(ConfigError::invalid(
                    field("query"),
                    "set 'query', or both 'query_pubmed_arxiv' and 'query_biorxiv'",
                ));
            }
        };

        let filter_prompt = non_blank(group.filter_prompt.as_deref())
            .or(non_blank(self.filter_prompt.as_deref()))
            .unwrap_or_default()
            .to_string();
        if self.llm.enabled && filter_prompt.is_empty() {
            return Err(ConfigError::invalid(
                field("filter_prompt"),
                "a filter prompt is required when llm filtering is enabled",
            ));
        }

        Ok(GroupPlan { name, sources, boolean_query, disjunctive_query, filter_prompt })
    }
}

fn parse_sources(field: &str, names: &[String]) -> ConfigResult<Vec<Source>> {
    let mut sources = Vec::with_capacity(names.len());
    for name in names {
        let source: Source = name.parse().map_err(|e: String| ConfigError::invalid(field, e))?;
        if sources.contains(&source) {
            return Err(ConfigError::invalid(field, format!("{} listed twice", source.as_str())));
        }
        sources.push(source);
    }
    Ok(sources)
}

fn parse_query(field: &str, text: &str) -> ConfigResult<Expr> {
    Expr::parse(text).map_err(|e| ConfigError::query(field, e))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(query: &str) -> InterestGroup {
        InterestGroup {
            name: "lab".to_string(),
            query: Some(query.to_string()),
            ..InterestGroup::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.ncbi_api_key.is_none());
        assert!(!config.has_ncbi_key());
        assert_eq!(config.limits(), SearchLimits { total: 1200, per_source: 400 });
        assert_eq!(config.ncbi_rate_limit_delay(), api::NCBI_RATE_LIMIT_DELAY);
    }

    #[test]
    fn test_ncbi_key_speeds_up_delay() {
        let config = Config { ncbi_api_key: Some("key".to_string()), ..Config::default() };
        assert_eq!(config.ncbi_rate_limit_delay(), api::NCBI_RATE_LIMIT_DELAY_WITH_KEY);
    }

    #[test]
    fn test_default_judge_delay_by_model() {
        use judge::default_min_delay;
        assert_eq!(
            default_min_delay(LlmProvider::OpenAi, "gemini-2.5-flash-lite"),
            Duration::from_millis(4500)
        );
        assert_eq!(default_min_delay(LlmProvider::OpenAi, "gpt-4o"), Duration::from_millis(3100));
        assert_eq!(
            default_min_delay(LlmProvider::OpenAi, "gpt-3.5-turbo"),
            Duration::from_millis(200)
        );
        assert_eq!(default_min_delay(LlmProvider::Ollama, "llama3"), Duration::ZERO);
    }

    #[test]
    fn test_priority_appends_unlisted_sources() {
        let config = Config {
            databases: vec!["pubmed".into(), "arxiv".into(), "biorxiv".into()],
            source_priority: vec!["biorxiv".into()],
            ..Config::default()
        };
        assert_eq!(
            config.priority().unwrap(),
            vec![Source::BioRxiv, Source::PubMed, Source::ArXiv]
        );
    }

    #[test]
    fn test_window_from_since_days() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();
        let config = Config { since_days: Some(3), ..Config::default() };
        let window = config.window(today).unwrap();
        assert_eq!(window.since, NaiveDate::from_ymd_opt(2024, 10, 13).unwrap());
        assert_eq!(window.until, today);
    }

    #[test]
    fn test_validate_single_query_feeds_both_families() {
        let config = Config { interests: vec![group("[crispr] OR [base editing]")], ..Config::default() };
        let plans = config.validate().unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].boolean_query.is_some());
        assert_eq!(plans[0].boolean_query, plans[0].disjunctive_query);
        assert_eq!(plans[0].sources, vec![Source::BioRxiv, Source::PubMed]);
    }

    #[test]
    fn test_secs_fields_parse_from_json() {
        let config = Config::from_json(
            r#"{"lookup_timeout_secs": 0.25, "llm": {"min_delay_secs": 4.5}}"#,
        )
        .unwrap();
        assert_eq!(config.lookup_timeout, Duration::from_millis(250));
        assert_eq!(config.llm.min_delay(), Duration::from_millis(4500));
    }

    #[test]
    fn test_sink_toggles() {
        assert!(!SinkToggles::default().publishing_requested());
        let sinks = SinkToggles {
            slack: Some(serde_json::json!({"channel_id": "C1"})),
            ..SinkToggles::default()
        };
        assert!(sinks.publishing_requested());
        let off = SinkToggles { zulip: Some(serde_json::json!(false)), ..SinkToggles::default() };
        assert!(!off.publishing_requested());
    }
}
