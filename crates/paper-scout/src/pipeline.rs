//! Run orchestration.
//!
//! One run per interest group: translate, search every configured source
//! concurrently, persist and reload the raw artifacts, resolve identifiers,
//! deduplicate, then filter. Groups run concurrently and share nothing but
//! the HTTP layer and, optionally, the judge's pacing quota.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{HttpClient, Pacer};
use crate::config::{Config, GroupPlan};
use crate::error::{ConfigError, ConfigResult};
use crate::models::{
    PaperRecord, RunStats, SearchWindow, Source, SourceStats, SourceStatus,
};
use crate::query::{SourceQuery, translate};
use crate::reconcile::{SourceBatch, merge};
use crate::relevance::{LlmJudge, RelevanceFilter, TokenClassifier, judge_from_config};
use crate::resolver::{IdentifierResolver, RegistryLookup};
use crate::sources::{PubMedClient, SourceClient, client_for};
use crate::store::WorkDir;

/// Final output of one group run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Papers that survived every stage.
    pub papers: Vec<PaperRecord>,
    /// Stage counts and warnings.
    pub stats: RunStats,
}

/// State threaded through the stages of one group run.
#[derive(Debug)]
pub struct RunContext {
    /// Group being run.
    pub group: String,
    /// Searched window.
    pub window: SearchWindow,
    /// Date used to name this run's artifacts.
    pub run_date: NaiveDate,
    /// Wall-clock limit for the whole run.
    pub deadline: Option<Instant>,
    /// Statistics collected so far.
    pub stats: RunStats,
}

impl RunContext {
    /// Start a run.
    #[must_use]
    pub fn new(group: &str, window: SearchWindow, budget: Option<Duration>) -> Self {
        Self {
            group: group.to_string(),
            window,
            run_date: window.until,
            deadline: budget.map(|b| Instant::now() + b),
            stats: RunStats::new(group, window),
        }
    }

    /// Run identifier.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.stats.run_id
    }

    /// Time left before the deadline; `None` without a budget.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Record a non-fatal warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(group = %self.group, "{message}");
        self.stats.warnings.push(message);
    }

    fn set_source(&mut self, source: Source, status: SourceStatus, raw_count: usize) {
        self.stats.per_source.retain(|s| s.source != source);
        self.stats.per_source.push(SourceStats { source, status, raw_count });
    }

    /// Finish the run.
    #[must_use]
    pub fn into_report(self, papers: Vec<PaperRecord>) -> RunReport {
        RunReport { papers, stats: self.stats }
    }
}

/// Configured pipeline, ready to run.
pub struct Pipeline {
    config: Config,
    plans: Vec<GroupPlan>,
    priority: Vec<Source>,
    clients: HashMap<Source, Arc<dyn SourceClient>>,
    registry: Option<Arc<dyn RegistryLookup>>,
    judge: Option<Arc<dyn LlmJudge>>,
    judge_pacer: Pacer,
    store: WorkDir,
}

impl Pipeline {
    /// Validate `config` and build every client. No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any invalid setting.
    pub fn new(config: Config) -> ConfigResult<Self> {
        let plans = config.validate()?;
        let priority = config.priority()?;
        let http = HttpClient::new(&config)
            .map_err(|e| ConfigError::invalid("http", format!("cannot build HTTP client: {e}")))?;

        let pubmed = Arc::new(PubMedClient::new(http.clone(), &config));
        let clients = priority
            .iter()
            .map(|&source| {
                let client: Arc<dyn SourceClient> = match source {
                    Source::PubMed => pubmed.clone(),
                    other => client_for(other, &http, &config),
                };
                (source, client)
            })
            .collect();
        let registry: Option<Arc<dyn RegistryLookup>> =
            config.registry_lookup.then(|| pubmed as Arc<dyn RegistryLookup>);

        let judge = config.llm.enabled.then(|| judge_from_config(http.clone(), &config.llm));
        let judge_pacer = Pacer::new(config.llm.min_delay());
        let store = WorkDir::new(&config.work_dir);

        Ok(Self { config, plans, priority, clients, registry, judge, judge_pacer, store })
    }

    /// Validated interest groups.
    #[must_use]
    pub fn plans(&self) -> &[GroupPlan] {
        &self.plans
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Artifact store.
    #[must_use]
    pub const fn store(&self) -> &WorkDir {
        &self.store
    }

    /// Run every interest group concurrently.
    pub async fn run(&self, window: SearchWindow) -> Vec<RunReport> {
        join_all(self.plans.iter().map(|plan| self.run_group(plan, window))).await
    }

    /// Run one interest group.
    pub async fn run_group(&self, plan: &GroupPlan, window: SearchWindow) -> RunReport {
        let ctx = RunContext::new(&plan.name, window, self.config.time_budget);
        let span = tracing::info_span!("group_run", group = %plan.name, run_id = %ctx.run_id());
        self.execute(plan, ctx).instrument(span).await
    }

    async fn execute(&self, plan: &GroupPlan, mut ctx: RunContext) -> RunReport {
        tracing::info!(since = %ctx.window.since, until = %ctx.window.until, "starting run");

        let queries = self.translate_all(plan, &mut ctx);
        let batches = self.collect(&queries, &mut ctx).await;
        let batches = self.truncate(batches, &mut ctx);
        let batches = self.resolve(batches, &mut ctx).await;

        let merged = merge(batches, &self.priority);
        ctx.stats.deduplicated_count = merged.records.len();
        ctx.stats.duplicates_removed = merged.duplicates_removed;

        let papers = self.filter(plan, merged.records, &mut ctx).await;
        ctx.stats.filtered_count = papers.len();

        match self.store.cleanup_stale(&ctx.group, ctx.run_date).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "removed stale artifacts"),
            Err(e) => ctx.warn(format!("artifact cleanup failed: {e}")),
        }

        tracing::info!(
            raw = ctx.stats.raw_count,
            resolved = ctx.stats.resolved_count,
            deduplicated = ctx.stats.deduplicated_count,
            filtered = ctx.stats.filtered_count,
            truncated = ctx.stats.truncated,
            "run finished"
        );
        ctx.into_report(papers)
    }

    /// Translate the group's expressions for each source it may query.
    fn translate_all(&self, plan: &GroupPlan, ctx: &mut RunContext) -> Vec<SourceQuery> {
        let mut queries = Vec::new();
        for &source in &self.priority {
            let expr = plan.expression_for(source).filter(|_| plan.sources.contains(&source));
            let Some(expr) = expr else {
                ctx.set_source(source, SourceStatus::Skipped, 0);
                continue;
            };
            let query = translate(expr, source, self.config.degradation);
            for warning in &query.warnings {
                ctx.warn(warning.to_string());
            }
            if query.is_empty() {
                ctx.set_source(source, SourceStatus::Skipped, 0);
                continue;
            }
            tracing::debug!(source = %source, query = %query.text, "translated query");
            queries.push(query);
        }
        queries
    }

    /// Query the sources concurrently, then persist and reload their artifacts.
    async fn collect(&self, queries: &[SourceQuery], ctx: &mut RunContext) -> Vec<SourceBatch> {
        let limits = self.config.limits();
        let window = ctx.window;
        let source_timeout = self.config.source_timeout;
        let remaining = ctx.remaining();
        let bound = remaining.map_or(source_timeout, |left| left.min(source_timeout));
        let deadline_bound = remaining.is_some_and(|left| left < source_timeout);

        let searches = queries.iter().filter_map(|query| {
            let client = self.clients.get(&query.source)?;
            Some(async move {
                let result = tokio::time::timeout(bound, client.try_search(query, window, limits)).await;
                (query.source, result)
            })
        });
        let results = join_all(searches).await;

        let mut batches = Vec::new();
        for (source, result) in results {
            let records = match result {
                Ok(Ok(records)) => records,
                Ok(Err(e)) => {
                    ctx.warn(format!("{source} unavailable: {e}"));
                    ctx.set_source(source, SourceStatus::Failed, 0);
                    continue;
                }
                Err(_) => {
                    ctx.warn(format!("{source} timed out after {bound:?}"));
                    ctx.set_source(source, SourceStatus::TimedOut, 0);
                    ctx.stats.truncated |= deadline_bound;
                    continue;
                }
            };
            let records = self.persist_and_reload(source, records, ctx).await;
            ctx.set_source(source, SourceStatus::Queried, records.len());
            batches.push(SourceBatch::new(source, records));
        }
        batches
    }

    async fn persist_and_reload(
        &self,
        source: Source,
        records: Vec<PaperRecord>,
        ctx: &mut RunContext,
    ) -> Vec<PaperRecord> {
        if let Err(e) = self.store.save(&ctx.group, ctx.run_date, source, &records).await {
            ctx.warn(format!("cannot save {source} artifact: {e}"));
            return records;
        }
        match self.store.load(&ctx.group, ctx.run_date, source).await {
            Ok(loaded) => loaded,
            Err(e) => {
                ctx.warn(format!("cannot reload {source} artifact: {e}"));
                records
            }
        }
    }

    /// Cap the combined record count, taking sources in priority order.
    fn truncate(&self, batches: Vec<SourceBatch>, ctx: &mut RunContext) -> Vec<SourceBatch> {
        let mut budget = self.config.total_limit;
        let mut ordered = batches;
        ordered.sort_by_key(|b| self.priority.iter().position(|p| *p == b.source));

        let mut kept = Vec::with_capacity(ordered.len());
        for mut batch in ordered {
            if batch.records.len() > budget {
                tracing::debug!(source = %batch.source, dropped = batch.records.len() - budget, "total limit reached");
                batch.records.truncate(budget);
            }
            budget -= batch.records.len();
            ctx.stats.raw_count += batch.records.len();
            kept.push(batch);
        }
        kept
    }

    async fn resolve(&self, batches: Vec<SourceBatch>, ctx: &mut RunContext) -> Vec<SourceBatch> {
        let resolver = IdentifierResolver::new(self.registry.clone(), self.config.lookup_timeout)
            .with_deadline(ctx.deadline);

        let mut resolved = Vec::with_capacity(batches.len());
        for batch in batches {
            let records = resolver.resolve_all(batch.records, &mut ctx.stats.resolution).await;
            resolved.push(SourceBatch::new(batch.source, records));
        }
        ctx.stats.resolved_count = ctx.stats.resolution.resolved();
        resolved
    }

    async fn filter(
        &self,
        plan: &GroupPlan,
        records: Vec<PaperRecord>,
        ctx: &mut RunContext,
    ) -> Vec<PaperRecord> {
        let Some(judge) = &self.judge else {
            return records;
        };
        ctx.stats.filtering_enabled = true;

        let pacer = if self.config.llm.shared_quota {
            self.judge_pacer.clone()
        } else {
            Pacer::new(self.config.llm.min_delay())
        };
        let filter = RelevanceFilter::new(
            Arc::clone(judge),
            TokenClassifier::from_config(&self.config.llm),
            self.config.llm.fallback,
            pacer,
            plan.filter_prompt.clone(),
        );

        let outcome = filter.filter(records, ctx.deadline).await;
        ctx.stats.judging = outcome.stats;
        ctx.stats.truncated |= outcome.truncated;
        outcome.records
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("groups", &self.plans.len())
            .field("priority", &self.priority)
            .field("filtering", &self.judge.is_some())
            .finish_non_exhaustive()
    }
}
