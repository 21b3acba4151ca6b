//! Relevance filtering with an LLM judge.
//!
//! Each record is judged once, one call at a time, with a minimum delay
//! between calls. Unclear answers and failed calls fall back to the
//! configured [`FallbackPolicy`], which by default keeps the record.

mod classifier;
mod judge;

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

pub use classifier::{TokenClassifier, Verdict};
pub use judge::{LlmJudge, OllamaJudge, OpenAiJudge, judge_from_config, user_message};

use crate::client::Pacer;
use crate::models::{FallbackPolicy, JudgeStats, PaperRecord};

/// Result of [`RelevanceFilter::filter`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOutcome {
    /// Records judged relevant, in input order.
    pub records: Vec<PaperRecord>,
    /// Verdict counters.
    pub stats: JudgeStats,
    /// The deadline passed before every record was judged.
    pub truncated: bool,
}

/// Sequential, paced relevance gate.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    judge: Arc<dyn LlmJudge>,
    classifier: TokenClassifier,
    fallback: FallbackPolicy,
    pacer: Pacer,
    prompt: String,
}

impl RelevanceFilter {
    /// Create a filter asking `judge` with `prompt` as the system message.
    #[must_use]
    pub fn new(
        judge: Arc<dyn LlmJudge>,
        classifier: TokenClassifier,
        fallback: FallbackPolicy,
        pacer: Pacer,
        prompt: impl Into<String>,
    ) -> Self {
        Self { judge, classifier, fallback, pacer, prompt: prompt.into() }
    }

    /// Judge one record and return whether it is kept.
    pub async fn judge(&self, record: &PaperRecord, stats: &mut JudgeStats) -> bool {
        self.pacer.wait().await;

        let message = user_message(&record.title, &record.keywords);
        match self.judge.ask(&self.prompt, &message).await {
            Ok(answer) => match self.classifier.classify(&answer) {
                Verdict::Accept => {
                    stats.accepted += 1;
                    true
                }
                Verdict::Reject => {
                    stats.rejected += 1;
                    false
                }
                Verdict::Ambiguous => {
                    stats.ambiguous += 1;
                    tracing::warn!(
                        title = %record.title,
                        answer = %answer.trim(),
                        fallback = ?self.fallback,
                        "ambiguous judge answer"
                    );
                    self.fallback.keeps()
                }
            },
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    title = %record.title,
                    error = %e,
                    fallback = ?self.fallback,
                    "judge call failed"
                );
                self.fallback.keeps()
            }
        }
    }

    /// Judge every record in order, keeping the relevant ones.
    ///
    /// Once `deadline` passes, judging stops and the records accepted so far
    /// are returned with `truncated` set.
    pub async fn filter(&self, records: Vec<PaperRecord>, deadline: Option<Instant>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        let total = records.len();

        for (index, mut record) in records.into_iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                outcome.stats.unjudged = total - index;
                outcome.truncated = true;
                tracing::warn!(unjudged = outcome.stats.unjudged, "run deadline passed, stopping relevance filter");
                break;
            }
            let keep = self.judge(&record, &mut outcome.stats).await;
            record.set_relevance(keep);
            if keep {
                outcome.records.push(record);
            }
        }

        tracing::info!(
            judged = outcome.stats.calls(),
            kept = outcome.records.len(),
            ambiguous = outcome.stats.ambiguous,
            failed = outcome.stats.failed,
            "relevance filter finished"
        );
        outcome
    }
}
