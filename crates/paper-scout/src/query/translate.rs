//! Per-source rendering of interest expressions.

use std::fmt;

use serde::Serialize;

use super::Expr;
use crate::models::{DegradationPolicy, Source, SourceFamily};

/// What a source client actually evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Full boolean expression, evaluated server-side.
    Boolean(Expr),
    /// Match when any term occurs. An empty list matches nothing.
    AnyOf(Vec<String>),
}

/// A non-fatal note about lossy translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationWarning {
    /// Expression widened to a union of its positive terms.
    Degraded {
        /// Target source.
        source: Source,
        /// Expression as configured.
        original: String,
        /// Terms sent instead.
        widened: Vec<String>,
        /// Negated terms that were dropped.
        dropped_negations: Vec<String>,
    },
    /// The source cannot express these negations.
    NegationDropped {
        /// Target source.
        source: Source,
        /// Dropped terms.
        terms: Vec<String>,
    },
    /// Lossy degradation refused; the source gets no query.
    Refused {
        /// Target source.
        source: Source,
    },
}

impl fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degraded { source, original, widened, dropped_negations } => {
                write!(
                    f,
                    "{source}: '{original}' widened to any of [{}]",
                    widened.join(", ")
                )?;
                if !dropped_negations.is_empty() {
                    write!(f, "; negations dropped: [{}]", dropped_negations.join(", "))?;
                }
                Ok(())
            }
            Self::NegationDropped { source, terms } => {
                write!(f, "{source}: cannot express negation alone, dropped [{}]", terms.join(", "))
            }
            Self::Refused { source } => {
                write!(f, "{source}: expression needs AND/NOT, strict degradation skips this source")
            }
        }
    }
}

/// A query ready for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    /// Target source.
    pub source: Source,
    /// Source-native query text.
    pub text: String,
    /// Structured form used by the client.
    pub plan: QueryPlan,
    /// Translation warnings.
    pub warnings: Vec<TranslationWarning>,
}

impl SourceQuery {
    /// True when the plan cannot match anything and the source should not be queried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(&self.plan, QueryPlan::AnyOf(terms) if terms.is_empty())
    }

    /// Terms for client-side matching; empty for boolean plans.
    #[must_use]
    pub fn any_of(&self) -> &[String] {
        match &self.plan {
            QueryPlan::AnyOf(terms) => terms,
            QueryPlan::Boolean(_) => &[],
        }
    }
}

/// Translate an expression for a source. Never fails.
#[must_use]
pub fn translate(expr: &Expr, source: Source, policy: DegradationPolicy) -> SourceQuery {
    match source.family() {
        SourceFamily::Boolean => {
            let mut warnings = Vec::new();
            let text = match source {
                Source::ArXiv => render_arxiv(expr, &mut warnings),
                _ => render_pubmed(expr),
            };
            SourceQuery { source, text, plan: QueryPlan::Boolean(expr.clone()), warnings }
        }
        SourceFamily::Disjunctive => degrade(expr, source, policy),
    }
}

fn degrade(expr: &Expr, source: Source, policy: DegradationPolicy) -> SourceQuery {
    let positive: Vec<String> = expr.positive_terms().into_iter().map(str::to_string).collect();

    if expr.is_disjunctive() {
        return SourceQuery {
            source,
            text: positive.join(" OR "),
            plan: QueryPlan::AnyOf(positive),
            warnings: Vec::new(),
        };
    }

    match policy {
        DegradationPolicy::Strict => SourceQuery {
            source,
            text: String::new(),
            plan: QueryPlan::AnyOf(Vec::new()),
            warnings: vec![TranslationWarning::Refused { source }],
        },
        DegradationPolicy::Union => {
            let dropped: Vec<String> =
                expr.negated_terms().into_iter().map(str::to_string).collect();
            SourceQuery {
                source,
                text: positive.join(" OR "),
                warnings: vec![TranslationWarning::Degraded {
                    source,
                    original: expr.to_string(),
                    widened: positive.clone(),
                    dropped_negations: dropped,
                }],
                plan: QueryPlan::AnyOf(positive),
            }
        }
    }
}

fn quote(term: &str) -> String {
    format!("\"{}\"", term.replace('"', ""))
}

/// PubMed: `"term"[tiab]`, binary `NOT`, `all[sb]` anchors a leading negation.
fn render_pubmed(expr: &Expr) -> String {
    match expr {
        Expr::Term(term) => format!("{}[tiab]", quote(term)),
        Expr::Not(child) => format!("all[sb] NOT {}", pubmed_operand(child)),
        Expr::Or(children) => join(children, " OR ", pubmed_operand),
        Expr::And(children) => {
            let (negated, positive): (Vec<&Expr>, Vec<&Expr>) =
                children.iter().partition(|c| matches!(c, Expr::Not(_)));
            let mut out = if positive.is_empty() {
                "all[sb]".to_string()
            } else {
                positive.iter().map(|c| pubmed_operand(c)).collect::<Vec<_>>().join(" AND ")
            };
            for neg in negated {
                if let Expr::Not(inner) = neg {
                    out.push_str(" NOT ");
                    out.push_str(&pubmed_operand(inner));
                }
            }
            out
        }
    }
}

fn pubmed_operand(expr: &Expr) -> String {
    match expr {
        Expr::Term(_) => render_pubmed(expr),
        _ => format!("({})", render_pubmed(expr)),
    }
}

/// arXiv: `all:"term"`, `ANDNOT` for negation. A negation with nothing to
/// subtract from is dropped.
fn render_arxiv(expr: &Expr, warnings: &mut Vec<TranslationWarning>) -> String {
    match expr {
        Expr::Term(term) => format!("all:{}", quote(term)),
        Expr::Not(child) => {
            drop_negation(child, warnings);
            String::new()
        }
        Expr::Or(children) => {
            let parts: Vec<String> = children
                .iter()
                .map(|c| arxiv_operand(c, warnings))
                .filter(|s| !s.is_empty())
                .collect();
            parts.join(" OR ")
        }
        Expr::And(children) => {
            let (negated, positive): (Vec<&Expr>, Vec<&Expr>) =
                children.iter().partition(|c| matches!(c, Expr::Not(_)));
            let parts: Vec<String> = positive
                .iter()
                .map(|c| arxiv_operand(c, warnings))
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                for neg in negated {
                    if let Expr::Not(inner) = neg {
                        drop_negation(inner, warnings);
                    }
                }
                return String::new();
            }
            let mut out = parts.join(" AND ");
            for neg in negated {
                if let Expr::Not(inner) = neg {
                    let rendered = arxiv_operand(inner, warnings);
                    if !rendered.is_empty() {
                        out.push_str(" ANDNOT ");
                        out.push_str(&rendered);
                    }
                }
            }
            out
        }
    }
}

fn arxiv_operand(expr: &Expr, warnings: &mut Vec<TranslationWarning>) -> String {
    let rendered = render_arxiv(expr, warnings);
    match expr {
        Expr::Term(_) => rendered,
        _ if rendered.is_empty() => rendered,
        _ => format!("({rendered})"),
    }
}

fn drop_negation(child: &Expr, warnings: &mut Vec<TranslationWarning>) {
    let mut terms: Vec<String> = child.positive_terms().into_iter().map(str::to_string).collect();
    terms.extend(child.negated_terms().into_iter().map(str::to_string));
    warnings.push(TranslationWarning::NegationDropped { source: Source::ArXiv, terms });
}

fn join(children: &[Expr], sep: &str, render: fn(&Expr) -> String) -> String {
    children.iter().map(render).collect::<Vec<_>>().join(sep)
}
