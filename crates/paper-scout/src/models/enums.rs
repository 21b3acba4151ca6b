//! Enumeration types shared across pipeline stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A bibliographic source the pipeline can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// NCBI PubMed (peer-reviewed biomedical literature).
    PubMed,
    /// arXiv preprint server.
    ArXiv,
    /// bioRxiv preprint server.
    BioRxiv,
}

impl Source {
    /// Every supported source, in default priority order.
    pub const ALL: [Self; 3] = [Self::PubMed, Self::BioRxiv, Self::ArXiv];

    /// Lowercase key used in config files and artifact names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PubMed => "pubmed",
            Self::ArXiv => "arxiv",
            Self::BioRxiv => "biorxiv",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::PubMed => "PubMed",
            Self::ArXiv => "arXiv",
            Self::BioRxiv => "bioRxiv",
        }
    }

    /// Query-language family accepted by this source.
    #[must_use]
    pub const fn family(self) -> SourceFamily {
        match self {
            Self::PubMed | Self::ArXiv => SourceFamily::Boolean,
            Self::BioRxiv => SourceFamily::Disjunctive,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pubmed" => Ok(Self::PubMed),
            "arxiv" => Ok(Self::ArXiv),
            "biorxiv" => Ok(Self::BioRxiv),
            other => Err(format!("unknown source '{other}' (expected pubmed, arxiv or biorxiv)")),
        }
    }
}

/// Query syntax families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    /// Accepts AND, OR and NOT.
    Boolean,
    /// Only an OR-combination of terms.
    Disjunctive,
}

/// How a conjunctive or negated expression is fitted to an OR-only source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationPolicy {
    /// Union of every positively occurring term; negated terms are dropped.
    #[default]
    Union,
    /// Refuse lossy degradation; the source receives no terms and is skipped.
    Strict,
}

/// What the relevance filter does when it cannot get a clear verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Keep the record (fail-open).
    #[default]
    Accept,
    /// Drop the record.
    Reject,
}

impl FallbackPolicy {
    /// The verdict this policy stands for.
    #[must_use]
    pub const fn keeps(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// LLM service used as relevance judge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions endpoint.
    #[default]
    OpenAi,
    /// Local Ollama server.
    Ollama,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse_is_case_insensitive() {
        assert_eq!("PubMed".parse::<Source>(), Ok(Source::PubMed));
        assert_eq!(" bioRxiv ".parse::<Source>(), Ok(Source::BioRxiv));
        assert!("scopus".parse::<Source>().is_err());
    }

    #[test]
    fn test_source_families() {
        assert_eq!(Source::PubMed.family(), SourceFamily::Boolean);
        assert_eq!(Source::ArXiv.family(), SourceFamily::Boolean);
        assert_eq!(Source::BioRxiv.family(), SourceFamily::Disjunctive);
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Source::BioRxiv).unwrap();
        assert_eq!(json, "\"biorxiv\"");
        let parsed: Source = serde_json::from_str("\"arxiv\"").unwrap();
        assert_eq!(parsed, Source::ArXiv);

        let policy: FallbackPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert!(!policy.keeps());
        assert!(FallbackPolicy::default().keeps());
    }
}
