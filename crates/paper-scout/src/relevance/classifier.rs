//! Two-set token classifier for judge answers.

use serde::Serialize;

use crate::config::LlmConfig;

/// Outcome of classifying one judge answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Matched an acceptance token.
    Accept,
    /// Matched a rejection token.
    Reject,
    /// Matched neither set, or both equally well.
    Ambiguous,
}

/// Classifies answers by their leading token.
///
/// The normalized answer (lowercased, surrounding quotes and punctuation
/// stripped, whitespace collapsed) must equal a token or start with one at a
/// word boundary. The longest matching token decides; a tie between the two
/// sets or no match at all is [`Verdict::Ambiguous`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClassifier {
    acceptance: Vec<String>,
    rejection: Vec<String>,
}

impl TokenClassifier {
    /// Build a classifier from token lists. Blank tokens are ignored.
    #[must_use]
    pub fn new<A, R, S, T>(acceptance: A, rejection: R) -> Self
    where
        A: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self { acceptance: tokens(acceptance), rejection: tokens(rejection) }
    }

    /// Classifier with the configured token lists.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(&config.acceptance_tokens, &config.rejection_tokens)
    }

    /// Classify a raw answer.
    #[must_use]
    pub fn classify(&self, answer: &str) -> Verdict {
        let answer = normalize(answer);
        if answer.is_empty() {
            return Verdict::Ambiguous;
        }
        let accept = longest_match(&self.acceptance, &answer);
        let reject = longest_match(&self.rejection, &answer);
        match (accept, reject) {
            (Some(a), Some(r)) if a > r => Verdict::Accept,
            (Some(a), Some(r)) if r > a => Verdict::Reject,
            (Some(_), None) => Verdict::Accept,
            (None, Some(_)) => Verdict::Reject,
            _ => Verdict::Ambiguous,
        }
    }
}

fn tokens<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|t| normalize(t.as_ref())).filter(|t| !t.is_empty()).collect()
}

fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let trimmed = lowered.trim_matches(|c: char| !c.is_alphanumeric());
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of the longest token that `answer` equals or starts with at a word boundary.
fn longest_match(tokens: &[String], answer: &str) -> Option<usize> {
    tokens
        .iter()
        .filter(|token| {
            answer.strip_prefix(token.as_str()).is_some_and(|rest| {
                rest.chars().next().is_none_or(|c| !c.is_alphanumeric())
            })
        })
        .map(String::len)
        .max()
}
