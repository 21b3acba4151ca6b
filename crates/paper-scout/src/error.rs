//! Error types for the paper discovery pipeline.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Only [`ConfigError`] ever escapes the pipeline; the other kinds are recovered
//! inside the stage that produced them.

use std::path::PathBuf;
use std::time::Duration;

/// Errors from the HTTP client layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error (includes exhausted retries)
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Rate limited by the upstream API (429 response)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait time before retry
        retry_after: Duration,
    },

    /// Resource not found (404 response)
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Invalid request parameters (400 response)
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message from API
        message: String,
    },

    /// Request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// XML parsing error (PubMed efetch, arXiv Atom)
    #[error("Failed to parse XML response: {0}")]
    Xml(String),

    /// Well-formed body that lacks the expected structure
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

impl ClientError {
    /// Create a rate limited error with retry-after duration.
    #[must_use]
    pub fn rate_limited(seconds: u64) -> Self {
        Self::RateLimited { retry_after: Duration::from_secs(seconds) }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Create a malformed-response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout(_) | Self::Server { .. })
    }

    /// Get the retry-after duration if this is a rate limit error.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for ClientError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

/// Errors in an interest expression.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Expression has no terms at all
    #[error("expression is empty")]
    Empty,

    /// A `(` without matching `)` or the reverse
    #[error("unbalanced parenthesis at offset {offset}")]
    UnbalancedParen {
        /// Byte offset of the offending parenthesis
        offset: usize,
    },

    /// Operator with a missing operand
    #[error("operator {operator} at offset {offset} is missing an operand")]
    DanglingOperator {
        /// The operator keyword
        operator: String,
        /// Byte offset of the operator
        offset: usize,
    },

    /// `[term` or `"term` without a closing delimiter
    #[error("unterminated term starting at offset {offset}")]
    UnterminatedTerm {
        /// Byte offset of the opening delimiter
        offset: usize,
    },

    /// Parentheses or `NOT`s nested deeper than the parser allows
    #[error("expression nests too deeply at offset {offset}")]
    TooDeep {
        /// Byte offset of the token that crossed the limit
        offset: usize,
    },
}

/// Configuration errors. Detected before any network call and fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Cannot read config {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the schema
    #[error("Cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A setting has an invalid value
    #[error("Invalid config for '{field}': {message}")]
    Invalid {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// An interest expression does not parse
    #[error("Invalid query in '{field}': {source}")]
    Query {
        /// Field holding the expression
        field: String,
        /// Parse failure
        source: QueryError,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { field: field.into(), message: message.into() }
    }

    /// Create a query error for the given field.
    #[must_use]
    pub fn query(field: impl Into<String>, source: QueryError) -> Self {
        Self::Query { field: field.into(), source }
    }
}

/// Errors from the working-directory artifact store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Artifact is not valid JSON
    #[error("Corrupt artifact: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
