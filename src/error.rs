//! Error types for the flight planner.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for whole-pipeline operations.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Failure talking to the external flight-data provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status other than 429.
    #[error("provider returned status {0}")]
    Status(u16),

    /// The call did not complete within the configured timeout.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Response body could not be understood.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Provider reported an error in its payload.
    #[error("provider error: {0}")]
    Api(String),
}

/// Outcome of a failed quote for one routing strategy.
///
/// Cloneable so a single in-flight fetch can hand the same failure to every
/// waiter on that fingerprint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("provider rate limit reached")]
    RateLimited,

    #[error("provider returned no results")]
    NoResults,

    #[error("external call budget of {limit} exhausted")]
    BudgetExceeded { limit: usize },
}

impl FetchError {
    /// Provider-side failures, as opposed to budget or empty-result outcomes.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, FetchError::Provider(_) | FetchError::RateLimited)
    }
}

/// Errors from the persistent side of the response cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// A persisted entry could not be parsed. Never fatal: the entry is
    /// dropped and behaves as a miss.
    #[error("corrupt cache entry on line {line}: {reason}")]
    Corruption { line: usize, reason: String },

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Startup configuration errors. These are the only fatal errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid weight profile: {0}")]
    InvalidWeights(String),

    #[error("top-N must be at least 1")]
    ZeroTopN,

    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("bag fee estimates must be finite and not negative")]
    NegativeFee,

    #[error("missing configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("could not build worker pool: {0}")]
    WorkerPool(String),

    #[error("invalid travel request: {0}")]
    InvalidRequest(String),
}

/// Failure turning free text into a structured travel request.
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("could not understand request: {0}")]
    Unrecognized(String),

    #[error("language model call failed: {0}")]
    Llm(String),

    #[error("language model reply was not a valid request: {0}")]
    InvalidReply(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Run-level outcomes that leave nothing to rank.
#[derive(Error, Debug)]
pub enum PlanError {
    /// No routing strategy survived pruning.
    #[error("request is infeasible under its hard constraints")]
    Infeasible,

    /// Strategies existed but every itinerary option was filtered out or
    /// failed to fetch.
    #[error("no itinerary satisfied the request ({strategies} strategies, {failures} failed)")]
    NoCandidates { strategies: usize, failures: usize },

    /// Every strategy failed at the provider.
    #[error("flight provider unavailable ({failures} strategies failed)")]
    ProviderUnavailable { failures: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
