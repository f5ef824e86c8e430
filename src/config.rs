//! Run configuration.
//!
//! Defaults first, then environment variables, then command-line flags in
//! the binary. Only `validate` failures are fatal.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::evaluator::RiskModel;
use crate::fetcher::FetchConfig;
use crate::llm::ChatConfig;
use crate::serpapi::SerpApiConfig;
use crate::strategy::GeneratorConfig;

pub const ENV_SERPAPI_KEY: &str = "SERPAPI_KEY";
pub const ENV_CALL_BUDGET: &str = "FLEXIFLIGHT_CALL_BUDGET";
pub const ENV_WORKERS: &str = "FLEXIFLIGHT_WORKERS";
pub const ENV_CACHE_FILE: &str = "FLEXIFLIGHT_CACHE_FILE";
pub const ENV_LLM_ENDPOINT: &str = "FLEXIFLIGHT_LLM_ENDPOINT";
pub const ENV_TOP_N: &str = "FLEXIFLIGHT_TOP_N";
pub const ENV_CARRY_ON_FEE: &str = "FLEXIFLIGHT_CARRY_ON_FEE";
pub const ENV_CHECKED_BAG_FEE: &str = "FLEXIFLIGHT_CHECKED_BAG_FEE";

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Ranked options returned per run.
    pub top_n: usize,
    /// Strategies evaluated concurrently.
    pub workers: usize,
    pub generator: GeneratorConfig,
    pub fetch: FetchConfig,
    pub risk: RiskModel,
    pub serpapi: SerpApiConfig,
    /// Set when a language model backs extraction and explanation.
    pub chat: Option<ChatConfig>,
    /// Persistent cache location. `None` keeps the cache in memory.
    pub cache_file: Option<PathBuf>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            workers: 4,
            generator: GeneratorConfig::default(),
            fetch: FetchConfig::default(),
            risk: RiskModel::default(),
            serpapi: SerpApiConfig::default(),
            chat: None,
            cache_file: None,
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Layer variables from `lookup` over the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var(ENV_SERPAPI_KEY) {
            config.serpapi.api_key = key;
        }
        if let Some(budget) = var(ENV_CALL_BUDGET) {
            config.fetch.call_budget = parse(ENV_CALL_BUDGET, &budget)?;
        }
        if let Some(workers) = var(ENV_WORKERS) {
            config.workers = parse(ENV_WORKERS, &workers)?;
        }
        if let Some(top_n) = var(ENV_TOP_N) {
            config.top_n = parse(ENV_TOP_N, &top_n)?;
        }
        if let Some(fee) = var(ENV_CARRY_ON_FEE) {
            config.serpapi.carry_on_fee = Some(parse(ENV_CARRY_ON_FEE, &fee)?);
        }
        if let Some(fee) = var(ENV_CHECKED_BAG_FEE) {
            config.serpapi.checked_bag_fee = Some(parse(ENV_CHECKED_BAG_FEE, &fee)?);
        }
        if let Some(path) = var(ENV_CACHE_FILE) {
            config.cache_file = Some(PathBuf::from(path));
        }
        if let Some(endpoint) = var(ENV_LLM_ENDPOINT) {
            config.chat = Some(ChatConfig {
                endpoint,
                ..ChatConfig::default()
            });
        }
        Ok(config)
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.generator.holidays
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroLimit("workers"));
        }
        if self.generator.max_strategies == 0 {
            return Err(ConfigError::ZeroLimit("max_strategies"));
        }
        let fees = [self.serpapi.carry_on_fee, self.serpapi.checked_bag_fee];
        if fees.iter().flatten().any(|fee| !fee.is_finite() || *fee < 0.0) {
            return Err(ConfigError::NegativeFee);
        }
        if self.fetch.timeout.is_zero() {
            return Err(ConfigError::ZeroLimit("provider timeout"));
        }
        Ok(())
    }

    /// The provider key, required only when live calls may be made.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        if self.serpapi.api_key.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_SERPAPI_KEY));
        }
        Ok(&self.serpapi.api_key)
    }
}
