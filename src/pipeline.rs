//! One planning run: generate, evaluate in parallel, rank, assemble.
//!
//! Every piece of mutable state (call budget, cache statistics) is owned by
//! objects built for the run, so two planners never share anything but an
//! explicitly shared cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::assembler::{self, OutputRecord};
use crate::cache::ResponseCache;
use crate::config::PlannerConfig;
use crate::error::{ConfigError, FetchError, PlanError, Result};
use crate::evaluator::{default_low_cost_carriers, CandidateEvaluator};
use crate::fetcher::FlightFetcher;
use crate::itinerary::ItineraryCandidate;
use crate::ranking;
use crate::request::TravelRequest;
use crate::strategy::{RoutingStrategy, StrategyGenerator};
use crate::traits::{FlightProvider, VisaLookup};

/// Counters describing how a run went.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanStats {
    pub strategies_generated: usize,
    pub strategies_evaluated: usize,
    /// Strategies that could not be fetched because the call budget was spent.
    pub strategies_skipped: usize,
    pub strategies_cancelled: usize,
    /// Strategies the provider answered with no options.
    pub strategies_empty: usize,
    /// Provider, rate-limit and timeout failures.
    pub failures: usize,
    pub live_calls: usize,
    pub cache_hits: usize,
    pub candidates_before: usize,
    pub candidates_ranked: usize,
    /// Cheapest and dearest candidate price before ranking.
    pub price_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub request: TravelRequest,
    pub records: Vec<OutputRecord>,
    pub stats: PlanStats,
    /// Appended by an explainer after ranking.
    pub explanation: Option<String>,
}

enum Outcome {
    Candidates(Vec<ItineraryCandidate>),
    Failed(FetchError),
    Cancelled,
}

pub struct Planner {
    generator: StrategyGenerator,
    evaluator: CandidateEvaluator,
    fetcher: FlightFetcher,
    pool: rayon::ThreadPool,
    top_n: usize,
    cancel: Arc<AtomicBool>,
}

impl Planner {
    pub fn new(
        config: &PlannerConfig,
        provider: Arc<dyn FlightProvider>,
        cache: Arc<ResponseCache>,
        visa: Arc<dyn VisaLookup>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("strategy-worker-{}", i))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;

        Ok(Self {
            generator: StrategyGenerator::new(config.generator.clone()),
            evaluator: CandidateEvaluator::new(
                config.risk.clone(),
                visa,
                config.holidays().to_vec(),
                default_low_cost_carriers(),
            ),
            fetcher: FlightFetcher::new(provider, cache, config.fetch.clone()),
            pool,
            top_n: config.top_n,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle for cooperative cancellation. Setting it makes every strategy
    /// not yet started skip; work already gathered is still ranked.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn fetcher(&self) -> &FlightFetcher {
        &self.fetcher
    }

    pub fn plan(&self, request: &TravelRequest) -> Result<PlanReport> {
        request.validate()?;

        let strategies = self.generator.generate(request);
        if strategies.is_empty() {
            return Err(PlanError::Infeasible);
        }
        info!(strategies = strategies.len(), "generated routing strategies");

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            strategies
                .par_iter()
                .map(|strategy| self.evaluate_one(strategy, request))
                .collect()
        });

        let mut stats = PlanStats {
            strategies_generated: strategies.len(),
            ..PlanStats::default()
        };
        let mut gathered: Vec<ItineraryCandidate> = Vec::new();
        let mut answered = 0usize;

        for (strategy, outcome) in strategies.iter().zip(outcomes) {
            match outcome {
                Outcome::Candidates(candidates) => {
                    stats.strategies_evaluated += 1;
                    answered += 1;
                    gathered.extend(candidates);
                }
                Outcome::Failed(FetchError::NoResults) => {
                    stats.strategies_evaluated += 1;
                    stats.strategies_empty += 1;
                    answered += 1;
                }
                Outcome::Failed(FetchError::BudgetExceeded { .. }) => {
                    stats.strategies_skipped += 1;
                }
                Outcome::Failed(err) => {
                    stats.strategies_evaluated += 1;
                    stats.failures += 1;
                    warn!(strategy = %strategy.key(), error = %err, "strategy failed");
                }
                Outcome::Cancelled => stats.strategies_cancelled += 1,
            }
        }

        let candidates = dedup_by_identity(gathered);
        stats.live_calls = self.fetcher.budget().used();
        stats.cache_hits = self.fetcher.cache().hits();
        stats.candidates_before = candidates.len();
        stats.price_range = price_range(&candidates);

        if candidates.is_empty() {
            if stats.failures > 0 && answered == 0 {
                return Err(PlanError::ProviderUnavailable {
                    failures: stats.failures,
                });
            }
            return Err(PlanError::NoCandidates {
                strategies: stats.strategies_generated,
                failures: stats.failures,
            });
        }

        let ranked = ranking::rank(candidates, &request.weights, self.top_n);
        stats.candidates_ranked = ranked.len();
        let records = assembler::assemble(&ranked);

        info!(
            evaluated = stats.strategies_evaluated,
            skipped = stats.strategies_skipped,
            failures = stats.failures,
            live_calls = stats.live_calls,
            cache_hits = stats.cache_hits,
            candidates = stats.candidates_before,
            "planning finished"
        );

        Ok(PlanReport {
            request: request.clone(),
            records,
            stats,
            explanation: None,
        })
    }

    fn evaluate_one(&self, strategy: &RoutingStrategy, request: &TravelRequest) -> Outcome {
        if self.cancel.load(Ordering::SeqCst) {
            return Outcome::Cancelled;
        }
        match self.evaluator.evaluate(&self.fetcher, strategy, request) {
            Ok(candidates) => Outcome::Candidates(candidates),
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// Keep one candidate per identity, the cheaper on collision. First-seen
/// order is preserved.
fn dedup_by_identity(candidates: Vec<ItineraryCandidate>) -> Vec<ItineraryCandidate> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<ItineraryCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match index.get(&candidate.identity) {
            Some(&i) => {
                if candidate.total_price < out[i].total_price {
                    out[i] = candidate;
                }
            }
            None => {
                index.insert(candidate.identity.clone(), out.len());
                out.push(candidate);
            }
        }
    }
    out
}

fn price_range(candidates: &[ItineraryCandidate]) -> Option<(f64, f64)> {
    candidates.iter().map(|c| c.total_price).fold(None, |range, price| match range {
        None => Some((price, price)),
        Some((lo, hi)) => Some((lo.min(price), hi.max(price))),
    })
}
