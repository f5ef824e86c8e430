//! Flight data fetcher.
//!
//! Wraps the external provider behind one call per routing strategy. Every
//! call goes through the response cache first; live calls are metered by a
//! per-run budget and bounded by a timeout.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::error::{FetchError, ProviderError};
use crate::itinerary::RawItinerary;
use crate::request::{Cabin, Passengers, Topology, TravelRequest};
use crate::strategy::{Leg, RoutingStrategy};
use crate::traits::FlightProvider;

/// Everything that shapes a provider query, and nothing else.
///
/// Price ceilings, time windows, layover limits and ranking weights are
/// applied locally by the evaluator and deliberately left out, so requests
/// differing only in those share cache entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderQuery {
    pub topology: Topology,
    pub legs: Vec<Leg>,
    pub max_stops: Option<u32>,
    pub include_airlines: Vec<String>,
    pub exclude_airlines: Vec<String>,
    pub carry_on_bags: u32,
    pub excluded_connections: Vec<String>,
    pub passengers: Passengers,
    pub cabin: Cabin,
    pub currency: String,
    pub gl: String,
    pub hl: String,
}

fn normalized(codes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = codes.iter().map(|c| c.trim().to_ascii_uppercase()).collect();
    out.sort();
    out.dedup();
    out
}

impl ProviderQuery {
    pub fn from_strategy(strategy: &RoutingStrategy, request: &TravelRequest) -> Self {
        let filters = &request.filters;
        Self {
            topology: strategy.topology,
            legs: strategy.legs.clone(),
            max_stops: filters.max_stops,
            include_airlines: normalized(&filters.include_airlines),
            exclude_airlines: normalized(&filters.exclude_airlines),
            carry_on_bags: filters.carry_on_bags,
            excluded_connections: normalized(&filters.excluded_connections),
            passengers: request.passengers,
            cabin: request.cabin,
            currency: request.currency.to_ascii_uppercase(),
            gl: request.gl.to_ascii_lowercase(),
            hl: request.hl.to_ascii_lowercase(),
        }
    }

    /// Stable cache key: SHA-256 over the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        // Field order is fixed by the struct definition, so the encoding is
        // canonical.
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("flight_search:{}", hex::encode(digest))
    }
}

/// Shared ceiling on live provider calls for one run.
#[derive(Debug)]
pub struct CallBudget {
    limit: usize,
    used: AtomicUsize,
    reported: AtomicBool,
}

impl CallBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
            reported: AtomicBool::new(false),
        }
    }

    /// Claim one call. Fails once the limit is reached.
    pub fn try_acquire(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.limit
    }

    /// True exactly once, the first time the budget runs dry.
    fn first_refusal(&self) -> bool {
        !self.reported.swap(true, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum live provider calls per run.
    pub call_budget: usize,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            call_budget: 20,
            timeout: Duration::from_secs(20),
        }
    }
}

pub struct FlightFetcher {
    provider: Arc<dyn FlightProvider>,
    cache: Arc<ResponseCache>,
    budget: CallBudget,
    timeout: Duration,
}

impl FlightFetcher {
    pub fn new(provider: Arc<dyn FlightProvider>, cache: Arc<ResponseCache>, config: FetchConfig) -> Self {
        Self {
            provider,
            cache,
            budget: CallBudget::new(config.call_budget),
            timeout: config.timeout,
        }
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Quote itinerary options for one strategy.
    pub fn quote(&self, strategy: &RoutingStrategy, request: &TravelRequest) -> Result<Vec<RawItinerary>, FetchError> {
        let query = ProviderQuery::from_strategy(strategy, request);
        let fingerprint = query.fingerprint();

        // A stored body the provider can no longer read is evicted and
        // fetched once more through the budget.
        let mut refetched = false;
        let options = loop {
            let mut live = false;
            let response = self.cache.get_or_fetch(&fingerprint, || {
                live = true;
                self.live_search(&query, &fingerprint)
            })?;

            match self.provider.normalize(&query, &response.body) {
                Ok(options) => break options,
                Err(err) => {
                    self.cache.invalidate(&fingerprint, &response);
                    if live || refetched {
                        return Err(err);
                    }
                    warn!(fingerprint = %fingerprint, error = %err, "cached response is unreadable; refetching");
                    refetched = true;
                }
            }
        };

        if options.is_empty() {
            return Err(FetchError::NoResults);
        }
        debug!(strategy = %strategy, options = options.len(), "quoted strategy");
        Ok(options)
    }

    fn live_search(&self, query: &ProviderQuery, fingerprint: &str) -> Result<serde_json::Value, FetchError> {
        if !self.budget.try_acquire() {
            if self.budget.first_refusal() {
                warn!(limit = self.budget.limit(), "external call budget exhausted");
            }
            return Err(FetchError::BudgetExceeded {
                limit: self.budget.limit(),
            });
        }

        info!(
            provider = self.provider.name(),
            fingerprint,
            call = self.budget.used(),
            "live provider call"
        );
        self.call_with_timeout(query)
    }

    /// Run the provider call on a helper thread and stop waiting after the
    /// timeout. A timed-out call is abandoned, not cancelled.
    fn call_with_timeout(&self, query: &ProviderQuery) -> Result<serde_json::Value, FetchError> {
        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let query = query.clone();

        thread::Builder::new()
            .name("provider-call".to_string())
            .spawn(move || {
                let _ = tx.send(provider.search(&query));
            })
            .map_err(|err| ProviderError::Http(err.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ProviderError::Timeout(self.timeout).into()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ProviderError::Api("provider call ended without a response".to_string()).into())
            }
        }
    }
}
