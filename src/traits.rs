//! Seams to the planner's external collaborators.

use crate::assembler::OutputRecord;
use crate::error::{FetchError, InterpretError};
use crate::fetcher::ProviderQuery;
use crate::itinerary::RawItinerary;
use crate::request::TravelRequest;
use crate::visa::{VisaFlag, VisaPurpose};

/// The external flight-search provider.
pub trait FlightProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Perform one live search. Called at most once per fingerprint per run.
    fn search(&self, query: &ProviderQuery) -> Result<serde_json::Value, FetchError>;

    /// Turn a (possibly cached) raw response into provider-agnostic options.
    fn normalize(&self, query: &ProviderQuery, body: &serde_json::Value) -> Result<Vec<RawItinerary>, FetchError>;
}

/// Visa requirement data table.
pub trait VisaLookup: Send + Sync {
    fn requirement(&self, airport: &str, purpose: VisaPurpose) -> Option<VisaFlag>;
}

/// Free-text requirement extraction.
pub trait RequestInterpreter {
    fn interpret(&self, text: &str) -> Result<TravelRequest, InterpretError>;
}

/// Explanation generation for ranked results. Consumes records, never
/// alters them.
pub trait Explainer {
    fn explain(&self, records: &[OutputRecord]) -> Result<String, InterpretError>;
}
