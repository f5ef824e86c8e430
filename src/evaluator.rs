//! Candidate evaluation: hard filtering and derived metrics.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::calendar;
use crate::error::FetchError;
use crate::fetcher::FlightFetcher;
use crate::haversine::HaversineEstimate;
use crate::itinerary::{itinerary_identity, FlightSegment, ItineraryCandidate, ItineraryLeg, RawItinerary};
use crate::request::{FilterSet, Topology, TravelRequest};
use crate::strategy::RoutingStrategy;
use crate::traits::VisaLookup;
use crate::visa::{NoVisaRules, VisaFlag, VisaPurpose};

/// Weights of the connection-risk heuristic. Every term only ever adds.
#[derive(Debug, Clone)]
pub struct RiskModel {
    /// Added per connection.
    pub connection_weight: f64,
    /// Layovers shorter than this add margin risk.
    pub comfortable_layover_minutes: u32,
    /// Added in full for a zero-minute layover, scaled down linearly to 0
    /// at the comfortable margin.
    pub margin_weight: f64,
    pub overnight_weight: f64,
    /// Added per connection handing off between different carriers.
    pub carrier_change_weight: f64,
    /// When set, carrier changes are assumed to be interlined and add
    /// nothing.
    pub assume_interline: bool,
    /// Added per segment the provider flags as often delayed.
    pub delay_weight: f64,
}

impl Default for RiskModel {
    fn default() -> Self {
        Self {
            connection_weight: 1.0,
            comfortable_layover_minutes: 90,
            margin_weight: 2.0,
            overnight_weight: 1.5,
            carrier_change_weight: 1.0,
            assume_interline: false,
            delay_weight: 0.5,
        }
    }
}

impl RiskModel {
    pub fn score(&self, legs: &[ItineraryLeg]) -> f64 {
        let comfortable = f64::from(self.comfortable_layover_minutes.max(1));
        let mut risk = 0.0;

        for leg in legs {
            for (index, layover) in leg.layovers.iter().enumerate() {
                risk += self.connection_weight;

                let margin = f64::from(layover.duration_minutes);
                if margin < comfortable {
                    risk += self.margin_weight * (comfortable - margin) / comfortable;
                }
                if layover.overnight {
                    risk += self.overnight_weight;
                }

                let inbound = &leg.segments[index];
                let outbound = &leg.segments[index + 1];
                if !self.assume_interline && !same_carrier(inbound, outbound) {
                    risk += self.carrier_change_weight;
                }
            }
            risk += self.delay_weight * leg.segments.iter().filter(|s| s.often_delayed).count() as f64;
        }
        risk
    }
}

fn same_carrier(a: &FlightSegment, b: &FlightSegment) -> bool {
    if !a.carrier_code.is_empty() && !b.carrier_code.is_empty() {
        return a.carrier_code.eq_ignore_ascii_case(&b.carrier_code);
    }
    a.carrier.eq_ignore_ascii_case(&b.carrier)
}

/// The first hard filter an option breaks.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    TooManyStops { leg: usize, stops: u32 },
    AirlineNotAllowed(String),
    CarryOnUnavailable,
    OverPrice(f64),
    DepartureOutsideWindow { leg: usize },
    /// A departure window targets a leg the provider did not price.
    DepartureUnverified { leg: usize },
    LayoverTooLong { airport: String, minutes: u32 },
    ExcludedConnection(String),
    TooLong(u32),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TooManyStops { leg, stops } => write!(f, "leg {} has {} stops", leg, stops),
            Violation::AirlineNotAllowed(airline) => write!(f, "airline {} not allowed", airline),
            Violation::CarryOnUnavailable => f.write_str("carry-on not available"),
            Violation::OverPrice(price) => write!(f, "price {:.2} over ceiling", price),
            Violation::DepartureOutsideWindow { leg } => write!(f, "leg {} departs outside its window", leg),
            Violation::DepartureUnverified { leg } => write!(f, "leg {} has a window but no priced flights", leg),
            Violation::LayoverTooLong { airport, minutes } => {
                write!(f, "{} minute layover at {}", minutes, airport)
            }
            Violation::ExcludedConnection(airport) => write!(f, "connects through excluded {}", airport),
            Violation::TooLong(minutes) => write!(f, "{} minutes total travel", minutes),
        }
    }
}

fn matches_airline(segment: &FlightSegment, names: &[String]) -> bool {
    names.iter().any(|name| {
        name.eq_ignore_ascii_case(&segment.carrier_code) || name.eq_ignore_ascii_case(&segment.carrier)
    })
}

/// Fare plus estimated bag fees for every seated passenger on every leg.
pub fn total_price(option: &RawItinerary, filters: &FilterSet, seated: u32) -> f64 {
    let per_leg_people = f64::from(seated.max(1)) * option.legs.len() as f64;
    let mut price = option.price;
    if filters.carry_on_bags > 0 && option.baggage.carry_on_included == Some(false) {
        if let Some(fee) = option.baggage.carry_on_fee {
            price += fee * f64::from(filters.carry_on_bags) * per_leg_people;
        }
    }
    if filters.checked_bags > 0 {
        if let Some(fee) = option.baggage.checked_bag_fee {
            price += fee * f64::from(filters.checked_bags) * per_leg_people;
        }
    }
    price
}

/// Check every hard filter, returning the first violation.
///
/// Strategy legs past the ones the provider priced cannot be inspected: a
/// departure window on such a leg rejects the option, and the duration
/// ceiling counts their great-circle lower bound.
pub fn check_filters(option: &RawItinerary, strategy: &RoutingStrategy, request: &TravelRequest) -> Option<Violation> {
    let filters = &request.filters;

    if let Some(max_stops) = filters.max_stops {
        for (index, leg) in option.legs.iter().enumerate() {
            if leg.stops() > max_stops {
                return Some(Violation::TooManyStops {
                    leg: index,
                    stops: leg.stops(),
                });
            }
        }
    }

    for segment in option.segments() {
        let allowed = if !filters.include_airlines.is_empty() {
            matches_airline(segment, &filters.include_airlines)
        } else {
            !matches_airline(segment, &filters.exclude_airlines)
        };
        if !allowed {
            return Some(Violation::AirlineNotAllowed(segment.carrier.clone()));
        }
    }

    if filters.carry_on_bags > 0
        && option.baggage.carry_on_included == Some(false)
        && option.baggage.carry_on_fee.is_none()
    {
        return Some(Violation::CarryOnUnavailable);
    }

    if let Some(ceiling) = filters.max_price {
        let seated = request.passengers.adults + request.passengers.children;
        let price = total_price(option, filters, seated);
        if price > ceiling {
            return Some(Violation::OverPrice(price));
        }
    }

    for index in 0..strategy.legs.len().max(option.legs.len()) {
        let Some(window) = filters.departure_window(index) else {
            continue;
        };
        match option.legs.get(index).and_then(|leg| leg.first_departure()) {
            Some(departure) if !window.contains(departure.time()) => {
                return Some(Violation::DepartureOutsideWindow { leg: index });
            }
            Some(_) => {}
            None => return Some(Violation::DepartureUnverified { leg: index }),
        }
    }

    for layover in option.layovers() {
        if filters.is_excluded_connection(&layover.airport) {
            return Some(Violation::ExcludedConnection(layover.airport.clone()));
        }
        if let Some(max) = filters.max_layover_minutes {
            if layover.duration_minutes > max {
                return Some(Violation::LayoverTooLong {
                    airport: layover.airport.clone(),
                    minutes: layover.duration_minutes,
                });
            }
        }
    }

    if let Some(ceiling) = filters.max_total_duration_minutes {
        let estimate = HaversineEstimate::default();
        let flown: u32 = option.legs.iter().map(|leg| leg.duration_minutes()).sum();
        let unpriced: u32 = strategy
            .legs
            .iter()
            .skip(option.legs.len())
            .map(|leg| estimate.min_leg_minutes(leg.origin.codes(), leg.destination.codes()))
            .sum();
        let total = flown + unpriced;
        if total > ceiling {
            return Some(Violation::TooLong(total));
        }
    }

    None
}

pub struct CandidateEvaluator {
    risk: RiskModel,
    visa: Arc<dyn VisaLookup>,
    holidays: Vec<NaiveDate>,
    low_cost_carriers: Vec<String>,
}

impl Default for CandidateEvaluator {
    fn default() -> Self {
        Self::new(RiskModel::default(), Arc::new(NoVisaRules), Vec::new(), default_low_cost_carriers())
    }
}

/// Airline designators treated as low-cost for the avoid-low-cost preference.
pub fn default_low_cost_carriers() -> Vec<String> {
    ["F8", "NK", "F9", "G4", "FR", "U2", "W6", "VY", "TO", "HV", "9C", "MM"]
        .iter()
        .map(|code| code.to_string())
        .collect()
}

impl CandidateEvaluator {
    pub fn new(
        risk: RiskModel,
        visa: Arc<dyn VisaLookup>,
        holidays: Vec<NaiveDate>,
        low_cost_carriers: Vec<String>,
    ) -> Self {
        Self {
            risk,
            visa,
            holidays,
            low_cost_carriers,
        }
    }

    /// Fetch and evaluate one strategy. An empty list is a normal outcome.
    pub fn evaluate(
        &self,
        fetcher: &FlightFetcher,
        strategy: &RoutingStrategy,
        request: &TravelRequest,
    ) -> Result<Vec<ItineraryCandidate>, FetchError> {
        let options = fetcher.quote(strategy, request)?;
        Ok(self.evaluate_options(strategy, request, options))
    }

    /// Filter and enrich already-fetched options.
    pub fn evaluate_options(
        &self,
        strategy: &RoutingStrategy,
        request: &TravelRequest,
        options: Vec<RawItinerary>,
    ) -> Vec<ItineraryCandidate> {
        let total = options.len();
        let candidates: Vec<ItineraryCandidate> = options
            .into_iter()
            .filter(|option| match check_filters(option, strategy, request) {
                Some(violation) => {
                    debug!(strategy = %strategy, %violation, "dropping option");
                    false
                }
                None => true,
            })
            .map(|option| self.enrich(strategy, request, option))
            .collect();

        debug!(
            strategy = %strategy,
            options = total,
            survivors = candidates.len(),
            "evaluated strategy"
        );
        candidates
    }

    fn enrich(&self, strategy: &RoutingStrategy, request: &TravelRequest, option: RawItinerary) -> ItineraryCandidate {
        let seated = request.passengers.adults + request.passengers.children;
        let total_price = total_price(&option, &request.filters, seated);
        let total_stops = option.legs.iter().map(|leg| leg.stops()).sum();
        let total_duration_minutes = option.legs.iter().map(|leg| leg.duration_minutes()).sum();
        let risk_score = self.risk.score(&option.legs);
        let visa_flags = self.visa_flags(strategy, &option.legs);

        let (start, end) = trip_span(strategy, &option.legs);
        let trip_statistics = calendar::trip_statistics(start, end, &self.holidays);

        let airline_penalty = option
            .segments()
            .filter(|segment| self.avoided(segment, request))
            .count() as f64;

        ItineraryCandidate {
            strategy: strategy.clone(),
            identity: itinerary_identity(strategy, &option.legs),
            legs: option.legs,
            total_price,
            currency: option.currency,
            total_stops,
            total_duration_minutes,
            risk_score,
            visa_flags,
            pto_days: trip_statistics.weekday_days,
            trip_statistics,
            airline_penalty,
        }
    }

    fn avoided(&self, segment: &FlightSegment, request: &TravelRequest) -> bool {
        let prefs = &request.airline_preferences;
        matches_airline(segment, &prefs.avoid)
            || (prefs.avoid_low_cost && matches_airline(segment, &self.low_cost_carriers))
    }

    /// Transit flags for every connection, entry flags for every place the
    /// traveller actually stays.
    fn visa_flags(&self, strategy: &RoutingStrategy, legs: &[ItineraryLeg]) -> Vec<VisaFlag> {
        let mut flags: Vec<VisaFlag> = Vec::new();
        let mut push = |flag: Option<VisaFlag>| {
            if let Some(flag) = flag {
                if !flags.iter().any(|f| f.airport == flag.airport && f.purpose == flag.purpose) {
                    flags.push(flag);
                }
            }
        };

        let home_bound = |index: usize| match strategy.topology {
            Topology::OneWay => false,
            Topology::RoundTrip | Topology::OpenJaw => index > 0 && index + 1 == strategy.legs.len(),
            Topology::MultiCityOrdered | Topology::MultiCityUnordered => strategy
                .legs
                .get(index)
                .zip(strategy.legs.first())
                .is_some_and(|(leg, first)| leg.destination == first.origin),
        };

        for (index, leg) in legs.iter().enumerate() {
            for layover in &leg.layovers {
                push(self.visa.requirement(&layover.airport, VisaPurpose::Transit));
            }
            if !home_bound(index) {
                if let Some(last) = leg.segments.last() {
                    push(self.visa.requirement(&last.arrival_airport, VisaPurpose::Entry));
                }
            }
        }
        flags
    }
}

/// First departure date to last arrival date, never shorter than the
/// strategy's own calendar span.
fn trip_span(strategy: &RoutingStrategy, legs: &[ItineraryLeg]) -> (NaiveDate, NaiveDate) {
    let strategy_start = strategy.start_date().unwrap_or(NaiveDate::MIN);
    let strategy_end = strategy.end_date().unwrap_or(strategy_start);

    let start = legs
        .first()
        .and_then(|leg| leg.first_departure())
        .map(|dt| dt.date())
        .unwrap_or(strategy_start);
    let end = legs
        .last()
        .and_then(|leg| leg.last_arrival())
        .map(|dt| dt.date())
        .unwrap_or(strategy_end)
        .max(strategy_end);
    (start, end)
}
