//! Itinerary representations.
//!
//! `RawItinerary` is the provider-agnostic shape every provider response is
//! normalized into. `ItineraryCandidate` is a raw itinerary that passed every
//! hard filter and carries its derived metrics.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::TripStatistics;
use crate::strategy::RoutingStrategy;
use crate::visa::VisaFlag;

/// One flown segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    /// Marketing airline name, e.g. "Air Canada".
    pub carrier: String,
    /// Two-character airline designator, e.g. "AC".
    pub carrier_code: String,
    /// Flight number including designator, e.g. "AC 870".
    pub flight_number: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    /// Local departure time.
    pub departure: NaiveDateTime,
    /// Local arrival time.
    pub arrival: NaiveDateTime,
    pub duration_minutes: u32,
    #[serde(default)]
    pub often_delayed: bool,
}

/// A connection between two segments of the same leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layover {
    pub airport: String,
    pub duration_minutes: u32,
    pub overnight: bool,
}

/// Segments flown between one leg's origin and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryLeg {
    pub segments: Vec<FlightSegment>,
    pub layovers: Vec<Layover>,
}

impl ItineraryLeg {
    /// Build a leg from its segments, deriving layovers from the gaps
    /// between consecutive segments.
    pub fn from_segments(segments: Vec<FlightSegment>) -> Self {
        let layovers = segments
            .windows(2)
            .map(|pair| {
                let (inbound, outbound) = (&pair[0], &pair[1]);
                let gap = (outbound.departure - inbound.arrival).num_minutes().max(0);
                Layover {
                    airport: inbound.arrival_airport.clone(),
                    duration_minutes: gap as u32,
                    overnight: outbound.departure.date() != inbound.arrival.date(),
                }
            })
            .collect();
        Self { segments, layovers }
    }

    pub fn stops(&self) -> u32 {
        self.segments.len().saturating_sub(1) as u32
    }

    /// Air time plus connection time. Segment timestamps are local, so
    /// durations are summed rather than subtracted across time zones.
    pub fn duration_minutes(&self) -> u32 {
        let air: u32 = self.segments.iter().map(|s| s.duration_minutes).sum();
        let ground: u32 = self.layovers.iter().map(|l| l.duration_minutes).sum();
        air + ground
    }

    pub fn first_departure(&self) -> Option<NaiveDateTime> {
        self.segments.first().map(|s| s.departure)
    }

    pub fn last_arrival(&self) -> Option<NaiveDateTime> {
        self.segments.last().map(|s| s.arrival)
    }
}

/// Baggage terms as far as the provider reported them. `None` means
/// unknown, which is treated as "included, no fee".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaggagePolicy {
    pub carry_on_included: Option<bool>,
    pub carry_on_fee: Option<f64>,
    pub checked_bag_fee: Option<f64>,
}

/// A priced option in provider-agnostic form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItinerary {
    pub legs: Vec<ItineraryLeg>,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub baggage: BaggagePolicy,
}

impl RawItinerary {
    pub fn segments(&self) -> impl Iterator<Item = &FlightSegment> {
        self.legs.iter().flat_map(|leg| leg.segments.iter())
    }

    pub fn layovers(&self) -> impl Iterator<Item = &Layover> {
        self.legs.iter().flat_map(|leg| leg.layovers.iter())
    }
}

/// Stable identity of an itinerary: its flights and their departure times.
/// Strategy legs the provider did not return are identified by route and
/// date instead, so a round trip priced on its outbound half stays distinct
/// per return date.
pub fn itinerary_identity(strategy: &RoutingStrategy, legs: &[ItineraryLeg]) -> String {
    let flown = legs.iter().flat_map(|leg| leg.segments.iter()).map(|s| {
        format!(
            "{}@{}",
            s.flight_number.replace(' ', ""),
            s.departure.format("%Y-%m-%dT%H:%M")
        )
    });
    let unpriced = strategy.legs.iter().skip(legs.len()).map(|leg| leg.to_string());
    flown.chain(unpriced).collect::<Vec<_>>().join("/")
}

/// A priced, filter-passing realization of a routing strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItineraryCandidate {
    pub strategy: RoutingStrategy,
    pub legs: Vec<ItineraryLeg>,
    /// Fare plus estimated bag fees.
    pub total_price: f64,
    pub currency: String,
    pub total_stops: u32,
    pub total_duration_minutes: u32,
    pub risk_score: f64,
    pub visa_flags: Vec<VisaFlag>,
    pub pto_days: u32,
    pub trip_statistics: TripStatistics,
    /// Segments flown by carriers the traveller would rather avoid.
    pub airline_penalty: f64,
    pub identity: String,
}

impl ItineraryCandidate {
    pub fn layovers(&self) -> impl Iterator<Item = &Layover> {
        self.legs.iter().flat_map(|leg| leg.layovers.iter())
    }

    pub fn overnight_layovers(&self) -> u32 {
        self.layovers().filter(|l| l.overnight).count() as u32
    }

    pub fn airlines(&self) -> Vec<String> {
        let mut airlines: Vec<String> = Vec::new();
        for segment in self.legs.iter().flat_map(|leg| leg.segments.iter()) {
            if !airlines.contains(&segment.carrier) {
                airlines.push(segment.carrier.clone());
            }
        }
        airlines
    }
}
