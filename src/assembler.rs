//! Output records handed to the explanation stage.
//!
//! Pure restatement of already-derived fields; nothing is computed here
//! beyond formatting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::TripStatistics;
use crate::itinerary::{FlightSegment, ItineraryLeg, Layover};
use crate::ranking::RankedCandidate;
use crate::visa::VisaFlag;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub carrier: String,
    pub flight_number: String,
    pub departure_airport: String,
    pub departure_time: String,
    pub arrival_airport: String,
    pub arrival_time: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoverRecord {
    pub airport: String,
    pub duration_minutes: u32,
    pub overnight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegRecord {
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub duration_minutes: u32,
    pub segments: Vec<SegmentRecord>,
    pub layovers: Vec<LayoverRecord>,
}

/// One ranked option in the external output contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// 1-based position in the final order.
    pub rank: usize,
    pub score: f64,
    pub total_cost: f64,
    pub currency: String,
    pub topology: String,
    /// Travel date of every leg of the routing strategy, priced or not.
    pub leg_dates: Vec<NaiveDate>,
    pub legs: Vec<LegRecord>,
    pub total_stops: u32,
    pub total_duration_minutes: u32,
    pub layovers: Vec<LayoverRecord>,
    pub airlines: Vec<String>,
    pub pto_days: u32,
    pub trip_statistics: TripStatistics,
    pub risk_score: f64,
    pub visa_flags: Vec<VisaFlag>,
    pub identity: String,
}

fn segment_record(segment: &FlightSegment) -> SegmentRecord {
    SegmentRecord {
        carrier: segment.carrier.clone(),
        flight_number: segment.flight_number.clone(),
        departure_airport: segment.departure_airport.clone(),
        departure_time: segment.departure.format(TIME_FORMAT).to_string(),
        arrival_airport: segment.arrival_airport.clone(),
        arrival_time: segment.arrival.format(TIME_FORMAT).to_string(),
        duration_minutes: segment.duration_minutes,
    }
}

fn layover_record(layover: &Layover) -> LayoverRecord {
    LayoverRecord {
        airport: layover.airport.clone(),
        duration_minutes: layover.duration_minutes,
        overnight: layover.overnight,
    }
}

fn leg_record(leg: &ItineraryLeg) -> LegRecord {
    let origin = leg
        .segments
        .first()
        .map(|s| s.departure_airport.clone())
        .unwrap_or_default();
    let destination = leg
        .segments
        .last()
        .map(|s| s.arrival_airport.clone())
        .unwrap_or_default();
    let date = leg
        .first_departure()
        .map(|dt| dt.date().to_string())
        .unwrap_or_default();

    LegRecord {
        origin,
        destination,
        date,
        duration_minutes: leg.duration_minutes(),
        segments: leg.segments.iter().map(segment_record).collect(),
        layovers: leg.layovers.iter().map(layover_record).collect(),
    }
}

/// Package ranked candidates, best first, into output records.
pub fn assemble(ranked: &[RankedCandidate]) -> Vec<OutputRecord> {
    ranked
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let candidate = &entry.candidate;
            OutputRecord {
                rank: index + 1,
                score: entry.score,
                total_cost: candidate.total_price,
                currency: candidate.currency.clone(),
                topology: candidate.strategy.topology.to_string(),
                leg_dates: candidate.strategy.legs.iter().map(|leg| leg.date).collect(),
                legs: candidate.legs.iter().map(leg_record).collect(),
                total_stops: candidate.total_stops,
                total_duration_minutes: candidate.total_duration_minutes,
                layovers: candidate.layovers().map(layover_record).collect(),
                airlines: candidate.airlines(),
                pto_days: candidate.pto_days,
                trip_statistics: candidate.trip_statistics,
                risk_score: candidate.risk_score,
                visa_flags: candidate.visa_flags.clone(),
                identity: candidate.identity.clone(),
            }
        })
        .collect()
}
