//! Test fixtures for flexiflight.
//!
//! Provides:
//! - Request builders for the common trip shapes
//! - Segment and itinerary builders with realistic flight numbers and times
//! - A stub flight provider with a live-call counter

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use flexiflight::error::FetchError;
use flexiflight::fetcher::ProviderQuery;
use flexiflight::itinerary::{FlightSegment, ItineraryLeg, RawItinerary};
use flexiflight::request::{AirportSet, DateFlexibility, Topology, TravelRequest};
use flexiflight::strategy::{Leg, RoutingStrategy};
use flexiflight::traits::FlightProvider;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, minute, 0).unwrap()
}

pub fn airports(codes: &[&str]) -> AirportSet {
    AirportSet::parse(codes.iter().copied()).unwrap()
}

/// Ottawa to Paris and back, departing in the first week of May 2026.
pub fn ottawa_paris_round_trip() -> TravelRequest {
    let mut request = TravelRequest::new(
        airports(&["YOW"]),
        vec![airports(&["CDG", "ORY"])],
        Topology::RoundTrip,
        DateFlexibility::Window {
            earliest: date(2026, 5, 1),
            latest: date(2026, 5, 7),
        },
    );
    request.filters.max_stops = Some(1);
    request.filters.max_price = Some(1200.0);
    request
}

pub fn one_way(origin: &str, destination: &str, earliest: NaiveDate, latest: NaiveDate) -> TravelRequest {
    TravelRequest::new(
        airports(&[origin]),
        vec![airports(&[destination])],
        Topology::OneWay,
        DateFlexibility::Window { earliest, latest },
    )
}

pub fn one_way_strategy(origin: &str, destination: &str, day: NaiveDate) -> RoutingStrategy {
    RoutingStrategy {
        topology: Topology::OneWay,
        legs: vec![Leg {
            origin: AirportSet::single(origin),
            destination: AirportSet::single(destination),
            date: day,
        }],
    }
}

/// A segment whose carrier code is the flight number's prefix.
pub fn segment(flight_number: &str, from: &str, to: &str, departure: NaiveDateTime, minutes: u32) -> FlightSegment {
    let carrier_code = flight_number.split_whitespace().next().unwrap_or_default().to_string();
    let carrier = match carrier_code.as_str() {
        "AC" => "Air Canada",
        "AF" => "Air France",
        "LH" => "Lufthansa",
        "UA" => "United",
        "F8" => "Flair Airlines",
        "BA" => "British Airways",
        _ => "Other",
    };
    FlightSegment {
        carrier: carrier.to_string(),
        carrier_code,
        flight_number: flight_number.to_string(),
        departure_airport: from.to_string(),
        arrival_airport: to.to_string(),
        departure,
        arrival: departure + TimeDelta::minutes(i64::from(minutes)),
        duration_minutes: minutes,
        often_delayed: false,
    }
}

pub fn itinerary(price: f64, legs: Vec<Vec<FlightSegment>>) -> RawItinerary {
    RawItinerary {
        legs: legs.into_iter().map(ItineraryLeg::from_segments).collect(),
        price,
        currency: "CAD".to_string(),
        baggage: Default::default(),
    }
}

/// YOW to CDG nonstop on `day`.
pub fn nonstop_yow_cdg(day: NaiveDate, price: f64) -> RawItinerary {
    itinerary(price, vec![vec![segment("AC 870", "YOW", "CDG", at(day, 18, 30), 430)]])
}

/// YOW to CDG through YUL on `day`.
pub fn one_stop_yow_cdg(day: NaiveDate, price: f64) -> RawItinerary {
    itinerary(price, vec![vec![
        segment("AC 8905", "YOW", "YUL", at(day, 16, 0), 60),
        segment("AC 872", "YUL", "CDG", at(day, 19, 0), 410),
    ]])
}

/// YOW to CDG through YYZ and LHR on `day`.
pub fn two_stop_yow_cdg(day: NaiveDate, price: f64) -> RawItinerary {
    itinerary(price, vec![vec![
        segment("AC 450", "YOW", "YYZ", at(day, 12, 0), 65),
        segment("AC 856", "YYZ", "LHR", at(day, 15, 0), 415),
        segment("BA 306", "LHR", "CDG", at(day + TimeDelta::days(1), 8, 0), 75),
    ]])
}

type Responder = dyn Fn(&ProviderQuery) -> Result<Vec<RawItinerary>, FetchError> + Send + Sync;

/// Provider that answers from a closure and counts live searches.
pub struct StubProvider {
    responder: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ProviderQuery) -> Result<Vec<RawItinerary>, FetchError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always return the same options.
    pub fn fixed(options: Vec<RawItinerary>) -> Self {
        Self::new(move |_| Ok(options.clone()))
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FlightProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn search(&self, query: &ProviderQuery) -> Result<serde_json::Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let options = (self.responder)(query)?;
        serde_json::to_value(options).map_err(|e| FetchError::Provider(flexiflight::error::ProviderError::Malformed(e.to_string())))
    }

    fn normalize(&self, _query: &ProviderQuery, body: &serde_json::Value) -> Result<Vec<RawItinerary>, FetchError> {
        serde_json::from_value(body.clone())
            .map_err(|e| FetchError::Provider(flexiflight::error::ProviderError::Malformed(e.to_string())))
    }
}
