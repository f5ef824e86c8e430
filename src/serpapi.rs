//! SerpAPI Google Flights adapter.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;

use crate::error::{FetchError, ProviderError};
use crate::fetcher::ProviderQuery;
use crate::itinerary::{BaggagePolicy, FlightSegment, ItineraryLeg, RawItinerary};
use crate::request::{Cabin, Topology};
use crate::traits::FlightProvider;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone)]
pub struct SerpApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// Slower searches that match the browser results exactly.
    pub deep_search: bool,
    /// Estimated per-passenger, per-leg price of a carry-on the fare leaves
    /// out. `None` treats such fares as having no carry-on to buy.
    pub carry_on_fee: Option<f64>,
    /// Estimated per-bag, per-leg price of checked baggage sold for a fee.
    pub checked_bag_fee: Option<f64>,
}

impl Default for SerpApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://serpapi.com".to_string(),
            api_key: String::new(),
            timeout_secs: 20,
            deep_search: false,
            carry_on_fee: Some(35.0),
            checked_bag_fee: Some(40.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SerpApiClient {
    config: SerpApiConfig,
    client: reqwest::blocking::Client,
}

impl SerpApiClient {
    pub fn new(config: SerpApiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Query-string parameters for one search.
    pub(crate) fn query_params(&self, query: &ProviderQuery) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = vec![
            ("engine", "google_flights".to_string()),
            ("api_key", self.config.api_key.clone()),
            ("currency", query.currency.clone()),
            ("gl", query.gl.clone()),
            ("hl", query.hl.clone()),
        ];

        let round_trip = query.topology == Topology::RoundTrip && query.legs.len() == 2;
        let one_way = query.topology == Topology::OneWay && query.legs.len() == 1;
        if round_trip || one_way {
            let outbound = &query.legs[0];
            params.push(("type", if round_trip { "1" } else { "2" }.to_string()));
            params.push(("departure_id", outbound.origin.to_string()));
            params.push(("arrival_id", outbound.destination.to_string()));
            params.push(("outbound_date", outbound.date.to_string()));
            if round_trip {
                params.push(("return_date", query.legs[1].date.to_string()));
            }
        } else {
            let segments: Vec<serde_json::Value> = query
                .legs
                .iter()
                .map(|leg| {
                    json!({
                        "departure_id": leg.origin.to_string(),
                        "arrival_id": leg.destination.to_string(),
                        "date": leg.date.to_string(),
                    })
                })
                .collect();
            params.push(("type", "3".to_string()));
            params.push(("multi_city_json", serde_json::Value::Array(segments).to_string()));
        }

        // 1 = nonstop, 2 = at most one stop, 3 = at most two stops.
        match query.max_stops {
            Some(0) => params.push(("stops", "1".to_string())),
            Some(1) => params.push(("stops", "2".to_string())),
            Some(2) => params.push(("stops", "3".to_string())),
            _ => {}
        }
        if !query.include_airlines.is_empty() {
            params.push(("include_airlines", query.include_airlines.join(",")));
        }
        if !query.exclude_airlines.is_empty() {
            params.push(("exclude_airlines", query.exclude_airlines.join(",")));
        }
        if query.carry_on_bags > 0 {
            params.push(("bags", query.carry_on_bags.to_string()));
        }
        if !query.excluded_connections.is_empty() {
            params.push(("exclude_conns", query.excluded_connections.join(",")));
        }

        let travel_class = match query.cabin {
            Cabin::Economy => "1",
            Cabin::PremiumEconomy => "2",
            Cabin::Business => "3",
            Cabin::First => "4",
        };
        params.push(("travel_class", travel_class.to_string()));
        params.push(("adults", query.passengers.adults.to_string()));
        if query.passengers.children > 0 {
            params.push(("children", query.passengers.children.to_string()));
        }
        if query.passengers.infants_in_seat > 0 {
            params.push(("infants_in_seat", query.passengers.infants_in_seat.to_string()));
        }
        if query.passengers.infants_on_lap > 0 {
            params.push(("infants_on_lap", query.passengers.infants_on_lap.to_string()));
        }
        if self.config.deep_search {
            params.push(("deep_search", "true".to_string()));
        }
        params
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

impl FlightProvider for SerpApiClient {
    fn name(&self) -> &str {
        "serpapi"
    }

    fn search(&self, query: &ProviderQuery) -> Result<serde_json::Value, FetchError> {
        let url = format!("{}/search.json", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&self.query_params(query))
            .send()
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()).into());
        }

        let body: serde_json::Value = response.json().map_err(|err| self.transport_error(err))?;
        // "No results" is a valid answer worth caching; anything else the API
        // complains about is not.
        if let Some(message) = api_error(&body) {
            if !is_no_results(message) {
                return Err(ProviderError::Api(message.to_string()).into());
            }
        }
        Ok(body)
    }

    fn normalize(&self, query: &ProviderQuery, body: &serde_json::Value) -> Result<Vec<RawItinerary>, FetchError> {
        if let Some(message) = api_error(body) {
            if is_no_results(message) {
                return Ok(Vec::new());
            }
            return Err(ProviderError::Api(message.to_string()).into());
        }

        let response: SerpResponse = serde_json::from_value(body.clone())
            .map_err(|err| ProviderError::Malformed(err.to_string()))?;

        Ok(response
            .best_flights
            .into_iter()
            .chain(response.other_flights)
            .filter_map(|option| option.into_raw(query, &self.config))
            .collect())
    }
}

fn api_error(body: &serde_json::Value) -> Option<&str> {
    body.get("error").and_then(|e| e.as_str())
}

fn is_no_results(message: &str) -> bool {
    message.to_lowercase().contains("any results")
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    best_flights: Vec<SerpOption>,
    #[serde(default)]
    other_flights: Vec<SerpOption>,
}

#[derive(Debug, Deserialize)]
struct SerpOption {
    flights: Vec<SerpFlight>,
    #[serde(default)]
    layovers: Vec<SerpLayover>,
    price: Option<f64>,
    #[serde(default)]
    extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SerpFlight {
    departure_airport: SerpAirport,
    arrival_airport: SerpAirport,
    duration: u32,
    airline: String,
    flight_number: String,
    #[serde(default)]
    often_delayed_by_over_30_min: bool,
    #[serde(default)]
    extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SerpAirport {
    id: String,
    time: String,
}

#[derive(Debug, Deserialize)]
struct SerpLayover {
    id: String,
    #[serde(default)]
    overnight: bool,
}

impl SerpOption {
    /// Convert to the provider-agnostic form. Options without a price, with
    /// unparseable times, or whose segments do not line up with the query
    /// legs are dropped.
    fn into_raw(self, query: &ProviderQuery, config: &SerpApiConfig) -> Option<RawItinerary> {
        let price = self.price?;
        let extensions = self.extensions.iter().chain(self.flights.iter().flat_map(|f| f.extensions.iter()));
        let baggage = baggage_policy(extensions, config);

        let mut segments = Vec::with_capacity(self.flights.len());
        for flight in self.flights {
            segments.push(flight.into_segment()?);
        }

        let mut legs = group_into_legs(segments, query)?;
        for leg in &mut legs {
            for layover in &mut leg.layovers {
                if self.layovers.iter().any(|l| l.overnight && l.id == layover.airport) {
                    layover.overnight = true;
                }
            }
        }

        Some(RawItinerary {
            legs,
            price,
            currency: query.currency.clone(),
            baggage,
        })
    }
}

impl SerpFlight {
    fn into_segment(self) -> Option<FlightSegment> {
        let departure = NaiveDateTime::parse_from_str(&self.departure_airport.time, TIME_FORMAT).ok()?;
        let arrival = NaiveDateTime::parse_from_str(&self.arrival_airport.time, TIME_FORMAT).ok()?;
        let carrier_code = self
            .flight_number
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        Some(FlightSegment {
            carrier: self.airline,
            carrier_code,
            flight_number: self.flight_number,
            departure_airport: self.departure_airport.id,
            arrival_airport: self.arrival_airport.id,
            departure,
            arrival,
            duration_minutes: self.duration,
            often_delayed: self.often_delayed_by_over_30_min,
        })
    }
}

/// Split a flat segment list into legs: a leg closes when a segment lands
/// in that leg's destination set. Google Flights returns only the outbound
/// half of a round trip, so covering the first leg is enough.
fn group_into_legs(segments: Vec<FlightSegment>, query: &ProviderQuery) -> Option<Vec<ItineraryLeg>> {
    let mut legs = Vec::new();
    let mut current = Vec::new();
    for segment in segments {
        let leg = query.legs.get(legs.len())?;
        let closes = leg.destination.contains(&segment.arrival_airport);
        current.push(segment);
        if closes {
            legs.push(ItineraryLeg::from_segments(std::mem::take(&mut current)));
        }
    }
    if legs.is_empty() || !current.is_empty() {
        return None;
    }
    Some(legs)
}

/// Read baggage terms from the option's extension strings. Fees are the
/// configured estimates; the extensions only say whether one applies.
fn baggage_policy<'a>(extensions: impl Iterator<Item = &'a String>, config: &SerpApiConfig) -> BaggagePolicy {
    let mut policy = BaggagePolicy::default();
    for extension in extensions {
        let text = extension.to_lowercase();
        let extra = text.contains("not included") || text.contains("for a fee");
        if text.contains("no carry-on") || (text.contains("carry-on") && extra) {
            policy.carry_on_included = Some(false);
            policy.carry_on_fee = config.carry_on_fee;
        } else if text.contains("carry-on bag included") || text.contains("1 carry-on") {
            policy.carry_on_included.get_or_insert(true);
        }
        if text.contains("checked bag") && extra {
            policy.checked_bag_fee = config.checked_bag_fee;
        }
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{AirportSet, Passengers};
    use crate::strategy::Leg;
    use chrono::NaiveDate;

    fn query(topology: Topology, legs: &[(&str, &str, u32)]) -> ProviderQuery {
        ProviderQuery {
            topology,
            legs: legs
                .iter()
                .map(|(from, to, day)| Leg {
                    origin: AirportSet::single(from),
                    destination: AirportSet::single(to),
                    date: NaiveDate::from_ymd_opt(2026, 5, *day).unwrap(),
                })
                .collect(),
            max_stops: Some(1),
            include_airlines: Vec::new(),
            exclude_airlines: vec!["F8".to_string()],
            carry_on_bags: 1,
            excluded_connections: Vec::new(),
            passengers: Passengers::default(),
            cabin: Cabin::Economy,
            currency: "CAD".to_string(),
            gl: "ca".to_string(),
            hl: "en".to_string(),
        }
    }

    fn client() -> SerpApiClient {
        SerpApiClient::new(SerpApiConfig {
            api_key: "test-key".to_string(),
            ..SerpApiConfig::default()
        })
        .unwrap()
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_round_trip_params() {
        let q = query(Topology::RoundTrip, &[("YOW", "CDG", 1), ("CDG", "YOW", 8)]);
        let params = client().query_params(&q);
        assert_eq!(param(&params, "type"), Some("1"));
        assert_eq!(param(&params, "departure_id"), Some("YOW"));
        assert_eq!(param(&params, "return_date"), Some("2026-05-08"));
        assert_eq!(param(&params, "stops"), Some("2"));
        assert_eq!(param(&params, "exclude_airlines"), Some("F8"));
        assert_eq!(param(&params, "bags"), Some("1"));
    }

    #[test]
    fn test_open_jaw_uses_multi_city() {
        let q = query(Topology::OpenJaw, &[("YOW", "CDG", 1), ("FCO", "YOW", 8)]);
        let params = client().query_params(&q);
        assert_eq!(param(&params, "type"), Some("3"));
        let segments: serde_json::Value = serde_json::from_str(param(&params, "multi_city_json").unwrap()).unwrap();
        assert_eq!(segments[1]["departure_id"], "FCO");
    }

    #[test]
    fn test_normalize_groups_segments_into_legs() {
        let q = query(Topology::OneWay, &[("YOW", "CDG", 1)]);
        let body = json!({
            "best_flights": [{
                "flights": [
                    {
                        "departure_airport": {"id": "YOW", "time": "2026-05-01 17:00"},
                        "arrival_airport": {"id": "YUL", "time": "2026-05-01 18:00"},
                        "duration": 60, "airline": "Air Canada", "flight_number": "AC 8905"
                    },
                    {
                        "departure_airport": {"id": "YUL", "time": "2026-05-01 20:15"},
                        "arrival_airport": {"id": "CDG", "time": "2026-05-02 09:05"},
                        "duration": 410, "airline": "Air Canada", "flight_number": "AC 870",
                        "often_delayed_by_over_30_min": true
                    }
                ],
                "layovers": [{"id": "YUL", "duration": 135, "overnight": false}],
                "price": 912,
                "extensions": ["Checked baggage for a fee"]
            }],
            "other_flights": [{
                "flights": [],
                "price": 100
            }]
        });

        let options = client().normalize(&q, &body).unwrap();
        assert_eq!(options.len(), 1);
        let option = &options[0];
        assert_eq!(option.legs.len(), 1);
        assert_eq!(option.legs[0].stops(), 1);
        assert_eq!(option.legs[0].layovers[0].duration_minutes, 135);
        assert_eq!(option.price, 912.0);
        assert_eq!(option.legs[0].segments[0].carrier_code, "AC");
        assert!(option.legs[0].segments[1].often_delayed);
    }

    #[test]
    fn test_normalize_no_results_is_empty() {
        let q = query(Topology::OneWay, &[("YOW", "CDG", 1)]);
        let body = json!({"error": "Google Flights hasn't returned any results for this query."});
        assert!(client().normalize(&q, &body).unwrap().is_empty());

        let bad_key = json!({"error": "Invalid API key."});
        assert!(matches!(
            client().normalize(&q, &bad_key),
            Err(FetchError::Provider(ProviderError::Api(_)))
        ));
    }

    #[test]
    fn test_baggage_policy_from_extensions() {
        let config = SerpApiConfig::default();
        let exts = vec!["Carry-on bag not included".to_string()];
        let policy = baggage_policy(exts.iter(), &config);
        assert_eq!(policy.carry_on_included, Some(false));
        assert_eq!(policy.carry_on_fee, Some(35.0));
        assert_eq!(policy.checked_bag_fee, None);

        let exts = vec!["1 carry-on bag included".to_string(), "Checked baggage for a fee".to_string()];
        let policy = baggage_policy(exts.iter(), &config);
        assert_eq!(policy.carry_on_included, Some(true));
        assert_eq!(policy.checked_bag_fee, Some(40.0));

        assert_eq!(baggage_policy(std::iter::empty(), &config), BaggagePolicy::default());
    }

    fn carry_on_body() -> serde_json::Value {
        json!({
            "best_flights": [{
                "flights": [{
                    "departure_airport": {"id": "YOW", "time": "2026-05-01 07:00"},
                    "arrival_airport": {"id": "CDG", "time": "2026-05-01 19:10"},
                    "duration": 430, "airline": "Air Canada", "flight_number": "AC 870",
                    "extensions": ["Carry-on bag not included"]
                }],
                "price": 500
            }]
        })
    }

    #[test]
    fn test_normalized_bag_fees_reach_the_price() {
        use crate::evaluator::{check_filters, total_price};
        use crate::request::{DateFlexibility, FilterSet, TravelRequest};
        use crate::strategy::RoutingStrategy;

        let q = query(Topology::OneWay, &[("YOW", "CDG", 1)]);
        let strategy = RoutingStrategy {
            topology: Topology::OneWay,
            legs: q.legs.clone(),
        };
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut request = TravelRequest::new(
            AirportSet::single("YOW"),
            vec![AirportSet::single("CDG")],
            Topology::OneWay,
            DateFlexibility::Window { earliest: day, latest: day },
        );
        request.filters = FilterSet {
            carry_on_bags: 1,
            ..FilterSet::default()
        };

        let options = client().normalize(&q, &carry_on_body()).unwrap();
        assert_eq!(options[0].baggage.carry_on_fee, Some(35.0));
        assert_eq!(total_price(&options[0], &request.filters, 1), 535.0);
        assert_eq!(check_filters(&options[0], &strategy, &request), None);

        // Without an estimate the carry-on cannot be bought at all.
        let no_estimate = SerpApiClient::new(SerpApiConfig {
            carry_on_fee: None,
            ..SerpApiConfig::default()
        })
        .unwrap();
        let options = no_estimate.normalize(&q, &carry_on_body()).unwrap();
        assert_eq!(
            check_filters(&options[0], &strategy, &request),
            Some(crate::evaluator::Violation::CarryOnUnavailable)
        );
    }
}
