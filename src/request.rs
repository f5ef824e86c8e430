//! Structured travel request.
//!
//! This is the normalized hand-off from requirement extraction. It is built
//! once per run and never mutated afterwards.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A sorted, de-duplicated set of uppercase IATA codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AirportSet(Vec<String>);

impl AirportSet {
    /// Build a set, rejecting anything that is not a 3-letter code.
    pub fn parse<I, S>(codes: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for code in codes {
            let code = code.as_ref().trim().to_ascii_uppercase();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::InvalidRequest(format!(
                    "'{}' is not a 3-letter IATA code",
                    code
                )));
            }
            out.push(code);
        }
        out.sort();
        out.dedup();
        if out.is_empty() {
            return Err(ConfigError::InvalidRequest("empty airport set".to_string()));
        }
        Ok(Self(out))
    }

    /// Single-airport set from an already-validated code.
    pub fn single(code: &str) -> Self {
        Self(vec![code.trim().to_ascii_uppercase()])
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c.eq_ignore_ascii_case(code))
    }

    pub fn intersects(&self, other: &AirportSet) -> bool {
        self.0.iter().any(|c| other.contains(c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for AirportSet {
    type Error = ConfigError;

    fn try_from(codes: Vec<String>) -> Result<Self, Self::Error> {
        AirportSet::parse(codes)
    }
}

impl From<AirportSet> for Vec<String> {
    fn from(set: AirportSet) -> Self {
        set.0
    }
}

impl fmt::Display for AirportSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Trip topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    OneWay,
    RoundTrip,
    OpenJaw,
    MultiCityOrdered,
    MultiCityUnordered,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::OneWay => "one_way",
            Topology::RoundTrip => "round_trip",
            Topology::OpenJaw => "open_jaw",
            Topology::MultiCityOrdered => "multi_city_ordered",
            Topology::MultiCityUnordered => "multi_city_unordered",
        }
    }

    pub fn is_multi_city(&self) -> bool {
        matches!(self, Topology::MultiCityOrdered | Topology::MultiCityUnordered)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse season hint for fuzzy date requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeasonHint {
    Month { month: u32 },
    Spring,
    Summer,
    Fall,
    Winter,
    NextWeeks { weeks: u32 },
}

/// Date flexibility: explicit departure window, or a duration plus season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateFlexibility {
    Window { earliest: NaiveDate, latest: NaiveDate },
    Fuzzy { trip_days: u32, season: SeasonHint },
}

/// Allowed stay at a destination, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub min_days: u32,
    pub max_days: u32,
}

impl StayRange {
    pub fn exactly(days: u32) -> Self {
        Self {
            min_days: days,
            max_days: days,
        }
    }
}

/// Local departure time window. A window whose start is after its end wraps
/// past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest: NaiveTime,
    pub latest: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.earliest <= self.latest {
            time >= self.earliest && time <= self.latest
        } else {
            time >= self.earliest || time <= self.latest
        }
    }
}

/// Hard filters. Any violation removes an itinerary option outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    /// Maximum stops on any single leg.
    pub max_stops: Option<u32>,
    pub include_airlines: Vec<String>,
    pub exclude_airlines: Vec<String>,
    pub carry_on_bags: u32,
    pub checked_bags: u32,
    /// Ceiling on total price including estimated bag fees.
    pub max_price: Option<f64>,
    /// Indexed by leg; missing or `None` entries are unconstrained.
    pub departure_windows: Vec<Option<TimeWindow>>,
    pub max_layover_minutes: Option<u32>,
    pub excluded_connections: Vec<String>,
    /// Ceiling on the summed duration of all legs.
    pub max_total_duration_minutes: Option<u32>,
}

impl FilterSet {
    pub fn departure_window(&self, leg: usize) -> Option<TimeWindow> {
        self.departure_windows.get(leg).copied().flatten()
    }

    pub fn is_excluded_connection(&self, code: &str) -> bool {
        self.excluded_connections
            .iter()
            .any(|c| c.eq_ignore_ascii_case(code))
    }
}

/// Relative importance of each ranking criterion. Higher means the
/// criterion matters more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightProfile {
    pub cost: f64,
    pub duration: f64,
    pub stops: f64,
    pub overnight: f64,
    pub risk: f64,
    pub airline: f64,
    pub pto: f64,
}

impl Default for WeightProfile {
    fn default() -> Self {
        Self {
            cost: 1.0,
            duration: 0.6,
            stops: 0.5,
            overnight: 0.3,
            risk: 0.4,
            airline: 0.2,
            pto: 0.2,
        }
    }
}

impl WeightProfile {
    pub fn values(&self) -> [(&'static str, f64); 7] {
        [
            ("cost", self.cost),
            ("duration", self.duration),
            ("stops", self.stops),
            ("overnight", self.overnight),
            ("risk", self.risk),
            ("airline", self.airline),
            ("pto", self.pto),
        ]
    }

    pub fn total(&self) -> f64 {
        self.values().iter().map(|(_, w)| w).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self.values() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeights(format!(
                    "{} weight must be a finite non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "at least one weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Soft airline preferences feeding the ranking penalty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirlinePreference {
    pub avoid: Vec<String>,
    pub avoid_low_cost: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants_in_seat: u32,
    pub infants_on_lap: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cabin {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

/// Fallback stay length when neither the request nor the trip duration says
/// otherwise.
pub const DEFAULT_STAY_DAYS: u32 = 7;

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "CAD".to_string()
}

fn default_gl() -> String {
    "ca".to_string()
}

fn default_hl() -> String {
    "en".to_string()
}

/// The structured travel request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelRequest {
    pub origins: AirportSet,
    /// One set per destination. Unordered multi-city treats these as a set.
    pub destinations: Vec<AirportSet>,
    pub topology: Topology,
    pub dates: DateFlexibility,
    /// Stay at each destination, indexed like `destinations`.
    #[serde(default)]
    pub stays: Vec<StayRange>,
    /// Multi-city only: fly home after the last destination.
    #[serde(default = "default_true")]
    pub return_to_origin: bool,
    #[serde(default)]
    pub preferred_departure: Option<NaiveDate>,
    /// Anchor for season hints; today when unset.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub weights: WeightProfile,
    #[serde(default)]
    pub airline_preferences: AirlinePreference,
    #[serde(default)]
    pub passengers: Passengers,
    #[serde(default)]
    pub cabin: Cabin,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_gl")]
    pub gl: String,
    #[serde(default = "default_hl")]
    pub hl: String,
}

impl TravelRequest {
    /// A request with every optional field at its default.
    pub fn new(
        origins: AirportSet,
        destinations: Vec<AirportSet>,
        topology: Topology,
        dates: DateFlexibility,
    ) -> Self {
        Self {
            origins,
            destinations,
            topology,
            dates,
            stays: Vec::new(),
            return_to_origin: true,
            preferred_departure: None,
            reference_date: None,
            filters: FilterSet::default(),
            weights: WeightProfile::default(),
            airline_preferences: AirlinePreference::default(),
            passengers: Passengers::default(),
            cabin: Cabin::default(),
            currency: default_currency(),
            gl: default_gl(),
            hl: default_hl(),
        }
    }

    /// Number of destinations where the traveller stays before moving on.
    pub fn stop_count(&self) -> usize {
        match self.topology {
            Topology::OneWay => 0,
            Topology::RoundTrip | Topology::OpenJaw => 1,
            Topology::MultiCityOrdered | Topology::MultiCityUnordered => {
                if self.return_to_origin {
                    self.destinations.len()
                } else {
                    self.destinations.len().saturating_sub(1)
                }
            }
        }
    }

    /// Stay range for the `index`-th stop, falling back to an even split of
    /// a fuzzy trip duration or to `default_days`.
    pub fn stay_range(&self, index: usize, default_days: u32) -> StayRange {
        if let Some(range) = self.stays.get(index) {
            return *range;
        }
        match &self.dates {
            DateFlexibility::Fuzzy { trip_days, .. } => {
                let stops = self.stop_count().max(1) as u32;
                StayRange::exactly((trip_days / stops).max(1))
            }
            DateFlexibility::Window { .. } => StayRange::exactly(default_days),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::InvalidRequest(msg.to_string()));

        if self.origins.is_empty() {
            return invalid("no origin airports");
        }
        if self.destinations.is_empty() {
            return invalid("no destination airports");
        }
        let expected_ok = match self.topology {
            Topology::OneWay | Topology::RoundTrip => self.destinations.len() == 1,
            Topology::OpenJaw => self.destinations.len() == 2,
            Topology::MultiCityOrdered | Topology::MultiCityUnordered => !self.destinations.is_empty(),
        };
        if !expected_ok {
            return Err(ConfigError::InvalidRequest(format!(
                "{} does not accept {} destination set(s)",
                self.topology,
                self.destinations.len()
            )));
        }
        match &self.dates {
            DateFlexibility::Window { earliest, latest } if earliest > latest => {
                return invalid("date window ends before it starts");
            }
            DateFlexibility::Fuzzy { trip_days: 0, .. } => {
                return invalid("trip duration must be at least one day");
            }
            DateFlexibility::Fuzzy {
                season: SeasonHint::Month { month },
                ..
            } if !(1..=12).contains(month) => {
                return invalid("season month must be 1-12");
            }
            _ => {}
        }
        if self.stays.iter().any(|s| s.min_days > s.max_days) {
            return invalid("stay range minimum exceeds maximum");
        }
        if !self.filters.include_airlines.is_empty() && !self.filters.exclude_airlines.is_empty() {
            return invalid("include and exclude airline lists cannot be used together");
        }
        if let Some(price) = self.filters.max_price {
            if !price.is_finite() || price <= 0.0 {
                return invalid("max price must be positive");
            }
        }
        if self.passengers.adults + self.passengers.children == 0 {
            return invalid("at least one seated passenger is required");
        }
        self.weights.validate()
    }
}
