//! Rule-based requirement extraction.
//!
//! A deterministic keyword parser over the airport table. It understands a
//! narrow, predictable phrasing and is what the planner uses when no
//! language model is configured.

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::airports;
use crate::error::InterpretError;
use crate::request::{
    AirportSet, Cabin, DateFlexibility, SeasonHint, StayRange, Topology, TravelRequest, DEFAULT_STAY_DAYS,
};
use crate::traits::RequestInterpreter;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Horizon used when the text gives no date at all.
const DEFAULT_HORIZON_WEEKS: u32 = 4;

struct Patterns {
    iso_date: Regex,
    code: Regex,
    next_weeks: Regex,
    duration: Regex,
    max_stops: Regex,
    price: Regex,
    carry_on: Regex,
    checked: Regex,
    travellers: Regex,
}

fn compile(pattern: &str) -> Result<Regex, InterpretError> {
    Regex::new(pattern).map_err(|e| InterpretError::Unrecognized(format!("bad pattern {}: {}", pattern, e)))
}

impl Patterns {
    fn new() -> Result<Self, InterpretError> {
        Ok(Self {
            iso_date: compile(r"\b(\d{4}-\d{2}-\d{2})\b")?,
            code: compile(r"\b([A-Z]{3})\b")?,
            next_weeks: compile(r"next\s+(\d+)\s+weeks?")?,
            duration: compile(r"(\d+)[\s-]+(day|week)s?")?,
            max_stops: compile(r"(?:max(?:imum)?|at most|up to)\s+(\d+)\s+stops?|(\d+)\s+stops?\s+max")?,
            price: compile(r"(?:under|below|less than|max(?:imum)? price|budget of)\s+\$?\s*(\d+(?:\.\d+)?)")?,
            carry_on: compile(r"(?:(\d+)\s+)?carry[\s-]?ons?")?,
            checked: compile(r"(\d+)\s+checked(?:\s+bags?)?")?,
            travellers: compile(r"(\d+)\s+(?:adults|passengers|people|travell?ers)")?,
        })
    }
}

/// A place mentioned in the text and where it was mentioned.
#[derive(Debug)]
struct Mention {
    position: usize,
    airports: AirportSet,
}

pub struct RuleBasedInterpreter {
    patterns: Patterns,
    today: NaiveDate,
}

impl RuleBasedInterpreter {
    pub fn new(today: NaiveDate) -> Result<Self, InterpretError> {
        Ok(Self {
            patterns: Patterns::new()?,
            today,
        })
    }

    /// City names and bare IATA codes, in order of appearance.
    fn mentions(&self, text: &str, lower: &str) -> Vec<Mention> {
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut found: Vec<Mention> = Vec::new();

        for city in airports::known_cities() {
            let needle = city.to_lowercase();
            for (start, _) in lower.match_indices(&needle) {
                let end = start + needle.len();
                if !on_word_boundary(lower, start, end) || taken.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                if let Ok(set) = AirportSet::parse(airports::airports_for_city(city)) {
                    taken.push((start, end));
                    found.push(Mention {
                        position: start,
                        airports: set,
                    });
                }
            }
        }

        for capture in self.patterns.code.captures_iter(text) {
            let Some(code) = capture.get(1) else { continue };
            if airports::lookup(code.as_str()).is_none() {
                continue;
            }
            if taken.iter().any(|&(s, e)| code.start() < e && s < code.end()) {
                continue;
            }
            found.push(Mention {
                position: code.start(),
                airports: AirportSet::single(code.as_str()),
            });
        }

        found.sort_by_key(|m| m.position);
        found
    }

    fn dates(&self, lower: &str, stop_count: usize) -> (DateFlexibility, Vec<StayRange>) {
        let mut iso: Vec<NaiveDate> = self
            .patterns
            .iso_date
            .captures_iter(lower)
            .filter_map(|c| c.get(1))
            .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
            .collect();

        let next_weeks = first_number(&self.patterns.next_weeks, lower);
        let without_horizon = self.patterns.next_weeks.replace_all(lower, "");
        let trip_days = self
            .patterns
            .duration
            .captures(&without_horizon)
            .and_then(|c| {
                let n: u32 = c.get(1)?.as_str().parse().ok()?;
                if c.get(2)?.as_str() == "week" { n.checked_mul(7) } else { Some(n) }
            });

        let returning = lower.contains("return") || lower.contains("back on");
        match iso.len() {
            0 => {
                let season = season_hint(lower)
                    .or(next_weeks.map(|weeks| SeasonHint::NextWeeks { weeks }))
                    .unwrap_or(SeasonHint::NextWeeks {
                        weeks: DEFAULT_HORIZON_WEEKS,
                    });
                let dates = DateFlexibility::Fuzzy {
                    trip_days: trip_days.unwrap_or(DEFAULT_STAY_DAYS),
                    season,
                };
                (dates, Vec::new())
            }
            1 => {
                let day = iso[0];
                let stays = trip_days
                    .map(|days| vec![StayRange::exactly(days); stop_count])
                    .unwrap_or_default();
                (
                    DateFlexibility::Window {
                        earliest: day,
                        latest: day,
                    },
                    stays,
                )
            }
            _ => {
                iso.truncate(2);
                let (first, second) = (iso[0].min(iso[1]), iso[0].max(iso[1]));
                if returning && stop_count == 1 {
                    // "leave A, return B": fixed departure, fixed stay.
                    let stay = (second - first).num_days().max(1) as u32;
                    (
                        DateFlexibility::Window {
                            earliest: first,
                            latest: first,
                        },
                        vec![StayRange::exactly(stay)],
                    )
                } else {
                    let stays = trip_days
                        .map(|days| vec![StayRange::exactly(days); stop_count])
                        .unwrap_or_default();
                    (
                        DateFlexibility::Window {
                            earliest: first,
                            latest: second,
                        },
                        stays,
                    )
                }
            }
        }
    }
}

fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
}

fn first_number<T: std::str::FromStr>(pattern: &Regex, text: &str) -> Option<T> {
    pattern
        .captures(text)?
        .iter()
        .skip(1)
        .flatten()
        .find_map(|m| m.as_str().parse().ok())
}

fn season_hint(lower: &str) -> Option<SeasonHint> {
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (index, month) in MONTHS.iter().enumerate() {
        // "may" is also a verb; only trust it after "in".
        let hit = if *month == "may" {
            words.windows(2).any(|w| w == ["in", "may"])
        } else {
            words.contains(month)
        };
        if hit {
            return Some(SeasonHint::Month {
                month: index as u32 + 1,
            });
        }
    }

    if words.contains(&"spring") {
        Some(SeasonHint::Spring)
    } else if words.contains(&"summer") {
        Some(SeasonHint::Summer)
    } else if words.contains(&"fall") || words.contains(&"autumn") {
        Some(SeasonHint::Fall)
    } else if words.contains(&"winter") {
        Some(SeasonHint::Winter)
    } else {
        None
    }
}

fn topology(lower: &str, destinations: usize) -> (Topology, bool) {
    let one_way = lower.contains("one way") || lower.contains("one-way");
    let unordered = ["either order", "any order", "in any order"]
        .iter()
        .any(|phrase| lower.contains(phrase));

    match destinations {
        0 | 1 if one_way => (Topology::OneWay, false),
        0 | 1 => (Topology::RoundTrip, true),
        2 if lower.contains("open jaw") || lower.contains("open-jaw") => (Topology::OpenJaw, true),
        _ if unordered => (Topology::MultiCityUnordered, !one_way),
        _ => (Topology::MultiCityOrdered, !one_way),
    }
}

impl RequestInterpreter for RuleBasedInterpreter {
    fn interpret(&self, text: &str) -> Result<TravelRequest, InterpretError> {
        let lower = text.to_lowercase();
        let mentions = self.mentions(text, &lower);

        let origin_index = lower
            .find("from ")
            .and_then(|from| mentions.iter().position(|m| m.position >= from))
            .unwrap_or(0);
        let origin = mentions
            .get(origin_index)
            .map(|m| m.airports.clone())
            .ok_or_else(|| InterpretError::Unrecognized("no origin city or airport found".to_string()))?;

        let mut destinations: Vec<AirportSet> = Vec::new();
        for mention in mentions.iter().filter(|m| m.airports != origin) {
            if !destinations.contains(&mention.airports) {
                destinations.push(mention.airports.clone());
            }
        }
        if destinations.is_empty() {
            return Err(InterpretError::Unrecognized("no destination city or airport found".to_string()));
        }

        let (topology, return_to_origin) = topology(&lower, destinations.len());
        let mut request = TravelRequest::new(origin, destinations, topology, DateFlexibility::Window {
            earliest: self.today,
            latest: self.today,
        });
        request.return_to_origin = return_to_origin;
        request.reference_date = Some(self.today);

        let (dates, stays) = self.dates(&lower, request.stop_count());
        request.dates = dates;
        request.stays = stays;

        let filters = &mut request.filters;
        if lower.contains("nonstop") || lower.contains("non-stop") || lower.contains("direct") {
            filters.max_stops = Some(0);
        } else if let Some(stops) = first_number(&self.patterns.max_stops, &lower) {
            filters.max_stops = Some(stops);
        }
        filters.max_price = first_number(&self.patterns.price, &lower);
        if let Some(capture) = self.patterns.carry_on.captures(&lower) {
            filters.carry_on_bags = capture
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
        }
        if let Some(bags) = first_number(&self.patterns.checked, &lower) {
            filters.checked_bags = bags;
        }

        if lower.contains("low cost") || lower.contains("low-cost") || lower.contains("budget airline") {
            request.airline_preferences.avoid_low_cost = lower.contains("avoid") || lower.contains("no ");
        }
        if let Some(adults) = first_number(&self.patterns.travellers, &lower) {
            request.passengers.adults = adults;
        }
        request.cabin = if lower.contains("premium economy") {
            Cabin::PremiumEconomy
        } else if lower.contains("business") {
            Cabin::Business
        } else if lower.contains("first class") {
            Cabin::First
        } else {
            Cabin::Economy
        };

        debug!(
            origin = %request.origins,
            destinations = request.destinations.len(),
            topology = %request.topology,
            "interpreted request"
        );
        request.validate()?;
        Ok(request)
    }
}
