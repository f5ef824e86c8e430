//! Routing strategy generation.
//!
//! Expands a travel request into a bounded, de-duplicated, deterministically
//! ordered list of concrete dated itinerary shapes. The request is treated as
//! a product of independent axes (start date, destination order, stay split,
//! airport choice) and each combination is pruned before it is kept.

use std::collections::HashSet;
use std::fmt;

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calendar;
use crate::haversine::HaversineEstimate;
use crate::request::{AirportSet, DateFlexibility, StayRange, Topology, TravelRequest, DEFAULT_STAY_DAYS};

/// One flight leg of a routing strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Leg {
    pub origin: AirportSet,
    pub destination: AirportSet,
    pub date: NaiveDate,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}@{}", self.origin, self.destination, self.date)
    }
}

/// A fully dated, fully ordered itinerary shape, prior to pricing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingStrategy {
    pub topology: Topology,
    pub legs: Vec<Leg>,
}

impl RoutingStrategy {
    /// Canonical de-duplication key: topology plus ordered legs.
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.legs.first().map(|leg| leg.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.legs.last().map(|leg| leg.date)
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.topology)?;
        for leg in &self.legs {
            write!(f, "|{}", leg)?;
        }
        Ok(())
    }
}

/// Spacing between candidate start dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateGranularity {
    Daily,
    Weekly,
}

impl DateGranularity {
    pub fn step_days(&self) -> u64 {
        match self {
            DateGranularity::Daily => 1,
            DateGranularity::Weekly => 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Maximum number of strategies returned (K).
    pub max_strategies: usize,
    pub granularity: DateGranularity,
    /// Step between candidate stay lengths inside a stay range.
    pub stay_step_days: u32,
    /// Split multi-airport cities into one strategy per airport.
    pub expand_airports: bool,
    pub default_stay_days: u32,
    /// Hard stop on raw combinations examined before pruning.
    pub enumeration_cap: usize,
    pub holidays: Vec<NaiveDate>,
    /// Anchor for season hints when the request has none; today otherwise.
    pub reference_date: Option<NaiveDate>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_strategies: 24,
            granularity: DateGranularity::Daily,
            stay_step_days: 1,
            expand_airports: true,
            default_stay_days: DEFAULT_STAY_DAYS,
            enumeration_cap: 5000,
            holidays: Vec::new(),
            reference_date: None,
        }
    }
}

/// Where a leg starts or ends: the origin, or a destination by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    Origin,
    Destination(usize),
}

/// A leg sequence for one destination ordering, before dates and airports.
#[derive(Debug, Clone)]
struct Shape {
    legs: Vec<(Place, Place)>,
    /// Stay between consecutive legs; `legs.len() - 1` entries.
    stays: Vec<StayRange>,
}

struct Ranked {
    strategy: RoutingStrategy,
    date_distance: i64,
    pto_days: u32,
    order: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyGenerator {
    config: GeneratorConfig,
    estimate: HaversineEstimate,
}

impl StrategyGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            estimate: HaversineEstimate::default(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Expand `request` into at most `max_strategies` routing strategies.
    ///
    /// An empty result means nothing survives the hard constraints; it is
    /// not an error.
    pub fn generate(&self, request: &TravelRequest) -> Vec<RoutingStrategy> {
        let Some((earliest, latest)) = self.departure_window(request) else {
            debug!("no departure window could be resolved");
            return Vec::new();
        };

        let Some(places) = self.place_airports(request) else {
            debug!("every airport of some place is excluded");
            return Vec::new();
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut kept: Vec<Ranked> = Vec::new();
        let mut examined = 0usize;
        let mut pruned = 0usize;
        let mut capped = false;

        // Axes are produced lazily: nothing past the cap is ever built.
        let step = self.config.granularity.step_days();
        'outer: for start in date_range(earliest, latest, step) {
            for shape in shapes_for(request, self.config.default_stay_days) {
                for stays in stay_splits(&shape.stays, self.config.stay_step_days) {
                    for combo in airport_combinations(&places) {
                        if examined >= self.config.enumeration_cap {
                            capped = true;
                            break 'outer;
                        }
                        examined += 1;

                        let Some(strategy) = build_strategy(request.topology, &shape, &stays, &combo, start) else {
                            pruned += 1;
                            continue;
                        };
                        if !self.feasible(request, &strategy) {
                            pruned += 1;
                            continue;
                        }
                        if !seen.insert(strategy.key()) {
                            continue;
                        }

                        let order = kept.len();
                        kept.push(self.rank_entry(request, strategy, order));
                    }
                }
            }
        }

        if capped {
            warn!(
                cap = self.config.enumeration_cap,
                "strategy enumeration cap reached; later start dates were not considered"
            );
        }

        kept.sort_by(|a, b| {
            a.strategy
                .legs
                .len()
                .cmp(&b.strategy.legs.len())
                .then(a.date_distance.cmp(&b.date_distance))
                .then(a.pto_days.cmp(&b.pto_days))
                .then(a.order.cmp(&b.order))
        });
        let unique = kept.len();
        kept.truncate(self.config.max_strategies);

        debug!(
            examined,
            pruned,
            unique,
            returned = kept.len(),
            "strategy generation finished"
        );

        kept.into_iter().map(|r| r.strategy).collect()
    }

    fn departure_window(&self, request: &TravelRequest) -> Option<(NaiveDate, NaiveDate)> {
        match &request.dates {
            DateFlexibility::Window { earliest, latest } => {
                (earliest <= latest).then_some((*earliest, *latest))
            }
            DateFlexibility::Fuzzy { season, .. } => {
                let reference = request
                    .reference_date
                    .or(self.config.reference_date)
                    .unwrap_or_else(|| Utc::now().date_naive());
                calendar::season_window(*season, reference)
            }
        }
    }

    /// Candidate airports for the origin and each destination, with excluded
    /// airports removed. `None` if a place is left with no airport at all.
    fn place_airports(&self, request: &TravelRequest) -> Option<Vec<Vec<AirportSet>>> {
        let mut places = Vec::with_capacity(request.destinations.len() + 1);
        for set in std::iter::once(&request.origins).chain(request.destinations.iter()) {
            let allowed: Vec<&String> = set
                .codes()
                .iter()
                .filter(|code| !request.filters.is_excluded_connection(code))
                .collect();
            if allowed.is_empty() {
                return None;
            }
            let choices = if self.config.expand_airports {
                allowed.into_iter().map(|code| AirportSet::single(code)).collect()
            } else {
                vec![AirportSet::parse(allowed).ok()?]
            };
            places.push(choices);
        }
        Some(places)
    }

    /// Duration lower bound check against the total travel ceiling.
    fn feasible(&self, request: &TravelRequest, strategy: &RoutingStrategy) -> bool {
        let Some(ceiling) = request.filters.max_total_duration_minutes else {
            return true;
        };
        let bound: u32 = strategy
            .legs
            .iter()
            .map(|leg| {
                self.estimate
                    .min_leg_minutes(leg.origin.codes(), leg.destination.codes())
            })
            .sum();
        bound <= ceiling
    }

    fn rank_entry(&self, request: &TravelRequest, strategy: RoutingStrategy, order: usize) -> Ranked {
        let start = strategy.start_date().unwrap_or(NaiveDate::MIN);
        let end = strategy.end_date().unwrap_or(start);
        let date_distance = request
            .preferred_departure
            .map(|preferred| (start - preferred).num_days().abs())
            .unwrap_or(0);
        let pto_days = calendar::pto_days(start, end, &self.config.holidays);
        Ranked {
            strategy,
            date_distance,
            pto_days,
            order,
        }
    }
}

/// Leg sequences for every destination ordering the topology allows.
fn shapes_for(request: &TravelRequest, default_stay: u32) -> Box<dyn Iterator<Item = Shape> + '_> {
    let n = request.destinations.len();
    let stay = |dest: usize| request.stay_range(dest, default_stay);

    match request.topology {
        Topology::OneWay => Box::new(std::iter::once(Shape {
            legs: vec![(Place::Origin, Place::Destination(0))],
            stays: Vec::new(),
        })),
        Topology::RoundTrip => Box::new(std::iter::once(Shape {
            legs: vec![
                (Place::Origin, Place::Destination(0)),
                (Place::Destination(0), Place::Origin),
            ],
            stays: vec![stay(0)],
        })),
        Topology::OpenJaw => Box::new(std::iter::once(Shape {
            legs: vec![
                (Place::Origin, Place::Destination(0)),
                (Place::Destination(1), Place::Origin),
            ],
            stays: vec![stay(0)],
        })),
        Topology::MultiCityOrdered => Box::new(std::iter::once(multi_city_shape(
            &(0..n).collect::<Vec<_>>(),
            request,
            default_stay,
        ))),
        Topology::MultiCityUnordered => Box::new(
            Permutations::new(n).map(move |order| multi_city_shape(&order, request, default_stay)),
        ),
    }
}

fn multi_city_shape(order: &[usize], request: &TravelRequest, default_stay: u32) -> Shape {
    let mut legs = Vec::with_capacity(order.len() + 1);
    let mut stays = Vec::with_capacity(order.len());
    let mut from = Place::Origin;
    for &dest in order {
        legs.push((from, Place::Destination(dest)));
        from = Place::Destination(dest);
    }
    if request.return_to_origin {
        legs.push((from, Place::Origin));
    }
    // A stay follows every leg except the last.
    for &(_, to) in legs.iter().take(legs.len().saturating_sub(1)) {
        if let Place::Destination(dest) = to {
            stays.push(request.stay_range(dest, default_stay));
        }
    }
    Shape { legs, stays }
}

/// Permutations of `0..n` in lexicographic order, produced one at a time.
struct Permutations {
    current: Option<Vec<usize>>,
}

impl Permutations {
    fn new(n: usize) -> Self {
        Self {
            current: Some((0..n).collect()),
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.take()?;
        let mut next = current.clone();
        if next_permutation(&mut next) {
            self.current = Some(next);
        }
        Some(current)
    }
}

/// Standard in-place next-permutation step. False once `items` is the last
/// permutation.
fn next_permutation(items: &mut [usize]) -> bool {
    let Some(i) = (1..items.len()).rev().find(|&i| items[i - 1] < items[i]) else {
        return false;
    };
    let pivot = i - 1;
    let Some(j) = (i..items.len()).rev().find(|&j| items[j] > items[pivot]) else {
        return false;
    };
    items.swap(pivot, j);
    items[i..].reverse();
    true
}

/// Walks every index tuple below `radices`, last position turning fastest.
/// Any zero radix means there is nothing to walk.
struct Odometer {
    radices: Vec<usize>,
    current: Option<Vec<usize>>,
}

impl Odometer {
    fn new(radices: Vec<usize>) -> Self {
        let current = (!radices.contains(&0)).then(|| vec![0; radices.len()]);
        Self { radices, current }
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.take()?;
        let mut next = current.clone();
        for position in (0..next.len()).rev() {
            next[position] += 1;
            if next[position] < self.radices[position] {
                self.current = Some(next);
                break;
            }
            next[position] = 0;
        }
        Some(current)
    }
}

/// Every combination of stay lengths, first stop varying slowest.
fn stay_splits(ranges: &[StayRange], step: u32) -> impl Iterator<Item = Vec<u32>> {
    let step = step.max(1) as usize;
    let values: Vec<Vec<u32>> = ranges
        .iter()
        .map(|range| (range.min_days..=range.max_days).step_by(step).collect())
        .collect();
    Odometer::new(values.iter().map(Vec::len).collect())
        .map(move |index| index.iter().zip(&values).map(|(&i, choices)| choices[i]).collect())
}

/// One airport choice per place (origin first), as a Cartesian product.
fn airport_combinations(places: &[Vec<AirportSet>]) -> impl Iterator<Item = Vec<AirportSet>> + '_ {
    Odometer::new(places.iter().map(Vec::len).collect()).map(move |index| {
        index
            .iter()
            .zip(places)
            .map(|(&i, choices)| choices[i].clone())
            .collect()
    })
}

fn date_range(earliest: NaiveDate, latest: NaiveDate, step: u64) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(earliest), move |date| date.checked_add_days(Days::new(step.max(1))))
        .take_while(move |date| *date <= latest)
}

/// Materialize one strategy, or `None` if a leg would start and end at the
/// same airport.
fn build_strategy(
    topology: Topology,
    shape: &Shape,
    stays: &[u32],
    combo: &[AirportSet],
    start: NaiveDate,
) -> Option<RoutingStrategy> {
    let airports_of = |place: Place| match place {
        Place::Origin => &combo[0],
        Place::Destination(i) => &combo[i + 1],
    };

    let mut legs = Vec::with_capacity(shape.legs.len());
    let mut date = start;
    for (index, &(from, to)) in shape.legs.iter().enumerate() {
        if index > 0 {
            let stay = stays.get(index - 1).copied().unwrap_or(0);
            date = date.checked_add_days(Days::new(u64::from(stay)))?;
        }
        let origin = airports_of(from);
        let destination = airports_of(to);
        if origin.intersects(destination) {
            return None;
        }
        legs.push(Leg {
            origin: origin.clone(),
            destination: destination.clone(),
            date,
        });
    }

    Some(RoutingStrategy { topology, legs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutations_lexicographic() {
        assert_eq!(Permutations::new(3).collect::<Vec<_>>(), vec![
            vec![0, 1, 2],
            vec![0, 2, 1],
            vec![1, 0, 2],
            vec![1, 2, 0],
            vec![2, 0, 1],
            vec![2, 1, 0],
        ]);
        assert_eq!(Permutations::new(1).collect::<Vec<_>>(), vec![vec![0]]);
    }

    #[test]
    fn test_stay_splits_product() {
        let splits: Vec<Vec<u32>> =
            stay_splits(&[StayRange { min_days: 2, max_days: 3 }, StayRange::exactly(4)], 1).collect();
        assert_eq!(splits, vec![vec![2, 4], vec![3, 4]]);
        assert_eq!(stay_splits(&[], 1).collect::<Vec<_>>(), vec![Vec::<u32>::new()]);
        assert_eq!(stay_splits(&[StayRange { min_days: 5, max_days: 3 }], 1).count(), 0);
    }

    #[test]
    fn test_odometer_turns_last_position_fastest() {
        let walked: Vec<Vec<usize>> = Odometer::new(vec![2, 3]).collect();
        assert_eq!(walked.len(), 6);
        assert_eq!(walked[0], vec![0, 0]);
        assert_eq!(walked[1], vec![0, 1]);
        assert_eq!(walked[5], vec![1, 2]);
        assert_eq!(Odometer::new(vec![3, 0]).count(), 0);
    }

    #[test]
    fn test_permutations_are_lazy() {
        let mut twelve = Permutations::new(12);
        assert_eq!(twelve.next(), Some((0..12).collect::<Vec<_>>()));
        assert_eq!(twelve.next().map(|p| p[10..].to_vec()), Some(vec![11, 10]));
    }

    #[test]
    fn test_date_range_weekly() {
        let start = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 5, 20).unwrap();
        let dates: Vec<NaiveDate> = date_range(start, end, 7).collect();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2026, 5, 15).unwrap());
    }

    #[test]
    fn test_strategy_key_is_canonical() {
        let leg = Leg {
            origin: AirportSet::single("YOW"),
            destination: AirportSet::single("CDG"),
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        };
        let strategy = RoutingStrategy {
            topology: Topology::OneWay,
            legs: vec![leg],
        };
        assert_eq!(strategy.key(), "one_way|YOW>CDG@2026-05-01");
    }
}
