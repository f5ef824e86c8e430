mod fixtures;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use fixtures::*;
use flexiflight::request::{DateFlexibility, SeasonHint, StayRange, Topology, TravelRequest};
use flexiflight::strategy::{DateGranularity, GeneratorConfig, StrategyGenerator};

fn generator(max_strategies: usize) -> StrategyGenerator {
    StrategyGenerator::new(GeneratorConfig {
        max_strategies,
        ..GeneratorConfig::default()
    })
}

#[test]
fn test_round_trip_ottawa_paris_yields_round_trips() {
    let request = ottawa_paris_round_trip();
    let strategies = generator(24).generate(&request);

    assert!(!strategies.is_empty());
    assert!(strategies.len() <= 24);
    for strategy in &strategies {
        assert_eq!(strategy.topology, Topology::RoundTrip);
        assert_eq!(strategy.legs.len(), 2);
        assert_eq!(strategy.legs[0].origin, airports(&["YOW"]));
        assert_eq!(strategy.legs[1].destination, airports(&["YOW"]));
        assert_eq!((strategy.legs[1].date - strategy.legs[0].date).num_days(), 7);
    }
    // Paris has two airports; both are tried.
    let destinations: HashSet<String> = strategies
        .iter()
        .map(|s| s.legs[0].destination.to_string())
        .collect();
    assert!(destinations.contains("CDG"));
    assert!(destinations.contains("ORY"));
}

#[test]
fn test_output_is_bounded_and_unique() {
    let mut request = ottawa_paris_round_trip();
    request.dates = DateFlexibility::Window {
        earliest: date(2026, 5, 1),
        latest: date(2026, 6, 30),
    };
    request.stays = vec![StayRange { min_days: 5, max_days: 10 }];

    for k in [1, 7, 24, 100] {
        let strategies = generator(k).generate(&request);
        assert!(strategies.len() <= k);
        let keys: HashSet<String> = strategies.iter().map(|s| s.key()).collect();
        assert_eq!(keys.len(), strategies.len());
    }
}

#[test]
fn test_generation_is_deterministic() {
    let request = ottawa_paris_round_trip();
    let a = generator(24).generate(&request);
    let b = generator(24).generate(&request);
    assert_eq!(a, b);
}

#[test]
fn test_preferred_departure_sorts_first() {
    let mut request = one_way("YOW", "LHR", date(2026, 5, 1), date(2026, 5, 10));
    request.preferred_departure = Some(date(2026, 5, 6));
    let strategies = generator(3).generate(&request);
    assert_eq!(strategies[0].legs[0].date, date(2026, 5, 6));
}

#[test]
fn test_unordered_multi_city_expands_permutations() {
    let mut request = TravelRequest::new(
        airports(&["YYZ"]),
        vec![airports(&["FCO"]), airports(&["CDG"])],
        Topology::MultiCityUnordered,
        DateFlexibility::Window {
            earliest: date(2026, 6, 1),
            latest: date(2026, 6, 1),
        },
    );
    request.stays = vec![StayRange::exactly(4), StayRange::exactly(3)];

    let strategies = generator(24).generate(&request);
    assert_eq!(strategies.len(), 2);
    let first_stops: HashSet<String> = strategies.iter().map(|s| s.legs[0].destination.to_string()).collect();
    assert!(first_stops.contains("FCO"));
    assert!(first_stops.contains("CDG"));
    for strategy in &strategies {
        assert_eq!(strategy.legs.len(), 3);
        assert_eq!(strategy.legs[2].destination, airports(&["YYZ"]));
    }
}

#[test]
fn test_ordered_multi_city_keeps_order_and_can_skip_return() {
    let mut request = TravelRequest::new(
        airports(&["YUL"]),
        vec![airports(&["LHR"]), airports(&["CDG"])],
        Topology::MultiCityOrdered,
        DateFlexibility::Window {
            earliest: date(2026, 7, 1),
            latest: date(2026, 7, 1),
        },
    );
    request.return_to_origin = false;
    request.stays = vec![StayRange::exactly(5)];

    let strategies = generator(24).generate(&request);
    assert_eq!(strategies.len(), 1);
    let legs = &strategies[0].legs;
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0].destination, airports(&["LHR"]));
    assert_eq!(legs[1].origin, airports(&["LHR"]));
    assert_eq!(legs[1].date, date(2026, 7, 6));
}

#[test]
fn test_open_jaw_returns_from_second_destination() {
    let request = TravelRequest::new(
        airports(&["YOW"]),
        vec![airports(&["CDG"]), airports(&["FCO"])],
        Topology::OpenJaw,
        DateFlexibility::Window {
            earliest: date(2026, 5, 1),
            latest: date(2026, 5, 1),
        },
    );
    let strategies = generator(24).generate(&request);
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].legs[1].origin, airports(&["FCO"]));
    assert_eq!(strategies[0].legs[1].destination, airports(&["YOW"]));
}

#[test]
fn test_excluded_airports_are_pruned() {
    let mut request = ottawa_paris_round_trip();
    request.filters.excluded_connections = vec!["ORY".to_string()];
    let strategies = generator(24).generate(&request);
    assert!(!strategies.is_empty());
    assert!(strategies.iter().all(|s| !s.legs[0].destination.contains("ORY")));

    request.filters.excluded_connections = vec!["CDG".to_string(), "ORY".to_string()];
    assert!(generator(24).generate(&request).is_empty());
}

#[test]
fn test_impossible_duration_is_infeasible() {
    let mut request = one_way("YOW", "NRT", date(2026, 5, 1), date(2026, 5, 3));
    // Ottawa to Tokyo cannot be flown in three hours.
    request.filters.max_total_duration_minutes = Some(180);
    assert!(generator(24).generate(&request).is_empty());

    request.filters.max_total_duration_minutes = Some(24 * 60);
    assert_eq!(generator(24).generate(&request).len(), 3);
}

#[test]
fn test_same_airport_legs_are_pruned() {
    let request = one_way("YOW", "YOW", date(2026, 5, 1), date(2026, 5, 2));
    assert!(generator(24).generate(&request).is_empty());
}

#[test]
fn test_weekly_granularity_spaces_start_dates() {
    let request = one_way("YOW", "LHR", date(2026, 5, 1), date(2026, 5, 31));
    let strategies = StrategyGenerator::new(GeneratorConfig {
        granularity: DateGranularity::Weekly,
        ..GeneratorConfig::default()
    })
    .generate(&request);
    assert_eq!(strategies.len(), 5);
}

#[test]
fn test_enumeration_cap_bounds_work() {
    let request = one_way("YOW", "LHR", date(2026, 1, 1), date(2026, 12, 31));
    let strategies = StrategyGenerator::new(GeneratorConfig {
        enumeration_cap: 10,
        max_strategies: 100,
        ..GeneratorConfig::default()
    })
    .generate(&request);
    assert_eq!(strategies.len(), 10);
}

#[test]
fn test_enumeration_cap_stops_a_huge_product_early() {
    let destinations = ["LHR", "CDG", "FCO", "MAD", "BCN", "AMS", "FRA", "MUC", "LIS", "DUB"];
    let mut request = TravelRequest::new(
        airports(&["YYZ"]),
        destinations.iter().map(|code| airports(&[*code])).collect(),
        Topology::MultiCityUnordered,
        DateFlexibility::Window {
            earliest: date(2026, 1, 1),
            latest: date(2026, 12, 31),
        },
    );
    // 10! orderings times 200^10 stay splits per start date.
    request.stays = vec![StayRange { min_days: 1, max_days: 200 }; destinations.len()];

    let started = Instant::now();
    let strategies = StrategyGenerator::new(GeneratorConfig {
        enumeration_cap: 10,
        max_strategies: 100,
        ..GeneratorConfig::default()
    })
    .generate(&request);

    assert_eq!(strategies.len(), 10);
    assert!(started.elapsed() < Duration::from_secs(2));
    // Only the last stay moved before the cap was hit.
    for strategy in &strategies {
        assert_eq!(strategy.legs[0].date, date(2026, 1, 1));
        assert_eq!(strategy.legs[1].destination, airports(&["CDG"]));
    }
}

#[test]
fn test_fuzzy_season_resolves_after_reference_date() {
    let mut request = one_way("YOW", "LHR", date(2026, 1, 1), date(2026, 1, 1));
    request.dates = DateFlexibility::Fuzzy {
        trip_days: 7,
        season: SeasonHint::Month { month: 3 },
    };
    request.reference_date = Some(date(2026, 4, 15));

    let strategies = generator(100).generate(&request);
    assert!(!strategies.is_empty());
    for strategy in &strategies {
        let start = strategy.legs[0].date;
        assert!(start > date(2026, 4, 15));
        assert_eq!(start.format("%Y-%m").to_string(), "2027-03");
    }
}
