//! Great-circle lower bound on flight time.
//!
//! Used by the strategy generator to discard shapes that cannot possibly
//! meet a total-duration ceiling. Only ever a lower bound: real itineraries
//! are slower (connections, routing), never faster.

use crate::airports;

/// Generous block speed so the estimate stays a lower bound.
const DEFAULT_SPEED_KMH: f64 = 850.0;

/// Minimum taxi + climb + descent overhead per flight.
const DEFAULT_OVERHEAD_MINUTES: u32 = 30;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based minimum flight-time estimator.
#[derive(Debug, Clone)]
pub struct HaversineEstimate {
    /// Assumed block speed in km/h.
    pub speed_kmh: f64,
    /// Fixed per-flight overhead in minutes.
    pub overhead_minutes: u32,
}

impl Default for HaversineEstimate {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            overhead_minutes: DEFAULT_OVERHEAD_MINUTES,
        }
    }
}

impl HaversineEstimate {
    pub fn new(speed_kmh: f64, overhead_minutes: u32) -> Self {
        Self {
            speed_kmh,
            overhead_minutes,
        }
    }

    /// Calculate haversine distance between two points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// Convert distance in km to flight minutes, overhead included.
    fn km_to_minutes(&self, km: f64) -> u32 {
        let hours = km / self.speed_kmh;
        (hours * 60.0).floor() as u32 + self.overhead_minutes
    }

    /// Shortest possible flight between two airports, or `None` when either
    /// airport is outside the reference table.
    pub fn airport_minutes(&self, from: &str, to: &str) -> Option<u32> {
        let a = airports::lookup(from)?;
        let b = airports::lookup(to)?;
        let km = Self::haversine_km((a.lat, a.lng), (b.lat, b.lng));
        Some(self.km_to_minutes(km))
    }

    /// Lower bound over every origin/destination pairing of a leg.
    ///
    /// Unknown airports make the bound 0 so they never cause pruning.
    pub fn min_leg_minutes(&self, origins: &[String], destinations: &[String]) -> u32 {
        let mut best: Option<u32> = None;
        for from in origins {
            for to in destinations {
                match self.airport_minutes(from, to) {
                    Some(minutes) => best = Some(best.map_or(minutes, |b| b.min(minutes))),
                    None => return 0,
                }
            }
        }
        best.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = HaversineEstimate::haversine_km((45.3, -75.6), (45.3, -75.6));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Ottawa to Paris CDG is roughly 5,650 km
        let dist = HaversineEstimate::haversine_km((45.3225, -75.6692), (49.0097, 2.5479));
        assert!(dist > 5500.0 && dist < 5800.0, "YOW to CDG should be ~5650km, got {}", dist);
    }

    #[test]
    fn test_reasonable_flight_time() {
        let estimate = HaversineEstimate::new(850.0, 30);
        // 850 km at 850 km/h = 60 minutes, plus overhead
        assert_eq!(estimate.km_to_minutes(850.0), 90);
    }

    #[test]
    fn test_unknown_airport_never_prunes() {
        let estimate = HaversineEstimate::default();
        let bound = estimate.min_leg_minutes(&["YOW".to_string()], &["XXX".to_string()]);
        assert_eq!(bound, 0);
    }

    #[test]
    fn test_min_over_airport_set() {
        let estimate = HaversineEstimate::default();
        let to_cdg = estimate.airport_minutes("YOW", "CDG").unwrap();
        let to_ory = estimate.airport_minutes("YOW", "ORY").unwrap();
        let bound = estimate.min_leg_minutes(&["YOW".to_string()], &["CDG".to_string(), "ORY".to_string()]);
        assert_eq!(bound, to_cdg.min(to_ory));
    }
}
