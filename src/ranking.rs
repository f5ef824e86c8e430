//! Multi-criteria ranking of itinerary candidates.
//!
//! Every criterion is min-max scaled against the pool being ranked, so
//! "cheap" always means cheap relative to what is actually feasible. The
//! weighted sum of scaled criteria is a penalty; lower is better.

use std::cmp::Ordering;

use serde::Serialize;

use crate::itinerary::ItineraryCandidate;
use crate::request::WeightProfile;

const CRITERIA: usize = 7;

/// A candidate with its place in the final order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate: ItineraryCandidate,
    /// Weighted sum of normalized criteria. Lower is better.
    pub penalty: f64,
    /// `1 - penalty / total_weight`, in [0, 1]. Higher is better.
    pub score: f64,
}

/// Raw criterion values in the same order as `WeightProfile::values`.
fn criteria(candidate: &ItineraryCandidate) -> [f64; CRITERIA] {
    [
        candidate.total_price,
        f64::from(candidate.total_duration_minutes),
        f64::from(candidate.total_stops),
        f64::from(candidate.overnight_layovers()),
        candidate.risk_score,
        candidate.airline_penalty,
        f64::from(candidate.pto_days),
    ]
}

/// Per-criterion (min, span) over the pool.
fn bounds(rows: &[[f64; CRITERIA]]) -> [(f64, f64); CRITERIA] {
    let mut out = [(0.0, 0.0); CRITERIA];
    for (i, slot) in out.iter_mut().enumerate() {
        let (min, max) = rows
            .iter()
            .map(|row| row[i])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min.is_finite() && max.is_finite() {
            *slot = (min, max - min);
        }
    }
    out
}

fn normalize(value: f64, (min, span): (f64, f64)) -> f64 {
    if span <= f64::EPSILON {
        0.0
    } else {
        ((value - min) / span).clamp(0.0, 1.0)
    }
}

/// Final ordering: penalty, then price, stops, duration and identity.
fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.penalty
        .total_cmp(&b.penalty)
        .then_with(|| a.candidate.total_price.total_cmp(&b.candidate.total_price))
        .then_with(|| a.candidate.total_stops.cmp(&b.candidate.total_stops))
        .then_with(|| {
            a.candidate
                .total_duration_minutes
                .cmp(&b.candidate.total_duration_minutes)
        })
        .then_with(|| a.candidate.identity.cmp(&b.candidate.identity))
}

/// Score `candidates` against `weights` and return at most `top_n`, best
/// first. The order is total: equal penalties fall through to the
/// tie-breaks, ending at the candidate identity.
pub fn rank(candidates: Vec<ItineraryCandidate>, weights: &WeightProfile, top_n: usize) -> Vec<RankedCandidate> {
    let rows: Vec<[f64; CRITERIA]> = candidates.iter().map(criteria).collect();
    let bounds = bounds(&rows);
    let weight_values = weights.values();
    let total_weight = weights.total();

    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .zip(rows)
        .map(|(candidate, row)| {
            let penalty: f64 = row
                .iter()
                .zip(bounds.iter())
                .zip(weight_values.iter())
                .map(|((value, bound), (_, weight))| weight * normalize(*value, *bound))
                .sum();
            let score = if total_weight > 0.0 {
                (1.0 - penalty / total_weight).clamp(0.0, 1.0)
            } else {
                0.0
            };
            RankedCandidate {
                candidate,
                penalty,
                score,
            }
        })
        .collect();

    ranked.sort_by(compare);
    ranked.truncate(top_n);
    ranked
}
