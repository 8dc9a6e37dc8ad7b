//! Comparable-price aggregation and statistics.
//!
//! This module turns comparable sales into a price estimate: per-acre
//! unit prices are grouped by greedy seed-relative clustering, the
//! largest cluster is summarized, and its dispersion is mapped to a
//! confidence score. Every function is pure and keeps no state
//! between calls.

use crate::analysis::narrative::build_narrative;
use crate::models::{Estimate, EstimateInput, Observation, ObservationStatus, PriceStatistics};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

/// Maximum relative difference from a cluster seed for membership.
pub const SIMILARITY_THRESHOLD: f64 = 0.25;

/// Reasons an estimate could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    /// Not enough usable input.
    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// Statistics would be non-finite (e.g. zero mean).
    #[error("Degenerate statistics: {reason}")]
    DegenerateStatistics { reason: String },
}

impl EstimateError {
    fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }

    fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateStatistics {
            reason: reason.into(),
        }
    }
}

/// Derive `price / area` for every valid observation.
pub fn compute_unit_prices(observations: &[Observation]) -> Vec<f64> {
    observations
        .iter()
        .filter_map(|obs| match obs.validate() {
            ObservationStatus::Valid { unit_price } => Some(unit_price),
            ObservationStatus::Invalid(reason) => {
                debug!("Dropping observation {:?}: {}", obs.label, reason);
                None
            }
        })
        .collect()
}

/// Relative difference of `candidate` from `seed`, measured against the seed.
///
/// A zero seed only matches an exact zero; anything else is infinitely far.
pub fn relative_difference(seed: f64, candidate: f64) -> f64 {
    if seed == 0.0 {
        return if candidate == 0.0 { 0.0 } else { f64::INFINITY };
    }
    (candidate - seed).abs() / seed.abs()
}

/// Greedy clustering: take the first remaining value as seed, pull every
/// remaining value within the threshold of it, repeat.
///
/// The comparison is relative to the seed, so the result depends on
/// input order.
pub fn cluster_by_similarity(unit_prices: &[f64]) -> Vec<Vec<f64>> {
    let mut remaining: VecDeque<f64> = unit_prices.iter().copied().collect();
    let mut clusters = Vec::new();

    while let Some(seed) = remaining.pop_front() {
        let mut cluster = vec![seed];
        remaining.retain(|&candidate| {
            if relative_difference(seed, candidate) <= SIMILARITY_THRESHOLD {
                cluster.push(candidate);
                false
            } else {
                true
            }
        });

        debug!("Formed cluster around {} with {} members", seed, cluster.len());
        clusters.push(cluster);
    }

    clusters
}

/// Pick the largest cluster; among equal sizes the first formed wins.
pub fn select_dominant_cluster(clusters: &[Vec<f64>]) -> Option<&[f64]> {
    let mut dominant: Option<&Vec<f64>> = None;

    for cluster in clusters {
        match dominant {
            Some(best) if best.len() >= cluster.len() => {}
            _ => dominant = Some(cluster),
        }
    }

    dominant.map(|c| c.as_slice())
}

/// Mean, population standard deviation, CV and range of a cluster.
///
/// Values are scaled by the largest magnitude before summing, so sums
/// and squared deviations stay finite for any finite input.
pub fn compute_statistics(cluster: &[f64]) -> Result<PriceStatistics, EstimateError> {
    if cluster.is_empty() {
        return Err(EstimateError::degenerate("empty cluster"));
    }

    let count = cluster.len();
    let n = count as f64;
    let scale = cluster.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if !scale.is_finite() {
        return Err(EstimateError::degenerate("non-finite unit price in cluster"));
    }
    if scale == 0.0 {
        return Err(EstimateError::degenerate(
            "mean unit price is zero, coefficient of variation is undefined",
        ));
    }

    let scaled_mean = cluster.iter().map(|x| x / scale).sum::<f64>() / n;
    if scaled_mean == 0.0 {
        return Err(EstimateError::degenerate(
            "mean unit price is zero, coefficient of variation is undefined",
        ));
    }

    let scaled_variance = cluster
        .iter()
        .map(|x| (x / scale - scaled_mean).powi(2))
        .sum::<f64>()
        / n;
    let scaled_std_dev = scaled_variance.sqrt();

    let mean = scaled_mean * scale;
    let std_dev = scaled_std_dev * scale;
    let cv = scaled_std_dev / scaled_mean;

    let min = cluster.iter().copied().fold(f64::INFINITY, f64::min);
    let max = cluster.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if !mean.is_finite() || !std_dev.is_finite() || !cv.is_finite() {
        return Err(EstimateError::degenerate("non-finite cluster statistics"));
    }

    Ok(PriceStatistics {
        mean,
        std_dev,
        cv,
        min,
        max,
        count,
    })
}

/// Map a coefficient of variation to a score in `[0, 100]`.
///
/// CV 0 gives 100, CV 0.5 or more gives 0, linear in between.
pub fn confidence_from_cv(cv: f64) -> f64 {
    ((1.0 - cv * 2.0) * 100.0).clamp(0.0, 100.0)
}

/// Run the full pipeline, reporting why no estimate was produced.
pub fn try_build_estimate(input: &EstimateInput) -> Result<Estimate, EstimateError> {
    let target_area = match input.target_area {
        Some(area) if area.is_finite() && area > 0.0 => area,
        Some(area) => {
            return Err(EstimateError::insufficient(format!(
                "target area must be positive, got {}",
                area
            )))
        }
        None => return Err(EstimateError::insufficient("target area is missing")),
    };

    let unit_prices = compute_unit_prices(&input.observations);
    if unit_prices.is_empty() {
        return Err(EstimateError::insufficient(
            "no comparable has both a price and a non-zero area",
        ));
    }

    let clusters = cluster_by_similarity(&unit_prices);
    let dominant = select_dominant_cluster(&clusters)
        .ok_or_else(|| EstimateError::insufficient("no clusters formed"))?;
    let stats = compute_statistics(dominant)?;

    let projected_price = stats.mean * target_area;
    if !projected_price.is_finite() {
        return Err(EstimateError::degenerate("projected price is not finite"));
    }

    let total_valid = unit_prices.len();
    let outliers = total_valid - stats.count;
    let confidence = confidence_from_cv(stats.cv);

    debug!(
        "Estimate: {} clusters, dominant {} of {}, mean {:.2}, cv {:.4}",
        clusters.len(),
        stats.count,
        total_valid,
        stats.mean,
        stats.cv
    );

    let mut estimate = Estimate {
        mean_unit_price: stats.mean,
        std_dev: stats.std_dev,
        cv: stats.cv,
        min: stats.min,
        max: stats.max,
        cluster_size: stats.count,
        total_valid,
        outliers,
        cluster_count: clusters.len(),
        cluster_sizes: clusters.iter().map(Vec::len).collect(),
        target_area,
        projected_price,
        confidence,
        locality: input.locality.clone(),
        narrative: String::new(),
    };
    estimate.narrative = build_narrative(&estimate);

    Ok(estimate)
}

/// Run the full pipeline; `None` means not enough comparable data.
#[allow(dead_code)] // Presence-only variant of try_build_estimate
pub fn build_estimate(input: &EstimateInput) -> Option<Estimate> {
    try_build_estimate(input).ok()
}
