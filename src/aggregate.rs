use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{ActionId, RiskId};

/// An applied action and the change it caused in the deterministic estimate
/// (positive = cost removed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MitigationImpact {
    pub action_id: ActionId,
    pub description: String,
    pub expected_saving: f64,
}

/// A logged risk's expected contribution `p * median(impact)` at a
/// checkpoint. Zero-probability entries are kept so the register stays
/// visible in diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskImpact {
    pub risk_id: RiskId,
    pub name: String,
    pub expected_impact: f64,
}

/// One output row of the forecast: the cost distribution at a checkpoint
/// summarised by percentiles plus the deterministic point estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointRow {
    pub date: NaiveDate,
    pub p20: f64,
    pub p50: f64,
    pub p80: f64,
    pub deterministic: f64,
    pub mitigation_impacts: Vec<MitigationImpact>,
    pub risk_impacts: Vec<RiskImpact>,
}

/// Empirical percentile by linear interpolation between adjacent ranks.
/// `sorted` must be ascending and non-empty; `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = rank - lo as f64;
        sorted[lo] * (1.0 - w) + sorted[hi] * w
    }
}

/// (p20, p50, p80) of an unsorted sample set.
pub fn percentile_triplet(samples: &[f64]) -> (f64, f64, f64) {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    (percentile(&sorted, 0.20), percentile(&sorted, 0.50), percentile(&sorted, 0.80))
}
