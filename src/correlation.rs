use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SimulationError;
use crate::types::{DisciplineId, LocationId, PhaseId, RiskCategoryId, RiskLogId};

/// Eigenvalue floor used when clipping a non-PSD affinity matrix.
const CLIP_EPSILON: f64 = 1e-8;
/// Starting jitter added to the diagonal when clipping alone is not enough.
const JITTER_START: f64 = 1e-6;
/// Give up once the jitter exceeds this; the matrix is hopeless.
const JITTER_LIMIT: f64 = 1e-2;

/// Categorical attributes of one cost-bearing element, resolved against the
/// lookup tables. `None` anywhere means "no affinity" — two elements that
/// both lack an attribute never match on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementAttrs {
    pub owner: Option<String>,
    pub discipline: Option<DisciplineId>,
    /// Phase id plus its lifecycle order, for adjacency scoring.
    pub phase: Option<(PhaseId, i32)>,
    pub location: Option<LocationId>,
    pub location_parent: Option<LocationId>,
    /// Risks only. The second element is the category's correlation hint.
    pub category: Option<RiskCategoryId>,
    pub category_correlation: Option<f64>,
    pub risk_log: Option<RiskLogId>,
}

/// Affinity contributions per matched attribute. The defaults are the fixed
/// coefficients every deployment shares; a caller may tune them, but the
/// default set is what cross-checks against other installations assume.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityWeights {
    pub same_owner: f64,
    pub same_discipline: f64,
    pub same_phase: f64,
    pub adjacent_phase: f64,
    pub same_location: f64,
    pub parent_location: f64,
    pub same_risk_category: f64,
    pub same_risk_log: f64,
    /// Upper bound on any off-diagonal entry.
    pub cap: f64,
}

impl Default for AffinityWeights {
    fn default() -> Self {
        AffinityWeights {
            same_owner: 0.5,
            same_discipline: 0.4,
            same_phase: 0.3,
            adjacent_phase: 0.2,
            same_location: 0.3,
            parent_location: 0.2,
            same_risk_category: 0.4,
            same_risk_log: 0.2,
            cap: 0.95,
        }
    }
}

/// Pairwise affinity score: sum of contributions from matched categorical
/// attributes, capped. Symmetric by construction; all contributions are
/// non-negative, so off-diagonals are never negative.
pub fn affinity(a: &ElementAttrs, b: &ElementAttrs, w: &AffinityWeights) -> f64 {
    let mut score = 0.0;

    if let (Some(x), Some(y)) = (&a.owner, &b.owner)
        && x == y
    {
        score += w.same_owner;
    }
    if let (Some(x), Some(y)) = (a.discipline, b.discipline)
        && x == y
    {
        score += w.same_discipline;
    }
    if let (Some((pa, oa)), Some((pb, ob))) = (a.phase, b.phase) {
        if pa == pb {
            score += w.same_phase;
        } else if (oa - ob).abs() == 1 {
            // Orders further apart than one step contribute nothing.
            score += w.adjacent_phase;
        }
    }
    if let (Some(x), Some(y)) = (a.location, b.location) {
        if x == y {
            score += w.same_location;
        } else if a.location_parent == Some(y) || b.location_parent == Some(x) {
            score += w.parent_location;
        }
    }
    if let (Some(x), Some(y)) = (a.category, b.category)
        && x == y
    {
        // Both elements carry the same category, so either hint works.
        score += a.category_correlation.unwrap_or(w.same_risk_category);
    }
    if let (Some(x), Some(y)) = (a.risk_log, b.risk_log)
        && x == y
    {
        score += w.same_risk_log;
    }

    score.min(w.cap)
}

/// Shape of the built matrix, reported in the result header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationSummary {
    /// Count of strictly positive off-diagonal pairs (upper triangle).
    pub nonzero_pairs: usize,
    /// Mean over all off-diagonal pairs, zeros included.
    pub mean_off_diagonal: f64,
    /// Whether eigenvalue clipping or jitter was needed to factorise.
    pub repaired: bool,
}

impl CorrelationSummary {
    fn independent() -> Self {
        CorrelationSummary { nonzero_pairs: 0, mean_off_diagonal: 0.0, repaired: false }
    }
}

/// The correlation matrix over all cost-bearing elements together with its
/// cached Cholesky factor. Built once per run; read-only during sampling.
#[derive(Debug, Clone)]
pub struct CorrelationModel {
    matrix: DMatrix<f64>,
    factor: DMatrix<f64>,
    identity: bool,
    pub summary: CorrelationSummary,
}

impl CorrelationModel {
    /// Independent fallback: L = I.
    pub fn identity(n: usize) -> Self {
        CorrelationModel {
            matrix: DMatrix::identity(n, n),
            factor: DMatrix::identity(n, n),
            identity: true,
            summary: CorrelationSummary::independent(),
        }
    }

    /// Build the affinity matrix over `attrs` (items first, then risks, in
    /// stable input order), repair it to PSD if needed and factorise it.
    pub fn from_attrs(
        attrs: &[ElementAttrs],
        weights: &AffinityWeights,
    ) -> Result<Self, SimulationError> {
        let n = attrs.len();
        let mut matrix = DMatrix::identity(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let a = affinity(&attrs[i], &attrs[j], weights);
                matrix[(i, j)] = a;
                matrix[(j, i)] = a;
            }
        }

        let pairs = n * (n - 1) / 2;
        let mut nonzero = 0usize;
        let mut sum = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                if matrix[(i, j)] > 0.0 {
                    nonzero += 1;
                }
                sum += matrix[(i, j)];
            }
        }
        let mean = if pairs == 0 { 0.0 } else { sum / pairs as f64 };

        let (factor, repaired) = factorise_with_repair(&mut matrix)?;
        Ok(CorrelationModel {
            matrix,
            factor,
            identity: false,
            summary: CorrelationSummary { nonzero_pairs: nonzero, mean_off_diagonal: mean, repaired },
        })
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Apply the cached factor: y = L z.
    pub fn correlate(&self, z: &DVector<f64>) -> DVector<f64> {
        if self.identity { z.clone() } else { &self.factor * z }
    }
}

/// Cholesky with the repair ladder: plain attempt, then eigenvalue clipping,
/// then exponentially increasing diagonal jitter. `matrix` is updated in
/// place to whatever form finally factorised (minus any jitter, which is a
/// factorisation aid, not part of the model).
fn factorise_with_repair(matrix: &mut DMatrix<f64>) -> Result<(DMatrix<f64>, bool), SimulationError> {
    if let Some(chol) = matrix.clone().cholesky() {
        return Ok((chol.unpack(), false));
    }

    // Clip negative eigenvalues and renormalise back to unit diagonal. The
    // renormalisation is a congruence transform, so PSD is preserved.
    let eigen = SymmetricEigen::new(matrix.clone());
    let min_eigenvalue = eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    debug!(min_eigenvalue, "affinity matrix not PSD, clipping eigenvalues");

    let mut clipped = eigen;
    for v in clipped.eigenvalues.iter_mut() {
        if *v < CLIP_EPSILON {
            *v = CLIP_EPSILON;
        }
    }
    let mut repaired = clipped.recompose();
    // Exact symmetry can be lost to rounding in the recompose.
    repaired = (&repaired + repaired.transpose()) * 0.5;
    let n = repaired.nrows();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let d = (repaired[(i, i)] * repaired[(j, j)]).sqrt();
                repaired[(i, j)] /= d;
            }
        }
    }
    for i in 0..n {
        repaired[(i, i)] = 1.0;
    }

    if let Some(chol) = repaired.clone().cholesky() {
        *matrix = repaired;
        return Ok((chol.unpack(), true));
    }

    // Still singular to working precision: escalate diagonal jitter.
    let mut lambda = JITTER_START;
    while lambda <= JITTER_LIMIT {
        warn!(lambda, "eigenvalue clipping insufficient, adding diagonal jitter");
        let jittered = &repaired + DMatrix::identity(n, n) * lambda;
        if let Some(chol) = jittered.clone().cholesky() {
            *matrix = repaired;
            return Ok((chol.unpack(), true));
        }
        lambda *= 2.0;
    }

    Err(SimulationError::Numeric { min_eigenvalue })
}
