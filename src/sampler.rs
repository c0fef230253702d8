use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::correlation::CorrelationModel;
use crate::error::SimulationError;
use crate::evolution::Snapshot;

/// Iterations per rayon task. Also the granularity of cancellation checks
/// inside a sampling batch.
const CHUNK: usize = 1_024;

/// One generator per (resample epoch, iteration): the master seed keys the
/// ChaCha state, the stream id carries the counter. Results are therefore
/// identical however rayon schedules the chunks.
fn iteration_rng(seed: u64, epoch: u32, iteration: usize) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(((epoch as u64) << 32) | iteration as u64);
    rng
}

/// Draw the per-iteration project totals for one checkpoint.
///
/// Draw order inside an iteration is fixed: one standard normal per
/// cost-bearing element (items first, risks after), then one uniform per
/// risk. Uniforms are drawn whether or not the risk is logged, so masking a
/// risk in or out never shifts any other draw.
pub fn sample_totals(
    snapshot: &Snapshot,
    correlation: &CorrelationModel,
    n_iterations: usize,
    epoch: u32,
    seed: u64,
    cancel: &CancelToken,
) -> Result<Vec<f64>, SimulationError> {
    let n_items = snapshot.items.len();
    let n_elements = n_items + snapshot.risks.len();
    if correlation.dim() != n_elements {
        return Err(SimulationError::Internal(format!(
            "correlation dimension {} != element count {n_elements}",
            correlation.dim()
        )));
    }

    let chunks: Vec<(usize, usize)> = (0..n_iterations)
        .step_by(CHUNK)
        .map(|start| (start, (start + CHUNK).min(n_iterations)))
        .collect();

    let totals: Result<Vec<Vec<f64>>, SimulationError> = chunks
        .into_par_iter()
        .map(|(start, end)| {
            if cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }
            let mut out = Vec::with_capacity(end - start);
            for k in start..end {
                out.push(sample_one(snapshot, correlation, n_items, epoch, seed, k));
            }
            Ok(out)
        })
        .collect();

    Ok(totals?.into_iter().flatten().collect())
}

fn sample_one(
    snapshot: &Snapshot,
    correlation: &CorrelationModel,
    n_items: usize,
    epoch: u32,
    seed: u64,
    iteration: usize,
) -> f64 {
    let mut rng = iteration_rng(seed, epoch, iteration);
    let n_elements = n_items + snapshot.risks.len();

    let z = DVector::from_fn(n_elements, |_, _| rng.sample::<f64, _>(StandardNormal));
    let y = correlation.correlate(&z);

    let mut total = 0.0;
    for (i, item) in snapshot.items.iter().enumerate() {
        total += item.cost_at(y[i]);
    }
    for (j, risk) in snapshot.risks.iter().enumerate() {
        let u: f64 = rng.random();
        if risk.logged && u < risk.probability {
            total += risk.impact.sample_at(y[n_items + j]);
        }
    }
    total
}
