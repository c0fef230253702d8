use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::aggregate::CheckpointRow;
use crate::cancel::CancelToken;
use crate::config::SimulationConfig;
use crate::correlation::{AffinityWeights, CorrelationModel, CorrelationSummary};
use crate::dataset::Dataset;
use crate::error::SimulationError;
use crate::evolution::Evolution;
use crate::validate::validate;

/// The full forecast: one row per checkpoint plus the header describing how
/// the run was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    /// The seed actually used — config seed, or the entropy draw when the
    /// config left it unset.
    pub seed_used: u64,
    pub n_iterations: usize,
    pub n_items: usize,
    pub n_risks: usize,
    pub correlation: CorrelationSummary,
    pub checkpoints: Vec<CheckpointRow>,
}

/// Run the cost-evolution forecast over the configured horizon.
pub fn simulate_cost_evolution(
    dataset: &Dataset,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulationError> {
    simulate_cost_evolution_with_cancel(dataset, config, &CancelToken::new())
}

/// As `simulate_cost_evolution`, with a caller-owned cancellation token.
/// The token is checked between checkpoints and between iteration chunks;
/// cancellation returns `Cancelled` with no partial results.
pub fn simulate_cost_evolution_with_cancel(
    dataset: &Dataset,
    config: &SimulationConfig,
    cancel: &CancelToken,
) -> Result<SimulationResult, SimulationError> {
    config.validate()?;
    let normalised = validate(dataset).map_err(SimulationError::Validation)?;
    if normalised.items.is_empty() && normalised.risks.is_empty() {
        return Err(SimulationError::InsufficientData);
    }

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let correlation = if config.correlated() {
        CorrelationModel::from_attrs(&normalised.attrs, &AffinityWeights::default())?
    } else {
        CorrelationModel::identity(normalised.attrs.len())
    };

    info!(
        n_items = normalised.items.len(),
        n_risks = normalised.risks.len(),
        seed,
        n_iterations = config.n_iterations,
        "starting cost evolution"
    );

    let evolution = Evolution::new(&normalised, config)?;
    let checkpoints = evolution.run(&correlation, config, seed, cancel)?;

    Ok(SimulationResult {
        seed_used: seed,
        n_iterations: config.n_iterations,
        n_items: normalised.items.len(),
        n_risks: normalised.risks.len(),
        correlation: correlation.summary,
        checkpoints,
    })
}
