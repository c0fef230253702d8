//! Monte Carlo cost-evolution engine for project CAPEX forecasting.
//!
//! Takes a project description — capex line items with percentile cost
//! quotes, risks with probabilities and conditional impacts, and dated
//! mitigation actions against both — and produces a time series of
//! probabilistic cost forecasts: P20/P50/P80 plus a deterministic point
//! estimate at every checkpoint of the horizon.
//!
//! The pipeline: [`validate::validate`] normalises the input tables,
//! [`fit::Lognormal`] turns percentile quotes into log-scale parameters,
//! [`correlation::CorrelationModel`] builds a PSD correlation matrix from
//! categorical affinities, and [`evolution::Evolution`] walks the
//! checkpoint dates, sampling correlated cost draws through
//! [`sampler::sample_totals`] whenever the state changes. The single entry
//! point is [`simulation::simulate_cost_evolution`].

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod correlation;
pub mod dataset;
pub mod error;
pub mod evolution;
pub mod fit;
pub mod sampler;
pub mod simulation;
pub mod types;
pub mod validate;

pub use cancel::CancelToken;
pub use config::{CorrelationMethod, Frequency, SimulationConfig};
pub use dataset::{CapexAction, CapexEffect, CapexItem, Dataset, Risk, RiskAction, RiskEffect};
pub use error::{RowIssue, SimulationError};
pub use simulation::{SimulationResult, simulate_cost_evolution, simulate_cost_evolution_with_cancel};
