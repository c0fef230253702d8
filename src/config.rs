use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

pub const MIN_ITERATIONS: usize = 1_000;
pub const MAX_ITERATIONS: usize = 50_000;
pub const DEFAULT_ITERATIONS: usize = 10_000;
pub const MAX_HORIZON_MONTHS: u32 = 60;
pub const DEFAULT_HORIZON_MONTHS: u32 = 12;

/// Baseline spacing of checkpoint dates. Action and risk-log dates inside
/// the horizon are inserted on top of this grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationMethod {
    /// Correlations derived from categorical affinity rules.
    Category,
    /// Independent draws (identity factor).
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Start of the simulation horizon.
    pub data_date: NaiveDate,
    pub frequency: Frequency,
    /// Horizon length in months, 1..=60.
    pub horizon_months: u32,
    /// Monte Carlo iteration count, 1_000..=50_000.
    pub n_iterations: usize,
    pub enable_correlation: bool,
    pub correlation_method: CorrelationMethod,
    /// Fixed seed for reproducible runs; `None` draws one from entropy and
    /// reports it in the result header.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(data_date: NaiveDate) -> Self {
        SimulationConfig {
            data_date,
            frequency: Frequency::Weekly,
            horizon_months: DEFAULT_HORIZON_MONTHS,
            n_iterations: DEFAULT_ITERATIONS,
            enable_correlation: true,
            correlation_method: CorrelationMethod::Category,
            seed: None,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_horizon_months(mut self, months: u32) -> Self {
        self.horizon_months = months;
        self
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.n_iterations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn without_correlation(mut self) -> Self {
        self.enable_correlation = false;
        self
    }

    /// Range-check all option values. Runs before any input validation so
    /// a bad config is reported as such, not as a data problem.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.horizon_months == 0 || self.horizon_months > MAX_HORIZON_MONTHS {
            return Err(SimulationError::Configuration(format!(
                "horizon_months must be in 1..={MAX_HORIZON_MONTHS}, got {}",
                self.horizon_months
            )));
        }
        if self.n_iterations < MIN_ITERATIONS || self.n_iterations > MAX_ITERATIONS {
            return Err(SimulationError::Configuration(format!(
                "n_iterations must be in {MIN_ITERATIONS}..={MAX_ITERATIONS}, got {}",
                self.n_iterations
            )));
        }
        Ok(())
    }

    /// Whether draws go through the categorical correlation factor.
    pub fn correlated(&self) -> bool {
        self.enable_correlation && self.correlation_method == CorrelationMethod::Category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SimulationConfig {
        SimulationConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = base();
        assert_eq!(cfg.frequency, Frequency::Weekly);
        assert_eq!(cfg.horizon_months, 12);
        assert_eq!(cfg.n_iterations, 10_000);
        assert!(cfg.enable_correlation);
        assert_eq!(cfg.correlation_method, CorrelationMethod::Category);
        assert!(cfg.seed.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn iteration_bounds_are_inclusive() {
        assert!(base().with_iterations(MIN_ITERATIONS).validate().is_ok());
        assert!(base().with_iterations(MAX_ITERATIONS).validate().is_ok());
        assert!(matches!(
            base().with_iterations(MIN_ITERATIONS - 1).validate(),
            Err(SimulationError::Configuration(_))
        ));
        assert!(matches!(
            base().with_iterations(MAX_ITERATIONS + 1).validate(),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn horizon_bounds_are_enforced() {
        assert!(base().with_horizon_months(1).validate().is_ok());
        assert!(base().with_horizon_months(60).validate().is_ok());
        assert!(base().with_horizon_months(0).validate().is_err());
        assert!(base().with_horizon_months(61).validate().is_err());
    }

    #[test]
    fn disabling_correlation_switches_to_independent_draws() {
        assert!(base().correlated());
        assert!(!base().without_correlation().correlated());
        let mut cfg = base();
        cfg.correlation_method = CorrelationMethod::None;
        assert!(!cfg.correlated());
    }
}
