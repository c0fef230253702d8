use chrono::NaiveDate;

use capsim::config::SimulationConfig;
use capsim::dataset::{CapexItem, Dataset, Discipline, Location, ProjectPhase, Risk, RiskCategory, RiskLog};
use capsim::types::{DisciplineId, LocationId, PhaseId, RiskCategoryId, RiskLogId};

pub struct Scenario {
    pub items: usize,
    pub risks: usize,
}

pub const SMALL: Scenario = Scenario { items: 10, risks: 5 };
pub const MEDIUM: Scenario = Scenario { items: 50, risks: 25 };
pub const LARGE: Scenario = Scenario { items: 150, risks: 75 };

pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// A dataset with categorical attributes cycling through a handful of
/// owners, disciplines, phases and locations, so the correlation matrix is
/// densely populated the way a real project register is.
pub fn make_dataset(n_items: usize, n_risks: usize) -> Dataset {
    let owners = ["civil", "marine", "electrical", "procurement"];
    let items = (0..n_items)
        .map(|i| {
            CapexItem::new(i as u64 + 1, &format!("Item {i}"), 1_000.0 + i as f64, 2_500.0 + i as f64, base_date())
                .with_owner(owners[i % owners.len()])
                .with_discipline((i % 3) as u64 + 1)
                .with_phase((i % 3) as u64 + 1)
                .with_location((i % 2) as u64 + 1)
        })
        .collect();
    let risks = (0..n_risks)
        .map(|j| {
            Risk::new(j as u64 + 1, &format!("Risk {j}"), 0.1 + 0.5 * (j % 3) as f64 / 3.0, 200.0, 900.0)
                .with_owner(owners[j % owners.len()])
                .with_discipline((j % 3) as u64 + 1)
                .with_category((j % 2) as u64 + 1)
                .with_risk_log(1)
        })
        .collect();
    Dataset {
        items,
        risks,
        disciplines: (1..=3)
            .map(|i| Discipline { id: DisciplineId(i), name: format!("D{i}") })
            .collect(),
        phases: (1..=3)
            .map(|i| ProjectPhase { id: PhaseId(i), name: format!("P{i}"), phase_order: i as i32 })
            .collect(),
        locations: vec![
            Location { id: LocationId(1), name: "Site".into(), parent: None },
            Location { id: LocationId(2), name: "Quay".into(), parent: Some(LocationId(1)) },
        ],
        risk_categories: (1..=2)
            .map(|i| RiskCategory { id: RiskCategoryId(i), name: format!("C{i}"), default_correlation: None })
            .collect(),
        risk_logs: vec![RiskLog { id: RiskLogId(1), name: "Register".into() }],
        ..Dataset::default()
    }
}

pub fn make_config(n_iterations: usize) -> SimulationConfig {
    SimulationConfig::new(base_date())
        .with_horizon_months(3)
        .with_iterations(n_iterations)
        .with_seed(42)
}
