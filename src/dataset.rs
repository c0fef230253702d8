use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{
    ActionId, DisciplineId, ItemId, LocationId, PhaseId, RiskCategoryId, RiskId, RiskLogId,
};

/// A capital-expenditure line item with an uncertain cost.
///
/// The uncertainty quote is `(p10, p90)` with an optional most-likely value
/// between them. All three are absolute monetary amounts, strictly positive.
/// `p10 == p90` is legal and collapses to a deterministic cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexItem {
    pub id: ItemId,
    pub name: String,
    pub p10: f64,
    pub ml: Option<f64>,
    pub p90: f64,
    /// Calendar date at which the quote is anchored.
    pub base_date: NaiveDate,
    pub owner: Option<String>,
    pub discipline: Option<DisciplineId>,
    pub phase: Option<PhaseId>,
    pub location: Option<LocationId>,
}

impl CapexItem {
    pub fn new(id: u64, name: &str, p10: f64, p90: f64, base_date: NaiveDate) -> Self {
        CapexItem {
            id: ItemId(id),
            name: name.to_string(),
            p10,
            ml: None,
            p90,
            base_date,
            owner: None,
            discipline: None,
            phase: None,
            location: None,
        }
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_discipline(mut self, id: u64) -> Self {
        self.discipline = Some(DisciplineId(id));
        self
    }

    pub fn with_phase(mut self, id: u64) -> Self {
        self.phase = Some(PhaseId(id));
        self
    }

    pub fn with_location(mut self, id: u64) -> Self {
        self.location = Some(LocationId(id));
        self
    }

    pub fn with_most_likely(mut self, ml: f64) -> Self {
        self.ml = Some(ml);
        self
    }
}

/// How a `CapexAction` changes its target item's quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CapexEffect {
    /// A new quote that supersedes the item's own from the effective date.
    Replacement { p10: f64, p90: f64 },
    /// An additive cost delta with its own quote, stacked on the item.
    Adjustment { p10: f64, p90: f64 },
}

/// A dated change to a `CapexItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexAction {
    pub id: ActionId,
    pub item_id: ItemId,
    pub description: String,
    pub effect: CapexEffect,
    /// Checkpoint at or after which the action applies. Must not precede the
    /// target item's base_date.
    pub effective_date: NaiveDate,
}

impl CapexAction {
    pub fn new(
        id: u64,
        item_id: ItemId,
        description: &str,
        effect: CapexEffect,
        effective_date: NaiveDate,
    ) -> Self {
        CapexAction {
            id: ActionId(id),
            item_id,
            description: description.to_string(),
            effect,
            effective_date,
        }
    }
}

/// An uncertain future event that adds cost when it occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: RiskId,
    pub name: String,
    /// Probability of occurrence over the simulation horizon, in [0, 1].
    pub probability: f64,
    /// Conditional impact quote, drawn only when the occurrence fires.
    pub impact_p10: f64,
    pub impact_p90: f64,
    pub owner: Option<String>,
    pub discipline: Option<DisciplineId>,
    pub phase: Option<PhaseId>,
    pub location: Option<LocationId>,
    pub category: Option<RiskCategoryId>,
    pub risk_log: Option<RiskLogId>,
    /// Date the risk enters the register; before this it is not sampled.
    /// `None` means logged from the start of the horizon.
    pub risk_log_date: Option<NaiveDate>,
}

impl Risk {
    pub fn new(id: u64, name: &str, probability: f64, impact_p10: f64, impact_p90: f64) -> Self {
        Risk {
            id: RiskId(id),
            name: name.to_string(),
            probability,
            impact_p10,
            impact_p90,
            owner: None,
            discipline: None,
            phase: None,
            location: None,
            category: None,
            risk_log: None,
            risk_log_date: None,
        }
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_discipline(mut self, id: u64) -> Self {
        self.discipline = Some(DisciplineId(id));
        self
    }

    pub fn with_phase(mut self, id: u64) -> Self {
        self.phase = Some(PhaseId(id));
        self
    }

    pub fn with_location(mut self, id: u64) -> Self {
        self.location = Some(LocationId(id));
        self
    }

    pub fn with_category(mut self, id: u64) -> Self {
        self.category = Some(RiskCategoryId(id));
        self
    }

    pub fn with_risk_log(mut self, id: u64) -> Self {
        self.risk_log = Some(RiskLogId(id));
        self
    }

    pub fn with_log_date(mut self, date: NaiveDate) -> Self {
        self.risk_log_date = Some(date);
        self
    }
}

/// How a `RiskAction` changes its target risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RiskEffect {
    /// Multiply the occurrence probability by a factor in [0, 1].
    ProbabilityScale(f64),
    /// Subtract an absolute amount from the probability, floored at 0.
    ProbabilitySubtract(f64),
    /// Scale the impact quote (both percentiles) by a factor in (0, 1].
    ImpactScale(f64),
    /// Remove the risk entirely from the effective date forward.
    Eliminate,
}

/// A dated change to a `Risk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAction {
    pub id: ActionId,
    pub risk_id: RiskId,
    pub description: String,
    pub effect: RiskEffect,
    pub effective_date: NaiveDate,
}

impl RiskAction {
    pub fn new(
        id: u64,
        risk_id: RiskId,
        description: &str,
        effect: RiskEffect,
        effective_date: NaiveDate,
    ) -> Self {
        RiskAction {
            id: ActionId(id),
            risk_id,
            description: description.to_string(),
            effect,
            effective_date,
        }
    }
}

// ── Lookup tables ─────────────────────────────────────────────────────────────
// These exist to give categorical attributes referential stability and to
// drive correlation scoring. They carry no cost of their own.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discipline {
    pub id: DisciplineId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPhase {
    pub id: PhaseId,
    pub name: String,
    /// Position in the project lifecycle; adjacent orders correlate weakly.
    pub phase_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub parent: Option<LocationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCategory {
    pub id: RiskCategoryId,
    pub name: String,
    /// When set, replaces the default same-category affinity contribution
    /// for pairs of risks in this category.
    pub default_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLog {
    pub id: RiskLogId,
    pub name: String,
}

/// The full tabular input to a simulation run. All references between tables
/// are by id; validation resolves them to vector indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub items: Vec<CapexItem>,
    pub capex_actions: Vec<CapexAction>,
    pub risks: Vec<Risk>,
    pub risk_actions: Vec<RiskAction>,
    pub disciplines: Vec<Discipline>,
    pub phases: Vec<ProjectPhase>,
    pub locations: Vec<Location>,
    pub risk_categories: Vec<RiskCategory>,
    pub risk_logs: Vec<RiskLog>,
}

impl Dataset {
    /// Count of cost-bearing elements (items + risks).
    pub fn element_count(&self) -> usize {
        self.items.len() + self.risks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn item_builder_sets_optional_attributes() {
        let item = CapexItem::new(1, "Turbine supply", 100.0, 200.0, d(2025, 1, 1))
            .with_owner("alice")
            .with_discipline(3)
            .with_phase(2)
            .with_location(7)
            .with_most_likely(150.0);
        assert_eq!(item.owner.as_deref(), Some("alice"));
        assert_eq!(item.discipline, Some(DisciplineId(3)));
        assert_eq!(item.phase, Some(PhaseId(2)));
        assert_eq!(item.location, Some(LocationId(7)));
        assert_eq!(item.ml, Some(150.0));
    }

    #[test]
    fn risk_defaults_to_logged_from_start() {
        let risk = Risk::new(1, "Weather overrun", 0.3, 50.0, 100.0);
        assert!(risk.risk_log_date.is_none());
        assert!(risk.category.is_none());
    }

    #[test]
    fn element_count_sums_items_and_risks() {
        let ds = Dataset {
            items: vec![CapexItem::new(1, "a", 1.0, 2.0, d(2025, 1, 1))],
            risks: vec![
                Risk::new(1, "r1", 0.5, 1.0, 2.0),
                Risk::new(2, "r2", 0.5, 1.0, 2.0),
            ],
            ..Dataset::default()
        };
        assert_eq!(ds.element_count(), 3);
    }
}
