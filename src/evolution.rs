use chrono::{Days, Months, NaiveDate};
use tracing::debug;

use crate::aggregate::{CheckpointRow, MitigationImpact, RiskImpact, percentile_triplet};
use crate::cancel::CancelToken;
use crate::config::{Frequency, SimulationConfig};
use crate::correlation::CorrelationModel;
use crate::dataset::{CapexEffect, RiskEffect};
use crate::error::SimulationError;
use crate::fit::Lognormal;
use crate::sampler::sample_totals;
use crate::types::{ActionId, RiskId};
use crate::validate::Normalised;

/// Per-item sampling state: the active base quote (original or replaced)
/// plus the stack of additive adjustments applied so far.
#[derive(Debug, Clone)]
pub struct ItemState {
    pub quote: Lognormal,
    pub adjustments: Vec<Lognormal>,
}

impl ItemState {
    /// Cost for one correlated draw. Adjustments ride the item's own normal,
    /// so the median of the total stays the sum of the component medians.
    pub fn cost_at(&self, y: f64) -> f64 {
        self.quote.sample_at(y) + self.adjustments.iter().map(|a| a.sample_at(y)).sum::<f64>()
    }

    pub fn median(&self) -> f64 {
        self.quote.median() + self.adjustments.iter().map(Lognormal::median).sum::<f64>()
    }
}

/// Per-risk sampling state as of the current checkpoint.
#[derive(Debug, Clone)]
pub struct RiskState {
    pub id: RiskId,
    pub name: String,
    pub probability: f64,
    pub impact: Lognormal,
    /// Risks not yet in the register are masked out of the totals.
    pub logged: bool,
    pub log_date: Option<NaiveDate>,
}

impl RiskState {
    /// Expected contribution to the deterministic estimate.
    pub fn expected_impact(&self) -> f64 {
        if self.logged { self.probability * self.impact.median() } else { 0.0 }
    }
}

/// The mutable per-checkpoint view of all distribution parameters. Mutated
/// only between sampling batches, at checkpoint boundaries.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub items: Vec<ItemState>,
    pub risks: Vec<RiskState>,
}

impl Snapshot {
    pub fn from_normalised(normalised: &Normalised) -> Self {
        let items = normalised
            .items
            .iter()
            .map(|i| ItemState { quote: Lognormal::fit(i.p10, i.p90), adjustments: Vec::new() })
            .collect();
        let risks = normalised
            .risks
            .iter()
            .map(|r| RiskState {
                id: r.id,
                name: r.name.clone(),
                probability: r.probability,
                impact: Lognormal::fit(r.impact_p10, r.impact_p90),
                logged: r.risk_log_date.is_none(),
                log_date: r.risk_log_date,
            })
            .collect();
        Snapshot { items, risks }
    }

    /// Deterministic point estimate: item medians plus expected risk impacts.
    pub fn deterministic(&self) -> f64 {
        self.items.iter().map(ItemState::median).sum::<f64>()
            + self.risks.iter().map(RiskState::expected_impact).sum::<f64>()
    }

    /// Diagnostic register: every logged risk with its expected impact,
    /// zero-probability entries included.
    pub fn risk_impacts(&self) -> Vec<RiskImpact> {
        self.risks
            .iter()
            .filter(|r| r.logged)
            .map(|r| RiskImpact {
                risk_id: r.id,
                name: r.name.clone(),
                expected_impact: r.expected_impact(),
            })
            .collect()
    }

    /// Admit risks whose log date has arrived. Returns true when the set of
    /// included risks changed, which forces a resample.
    pub fn update_logged(&mut self, date: NaiveDate) -> bool {
        let mut changed = false;
        for risk in &mut self.risks {
            if !risk.logged
                && let Some(log_date) = risk.log_date
                && log_date <= date
            {
                risk.logged = true;
                changed = true;
            }
        }
        changed
    }

    /// Apply one action effect, returning the change it caused in the
    /// deterministic estimate (positive = cost removed).
    fn apply(&mut self, effect: &PendingEffect) -> f64 {
        match effect {
            PendingEffect::Capex { item, effect } => {
                let state = &mut self.items[*item];
                match *effect {
                    CapexEffect::Replacement { p10, p90 } => {
                        let new = Lognormal::fit(p10, p90);
                        let saving = state.quote.median() - new.median();
                        state.quote = new;
                        saving
                    }
                    CapexEffect::Adjustment { p10, p90 } => {
                        let delta = Lognormal::fit(p10, p90);
                        let saving = -delta.median();
                        state.adjustments.push(delta);
                        saving
                    }
                }
            }
            PendingEffect::Risk { risk, effect } => {
                let state = &mut self.risks[*risk];
                match *effect {
                    RiskEffect::ProbabilityScale(f) => {
                        let old = state.probability;
                        state.probability = old * f;
                        (old - state.probability) * state.impact.median()
                    }
                    RiskEffect::ProbabilitySubtract(x) => {
                        let old = state.probability;
                        // Stacked reductions floor at zero, never below.
                        state.probability = (old - x).max(0.0);
                        (old - state.probability) * state.impact.median()
                    }
                    RiskEffect::ImpactScale(s) => {
                        let old = state.impact;
                        state.impact = old.scaled(s);
                        state.probability * (old.median() - state.impact.median())
                    }
                    RiskEffect::Eliminate => {
                        let saving = state.probability * state.impact.median();
                        state.probability = 0.0;
                        saving
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum PendingEffect {
    Capex { item: usize, effect: CapexEffect },
    Risk { risk: usize, effect: RiskEffect },
}

/// An action waiting for its effective date, pre-sorted by the application
/// tie-break key.
#[derive(Debug, Clone)]
struct Pending {
    date: NaiveDate,
    rank: u8,
    action_id: ActionId,
    description: String,
    effect: PendingEffect,
}

/// Same-date application order: replacement, adjustment, probability
/// reduction, impact reduction, elimination.
fn effect_rank(effect: &PendingEffect) -> u8 {
    match effect {
        PendingEffect::Capex { effect: CapexEffect::Replacement { .. }, .. } => 0,
        PendingEffect::Capex { effect: CapexEffect::Adjustment { .. }, .. } => 1,
        PendingEffect::Risk { effect: RiskEffect::ProbabilityScale(_), .. } => 2,
        PendingEffect::Risk { effect: RiskEffect::ProbabilitySubtract(_), .. } => 2,
        PendingEffect::Risk { effect: RiskEffect::ImpactScale(_), .. } => 3,
        PendingEffect::Risk { effect: RiskEffect::Eliminate, .. } => 4,
    }
}

/// Build the ordered checkpoint dates: the data date, every frequency step,
/// every action effective date and risk log date inside the horizon, and
/// the horizon end. Strictly increasing.
pub fn build_schedule(
    normalised: &Normalised,
    config: &SimulationConfig,
) -> Result<Vec<NaiveDate>, SimulationError> {
    let start = config.data_date;
    let end = start
        .checked_add_months(Months::new(config.horizon_months))
        .ok_or_else(|| SimulationError::Configuration("horizon end overflows the calendar".into()))?;

    let mut dates = vec![start, end];
    match config.frequency {
        Frequency::Weekly => {
            let mut t = start;
            loop {
                t = t
                    .checked_add_days(Days::new(7))
                    .ok_or_else(|| SimulationError::Internal("date overflow stepping weekly".into()))?;
                if t >= end {
                    break;
                }
                dates.push(t);
            }
        }
        Frequency::Monthly => {
            for i in 1..config.horizon_months {
                let t = start
                    .checked_add_months(Months::new(i))
                    .ok_or_else(|| SimulationError::Internal("date overflow stepping monthly".into()))?;
                if t < end {
                    dates.push(t);
                }
            }
        }
    }

    let mut insert = |date: NaiveDate| {
        if date > start && date <= end {
            dates.push(date);
        }
    };
    for (_, action) in &normalised.capex_actions {
        insert(action.effective_date);
    }
    for (_, action) in &normalised.risk_actions {
        insert(action.effective_date);
    }
    for risk in &normalised.risks {
        if let Some(log_date) = risk.risk_log_date {
            insert(log_date);
        }
    }

    dates.sort_unstable();
    dates.dedup();
    Ok(dates)
}

/// The checkpoint walk: owns the snapshot, the sorted pending actions and
/// the running list of applied mitigations.
pub struct Evolution {
    schedule: Vec<NaiveDate>,
    snapshot: Snapshot,
    pending: Vec<Pending>,
    next_pending: usize,
    applied: Vec<MitigationImpact>,
    epoch: u32,
}

impl Evolution {
    pub fn new(normalised: &Normalised, config: &SimulationConfig) -> Result<Self, SimulationError> {
        let schedule = build_schedule(normalised, config)?;
        let snapshot = Snapshot::from_normalised(normalised);

        let mut pending: Vec<Pending> = Vec::with_capacity(
            normalised.capex_actions.len() + normalised.risk_actions.len(),
        );
        for (item, action) in &normalised.capex_actions {
            let effect = PendingEffect::Capex { item: *item, effect: action.effect };
            pending.push(Pending {
                date: action.effective_date,
                rank: effect_rank(&effect),
                action_id: action.id,
                description: action.description.clone(),
                effect,
            });
        }
        for (risk, action) in &normalised.risk_actions {
            let effect = PendingEffect::Risk { risk: *risk, effect: action.effect };
            pending.push(Pending {
                date: action.effective_date,
                rank: effect_rank(&effect),
                action_id: action.id,
                description: action.description.clone(),
                effect,
            });
        }
        pending.sort_by(|a, b| {
            (a.date, a.rank, a.action_id).cmp(&(b.date, b.rank, b.action_id))
        });

        Ok(Evolution {
            schedule,
            snapshot,
            pending,
            next_pending: 0,
            applied: Vec::new(),
            epoch: 0,
        })
    }

    /// Walk every checkpoint, applying due actions and resampling only when
    /// the snapshot or the included-risk set changed. Unchanged checkpoints
    /// carry the previous totals' percentiles forward.
    pub fn run(
        mut self,
        correlation: &CorrelationModel,
        config: &SimulationConfig,
        seed: u64,
        cancel: &CancelToken,
    ) -> Result<Vec<CheckpointRow>, SimulationError> {
        let n_elements = self.snapshot.items.len() + self.snapshot.risks.len();
        if correlation.dim() != n_elements {
            return Err(SimulationError::Internal(format!(
                "correlation dimension {} != element count {n_elements}",
                correlation.dim()
            )));
        }

        let mut rows = Vec::with_capacity(self.schedule.len());
        let mut last = (0.0, 0.0, 0.0);
        for (t_index, &date) in self.schedule.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }

            let mut changed = t_index == 0;
            while self.next_pending < self.pending.len()
                && self.pending[self.next_pending].date <= date
            {
                let action = &self.pending[self.next_pending];
                let saving = self.snapshot.apply(&action.effect);
                self.applied.push(MitigationImpact {
                    action_id: action.action_id,
                    description: action.description.clone(),
                    expected_saving: saving,
                });
                self.next_pending += 1;
                changed = true;
            }
            if self.snapshot.update_logged(date) {
                changed = true;
            }

            if changed {
                let totals = sample_totals(
                    &self.snapshot,
                    correlation,
                    config.n_iterations,
                    self.epoch,
                    seed,
                    cancel,
                )?;
                self.epoch += 1;
                last = percentile_triplet(&totals);
                debug!(%date, epoch = self.epoch, "checkpoint resampled");
            } else {
                debug!(%date, "checkpoint unchanged, totals carried forward");
            }

            rows.push(CheckpointRow {
                date,
                p20: last.0,
                p50: last.1,
                p80: last.2,
                deterministic: self.snapshot.deterministic(),
                mitigation_impacts: self.applied.clone(),
                risk_impacts: self.snapshot.risk_impacts(),
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{CapexAction, CapexItem, Dataset, Risk, RiskAction};
    use crate::types::{ItemId, RiskId};
    use crate::validate::validate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig::new(d(2025, 1, 1))
            .with_horizon_months(3)
            .with_iterations(2_000)
            .with_seed(42)
    }

    fn one_item_dataset() -> Dataset {
        Dataset {
            items: vec![CapexItem::new(1, "Foundations", 100.0, 200.0, d(2025, 1, 1))],
            ..Dataset::default()
        }
    }

    #[test]
    fn weekly_schedule_spans_horizon_strictly_increasing() {
        let normalised = validate(&one_item_dataset()).unwrap();
        let schedule = build_schedule(&normalised, &config()).unwrap();
        assert_eq!(*schedule.first().unwrap(), d(2025, 1, 1));
        assert_eq!(*schedule.last().unwrap(), d(2025, 4, 1));
        // 1 Jan + 12 weekly steps land inside the horizon, plus both ends.
        assert_eq!(schedule.len(), 14);
        for pair in schedule.windows(2) {
            assert!(pair[0] < pair[1], "schedule not strictly increasing");
        }
    }

    #[test]
    fn monthly_schedule_has_one_checkpoint_per_month() {
        let normalised = validate(&one_item_dataset()).unwrap();
        let cfg = config().with_frequency(Frequency::Monthly);
        let schedule = build_schedule(&normalised, &cfg).unwrap();
        assert_eq!(schedule, vec![d(2025, 1, 1), d(2025, 2, 1), d(2025, 3, 1), d(2025, 4, 1)]);
    }

    #[test]
    fn off_grid_action_dates_become_checkpoints() {
        let mut ds = one_item_dataset();
        ds.capex_actions.push(CapexAction::new(
            1,
            ItemId(1),
            "Re-quote",
            CapexEffect::Replacement { p10: 90.0, p90: 180.0 },
            d(2025, 1, 10), // between the weekly steps of 8 Jan and 15 Jan
        ));
        ds.risks.push(Risk::new(1, "Late delivery", 0.3, 10.0, 20.0).with_log_date(d(2025, 2, 20)));
        let normalised = validate(&ds).unwrap();
        let schedule = build_schedule(&normalised, &config()).unwrap();
        assert!(schedule.contains(&d(2025, 1, 10)));
        assert!(schedule.contains(&d(2025, 2, 20)));
    }

    #[test]
    fn same_date_actions_apply_in_kind_order() {
        let mut ds = one_item_dataset();
        let date = d(2025, 2, 1);
        // Input order deliberately reversed: adjustment listed first.
        ds.capex_actions.push(CapexAction::new(
            9,
            ItemId(1),
            "Extra scope",
            CapexEffect::Adjustment { p10: 10.0, p90: 20.0 },
            date,
        ));
        ds.capex_actions.push(CapexAction::new(
            3,
            ItemId(1),
            "Re-baselined quote",
            CapexEffect::Replacement { p10: 200.0, p90: 400.0 },
            date,
        ));
        let normalised = validate(&ds).unwrap();
        let evolution = Evolution::new(&normalised, &config()).unwrap();
        let rows = evolution
            .run(&CorrelationModel::identity(1), &config(), 42, &CancelToken::new())
            .unwrap();

        let applied = &rows.last().unwrap().mitigation_impacts;
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].action_id, ActionId(3), "replacement must apply first");
        assert_eq!(applied[1].action_id, ActionId(9));
        // Replacement saving is measured against the original quote, the
        // adjustment is pure added cost.
        assert!((applied[0].expected_saving - (141.4213562373095 - 282.842712474619)).abs() < 1e-9);
        assert!((applied[1].expected_saving + 14.142135623730951).abs() < 1e-9);
    }

    #[test]
    fn probability_reductions_floor_at_zero() {
        let mut snapshot = Snapshot {
            items: vec![],
            risks: vec![RiskState {
                id: RiskId(1),
                name: "r".into(),
                probability: 0.5,
                impact: Lognormal::fit(50.0, 100.0),
                logged: true,
                log_date: None,
            }],
        };
        let effect = |e| PendingEffect::Risk { risk: 0, effect: e };
        snapshot.apply(&effect(RiskEffect::ProbabilitySubtract(0.4)));
        let saving = snapshot.apply(&effect(RiskEffect::ProbabilitySubtract(0.4)));
        assert_eq!(snapshot.risks[0].probability, 0.0);
        // Only the remaining 0.1 of probability was left to remove.
        assert!((saving - 0.1 * snapshot.risks[0].impact.median()).abs() < 1e-9);
    }

    #[test]
    fn elimination_saving_is_expected_impact() {
        let mut snapshot = Snapshot {
            items: vec![],
            risks: vec![RiskState {
                id: RiskId(1),
                name: "r".into(),
                probability: 0.5,
                impact: Lognormal::fit(50.0, 100.0),
                logged: true,
                log_date: None,
            }],
        };
        let median = snapshot.risks[0].impact.median();
        let saving =
            snapshot.apply(&PendingEffect::Risk { risk: 0, effect: RiskEffect::Eliminate });
        assert!((saving - 0.5 * median).abs() < 1e-9);
        assert_eq!(snapshot.risks[0].probability, 0.0);
        assert_eq!(snapshot.deterministic(), 0.0);
        // Eliminated risks stay in the register at zero expected impact.
        let register = snapshot.risk_impacts();
        assert_eq!(register.len(), 1);
        assert_eq!(register[0].expected_impact, 0.0);
    }

    #[test]
    fn impact_scale_reduces_quote_proportionally() {
        let mut snapshot = Snapshot {
            items: vec![],
            risks: vec![RiskState {
                id: RiskId(1),
                name: "r".into(),
                probability: 0.4,
                impact: Lognormal::fit(50.0, 100.0),
                logged: true,
                log_date: None,
            }],
        };
        let before = snapshot.risks[0].impact.median();
        let saving =
            snapshot.apply(&PendingEffect::Risk { risk: 0, effect: RiskEffect::ImpactScale(0.5) });
        let after = snapshot.risks[0].impact.median();
        assert!((after - before * 0.5).abs() < 1e-9);
        assert!((saving - 0.4 * before * 0.5).abs() < 1e-9);
    }

    #[test]
    fn unlogged_risks_join_on_their_log_date() {
        let mut ds = one_item_dataset();
        ds.risks.push(
            Risk::new(1, "Ground conditions", 0.5, 50.0, 100.0).with_log_date(d(2025, 2, 1)),
        );
        let normalised = validate(&ds).unwrap();
        let mut snapshot = Snapshot::from_normalised(&normalised);
        assert!(!snapshot.risks[0].logged);
        assert!(snapshot.risk_impacts().is_empty());

        assert!(!snapshot.update_logged(d(2025, 1, 15)));
        assert!(snapshot.update_logged(d(2025, 2, 1)));
        assert!(snapshot.risks[0].logged);
        // A second pass over the same date is a no-op.
        assert!(!snapshot.update_logged(d(2025, 2, 8)));
        assert_eq!(snapshot.risk_impacts().len(), 1);
    }

    #[test]
    fn unchanged_checkpoints_reuse_percentiles() {
        let normalised = validate(&one_item_dataset()).unwrap();
        let evolution = Evolution::new(&normalised, &config()).unwrap();
        let rows = evolution
            .run(&CorrelationModel::identity(1), &config(), 42, &CancelToken::new())
            .unwrap();
        assert!(rows.len() > 2);
        for pair in rows.windows(2) {
            // No actions, no late-logged risks: every row shares the first
            // checkpoint's draws bit-for-bit.
            assert_eq!(pair[0].p20, pair[1].p20);
            assert_eq!(pair[0].p50, pair[1].p50);
            assert_eq!(pair[0].p80, pair[1].p80);
        }
    }

    #[test]
    fn cancelled_token_stops_before_work() {
        let normalised = validate(&one_item_dataset()).unwrap();
        let evolution = Evolution::new(&normalised, &config()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = evolution
            .run(&CorrelationModel::identity(1), &config(), 42, &token)
            .unwrap_err();
        assert_eq!(err, SimulationError::Cancelled);
    }

    #[test]
    fn risk_only_dataset_evolves() {
        let ds = Dataset {
            risks: vec![Risk::new(1, "Sole risk", 0.5, 50.0, 100.0)],
            risk_actions: vec![RiskAction::new(
                1,
                RiskId(1),
                "Retired",
                RiskEffect::Eliminate,
                d(2025, 2, 1),
            )],
            ..Dataset::default()
        };
        let normalised = validate(&ds).unwrap();
        let evolution = Evolution::new(&normalised, &config()).unwrap();
        let rows = evolution
            .run(&CorrelationModel::identity(1), &config(), 42, &CancelToken::new())
            .unwrap();
        let before = rows.iter().find(|r| r.date < d(2025, 2, 1)).unwrap();
        let after = rows.iter().find(|r| r.date >= d(2025, 2, 1)).unwrap();
        assert!(before.deterministic > 0.0);
        assert_eq!(after.deterministic, 0.0);
    }
}
