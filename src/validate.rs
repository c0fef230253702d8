use std::collections::HashMap;

use crate::correlation::ElementAttrs;
use crate::dataset::{CapexAction, CapexEffect, CapexItem, Dataset, Risk, RiskAction, RiskEffect};
use crate::error::RowIssue;
use crate::types::{DisciplineId, ItemId, LocationId, PhaseId, RiskCategoryId, RiskId, RiskLogId};

/// The validated dataset with every reference resolved to a vector index.
/// Items and risks keep their input order; correlation attributes are laid
/// out items-first to match the sampling vector.
#[derive(Debug, Clone)]
pub struct Normalised {
    pub items: Vec<CapexItem>,
    pub risks: Vec<Risk>,
    /// One entry per cost-bearing element: items, then risks.
    pub attrs: Vec<ElementAttrs>,
    /// Capex actions paired with the index of their target item.
    pub capex_actions: Vec<(usize, CapexAction)>,
    /// Risk actions paired with the index of their target risk.
    pub risk_actions: Vec<(usize, RiskAction)>,
}

struct Lookups {
    disciplines: HashMap<DisciplineId, ()>,
    phase_order: HashMap<PhaseId, i32>,
    location_parent: HashMap<LocationId, Option<LocationId>>,
    category_hint: HashMap<RiskCategoryId, Option<f64>>,
    risk_logs: HashMap<RiskLogId, ()>,
}

/// Type- and range-check every input table, resolving foreign keys. All
/// failing rows are collected; a single bad row never hides the others.
pub fn validate(dataset: &Dataset) -> Result<Normalised, Vec<RowIssue>> {
    let mut issues: Vec<RowIssue> = Vec::new();
    let lookups = index_lookups(dataset, &mut issues);

    let mut item_index: HashMap<ItemId, usize> = HashMap::new();
    for (i, item) in dataset.items.iter().enumerate() {
        if item_index.insert(item.id, i).is_some() {
            issue(&mut issues, "capex_items", item.id.0, "id", "duplicate id");
        }
    }
    let mut risk_index: HashMap<RiskId, usize> = HashMap::new();
    for (i, risk) in dataset.risks.iter().enumerate() {
        if risk_index.insert(risk.id, i).is_some() {
            issue(&mut issues, "risks", risk.id.0, "id", "duplicate id");
        }
    }

    let mut attrs: Vec<ElementAttrs> = Vec::with_capacity(dataset.element_count());

    for item in &dataset.items {
        check_quote(&mut issues, "capex_items", item.id.0, item.p10, item.ml, item.p90);
        attrs.push(resolve_attrs(
            &mut issues,
            "capex_items",
            item.id.0,
            &lookups,
            item.owner.clone(),
            item.discipline,
            item.phase,
            item.location,
            None,
            None,
        ));
    }

    for risk in &dataset.risks {
        if !risk.probability.is_finite() || !(0.0..=1.0).contains(&risk.probability) {
            issue(&mut issues, "risks", risk.id.0, "probability", "must be in [0, 1]");
        }
        check_quote(&mut issues, "risks", risk.id.0, risk.impact_p10, None, risk.impact_p90);
        attrs.push(resolve_attrs(
            &mut issues,
            "risks",
            risk.id.0,
            &lookups,
            risk.owner.clone(),
            risk.discipline,
            risk.phase,
            risk.location,
            risk.category,
            risk.risk_log,
        ));
    }

    let mut capex_actions = Vec::with_capacity(dataset.capex_actions.len());
    for action in &dataset.capex_actions {
        let (p10, p90) = match action.effect {
            CapexEffect::Replacement { p10, p90 } => (p10, p90),
            CapexEffect::Adjustment { p10, p90 } => (p10, p90),
        };
        check_quote(&mut issues, "capex_actions", action.id.0, p10, None, p90);
        match item_index.get(&action.item_id) {
            Some(&idx) => {
                if action.effective_date < dataset.items[idx].base_date {
                    issue(
                        &mut issues,
                        "capex_actions",
                        action.id.0,
                        "effective_date",
                        "precedes the target item's base_date",
                    );
                }
                capex_actions.push((idx, action.clone()));
            }
            None => issue(
                &mut issues,
                "capex_actions",
                action.id.0,
                "item_id",
                "references a missing capex item",
            ),
        }
    }

    let mut risk_actions = Vec::with_capacity(dataset.risk_actions.len());
    for action in &dataset.risk_actions {
        match action.effect {
            RiskEffect::ProbabilityScale(f) => {
                if !f.is_finite() || !(0.0..=1.0).contains(&f) {
                    issue(&mut issues, "risk_actions", action.id.0, "effect", "scale factor must be in [0, 1]");
                }
            }
            RiskEffect::ProbabilitySubtract(x) => {
                if !x.is_finite() || x < 0.0 {
                    issue(&mut issues, "risk_actions", action.id.0, "effect", "subtracted probability must be non-negative");
                }
            }
            RiskEffect::ImpactScale(s) => {
                if !s.is_finite() || s <= 0.0 || s > 1.0 {
                    issue(&mut issues, "risk_actions", action.id.0, "effect", "impact scale must be in (0, 1]");
                }
            }
            RiskEffect::Eliminate => {}
        }
        match risk_index.get(&action.risk_id) {
            Some(&idx) => risk_actions.push((idx, action.clone())),
            None => issue(
                &mut issues,
                "risk_actions",
                action.id.0,
                "risk_id",
                "references a missing risk",
            ),
        }
    }

    if issues.is_empty() {
        Ok(Normalised {
            items: dataset.items.clone(),
            risks: dataset.risks.clone(),
            attrs,
            capex_actions,
            risk_actions,
        })
    } else {
        Err(issues)
    }
}

fn issue(issues: &mut Vec<RowIssue>, table: &'static str, row: u64, field: &'static str, message: &str) {
    issues.push(RowIssue { table, row, field, message: message.to_string() });
}

/// Quote sanity: finite, strictly positive, ordered. Equal percentiles are
/// allowed and collapse to a deterministic value downstream; an inverted
/// quote is a hard error.
fn check_quote(
    issues: &mut Vec<RowIssue>,
    table: &'static str,
    row: u64,
    p10: f64,
    ml: Option<f64>,
    p90: f64,
) {
    let mut bounds_ok = true;
    if !p10.is_finite() || p10 <= 0.0 {
        issue(issues, table, row, "p10", "must be finite and strictly positive");
        bounds_ok = false;
    }
    if !p90.is_finite() || p90 <= 0.0 {
        issue(issues, table, row, "p90", "must be finite and strictly positive");
        bounds_ok = false;
    }
    if bounds_ok && p10 > p90 {
        issue(issues, table, row, "p10", "exceeds p90");
        bounds_ok = false;
    }
    if let Some(ml) = ml {
        if !ml.is_finite() {
            issue(issues, table, row, "ml", "must be finite");
        } else if bounds_ok && (ml < p10 || ml > p90) {
            issue(issues, table, row, "ml", "must lie within [p10, p90]");
        }
    }
}

fn index_lookups(dataset: &Dataset, issues: &mut Vec<RowIssue>) -> Lookups {
    let disciplines = dataset.disciplines.iter().map(|d| (d.id, ())).collect();
    let phase_order = dataset.phases.iter().map(|p| (p.id, p.phase_order)).collect();
    let location_parent: HashMap<LocationId, Option<LocationId>> =
        dataset.locations.iter().map(|l| (l.id, l.parent)).collect();
    for l in &dataset.locations {
        if let Some(parent) = l.parent
            && !location_parent.contains_key(&parent)
        {
            issue(issues, "locations", l.id.0, "parent", "references a missing location");
        }
    }
    let category_hint = dataset
        .risk_categories
        .iter()
        .map(|c| {
            if let Some(h) = c.default_correlation
                && (!h.is_finite() || !(0.0..=1.0).contains(&h))
            {
                issue(issues, "risk_categories", c.id.0, "default_correlation", "must be in [0, 1]");
            }
            (c.id, c.default_correlation)
        })
        .collect();
    let risk_logs = dataset.risk_logs.iter().map(|r| (r.id, ())).collect();
    Lookups { disciplines, phase_order, location_parent, category_hint, risk_logs }
}

/// Resolve one element's categorical references. A `None` reference is
/// "no affinity"; a reference to a row that does not exist is an error.
#[allow(clippy::too_many_arguments)]
fn resolve_attrs(
    issues: &mut Vec<RowIssue>,
    table: &'static str,
    row: u64,
    lookups: &Lookups,
    owner: Option<String>,
    discipline: Option<DisciplineId>,
    phase: Option<PhaseId>,
    location: Option<LocationId>,
    category: Option<RiskCategoryId>,
    risk_log: Option<RiskLogId>,
) -> ElementAttrs {
    let mut attrs = ElementAttrs { owner, ..ElementAttrs::default() };

    if let Some(id) = discipline {
        if lookups.disciplines.contains_key(&id) {
            attrs.discipline = Some(id);
        } else {
            issue(issues, table, row, "discipline", "references a missing discipline");
        }
    }
    if let Some(id) = phase {
        match lookups.phase_order.get(&id) {
            Some(&order) => attrs.phase = Some((id, order)),
            None => issue(issues, table, row, "phase", "references a missing phase"),
        }
    }
    if let Some(id) = location {
        match lookups.location_parent.get(&id) {
            Some(&parent) => {
                attrs.location = Some(id);
                attrs.location_parent = parent;
            }
            None => issue(issues, table, row, "location", "references a missing location"),
        }
    }
    if let Some(id) = category {
        match lookups.category_hint.get(&id) {
            Some(&hint) => {
                attrs.category = Some(id);
                attrs.category_correlation = hint;
            }
            None => issue(issues, table, row, "category", "references a missing risk category"),
        }
    }
    if let Some(id) = risk_log {
        if lookups.risk_logs.contains_key(&id) {
            attrs.risk_log = Some(id);
        } else {
            issue(issues, table, row, "risk_log", "references a missing risk log");
        }
    }

    attrs
}
