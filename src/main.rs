use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::NaiveDate;

use capsim::config::SimulationConfig;
use capsim::dataset::{
    CapexAction, CapexEffect, CapexItem, Dataset, Discipline, Location, ProjectPhase, Risk,
    RiskAction, RiskCategory, RiskEffect, RiskLog,
};
use capsim::simulation::simulate_cost_evolution;
use capsim::types::{
    DisciplineId, ItemId, LocationId, PhaseId, RiskCategoryId, RiskId, RiskLogId,
};

/// A small offshore-construction project: five capex items, four risks and
/// a mitigation plan spread over the first quarter.
fn demo_project() -> Dataset {
    let base = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid demo date");
    let date = |m: u32, d: u32| NaiveDate::from_ymd_opt(2025, m, d).expect("valid demo date");

    Dataset {
        items: vec![
            CapexItem::new(1, "Jacket foundations", 38_000_000.0, 61_000_000.0, base)
                .with_owner("civil-works")
                .with_discipline(1)
                .with_phase(2)
                .with_location(2),
            CapexItem::new(2, "Turbine supply", 95_000_000.0, 118_000_000.0, base)
                .with_owner("procurement")
                .with_discipline(2)
                .with_phase(2)
                .with_location(1),
            CapexItem::new(3, "Export cable", 22_000_000.0, 41_000_000.0, base)
                .with_owner("procurement")
                .with_discipline(3)
                .with_phase(2)
                .with_location(2),
            CapexItem::new(4, "Installation vessels", 17_000_000.0, 33_000_000.0, base)
                .with_owner("marine-ops")
                .with_discipline(1)
                .with_phase(3)
                .with_location(2),
            CapexItem::new(5, "Onshore substation", 12_000_000.0, 19_000_000.0, base)
                .with_owner("civil-works")
                .with_discipline(3)
                .with_phase(3)
                .with_location(3),
        ],
        capex_actions: vec![
            CapexAction::new(
                1,
                ItemId(3),
                "Re-quote after revised cable routing survey",
                CapexEffect::Replacement { p10: 19_000_000.0, p90: 31_000_000.0 },
                date(2, 15),
            ),
            CapexAction::new(
                2,
                ItemId(4),
                "Second heavy-lift vessel for the summer window",
                CapexEffect::Adjustment { p10: 2_500_000.0, p90: 6_000_000.0 },
                date(3, 10),
            ),
        ],
        risks: vec![
            Risk::new(1, "Cable supplier insolvency", 0.15, 8_000_000.0, 25_000_000.0)
                .with_owner("procurement")
                .with_discipline(3)
                .with_category(1)
                .with_risk_log(1),
            Risk::new(2, "Weather window overrun", 0.40, 3_000_000.0, 12_000_000.0)
                .with_owner("marine-ops")
                .with_phase(3)
                .with_location(2)
                .with_category(2)
                .with_risk_log(1),
            Risk::new(3, "Seabed worse than surveyed", 0.25, 5_000_000.0, 18_000_000.0)
                .with_discipline(1)
                .with_location(2)
                .with_category(3)
                .with_risk_log(1),
            Risk::new(4, "Grid connection slips a quarter", 0.30, 4_000_000.0, 9_000_000.0)
                .with_owner("civil-works")
                .with_location(3)
                .with_category(1)
                .with_risk_log(1)
                .with_log_date(date(2, 1)),
        ],
        risk_actions: vec![
            RiskAction::new(
                3,
                RiskId(1),
                "Dual-source cable supply contract",
                RiskEffect::ProbabilityScale(0.4),
                date(1, 20),
            ),
            RiskAction::new(
                4,
                RiskId(2),
                "Charter standby installation vessel",
                RiskEffect::ImpactScale(0.6),
                date(2, 20),
            ),
            RiskAction::new(
                5,
                RiskId(3),
                "Geotechnical campaign closes the question",
                RiskEffect::Eliminate,
                date(3, 15),
            ),
        ],
        disciplines: vec![
            Discipline { id: DisciplineId(1), name: "Marine".into() },
            Discipline { id: DisciplineId(2), name: "Mechanical".into() },
            Discipline { id: DisciplineId(3), name: "Electrical".into() },
        ],
        phases: vec![
            ProjectPhase { id: PhaseId(1), name: "FEED".into(), phase_order: 1 },
            ProjectPhase { id: PhaseId(2), name: "Execution".into(), phase_order: 2 },
            ProjectPhase { id: PhaseId(3), name: "Commissioning".into(), phase_order: 3 },
        ],
        locations: vec![
            Location { id: LocationId(1), name: "Fabrication yard".into(), parent: None },
            Location { id: LocationId(2), name: "Offshore site".into(), parent: None },
            Location { id: LocationId(3), name: "Onshore landfall".into(), parent: Some(LocationId(2)) },
        ],
        risk_categories: vec![
            RiskCategory { id: RiskCategoryId(1), name: "Supply chain".into(), default_correlation: Some(0.5) },
            RiskCategory { id: RiskCategoryId(2), name: "Weather".into(), default_correlation: None },
            RiskCategory { id: RiskCategoryId(3), name: "Ground conditions".into(), default_correlation: None },
        ],
        risk_logs: vec![RiskLog { id: RiskLogId(1), name: "Main register".into() }],
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let dataset = demo_project();
    let config = SimulationConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"))
        .with_horizon_months(6)
        .with_seed(42);

    let result = match simulate_cost_evolution(&dataset, &config) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            std::process::exit(1);
        }
    };

    let file = File::create("forecast.ndjson").expect("failed to create forecast.ndjson");
    let mut writer = BufWriter::new(file);
    for row in &result.checkpoints {
        serde_json::to_writer(&mut writer, row).expect("failed to serialise checkpoint");
        writeln!(writer).expect("failed to write newline");
    }

    println!(
        "capsim: {} checkpoints, {} items, {} risks, seed {}",
        result.checkpoints.len(),
        result.n_items,
        result.n_risks,
        result.seed_used,
    );
    println!(
        "correlation: {} correlated pairs, mean off-diagonal {:.3}{}",
        result.correlation.nonzero_pairs,
        result.correlation.mean_off_diagonal,
        if result.correlation.repaired { " (PSD repair applied)" } else { "" },
    );
    println!();
    println!("{:<12} {:>14} {:>14} {:>14} {:>14}", "date", "P20", "P50", "P80", "deterministic");
    for row in &result.checkpoints {
        println!(
            "{:<12} {:>14.0} {:>14.0} {:>14.0} {:>14.0}",
            row.date.to_string(),
            row.p20,
            row.p50,
            row.p80,
            row.deterministic,
        );
    }

    if let Some(last) = result.checkpoints.last() {
        println!("\nMitigations in effect at horizon end:");
        for m in &last.mitigation_impacts {
            println!("  #{:<3} {:<48} saving {:>12.0}", m.action_id.0, m.description, m.expected_saving);
        }
        println!("Risk register at horizon end:");
        for r in &last.risk_impacts {
            println!("  #{:<3} {:<48} expected {:>12.0}", r.risk_id.0, r.name, r.expected_impact);
        }
    }
}
