//! Run one seeded scenario under every dispatch policy and print a comparison.
//!
//! Run with: cargo run -p fleet_core --example scenario_run

use fleet_core::matching::AlgorithmKind;
use fleet_core::runner::{RunnerConfig, Simulation};
use fleet_core::scenario::{NamedParams, ScenarioParams};
use fleet_core::telemetry::SimEventKind;

fn main() {
    const NUM_TAXIS: usize = 20;
    const NUM_CLIENTS: usize = 200;
    const SEATS: usize = 4;
    const SEED: u64 = 123;

    let scenario = ScenarioParams::default()
        .with_fleet(NUM_TAXIS, SEATS, 10)
        .with_clients(NUM_CLIENTS, 1)
        .with_spawn_window(300)
        .with_bounds(400, 400)
        .with_seed(SEED);
    let params = NamedParams::new()
        .with("InitialSearchRadius", 20)
        .with("RadiusIncreaseFactor", 2)
        .with("Seed", SEED as i64);

    println!(
        "--- Scenario run ({} clients, {} taxis x {} seats, seed {}) ---",
        NUM_CLIENTS, NUM_TAXIS, SEATS, SEED
    );
    for kind in AlgorithmKind::ALL {
        let mut simulation = match Simulation::init(
            &scenario,
            kind,
            &params,
            RunnerConfig::default().with_max_ticks(20_000),
        ) {
            Ok(simulation) => simulation,
            Err(err) => {
                eprintln!("{kind}: setup failed: {err}");
                continue;
            }
        };

        let summary = match simulation.start() {
            Ok(summary) => summary,
            Err(err) => {
                eprintln!("{kind}: run aborted: {err}");
                continue;
            }
        };

        let boardings = simulation.events().count(SimEventKind::ClientEnteredTaxi);
        println!(
            "{:<18} outcome={:?} ticks={} finished={}/{} boardings={} distance={:.0} exceptions={}",
            kind.name(),
            summary.outcome,
            summary.ticks,
            summary.counts.clients_finished,
            NUM_CLIENTS,
            boardings,
            summary.total_travel_distance,
            summary.exceptions,
        );
        if kind == AlgorithmKind::Distributed {
            simulation.timings().print_summary();
        }
    }
}
