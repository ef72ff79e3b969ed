//! Dispatch timing instrumentation: per-phase aggregates and per-tick bottleneck records.
//!
//! The distributed policy evaluates every candidate independently; a real parallel deployment
//! would finish each phase when its slowest worker does. [`TickTiming`] therefore keeps the
//! maximum per-item duration of each phase and reports their sum as the simulated wall time.

use std::time::Duration;

use bevy_ecs::prelude::Resource;

/// Aggregate timing of one dispatch phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTiming {
    /// Total time spent in this phase (cumulative).
    pub total_duration: Duration,
    /// Number of measured items.
    pub call_count: u64,
    pub min_duration: Duration,
    pub max_duration: Duration,
}

impl PhaseTiming {
    pub fn record(&mut self, duration: Duration) {
        self.total_duration += duration;
        self.call_count += 1;
        if duration < self.min_duration || self.call_count == 1 {
            self.min_duration = duration;
        }
        if duration > self.max_duration {
            self.max_duration = duration;
        }
    }

    pub fn avg_duration(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            let avg_nanos = self.total_duration.as_nanos() / u128::from(self.call_count);
            Duration::from_nanos(avg_nanos as u64)
        }
    }
}

/// Measurements of one dispatch tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickTiming {
    pub time: u64,
    /// Real time spent in the whole dispatch step.
    pub wall: Duration,
    /// Slowest single range query.
    pub rqs_bottleneck: Duration,
    /// Slowest single marginal cost evaluation.
    pub cost_bottleneck: Duration,
    pub clients: usize,
    pub candidates: usize,
    pub assignments: usize,
}

impl TickTiming {
    /// Wall time a fully parallel deployment would need for this tick.
    pub fn simulated(&self) -> Duration {
        self.rqs_bottleneck + self.cost_bottleneck
    }
}

#[derive(Debug, Clone, Default, Resource)]
pub struct DispatchTimings {
    pub range_query: PhaseTiming,
    pub marginal_cost: PhaseTiming,
    ticks: Vec<TickTiming>,
}

impl DispatchTimings {
    pub fn record_range_query(&mut self, duration: Duration) {
        self.range_query.record(duration);
    }

    pub fn record_marginal_cost(&mut self, duration: Duration) {
        self.marginal_cost.record(duration);
    }

    pub fn push_tick(&mut self, tick: TickTiming) {
        self.ticks.push(tick);
    }

    pub fn ticks(&self) -> &[TickTiming] {
        &self.ticks
    }

    pub fn last_tick(&self) -> Option<&TickTiming> {
        self.ticks.last()
    }

    /// Sum of the simulated parallel time over all ticks.
    pub fn total_simulated(&self) -> Duration {
        self.ticks.iter().map(TickTiming::simulated).sum()
    }

    pub fn total_wall(&self) -> Duration {
        self.ticks.iter().map(|tick| tick.wall).sum()
    }

    pub fn print_summary(&self) {
        println!("\n=== Dispatch Timing Summary ===");
        for (name, timing) in [
            ("range query", &self.range_query),
            ("marginal cost", &self.marginal_cost),
        ] {
            println!(
                "{:16} | calls: {:8} | total: {:8.2}ms | avg: {:6.2}μs | min: {:6.2}μs | max: {:6.2}μs",
                name,
                timing.call_count,
                timing.total_duration.as_secs_f64() * 1000.0,
                timing.avg_duration().as_secs_f64() * 1_000_000.0,
                timing.min_duration.as_secs_f64() * 1_000_000.0,
                timing.max_duration.as_secs_f64() * 1_000_000.0,
            );
        }
        println!(
            "ticks: {} | wall: {:.2}ms | simulated parallel: {:.2}ms",
            self.ticks.len(),
            self.total_wall().as_secs_f64() * 1000.0,
            self.total_simulated().as_secs_f64() * 1000.0,
        );
    }
}
