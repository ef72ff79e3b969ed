#![allow(dead_code)]

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::Schedule;
use fleet_core::runner::simulation_schedule;
use fleet_core::test_helpers::assert_capacity_invariant;
use fleet_core::world::is_complete;

/// Helper that owns a reusable `Schedule` so tests can step the world tick by tick.
pub struct ScheduleRunner {
    schedule: Schedule,
}

impl Default for ScheduleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRunner {
    /// Create a runner with the default simulation schedule.
    pub fn new() -> Self {
        Self {
            schedule: simulation_schedule(),
        }
    }

    /// Run a single tick.
    pub fn tick(&mut self, world: &mut World) {
        self.schedule.run(world);
    }

    /// Tick until the completion predicate holds or `max_ticks` ran, returning ticks executed.
    pub fn run_until_complete(&mut self, world: &mut World, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && !is_complete(world) {
            self.schedule.run(world);
            ticks += 1;
        }
        ticks
    }

    /// Like [`ScheduleRunner::run_until_complete`], checking seat invariants after every tick.
    pub fn run_checked(&mut self, world: &mut World, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && !is_complete(world) {
            self.schedule.run(world);
            assert_capacity_invariant(world);
            ticks += 1;
        }
        ticks
    }
}
