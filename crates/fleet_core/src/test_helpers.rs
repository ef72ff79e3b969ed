//! Test helpers for common test setup and utilities.
//!
//! This module provides shared test utilities to reduce duplication across test files.

use bevy_ecs::prelude::{Entity, ResMut, World};
use bevy_ecs::system::SystemState;

use crate::clock::SimulationClock;
use crate::ecs::Client;
use crate::geometry::Position;
use crate::matching::{
    next_step, ClientQuery, DispatchAlgorithm, DispatchContext, StepResult, TaxiQuery,
};
use crate::profiling::DispatchTimings;
use crate::runner::{insert_runtime_resources, RunnerConfig};
use crate::taxi::Taxi;
use crate::world::{spawn_client, spawn_taxi, WorldBounds};

/// Side length of the square world built by [`create_test_world`].
pub const TEST_WORLD_SIZE: i32 = 100;

/// Create a basic test world with every resource the schedule needs.
///
/// No dispatch algorithm is installed; use [`crate::runner::Simulation::from_world`] or
/// [`dispatch_once`] to drive it.
pub fn create_test_world() -> World {
    let mut world = World::new();
    world.insert_resource(WorldBounds::new(TEST_WORLD_SIZE, TEST_WORLD_SIZE));
    insert_runtime_resources(&mut world, &RunnerConfig::default());
    world
}

/// Spawn a taxi named after its position.
pub fn spawn_test_taxi(world: &mut World, position: Position, capacity: usize, speed: u32) -> Entity {
    let name = format!("taxi@{position}");
    spawn_taxi(world, Taxi::new(name, capacity, position, speed))
}

/// Spawn a walking client (speed 1) appearing at `spawn_time`.
pub fn spawn_test_client(
    world: &mut World,
    spawn_time: u64,
    origin: Position,
    destination: Position,
) -> Entity {
    let name = format!("client@{origin}->{destination}");
    spawn_client(world, Client::new(name, spawn_time, origin, destination, 1))
}

/// Run one dispatch step against `world` at the current clock time, outside the schedule.
pub fn dispatch_once(world: &mut World, algorithm: &mut dyn DispatchAlgorithm) -> StepResult {
    world.init_resource::<DispatchTimings>();
    let now = world
        .get_resource::<SimulationClock>()
        .map(SimulationClock::now)
        .unwrap_or_default();

    let mut state: SystemState<(TaxiQuery, ClientQuery, ResMut<DispatchTimings>)> =
        SystemState::new(world);
    let (mut taxis, mut clients, mut timings) = state.get_mut(world);
    let mut ctx = DispatchContext::new(now, &mut taxis, &mut clients, &mut timings);
    next_step(algorithm, &mut ctx)
}

/// Panic unless every taxi respects its seat capacity and keeps disjoint passenger sets.
pub fn assert_capacity_invariant(world: &mut World) {
    let mut taxis = world.query::<(Entity, &Taxi)>();
    for (entity, taxi) in taxis.iter(world) {
        assert!(
            taxi.occupancy() <= taxi.capacity,
            "taxi {entity:?} holds {} clients with {} seats",
            taxi.occupancy(),
            taxi.capacity
        );
        assert!(
            taxi.planned.iter().all(|c| !taxi.contained.contains(c)),
            "taxi {entity:?} has a client both planned and contained"
        );
        assert!(taxi.route.is_consistent(), "taxi {entity:?} has an inconsistent route");
    }
}
