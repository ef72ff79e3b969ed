use bevy_ecs::prelude::World;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::clock::SimulationClock;
use crate::ecs::Client;
use crate::error::SimError;
use crate::geometry::Position;
use crate::taxi::Taxi;
use crate::telemetry::EventBus;
use crate::world::{spawn_client, spawn_taxi, WorldBounds};

use super::params::ScenarioParams;

/// Rejection sampling attempts before a destination falls back to a neighbouring position.
const MAX_DESTINATION_ATTEMPTS: usize = 64;

fn rng_for(seed: Option<u64>, salt: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(salt)),
        None => StdRng::from_entropy(),
    }
}

/// Uniform position inside `bounds`; `bounds` must be non-empty.
pub fn random_position<R: Rng>(rng: &mut R, bounds: WorldBounds) -> Position {
    Position::new(rng.gen_range(0..bounds.width), rng.gen_range(0..bounds.height))
}

/// Uniform position inside `bounds` different from `origin`.
pub fn random_destination<R: Rng>(rng: &mut R, bounds: WorldBounds, origin: Position) -> Position {
    for _ in 0..MAX_DESTINATION_ATTEMPTS {
        let candidate = random_position(rng, bounds);
        if candidate != origin {
            return candidate;
        }
    }
    if bounds.width > 1 {
        let x = if origin.x + 1 < bounds.width { origin.x + 1 } else { origin.x - 1 };
        Position::new(x, origin.y)
    } else {
        let y = if origin.y + 1 < bounds.height { origin.y + 1 } else { origin.y - 1 };
        Position::new(origin.x, y)
    }
}

/// Populate `world` with a seeded random fleet and client population.
///
/// Inserts [`WorldBounds`], a fresh [`SimulationClock`] and [`EventBus`]; spawns
/// `taxi_count` taxis and `client_count` clients with spawn times uniform in
/// `[0, client_spawn_window]`.
pub fn build_scenario(world: &mut World, params: &ScenarioParams) -> Result<(), SimError> {
    params.validate()?;
    let bounds = WorldBounds::new(params.width, params.height);
    world.insert_resource(bounds);
    world.insert_resource(SimulationClock::default());
    world.insert_resource(EventBus::default());

    let mut taxi_rng = rng_for(params.seed, 0x7a41_5eed);
    for index in 0..params.taxi_count {
        let position = random_position(&mut taxi_rng, bounds);
        spawn_taxi(
            world,
            Taxi::new(
                format!("taxi-{index}"),
                params.taxi_seat_count,
                position,
                params.taxi_speed,
            ),
        );
    }

    let mut client_rng = rng_for(params.seed, 0xc11e_47ed);
    for index in 0..params.client_count {
        let origin = random_position(&mut client_rng, bounds);
        let destination = random_destination(&mut client_rng, bounds, origin);
        let spawn_time = client_rng.gen_range(0..=params.client_spawn_window);
        spawn_client(
            world,
            Client::new(
                format!("client-{index}"),
                spawn_time,
                origin,
                destination,
                params.client_speed,
            ),
        );
    }

    debug!(
        taxis = params.taxi_count,
        clients = params.client_count,
        width = params.width,
        height = params.height,
        seed = ?params.seed,
        "scenario built"
    );
    Ok(())
}
