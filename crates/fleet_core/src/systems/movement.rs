//! Movement system: advances every taxi to the current time.
//!
//! Taxis are updated in entity order so runs are reproducible. Boarding, alighting and the
//! events they emit happen inside [`crate::taxi::Taxi::update`].

use bevy_ecs::prelude::{Entity, Res, ResMut};
use tracing::error;

use crate::clock::SimulationClock;
use crate::matching::{ClientQuery, TaxiQuery};
use crate::telemetry::EventBus;
use crate::world::ViolationLog;

pub fn movement_system(
    clock: Res<SimulationClock>,
    mut taxis: TaxiQuery,
    mut clients: ClientQuery,
    mut events: ResMut<EventBus>,
    mut violations: ResMut<ViolationLog>,
) {
    let now = clock.now();
    let mut order: Vec<Entity> = taxis.iter().map(|(entity, _)| entity).collect();
    order.sort_unstable();

    for entity in order {
        let Ok((_, mut taxi)) = taxis.get_mut(entity) else {
            continue;
        };
        if let Err(violation) = taxi.update(entity, now, &mut clients, &mut events, &mut violations)
        {
            error!(taxi = ?entity, time = now, %violation, "taxi update failed");
            violations.record_fatal(violation);
            return;
        }
    }
}
