use bevy_ecs::prelude::ResMut;

use crate::clock::SimulationClock;

pub fn advance_clock_system(mut clock: ResMut<SimulationClock>) {
    clock.advance();
}
