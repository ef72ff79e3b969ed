use bevy_ecs::prelude::{Res, ResMut, World};
use bevy_ecs::system::SystemState;
use tracing::debug;

use crate::clock::SimulationClock;
use crate::matching::{
    next_step, ClientQuery, DispatchAlgorithmResource, DispatchContext, StepStatus, TaxiQuery,
};
use crate::profiling::DispatchTimings;
use crate::world::LastStepResult;

type DispatchParams<'w, 's> = (
    Res<'w, SimulationClock>,
    ResMut<'w, DispatchAlgorithmResource>,
    TaxiQuery<'w, 's>,
    ClientQuery<'w, 's>,
    ResMut<'w, DispatchTimings>,
    ResMut<'w, LastStepResult>,
);

/// Run the configured dispatch policy once and store its outcome.
///
/// Exclusive so both queries borrow the world for the same lifetime, as
/// [`DispatchContext`] requires.
pub fn dispatch_system(
    world: &mut World,
    state: &mut SystemState<DispatchParams<'static, 'static>>,
) {
    let (clock, mut algorithm, mut taxis, mut clients, mut timings, mut last) =
        state.get_mut(world);
    let now = clock.now();
    let mut ctx = DispatchContext::new(now, &mut taxis, &mut clients, &mut timings);
    let result = next_step(&mut **algorithm, &mut ctx);
    if result.status != StepStatus::Found {
        debug!(
            time = now,
            algorithm = algorithm.name(),
            status = ?result.status,
            message = result.message.as_deref().unwrap_or_default(),
            "dispatch step made no assignment"
        );
    }
    last.0 = Some(result);
}
