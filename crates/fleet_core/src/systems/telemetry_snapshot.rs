use bevy_ecs::prelude::{Entity, Query, Res, ResMut};

use crate::clock::SimulationClock;
use crate::ecs::Client;
use crate::taxi::Taxi;
use crate::telemetry::{build_snapshot, SimSnapshotConfig, SimSnapshots};
use crate::world::WorldBounds;

pub fn capture_snapshot_system(
    clock: Res<SimulationClock>,
    bounds: Option<Res<WorldBounds>>,
    config: Res<SimSnapshotConfig>,
    mut snapshots: ResMut<SimSnapshots>,
    taxis: Query<(Entity, &Taxi)>,
    clients: Query<(Entity, &Client)>,
) {
    let bounds = bounds.map(|b| *b).unwrap_or_default();
    let snapshot = build_snapshot(clock.now(), bounds, taxis.iter(), clients.iter());
    snapshots.push(snapshot, config.max_snapshots);
}
