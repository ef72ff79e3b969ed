//! Telemetry: the per-run event stream and world snapshots for external readers.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use bevy_ecs::prelude::{Entity, Resource};

use crate::ecs::{Client, ClientState};
use crate::geometry::Position;
use crate::route::OrderNode;
use crate::taxi::Taxi;
use crate::world::WorldBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimEventKind {
    ClientFinished,
    ClientEnteredTaxi,
    ClientLeftTaxi,
}

/// One entry of the append-only event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEvent {
    pub time: u64,
    pub kind: SimEventKind,
    pub client: Entity,
    pub taxi: Option<Entity>,
}

/// Event bus owned by one simulation run.
///
/// Keeps the full log for cursor-based readers and forwards every event to channel
/// subscribers, so consumers on other threads never touch the live world.
#[derive(Debug, Default, Resource)]
pub struct EventBus {
    log: Vec<SimEvent>,
    subscribers: Vec<Sender<SimEvent>>,
}

impl EventBus {
    pub fn publish(&mut self, event: SimEvent) {
        self.log.push(event);
        // Receivers that hung up are dropped.
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn emit(&mut self, time: u64, kind: SimEventKind, client: Entity, taxi: Option<Entity>) {
        self.publish(SimEvent {
            time,
            kind,
            client,
            taxi,
        });
    }

    /// Receive every event published from now on.
    pub fn subscribe(&mut self) -> Receiver<SimEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.log
    }

    /// Events published at or after `cursor`; pass the returned length back in as the next cursor.
    pub fn since(&self, cursor: usize) -> &[SimEvent] {
        self.log.get(cursor..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn count(&self, kind: SimEventKind) -> usize {
        self.log.iter().filter(|event| event.kind == kind).count()
    }
}

/// Snapshot of one client for visualization/export.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSnapshot {
    pub entity: Entity,
    pub name: String,
    pub spawn_time: u64,
    pub position: Position,
    pub origin: Position,
    pub destination: Position,
    pub state: ClientState,
}

/// Snapshot of one taxi for visualization/export.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxiSnapshot {
    pub entity: Entity,
    pub name: String,
    pub position: Position,
    pub capacity: usize,
    pub travel_distance: f64,
    pub route: Vec<OrderNode>,
    pub planned: Vec<Entity>,
    pub contained: Vec<Entity>,
}

/// Client counts by lifecycle state (unspawned clients are counted separately).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCounts {
    pub clients_unspawned: usize,
    pub clients_waiting: usize,
    pub clients_planned: usize,
    pub clients_in_transit: usize,
    pub clients_finished: usize,
    pub taxis_idle: usize,
    pub taxis_en_route: usize,
}

impl SimCounts {
    pub fn add_client(&mut self, state: ClientState, spawned: bool) {
        if !spawned {
            self.clients_unspawned += 1;
            return;
        }
        match state {
            ClientState::Waiting => self.clients_waiting += 1,
            ClientState::Planned => self.clients_planned += 1,
            ClientState::InTransit => self.clients_in_transit += 1,
            ClientState::Finished => self.clients_finished += 1,
        }
    }

    pub fn add_taxi(&mut self, idle: bool) {
        if idle {
            self.taxis_idle += 1;
        } else {
            self.taxis_en_route += 1;
        }
    }
}

/// Deep, independent copy of the world at one simulation time.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub time: u64,
    pub bounds: WorldBounds,
    pub taxis: Vec<TaxiSnapshot>,
    pub clients: Vec<ClientSnapshot>,
}

impl WorldSnapshot {
    pub fn taxi(&self, entity: Entity) -> Option<&TaxiSnapshot> {
        self.taxis.iter().find(|taxi| taxi.entity == entity)
    }

    pub fn client(&self, entity: Entity) -> Option<&ClientSnapshot> {
        self.clients.iter().find(|client| client.entity == entity)
    }

    pub fn counts(&self) -> SimCounts {
        let mut counts = SimCounts::default();
        for client in &self.clients {
            counts.add_client(client.state, client.spawn_time <= self.time);
        }
        for taxi in &self.taxis {
            counts.add_taxi(taxi.route.is_empty());
        }
        counts
    }
}

/// Build a snapshot from component iterators; both lists end up ordered by entity.
pub fn build_snapshot<'a>(
    time: u64,
    bounds: WorldBounds,
    taxis: impl IntoIterator<Item = (Entity, &'a Taxi)>,
    clients: impl IntoIterator<Item = (Entity, &'a Client)>,
) -> WorldSnapshot {
    let mut taxis: Vec<TaxiSnapshot> = taxis
        .into_iter()
        .map(|(entity, taxi)| TaxiSnapshot {
            entity,
            name: taxi.name.clone(),
            position: taxi.position(),
            capacity: taxi.capacity,
            travel_distance: taxi.travel_distance,
            route: taxi.route.nodes().to_vec(),
            planned: taxi.planned.clone(),
            contained: taxi.contained.clone(),
        })
        .collect();
    taxis.sort_by_key(|taxi| taxi.entity);

    let mut clients: Vec<ClientSnapshot> = clients
        .into_iter()
        .map(|(entity, client)| ClientSnapshot {
            entity,
            name: client.name.clone(),
            spawn_time: client.spawn_time,
            position: client.position(),
            origin: client.origin,
            destination: client.destination,
            state: client.state,
        })
        .collect();
    clients.sort_by_key(|client| client.entity);

    WorldSnapshot {
        time,
        bounds,
        taxis,
        clients,
    }
}

/// How often the schedule keeps a snapshot, and how many are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Resource)]
pub struct SimSnapshotConfig {
    /// Simulation time between snapshots.
    pub interval: u64,
    /// Oldest snapshots are dropped beyond this.
    pub max_snapshots: usize,
}

impl Default for SimSnapshotConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            max_snapshots: 1_000,
        }
    }
}

/// Snapshot history captured by the schedule.
#[derive(Debug, Default, Resource)]
pub struct SimSnapshots {
    pub last_snapshot_at: Option<u64>,
    pub snapshots: VecDeque<WorldSnapshot>,
}

impl SimSnapshots {
    pub fn push(&mut self, snapshot: WorldSnapshot, max_snapshots: usize) {
        self.last_snapshot_at = Some(snapshot.time);
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > max_snapshots {
            self.snapshots.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.snapshots.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_serves_cursor_readers_and_subscribers() {
        let mut bus = EventBus::default();
        let rx = bus.subscribe();
        let client = Entity::from_raw(1);
        let taxi = Entity::from_raw(2);

        bus.emit(3, SimEventKind::ClientEnteredTaxi, client, Some(taxi));
        let cursor = bus.len();
        bus.emit(7, SimEventKind::ClientFinished, client, Some(taxi));

        assert_eq!(bus.since(cursor).len(), 1);
        assert_eq!(bus.since(cursor)[0].kind, SimEventKind::ClientFinished);
        assert!(bus.since(99).is_empty());

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].time, 3);
        assert_eq!(bus.count(SimEventKind::ClientFinished), 1);
    }

    #[test]
    fn snapshot_history_is_bounded() {
        let mut history = SimSnapshots::default();
        for time in 0..5 {
            history.push(
                build_snapshot(
                    time,
                    WorldBounds::new(1, 1),
                    Vec::<(Entity, &Taxi)>::new(),
                    Vec::<(Entity, &Client)>::new(),
                ),
                3,
            );
        }
        assert_eq!(history.snapshots.len(), 3);
        assert_eq!(history.snapshots.front().map(|s| s.time), Some(2));
        assert_eq!(history.latest().map(|s| s.time), Some(4));
        assert_eq!(history.last_snapshot_at, Some(4));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = EventBus::default();
        drop(bus.subscribe());
        bus.emit(0, SimEventKind::ClientLeftTaxi, Entity::from_raw(1), None);
        assert!(bus.subscribers.is_empty());
        assert_eq!(bus.len(), 1);
    }
}
