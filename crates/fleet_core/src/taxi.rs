//! Taxi component and its passenger state machine.
//!
//! A taxi is idle while its route is empty and en route otherwise. Seats are reserved when a
//! client is planned and occupied once the client boards, so `planned + contained` never
//! exceeds the seat capacity. [`Taxi::update`] is the per-tick step: move, consume reached
//! stops, let finished passengers out, then board planned clients waiting at the stop.

use std::collections::HashMap;

use bevy_ecs::prelude::{Component, Entity, Query};
use tracing::debug;

use crate::ecs::{Client, ClientState, Motion};
use crate::error::{PassengerSet, StateViolation};
use crate::geometry::Position;
use crate::route::{MergePolicy, Order, StopKind, TargetList};
use crate::telemetry::{EventBus, SimEventKind};
use crate::world::ViolationLog;

/// Mutable access to clients by entity, so the state machine works on an ECS query or a plain map.
pub trait ClientStore {
    fn client_mut(&mut self, entity: Entity) -> Option<&mut Client>;
}

impl ClientStore for Query<'_, '_, (Entity, &'static mut Client)> {
    fn client_mut(&mut self, entity: Entity) -> Option<&mut Client> {
        self.get_mut(entity).ok().map(|(_, client)| client.into_inner())
    }
}

impl ClientStore for HashMap<Entity, Client> {
    fn client_mut(&mut self, entity: Entity) -> Option<&mut Client> {
        self.get_mut(&entity)
    }
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Taxi {
    pub name: String,
    pub capacity: usize,
    pub motion: Motion,
    /// Total distance driven so far.
    pub travel_distance: f64,
    pub route: TargetList,
    /// Assigned but not yet on board.
    pub planned: Vec<Entity>,
    /// On board.
    pub contained: Vec<Entity>,
}

impl Taxi {
    pub fn new(name: impl Into<String>, capacity: usize, position: Position, speed: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            motion: Motion::new(position, speed, 0),
            travel_distance: 0.0,
            route: TargetList::new(),
            planned: Vec::new(),
            contained: Vec::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.motion.position
    }

    pub fn is_idle(&self) -> bool {
        self.route.is_empty()
    }

    /// Seats reserved or occupied.
    pub fn occupancy(&self) -> usize {
        self.planned.len() + self.contained.len()
    }

    pub fn free_seats(&self) -> usize {
        self.capacity.saturating_sub(self.occupancy())
    }

    pub fn has_capacity(&self) -> bool {
        self.free_seats() > 0
    }

    pub fn is_planned(&self, client: Entity) -> bool {
        self.planned.contains(&client)
    }

    pub fn contains(&self, client: Entity) -> bool {
        self.contained.contains(&client)
    }

    /// Reserve a seat for a waiting client and merge its order into the route.
    pub fn plan_client(
        &mut self,
        taxi_entity: Entity,
        client_entity: Entity,
        client: &mut Client,
        merge: MergePolicy,
    ) -> Result<(), StateViolation> {
        if client.state != ClientState::Waiting {
            return Err(StateViolation::UnexpectedState {
                client: client_entity,
                expected: ClientState::Waiting,
                actual: client.state,
            });
        }
        if !self.has_capacity() {
            return Err(StateViolation::CapacityExceeded {
                taxi: taxi_entity,
                capacity: self.capacity,
            });
        }

        self.route.add_order(
            Order::new(client_entity, client.origin, client.destination),
            merge,
        );
        self.planned.push(client_entity);
        client.state = ClientState::Planned;
        Ok(())
    }

    /// Board a planned client standing at the taxi's position.
    pub fn pickup_client(
        &mut self,
        taxi_entity: Entity,
        client_entity: Entity,
        client: &mut Client,
    ) -> Result<(), StateViolation> {
        let Some(index) = self.planned.iter().position(|c| *c == client_entity) else {
            return Err(StateViolation::PassengerNotFound {
                taxi: taxi_entity,
                client: client_entity,
                expected: PassengerSet::Planned,
            });
        };
        if client.position() != self.position() {
            return Err(StateViolation::WrongPosition {
                taxi: taxi_entity,
                client: client_entity,
                taxi_position: self.position(),
                client_position: client.position(),
            });
        }
        if self.contained.len() >= self.capacity {
            return Err(StateViolation::CapacityExceeded {
                taxi: taxi_entity,
                capacity: self.capacity,
            });
        }

        self.planned.remove(index);
        self.contained.push(client_entity);
        self.route.remove_stop(client_entity, StopKind::Pickup);
        client.state = ClientState::InTransit;
        client.motion.hold(self.motion.last_update);
        Ok(())
    }

    /// Let an on-board client out at the current position.
    ///
    /// A client leaving at its destination is finished; anywhere else its request restarts
    /// from the drop-off point.
    pub fn drop_off_client(
        &mut self,
        taxi_entity: Entity,
        client_entity: Entity,
        client: &mut Client,
    ) -> Result<(), StateViolation> {
        let Some(index) = self.contained.iter().position(|c| *c == client_entity) else {
            return Err(StateViolation::PassengerNotFound {
                taxi: taxi_entity,
                client: client_entity,
                expected: PassengerSet::Contained,
            });
        };
        if client.position() != self.position() {
            return Err(StateViolation::WrongPosition {
                taxi: taxi_entity,
                client: client_entity,
                taxi_position: self.position(),
                client_position: client.position(),
            });
        }

        self.contained.remove(index);
        self.route.forget(client_entity);
        if client.position() == client.destination {
            client.state = ClientState::Finished;
        } else {
            client.restart_from_current_position();
        }
        Ok(())
    }

    /// Cancel a reservation: the client waits again and its stops leave the route.
    pub fn forget_client(
        &mut self,
        taxi_entity: Entity,
        client_entity: Entity,
        client: &mut Client,
    ) -> Result<(), StateViolation> {
        let Some(index) = self.planned.iter().position(|c| *c == client_entity) else {
            return Err(StateViolation::PassengerNotFound {
                taxi: taxi_entity,
                client: client_entity,
                expected: PassengerSet::Planned,
            });
        };
        self.planned.remove(index);
        self.route.forget(client_entity);
        client.state = ClientState::Waiting;
        Ok(())
    }

    /// Drop all reservations and passengers and empty the route.
    pub fn clear_taxi<S: ClientStore>(
        &mut self,
        taxi_entity: Entity,
        clients: &mut S,
    ) -> Result<(), StateViolation> {
        for client_entity in self.planned.clone() {
            let client = clients
                .client_mut(client_entity)
                .ok_or(StateViolation::MissingEntity(client_entity))?;
            self.forget_client(taxi_entity, client_entity, client)?;
        }
        for client_entity in self.contained.clone() {
            let client = clients
                .client_mut(client_entity)
                .ok_or(StateViolation::MissingEntity(client_entity))?;
            self.drop_off_client(taxi_entity, client_entity, client)?;
        }
        self.route.clear();
        Ok(())
    }

    /// Advance one tick.
    ///
    /// Every failing passenger operation goes through `violations`: under
    /// [`crate::world::ViolationPolicy::Fail`] the first one aborts the update, otherwise it is
    /// recorded and skipped.
    pub fn update<S: ClientStore>(
        &mut self,
        taxi_entity: Entity,
        now: u64,
        clients: &mut S,
        events: &mut EventBus,
        violations: &mut ViolationLog,
    ) -> Result<(), StateViolation> {
        let Some(target) = self.route.lead().map(|lead| lead.position) else {
            self.motion.hold(now);
            return Ok(());
        };
        if now <= self.motion.last_update {
            return Ok(());
        }

        self.travel_distance += self.motion.advance_towards(target, now);
        let position = self.position();

        let mut finished = Vec::new();
        for &client_entity in &self.contained {
            let Some(client) = clients.client_mut(client_entity) else {
                violations.recover(Err(StateViolation::MissingEntity(client_entity)))?;
                continue;
            };
            if client.ride_to(position, now) {
                events.emit(now, SimEventKind::ClientFinished, client_entity, Some(taxi_entity));
                finished.push(client_entity);
            }
        }

        let reached = self.route.pop_reached(position);

        for client_entity in finished {
            self.contained.retain(|c| *c != client_entity);
            self.route.forget(client_entity);
            events.emit(now, SimEventKind::ClientLeftTaxi, client_entity, Some(taxi_entity));
        }

        for node in reached.into_iter().filter(|node| node.is_pickup()) {
            if !self.is_planned(node.client) {
                continue;
            }
            let Some(client) = clients.client_mut(node.client) else {
                violations.recover(Err(StateViolation::MissingEntity(node.client)))?;
                continue;
            };
            if client.position() != node.position {
                continue;
            }

            if self.contained.len() >= self.capacity {
                debug!(
                    taxi = ?taxi_entity,
                    client = ?node.client,
                    "taxi full at pickup, cancelling plan"
                );
                violations.recover(self.forget_client(taxi_entity, node.client, client))?;
                continue;
            }

            let boarded = self.pickup_client(taxi_entity, node.client, client);
            if boarded.is_err() {
                violations.recover(boarded)?;
                continue;
            }
            events.emit(now, SimEventKind::ClientEnteredTaxi, node.client, Some(taxi_entity));

            // Already at the destination: no dropoff stop is left to reach.
            if client.position() == client.destination {
                let left = self.drop_off_client(taxi_entity, node.client, client);
                if left.is_ok() {
                    events.emit(now, SimEventKind::ClientFinished, node.client, Some(taxi_entity));
                    events.emit(now, SimEventKind::ClientLeftTaxi, node.client, Some(taxi_entity));
                }
                violations.recover(left)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ViolationPolicy;

    const TAXI: Entity = Entity::from_raw(100);

    fn client_at(id: u32, origin: (i32, i32), destination: (i32, i32)) -> (Entity, Client) {
        (
            Entity::from_raw(id),
            Client::new(
                format!("client-{id}"),
                0,
                origin.into(),
                destination.into(),
                1,
            ),
        )
    }

    fn strict() -> ViolationLog {
        ViolationLog::new(ViolationPolicy::Fail)
    }

    fn store(clients: impl IntoIterator<Item = (Entity, Client)>) -> HashMap<Entity, Client> {
        clients.into_iter().collect()
    }

    #[test]
    fn plan_client_reserves_seat_and_marks_planned() {
        let mut taxi = Taxi::new("t", 1, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (10, 0), (20, 0));
        let (b, mut client_b) = client_at(2, (5, 0), (6, 0));

        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("seat available");
        assert_eq!(client_a.state, ClientState::Planned);
        assert_eq!(taxi.planned, vec![a]);
        assert_eq!(taxi.route.len(), 2);

        let err = taxi
            .plan_client(TAXI, b, &mut client_b, MergePolicy::Concatenate)
            .expect_err("no seat left");
        assert!(matches!(err, StateViolation::CapacityExceeded { capacity: 1, .. }));
        assert_eq!(client_b.state, ClientState::Waiting);
        assert!(taxi.occupancy() <= taxi.capacity);
    }

    #[test]
    fn plan_client_rejects_non_waiting_client() {
        let mut taxi = Taxi::new("t", 2, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (1, 0), (2, 0));
        client_a.state = ClientState::Finished;
        let err = taxi
            .plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect_err("finished client");
        assert!(matches!(err, StateViolation::UnexpectedState { .. }));
    }

    #[test]
    fn pickup_requires_same_position_and_planned_client() {
        let mut taxi = Taxi::new("t", 2, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (3, 0), (9, 0));

        let err = taxi.pickup_client(TAXI, a, &mut client_a).expect_err("not planned");
        assert!(matches!(
            err,
            StateViolation::PassengerNotFound {
                expected: PassengerSet::Planned,
                ..
            }
        ));

        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        let err = taxi.pickup_client(TAXI, a, &mut client_a).expect_err("far away");
        assert!(matches!(err, StateViolation::WrongPosition { .. }));

        taxi.motion.position = Position::new(3, 0);
        taxi.pickup_client(TAXI, a, &mut client_a).expect("board");
        assert_eq!(client_a.state, ClientState::InTransit);
        assert!(taxi.contains(a));
        assert!(taxi.planned.is_empty());
        assert_eq!(taxi.route.positions().collect::<Vec<_>>(), vec![Position::new(9, 0)]);
    }

    #[test]
    fn drop_off_away_from_destination_restarts_request() {
        let mut taxi = Taxi::new("t", 2, Position::new(3, 0), 1);
        let (a, mut client_a) = client_at(1, (3, 0), (9, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        taxi.pickup_client(TAXI, a, &mut client_a).expect("board");

        taxi.motion.position = Position::new(5, 0);
        client_a.motion.position = Position::new(5, 0);
        taxi.drop_off_client(TAXI, a, &mut client_a).expect("drop");

        assert_eq!(client_a.state, ClientState::Waiting);
        assert_eq!(client_a.origin, Position::new(5, 0));
        assert!(taxi.route.is_empty());
        assert!(taxi.contained.is_empty());
    }

    #[test]
    fn forget_client_returns_client_to_waiting() {
        let mut taxi = Taxi::new("t", 2, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (3, 0), (9, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");

        taxi.forget_client(TAXI, a, &mut client_a).expect("forget");
        assert_eq!(client_a.state, ClientState::Waiting);
        assert!(taxi.route.is_empty());
        assert!(taxi.forget_client(TAXI, a, &mut client_a).is_err());
    }

    #[test]
    fn clear_taxi_releases_everyone() {
        let mut taxi = Taxi::new("t", 3, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (0, 0), (9, 0));
        let (b, mut client_b) = client_at(2, (4, 0), (8, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan a");
        taxi.plan_client(TAXI, b, &mut client_b, MergePolicy::Concatenate)
            .expect("plan b");
        taxi.pickup_client(TAXI, a, &mut client_a).expect("board a");

        let mut clients = store([(a, client_a), (b, client_b)]);
        taxi.clear_taxi(TAXI, &mut clients).expect("clear");

        assert!(taxi.route.is_empty());
        assert_eq!(taxi.occupancy(), 0);
        assert_eq!(clients[&a].state, ClientState::Waiting);
        assert_eq!(clients[&b].state, ClientState::Waiting);
    }

    #[test]
    fn update_drives_pickup_and_dropoff() {
        let mut taxi = Taxi::new("t", 1, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (2, 0), (4, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        let mut clients = store([(a, client_a)]);
        let mut events = EventBus::default();

        for now in 1..=4 {
            taxi.update(TAXI, now, &mut clients, &mut events, &mut strict())
                .expect("update");
            assert!(taxi.occupancy() <= taxi.capacity);
        }

        assert_eq!(clients[&a].state, ClientState::Finished);
        assert!(taxi.is_idle());
        assert!(taxi.contained.is_empty());
        assert_eq!(taxi.travel_distance, 4.0);

        let kinds: Vec<_> = events.events().iter().map(|e| (e.time, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, SimEventKind::ClientEnteredTaxi),
                (4, SimEventKind::ClientFinished),
                (4, SimEventKind::ClientLeftTaxi),
            ]
        );
    }

    #[test]
    fn client_already_at_destination_finishes_on_boarding() {
        let mut taxi = Taxi::new("t", 1, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (2, 0), (2, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        let mut clients = store([(a, client_a)]);
        let mut events = EventBus::default();

        for now in 1..=2 {
            taxi.update(TAXI, now, &mut clients, &mut events, &mut strict())
                .expect("update");
        }

        assert_eq!(clients[&a].state, ClientState::Finished);
        assert!(taxi.is_idle());
        assert!(taxi.contained.is_empty());
        let kinds: Vec<_> = events.events().iter().map(|e| (e.time, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, SimEventKind::ClientEnteredTaxi),
                (2, SimEventKind::ClientFinished),
                (2, SimEventKind::ClientLeftTaxi),
            ]
        );
    }

    #[test]
    fn update_is_idempotent_for_same_time() {
        let mut taxi = Taxi::new("t", 1, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (5, 0), (6, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        let mut clients = store([(a, client_a)]);
        let mut events = EventBus::default();

        taxi.update(TAXI, 2, &mut clients, &mut events, &mut strict())
            .expect("update");
        taxi.update(TAXI, 2, &mut clients, &mut events, &mut strict())
            .expect("update");
        assert_eq!(taxi.position(), Position::new(2, 0));
        assert_eq!(taxi.travel_distance, 2.0);
    }

    #[test]
    fn idle_taxi_does_not_jump_after_assignment() {
        let mut taxi = Taxi::new("t", 1, Position::new(0, 0), 1);
        let mut clients: HashMap<Entity, Client> = HashMap::new();
        let mut events = EventBus::default();
        taxi.update(TAXI, 50, &mut clients, &mut events, &mut strict())
            .expect("idle update");

        let (a, mut client_a) = client_at(1, (10, 0), (20, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        clients.insert(a, client_a);
        taxi.update(TAXI, 51, &mut clients, &mut events, &mut strict())
            .expect("update");
        assert_eq!(taxi.position(), Position::new(1, 0));
    }

    #[test]
    fn missing_client_is_skipped_or_fatal_by_policy() {
        let mut taxi = Taxi::new("t", 2, Position::new(0, 0), 1);
        let ghost = Entity::from_raw(7);
        taxi.contained.push(ghost);
        let (a, mut client_a) = client_at(1, (3, 0), (9, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        let mut clients = store([(a, client_a)]);
        let mut events = EventBus::default();

        let mut lenient = taxi.clone();
        let mut lenient_log = ViolationLog::new(ViolationPolicy::LogAndContinue);
        lenient
            .update(TAXI, 1, &mut clients, &mut events, &mut lenient_log)
            .expect("logged and skipped");
        assert_eq!(lenient.position(), Position::new(1, 0));
        assert_eq!(lenient_log.recorded(), &[StateViolation::MissingEntity(ghost)]);

        let err = taxi
            .update(TAXI, 1, &mut clients, &mut events, &mut strict())
            .expect_err("fatal");
        assert_eq!(err, StateViolation::MissingEntity(ghost));
    }

    #[test]
    fn full_taxi_cancels_plan_on_arrival() {
        let mut taxi = Taxi::new("t", 1, Position::new(0, 0), 1);
        let (a, mut client_a) = client_at(1, (1, 0), (5, 0));
        taxi.plan_client(TAXI, a, &mut client_a, MergePolicy::Concatenate)
            .expect("plan");
        // Force an inconsistent occupancy the arrival check has to catch.
        let rider = Entity::from_raw(2);
        taxi.contained.push(rider);
        let (_, mut rider_client) = client_at(2, (0, 0), (50, 0));
        rider_client.state = ClientState::InTransit;
        let mut clients = store([(a, client_a), (rider, rider_client)]);
        let mut events = EventBus::default();

        taxi.update(TAXI, 1, &mut clients, &mut events, &mut strict())
            .expect("update");

        assert_eq!(clients[&a].state, ClientState::Waiting);
        assert!(!taxi.is_planned(a));
        assert!(!taxi.route.has_order_for(a));
        assert_eq!(events.count(SimEventKind::ClientEnteredTaxi), 0);
    }
}
