use bevy_ecs::prelude::Entity;

use crate::ecs::Client;
use crate::geometry::{bearing, Position};
use crate::route::{MergePolicy, OrderNode};
use crate::taxi::Taxi;

/// Owned copy of the taxi data dispatch policies read.
///
/// Views are `Send + Sync`, so candidate evaluation can fan out across threads while the
/// live components stay untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxiView {
    pub entity: Entity,
    pub position: Position,
    pub speed: u32,
    pub capacity: usize,
    pub contained: Vec<Entity>,
    pub planned: usize,
    pub route: Vec<OrderNode>,
}

impl TaxiView {
    pub fn from_taxi(entity: Entity, taxi: &Taxi) -> Self {
        Self {
            entity,
            position: taxi.position(),
            speed: taxi.motion.speed,
            capacity: taxi.capacity,
            contained: taxi.contained.clone(),
            planned: taxi.planned.len(),
            route: taxi.route.nodes().to_vec(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.route.is_empty()
    }

    pub fn free_seats(&self) -> usize {
        self.capacity
            .saturating_sub(self.contained.len() + self.planned)
    }

    pub fn has_capacity(&self) -> bool {
        self.free_seats() > 0
    }

    /// A free seat on a taxi that can move.
    pub fn can_take_client(&self) -> bool {
        self.speed > 0 && self.has_capacity()
    }

    pub fn stop_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.route.iter().map(|node| node.position)
    }

    /// Bearing from the taxi to its final stop, `None` while idle.
    pub fn heading(&self) -> Option<f64> {
        self.route
            .last()
            .filter(|last| last.position != self.position)
            .map(|last| bearing(self.position, last.position))
    }
}

/// A client request to be inserted into some taxi's route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionRequest {
    pub client: Entity,
    pub pickup: Position,
    pub dropoff: Position,
    /// Longest acceptable wait plus ride time.
    pub max_trip_time: f64,
}

impl InsertionRequest {
    pub fn for_client(entity: Entity, client: &Client) -> Self {
        Self {
            client: entity,
            pickup: client.origin,
            dropoff: client.destination,
            max_trip_time: client.max_trip_time(),
        }
    }
}

/// Cheapest feasible place for a request in one route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insertion {
    /// Added route length.
    pub cost: f64,
    /// The pickup goes before this index of the original route.
    pub pickup_index: usize,
    /// The dropoff goes before this index of the original route (`>= pickup_index`).
    pub dropoff_index: usize,
}

impl Insertion {
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Insert {
            pickup: self.pickup_index,
            dropoff: self.dropoff_index,
        }
    }
}

/// A priced offer from one taxi for one client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offer {
    pub taxi: Entity,
    pub insertion: Insertion,
}
