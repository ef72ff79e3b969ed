use bevy_ecs::prelude::Entity;
use thiserror::Error;

use crate::ecs::ClientState;
use crate::geometry::Position;

/// Which passenger set an operation expected a client to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerSet {
    Planned,
    Contained,
}

impl std::fmt::Display for PassengerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassengerSet::Planned => f.write_str("planned"),
            PassengerSet::Contained => f.write_str("contained"),
        }
    }
}

/// A taxi operation whose preconditions did not hold.
///
/// Recovered according to [`crate::world::ViolationPolicy`]: either fatal for the run or
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateViolation {
    #[error("taxi {taxi:?} is at capacity ({capacity} seats)")]
    CapacityExceeded { taxi: Entity, capacity: usize },

    #[error("client {client:?} is not in the {expected} set of taxi {taxi:?}")]
    PassengerNotFound {
        taxi: Entity,
        client: Entity,
        expected: PassengerSet,
    },

    #[error("client {client:?} at {client_position} is not at taxi {taxi:?} position {taxi_position}")]
    WrongPosition {
        taxi: Entity,
        client: Entity,
        taxi_position: Position,
        client_position: Position,
    },

    #[error("client {client:?} is {actual:?}, expected {expected:?}")]
    UnexpectedState {
        client: Entity,
        expected: ClientState,
        actual: ClientState,
    },

    #[error("entity {0:?} has no taxi or client component")]
    MissingEntity(Entity),
}

/// Errors surfaced by the simulation control surface.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown dispatch algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("state violation at t={time}: {violation}")]
    StateViolation {
        time: u64,
        #[source]
        violation: StateViolation,
    },
}
