//! World-level resources and helpers: bounds, violation handling, completion, snapshots.

use bevy_ecs::prelude::{Entity, Resource, World};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::SimulationClock;
use crate::ecs::{Client, ClientState};
use crate::error::StateViolation;
use crate::geometry::Position;
use crate::matching::StepResult;
use crate::taxi::Taxi;
use crate::telemetry::{build_snapshot, WorldSnapshot};

/// Simulation area `[0, width) x [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Resource, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: i32,
    pub height: i32,
}

impl WorldBounds {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, position: Position) -> bool {
        (0..self.width).contains(&position.x) && (0..self.height).contains(&position.y)
    }
}

/// What happens when a passenger operation breaks a taxi invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViolationPolicy {
    /// Abort the run after the current tick.
    #[default]
    Fail,
    /// Log, record, and skip the offending operation.
    LogAndContinue,
}

/// Violations seen during the run, plus the policy deciding whether they are fatal.
#[derive(Debug, Clone, Default, Resource)]
pub struct ViolationLog {
    policy: ViolationPolicy,
    recorded: Vec<StateViolation>,
    fatal: Option<StateViolation>,
}

impl ViolationLog {
    pub fn new(policy: ViolationPolicy) -> Self {
        Self {
            policy,
            recorded: Vec::new(),
            fatal: None,
        }
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Apply the policy to the outcome of one operation.
    pub fn recover(&mut self, result: Result<(), StateViolation>) -> Result<(), StateViolation> {
        let Err(violation) = result else {
            return Ok(());
        };
        match self.policy {
            ViolationPolicy::Fail => Err(violation),
            ViolationPolicy::LogAndContinue => {
                warn!(%violation, "skipping operation that violates taxi invariants");
                self.recorded.push(violation);
                Ok(())
            }
        }
    }

    /// Keep the first fatal violation; later ones are ignored.
    pub fn record_fatal(&mut self, violation: StateViolation) {
        if self.fatal.is_none() {
            self.fatal = Some(violation);
        }
    }

    pub fn take_fatal(&mut self) -> Option<StateViolation> {
        self.fatal.take()
    }

    pub fn recorded(&self) -> &[StateViolation] {
        &self.recorded
    }
}

/// When a run counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Resource, Serialize, Deserialize)]
pub enum Completion {
    #[default]
    AllClientsFinished,
    AtTime(u64),
}

/// Outcome of the most recent dispatch step.
#[derive(Debug, Clone, Default, Resource)]
pub struct LastStepResult(pub Option<StepResult>);

pub fn spawn_taxi(world: &mut World, taxi: Taxi) -> Entity {
    world.spawn(taxi).id()
}

pub fn spawn_client(world: &mut World, client: Client) -> Entity {
    world.spawn(client).id()
}

/// Deep copy of every taxi and client, ordered by entity.
pub fn snapshot(world: &mut World) -> WorldSnapshot {
    let time = world
        .get_resource::<SimulationClock>()
        .map(SimulationClock::now)
        .unwrap_or_default();
    let bounds = world
        .get_resource::<WorldBounds>()
        .copied()
        .unwrap_or_default();

    let mut taxis = world.query::<(Entity, &Taxi)>();
    let mut clients = world.query::<(Entity, &Client)>();
    build_snapshot(time, bounds, taxis.iter(world), clients.iter(world))
}

/// Evaluate the [`Completion`] predicate (default: every client finished).
pub fn is_complete(world: &mut World) -> bool {
    let completion = world
        .get_resource::<Completion>()
        .copied()
        .unwrap_or_default();
    match completion {
        Completion::AllClientsFinished => world
            .query::<&Client>()
            .iter(world)
            .all(|client| client.state == ClientState::Finished),
        Completion::AtTime(end) => world
            .get_resource::<SimulationClock>()
            .is_some_and(|clock| clock.now() >= end),
    }
}
