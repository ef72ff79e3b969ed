//! Entity components: per-tick motion and the client lifecycle.
//!
//! Taxis live in [`crate::taxi`]; both carry a [`Motion`] that is advanced once per tick.

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

use crate::geometry::{distance, move_towards, Position};

/// Position plus the bookkeeping needed to advance it by elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Position,
    /// Distance units per time unit.
    pub speed: u32,
    /// Simulation time of the last position write.
    pub last_update: u64,
}

impl Motion {
    pub fn new(position: Position, speed: u32, now: u64) -> Self {
        Self {
            position,
            speed,
            last_update: now,
        }
    }

    /// Advance toward `target` by `speed * (now - last_update)` and return the distance moved.
    ///
    /// Repeated calls at the same `now` are no-ops.
    pub fn advance_towards(&mut self, target: Position, now: u64) -> f64 {
        let elapsed = now.saturating_sub(self.last_update);
        if elapsed == 0 {
            return 0.0;
        }
        let max_dist = f64::from(self.speed) * elapsed as f64;
        let next = move_towards(self.position, target, max_dist);
        let moved = distance(self.position, next);
        self.position = next;
        self.last_update = now;
        moved
    }

    /// Mark the motion as current without moving (used while idle).
    pub fn hold(&mut self, now: u64) {
        self.last_update = self.last_update.max(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientState {
    Waiting,
    Planned,
    InTransit,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Client {
    pub name: String,
    /// Simulation time from which the client is visible to dispatch.
    pub spawn_time: u64,
    /// Where the current request starts (pickup location).
    pub origin: Position,
    pub destination: Position,
    /// Walking speed; only used to derive the maximum acceptable trip time.
    pub motion: Motion,
    pub state: ClientState,
}

impl Client {
    pub fn new(
        name: impl Into<String>,
        spawn_time: u64,
        origin: Position,
        destination: Position,
        walking_speed: u32,
    ) -> Self {
        Self {
            name: name.into(),
            spawn_time,
            origin,
            destination,
            motion: Motion::new(origin, walking_speed, spawn_time),
            state: ClientState::Waiting,
        }
    }

    pub fn position(&self) -> Position {
        self.motion.position
    }

    pub fn is_spawned(&self, now: u64) -> bool {
        self.spawn_time <= now
    }

    /// Spawned and still looking for a taxi.
    pub fn is_waiting(&self, now: u64) -> bool {
        self.is_spawned(now) && self.state == ClientState::Waiting
    }

    /// How long walking from origin to destination would take; the longest trip a client accepts.
    pub fn max_trip_time(&self) -> f64 {
        let walk = distance(self.origin, self.destination);
        if self.motion.speed == 0 {
            f64::INFINITY
        } else {
            walk / f64::from(self.motion.speed)
        }
    }

    /// Co-locate with the carrying taxi. Returns `true` when this update finished the trip.
    pub fn ride_to(&mut self, position: Position, now: u64) -> bool {
        self.motion.position = position;
        self.motion.hold(now);
        if self.state == ClientState::InTransit && position == self.destination {
            self.state = ClientState::Finished;
            return true;
        }
        false
    }

    /// Leave a taxi away from the destination: the request restarts from here.
    pub fn restart_from_current_position(&mut self) {
        self.origin = self.motion.position;
        self.state = ClientState::Waiting;
    }
}
