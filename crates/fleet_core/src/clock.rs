use bevy_ecs::prelude::Resource;

/// Default length of one simulation tick.
pub const DEFAULT_TICK: u64 = 1;

/// Monotonic simulation clock advanced in fixed ticks.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationClock {
    now: u64,
    tick: u64,
    ticks_elapsed: u64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }
}

impl SimulationClock {
    /// A clock starting at 0 that advances by `tick` per step (at least 1).
    pub fn with_tick(tick: u64) -> Self {
        Self {
            now: 0,
            tick: tick.max(1),
            ticks_elapsed: 0,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn ticks_elapsed(&self) -> u64 {
        self.ticks_elapsed
    }

    /// Advance by one tick and return the new time.
    pub fn advance(&mut self) -> u64 {
        self.now = self.now.saturating_add(self.tick);
        self.ticks_elapsed += 1;
        self.now
    }
}
