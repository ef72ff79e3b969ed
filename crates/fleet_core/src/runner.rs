//! Simulation runner: owns the world and schedule and exposes the run control surface.
//!
//! One [`Simulation::step`] is one tick: dispatch, clock advance, movement, then an optional
//! snapshot capture. External readers get [`WorldSnapshot`] copies and the [`EventBus`], never
//! the live world. A [`StopHandle`] stops a running simulation from another thread between
//! ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;
use tracing::{info, warn};

use crate::clock::SimulationClock;
use crate::error::SimError;
use crate::matching::{
    AlgorithmKind, DispatchAlgorithm, DispatchAlgorithmResource, StepResult, StepStatus,
};
use crate::profiling::DispatchTimings;
use crate::scenario::{build_scenario, NamedParams, ScenarioParams};
use crate::systems::{
    clock::advance_clock_system, dispatch::dispatch_system, movement::movement_system,
    telemetry_snapshot::capture_snapshot_system,
};
use crate::taxi::Taxi;
use crate::telemetry::{EventBus, SimCounts, SimEvent, SimSnapshotConfig, SimSnapshots, WorldSnapshot};
use crate::world::{
    is_complete, snapshot, Completion, LastStepResult, ViolationLog, ViolationPolicy, WorldBounds,
};

const DEFAULT_MAX_TICKS: u64 = 100_000;

/// Condition: snapshot interval has elapsed.
fn should_capture_snapshot(
    clock: Option<Res<SimulationClock>>,
    config: Option<Res<SimSnapshotConfig>>,
    snapshots: Option<Res<SimSnapshots>>,
) -> bool {
    let (Some(clock), Some(config), Some(snapshots)) = (clock, config, snapshots) else {
        return false;
    };
    match snapshots.last_snapshot_at {
        None => true,
        Some(last) => clock.now().saturating_sub(last) >= config.interval,
    }
}

/// Builds the per-tick schedule: dispatch, clock advance, movement, snapshot capture.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            dispatch_system,
            advance_clock_system,
            movement_system,
            capture_snapshot_system.run_if(should_capture_snapshot),
        )
            .chain(),
    );
    schedule
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Upper bound on ticks per [`Simulation::start`] call.
    pub max_ticks: u64,
    pub tick: u64,
    pub violation_policy: ViolationPolicy,
    /// End the run on the first [`StepStatus::Exception`] instead of retrying next tick.
    pub stop_on_exception: bool,
    pub completion: Completion,
    pub snapshots: SimSnapshotConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_ticks: DEFAULT_MAX_TICKS,
            tick: 1,
            violation_policy: ViolationPolicy::default(),
            stop_on_exception: false,
            completion: Completion::default(),
            snapshots: SimSnapshotConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation_policy = policy;
        self
    }

    pub fn with_stop_on_exception(mut self, stop: bool) -> Self {
        self.stop_on_exception = stop;
        self
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }
}

/// Insert every resource the schedule needs, keeping ones the world already has
/// (clock, bounds, events).
pub fn insert_runtime_resources(world: &mut World, config: &RunnerConfig) {
    if !world.contains_resource::<SimulationClock>() {
        world.insert_resource(SimulationClock::with_tick(config.tick));
    }
    if !world.contains_resource::<WorldBounds>() {
        world.insert_resource(WorldBounds::default());
    }
    world.init_resource::<EventBus>();
    world.insert_resource(ViolationLog::new(config.violation_policy));
    world.insert_resource(config.completion);
    world.insert_resource(DispatchTimings::default());
    world.insert_resource(LastStepResult::default());
    world.insert_resource(config.snapshots);
    world.insert_resource(SimSnapshots::default());
}

/// Cloneable handle that asks a running simulation to stop before its next tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The completion predicate holds.
    Completed,
    /// A [`StopHandle`] was triggered.
    Stopped,
    /// `max_ticks` ran out first.
    TickLimit,
    /// The policy raised an exception and `stop_on_exception` is set.
    Exception(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub ticks: u64,
    pub end_time: u64,
    pub counts: SimCounts,
    pub total_travel_distance: f64,
    /// Dispatch steps that reported an exception.
    pub exceptions: u64,
    /// Violations skipped under [`ViolationPolicy::LogAndContinue`].
    pub skipped_violations: usize,
}

pub struct Simulation {
    world: World,
    schedule: Schedule,
    config: RunnerConfig,
    stop: StopHandle,
    algorithm: &'static str,
    exceptions: u64,
}

impl Simulation {
    /// Generate a scenario and set up `algorithm` with its named parameters.
    pub fn init(
        scenario: &ScenarioParams,
        algorithm: AlgorithmKind,
        params: &NamedParams,
        config: RunnerConfig,
    ) -> Result<Self, SimError> {
        let mut world = World::new();
        build_scenario(&mut world, scenario)?;
        world.insert_resource(SimulationClock::with_tick(config.tick));
        Ok(Self::from_world(world, algorithm.build(params)?, config))
    }

    /// Run `algorithm` over an already populated world.
    pub fn from_world(
        mut world: World,
        algorithm: Box<dyn DispatchAlgorithm>,
        config: RunnerConfig,
    ) -> Self {
        insert_runtime_resources(&mut world, &config);
        let name = algorithm.name();
        world.insert_resource(DispatchAlgorithmResource::new(algorithm));
        Self {
            world,
            schedule: simulation_schedule(),
            config,
            stop: StopHandle::default(),
            algorithm: name,
            exceptions: 0,
        }
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm
    }

    pub fn now(&self) -> u64 {
        self.world
            .get_resource::<SimulationClock>()
            .map(SimulationClock::now)
            .unwrap_or_default()
    }

    /// Run one tick.
    ///
    /// Returns the dispatch outcome, or the violation that made this tick fatal.
    pub fn step(&mut self) -> Result<StepResult, SimError> {
        self.schedule.run(&mut self.world);

        if let Some(violation) = self.world.resource_mut::<ViolationLog>().take_fatal() {
            return Err(SimError::StateViolation {
                time: self.now(),
                violation,
            });
        }
        let result = self
            .world
            .resource::<LastStepResult>()
            .0
            .clone()
            .unwrap_or_else(|| StepResult::stop("nothing to do"));
        if result.status == StepStatus::Exception {
            self.exceptions += 1;
        }
        Ok(result)
    }

    /// Run until completion, a stop request, an exception (if configured) or the tick limit.
    pub fn start(&mut self) -> Result<RunSummary, SimError> {
        self.run(None)
    }

    /// Like [`Simulation::start`], calling `hook` with a snapshot after every tick.
    pub fn start_with_hook<F>(&mut self, mut hook: F) -> Result<RunSummary, SimError>
    where
        F: FnMut(&WorldSnapshot, &StepResult),
    {
        self.run(Some(&mut hook))
    }

    fn run(
        &mut self,
        hook: Option<&mut dyn FnMut(&WorldSnapshot, &StepResult)>,
    ) -> Result<RunSummary, SimError> {
        info!(
            algorithm = self.algorithm,
            max_ticks = self.config.max_ticks,
            start = self.now(),
            "simulation started"
        );

        let mut ticks = 0;
        let outcome = self.run_ticks(hook, &mut ticks);
        // A stop request ends one run; the next start resumes.
        self.stop.reset();

        let summary = self.summary(ticks, outcome?);
        info!(
            algorithm = self.algorithm,
            outcome = ?summary.outcome,
            ticks = summary.ticks,
            end_time = summary.end_time,
            finished = summary.counts.clients_finished,
            "simulation finished"
        );
        Ok(summary)
    }

    fn run_ticks(
        &mut self,
        mut hook: Option<&mut dyn FnMut(&WorldSnapshot, &StepResult)>,
        ticks: &mut u64,
    ) -> Result<RunOutcome, SimError> {
        loop {
            if self.stop.is_stopped() {
                return Ok(RunOutcome::Stopped);
            }
            if self.is_finished() {
                return Ok(RunOutcome::Completed);
            }
            if *ticks >= self.config.max_ticks {
                return Ok(RunOutcome::TickLimit);
            }

            let result = self.step()?;
            *ticks += 1;
            if let Some(hook) = hook.as_mut() {
                let snapshot = self.snapshot();
                hook(&snapshot, &result);
            }

            if result.status == StepStatus::Exception {
                let message = result.message.unwrap_or_default();
                if self.config.stop_on_exception {
                    return Ok(RunOutcome::Exception(message));
                }
                warn!(time = self.now(), %message, "dispatch exception, retrying next tick");
            }
        }
    }

    fn summary(&mut self, ticks: u64, outcome: RunOutcome) -> RunSummary {
        let counts = self.snapshot().counts();
        let total_travel_distance = self
            .world
            .query::<&Taxi>()
            .iter(&self.world)
            .map(|taxi| taxi.travel_distance)
            .sum();
        RunSummary {
            outcome,
            ticks,
            end_time: self.now(),
            counts,
            total_travel_distance,
            exceptions: self.exceptions,
            skipped_violations: self.world.resource::<ViolationLog>().recorded().len(),
        }
    }

    /// Ask the run to stop before its next tick.
    ///
    /// A request made before [`Simulation::start`] ends that run at once.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&mut self) -> bool {
        is_complete(&mut self.world)
    }

    pub fn snapshot(&mut self) -> WorldSnapshot {
        snapshot(&mut self.world)
    }

    pub fn events(&self) -> &EventBus {
        self.world.resource::<EventBus>()
    }

    /// Receive every event published from now on, e.g. on another thread.
    pub fn subscribe(&mut self) -> Receiver<SimEvent> {
        self.world.resource_mut::<EventBus>().subscribe()
    }

    pub fn timings(&self) -> &DispatchTimings {
        self.world.resource::<DispatchTimings>()
    }

    pub fn snapshots(&self) -> &SimSnapshots {
        self.world.resource::<SimSnapshots>()
    }

    /// Live world access for tests; other readers use [`Simulation::snapshot`].
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[cfg(any(test, feature = "test-helpers"))]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
