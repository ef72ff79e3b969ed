pub mod clock;
pub mod ecs;
pub mod error;
pub mod geometry;
pub mod matching;
pub mod profiling;
pub mod route;
pub mod runner;
pub mod scenario;
pub mod systems;
pub mod taxi;
pub mod telemetry;
pub mod world;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
