//! Scenario setup: generate a fleet and a client population from named parameters.

mod build;
mod params;

pub use build::{build_scenario, random_destination, random_position};
pub use params::{NamedParams, ScenarioParams};
