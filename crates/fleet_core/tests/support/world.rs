#![allow(dead_code)]

use bevy_ecs::prelude::{Entity, World};
use fleet_core::ecs::Client;
use fleet_core::geometry::Position;
use fleet_core::matching::{
    AlgorithmKind, DispatchAlgorithm, DispatchAlgorithmResource, DistributedConfig,
    DistributedDispatch,
};
use fleet_core::runner::{insert_runtime_resources, RunnerConfig};
use fleet_core::scenario::NamedParams;
use fleet_core::taxi::Taxi;
use fleet_core::world::{spawn_client, spawn_taxi, WorldBounds};

/// Builder configuration for reproducible test worlds.
#[derive(Clone, Debug)]
pub struct TestWorldConfig {
    pub width: i32,
    pub height: i32,
    pub runner: RunnerConfig,
    pub algorithm: AlgorithmKind,
    pub params: NamedParams,
    /// Walking speed of clients added afterwards; 0 accepts any trip time.
    pub walk_speed: u32,
}

impl Default for TestWorldConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            runner: RunnerConfig::default(),
            algorithm: AlgorithmKind::Distributed,
            params: NamedParams::new().with("InitialSearchRadius", 100),
            walk_speed: 1,
        }
    }
}

/// Helper that populates the ECS world with all shared resources used in integration tests.
#[derive(Debug, Default)]
pub struct TestWorldBuilder {
    config: TestWorldConfig,
    taxis: Vec<Taxi>,
    clients: Vec<Client>,
}

impl TestWorldBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bounds(mut self, width: i32, height: i32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.config.runner = runner;
        self
    }

    /// Choose the dispatch policy and its named parameters.
    pub fn with_algorithm(mut self, algorithm: AlgorithmKind, params: NamedParams) -> Self {
        self.config.algorithm = algorithm;
        self.config.params = params;
        self
    }

    pub fn with_walk_speed(mut self, speed: u32) -> Self {
        self.config.walk_speed = speed;
        self
    }

    pub fn with_taxi(mut self, position: Position, capacity: usize, speed: u32) -> Self {
        let name = format!("taxi-{}", self.taxis.len());
        self.taxis.push(Taxi::new(name, capacity, position, speed));
        self
    }

    pub fn with_client(mut self, spawn_time: u64, origin: Position, destination: Position) -> Self {
        let name = format!("client-{}", self.clients.len());
        let walk_speed = self.config.walk_speed;
        self.clients
            .push(Client::new(name, spawn_time, origin, destination, walk_speed));
        self
    }

    /// Build the world; taxis and clients are returned in insertion order.
    pub fn build(self) -> (World, Vec<Entity>, Vec<Entity>) {
        let mut world = World::new();
        world.insert_resource(WorldBounds::new(self.config.width, self.config.height));
        insert_runtime_resources(&mut world, &self.config.runner);
        let algorithm = self
            .config
            .algorithm
            .build(&self.config.params)
            .expect("valid algorithm params");
        world.insert_resource(DispatchAlgorithmResource::new(algorithm));

        let taxis = self
            .taxis
            .into_iter()
            .map(|taxi| spawn_taxi(&mut world, taxi))
            .collect();
        let clients = self
            .clients
            .into_iter()
            .map(|client| spawn_client(&mut world, client))
            .collect();
        (world, taxis, clients)
    }
}

/// A distributed dispatcher with a fixed seed radius, sequential evaluation.
pub fn distributed(initial_radius: f64, factor: f64) -> Box<dyn DispatchAlgorithm> {
    Box::new(DistributedDispatch::new(DistributedConfig {
        initial_search_radius: initial_radius,
        radius_increase_factor: factor,
        parallel_evaluation: false,
        ..DistributedConfig::default()
    }))
}
