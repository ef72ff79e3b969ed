pub mod algorithm;
pub mod bearing;
pub mod distributed;
pub mod marginal_cost;
pub mod random_seat;
pub mod range_query;
pub mod registry;
pub mod simple;
pub mod types;

use bevy_ecs::prelude::Resource;

pub use algorithm::{
    next_step, ClientQuery, DispatchAlgorithm, DispatchContext, StepResult, StepStatus, TaxiQuery,
};
pub use bearing::GroupByBearing;
pub use distributed::{DistributedConfig, DistributedDispatch};
pub use marginal_cost::{cheapest_insertion, marginal_cost, INFEASIBLE};
pub use random_seat::FillRandomSeat;
pub use range_query::RangeQuery;
pub use registry::AlgorithmKind;
pub use simple::NearestTaxi;
pub use types::{Insertion, InsertionRequest, Offer, TaxiView};

/// Resource wrapper for the dispatch algorithm trait object.
#[derive(Resource)]
pub struct DispatchAlgorithmResource(pub Box<dyn DispatchAlgorithm>);

impl DispatchAlgorithmResource {
    pub fn new(algorithm: Box<dyn DispatchAlgorithm>) -> Self {
        Self(algorithm)
    }
}

impl std::ops::Deref for DispatchAlgorithmResource {
    type Target = dyn DispatchAlgorithm;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::ops::DerefMut for DispatchAlgorithmResource {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}
