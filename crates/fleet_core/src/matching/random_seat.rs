use bevy_ecs::prelude::Entity;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::SimError;
use crate::route::MergePolicy;
use crate::scenario::NamedParams;

use super::algorithm::{DispatchAlgorithm, DispatchContext, StepResult};
use super::types::TaxiView;

pub const SEED: &str = "Seed";

/// Fill-random-seat matching: each waiting client goes to a uniformly random taxi that
/// still has a free seat. Seeded through the `Seed` parameter for reproducible runs.
#[derive(Debug)]
pub struct FillRandomSeat {
    rng: StdRng,
}

impl FillRandomSeat {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_params(params: &NamedParams) -> Result<Self, SimError> {
        Ok(Self::new(params.non_negative(SEED, 0)?))
    }
}

impl DispatchAlgorithm for FillRandomSeat {
    fn name(&self) -> &'static str {
        "fill-random-seat"
    }

    fn dispatch(&mut self, ctx: &mut DispatchContext<'_, '_, '_>, waiting: &[Entity]) -> StepResult {
        let mut open: Vec<Entity> = ctx
            .fleet_views()
            .into_iter()
            .filter(TaxiView::can_take_client)
            .map(|taxi| taxi.entity)
            .collect();
        if open.is_empty() {
            return StepResult::stop("no moving taxis with capacity");
        }

        for &client in waiting {
            let Some(&taxi) = open.choose(&mut self.rng) else {
                break;
            };
            if let Err(violation) = ctx.assign(taxi, client, MergePolicy::Concatenate) {
                return StepResult::exception(violation.to_string());
            }
            if !ctx.taxi_view(taxi).is_some_and(|view| view.has_capacity()) {
                open.retain(|candidate| *candidate != taxi);
            }
        }
        StepResult::found()
    }
}
