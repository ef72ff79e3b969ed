use bevy_ecs::prelude::Entity;
use tracing::debug;

use crate::geometry::distance_sq;
use crate::route::MergePolicy;

use super::algorithm::{DispatchAlgorithm, DispatchContext, StepResult};
use super::types::TaxiView;

/// Nearest-taxi matching: each waiting client goes to the closest taxi with a free seat.
///
/// Clients are served in waiting order; the route grows by plain concatenation. Distance is
/// measured from the taxi's current position, whatever it is doing.
#[derive(Debug, Default)]
pub struct NearestTaxi;

impl DispatchAlgorithm for NearestTaxi {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn dispatch(&mut self, ctx: &mut DispatchContext<'_, '_, '_>, waiting: &[Entity]) -> StepResult {
        let mut fleet: Vec<TaxiView> = ctx
            .fleet_views()
            .into_iter()
            .filter(TaxiView::can_take_client)
            .collect();
        if fleet.is_empty() {
            return StepResult::stop("no moving taxis with capacity");
        }

        let mut assignments = 0;
        for &client in waiting {
            if fleet.is_empty() {
                break;
            }
            let Some(origin) = ctx.client(client).map(|c| c.origin) else {
                continue;
            };
            let Some(index) = fleet
                .iter()
                .enumerate()
                .min_by_key(|(_, taxi)| distance_sq(taxi.position, origin))
                .map(|(index, _)| index)
            else {
                return StepResult::exception(format!("no nearest taxi found for client {client:?}"));
            };

            let taxi = fleet[index].entity;
            if let Err(violation) = ctx.assign(taxi, client, MergePolicy::Concatenate) {
                return StepResult::exception(violation.to_string());
            }
            assignments += 1;

            match ctx.taxi_view(taxi) {
                Some(view) if view.has_capacity() => fleet[index] = view,
                _ => {
                    fleet.remove(index);
                }
            }
        }

        debug!(assignments, "nearest-taxi dispatch");
        StepResult::found()
    }
}
