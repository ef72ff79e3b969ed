use bevy_ecs::prelude::Entity;
use tracing::trace;

use crate::geometry::{bearing, bearing_difference, distance_sq, Position};
use crate::route::MergePolicy;
use crate::scenario::NamedParams;

use super::algorithm::{DispatchAlgorithm, DispatchContext, StepResult};
use super::types::TaxiView;

pub const BEARING_TOLERANCE: &str = "BearingTolerance";

const DEFAULT_TOLERANCE_DEGREES: f64 = 45.0;

/// Group-by-bearing matching: clients ride with taxis already heading their way.
///
/// A taxi is heading the client's way when the bearing from its position to its last stop is
/// within the tolerance of the client's trip bearing. The nearest such taxi wins; without one
/// the nearest taxi with a free seat is used. Routes are merged round-robin so grouped clients
/// share the trip.
#[derive(Debug)]
pub struct GroupByBearing {
    tolerance: f64,
}

impl Default for GroupByBearing {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE_DEGREES,
        }
    }
}

impl GroupByBearing {
    pub fn new(tolerance_degrees: f64) -> Self {
        Self {
            tolerance: tolerance_degrees.clamp(0.0, 180.0),
        }
    }

    pub fn from_params(params: &NamedParams) -> Self {
        Self::new(params.get_or(BEARING_TOLERANCE, DEFAULT_TOLERANCE_DEGREES as i64) as f64)
    }

    fn heading_matches(&self, taxi: &TaxiView, trip_bearing: Option<f64>) -> bool {
        match (taxi.heading(), trip_bearing) {
            (Some(heading), Some(trip)) => bearing_difference(heading, trip) <= self.tolerance,
            _ => false,
        }
    }
}

impl DispatchAlgorithm for GroupByBearing {
    fn name(&self) -> &'static str {
        "group-by-bearing"
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

        for &client in waiting {
            let Some((origin, destination)) = ctx.client(client).map(|c| (c.origin, c.destination))
            else {
                continue;
            };
            let trip_bearing = (origin != destination).then(|| bearing(origin, destination));

            let aligned = nearest_index(
                fleet
                    .iter()
                    .enumerate()
                    .filter(|(_, taxi)| self.heading_matches(taxi, trip_bearing)),
                origin,
            );
            let Some(index) = aligned.or_else(|| nearest_index(fleet.iter().enumerate(), origin))
            else {
                break;
            };

            let taxi = fleet[index].entity;
            trace!(taxi = ?taxi, client = ?client, aligned = aligned.is_some(), "bearing match");
            if let Err(violation) = ctx.assign(taxi, client, MergePolicy::RoundRobin) {
                return StepResult::exception(violation.to_string());
            }

            match ctx.taxi_view(taxi) {
                Some(view) if view.has_capacity() => fleet[index] = view,
                _ => {
                    fleet.remove(index);
                }
            }
        }
        StepResult::found()
    }
}

fn nearest_index<'a>(
    taxis: impl Iterator<Item = (usize, &'a TaxiView)>,
    origin: Position,
) -> Option<usize> {
    taxis
        .min_by_key(|(_, taxi)| distance_sq(taxi.position, origin))
        .map(|(index, _)| index)
}
