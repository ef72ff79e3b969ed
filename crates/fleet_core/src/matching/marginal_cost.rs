//! Insertion heuristic: the cheapest feasible place for a pickup/dropoff pair in a route.
//!
//! Every pair of original indices `(i, j)` with `i <= j` is tried, building
//! `route[..i] + pickup + route[i..j] + dropoff + route[j..]`. A candidate is feasible when
//! the seat count never exceeds capacity while replaying it and the new client's wait plus
//! ride time stays within its maximum trip time. The cost is the added route length.

use crate::geometry::{distance, path_length};
use crate::route::{OrderNode, StopKind};

use super::types::{Insertion, InsertionRequest, TaxiView};

/// Marginal cost of a request no route can take.
pub const INFEASIBLE: f64 = f64::INFINITY;

/// Search all insertion pairs; ties keep the first pair in `(i, j)` order.
pub fn cheapest_insertion(view: &TaxiView, request: &InsertionRequest) -> Option<Insertion> {
    if view.speed == 0 {
        return None;
    }
    let speed = f64::from(view.speed);
    let route = &view.route;
    let n = route.len();
    let original = path_length(view.position, view.stop_positions());

    let pickup = OrderNode::pickup(request.client, request.pickup);
    let dropoff = OrderNode::dropoff(request.client, request.dropoff);

    let mut best: Option<Insertion> = None;
    let mut candidate = Vec::with_capacity(n + 2);
    for i in 0..=n {
        for j in i..=n {
            candidate.clear();
            candidate.extend_from_slice(&route[..i]);
            candidate.push(pickup);
            candidate.extend_from_slice(&route[i..j]);
            candidate.push(dropoff);
            candidate.extend_from_slice(&route[j..]);

            if !respects_capacity(&candidate, view.contained.len(), view.capacity) {
                continue;
            }
            let Some(length) = timed_length(view, &candidate, i, j + 1, speed, request) else {
                continue;
            };

            let cost = (length - original).max(0.0);
            if best.map_or(true, |b| cost < b.cost) {
                best = Some(Insertion {
                    cost,
                    pickup_index: i,
                    dropoff_index: j,
                });
            }
        }
    }
    best
}

/// [`cheapest_insertion`] cost, or [`INFEASIBLE`].
pub fn marginal_cost(view: &TaxiView, request: &InsertionRequest) -> f64 {
    cheapest_insertion(view, request).map_or(INFEASIBLE, |insertion| insertion.cost)
}

/// Replay the route from the current load. Stops sharing a position are handled as one
/// group: drop-offs first, then pickups.
fn respects_capacity(route: &[OrderNode], onboard: usize, capacity: usize) -> bool {
    if onboard > capacity {
        return false;
    }
    let mut onboard = onboard;
    let mut start = 0;
    while start < route.len() {
        let position = route[start].position;
        let end = route[start..]
            .iter()
            .position(|node| node.position != position)
            .map_or(route.len(), |offset| start + offset);
        let group = &route[start..end];

        let dropoffs = group.iter().filter(|n| n.kind == StopKind::Dropoff).count();
        let pickups = group.len() - dropoffs;
        onboard = onboard.saturating_sub(dropoffs) + pickups;
        if onboard > capacity {
            return false;
        }
        start = end;
    }
    true
}

/// Total length of `route`, or `None` when the new client's trip takes too long.
fn timed_length(
    view: &TaxiView,
    route: &[OrderNode],
    pickup_at: usize,
    dropoff_at: usize,
    speed: f64,
    request: &InsertionRequest,
) -> Option<f64> {
    let mut current = view.position;
    let mut travelled = 0.0;
    let mut to_pickup = 0.0;
    let mut to_dropoff = 0.0;
    for (index, node) in route.iter().enumerate() {
        travelled += distance(current, node.position);
        current = node.position;
        if index == pickup_at {
            to_pickup = travelled;
        }
        if index == dropoff_at {
            to_dropoff = travelled;
        }
    }

    let wait = to_pickup / speed;
    let ride = (to_dropoff - to_pickup) / speed;
    (wait + ride <= request.max_trip_time).then_some(travelled)
}

#[cfg(test)]
mod tests {
    use bevy_ecs::prelude::Entity;

    use super::*;
    use crate::geometry::Position;

    fn view(position: (i32, i32), capacity: usize, route: Vec<OrderNode>) -> TaxiView {
        TaxiView {
            entity: Entity::from_raw(1),
            position: position.into(),
            speed: 1,
            capacity,
            contained: Vec::new(),
            planned: 0,
            route,
        }
    }

    fn request(pickup: (i32, i32), dropoff: (i32, i32)) -> InsertionRequest {
        InsertionRequest {
            client: Entity::from_raw(50),
            pickup: pickup.into(),
            dropoff: dropoff.into(),
            max_trip_time: f64::INFINITY,
        }
    }

    #[test]
    fn empty_route_costs_approach_plus_trip() {
        let taxi = view((0, 0), 1, Vec::new());
        let insertion = cheapest_insertion(&taxi, &request((3, 4), (3, 10))).expect("feasible");

        assert_eq!(insertion.cost, 5.0 + 6.0);
        assert_eq!((insertion.pickup_index, insertion.dropoff_index), (0, 0));
    }

    #[test]
    fn pickup_before_existing_stop_and_dropoff_after() {
        let other = Entity::from_raw(9);
        let taxi = view((0, 0), 2, vec![OrderNode::pickup(other, Position::new(5, 0))]);

        let insertion = cheapest_insertion(&taxi, &request((0, 0), (10, 0))).expect("feasible");
        assert_eq!((insertion.pickup_index, insertion.dropoff_index), (0, 1));
        assert_eq!(insertion.cost, 5.0);
        assert_eq!(marginal_cost(&taxi, &request((0, 0), (10, 0))), 5.0);
    }

    #[test]
    fn capacity_replay_rejects_overlapping_rides() {
        let other = Entity::from_raw(9);
        let mut taxi = view(
            (0, 0),
            1,
            vec![
                OrderNode::pickup(other, Position::new(2, 0)),
                OrderNode::dropoff(other, Position::new(8, 0)),
            ],
        );

        // Only a trip entirely before or after the other client fits in one seat; both cost
        // the same, so the earlier pair wins.
        let insertion = cheapest_insertion(&taxi, &request((3, 0), (6, 0))).expect("feasible");
        assert_eq!((insertion.pickup_index, insertion.dropoff_index), (0, 0));
        assert_eq!(insertion.cost, 8.0);

        taxi.contained.push(Entity::from_raw(10));
        taxi.route = vec![OrderNode::dropoff(Entity::from_raw(10), Position::new(4, 0))];
        let insertion = cheapest_insertion(&taxi, &request((4, 0), (6, 0))).expect("feasible");
        // Drop-off and pickup at the same stop swap the seat.
        assert_eq!((insertion.pickup_index, insertion.dropoff_index), (0, 1));
        assert_eq!(insertion.cost, 2.0);
    }

    #[test]
    fn trip_time_limit_makes_detours_infeasible() {
        let other = Entity::from_raw(9);
        let taxi = view(
            (0, 0),
            3,
            vec![
                OrderNode::pickup(other, Position::new(0, 20)),
                OrderNode::dropoff(other, Position::new(0, 40)),
            ],
        );
        let mut tight = request((1, 0), (5, 0));
        tight.max_trip_time = 5.0;

        let insertion = cheapest_insertion(&taxi, &tight).expect("direct insertion fits");
        assert_eq!((insertion.pickup_index, insertion.dropoff_index), (0, 0));

        tight.max_trip_time = 4.0;
        assert!(cheapest_insertion(&taxi, &tight).is_none());
        assert_eq!(marginal_cost(&taxi, &tight), INFEASIBLE);
    }

    #[test]
    fn stationary_taxi_is_infeasible() {
        let mut taxi = view((0, 0), 1, Vec::new());
        taxi.speed = 0;
        assert_eq!(marginal_cost(&taxi, &request((1, 0), (2, 0))), INFEASIBLE);
    }

    #[test]
    fn detour_along_existing_path_is_free() {
        let other = Entity::from_raw(9);
        let taxi = view((0, 0), 2, vec![OrderNode::dropoff(other, Position::new(10, 0))]);
        let insertion = cheapest_insertion(&taxi, &request((2, 0), (5, 0))).expect("feasible");
        assert_eq!(insertion.cost, 0.0);
        assert_eq!((insertion.pickup_index, insertion.dropoff_index), (0, 0));
    }
}
