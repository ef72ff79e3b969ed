//! Range query: which taxis pass close enough to a client to be worth pricing.
//!
//! Idle taxis are tested by straight distance. En-route taxis are tested against the polyline
//! through their position and remaining stops, an approximation of whether the planned path
//! passes near the client.

use tracing::trace;

use crate::geometry::{distance_sq, polyline_distance_sq, Position};

use super::types::TaxiView;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeQuery {
    pub start: Position,
    pub destination: Position,
    pub radius: f64,
    /// Also report taxis without a free seat.
    pub include_full: bool,
}

impl RangeQuery {
    pub fn new(start: Position, destination: Position, radius: f64) -> Self {
        Self {
            start,
            destination,
            radius,
            include_full: false,
        }
    }

    pub fn including_full(mut self, include_full: bool) -> Self {
        self.include_full = include_full;
        self
    }

    pub fn matches(&self, taxi: &TaxiView) -> bool {
        if !self.include_full && !taxi.has_capacity() {
            return false;
        }
        if self.radius < 0.0 {
            return false;
        }
        let radius_sq = self.radius * self.radius;
        if taxi.is_idle() {
            return distance_sq(taxi.position, self.start) as f64 <= radius_sq;
        }

        let mut path = Vec::with_capacity(taxi.route.len() + 1);
        path.push(taxi.position);
        path.extend(taxi.stop_positions());
        polyline_distance_sq(self.start, &path) <= radius_sq
    }

    /// Candidates among `fleet`, in fleet order.
    pub fn candidates<'a>(&self, fleet: &'a [TaxiView]) -> Vec<&'a TaxiView> {
        let found: Vec<&TaxiView> = fleet.iter().filter(|taxi| self.matches(taxi)).collect();
        trace!(
            start = %self.start,
            destination = %self.destination,
            radius = self.radius,
            candidates = found.len(),
            "range query"
        );
        found
    }
}
