//! Planar geometry on an integer grid.
//!
//! This module provides:
//!
//! - **Position**: integer `(x, y)` coordinate used by taxis, clients and stops
//! - **Distances**: Euclidean distance with `i64` squared terms
//! - **Bounded movement**: step toward a target without overshooting
//! - **Bearing**: compass-style angle in degrees, normalized into `[0, 360)`
//! - **Segment distance**: point-to-segment squared distance for range queries

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Position) -> f64 {
        distance(self, other)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Squared Euclidean distance. Widened to `i64` so coordinates near `i32::MAX` do not overflow.
pub fn distance_sq(a: Position, b: Position) -> i64 {
    let dx = i64::from(b.x) - i64::from(a.x);
    let dy = i64::from(b.y) - i64::from(a.y);
    dx * dx + dy * dy
}

pub fn distance(a: Position, b: Position) -> f64 {
    (distance_sq(a, b) as f64).sqrt()
}

/// Move from `from` toward `to` by at most `max_dist`.
///
/// Returns `to` exactly when it is within reach, otherwise the integer-rounded point
/// `max_dist` along the unit vector from `from` to `to`.
pub fn move_towards(from: Position, to: Position, max_dist: f64) -> Position {
    let total = distance(from, to);
    if total <= max_dist {
        return to;
    }
    if max_dist <= 0.0 {
        return from;
    }

    let ratio = max_dist / total;
    let dx = (f64::from(to.x) - f64::from(from.x)) * ratio;
    let dy = (f64::from(to.y) - f64::from(from.y)) * ratio;
    Position {
        x: (f64::from(from.x) + dx).round() as i32,
        y: (f64::from(from.y) + dy).round() as i32,
    }
}

/// Angle of the vector `a -> b` in degrees, in `[0, 360)`. East is 0, north (+y) is 90.
pub fn bearing(a: Position, b: Position) -> f64 {
    let dx = f64::from(b.x) - f64::from(a.x);
    let dy = f64::from(b.y) - f64::from(a.y);
    let degrees = dy.atan2(dx).to_degrees();
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs due to rounding
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Smallest absolute difference between two bearings, in `[0, 180]`.
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

/// Squared distance from `p` to the closed segment `a-b`.
///
/// Projects `p` onto the segment, clamping the projection parameter to `[0, 1]`, so points
/// beyond either end measure against the nearest endpoint.
pub fn point_segment_distance_sq(p: Position, a: Position, b: Position) -> f64 {
    let (px, py) = (f64::from(p.x), f64::from(p.y));
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));

    let abx = bx - ax;
    let aby = by - ay;
    let length_sq = abx * abx + aby * aby;
    if length_sq == 0.0 {
        return distance_sq(p, a) as f64;
    }

    let t = (((px - ax) * abx + (py - ay) * aby) / length_sq).clamp(0.0, 1.0);
    let cx = ax + t * abx;
    let cy = ay + t * aby;
    (px - cx) * (px - cx) + (py - cy) * (py - cy)
}

/// Minimum squared distance from `p` to the polyline through `points`.
///
/// A single point degenerates to the point distance; an empty polyline is infinitely far.
pub fn polyline_distance_sq(p: Position, points: &[Position]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => distance_sq(p, *only) as f64,
        _ => points
            .windows(2)
            .map(|segment| point_segment_distance_sq(p, segment[0], segment[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Sum of consecutive distances along `start -> points[0] -> points[1] -> ...`.
pub fn path_length(start: Position, points: impl IntoIterator<Item = Position>) -> f64 {
    let mut current = start;
    let mut total = 0.0;
    for next in points {
        total += distance(current, next);
        current = next;
    }
    total
}
