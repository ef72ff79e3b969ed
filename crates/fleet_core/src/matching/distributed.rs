//! Adaptive dispatch: range query, insertion pricing and per-client search radius growth.
//!
//! Each waiting client keeps a search radius across ticks. A tick queries the fleet within
//! that radius, prices every candidate with the insertion heuristic and assigns the cheapest
//! offer. A client nobody can take gets a larger radius for the next tick, up to the
//! farthest pickup that could still beat walking.
//!
//! Candidates are priced independently, optionally on the rayon pool. The tick also records
//! how long a fully parallel deployment would have taken: the slowest range query plus the
//! slowest single pricing, next to the real wall time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bevy_ecs::prelude::Entity;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::SimError;
use crate::geometry::{distance, Position};
use crate::profiling::TickTiming;
use crate::scenario::NamedParams;

use super::algorithm::{DispatchAlgorithm, DispatchContext, StepResult};
use super::marginal_cost::cheapest_insertion;
use super::range_query::RangeQuery;
use super::types::{InsertionRequest, Offer, TaxiView};

pub const INITIAL_SEARCH_RADIUS: &str = "InitialSearchRadius";
pub const RADIUS_INCREASE_FACTOR: &str = "RadiusIncreaseFactor";
pub const CALCULATE_FULL_TAXIS: &str = "CalculateFullTaxis";
pub const PARALLEL_EVALUATION: &str = "ParallelEvaluation";

const DEFAULT_INITIAL_SEARCH_RADIUS: i64 = 10;
const DEFAULT_RADIUS_INCREASE_FACTOR: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributedConfig {
    pub initial_search_radius: f64,
    /// Multiplier applied to the radius after a tick without a match (at least 1).
    pub radius_increase_factor: f64,
    /// Price taxis without a free seat too; they can still never be assigned.
    pub calculate_full_taxis: bool,
    pub parallel_evaluation: bool,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            initial_search_radius: DEFAULT_INITIAL_SEARCH_RADIUS as f64,
            radius_increase_factor: DEFAULT_RADIUS_INCREASE_FACTOR as f64,
            calculate_full_taxis: false,
            parallel_evaluation: true,
        }
    }
}

impl DistributedConfig {
    pub fn from_params(params: &NamedParams) -> Result<Self, SimError> {
        let initial = params.non_negative(
            INITIAL_SEARCH_RADIUS,
            DEFAULT_INITIAL_SEARCH_RADIUS as u64,
        )?;
        let factor = params.get_or(RADIUS_INCREASE_FACTOR, DEFAULT_RADIUS_INCREASE_FACTOR);
        if factor < 1 {
            return Err(SimError::InvalidParameter {
                name: RADIUS_INCREASE_FACTOR.to_string(),
                reason: format!("must be >= 1, got {factor}"),
            });
        }
        Ok(Self {
            initial_search_radius: initial as f64,
            radius_increase_factor: factor as f64,
            calculate_full_taxis: params.flag(CALCULATE_FULL_TAXIS, false),
            parallel_evaluation: params.flag(PARALLEL_EVALUATION, true),
        })
    }
}

/// Farthest pickup distance at which riding can still beat walking.
///
/// With walking time `d / walk` and riding time `(p + d) / taxi` for pickup distance `p`,
/// riding wins while `p <= d * (taxi / walk - 1)`. A taxi no faster than walking gets 0;
/// a client that cannot walk accepts any distance.
pub fn radius_cap(origin: Position, destination: Position, taxi_speed: u32, walk_speed: u32) -> f64 {
    if walk_speed == 0 {
        return f64::INFINITY;
    }
    if taxi_speed <= walk_speed {
        return 0.0;
    }
    distance(origin, destination) * (f64::from(taxi_speed) / f64::from(walk_speed) - 1.0)
}

/// Next radius after an unmatched tick: multiply by `factor`, grow by at least 1, stay under `cap`.
pub fn grow_radius(radius: f64, factor: f64, cap: f64) -> f64 {
    (radius * factor).max(radius + 1.0).min(cap)
}

#[derive(Debug, Default)]
pub struct DistributedDispatch {
    config: DistributedConfig,
    radii: HashMap<Entity, f64>,
}

impl DistributedDispatch {
    pub fn new(config: DistributedConfig) -> Self {
        Self {
            config,
            radii: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DistributedConfig {
        &self.config
    }

    /// Current search radius of a waiting `client`, once it has been considered.
    ///
    /// An assigned client has none; if it waits again its radius starts from the seed.
    pub fn radius(&self, client: Entity) -> Option<f64> {
        self.radii.get(&client).copied()
    }

    fn price(
        &self,
        candidates: &[&TaxiView],
        request: &InsertionRequest,
    ) -> Vec<(Option<Offer>, Duration)> {
        let evaluate = |view: &&TaxiView| {
            let started = Instant::now();
            let offer = cheapest_insertion(view, request).map(|insertion| Offer {
                taxi: view.entity,
                insertion,
            });
            trace!(
                taxi = ?view.entity,
                client = ?request.client,
                cost = offer.map(|o| o.insertion.cost),
                "priced candidate"
            );
            (offer, started.elapsed())
        };
        if self.config.parallel_evaluation {
            candidates.par_iter().map(evaluate).collect()
        } else {
            candidates.iter().map(evaluate).collect()
        }
    }
}

impl DispatchAlgorithm for DistributedDispatch {
    fn name(&self) -> &'static str {
        "distributed"
    }

    fn dispatch(&mut self, ctx: &mut DispatchContext<'_, '_, '_>, waiting: &[Entity]) -> StepResult {
        let started = Instant::now();
        let mut fleet = ctx.fleet_views();
        let fastest = fleet.iter().map(|taxi| taxi.speed).max().unwrap_or(0);
        let mut tick = TickTiming {
            time: ctx.now(),
            clients: waiting.len(),
            ..TickTiming::default()
        };

        for &client in waiting {
            let Some((request, walk_speed)) = ctx
                .client(client)
                .map(|c| (InsertionRequest::for_client(client, c), c.motion.speed))
            else {
                continue;
            };
            let cap = radius_cap(request.pickup, request.dropoff, fastest, walk_speed);
            let seed = self.config.initial_search_radius.min(cap);
            let radius = *self.radii.entry(client).or_insert(seed);

            let query_started = Instant::now();
            let query = RangeQuery::new(request.pickup, request.dropoff, radius)
                .including_full(self.config.calculate_full_taxis);
            let candidates = query.candidates(&fleet);
            let query_time = query_started.elapsed();
            ctx.timings().record_range_query(query_time);
            tick.rqs_bottleneck = tick.rqs_bottleneck.max(query_time);
            tick.candidates += candidates.len();

            let mut offers = Vec::with_capacity(candidates.len());
            for (offer, cost_time) in self.price(&candidates, &request) {
                ctx.timings().record_marginal_cost(cost_time);
                tick.cost_bottleneck = tick.cost_bottleneck.max(cost_time);
                offers.extend(offer);
            }
            offers.sort_by(|a, b| a.insertion.cost.total_cmp(&b.insertion.cost));

            let mut assigned = None;
            for offer in offers {
                match ctx.assign(offer.taxi, client, offer.insertion.merge_policy()) {
                    Ok(()) => {
                        assigned = Some(offer);
                        break;
                    }
                    Err(violation) => {
                        debug!(taxi = ?offer.taxi, client = ?client, %violation, "offer rejected");
                    }
                }
            }

            match assigned {
                Some(offer) => {
                    self.radii.remove(&client);
                    tick.assignments += 1;
                    if let Some(view) = ctx.taxi_view(offer.taxi) {
                        if let Some(slot) = fleet.iter_mut().find(|t| t.entity == offer.taxi) {
                            *slot = view;
                        }
                    }
                }
                None => {
                    let grown = grow_radius(radius, self.config.radius_increase_factor, cap);
                    debug!(client = ?client, radius, grown, cap, "no feasible offer, growing radius");
                    self.radii.insert(client, grown);
                }
            }
        }

        tick.wall = started.elapsed();
        ctx.timings().push_tick(tick);

        if tick.assignments > 0 {
            StepResult::found()
        } else {
            StepResult::stop(format!(
                "no feasible match for {} waiting clients",
                waiting.len()
            ))
        }
    }
}
