use bevy_ecs::prelude::{Entity, Query};
use tracing::debug;

use crate::ecs::Client;
use crate::error::StateViolation;
use crate::profiling::DispatchTimings;
use crate::route::MergePolicy;
use crate::taxi::Taxi;

use super::types::TaxiView;

pub type TaxiQuery<'w, 's> = Query<'w, 's, (Entity, &'static mut Taxi)>;
pub type ClientQuery<'w, 's> = Query<'w, 's, (Entity, &'static mut Client)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// The step ran; zero or more assignments were made.
    Found,
    /// Nothing could be assigned this step.
    Stop,
    /// The policy hit an inconsistency it cannot recover from.
    Exception,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub status: StepStatus,
    pub message: Option<String>,
}

impl StepResult {
    pub fn found() -> Self {
        Self {
            status: StepStatus::Found,
            message: None,
        }
    }

    pub fn stop(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Stop,
            message: Some(message.into()),
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Exception,
            message: Some(message.into()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == StepStatus::Found
    }
}

/// Everything a policy may read or change during one dispatch step.
///
/// Policies read the fleet through [`TaxiView`] copies and change it only through
/// [`DispatchContext::assign`], so the seat reservation invariant is checked in one place.
pub struct DispatchContext<'a, 'w, 's> {
    now: u64,
    taxis: &'a mut TaxiQuery<'w, 's>,
    clients: &'a mut ClientQuery<'w, 's>,
    timings: &'a mut DispatchTimings,
}

impl<'a, 'w, 's> DispatchContext<'a, 'w, 's> {
    pub fn new(
        now: u64,
        taxis: &'a mut TaxiQuery<'w, 's>,
        clients: &'a mut ClientQuery<'w, 's>,
        timings: &'a mut DispatchTimings,
    ) -> Self {
        Self {
            now,
            taxis,
            clients,
            timings,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Views of the whole fleet, ordered by entity.
    pub fn fleet_views(&self) -> Vec<TaxiView> {
        let mut views: Vec<TaxiView> = self
            .taxis
            .iter()
            .map(|(entity, taxi)| TaxiView::from_taxi(entity, taxi))
            .collect();
        views.sort_by_key(|view| view.entity);
        views
    }

    pub fn taxi_view(&self, entity: Entity) -> Option<TaxiView> {
        self.taxis
            .get(entity)
            .ok()
            .map(|(entity, taxi)| TaxiView::from_taxi(entity, taxi))
    }

    pub fn client(&self, entity: Entity) -> Option<&Client> {
        self.clients.get(entity).ok().map(|(_, client)| client)
    }

    /// Spawned clients still waiting for a taxi, by spawn time then entity index.
    pub fn waiting_clients(&self) -> Vec<Entity> {
        let mut waiting: Vec<(u64, u32, Entity)> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_waiting(self.now))
            .map(|(entity, client)| (client.spawn_time, entity.index(), entity))
            .collect();
        waiting.sort_unstable();
        waiting.into_iter().map(|(_, _, entity)| entity).collect()
    }

    /// Plan `client` into `taxi` under `merge`.
    pub fn assign(
        &mut self,
        taxi: Entity,
        client: Entity,
        merge: MergePolicy,
    ) -> Result<(), StateViolation> {
        let (_, mut taxi_component) = self
            .taxis
            .get_mut(taxi)
            .map_err(|_| StateViolation::MissingEntity(taxi))?;
        let (_, mut client_component) = self
            .clients
            .get_mut(client)
            .map_err(|_| StateViolation::MissingEntity(client))?;
        taxi_component.plan_client(taxi, client, &mut client_component, merge)?;
        debug!(taxi = ?taxi, client = ?client, ?merge, time = self.now, "client assigned");
        Ok(())
    }

    pub fn timings(&mut self) -> &mut DispatchTimings {
        self.timings
    }
}

/// A dispatch policy: decides which waiting clients go to which taxis each tick.
///
/// Policies only see spawned, waiting clients; [`next_step`] handles the empty case.
pub trait DispatchAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    /// Make zero or more assignments for `waiting` (never empty).
    fn dispatch(&mut self, ctx: &mut DispatchContext<'_, '_, '_>, waiting: &[Entity]) -> StepResult;
}

/// Run one dispatch step.
pub fn next_step(
    algorithm: &mut dyn DispatchAlgorithm,
    ctx: &mut DispatchContext<'_, '_, '_>,
) -> StepResult {
    let waiting = ctx.waiting_clients();
    if waiting.is_empty() {
        return StepResult::stop("nothing to do");
    }
    algorithm.dispatch(ctx, &waiting)
}
