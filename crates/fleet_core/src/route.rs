//! Route model: per-client orders merged into one ordered stop list per taxi.
//!
//! An [`Order`] holds the stops a single client request still needs (pickup, then dropoff).
//! A [`TargetList`] keeps the open orders together with the merged node sequence the taxi
//! actually drives. How a new order is merged in is chosen per call via [`MergePolicy`].

use std::collections::VecDeque;

use bevy_ecs::prelude::Entity;

use crate::geometry::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopKind {
    Pickup,
    Dropoff,
}

/// One stop of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderNode {
    pub client: Entity,
    pub position: Position,
    pub kind: StopKind,
}

impl OrderNode {
    pub fn pickup(client: Entity, position: Position) -> Self {
        Self {
            client,
            position,
            kind: StopKind::Pickup,
        }
    }

    pub fn dropoff(client: Entity, position: Position) -> Self {
        Self {
            client,
            position,
            kind: StopKind::Dropoff,
        }
    }

    pub fn is_pickup(&self) -> bool {
        self.kind == StopKind::Pickup
    }
}

/// The remaining stops of one client request, in the order they must be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub client: Entity,
    stops: VecDeque<OrderNode>,
}

impl Order {
    pub fn new(client: Entity, pickup: Position, dropoff: Position) -> Self {
        Self {
            client,
            stops: VecDeque::from([
                OrderNode::pickup(client, pickup),
                OrderNode::dropoff(client, dropoff),
            ]),
        }
    }

    pub fn stops(&self) -> impl Iterator<Item = &OrderNode> {
        self.stops.iter()
    }

    pub fn remaining(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    fn remove(&mut self, node: &OrderNode) -> bool {
        match self.stops.iter().position(|stop| stop == node) {
            Some(index) => {
                self.stops.remove(index);
                true
            }
            None => false,
        }
    }
}

/// How a new order is merged into an existing route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Append the order's stops after the current route.
    #[default]
    Concatenate,
    /// Rebuild the route by taking one stop from each open order in turn.
    RoundRobin,
    /// Splice the pickup before original index `pickup` and the dropoff before original
    /// index `dropoff` (`dropoff >= pickup`); indices past the end append.
    Insert { pickup: usize, dropoff: usize },
}

/// A taxi's merged route and the open orders it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetList {
    orders: Vec<Order>,
    nodes: Vec<OrderNode>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[OrderNode] {
        &self.nodes
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lead(&self) -> Option<&OrderNode> {
        self.nodes.first()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.nodes.iter().map(|node| node.position)
    }

    pub fn has_order_for(&self, client: Entity) -> bool {
        self.orders.iter().any(|order| order.client == client)
    }

    /// Merge `order` into the route. A client already holding an open order is replaced.
    pub fn add_order(&mut self, order: Order, policy: MergePolicy) {
        self.forget(order.client);
        let new_stops: Vec<OrderNode> = order.stops().copied().collect();
        self.orders.push(order);

        match policy {
            MergePolicy::Concatenate => self.nodes.extend(new_stops),
            MergePolicy::RoundRobin => self.rebuild_round_robin(),
            MergePolicy::Insert { pickup, dropoff } => {
                self.splice(&new_stops, pickup, dropoff);
            }
        }
    }

    fn splice(&mut self, new_stops: &[OrderNode], pickup: usize, dropoff: usize) {
        let n = self.nodes.len();
        let pickup = pickup.min(n);
        let dropoff = dropoff.clamp(pickup, n);
        match new_stops {
            [first, second] => {
                // Insert the later one first so `pickup` still refers to the original index.
                self.nodes.insert(dropoff, *second);
                self.nodes.insert(pickup, *first);
            }
            _ => {
                for (offset, stop) in new_stops.iter().enumerate() {
                    self.nodes.insert((pickup + offset).min(self.nodes.len()), *stop);
                }
            }
        }
    }

    fn rebuild_round_robin(&mut self) {
        let mut queues: Vec<VecDeque<OrderNode>> = self
            .orders
            .iter()
            .map(|order| order.stops().copied().collect())
            .collect();
        let mut merged = Vec::with_capacity(self.nodes.len() + 2);
        while queues.iter().any(|queue| !queue.is_empty()) {
            for queue in queues.iter_mut() {
                if let Some(stop) = queue.pop_front() {
                    merged.push(stop);
                }
            }
        }
        self.nodes = merged;
    }

    /// Remove the lead stop, also removing it from its order (dropping the order when empty).
    pub fn pop_lead(&mut self) -> Option<OrderNode> {
        if self.nodes.is_empty() {
            return None;
        }
        let node = self.nodes.remove(0);
        if let Some(index) = self.orders.iter().position(|order| order.client == node.client) {
            let order = &mut self.orders[index];
            order.remove(&node);
            if order.is_empty() {
                self.orders.remove(index);
            }
        }
        Some(node)
    }

    /// Pop every lead stop located at `position`.
    pub fn pop_reached(&mut self, position: Position) -> Vec<OrderNode> {
        let mut reached = Vec::new();
        while self.lead().is_some_and(|lead| lead.position == position) {
            if let Some(node) = self.pop_lead() {
                reached.push(node);
            }
        }
        reached
    }

    /// Remove one stop kind of `client` (e.g. a pickup performed outside the route).
    pub fn remove_stop(&mut self, client: Entity, kind: StopKind) -> bool {
        let Some(index) = self
            .nodes
            .iter()
            .position(|node| node.client == client && node.kind == kind)
        else {
            return false;
        };
        let node = self.nodes.remove(index);
        if let Some(order_index) = self.orders.iter().position(|order| order.client == client) {
            let order = &mut self.orders[order_index];
            order.remove(&node);
            if order.is_empty() {
                self.orders.remove(order_index);
            }
        }
        true
    }

    /// Drop every stop and the order of `client`. Returns the number of stops removed.
    pub fn forget(&mut self, client: Entity) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.client != client);
        self.orders.retain(|order| order.client != client);
        before - self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.orders.clear();
    }

    /// Every node belongs to an open order of the same client and every order stop is routed.
    pub fn is_consistent(&self) -> bool {
        let routed_by_orders: usize = self.orders.iter().map(Order::remaining).sum();
        routed_by_orders == self.nodes.len()
            && self.nodes.iter().all(|node| {
                self.orders
                    .iter()
                    .any(|order| order.client == node.client && order.stops().any(|s| s == node))
            })
    }
}
