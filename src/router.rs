//! Shortest-path routing on expected link durations (spec.md §4.H).
//!
//! The teacher ships a CSR `ForwardBackwardGraph` re-weighted per iteration
//! via `insert_new_travel_times_by_link`
//! (`simulation::replanning::routing::graph::Graph`); at this crate's scale
//! an adjacency-list Dijkstra over a binary heap is the teacher-proportionate
//! equivalent, rebuilt from the same `ExpectedLinkDurations` snapshot the
//! teacher's graph re-weighting step consumes.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nohash_hasher::IntMap;

use crate::error::{RoutingError, RoutingResult};
use crate::expected::ExpectedLinkDurations;
use crate::network::{EdgeId, Network, NodeId};
use crate::plan::RouteEdge;

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    cost: f64,
    node: NodeId,
}

// Reversed so `BinaryHeap` pops the smallest cost first; ties broken by
// node id ascending for determinism (spec.md §4.D's tie-break discipline,
// applied here to routing).
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}
impl Eq for HeapEntry {}

/// Shortest-path router over a network's edges weighted by expected
/// duration. Rebuilds its per-edge weight cache each time
/// [`Router::refresh`] is called (spec.md §4.H: "After each iteration, the
/// router recomputes its per-edge weight cache from the updated expected
/// durations").
pub struct Router<'n> {
    network: &'n Network,
    weights: IntMap<EdgeId, f64>,
}

impl<'n> Router<'n> {
    pub fn new(network: &'n Network, expected: &ExpectedLinkDurations) -> Self {
        let mut router = Router { network, weights: IntMap::default() };
        router.refresh(expected);
        router
    }

    pub fn refresh(&mut self, expected: &ExpectedLinkDurations) {
        self.weights = expected.as_map().clone();
    }

    /// Returns the shortest-path route and its total expected duration
    /// from `source` to `target`. `time` is accepted but currently unused
    /// by this static router — kept in the signature so a time-dependent
    /// router is drop-in (spec.md §4.H, §9).
    pub fn route(&self, source: NodeId, target: NodeId, _time: u32) -> RoutingResult<(Vec<RouteEdge>, f64)> {
        if source == target {
            return Ok((Vec::new(), 0.0));
        }

        let mut dist: std::collections::HashMap<NodeId, f64> = std::collections::HashMap::new();
        let mut prev: std::collections::HashMap<NodeId, EdgeId> = std::collections::HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(source, 0.0);
        heap.push(HeapEntry { cost: 0.0, node: source });

        while let Some(HeapEntry { cost, node }) = heap.pop() {
            if node == target {
                break;
            }
            if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
                continue;
            }
            for &edge in self.network.out_edges(node) {
                let attrs = self.network.edge_attrs(edge).ok_or(RoutingError::UnknownNode(node))?;
                let weight = *self.weights.get(&edge).unwrap_or(&(attrs.length / attrs.free_speed));
                let next_cost = cost + weight;
                if next_cost < *dist.get(&attrs.to).unwrap_or(&f64::INFINITY) {
                    dist.insert(attrs.to, next_cost);
                    prev.insert(attrs.to, edge);
                    heap.push(HeapEntry { cost: next_cost, node: attrs.to });
                }
            }
        }

        if !dist.contains_key(&target) {
            return Err(RoutingError::NoPath { source, target });
        }

        let mut route_edges = Vec::new();
        let mut current = target;
        while current != source {
            let edge = *prev.get(&current).expect("prev chain is complete once target is reached");
            route_edges.push(edge);
            current = self.network.edge_attrs(edge).expect("edge exists").from;
        }
        route_edges.reverse();

        let total = *dist.get(&target).expect("target reached");
        let route = route_edges
            .into_iter()
            .map(|edge| {
                let attrs = self.network.edge_attrs(edge).expect("edge exists");
                let expected_duration = *self.weights.get(&edge).unwrap_or(&(attrs.length / attrs.free_speed));
                RouteEdge { edge, expected_duration, min_duration: attrs.min_duration }
            })
            .collect();

        Ok((route, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_and_target_returns_empty_route() {
        let network = Network::linear(2, 50.0, 1, 10.0, 0.25).unwrap();
        let expected = ExpectedLinkDurations::new(&network, 1.0).unwrap();
        let router = Router::new(&network, &expected);
        let (route, total) = router.route(network.nodes()[0], network.nodes()[0], 0).unwrap();
        assert!(route.is_empty());
        assert_eq!(total, 0.0);
    }

    #[test]
    fn routes_along_the_only_path_in_a_linear_network() {
        let network = Network::linear(3, 50.0, 1, 10.0, 0.25).unwrap();
        let expected = ExpectedLinkDurations::new(&network, 1.0).unwrap();
        let router = Router::new(&network, &expected);
        let (route, total) = router.route(NodeId(0), NodeId(3), 0).unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(total, 15.0);
    }

    #[test]
    fn picks_the_cheaper_of_two_parallel_routes_in_a_grid() {
        let network = Network::grid(2, 50.0, 1, 10.0, 0.25).unwrap();
        let expected = ExpectedLinkDurations::new(&network, 1.0).unwrap();
        let router = Router::new(&network, &expected);
        let (route, total) = router.route(NodeId(0), NodeId(8), 0).unwrap();
        // 4 hops of 5s each in a 2x2 grid from corner to corner
        assert_eq!(route.len(), 4);
        assert_eq!(total, 20.0);
    }

    #[test]
    fn fails_when_no_path_exists() {
        let mut network = Network::new();
        network.add_node(NodeId(0), 0.0, 0.0);
        network.add_node(NodeId(1), 1.0, 0.0);
        let expected = ExpectedLinkDurations::new(&network, 1.0).unwrap();
        let router = Router::new(&network, &expected);
        assert!(matches!(router.route(NodeId(0), NodeId(1), 0), Err(RoutingError::NoPath { .. })));
    }

    #[test]
    fn refresh_picks_up_updated_expected_durations() {
        let network = Network::linear(1, 50.0, 1, 10.0, 0.25).unwrap();
        let mut expected = ExpectedLinkDurations::new(&network, 1.0).unwrap();
        let mut router = Router::new(&network, &expected);
        let edge = network.edge_between(NodeId(0), NodeId(1)).unwrap();

        let mut obs = IntMap::default();
        obs.insert(edge, 99.0);
        expected.update(&obs);
        router.refresh(&expected);

        let (_, total) = router.route(NodeId(0), NodeId(1), 0).unwrap();
        assert_eq!(total, 99.0);
    }
}
