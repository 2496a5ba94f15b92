//! The directed road network: nodes, edges, and the physical constants the
//! simulator derives from each edge's length, lanes, free-speed and flow
//! capacity.

pub mod io;

use std::collections::HashMap;

use nohash_hasher::{IntMap, IsEnabled};

use crate::error::{ConfigError, ConfigResult};

/// A node identifier. Wraps a `u64` so node ids can come straight from
/// MATSim-style XML (string ids are interned to dense integers at load
/// time) or be synthesized directly by the grid/linear constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl IsEnabled for NodeId {}

/// An edge identifier. Also an index into `Network::edges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u64);

impl IsEnabled for EdgeId {}

/// Per-edge physical attributes plus the two derived constants every
/// downstream component (SimLink, reducers, router) relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAttrs {
    pub from: NodeId,
    pub to: NodeId,
    pub length: f64,
    pub lanes: u32,
    pub free_speed: f64,
    pub flow_capacity: f64,
    /// floor(length / free_speed), seconds.
    pub min_duration: u32,
    /// floor(1 / (flow_capacity * lanes)), seconds; at least 1.
    pub headway: u32,
}

impl EdgeAttrs {
    fn new(from: NodeId, to: NodeId, length: f64, lanes: u32, free_speed: f64, flow_capacity: f64) -> Self {
        let min_duration = (length / free_speed).floor() as u32;
        let headway = ((1.0 / (flow_capacity * lanes as f64)).floor() as u32).max(1);
        EdgeAttrs {
            from,
            to,
            length,
            lanes,
            free_speed,
            flow_capacity,
            min_duration,
            headway,
        }
    }

    pub fn storage_capacity(&self) -> f64 {
        self.length * self.lanes as f64
    }
}

/// A directed graph of nodes and edges, read-only once built and shared by
/// every component in an iteration.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<NodeId>,
    edges: IntMap<EdgeId, EdgeAttrs>,
    out_edges: IntMap<NodeId, Vec<EdgeId>>,
    edge_by_endpoints: HashMap<(NodeId, NodeId), EdgeId>,
    node_positions: HashMap<NodeId, (f64, f64)>,
    next_edge_id: u64,
    link_external_ids: IntMap<u64, EdgeId>,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    pub fn add_node(&mut self, id: NodeId, x: f64, y: f64) {
        if !self.node_positions.contains_key(&id) {
            self.nodes.push(id);
        }
        self.node_positions.insert(id, (x, y));
        self.out_edges.entry(id).or_default();
    }

    /// Adds a single directed edge. Rejects non-positive attributes per
    /// spec.md §4.A.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        length: f64,
        lanes: u32,
        free_speed: f64,
        flow_capacity: f64,
    ) -> ConfigResult<EdgeId> {
        Self::validate_positive(length, "length")?;
        Self::validate_positive(free_speed, "free_speed")?;
        Self::validate_positive(flow_capacity, "flow_capacity")?;
        if lanes == 0 {
            return Err(ConfigError::NonPositiveAttribute {
                edge: EdgeId(self.next_edge_id),
                field: "lanes",
                value: 0.0,
            });
        }

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;

        let attrs = EdgeAttrs::new(from, to, length, lanes, free_speed, flow_capacity);
        self.edges.insert(id, attrs);
        self.out_edges.entry(from).or_default().push(id);
        self.out_edges.entry(to).or_default();
        self.edge_by_endpoints.insert((from, to), id);
        Ok(id)
    }

    fn validate_positive(value: f64, field: &'static str) -> ConfigResult<()> {
        if value <= 0.0 {
            return Err(ConfigError::NonPositiveAttribute {
                edge: EdgeId(u64::MAX),
                field,
                value,
            });
        }
        Ok(())
    }

    /// Adds both orientations of an undirected edge, as the synthetic grid
    /// and linear constructors do (spec.md §4.A: "Implementations must
    /// materialize both orientations when either is used by a route").
    pub fn add_undirected_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        length: f64,
        lanes: u32,
        free_speed: f64,
        flow_capacity: f64,
    ) -> ConfigResult<(EdgeId, EdgeId)> {
        let forward = self.add_edge(a, b, length, lanes, free_speed, flow_capacity)?;
        let backward = self.add_edge(b, a, length, lanes, free_speed, flow_capacity)?;
        Ok((forward, backward))
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = (&EdgeId, &EdgeAttrs)> {
        self.edges.iter()
    }

    pub fn edge_attrs(&self, edge: EdgeId) -> Option<&EdgeAttrs> {
        self.edges.get(&edge)
    }

    pub fn edge_between(&self, u: NodeId, v: NodeId) -> Option<EdgeId> {
        self.edge_by_endpoints.get(&(u, v)).copied()
    }

    /// Registers the MATSim-XML external link id for an already-inserted
    /// edge, so plan routes (which reference links by that external id)
    /// can be resolved back into `EdgeId`s.
    pub fn register_external_link_id(&mut self, external_id: u64, edge: EdgeId) {
        self.link_external_ids.insert(external_id, edge);
    }

    pub fn edge_by_external_id(&self, external_id: u64) -> Option<EdgeId> {
        self.link_external_ids.get(&external_id).copied()
    }

    pub fn out_edges(&self, node: NodeId) -> &[EdgeId] {
        self.out_edges.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_position(&self, node: NodeId) -> Option<(f64, f64)> {
        self.node_positions.get(&node).copied()
    }

    /// Per edge → free-flow minimum duration (length / free_speed),
    /// un-floored, matching `fredshone/mobslim`'s `minimum_durations`.
    pub fn minimum_durations(&self) -> IntMap<EdgeId, f64> {
        self.edges
            .iter()
            .map(|(id, attrs)| (*id, attrs.length / attrs.free_speed))
            .collect()
    }

    /// Builds a `size x size` grid of `(size+1) x (size+1)` nodes, matching
    /// `Grid.build_grid_graph` in `fredshone/mobslim/src/mobslim/network.py`.
    pub fn grid(
        size: u32,
        length: f64,
        lanes: u32,
        free_speed: f64,
        flow_capacity: f64,
    ) -> ConfigResult<Network> {
        if size == 0 {
            return Err(ConfigError::InvalidSize(size));
        }
        let mut net = Network::new();
        let node_id = |i: u32, j: u32| NodeId(((i as u64) * (size as u64 + 1)) + j as u64);

        for i in 0..=size {
            for j in 0..=size {
                let id = node_id(i, j);
                net.add_node(id, (j * length as u32) as f64, (i * length as u32) as f64);
                if i > 0 {
                    net.add_undirected_edge(id, node_id(i - 1, j), length, lanes, free_speed, flow_capacity)?;
                }
                if j > 0 {
                    net.add_undirected_edge(id, node_id(i, j - 1), length, lanes, free_speed, flow_capacity)?;
                }
            }
        }
        Ok(net)
    }

    /// Builds a chain of `size + 1` nodes, matching `Linear.build_linear_graph`.
    pub fn linear(
        size: u32,
        length: f64,
        lanes: u32,
        free_speed: f64,
        flow_capacity: f64,
    ) -> ConfigResult<Network> {
        if size == 0 {
            return Err(ConfigError::InvalidSize(size));
        }
        let mut net = Network::new();
        for i in 0..=size {
            let id = NodeId(i as u64);
            net.add_node(id, (i * length as u32) as f64, 0.0);
            if i > 0 {
                net.add_undirected_edge(id, NodeId((i - 1) as u64), length, lanes, free_speed, flow_capacity)?;
            }
        }
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_network_derives_min_duration_and_headway() {
        let net = Network::linear(3, 50.0, 1, 10.0, 0.25).unwrap();
        let a = NodeId(0);
        let b = NodeId(1);
        let edge = net.edge_between(a, b).unwrap();
        let attrs = net.edge_attrs(edge).unwrap();
        assert_eq!(attrs.min_duration, 5);
        assert_eq!(attrs.headway, 4);
        assert_eq!(attrs.storage_capacity(), 50.0);
    }

    #[test]
    fn linear_network_materializes_both_orientations() {
        let net = Network::linear(1, 50.0, 1, 10.0, 0.25).unwrap();
        assert!(net.edge_between(NodeId(0), NodeId(1)).is_some());
        assert!(net.edge_between(NodeId(1), NodeId(0)).is_some());
    }

    #[test]
    fn grid_network_has_expected_node_count() {
        let net = Network::grid(2, 50.0, 1, 10.0, 0.25).unwrap();
        assert_eq!(net.nodes().len(), 9);
    }

    #[test]
    fn rejects_non_positive_length() {
        let err = Network::linear(1, 0.0, 1, 10.0, 0.25).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveAttribute { field: "length", .. }));
    }

    #[test]
    fn rejects_zero_size() {
        let err = Network::grid(0, 50.0, 1, 10.0, 0.25).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSize(0)));
    }
}
