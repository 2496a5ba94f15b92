//! MATSim-style network XML ingest (spec.md §6 "Network XML").
//!
//! Follows the teacher's `quick-xml` + `serde` pattern: a small tree of
//! `Io*` structs mirrors the wire format exactly, then a conversion pass
//! builds the runtime `Network` and validates the physical attributes.

use std::fs::File;
use std::io::BufReader;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::network::{Network, NodeId};

#[derive(Debug, Deserialize)]
#[serde(rename = "network")]
struct IoNetwork {
    nodes: IoNodes,
    links: IoLinks,
}

#[derive(Debug, Deserialize)]
struct IoNodes {
    #[serde(rename = "node", default)]
    nodes: Vec<IoNode>,
}

#[derive(Debug, Deserialize)]
struct IoNode {
    #[serde(rename = "@id")]
    id: u64,
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct IoLinks {
    #[serde(rename = "link", default)]
    links: Vec<IoLink>,
}

#[derive(Debug, Deserialize)]
struct IoLink {
    #[serde(rename = "@id")]
    id: u64,
    #[serde(rename = "@from")]
    from: u64,
    #[serde(rename = "@to")]
    to: u64,
    #[serde(rename = "@length")]
    length: f64,
    /// vehicles per hour in the XML; converted to vehicles/sec on load.
    #[serde(rename = "@capacity")]
    capacity: f64,
    #[serde(rename = "@freespeed")]
    freespeed: f64,
    #[serde(rename = "@permlanes")]
    permlanes: u32,
}

/// Loads a network from a MATSim-formatted XML file. Transparently handles
/// `.xml.gz` inputs, as the teacher's network loader does.
pub fn load(path: &str) -> ConfigResult<Network> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let io_network: IoNetwork = if path.ends_with(".gz") {
        quick_xml::de::from_reader(BufReader::new(GzDecoder::new(reader)))
            .map_err(|e| ConfigError::Xml(e.to_string()))?
    } else {
        quick_xml::de::from_reader(reader).map_err(|e| ConfigError::Xml(e.to_string()))?
    };

    from_io(io_network)
}

fn from_io(io_network: IoNetwork) -> ConfigResult<Network> {
    let mut net = Network::new();

    for node in &io_network.nodes.nodes {
        net.add_node(NodeId(node.id), node.x, node.y);
    }

    for link in &io_network.links.links {
        let flow_capacity = link.capacity / 3600.0;
        let edge = net.add_edge(
            NodeId(link.from),
            NodeId(link.to),
            link.length,
            link.permlanes,
            link.freespeed,
            flow_capacity,
        )?;
        net.register_external_link_id(link.id, edge);
    }

    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_network_xml() {
        let xml = r#"<network>
            <nodes>
                <node id="1" x="0.0" y="0.0"/>
                <node id="2" x="100.0" y="0.0"/>
            </nodes>
            <links>
                <link id="1" from="1" to="2" length="100.0" capacity="900" freespeed="10.0" permlanes="1"/>
            </links>
        </network>"#;

        let io_network: IoNetwork = quick_xml::de::from_str(xml).unwrap();
        let net = from_io(io_network).unwrap();

        assert_eq!(net.nodes().len(), 2);
        let edge = net.edge_between(NodeId(1), NodeId(2)).unwrap();
        let attrs = net.edge_attrs(edge).unwrap();
        assert_eq!(attrs.min_duration, 10);
        assert_eq!(net.edge_by_external_id(1), Some(edge));
    }
}
