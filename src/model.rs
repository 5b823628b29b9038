//! Core data types shared by the flow, layout and animation modules

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic role of a node in the power flow diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Solar,
    Grid,
    Battery,
    House,
    Eps,
    Custom1,
    Custom2,
}

impl NodeType {
    /// Every node type, in the order nodes are emitted for rendering
    pub const ALL: [NodeType; 7] = [
        NodeType::Eps,
        NodeType::Custom1,
        NodeType::Custom2,
        NodeType::Solar,
        NodeType::House,
        NodeType::Grid,
        NodeType::Battery,
    ];

    /// Lowercase identifier used in sensor names and CSS classes
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Solar => "solar",
            NodeType::Grid => "grid",
            NodeType::Battery => "battery",
            NodeType::House => "house",
            NodeType::Eps => "eps",
            NodeType::Custom1 => "custom1",
            NodeType::Custom2 => "custom2",
        }
    }

    /// Parse a lowercase identifier
    pub fn parse(name: &str) -> Option<NodeType> {
        NodeType::ALL.into_iter().find(|n| n.as_str() == name)
    }

    /// Nodes whose power is read from one configured sensor rather than from
    /// per-edge inverter sensors
    pub fn is_sensor_backed(self) -> bool {
        matches!(self, NodeType::Eps | NodeType::Custom1 | NodeType::Custom2)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which node-centric total an edge feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    In,
    Out,
}

/// Structured identity of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: NodeType,
    pub to: NodeType,
}

impl EdgeKey {
    pub const fn new(from: NodeType, to: NodeType) -> Self {
        Self { from, to }
    }

    /// Whether either end of the edge is `node`
    pub fn touches(&self, node: NodeType) -> bool {
        self.from == node || self.to == node
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// A directed, statically defined power path between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeType,
    pub to: NodeType,
    pub direction: FlowDirection,
}

impl Edge {
    const fn new(from: NodeType, to: NodeType, direction: FlowDirection) -> Self {
        Self {
            from,
            to,
            direction,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.from, self.to)
    }
}

/// Every edge the diagram can draw, in rendering order
pub const TOPOLOGY: [Edge; 9] = [
    Edge::new(NodeType::Solar, NodeType::Grid, FlowDirection::Out),
    Edge::new(NodeType::Solar, NodeType::Battery, FlowDirection::In),
    Edge::new(NodeType::Solar, NodeType::House, FlowDirection::In),
    Edge::new(NodeType::Battery, NodeType::House, FlowDirection::Out),
    Edge::new(NodeType::Battery, NodeType::Grid, FlowDirection::In),
    Edge::new(NodeType::Grid, NodeType::House, FlowDirection::In),
    Edge::new(NodeType::Grid, NodeType::Battery, FlowDirection::Out),
    Edge::new(NodeType::House, NodeType::Custom1, FlowDirection::Out),
    Edge::new(NodeType::House, NodeType::Custom2, FlowDirection::Out),
];

/// Look up a topology edge by its endpoints
pub fn topology_edge(key: EdgeKey) -> Option<Edge> {
    TOPOLOGY.into_iter().find(|e| e.key() == key)
}

/// One edge's contribution to a node total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPart {
    /// Node the power comes from
    #[serde(rename = "type")]
    pub source: NodeType,
    /// Power in watts
    pub value: f64,
    /// Node the power goes to, when the part comes from a topology edge
    #[serde(rename = "to", skip_serializing_if = "Option::is_none")]
    pub target: Option<NodeType>,
}

/// Aggregated power for one node and direction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowTotal {
    pub total: f64,
    pub parts: Vec<FlowPart>,
}

impl FlowTotal {
    /// A total made of a single part
    pub fn single(source: NodeType, value: f64) -> Self {
        Self {
            total: value,
            parts: vec![FlowPart {
                source,
                value,
                target: None,
            }],
        }
    }

    /// Add a part, keeping `total` equal to the sum of parts
    pub fn add(&mut self, part: FlowPart) {
        self.total += part.value;
        self.parts.push(part);
    }
}

/// Render data for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "type")]
    pub node: NodeType,
    pub name: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub inbound: Option<FlowTotal>,
    #[serde(rename = "out", skip_serializing_if = "Option::is_none")]
    pub outbound: Option<FlowTotal>,
}

impl NodeData {
    /// A node is drawn when it has at least one total
    pub fn is_active(&self) -> bool {
        self.inbound.is_some() || self.outbound.is_some()
    }
}

/// Display text for a node, chosen once its totals are known
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeLabel {
    pub name: String,
    pub icon: String,
    pub extra: Option<String>,
}

/// Current power on one active edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowPower {
    pub edge: Edge,
    pub value: f64,
}
