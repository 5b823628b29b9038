//! Node presentation
//!
//! Names, icons and extra text for each node, power formatting, and the ring
//! of arcs drawn around a node to show which sources make up its total.

use serde::Serialize;

use crate::config::CardConfig;
use crate::geometry::{Path, Point, arc_path};
use crate::model::{FlowTotal, NodeData, NodeLabel, NodeType};
use crate::sensor::{InverterName, SensorState, SensorStates};

/// Radius of the contribution ring in the node's own 100×100 box
pub const RING_RADIUS: f64 = 49.0;

/// Format watts the way node labels show them
pub fn format_power(power: f64) -> String {
    if power < 1000.0 {
        format!("{}W", power)
    } else if power < 1_000_000.0 {
        format!("{:.1}kW", power / 1000.0)
    } else {
        format!("{:.1}MW", power / 1_000_000.0)
    }
}

/// Mean state of charge across inverters, rounded to a whole percent
pub fn battery_soc(states: &SensorStates, inverters: &[InverterName]) -> Option<f64> {
    let readings: Vec<f64> = inverters
        .iter()
        .filter_map(|inv| states.get(&inv.sensor("soc")))
        .filter_map(SensorState::value)
        .collect();
    if readings.is_empty() {
        return None;
    }
    let mean = readings.iter().sum::<f64>() / readings.len() as f64;
    Some(mean.round())
}

/// A battery is charging when more power goes in than comes out
pub fn is_charging(inbound: Option<&FlowTotal>, outbound: Option<&FlowTotal>) -> bool {
    match (inbound, outbound) {
        (Some(i), Some(o)) => i.total > o.total,
        _ => false,
    }
}

/// Battery icon for a charge level, e.g. `mdi:battery-charging-60`
pub fn battery_icon(base: &str, soc: f64, charging: bool) -> String {
    let level = (soc / 10.0).ceil() * 10.0;
    format!(
        "{}{}-{}",
        base,
        if charging { "-charging" } else { "" },
        level
    )
}

/// Chooses names, icons and extras for nodes from the configuration and the
/// current sensor states
pub struct NodeLabeler<'a> {
    config: &'a CardConfig,
    states: &'a SensorStates,
    soc: Option<f64>,
}

impl<'a> NodeLabeler<'a> {
    pub fn new(config: &'a CardConfig, states: &'a SensorStates, soc: Option<f64>) -> Self {
        Self {
            config,
            states,
            soc,
        }
    }

    fn name(&self, node: NodeType) -> String {
        match node {
            NodeType::Solar => "Solar".to_string(),
            NodeType::Grid => "Grid".to_string(),
            NodeType::Battery => "Battery".to_string(),
            NodeType::House => "House".to_string(),
            NodeType::Eps => "EPS".to_string(),
            NodeType::Custom1 | NodeType::Custom2 => self.config.custom_name(node).to_string(),
        }
    }

    fn extra(&self, node: NodeType) -> Option<String> {
        match node {
            NodeType::Battery => self.soc.map(|soc| format!("{}%", soc)),
            NodeType::Custom1 | NodeType::Custom2 => {
                if !self.config.features().enabled(node) {
                    return None;
                }
                self.config
                    .custom_extra_sensor(node)
                    .and_then(|id| self.states.get(id))
                    .map(SensorState::formatted)
            }
            _ => None,
        }
    }

    pub fn label(
        &self,
        node: NodeType,
        inbound: Option<&FlowTotal>,
        outbound: Option<&FlowTotal>,
    ) -> NodeLabel {
        let mut icon = self.config.node_style(node).icon;
        if node == NodeType::Battery && self.config.uses_default_icon(node) {
            if let Some(soc) = self.soc {
                icon = battery_icon(&icon, soc, is_charging(inbound, outbound));
            }
        }
        NodeLabel {
            name: self.name(node),
            icon,
            extra: self.extra(node),
        }
    }
}

/// One arc of a node's contribution ring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingArc {
    /// Node whose colour the arc is drawn in
    pub source: NodeType,
    /// Path data in the node's 100×100 box
    pub path: String,
}

/// Arcs around a node, one per contributing source, sized by share of the
/// node's combined inbound and outbound total
pub fn contribution_ring(data: &NodeData) -> Vec<RingArc> {
    let mut full_total = 0.0;
    let mut shares: Vec<(NodeType, f64)> = Vec::new();
    for flow in [data.inbound.as_ref(), data.outbound.as_ref()].into_iter().flatten() {
        full_total += flow.total;
        for part in &flow.parts {
            match shares.iter_mut().find(|(source, _)| *source == part.source) {
                Some((_, value)) => *value += part.value,
                None => shares.push((part.source, part.value)),
            }
        }
    }

    let center = Point::new(50.0, 50.0);
    let mut offset = 0.0;
    shares
        .into_iter()
        .map(|(source, value)| {
            let (percentage, step) = if full_total > 0.0 {
                (
                    value / full_total * 100.0,
                    (full_total - value) / full_total * 100.0,
                )
            } else {
                (100.0, 0.0)
            };
            offset += step;
            let path: Path = arc_path(percentage, offset, RING_RADIUS, center);
            RingArc {
                source,
                path: path.to_string(),
            }
        })
        .collect()
}
