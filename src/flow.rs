//! Flow aggregation
//!
//! Turns raw readings from a [`PowerSource`] into noise-filtered edge powers
//! and per-node totals. Everything here is a pure function of the source,
//! the power margin and the enabled [`Features`], so one aggregator gives
//! the same answers for the whole of a render cycle.

use crate::model::{
    Edge, EdgeKey, FlowDirection, FlowPart, FlowPower, FlowTotal, NodeData, NodeLabel, NodeType,
    TOPOLOGY,
};
use crate::sensor::PowerSource;

/// Which optional parts of the installation are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Features {
    pub solar: bool,
    pub battery: bool,
    pub eps: bool,
    pub custom1: bool,
    pub custom2: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            solar: true,
            battery: true,
            eps: false,
            custom1: false,
            custom2: false,
        }
    }
}

impl Features {
    /// Everything enabled
    pub fn all() -> Self {
        Self {
            solar: true,
            battery: true,
            eps: true,
            custom1: true,
            custom2: true,
        }
    }

    /// Whether a node is enabled; grid and house always are
    pub fn enabled(&self, node: NodeType) -> bool {
        match node {
            NodeType::Solar => self.solar,
            NodeType::Battery => self.battery,
            NodeType::Eps => self.eps,
            NodeType::Custom1 => self.custom1,
            NodeType::Custom2 => self.custom2,
            NodeType::Grid | NodeType::House => true,
        }
    }

    /// An edge is allowed only when both of its ends are enabled
    pub fn allows(&self, key: EdgeKey) -> bool {
        self.enabled(key.from) && self.enabled(key.to)
    }
}

/// Snap a reading inside the noise margin to exactly zero.
///
/// `NaN` is not a reading and becomes `None`.
pub fn clean_reading(value: f64, margin: f64) -> Option<f64> {
    if value.is_nan() {
        return None;
    }
    if value.abs() < margin {
        Some(0.0)
    } else {
        Some(value)
    }
}

/// Aggregates one cycle's readings into edge powers and node totals
pub struct FlowAggregator<'a, S: PowerSource + ?Sized> {
    source: &'a S,
    power_margin: f64,
    features: Features,
}

impl<'a, S: PowerSource + ?Sized> FlowAggregator<'a, S> {
    pub fn new(source: &'a S, power_margin: f64, features: Features) -> Self {
        Self {
            source,
            power_margin,
            features,
        }
    }

    pub fn features(&self) -> Features {
        self.features
    }

    /// Topology edges whose ends are all enabled, in topology order
    pub fn active_edges(&self) -> Vec<Edge> {
        TOPOLOGY
            .into_iter()
            .filter(|edge| self.features.allows(edge.key()))
            .collect()
    }

    /// Noise-filtered power on an edge; `None` when the edge is disabled or
    /// has no reading
    pub fn clean_power(&self, key: EdgeKey) -> Option<f64> {
        if !self.features.allows(key) {
            return None;
        }
        let raw = if key.to.is_sensor_backed() {
            self.source.sensor_power(key.to)
        } else {
            self.source.raw_power(key)
        }?;
        let clean = clean_reading(raw, self.power_margin);
        tracing::trace!(edge = %key, raw, clean = ?clean, "edge power");
        clean
    }

    /// Total power into (`In`) or out of (`Out`) a node, broken down by edge.
    ///
    /// Sensor-backed nodes report their own sensor as a single part, cleaned
    /// with the same margin as the edge that feeds them.
    pub fn total_for(&self, node: NodeType, direction: FlowDirection) -> Option<FlowTotal> {
        if node.is_sensor_backed() {
            if !self.features.enabled(node) {
                return None;
            }
            return self
                .source
                .sensor_power(node)
                .and_then(|raw| clean_reading(raw, self.power_margin))
                .map(|value| FlowTotal::single(node, value));
        }

        self.active_edges()
            .into_iter()
            .filter(|edge| match direction {
                FlowDirection::In => edge.to == node,
                FlowDirection::Out => edge.from == node,
            })
            .fold(None, |acc: Option<FlowTotal>, edge| {
                match self.clean_power(edge.key()) {
                    Some(value) => {
                        let mut total = acc.unwrap_or_default();
                        total.add(FlowPart {
                            source: edge.from,
                            value,
                            target: Some(edge.to),
                        });
                        Some(total)
                    }
                    None => acc,
                }
            })
    }

    /// Power on every active edge that has a reading
    pub fn flow_powers(&self) -> Vec<FlowPower> {
        self.active_edges()
            .into_iter()
            .filter_map(|edge| {
                self.clean_power(edge.key())
                    .map(|value| FlowPower { edge, value })
            })
            .collect()
    }

    /// Inbound and outbound totals shown on a node.
    ///
    /// The grid is labelled from the house's point of view: import (power
    /// leaving the grid) is its inbound total and export its outbound total.
    pub fn node_totals(&self, node: NodeType) -> (Option<FlowTotal>, Option<FlowTotal>) {
        use FlowDirection::{In, Out};
        match node {
            NodeType::Eps | NodeType::Custom1 | NodeType::Custom2 | NodeType::Solar => {
                (None, self.total_for(node, Out))
            }
            NodeType::House => (self.total_for(node, In), None),
            NodeType::Grid => (self.total_for(node, Out), self.total_for(node, In)),
            NodeType::Battery => (self.total_for(node, In), self.total_for(node, Out)),
        }
    }

    /// Render data for every node that has a total, in render order.
    ///
    /// `describe` picks each node's name, icon and extra text once its totals
    /// are known (the battery icon depends on whether it is charging).
    pub fn node_data<F>(&self, mut describe: F) -> Vec<NodeData>
    where
        F: FnMut(NodeType, Option<&FlowTotal>, Option<&FlowTotal>) -> NodeLabel,
    {
        NodeType::ALL
            .into_iter()
            .filter_map(|node| {
                let (inbound, outbound) = self.node_totals(node);
                if inbound.is_none() && outbound.is_none() {
                    return None;
                }
                let label = describe(node, inbound.as_ref(), outbound.as_ref());
                Some(NodeData {
                    node,
                    name: label.name,
                    icon: label.icon,
                    extra: label.extra,
                    inbound,
                    outbound,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::Readings;

    fn label(node: NodeType, _: Option<&FlowTotal>, _: Option<&FlowTotal>) -> NodeLabel {
        NodeLabel {
            name: node.to_string(),
            ..NodeLabel::default()
        }
    }

    #[test]
    fn clean_reading_snaps_inside_margin() {
        assert_eq!(clean_reading(19.9, 20.0), Some(0.0));
        assert_eq!(clean_reading(-5.0, 20.0), Some(0.0));
        assert_eq!(clean_reading(20.0, 20.0), Some(20.0));
        assert_eq!(clean_reading(-300.0, 20.0), Some(-300.0));
        assert_eq!(clean_reading(0.0, 0.0), Some(0.0));
        assert_eq!(clean_reading(f64::NAN, 20.0), None);
    }

    #[test]
    fn solar_out_total_counts_each_edge() {
        let readings = Readings::new()
            .edge(NodeType::Solar, NodeType::House, 700.0)
            .edge(NodeType::Solar, NodeType::Battery, 300.0)
            .edge(NodeType::Solar, NodeType::Grid, 0.0);
        let agg = FlowAggregator::new(&readings, 20.0, Features::default());

        let total = agg.total_for(NodeType::Solar, FlowDirection::Out).unwrap();
        assert_eq!(total.total, 1000.0);
        assert_eq!(total.parts.len(), 3);
        assert_eq!(total.parts.iter().filter(|p| p.value != 0.0).count(), 2);
    }

    #[test]
    fn total_is_none_without_readings() {
        let readings = Readings::new().edge(NodeType::Grid, NodeType::House, 50.0);
        let agg = FlowAggregator::new(&readings, 20.0, Features::default());
        assert!(agg.total_for(NodeType::Solar, FlowDirection::Out).is_none());
        assert!(agg.total_for(NodeType::House, FlowDirection::In).is_some());
    }

    #[test]
    fn disabled_battery_drops_battery_edges() {
        let readings = Readings::new()
            .edge(NodeType::Battery, NodeType::House, 500.0)
            .edge(NodeType::Grid, NodeType::House, 200.0);
        let features = Features {
            battery: false,
            ..Features::default()
        };
        let agg = FlowAggregator::new(&readings, 20.0, features);

        assert!(agg.active_edges().iter().all(|e| !e.key().touches(NodeType::Battery)));
        assert!(agg.total_for(NodeType::Battery, FlowDirection::In).is_none());
        assert!(agg.total_for(NodeType::Battery, FlowDirection::Out).is_none());

        let house = agg.total_for(NodeType::House, FlowDirection::In).unwrap();
        assert_eq!(house.total, 200.0);
        assert!(house.parts.iter().all(|p| p.source != NodeType::Battery));
    }

    #[test]
    fn custom_edges_read_the_node_sensor() {
        let readings = Readings::new().node(NodeType::Custom1, 1250.0);
        let features = Features {
            custom1: true,
            ..Features::default()
        };
        let agg = FlowAggregator::new(&readings, 20.0, features);

        assert_eq!(
            agg.clean_power(EdgeKey::new(NodeType::House, NodeType::Custom1)),
            Some(1250.0)
        );
        let total = agg.total_for(NodeType::Custom1, FlowDirection::Out).unwrap();
        assert_eq!(total, FlowTotal::single(NodeType::Custom1, 1250.0));
    }

    #[test]
    fn custom_node_total_matches_its_edge_inside_margin() {
        let readings = Readings::new().node(NodeType::Custom1, 15.0);
        let features = Features {
            custom1: true,
            ..Features::default()
        };
        let agg = FlowAggregator::new(&readings, 20.0, features);

        assert_eq!(
            agg.clean_power(EdgeKey::new(NodeType::House, NodeType::Custom1)),
            Some(0.0)
        );
        let total = agg.total_for(NodeType::Custom1, FlowDirection::Out).unwrap();
        assert_eq!(total, FlowTotal::single(NodeType::Custom1, 0.0));

        let readings = Readings::new().node(NodeType::Eps, f64::NAN);
        let agg = FlowAggregator::new(&readings, 20.0, Features::all());
        assert!(agg.total_for(NodeType::Eps, FlowDirection::Out).is_none());
    }

    #[test]
    fn disabled_custom_node_has_no_total() {
        let readings = Readings::new().node(NodeType::Custom2, 10.0);
        let agg = FlowAggregator::new(&readings, 20.0, Features::default());
        assert!(agg.total_for(NodeType::Custom2, FlowDirection::Out).is_none());
        assert!(agg
            .clean_power(EdgeKey::new(NodeType::House, NodeType::Custom2))
            .is_none());
    }

    #[test]
    fn flow_powers_skip_edges_without_readings() {
        let readings = Readings::new()
            .edge(NodeType::Grid, NodeType::House, 10.0)
            .edge(NodeType::Solar, NodeType::House, 450.0);
        let agg = FlowAggregator::new(&readings, 20.0, Features::default());
        let powers = agg.flow_powers();
        assert_eq!(powers.len(), 2);
        assert_eq!(powers[0].edge.key(), EdgeKey::new(NodeType::Solar, NodeType::House));
        assert_eq!(powers[1].value, 0.0);
    }

    #[test]
    fn grid_totals_are_crossed_for_display() {
        let readings = Readings::new()
            .edge(NodeType::Grid, NodeType::House, 400.0)
            .edge(NodeType::Solar, NodeType::Grid, 150.0);
        let agg = FlowAggregator::new(&readings, 20.0, Features::default());
        let (inbound, outbound) = agg.node_totals(NodeType::Grid);
        assert_eq!(inbound.unwrap().total, 400.0);
        assert_eq!(outbound.unwrap().total, 150.0);
    }

    #[test]
    fn node_data_keeps_only_active_nodes_in_render_order() {
        let readings = Readings::new()
            .edge(NodeType::Grid, NodeType::House, 400.0)
            .edge(NodeType::Solar, NodeType::House, 100.0);
        let agg = FlowAggregator::new(&readings, 20.0, Features::default());
        let nodes = agg.node_data(label);
        let order: Vec<NodeType> = nodes.iter().map(|n| n.node).collect();
        assert_eq!(order, vec![NodeType::Solar, NodeType::House, NodeType::Grid]);
        assert!(nodes.iter().all(NodeData::is_active));
        assert_eq!(nodes[0].name, "solar");
    }
}
