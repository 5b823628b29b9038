//! Power flow card
//!
//! [`PowerFlowCard`] is one widget instance. The host feeds it a
//! configuration, sensor states, its width and frame timestamps; the card
//! answers with render data, dot positions and details requests. It caches
//! the built layout and only resets dot positions when the layout changes
//! shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::animation::{AnimatedEdge, AnimationDriver, DotFrame, DotSettings};
use crate::config::{CardConfig, CardStyle};
use crate::details::{DetailEntity, DetailsRequest, detail_entities, more_info_entity};
use crate::error::{CardError, CardResult};
use crate::flow::FlowAggregator;
use crate::geometry::{Point, Polyline};
use crate::layout::{
    Layout, LayoutKind, LayoutParams, LayoutStrategy, ListLayout, Presence, WIDTH,
};
use crate::model::{Edge, EdgeKey, FlowDirection, FlowPower, NodeData, NodeType};
use crate::node::{NodeLabeler, RingArc, battery_soc, contribution_ring, format_power};
use crate::sensor::{DemoPowerSource, InverterName, PowerSource, SensorStates, StatePowerSource};

/// Card size reported before the card has been laid out
const DEFAULT_CARD_SIZE: u32 = 3;

/// Pixel height of one dashboard size unit
const CARD_SIZE_UNIT_PX: f64 = 50.0;

/// Descriptor the dashboard's card picker lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    #[serde(rename = "type")]
    pub card_type: String,
    pub name: String,
    pub description: String,
}

impl CardInfo {
    /// Descriptor for the power flow card
    pub fn power_flow() -> Self {
        Self {
            card_type: "givtcp-power-flow-card".to_string(),
            name: "GivTCP Power Flow Card".to_string(),
            description: "GivTCP Power Flow Card".to_string(),
        }
    }
}

/// Cards known to a page, registered explicitly by the host
#[derive(Debug, Clone, Default)]
pub struct CardRegistry {
    cards: Vec<CardInfo>,
}

impl CardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card; a type can only be registered once
    pub fn register(&mut self, info: CardInfo) -> CardResult<()> {
        if self.cards.iter().any(|c| c.card_type == info.card_type) {
            return Err(CardError::DuplicateCard(info.card_type));
        }
        tracing::debug!(card_type = %info.card_type, "registered card");
        self.cards.push(info);
        Ok(())
    }

    pub fn cards(&self) -> &[CardInfo] {
        &self.cards
    }

    pub fn get(&self, card_type: &str) -> Option<&CardInfo> {
        self.cards.iter().find(|c| c.card_type == card_type)
    }
}

/// Coalesces width changes so the card is resized at most once per tick.
///
/// `request` reports whether the host must schedule a flush; `flush` then
/// applies the latest requested width.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResizeDebouncer {
    width: Option<f64>,
    pending: Option<f64>,
}

impl ResizeDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applied width, once one has been flushed
    pub fn width(&self) -> Option<f64> {
        self.width
    }

    pub fn request(&mut self, width: f64) -> bool {
        if self.pending.is_none() && self.width == Some(width) {
            return false;
        }
        let schedule = self.pending.is_none();
        self.pending = Some(width);
        schedule
    }

    /// Apply the pending width; returns it when it changed the card
    pub fn flush(&mut self) -> Option<f64> {
        let width = self.pending.take()?;
        if self.width == Some(width) {
            return None;
        }
        self.width = Some(width);
        Some(width)
    }
}

/// One node as the rendering shell draws it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRender {
    #[serde(flatten)]
    pub data: NodeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_label: Option<String>,
    pub ring: Vec<RingArc>,
}

/// One edge as the rendering shell draws it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRender {
    /// `from-to` identifier
    pub key: String,
    pub from: NodeType,
    pub to: NodeType,
    pub direction: FlowDirection,
    /// SVG path data
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Power label position (list layout only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_label: Option<String>,
}

/// Everything the shell needs to draw one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layout: LayoutKind,
    pub classes: Vec<String>,
    /// Drawing box; the list layout reports one row
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeRender>,
    pub edges: Vec<EdgeRender>,
    pub details: Vec<DetailEntity>,
    pub style: CardStyle,
}

/// Owned results of aggregating one cycle's readings
struct FlowSnapshot {
    nodes: Vec<NodeData>,
    powers: Vec<(Edge, Option<f64>)>,
    flow_powers: Vec<FlowPower>,
}

fn snapshot(config: &CardConfig, states: &SensorStates, inverters: &[InverterName]) -> FlowSnapshot {
    let live = StatePowerSource::new(
        states,
        inverters,
        config.custom_sensor(NodeType::Custom1),
        config.custom_sensor(NodeType::Custom2),
    );
    let demo = DemoPowerSource::new(live);
    let source: &dyn PowerSource = if config.demo_mode() { &demo } else { &live };
    let aggregator = FlowAggregator::new(source, config.power_margin(), config.features());

    let soc = if config.battery_enabled() {
        battery_soc(states, inverters)
    } else {
        None
    };
    let labeler = NodeLabeler::new(config, states, soc);
    let nodes = aggregator.node_data(|node, inbound, outbound| labeler.label(node, inbound, outbound));
    let powers = aggregator
        .active_edges()
        .into_iter()
        .map(|edge| (edge, aggregator.clean_power(edge.key())))
        .collect();

    FlowSnapshot {
        nodes,
        powers,
        flow_powers: aggregator.flow_powers(),
    }
}

/// What a layout was built from; a change means dots start over
#[derive(Debug, Clone, Copy, PartialEq)]
struct LayoutSignature {
    kind: LayoutKind,
    params: LayoutParams,
    presence: Presence,
}

#[derive(Debug, Clone)]
struct CachedLayout {
    signature: LayoutSignature,
    /// List row order the layout was built with; empty for other kinds
    row_order: Vec<EdgeKey>,
    layout: Layout,
    polylines: HashMap<EdgeKey, Polyline>,
}

impl CachedLayout {
    fn build(signature: LayoutSignature, row_order: Vec<EdgeKey>, powers: &[FlowPower]) -> Self {
        let layout = Layout::build(signature.kind, signature.params, signature.presence, powers);
        let polylines = crate::model::TOPOLOGY
            .iter()
            .filter_map(|edge| {
                layout
                    .path_for(edge.key())
                    .map(|path| (edge.key(), path.flatten()))
            })
            .collect();
        Self {
            signature,
            row_order,
            layout,
            polylines,
        }
    }
}

/// One power flow widget
#[derive(Debug, Clone, Default)]
pub struct PowerFlowCard {
    config: Option<CardConfig>,
    states: SensorStates,
    inverters: Vec<InverterName>,
    resize: ResizeDebouncer,
    layout: Option<CachedLayout>,
    driver: AnimationDriver,
    running: bool,
}

impl PowerFlowCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&CardConfig> {
        self.config.as_ref()
    }

    /// Apply a configuration; rejected configurations leave the card as it was
    pub fn set_config(&mut self, config: CardConfig) -> CardResult<()> {
        config.validate()?;
        self.inverters = config.inverter_names();
        tracing::debug!(
            layout = %config.entity_layout(),
            inverters = self.inverters.len(),
            demo = config.demo_mode(),
            "card configured"
        );
        self.config = Some(config);
        Ok(())
    }

    pub fn set_config_yaml(&mut self, yaml: &str) -> CardResult<()> {
        self.set_config(CardConfig::from_yaml_str(yaml)?)
    }

    pub fn set_config_json(&mut self, json: &str) -> CardResult<()> {
        self.set_config(CardConfig::from_json_str(json)?)
    }

    /// Replace the sensor states used from the next cycle on
    pub fn update_states(&mut self, states: SensorStates) {
        self.states = states;
    }

    pub fn update_states_json(&mut self, json: &str) -> CardResult<()> {
        self.states = SensorStates::from_json(json)?;
        Ok(())
    }

    pub fn inverters(&self) -> &[InverterName] {
        &self.inverters
    }

    /// Start answering animation frames
    pub fn connect(&mut self) {
        self.running = true;
    }

    /// Stop answering animation frames
    pub fn disconnect(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Record a new width; returns whether a flush must be scheduled
    pub fn request_resize(&mut self, width: f64) -> bool {
        self.resize.request(width)
    }

    /// Apply the pending width
    pub fn flush_resize(&mut self) -> Option<f64> {
        self.resize.flush()
    }

    pub fn width(&self) -> Option<f64> {
        self.resize.width()
    }

    /// Size hint in dashboard rows for a card of the given pixel height
    pub fn card_size(&self, client_height: f64) -> u32 {
        if client_height > 0.0 {
            (client_height / CARD_SIZE_UNIT_PX).ceil() as u32
        } else {
            DEFAULT_CARD_SIZE
        }
    }

    /// CSS custom properties for the card element
    pub fn style(&self) -> CardResult<CardStyle> {
        let config = self.config.as_ref().ok_or(CardError::NotConfigured)?;
        let style = config.style();
        Ok(match self.resize.width() {
            Some(width) => style.with_size(width, config.entity_divisions()),
            None => style,
        })
    }

    /// Make sure the cached layout matches this cycle, rebuilding it (and
    /// resetting dots) when its shape changed.
    ///
    /// A list whose rows changed order is rebuilt without resetting dots.
    fn refresh_layout(&mut self, config: &CardConfig, snapshot: &FlowSnapshot) {
        let signature = LayoutSignature {
            kind: config.entity_layout(),
            params: config.layout_params(),
            presence: Presence::from_nodes(&snapshot.nodes),
        };
        let row_order = match signature.kind {
            LayoutKind::List => ListLayout::row_order(&snapshot.flow_powers),
            _ => Vec::new(),
        };
        match self.layout.as_ref() {
            Some(cached) if cached.signature == signature => {
                if cached.row_order == row_order {
                    return;
                }
                tracing::trace!(rows = row_order.len(), "list rows reordered");
            }
            _ => self.driver.reset(),
        }
        self.layout = Some(CachedLayout::build(
            signature,
            row_order,
            &snapshot.flow_powers,
        ));
    }

    /// Compute this cycle's render data
    pub fn render(&mut self) -> CardResult<RenderOutput> {
        let config = self.config.clone().ok_or(CardError::NotConfigured)?;
        let snapshot = snapshot(&config, &self.states, &self.inverters);
        self.refresh_layout(&config, &snapshot);
        let style = self.style()?;
        let Some(cached) = self.layout.as_ref() else {
            return Err(CardError::NotConfigured);
        };
        let layout = &cached.layout;

        let nodes = snapshot
            .nodes
            .iter()
            .map(|data| NodeRender {
                center: layout.node_center(data.node),
                in_label: data.inbound.as_ref().map(|t| format_power(t.total)),
                out_label: data.outbound.as_ref().map(|t| format_power(t.total)),
                ring: contribution_ring(data),
                data: data.clone(),
            })
            .collect();

        let edges = match layout {
            // rows keep their cached order; values come from this cycle
            Layout::List(list) => list
                .rows()
                .iter()
                .filter_map(|row| {
                    let value = snapshot
                        .flow_powers
                        .iter()
                        .find(|p| p.edge.key() == row.key)?
                        .value;
                    Some(EdgeRender {
                        key: row.key.to_string(),
                        from: row.key.from,
                        to: row.key.to,
                        direction: row.direction,
                        path: row.path.to_string(),
                        power: Some(value),
                        label: Some(row.label),
                        power_label: Some(format_power(value)),
                    })
                })
                .collect(),
            _ => snapshot
                .powers
                .iter()
                .filter_map(|(edge, power)| {
                    let path = layout.path_for(edge.key())?;
                    Some(EdgeRender {
                        key: edge.key().to_string(),
                        from: edge.from,
                        to: edge.to,
                        direction: edge.direction,
                        path: path.to_string(),
                        power: *power,
                        label: None,
                        power_label: None,
                    })
                })
                .collect(),
        };

        let frame = layout.frame();
        let mut classes = vec![
            format!("gtpc-layout-{}", layout.kind()),
            format!("gtpc-{}", frame.variant.css_class()),
        ];
        match layout.kind() {
            LayoutKind::Square => {
                classes.push(format!("gtpc-line-style-{}", frame.params.line_style.as_str()))
            }
            LayoutKind::Circle => {
                classes.push(format!("gtpc-centre-{}", frame.params.centre_entity.as_str()))
            }
            _ => {}
        }
        let features = config.features();
        for node in [NodeType::Eps, NodeType::Custom1, NodeType::Custom2] {
            if features.enabled(node) {
                classes.push(format!("gtpc-{}", node));
            }
        }

        Ok(RenderOutput {
            name: config.name.clone(),
            layout: layout.kind(),
            classes,
            width: WIDTH,
            height: layout.height(),
            nodes,
            edges,
            details: detail_entities(&config, &self.states),
            style,
        })
    }

    /// Advance the dots to `timestamp` (milliseconds).
    ///
    /// Returns `None` once the card has been disconnected, telling the host
    /// to stop requesting frames.
    pub fn animate(&mut self, timestamp: f64) -> Option<Vec<DotFrame>> {
        if !self.running {
            return None;
        }
        let Some(config) = self.config.clone() else {
            return Some(Vec::new());
        };
        let snapshot = snapshot(&config, &self.states, &self.inverters);
        self.refresh_layout(&config, &snapshot);
        let cached = self.layout.as_ref()?;

        let edges: Vec<AnimatedEdge<'_>> = snapshot
            .powers
            .iter()
            .map(|(edge, power)| AnimatedEdge {
                edge: *edge,
                power: *power,
                path: cached.polylines.get(&edge.key()),
                easing: config.dot_easing(edge.from),
            })
            .collect();
        let settings = DotSettings {
            dot_speed: config.dot_speed(),
            dot_size: config.dot_size(),
        };
        Some(self.driver.step(timestamp, &edges, settings))
    }

    /// Animation state of one edge
    pub fn edge_state(&self, key: EdgeKey) -> Option<&crate::animation::EdgeAnimationState> {
        self.driver.state(key)
    }

    /// Details request for a clicked node
    pub fn node_clicked(&self, node: NodeType) -> Option<DetailsRequest> {
        let config = self.config.as_ref()?;
        let entity_id = more_info_entity(node, config, &self.inverters)?;
        Some(DetailsRequest {
            node: Some(node),
            entity_id,
        })
    }

    /// Details request for a clicked detail tile
    pub fn detail_clicked(&self, entity_id: &str) -> DetailsRequest {
        DetailsRequest {
            node: None,
            entity_id: entity_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorState;

    const CONFIG: &str = "
type: custom:givtcp-power-flow-card
invertor: sensor.givtcp_ab1234c567_invertor_serial_number
battery: sensor.givtcp_ab1234c567_battery_serial_number
";

    fn states() -> SensorStates {
        SensorStates::new()
            .with(
                "sensor.givtcp_ab1234c567_solar_to_house",
                SensorState::new("700", Some("W")),
            )
            .with(
                "sensor.givtcp_ab1234c567_grid_to_house",
                SensorState::new("250", Some("W")),
            )
            .with(
                "sensor.givtcp_ab1234c567_battery_to_house",
                SensorState::new("0", Some("W")),
            )
            .with("sensor.givtcp_ab1234c567_soc", SensorState::new("64", Some("%")))
    }

    fn card() -> PowerFlowCard {
        let mut card = PowerFlowCard::new();
        card.set_config_yaml(CONFIG).unwrap();
        card.update_states(states());
        card
    }

    #[test]
    fn render_without_config_fails() {
        let mut card = PowerFlowCard::new();
        assert!(matches!(card.render(), Err(CardError::NotConfigured)));
    }

    #[test]
    fn rejected_config_keeps_previous() {
        let mut card = card();
        let err = card.set_config_yaml("battery: sensor.b\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "You need to define at least one invertor entity"
        );
        assert!(card.config().is_some());
    }

    #[test]
    fn render_lists_active_nodes_and_edges() {
        let mut card = card();
        let output = card.render().unwrap();
        let nodes: Vec<NodeType> = output.nodes.iter().map(|n| n.data.node).collect();
        assert_eq!(
            nodes,
            vec![NodeType::Solar, NodeType::House, NodeType::Grid, NodeType::Battery]
        );
        assert_eq!(output.layout, LayoutKind::Cross);
        assert_eq!(output.height, 100.0);
        assert!(output.classes.contains(&"gtpc-full".to_string()));
        assert_eq!(output.edges.len(), 7);

        let battery = &output.nodes[3];
        assert_eq!(battery.data.extra.as_deref(), Some("64%"));
        assert_eq!(battery.data.icon, "mdi:battery-70");

        let house = &output.nodes[1];
        assert_eq!(house.in_label.as_deref(), Some("950W"));
        assert_eq!(house.ring.len(), 3);
    }

    #[test]
    fn list_layout_orders_rows_by_power() {
        let mut card = PowerFlowCard::new();
        card.set_config_yaml(&format!("{}entity_layout: list\n", CONFIG))
            .unwrap();
        card.update_states(states());
        let output = card.render().unwrap();
        let keys: Vec<&str> = output.edges.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["solar-house", "grid-house", "battery-house"]);
        assert_eq!(output.edges[0].power_label.as_deref(), Some("700W"));
    }

    fn list_rows(card: &PowerFlowCard) -> Vec<(EdgeKey, f64)> {
        match card.layout.as_ref().map(|cached| &cached.layout) {
            Some(Layout::List(list)) => list.rows().iter().map(|r| (r.key, r.value)).collect(),
            _ => Vec::new(),
        }
    }

    fn house_states(solar: &str, grid: &str) -> SensorStates {
        SensorStates::new()
            .with(
                "sensor.givtcp_ab1234c567_solar_to_house",
                SensorState::new(solar, Some("W")),
            )
            .with(
                "sensor.givtcp_ab1234c567_grid_to_house",
                SensorState::new(grid, Some("W")),
            )
    }

    #[test]
    fn list_layout_is_rebuilt_only_when_rows_reorder() {
        let solar = EdgeKey::new(NodeType::Solar, NodeType::House);
        let grid = EdgeKey::new(NodeType::Grid, NodeType::House);
        let mut card = PowerFlowCard::new();
        card.set_config_yaml(&format!("{}entity_layout: list
", CONFIG))
            .unwrap();
        card.update_states(house_states("700", "250"));
        card.connect();
        card.animate(0.0);
        assert_eq!(list_rows(&card), vec![(solar, 700.0), (grid, 250.0)]);

        // same order: cached rows are kept, rendered values are current
        card.update_states(house_states("650", "300"));
        card.animate(16.0);
        assert_eq!(list_rows(&card), vec![(solar, 700.0), (grid, 250.0)]);
        let output = card.render().unwrap();
        assert_eq!(output.edges[0].power, Some(650.0));
        assert_eq!(output.edges[1].power_label.as_deref(), Some("300W"));

        // grid overtakes solar
        card.update_states(house_states("100", "900"));
        card.animate(32.0);
        assert_eq!(list_rows(&card), vec![(grid, 900.0), (solar, 100.0)]);
        assert!(card.edge_state(solar).unwrap().position > 0.0);
        let output = card.render().unwrap();
        let keys: Vec<&str> = output.edges.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["grid-house", "solar-house"]);
    }

    #[test]
    fn animate_stops_after_disconnect() {
        let mut card = card();
        assert!(card.animate(0.0).is_none());
        card.connect();
        let frames = card.animate(0.0).unwrap();
        assert_eq!(frames.len(), 3);
        card.disconnect();
        assert!(card.animate(16.0).is_none());
    }

    #[test]
    fn layout_change_resets_dots() {
        let mut card = card();
        card.connect();
        card.animate(0.0);
        card.animate(1000.0);
        let key = EdgeKey::new(NodeType::Solar, NodeType::House);
        assert!(card.edge_state(key).unwrap().position > 0.0);

        // same shape: positions survive
        card.update_states(states());
        card.animate(1016.0);
        assert!(card.edge_state(key).unwrap().position > 0.0);

        card.set_config_yaml(&format!("{}entity_layout: square\n", CONFIG))
            .unwrap();
        card.animate(1032.0);
        assert_eq!(card.edge_state(key).unwrap().position, 0.0);
    }

    #[test]
    fn resize_is_debounced() {
        let mut card = card();
        assert!(card.request_resize(400.0));
        assert!(!card.request_resize(420.0));
        assert_eq!(card.flush_resize(), Some(420.0));
        assert_eq!(card.flush_resize(), None);
        assert!(!card.request_resize(420.0));
        assert_eq!(card.style().unwrap().get("--gtpc-size"), Some("105px"));
    }

    #[test]
    fn card_size_from_height() {
        let card = PowerFlowCard::new();
        assert_eq!(card.card_size(0.0), 3);
        assert_eq!(card.card_size(420.0), 9);
    }

    #[test]
    fn clicks_raise_details_requests() {
        let card = card();
        let request = card.node_clicked(NodeType::Battery).unwrap();
        assert_eq!(request.entity_id, "sensor.givtcp_ab1234c567_battery_power");
        assert_eq!(card.detail_clicked("sensor.x").node, None);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = CardRegistry::new();
        registry.register(CardInfo::power_flow()).unwrap();
        assert!(matches!(
            registry.register(CardInfo::power_flow()),
            Err(CardError::DuplicateCard(_))
        ));
        assert_eq!(registry.cards().len(), 1);
        assert!(registry.get("givtcp-power-flow-card").is_some());
    }

    #[test]
    fn repeated_foreign_cards_do_not_block_ours() {
        let foreign = CardInfo {
            card_type: "weather-card".to_string(),
            name: String::new(),
            description: String::new(),
        };
        let mut registry = CardRegistry::new();
        registry.register(foreign.clone()).unwrap();
        let err = registry.register(foreign).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"card type already registered: weather-card");

        registry.register(CardInfo::power_flow()).unwrap();
        assert_eq!(registry.cards().len(), 2);
    }
}
