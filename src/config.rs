//! Card configuration
//!
//! The dashboard hands the card a flat YAML/JSON record. Loading goes through
//! three steps: legacy keys are renamed on the untyped value, the value is
//! deserialized into [`CardConfig`], and the required sources are checked.
//! Every optional field resolves through an accessor that falls back to the
//! defaults in this module, so an explicit value always wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::easing::DotEasing;
use crate::error::{ConfigError, ConfigResult};
use crate::flow::Features;
use crate::layout::{CentreEntity, LayoutKind, LayoutParams, LineStyle};
use crate::model::NodeType;
use crate::sensor::InverterName;

/// Card type string the dashboard registers the card under
pub const CARD_TYPE: &str = "custom:givtcp-power-flow-card";

pub const POWER_MARGIN_DEFAULT: f64 = 20.0;
pub const LINE_GAP_DEFAULT: f64 = 0.0;
pub const LINE_WIDTH_DEFAULT: f64 = 2.0;
pub const CIRCLE_SIZE_DEFAULT: f64 = 35.0;
pub const CORNER_RADIUS_DEFAULT: f64 = 10.0;
pub const DOT_SIZE_DEFAULT: f64 = 2.0;
pub const DOT_SPEED_DEFAULT: f64 = 1.0;
pub const ENTITY_SIZE_DEFAULT: u32 = 6;
pub const NUM_DETAIL_COLUMNS_DEFAULT: u32 = 3;

/// Keys renamed when an old configuration is loaded
const LEGACY_ICON_KEYS: [(&str, &str); 4] = [
    ("icon_solar", "solar_icon"),
    ("icon_battery", "battery_icon"),
    ("icon_grid", "grid_icon"),
    ("icon_house", "house_icon"),
];

/// A node colour: a theme colour name or an RGB triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Colour {
    Rgb([u8; 3]),
    Named(String),
}

impl Colour {
    /// CSS value for the colour
    pub fn css(&self) -> String {
        match self {
            Colour::Rgb([r, g, b]) => format!("rgb({}, {}, {})", r, g, b),
            Colour::Named(name) => format!("var(--{}-color)", name),
        }
    }
}

/// How a node colour is chosen in the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColourType {
    #[default]
    Ui,
    Rgb,
}

/// One entity id or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    One(String),
    Many(Vec<String>),
}

impl EntityRef {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            EntityRef::One(id) => vec![id.as_str()],
            EntityRef::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    fn is_set(&self) -> bool {
        match self {
            EntityRef::One(id) => !id.is_empty(),
            EntityRef::Many(_) => true,
        }
    }
}

/// Default look of one node, and the check a configured colour must pass
#[derive(Debug, Clone, Copy)]
pub struct NodeStyleDefault {
    pub node: NodeType,
    pub icon: &'static str,
    pub ui_colour: &'static str,
    pub rgb_colour: [u8; 3],
    pub easing: DotEasing,
    pub validate_colour: fn(&Colour) -> bool,
}

fn valid_colour(colour: &Colour) -> bool {
    match colour {
        Colour::Rgb(_) => true,
        Colour::Named(name) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
    }
}

/// Style defaults for every node, in render order
pub static NODE_STYLE_DEFAULTS: [NodeStyleDefault; 7] = [
    NodeStyleDefault {
        node: NodeType::Eps,
        icon: "mdi:power-plug-battery",
        ui_colour: "error",
        rgb_colour: [219, 68, 55],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
    NodeStyleDefault {
        node: NodeType::Custom1,
        icon: "mdi:power-socket-uk",
        ui_colour: "accent",
        rgb_colour: [255, 64, 129],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
    NodeStyleDefault {
        node: NodeType::Custom2,
        icon: "mdi:power-socket-uk",
        ui_colour: "primary",
        rgb_colour: [3, 169, 244],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
    NodeStyleDefault {
        node: NodeType::Solar,
        icon: "mdi:solar-panel-large",
        ui_colour: "warning",
        rgb_colour: [255, 152, 0],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
    NodeStyleDefault {
        node: NodeType::House,
        icon: "mdi:home",
        ui_colour: "info",
        rgb_colour: [3, 155, 229],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
    NodeStyleDefault {
        node: NodeType::Grid,
        icon: "mdi:transmission-tower",
        ui_colour: "primary-text",
        rgb_colour: [33, 33, 33],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
    NodeStyleDefault {
        node: NodeType::Battery,
        icon: "mdi:battery",
        ui_colour: "success",
        rgb_colour: [76, 175, 80],
        easing: DotEasing::Linear,
        validate_colour: valid_colour,
    },
];

/// Look up the style defaults for a node
pub fn node_style_default(node: NodeType) -> &'static NodeStyleDefault {
    let mut found = &NODE_STYLE_DEFAULTS[0];
    for entry in &NODE_STYLE_DEFAULTS {
        if entry.node == node {
            found = entry;
        }
    }
    found
}

/// Resolved look of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStyle {
    pub icon: String,
    pub colour: Colour,
    pub easing: DotEasing,
}

/// Configured values for one node's style fields
#[derive(Debug, Clone, Copy, Default)]
struct NodeStyleFields<'a> {
    icon: Option<&'a str>,
    colour: Option<&'a Colour>,
    colour_type: Option<ColourType>,
    easing: Option<DotEasing>,
}

/// The card's configuration record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    pub name: Option<String>,
    pub demo_mode: Option<bool>,
    pub hide_inactive_flows: Option<bool>,
    pub colour_icons_and_text: Option<bool>,

    pub entity_layout: Option<LayoutKind>,
    pub line_gap: Option<f64>,
    pub line_width: Option<f64>,
    pub entity_line_width: Option<f64>,
    pub line_style: Option<LineStyle>,
    pub dot_size: Option<f64>,
    pub dot_speed: Option<f64>,
    pub power_margin: Option<f64>,
    pub circle_size: Option<f64>,
    pub entity_size: Option<u32>,
    pub centre_entity: Option<CentreEntity>,
    pub corner_radius: Option<f64>,

    pub invertor: Option<EntityRef>,
    pub invertors: Option<Vec<String>>,
    pub battery: Option<EntityRef>,
    pub batteries: Option<Vec<String>>,
    pub single_invertor: Option<bool>,
    pub single_battery: Option<bool>,

    pub battery_enabled: Option<bool>,
    pub solar_enabled: Option<bool>,
    pub eps_enabled: Option<bool>,
    pub custom1_enabled: Option<bool>,
    pub custom2_enabled: Option<bool>,

    pub solar_icon: Option<String>,
    pub solar_colour: Option<Colour>,
    pub solar_colour_type: Option<ColourType>,
    pub solar_dot_easing: Option<DotEasing>,
    pub battery_icon: Option<String>,
    pub battery_colour: Option<Colour>,
    pub battery_colour_type: Option<ColourType>,
    pub battery_dot_easing: Option<DotEasing>,
    pub grid_icon: Option<String>,
    pub grid_colour: Option<Colour>,
    pub grid_colour_type: Option<ColourType>,
    pub grid_dot_easing: Option<DotEasing>,
    pub house_icon: Option<String>,
    pub house_colour: Option<Colour>,
    pub house_colour_type: Option<ColourType>,
    pub house_dot_easing: Option<DotEasing>,
    pub eps_icon: Option<String>,
    pub eps_colour: Option<Colour>,
    pub eps_colour_type: Option<ColourType>,
    pub eps_dot_easing: Option<DotEasing>,
    pub custom1_icon: Option<String>,
    pub custom1_colour: Option<Colour>,
    pub custom1_colour_type: Option<ColourType>,
    pub custom1_dot_easing: Option<DotEasing>,
    pub custom2_icon: Option<String>,
    pub custom2_colour: Option<Colour>,
    pub custom2_colour_type: Option<ColourType>,
    pub custom2_dot_easing: Option<DotEasing>,

    pub custom1_name: Option<String>,
    pub custom2_name: Option<String>,
    pub custom1_sensor: Option<String>,
    pub custom2_sensor: Option<String>,
    pub custom1_extra_sensor: Option<String>,
    pub custom2_extra_sensor: Option<String>,

    pub details_enabled: Option<bool>,
    pub detail_entities: Option<Vec<String>>,
    pub num_detail_columns: Option<u32>,
}

/// JavaScript-style truthiness, as used by the dashboard's config checks
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Sizes and speeds of zero, below zero or not a number count as unset
fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}

/// Rename legacy keys in place. A legacy key is only moved when it holds a
/// truthy value; the new key is overwritten if both are present.
pub fn migrate(value: &mut Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };
    for (old, new) in LEGACY_ICON_KEYS {
        if !map.get(old).is_some_and(is_truthy) {
            continue;
        }
        if let Some(v) = map.remove(old) {
            tracing::debug!(from = old, to = new, "migrated legacy config key");
            map.insert(new.to_string(), v);
        }
    }
}

impl CardConfig {
    /// Load from YAML, the dashboard's native format
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Load from JSON
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Migrate, type and validate an untyped configuration
    pub fn from_value(mut value: Value) -> ConfigResult<Self> {
        if !value.is_object() {
            return Err(ConfigError::Parse(
                "configuration must be a mapping".to_string(),
            ));
        }
        migrate(&mut value);
        let config: CardConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the required sources are configured
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.invertor.as_ref().is_some_and(EntityRef::is_set) && self.invertors.is_none() {
            tracing::warn!("configuration rejected: no inverter");
            return Err(ConfigError::MissingInverter);
        }
        if !self.battery.as_ref().is_some_and(EntityRef::is_set) && self.batteries.is_none() {
            tracing::warn!("configuration rejected: no battery");
            return Err(ConfigError::MissingBattery);
        }
        Ok(())
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode.unwrap_or(false)
    }

    pub fn hide_inactive_flows(&self) -> bool {
        self.hide_inactive_flows.unwrap_or(false)
    }

    pub fn colour_icons_and_text(&self) -> bool {
        self.colour_icons_and_text.unwrap_or(true)
    }

    pub fn single_invertor(&self) -> bool {
        self.single_invertor.unwrap_or(true)
    }

    pub fn solar_enabled(&self) -> bool {
        self.solar_enabled.unwrap_or(true)
    }

    pub fn battery_enabled(&self) -> bool {
        self.battery_enabled.unwrap_or(true)
    }

    /// EPS is only shown alongside a battery
    pub fn eps_enabled(&self) -> bool {
        self.battery_enabled() && self.eps_enabled.unwrap_or(false)
    }

    pub fn custom1_enabled(&self) -> bool {
        self.custom1_enabled.unwrap_or(false)
    }

    pub fn custom2_enabled(&self) -> bool {
        self.custom2_enabled.unwrap_or(false)
    }

    /// Which optional parts of the installation are enabled
    pub fn features(&self) -> Features {
        Features {
            solar: self.solar_enabled(),
            battery: self.battery_enabled(),
            eps: self.eps_enabled(),
            custom1: self.custom1_enabled(),
            custom2: self.custom2_enabled(),
        }
    }

    pub fn power_margin(&self) -> f64 {
        self.power_margin.unwrap_or(POWER_MARGIN_DEFAULT)
    }

    pub fn dot_speed(&self) -> f64 {
        positive_or(self.dot_speed, DOT_SPEED_DEFAULT)
    }

    pub fn dot_size(&self) -> f64 {
        positive_or(self.dot_size, DOT_SIZE_DEFAULT)
    }

    pub fn line_width(&self) -> f64 {
        self.line_width.unwrap_or(LINE_WIDTH_DEFAULT)
    }

    /// Node ring width, following the flow line width unless set
    pub fn entity_line_width(&self) -> f64 {
        self.entity_line_width.unwrap_or_else(|| self.line_width())
    }

    pub fn line_gap(&self) -> f64 {
        self.line_gap.unwrap_or(LINE_GAP_DEFAULT)
    }

    pub fn circle_size(&self) -> f64 {
        positive_or(self.circle_size, CIRCLE_SIZE_DEFAULT)
    }

    pub fn corner_radius(&self) -> f64 {
        self.corner_radius.unwrap_or(CORNER_RADIUS_DEFAULT)
    }

    /// Number of node diameters across the card: a configured size of 1..=9
    /// maps to `10 - size`; 0 means unset
    pub fn entity_divisions(&self) -> f64 {
        let size = self
            .entity_size
            .filter(|s| *s > 0)
            .unwrap_or(ENTITY_SIZE_DEFAULT)
            .clamp(1, 9);
        f64::from(10 - size)
    }

    pub fn num_detail_columns(&self) -> u32 {
        self.num_detail_columns
            .filter(|n| *n > 0)
            .unwrap_or(NUM_DETAIL_COLUMNS_DEFAULT)
    }

    pub fn entity_layout(&self) -> LayoutKind {
        self.entity_layout.unwrap_or_default()
    }

    pub fn line_style(&self) -> LineStyle {
        self.line_style.unwrap_or_default()
    }

    pub fn centre_entity(&self) -> CentreEntity {
        self.centre_entity.unwrap_or_default()
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            entity_size: self.entity_divisions(),
            line_gap: self.line_gap(),
            corner_radius: self.corner_radius(),
            circle_size: self.circle_size(),
            line_style: self.line_style(),
            centre_entity: self.centre_entity(),
        }
    }

    pub fn details_enabled(&self) -> bool {
        self.details_enabled.unwrap_or(false)
    }

    /// Display name for a custom node
    pub fn custom_name(&self, node: NodeType) -> &str {
        let (configured, fallback) = match node {
            NodeType::Custom1 => (self.custom1_name.as_deref(), "Custom 1"),
            NodeType::Custom2 => (self.custom2_name.as_deref(), "Custom 2"),
            _ => (None, ""),
        };
        configured.filter(|n| !n.is_empty()).unwrap_or(fallback)
    }

    /// Sensor backing a custom node
    pub fn custom_sensor(&self, node: NodeType) -> Option<&str> {
        match node {
            NodeType::Custom1 => self.custom1_sensor.as_deref(),
            NodeType::Custom2 => self.custom2_sensor.as_deref(),
            _ => None,
        }
    }

    /// Sensor shown as the extra line of a custom node
    pub fn custom_extra_sensor(&self, node: NodeType) -> Option<&str> {
        match node {
            NodeType::Custom1 => self.custom1_extra_sensor.as_deref(),
            NodeType::Custom2 => self.custom2_extra_sensor.as_deref(),
            _ => None,
        }
    }

    /// Inverter prefixes/suffixes derived from the configured serial sensors
    pub fn inverter_names(&self) -> Vec<InverterName> {
        let ids: Vec<&str> = if self.single_invertor() {
            self.invertor
                .as_ref()
                .and_then(|r| r.ids().into_iter().next())
                .into_iter()
                .collect()
        } else {
            match &self.invertors {
                Some(list) => list.iter().map(String::as_str).collect(),
                None => self.invertor.as_ref().map(EntityRef::ids).unwrap_or_default(),
            }
        };

        ids.into_iter()
            .filter_map(|id| {
                let name = InverterName::extract(id);
                if name.is_none() {
                    tracing::warn!(entity_id = id, "not an inverter serial number sensor");
                }
                name
            })
            .collect()
    }

    fn style_fields(&self, node: NodeType) -> NodeStyleFields<'_> {
        let (icon, colour, colour_type, easing) = match node {
            NodeType::Solar => (
                &self.solar_icon,
                &self.solar_colour,
                self.solar_colour_type,
                self.solar_dot_easing,
            ),
            NodeType::Battery => (
                &self.battery_icon,
                &self.battery_colour,
                self.battery_colour_type,
                self.battery_dot_easing,
            ),
            NodeType::Grid => (
                &self.grid_icon,
                &self.grid_colour,
                self.grid_colour_type,
                self.grid_dot_easing,
            ),
            NodeType::House => (
                &self.house_icon,
                &self.house_colour,
                self.house_colour_type,
                self.house_dot_easing,
            ),
            NodeType::Eps => (
                &self.eps_icon,
                &self.eps_colour,
                self.eps_colour_type,
                self.eps_dot_easing,
            ),
            NodeType::Custom1 => (
                &self.custom1_icon,
                &self.custom1_colour,
                self.custom1_colour_type,
                self.custom1_dot_easing,
            ),
            NodeType::Custom2 => (
                &self.custom2_icon,
                &self.custom2_colour,
                self.custom2_colour_type,
                self.custom2_dot_easing,
            ),
        };
        NodeStyleFields {
            icon: icon.as_deref().filter(|i| !i.is_empty()),
            colour: colour.as_ref(),
            colour_type,
            easing,
        }
    }

    /// Icon, colour and dot easing for a node with defaults applied
    pub fn node_style(&self, node: NodeType) -> NodeStyle {
        let defaults = node_style_default(node);
        let fields = self.style_fields(node);

        let default_colour = match fields.colour_type.unwrap_or_default() {
            ColourType::Rgb => Colour::Rgb(defaults.rgb_colour),
            ColourType::Ui => Colour::Named(defaults.ui_colour.to_string()),
        };
        let colour = match fields.colour {
            Some(c) if (defaults.validate_colour)(c) => c.clone(),
            Some(c) => {
                tracing::warn!(node = %node, colour = ?c, "invalid colour, using default");
                default_colour
            }
            None => default_colour,
        };

        NodeStyle {
            icon: fields.icon.unwrap_or(defaults.icon).to_string(),
            colour,
            easing: fields.easing.unwrap_or(defaults.easing),
        }
    }

    /// Whether the icon for a node is the built-in default
    pub fn uses_default_icon(&self, node: NodeType) -> bool {
        self.style_fields(node).icon.is_none_or(|i| i == node_style_default(node).icon)
    }

    /// Easing applied to dots leaving `node`
    pub fn dot_easing(&self, node: NodeType) -> DotEasing {
        self.node_style(node).easing
    }

    /// CSS custom properties for the card element
    pub fn style(&self) -> CardStyle {
        let mut properties = BTreeMap::new();
        properties.insert(
            "--gtpc-column-width".to_string(),
            format!("{}%", 100.0 / f64::from(self.num_detail_columns())),
        );
        properties.insert(
            "--gtpc-line-size".to_string(),
            format!("{}px", self.line_width()),
        );
        properties.insert(
            "--gtpc-entity-line-size".to_string(),
            format!("{}px", self.entity_line_width()),
        );
        properties.insert(
            "--gtpc-inactive-flow-display".to_string(),
            if self.hide_inactive_flows() { "none" } else { "block" }.to_string(),
        );
        if !self.colour_icons_and_text() {
            properties.insert(
                "--gtpc-icons-and-text-colour".to_string(),
                "var(--primary-text-color)".to_string(),
            );
        }
        for entry in &NODE_STYLE_DEFAULTS {
            properties.insert(
                format!("--gtpc-{}-color", entry.node),
                self.node_style(entry.node).colour.css(),
            );
        }
        CardStyle { properties }
    }
}

/// CSS custom properties derived from the configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CardStyle {
    pub properties: BTreeMap<String, String>,
}

impl CardStyle {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Add the node size property for a card of the given pixel width
    pub fn with_size(mut self, width: f64, divisions: f64) -> Self {
        self.properties
            .insert("--gtpc-size".to_string(), format!("{}px", width / divisions));
        self
    }
}
