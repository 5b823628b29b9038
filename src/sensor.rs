//! Sensor boundary
//!
//! Host-supplied sensor states, numeric parsing, unit conversion, and the
//! [`PowerSource`] implementations the flow aggregator reads from.
//!
//! Parsing policy: a state that is not a finite number ("unavailable",
//! "unknown", "NaN", ...) is treated exactly like a missing sensor. Malformed
//! readings therefore never reach sums or noise-margin comparisons.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{EdgeKey, NodeType};

static INVERTER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sensor\.(\w+)_invertor_serial_number").expect("valid inverter prefix pattern")
});

static INVERTER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sensor\.\w+_invertor_serial_number_(\d+)").expect("valid inverter suffix pattern")
});

/// Attributes the engine reads from a sensor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
}

/// One sensor as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorState {
    #[serde(deserialize_with = "state_as_string")]
    pub state: String,
    #[serde(default)]
    pub attributes: SensorAttributes,
}

fn state_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawState {
        Text(String),
        Number(f64),
        Flag(bool),
    }

    Ok(match RawState::deserialize(deserializer)? {
        RawState::Text(s) => s,
        RawState::Number(n) => n.to_string(),
        RawState::Flag(b) => b.to_string(),
    })
}

impl SensorState {
    /// Create a sensor with a state and optional unit
    pub fn new(state: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            state: state.into(),
            attributes: SensorAttributes {
                unit_of_measurement: unit.map(str::to_string),
                ..Default::default()
            },
        }
    }

    /// The state as a finite number, or `None` when it is not numeric
    pub fn value(&self) -> Option<f64> {
        parse_state(&self.state)
    }

    /// The state converted to watts using its unit of measurement
    pub fn watts(&self) -> Option<f64> {
        self.value()
            .map(|v| to_watts(v, self.attributes.unit_of_measurement.as_deref()))
    }

    /// State followed by its unit, e.g. `"21.5°C"`
    pub fn formatted(&self) -> String {
        format!(
            "{}{}",
            self.state,
            self.attributes.unit_of_measurement.as_deref().unwrap_or("")
        )
    }
}

/// Parse a raw sensor state into a finite number
pub fn parse_state(state: &str) -> Option<f64> {
    match state.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::trace!(state, "non-numeric sensor state treated as missing");
            None
        }
    }
}

/// Convert a reading in `unit` to watts.
///
/// Energy units are spread over an hour (Wh ÷ 3600). A missing or
/// unrecognised unit is taken to be watts.
pub fn to_watts(value: f64, unit: Option<&str>) -> f64 {
    let Some(unit) = unit else {
        return value;
    };
    match unit.to_ascii_lowercase().as_str() {
        "w" => value,
        "kw" => value * 1000.0,
        "mw" => value * 1_000_000.0,
        "wh" => value / 3600.0,
        "kwh" => (value * 1000.0) / 3600.0,
        _ => value,
    }
}

/// All sensor states known to the host, keyed by entity id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorStates(HashMap<String, SensorState>);

impl SensorStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `entity_id -> {state, attributes}`
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn get(&self, entity_id: &str) -> Option<&SensorState> {
        self.0.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.0.contains_key(entity_id)
    }

    pub fn insert(&mut self, entity_id: impl Into<String>, state: SensorState) {
        self.0.insert(entity_id.into(), state);
    }

    /// Builder-style insert
    pub fn with(mut self, entity_id: impl Into<String>, state: SensorState) -> Self {
        self.insert(entity_id, state);
        self
    }

    /// Entity ids in unspecified order
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Prefix and suffix that identify one inverter's sensors.
///
/// Derived from the inverter's serial-number sensor id,
/// `sensor.<prefix>_invertor_serial_number[_<n>]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InverterName {
    pub prefix: String,
    pub suffix: String,
}

impl InverterName {
    /// Extract the prefix/suffix pair from a serial-number sensor id
    pub fn extract(entity_id: &str) -> Option<Self> {
        let prefix = INVERTER_PREFIX
            .captures(entity_id)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let suffix = INVERTER_SUFFIX
            .captures(entity_id)
            .and_then(|c| c.get(1))
            .map(|m| format!("_{}", m.as_str()))
            .unwrap_or_default();

        if prefix.is_empty() && suffix.is_empty() {
            None
        } else {
            Some(Self { prefix, suffix })
        }
    }

    /// Entity id of one of this inverter's sensors, e.g. `soc` or `pv_power`
    pub fn sensor(&self, name: &str) -> String {
        format!("sensor.{}_{}{}", self.prefix, name, self.suffix)
    }

    /// Entity id of the sensor measuring one edge
    pub fn edge_sensor(&self, key: EdgeKey) -> String {
        self.sensor(&format!("{}_to_{}", key.from, key.to))
    }
}

/// Where the aggregator gets raw power readings from
pub trait PowerSource {
    /// Raw reading in watts for an inverter-measured edge; `None` when no
    /// sensor backs it
    fn raw_power(&self, key: EdgeKey) -> Option<f64>;

    /// Reading in watts for a sensor-backed node (eps, custom1, custom2)
    fn sensor_power(&self, node: NodeType) -> Option<f64>;
}

/// Fixed readings, for hosts that compute edge power themselves
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Readings {
    edges: HashMap<EdgeKey, f64>,
    nodes: HashMap<NodeType, f64>,
}

impl Readings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reading for an edge
    pub fn edge(mut self, from: NodeType, to: NodeType, watts: f64) -> Self {
        self.edges.insert(EdgeKey::new(from, to), watts);
        self
    }

    /// Set the reading for a sensor-backed node
    pub fn node(mut self, node: NodeType, watts: f64) -> Self {
        self.nodes.insert(node, watts);
        self
    }
}

impl PowerSource for Readings {
    fn raw_power(&self, key: EdgeKey) -> Option<f64> {
        self.edges.get(&key).copied()
    }

    fn sensor_power(&self, node: NodeType) -> Option<f64> {
        self.nodes.get(&node).copied()
    }
}

/// Power source backed by the host's sensor states
#[derive(Debug, Clone, Copy)]
pub struct StatePowerSource<'a> {
    states: &'a SensorStates,
    inverters: &'a [InverterName],
    custom1_sensor: Option<&'a str>,
    custom2_sensor: Option<&'a str>,
}

impl<'a> StatePowerSource<'a> {
    pub fn new(
        states: &'a SensorStates,
        inverters: &'a [InverterName],
        custom1_sensor: Option<&'a str>,
        custom2_sensor: Option<&'a str>,
    ) -> Self {
        Self {
            states,
            inverters,
            custom1_sensor,
            custom2_sensor,
        }
    }

    /// Sum one named sensor across all inverters, converted to watts
    fn inverter_sum(&self, name: &str) -> Option<f64> {
        self.inverters
            .iter()
            .filter_map(|inv| self.states.get(&inv.sensor(name)))
            .filter_map(SensorState::watts)
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
    }

    /// Configured sensor id behind a custom node
    fn custom_sensor(&self, node: NodeType) -> Option<&'a str> {
        match node {
            NodeType::Custom1 => self.custom1_sensor,
            NodeType::Custom2 => self.custom2_sensor,
            _ => None,
        }
    }

    /// Whether the first inverter has a sensor for `key` (used by demo mode)
    fn has_edge_sensor(&self, key: EdgeKey) -> bool {
        if let Some(id) = self.custom_sensor(key.to) {
            return self.states.contains(id);
        }
        self.inverters
            .first()
            .is_some_and(|inv| self.states.contains(&inv.edge_sensor(key)))
    }
}

impl PowerSource for StatePowerSource<'_> {
    fn raw_power(&self, key: EdgeKey) -> Option<f64> {
        self.inverters
            .iter()
            .filter_map(|inv| self.states.get(&inv.edge_sensor(key)))
            .filter_map(SensorState::value)
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
    }

    fn sensor_power(&self, node: NodeType) -> Option<f64> {
        match node {
            NodeType::Eps => self.inverter_sum("eps_power"),
            NodeType::Custom1 | NodeType::Custom2 => self
                .custom_sensor(node)
                .and_then(|id| self.states.get(id))
                .and_then(SensorState::watts),
            _ => None,
        }
    }
}

/// Canned readings for dashboards shown without live data.
///
/// An edge only reports power when the real sensor exists, so the demo keeps
/// the shape of the installation it runs on.
#[derive(Debug, Clone, Copy)]
pub struct DemoPowerSource<'a> {
    inner: StatePowerSource<'a>,
}

impl<'a> DemoPowerSource<'a> {
    pub fn new(inner: StatePowerSource<'a>) -> Self {
        Self { inner }
    }

    fn demo_value(key: EdgeKey) -> f64 {
        use NodeType::*;
        match (key.from, key.to) {
            (Grid, House) => 668.0,
            (Solar, House) => 724.0,
            (Solar, Battery) => 764.0,
            (Grid, Battery) => 445.0,
            (House, Custom1) => 800.0,
            (House, Custom2) => 1000.0,
            _ => 0.0,
        }
    }
}

impl PowerSource for DemoPowerSource<'_> {
    fn raw_power(&self, key: EdgeKey) -> Option<f64> {
        self.inner
            .has_edge_sensor(key)
            .then(|| Self::demo_value(key))
    }

    fn sensor_power(&self, node: NodeType) -> Option<f64> {
        match node {
            NodeType::Custom1 | NodeType::Custom2 => {
                let key = EdgeKey::new(NodeType::House, node);
                self.inner
                    .has_edge_sensor(key)
                    .then(|| Self::demo_value(key))
            }
            _ => self.inner.sensor_power(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverter() -> InverterName {
        InverterName {
            prefix: "givtcp_ab1234c567".to_string(),
            suffix: String::new(),
        }
    }

    #[test]
    fn parse_state_rejects_non_numeric() {
        assert_eq!(parse_state("512"), Some(512.0));
        assert_eq!(parse_state(" 12.5 "), Some(12.5));
        assert_eq!(parse_state("-3"), Some(-3.0));
        assert_eq!(parse_state("unavailable"), None);
        assert_eq!(parse_state(""), None);
        assert_eq!(parse_state("NaN"), None);
        assert_eq!(parse_state("inf"), None);
    }

    #[test]
    fn units_convert_to_watts() {
        assert_eq!(to_watts(5.0, None), 5.0);
        assert_eq!(to_watts(5.0, Some("W")), 5.0);
        assert_eq!(to_watts(1.5, Some("kW")), 1500.0);
        assert_eq!(to_watts(2.0, Some("MW")), 2_000_000.0);
        assert_eq!(to_watts(7200.0, Some("Wh")), 2.0);
        assert_eq!(to_watts(3.6, Some("kWh")), 1.0);
        assert_eq!(to_watts(9.0, Some("A")), 9.0);
    }

    #[test]
    fn sensor_state_accepts_numeric_json() {
        let states = SensorStates::from_json(
            r#"{
                "sensor.a": {"state": "1.2", "attributes": {"unit_of_measurement": "kW"}},
                "sensor.b": {"state": 42},
                "sensor.c": {"state": "on", "attributes": {"friendly_name": "C", "icon": "mdi:x"}}
            }"#,
        )
        .unwrap();
        assert_eq!(states.get("sensor.a").unwrap().watts(), Some(1200.0));
        assert_eq!(states.get("sensor.b").unwrap().watts(), Some(42.0));
        assert_eq!(states.get("sensor.c").unwrap().watts(), None);
        assert_eq!(
            states.get("sensor.c").unwrap().attributes.friendly_name.as_deref(),
            Some("C")
        );
    }

    #[test]
    fn formatted_state_appends_unit() {
        assert_eq!(SensorState::new("21.5", Some("°C")).formatted(), "21.5°C");
        assert_eq!(SensorState::new("on", None).formatted(), "on");
    }

    #[test]
    fn inverter_name_from_serial_sensor() {
        let name = InverterName::extract("sensor.givtcp_ab1234c567_invertor_serial_number").unwrap();
        assert_eq!(name.prefix, "givtcp_ab1234c567");
        assert_eq!(name.suffix, "");

        let name =
            InverterName::extract("sensor.givtcp_ab1234c567_invertor_serial_number_2").unwrap();
        assert_eq!(name.prefix, "givtcp_ab1234c567");
        assert_eq!(name.suffix, "_2");
        assert_eq!(name.sensor("soc"), "sensor.givtcp_ab1234c567_soc_2");

        assert!(InverterName::extract("sensor.house_load").is_none());
    }

    #[test]
    fn edge_sensor_id_uses_from_to_naming() {
        let key = EdgeKey::new(NodeType::Solar, NodeType::House);
        assert_eq!(
            inverter().edge_sensor(key),
            "sensor.givtcp_ab1234c567_solar_to_house"
        );
    }

    #[test]
    fn state_source_sums_inverters_and_skips_missing() {
        let inverters = vec![
            inverter(),
            InverterName {
                prefix: "givtcp_ab1234c567".to_string(),
                suffix: "_2".to_string(),
            },
        ];
        let states = SensorStates::new()
            .with(
                "sensor.givtcp_ab1234c567_solar_to_house",
                SensorState::new("300", Some("W")),
            )
            .with(
                "sensor.givtcp_ab1234c567_solar_to_house_2",
                SensorState::new("200", Some("W")),
            )
            .with(
                "sensor.givtcp_ab1234c567_grid_to_house",
                SensorState::new("unknown", None),
            );
        let source = StatePowerSource::new(&states, &inverters, None, None);

        assert_eq!(
            source.raw_power(EdgeKey::new(NodeType::Solar, NodeType::House)),
            Some(500.0)
        );
        assert_eq!(
            source.raw_power(EdgeKey::new(NodeType::Grid, NodeType::House)),
            None
        );
        assert_eq!(
            source.raw_power(EdgeKey::new(NodeType::Battery, NodeType::House)),
            None
        );
    }

    #[test]
    fn state_source_reads_custom_and_eps_sensors() {
        let inverters = vec![inverter()];
        let states = SensorStates::new()
            .with("sensor.heat_pump", SensorState::new("1.25", Some("kW")))
            .with(
                "sensor.givtcp_ab1234c567_eps_power",
                SensorState::new("40", None),
            );
        let source = StatePowerSource::new(&states, &inverters, Some("sensor.heat_pump"), None);

        assert_eq!(source.sensor_power(NodeType::Custom1), Some(1250.0));
        assert_eq!(source.sensor_power(NodeType::Custom2), None);
        assert_eq!(source.sensor_power(NodeType::Eps), Some(40.0));
        assert_eq!(source.sensor_power(NodeType::Solar), None);
    }

    #[test]
    fn demo_source_only_reports_existing_sensors() {
        let inverters = vec![inverter()];
        let states = SensorStates::new().with(
            "sensor.givtcp_ab1234c567_grid_to_house",
            SensorState::new("1", None),
        );
        let demo = DemoPowerSource::new(StatePowerSource::new(&states, &inverters, None, None));

        assert_eq!(
            demo.raw_power(EdgeKey::new(NodeType::Grid, NodeType::House)),
            Some(668.0)
        );
        assert_eq!(
            demo.raw_power(EdgeKey::new(NodeType::Solar, NodeType::House)),
            None
        );
    }

    #[test]
    fn readings_source_returns_what_was_set() {
        let readings = Readings::new()
            .edge(NodeType::Solar, NodeType::Grid, 12.0)
            .node(NodeType::Custom2, 3.0);
        assert_eq!(
            readings.raw_power(EdgeKey::new(NodeType::Solar, NodeType::Grid)),
            Some(12.0)
        );
        assert_eq!(readings.sensor_power(NodeType::Custom2), Some(3.0));
        assert_eq!(readings.sensor_power(NodeType::Custom1), None);
    }
}
