//! Details panel and more-info requests
//!
//! Clicking a node or a detail tile asks the host to open its more-info
//! dialog for one sensor. This module picks that sensor and prepares the
//! detail tiles shown under the diagram.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::CardConfig;
use crate::model::NodeType;
use crate::sensor::{InverterName, SensorStates};

static SERIAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^givtcp [a-z]{2}\d{4}[a-z]\d{3}\s").expect("valid serial prefix pattern")
});

static KWH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*kwh$").expect("valid kWh suffix pattern"));

/// Strip the inverter serial prefix and a trailing `kWh` from a friendly name
pub fn clean_friendly_name(name: &str) -> String {
    let name = SERIAL_PREFIX.replace(name, "");
    KWH_SUFFIX.replace(&name, "").into_owned()
}

/// One tile of the details panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailEntity {
    pub entity_id: String,
    pub name: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Tiles for the configured detail entities, when the panel is enabled
pub fn detail_entities(config: &CardConfig, states: &SensorStates) -> Vec<DetailEntity> {
    if !config.details_enabled() {
        return Vec::new();
    }
    config
        .detail_entities
        .iter()
        .flatten()
        .filter_map(|id| {
            let Some(state) = states.get(id) else {
                tracing::debug!(entity_id = %id, "detail entity has no state");
                return None;
            };
            Some(DetailEntity {
                entity_id: id.clone(),
                name: clean_friendly_name(
                    state.attributes.friendly_name.as_deref().unwrap_or_default(),
                ),
                state: state.state.clone(),
                unit: state.attributes.unit_of_measurement.clone(),
            })
        })
        .collect()
}

/// Sensor whose more-info dialog a node click opens
pub fn more_info_entity(
    node: NodeType,
    config: &CardConfig,
    inverters: &[InverterName],
) -> Option<String> {
    let inverter_sensor = |name: &str| inverters.first().map(|inv| inv.sensor(name));
    match node {
        NodeType::Grid => inverter_sensor("grid_power"),
        NodeType::Solar => inverter_sensor("pv_power"),
        NodeType::Battery => inverter_sensor("battery_power"),
        NodeType::Eps => inverter_sensor("eps_power"),
        NodeType::House => inverter_sensor("load_power"),
        NodeType::Custom1 | NodeType::Custom2 => config.custom_sensor(node).map(str::to_string),
    }
}

/// Notification raised when the user asks for details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsRequest {
    /// Node that was clicked; `None` for a details-panel tile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeType>,
    pub entity_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorAttributes, SensorState};

    #[test]
    fn friendly_names_lose_serial_and_kwh() {
        assert_eq!(
            clean_friendly_name("GivTCP AB1234C567 PV Energy Today kWh"),
            "PV Energy Today"
        );
        assert_eq!(clean_friendly_name("givtcp ab1234c567 Battery SOC"), "Battery SOC");
        assert_eq!(clean_friendly_name("Outdoor temperature"), "Outdoor temperature");
        assert_eq!(clean_friendly_name(""), "");
    }

    #[test]
    fn node_clicks_map_to_inverter_sensors() {
        let config = CardConfig {
            custom2_sensor: Some("sensor.ev_charger".to_string()),
            ..CardConfig::default()
        };
        let inverters = vec![InverterName {
            prefix: "givtcp_ab1234c567".to_string(),
            suffix: String::new(),
        }];
        assert_eq!(
            more_info_entity(NodeType::Solar, &config, &inverters).as_deref(),
            Some("sensor.givtcp_ab1234c567_pv_power")
        );
        assert_eq!(
            more_info_entity(NodeType::House, &config, &inverters).as_deref(),
            Some("sensor.givtcp_ab1234c567_load_power")
        );
        assert_eq!(
            more_info_entity(NodeType::Custom2, &config, &inverters).as_deref(),
            Some("sensor.ev_charger")
        );
        assert_eq!(more_info_entity(NodeType::Custom1, &config, &inverters), None);
        assert_eq!(more_info_entity(NodeType::Grid, &config, &[]), None);
    }

    #[test]
    fn details_only_when_enabled() {
        let states = SensorStates::new().with(
            "sensor.givtcp_ab1234c567_pv_energy_today_kwh",
            SensorState {
                state: "12.4".to_string(),
                attributes: SensorAttributes {
                    unit_of_measurement: Some("kWh".to_string()),
                    friendly_name: Some("GivTCP AB1234C567 PV Energy Today kWh".to_string()),
                    ..SensorAttributes::default()
                },
            },
        );
        let mut config = CardConfig {
            detail_entities: Some(vec![
                "sensor.givtcp_ab1234c567_pv_energy_today_kwh".to_string(),
                "sensor.missing".to_string(),
            ]),
            ..CardConfig::default()
        };
        assert!(detail_entities(&config, &states).is_empty());

        config.details_enabled = Some(true);
        let tiles = detail_entities(&config, &states);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].name, "PV Energy Today");
        assert_eq!(tiles[0].state, "12.4");
        assert_eq!(tiles[0].unit.as_deref(), Some("kWh"));
    }

    #[test]
    fn request_serializes_for_the_host() {
        let request = DetailsRequest {
            node: Some(NodeType::Grid),
            entity_id: "sensor.x".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["node"], "grid");
        assert_eq!(json["entityId"], "sensor.x");
    }
}
