//! powerflow - Power flow diagrams for GivTCP inverters.
//!
//! This crate turns inverter sensor states into a power flow diagram: it
//! aggregates edge readings into node totals, lays the nodes out in one of
//! four arrangements, produces SVG path data for every edge, and drives the
//! dots that travel along those paths. Rendering is left to a host shell
//! (see the `powerflow-viz` crate for the browser one).

pub mod animation;
pub mod card;
pub mod config;
pub mod details;
pub mod easing;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod node;
pub mod sensor;

pub use card::{CardInfo, CardRegistry, PowerFlowCard, RenderOutput};
pub use config::CardConfig;
pub use error::{CardError, CardResult, ConfigError, ConfigResult};
pub use layout::{Layout, LayoutKind, LayoutStrategy};
pub use model::{EdgeKey, FlowDirection, NodeType};
pub use sensor::{SensorState, SensorStates};
