//! Layout strategies
//!
//! Each strategy places the seven nodes in the normalised 100-wide drawing
//! space and produces a [`Path`] for every topology edge. The quantities all
//! strategies share (entity width, drawing height, vertical centre line) are
//! free functions over [`LayoutParams`] and [`Presence`], so a strategy only
//! owns the geometry that is genuinely its own.

mod circle;
mod cross;
mod list;
mod square;

pub use circle::CircleLayout;
pub use cross::CrossLayout;
pub use list::{ListLayout, ListRow};
pub use square::SquareLayout;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Path, Point, circle_point};
use crate::model::{EdgeKey, FlowPower, NodeData, NodeType};

/// Width of the drawing space
pub const WIDTH: f64 = 100.0;

/// Horizontal centre line of the drawing space
pub const MID_X: f64 = WIDTH / 2.0;

/// Which diagram arrangement is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Cross,
    Square,
    Circle,
    List,
}

impl LayoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutKind::Cross => "cross",
            LayoutKind::Square => "square",
            LayoutKind::Circle => "circle",
            LayoutKind::List => "list",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line shape for the square layout's satellite edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Curved,
    Angled,
    Straight,
}

impl LineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LineStyle::Curved => "curved",
            LineStyle::Angled => "angled",
            LineStyle::Straight => "straight",
        }
    }
}

/// Node drawn in the middle of the circle layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentreEntity {
    #[default]
    None,
    House,
    Inverter,
    Solar,
    Battery,
}

impl CentreEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            CentreEntity::None => "none",
            CentreEntity::House => "house",
            CentreEntity::Inverter => "inverter",
            CentreEntity::Solar => "solar",
            CentreEntity::Battery => "battery",
        }
    }

    /// The diagram node placed at the centre, if any
    pub fn node(self) -> Option<NodeType> {
        match self {
            CentreEntity::House => Some(NodeType::House),
            CentreEntity::Solar => Some(NodeType::Solar),
            CentreEntity::Battery => Some(NodeType::Battery),
            CentreEntity::None | CentreEntity::Inverter => None,
        }
    }
}

/// Sizing parameters every strategy is built from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Number of node diameters that fit across the width
    pub entity_size: f64,
    pub line_gap: f64,
    pub corner_radius: f64,
    pub circle_size: f64,
    pub line_style: LineStyle,
    pub centre_entity: CentreEntity,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            entity_size: 4.0,
            line_gap: 0.0,
            corner_radius: 10.0,
            circle_size: 35.0,
            line_style: LineStyle::default(),
            centre_entity: CentreEntity::default(),
        }
    }
}

/// Which optional nodes are on the diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Presence {
    pub solar: bool,
    pub battery: bool,
    pub eps: bool,
    pub custom1: bool,
    pub custom2: bool,
}

impl Presence {
    /// Every optional node present
    pub fn all() -> Self {
        Self {
            solar: true,
            battery: true,
            eps: true,
            custom1: true,
            custom2: true,
        }
    }

    /// Presence derived from the active nodes of a render cycle
    pub fn from_nodes(nodes: &[NodeData]) -> Self {
        let has = |node: NodeType| nodes.iter().any(|n| n.node == node && n.is_active());
        Self {
            solar: has(NodeType::Solar),
            battery: has(NodeType::Battery),
            eps: has(NodeType::Eps),
            custom1: has(NodeType::Custom1),
            custom2: has(NodeType::Custom2),
        }
    }

    pub fn has(&self, node: NodeType) -> bool {
        match node {
            NodeType::Solar => self.solar,
            NodeType::Battery => self.battery,
            NodeType::Eps => self.eps,
            NodeType::Custom1 => self.custom1,
            NodeType::Custom2 => self.custom2,
            NodeType::Grid | NodeType::House => true,
        }
    }
}

/// Row arrangement of the diagram.
///
/// The top row is kept when solar or custom1 is shown, the bottom row when
/// battery or custom2 is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutVariant {
    Full,
    NoSolar,
    NoBattery,
    Minimal,
}

impl LayoutVariant {
    pub fn of(presence: Presence) -> Self {
        let top = presence.solar || presence.custom1;
        let bottom = presence.battery || presence.custom2;
        match (top, bottom) {
            (true, true) => LayoutVariant::Full,
            (false, true) => LayoutVariant::NoSolar,
            (true, false) => LayoutVariant::NoBattery,
            (false, false) => LayoutVariant::Minimal,
        }
    }

    /// Class name used by the rendering shell
    pub fn css_class(self) -> &'static str {
        match self {
            LayoutVariant::Full => "full",
            LayoutVariant::NoSolar => "no-solar",
            LayoutVariant::NoBattery => "no-battery",
            LayoutVariant::Minimal => "minimal",
        }
    }
}

/// Diameter of a node in drawing units
pub fn entity_width(params: &LayoutParams) -> f64 {
    WIDTH / params.entity_size
}

/// Height of the drawing space
pub fn height(variant: LayoutVariant, entity_width: f64) -> f64 {
    match variant {
        LayoutVariant::Full => WIDTH,
        LayoutVariant::NoSolar | LayoutVariant::NoBattery => (WIDTH + entity_width) / 2.0,
        LayoutVariant::Minimal => entity_width,
    }
}

/// Vertical position of the grid/house centre line
pub fn mid_y(variant: LayoutVariant, height: f64, entity_width: f64) -> f64 {
    match variant {
        LayoutVariant::Full => height / 2.0,
        LayoutVariant::NoSolar | LayoutVariant::Minimal => entity_width / 2.0,
        LayoutVariant::NoBattery => height - entity_width / 2.0,
    }
}

/// Vertical centre of the circle layout's ring
pub fn circle_mid_y(presence: Presence, height: f64) -> f64 {
    if (presence.custom1 && presence.custom2) || (presence.solar && presence.custom2) {
        (height / 2.0).round()
    } else if presence.battery && !presence.solar {
        0.0
    } else if presence.solar && !presence.battery {
        height
    } else {
        (height / 2.0).round()
    }
}

/// Quantities shared by every strategy, computed once per layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutFrame {
    pub params: LayoutParams,
    pub presence: Presence,
    pub variant: LayoutVariant,
    pub entity_width: f64,
    pub height: f64,
    pub mid_y: f64,
}

impl LayoutFrame {
    pub fn new(params: LayoutParams, presence: Presence) -> Self {
        let variant = LayoutVariant::of(presence);
        let entity_width = entity_width(&params);
        let height = height(variant, entity_width);
        let mid_y = mid_y(variant, height, entity_width);
        Self {
            params,
            presence,
            variant,
            entity_width,
            height,
            mid_y,
        }
    }

    pub fn half_entity(&self) -> f64 {
        self.entity_width / 2.0
    }

    /// Centre of a node in the shared node arrangement
    pub fn node_center(&self, node: NodeType) -> Point {
        let half = self.half_entity();
        match node {
            NodeType::Solar => Point::new(MID_X, half),
            NodeType::Battery => Point::new(MID_X, self.height - half),
            NodeType::Grid => Point::new(half, self.mid_y),
            NodeType::House => Point::new(WIDTH - half, self.mid_y),
            NodeType::Custom1 => Point::new(WIDTH - half, half),
            NodeType::Custom2 => Point::new(WIDTH - half, self.height - half),
            NodeType::Eps => Point::new(half, self.height - half),
        }
    }
}

/// Side of a node's circle a line attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// Clockwise turn from 12 o'clock
    fn turn(self) -> f64 {
        match self {
            Side::Top => 0.0,
            Side::Right => 0.25,
            Side::Bottom => 0.5,
            Side::Left => 0.75,
        }
    }
}

impl LayoutFrame {
    /// Point where a line touches a node's circle on the given side
    pub(crate) fn attach(&self, node: NodeType, side: Side) -> Point {
        circle_point(side.turn(), self.half_entity(), self.node_center(node))
    }
}

/// Behaviour every diagram arrangement provides
pub trait LayoutStrategy {
    fn kind(&self) -> LayoutKind;

    /// Height of the drawing space (width is always [`WIDTH`])
    fn height(&self) -> f64;

    /// Vertical position of the grid/house centre line
    fn mid_y(&self) -> f64;

    /// Path for an edge; `None` only for pairs outside the topology
    fn path_for(&self, edge: EdgeKey) -> Option<Path>;

    /// Centre of a node, when the arrangement gives nodes fixed positions
    fn node_center(&self, node: NodeType) -> Option<Point>;
}

/// A built layout, dispatching to its concrete strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Cross(CrossLayout),
    Square(SquareLayout),
    Circle(CircleLayout),
    List(ListLayout),
}

impl Layout {
    /// Build the strategy for `kind`; the list layout also needs the current
    /// edge powers to order its rows
    pub fn build(
        kind: LayoutKind,
        params: LayoutParams,
        presence: Presence,
        powers: &[FlowPower],
    ) -> Self {
        let frame = LayoutFrame::new(params, presence);
        tracing::debug!(
            layout = %kind,
            variant = frame.variant.css_class(),
            height = frame.height,
            "building layout"
        );
        match kind {
            LayoutKind::Cross => Layout::Cross(CrossLayout::new(frame)),
            LayoutKind::Square => Layout::Square(SquareLayout::new(frame)),
            LayoutKind::Circle => Layout::Circle(CircleLayout::new(frame)),
            LayoutKind::List => Layout::List(ListLayout::new(frame, powers)),
        }
    }

    fn strategy(&self) -> &dyn LayoutStrategy {
        match self {
            Layout::Cross(l) => l,
            Layout::Square(l) => l,
            Layout::Circle(l) => l,
            Layout::List(l) => l,
        }
    }

    /// Shared quantities the layout was built from
    pub fn frame(&self) -> &LayoutFrame {
        match self {
            Layout::Cross(l) => l.frame(),
            Layout::Square(l) => l.frame(),
            Layout::Circle(l) => l.frame(),
            Layout::List(l) => l.frame(),
        }
    }
}

impl LayoutStrategy for Layout {
    fn kind(&self) -> LayoutKind {
        self.strategy().kind()
    }

    fn height(&self) -> f64 {
        self.strategy().height()
    }

    fn mid_y(&self) -> f64 {
        self.strategy().mid_y()
    }

    fn path_for(&self, edge: EdgeKey) -> Option<Path> {
        self.strategy().path_for(edge)
    }

    fn node_center(&self, node: NodeType) -> Option<Point> {
        self.strategy().node_center(node)
    }
}
