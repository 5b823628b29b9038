//! Square layout: satellite edges are drawn curved, angled or straight
//! between the sides of neighbouring nodes

use super::{LayoutFrame, LayoutKind, LayoutStrategy, LineStyle, MID_X, Side, WIDTH};
use crate::geometry::{Path, Point, curve_path, l_shape_path, straight_path};
use crate::model::{EdgeKey, NodeType};

/// Bend of the curved satellite edges, in degrees
const CURVE_ANGLE: f64 = -90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SquareLayout {
    frame: LayoutFrame,
}

impl SquareLayout {
    pub fn new(frame: LayoutFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &LayoutFrame {
        &self.frame
    }

    pub fn line_style(&self) -> LineStyle {
        self.frame.params.line_style
    }

    /// Curved edge between the same end points the cross layout uses
    fn curved(&self, from: NodeType, to: NodeType) -> Option<Path> {
        use NodeType::*;

        let ew = self.frame.entity_width;
        let h = self.frame.height;
        let mid_y = self.frame.mid_y;
        let gap = self.frame.params.line_gap;

        let path = match (from, to) {
            (Solar, House) => curve_path(MID_X + gap, ew, WIDTH - ew, mid_y - gap, CURVE_ANGLE),
            (Battery, House) => {
                curve_path(WIDTH - ew, mid_y + gap, MID_X + gap, h - ew, CURVE_ANGLE)
            }
            (Battery, Grid) | (Grid, Battery) => {
                curve_path(MID_X - gap, h - ew, ew, mid_y + gap, CURVE_ANGLE)
            }
            (Solar, Grid) => curve_path(ew, mid_y - gap, MID_X - gap, ew, CURVE_ANGLE),
            _ => return None,
        };
        Some(path)
    }

    /// End points on the node circles for an angled or straight edge, plus
    /// the elbow direction used when angled
    fn attachments(&self, from: NodeType, to: NodeType) -> Option<(Point, Point, u8)> {
        use NodeType::*;

        let f = &self.frame;
        let ends = match (from, to) {
            (Solar, House) => (f.attach(Solar, Side::Right), f.attach(House, Side::Top), 0),
            (Battery, House) => (f.attach(House, Side::Bottom), f.attach(Battery, Side::Right), 1),
            (Battery, Grid) | (Grid, Battery) => {
                (f.attach(Battery, Side::Left), f.attach(Grid, Side::Bottom), 0)
            }
            (Solar, Grid) => (f.attach(Grid, Side::Top), f.attach(Solar, Side::Left), 1),
            _ => return None,
        };
        Some(ends)
    }
}

impl LayoutStrategy for SquareLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Square
    }

    fn height(&self) -> f64 {
        self.frame.height
    }

    fn mid_y(&self) -> f64 {
        self.frame.mid_y
    }

    fn path_for(&self, edge: EdgeKey) -> Option<Path> {
        use NodeType::*;

        let ew = self.frame.entity_width;
        let half = self.frame.half_entity();
        let h = self.frame.height;
        let mid_y = self.frame.mid_y;

        match (edge.from, edge.to) {
            (Solar, Battery) => Some(curve_path(MID_X, ew, MID_X, h - ew, 0.0)),
            (Grid, House) => Some(curve_path(ew, mid_y, WIDTH - ew, mid_y, 0.0)),
            (House, Custom1) => Some(straight_path(WIDTH - half, ew, WIDTH - half, mid_y - half)),
            (House, Custom2) => Some(straight_path(
                WIDTH - half,
                h - ew,
                WIDTH - half,
                mid_y + half,
            )),
            (from, to) => match self.line_style() {
                LineStyle::Curved => self.curved(from, to),
                LineStyle::Angled => self
                    .attachments(from, to)
                    .map(|(a, b, dir)| l_shape_path(a.x, a.y, b.x, b.y, dir)),
                LineStyle::Straight => self
                    .attachments(from, to)
                    .map(|(a, b, _)| straight_path(a.x, a.y, b.x, b.y)),
            },
        }
    }

    fn node_center(&self, node: NodeType) -> Option<Point> {
        Some(self.frame.node_center(node))
    }
}
