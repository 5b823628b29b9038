//! Circle layout: satellite edges are quarter arcs of a ring around the
//! middle of the diagram

use std::f64::consts::PI;

use super::{LayoutFrame, LayoutKind, LayoutStrategy, MID_X, WIDTH, circle_mid_y};
use crate::geometry::{Path, Point, arc_path, curve_path, straight_path};
use crate::model::{EdgeKey, NodeType};

#[derive(Debug, Clone, PartialEq)]
pub struct CircleLayout {
    frame: LayoutFrame,
    ring_center: Point,
}

impl CircleLayout {
    pub fn new(frame: LayoutFrame) -> Self {
        let ring_center = Point::new(MID_X, circle_mid_y(frame.presence, frame.height));
        Self { frame, ring_center }
    }

    pub fn frame(&self) -> &LayoutFrame {
        &self.frame
    }

    pub fn radius(&self) -> f64 {
        self.frame.params.circle_size
    }

    pub fn ring_center(&self) -> Point {
        self.ring_center
    }

    /// Percentage of the ring hidden behind each node, and the arc length
    /// left for each quarter. A ring with no circumference hides nothing.
    pub fn offset_and_segment(&self) -> (f64, f64) {
        let circumference = (2.0 * PI * self.radius()).ceil();
        if !(circumference.is_finite() && circumference > 0.0) {
            return (0.0, 25.0);
        }
        let offset = ((self.frame.entity_width / circumference) * 100.0).ceil();
        (offset, 25.0 - offset)
    }

    fn quarter(&self, quarter: u8) -> Path {
        let (offset, segment) = self.offset_and_segment();
        arc_path(
            segment,
            25.0 * f64::from(quarter) + offset / 2.0,
            self.radius(),
            self.ring_center,
        )
    }
}

impl LayoutStrategy for CircleLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Circle
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

        let path = match (edge.from, edge.to) {
            (Solar, House) => self.quarter(0),
            (Battery, House) => self.quarter(1),
            (Battery, Grid) | (Grid, Battery) => self.quarter(2),
            (Solar, Grid) => self.quarter(3),
            (Solar, Battery) => curve_path(MID_X, ew, MID_X, h - ew, 0.0),
            (Grid, House) => curve_path(ew, mid_y, WIDTH - ew, mid_y, 0.0),
            (House, Custom1) => straight_path(WIDTH - half, ew, WIDTH - half, mid_y - half),
            (House, Custom2) => straight_path(WIDTH - half, h - ew, WIDTH - half, mid_y + half),
            _ => return None,
        };
        Some(path)
    }

    fn node_center(&self, node: NodeType) -> Option<Point> {
        if self.frame.params.centre_entity.node() == Some(node) {
            return Some(self.ring_center);
        }
        Some(self.frame.node_center(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{CentreEntity, LayoutParams, Presence};

    fn layout(params: LayoutParams) -> CircleLayout {
        CircleLayout::new(LayoutFrame::new(params, Presence::all()))
    }

    #[test]
    fn segment_leaves_room_for_the_nodes() {
        let layout = layout(LayoutParams::default());
        // circumference ceil(2π·35) = 220, offset ceil(25 / 220 · 100) = 12
        assert_eq!(layout.offset_and_segment(), (12.0, 13.0));
    }

    #[test]
    fn zero_radius_ring_has_finite_paths() {
        let layout = layout(LayoutParams {
            circle_size: 0.0,
            ..LayoutParams::default()
        });
        assert_eq!(layout.offset_and_segment(), (0.0, 25.0));
        for edge in crate::model::TOPOLOGY {
            let path = layout.path_for(edge.key()).unwrap();
            let polyline = path.flatten();
            let end = polyline.point_at_fraction(1.0);
            assert!(polyline.length().is_finite(), "{}", edge.key());
            assert!(end.x.is_finite() && end.y.is_finite(), "{}", edge.key());
            assert!(!path.to_string().contains("NaN"), "{}", edge.key());
        }
    }

    #[test]
    fn arcs_lie_on_the_ring() {
        let layout = layout(LayoutParams::default());
        let center = layout.ring_center();
        for (from, to) in [
            (NodeType::Solar, NodeType::House),
            (NodeType::Battery, NodeType::House),
            (NodeType::Battery, NodeType::Grid),
            (NodeType::Solar, NodeType::Grid),
        ] {
            let path = layout.path_for(EdgeKey::new(from, to)).unwrap();
            let polyline = path.flatten();
            for i in 0..=10 {
                let p = polyline.point_at_fraction(f64::from(i) / 10.0);
                let r = p.distance_to(center);
                assert!((r - 35.0).abs() < 0.1, "{}-{} off ring: {}", from, to, r);
            }
        }
    }

    #[test]
    fn first_quarter_starts_past_twelve_o_clock() {
        let layout = layout(LayoutParams::default());
        let path = layout
            .path_for(EdgeKey::new(NodeType::Solar, NodeType::House))
            .unwrap();
        let start = path.flatten().point_at_length(0.0);
        assert!(start.x > 50.0);
        assert!(start.y < 50.0);
    }

    #[test]
    fn centre_entity_moves_to_the_ring_centre() {
        let params = LayoutParams {
            centre_entity: CentreEntity::House,
            ..LayoutParams::default()
        };
        let layout = layout(params);
        assert_eq!(
            layout.node_center(NodeType::House),
            Some(Point::new(50.0, 50.0))
        );
        assert_eq!(
            layout.node_center(NodeType::Grid),
            Some(Point::new(12.5, 50.0))
        );
    }
}
