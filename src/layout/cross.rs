//! Cross layout: satellite edges wrap around the centre cross with one
//! rounded corner each

use super::{LayoutFrame, LayoutKind, LayoutStrategy, MID_X, WIDTH};
use crate::geometry::{Path, Point, curve_path, rounded_corner_path, straight_path};
use crate::model::{EdgeKey, NodeType};

#[derive(Debug, Clone, PartialEq)]
pub struct CrossLayout {
    frame: LayoutFrame,
}

impl CrossLayout {
    pub fn new(frame: LayoutFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &LayoutFrame {
        &self.frame
    }

    /// Horizontal gap between parallel lines; halved when the vertical
    /// axis is missing an end
    fn x_line_gap(&self) -> f64 {
        let presence = self.frame.presence;
        if !presence.solar || !presence.battery {
            self.frame.params.line_gap / 2.0
        } else {
            self.frame.params.line_gap
        }
    }
}

impl LayoutStrategy for CrossLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Cross
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
        let gap = self.frame.params.line_gap;
        let x_gap = self.x_line_gap();
        let r = self.frame.params.corner_radius;

        let path = match (edge.from, edge.to) {
            (Solar, House) => {
                rounded_corner_path(MID_X + x_gap, ew, WIDTH - ew, mid_y - gap, r, 0)
            }
            (Battery, House) => {
                rounded_corner_path(WIDTH - ew, mid_y + gap, MID_X + x_gap, h - ew, r, 2)
            }
            (Battery, Grid) | (Grid, Battery) => {
                rounded_corner_path(MID_X - x_gap, h - ew, ew, mid_y + gap, r, 3)
            }
            (Solar, Grid) => rounded_corner_path(ew, mid_y - gap, MID_X - x_gap, ew, r, 1),
            (Solar, Battery) => curve_path(MID_X, ew, MID_X, h - ew, 0.0),
            (Grid, House) => curve_path(ew, mid_y, WIDTH - ew, mid_y, 0.0),
            (House, Custom1) => straight_path(WIDTH - half, ew, WIDTH - half, mid_y - half),
            (House, Custom2) => straight_path(WIDTH - half, h - ew, WIDTH - half, mid_y + half),
            _ => return None,
        };
        Some(path)
    }

    fn node_center(&self, node: NodeType) -> Option<Point> {
        Some(self.frame.node_center(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutParams, Presence};

    fn layout(line_gap: f64, presence: Presence) -> CrossLayout {
        let params = LayoutParams {
            line_gap,
            ..LayoutParams::default()
        };
        CrossLayout::new(LayoutFrame::new(params, presence))
    }

    fn path(layout: &CrossLayout, from: NodeType, to: NodeType) -> String {
        layout
            .path_for(EdgeKey::new(from, to))
            .map(|p| p.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn solar_to_house_turns_at_the_top_right_corner() {
        let layout = layout(0.0, Presence::all());
        insta::assert_snapshot!(
            path(&layout, NodeType::Solar, NodeType::House),
            @"M 50,25 V 40 q 0,10 10,10 H 75"
        );
    }

    #[test]
    fn solar_to_grid_turns_at_the_top_left_corner() {
        let layout = layout(0.0, Presence::all());
        insta::assert_snapshot!(
            path(&layout, NodeType::Solar, NodeType::Grid),
            @"M 25,50 H 40 q 10,0 10,-10 V 25"
        );
    }

    #[test]
    fn grid_and_battery_share_one_path() {
        let layout = layout(2.0, Presence::all());
        assert_eq!(
            path(&layout, NodeType::Grid, NodeType::Battery),
            path(&layout, NodeType::Battery, NodeType::Grid)
        );
    }

    #[test]
    fn line_gap_is_halved_without_solar() {
        let presence = Presence {
            solar: false,
            ..Presence::all()
        };
        let full = layout(4.0, Presence::all());
        let partial = layout(4.0, presence);
        assert_eq!(full.x_line_gap(), 4.0);
        assert_eq!(partial.x_line_gap(), 2.0);
    }

    #[test]
    fn custom_edges_run_vertically_beside_the_house() {
        let layout = layout(0.0, Presence::all());
        insta::assert_snapshot!(
            path(&layout, NodeType::House, NodeType::Custom1),
            @"M 87.5,25 L 87.5,37.5"
        );
        insta::assert_snapshot!(
            path(&layout, NodeType::House, NodeType::Custom2),
            @"M 87.5,75 L 87.5,62.5"
        );
    }

    #[test]
    fn unknown_pairs_have_no_path() {
        let layout = layout(0.0, Presence::all());
        assert!(layout.path_for(EdgeKey::new(NodeType::Eps, NodeType::House)).is_none());
    }
}
