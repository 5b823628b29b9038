//! List layout: one row per active edge, busiest first

use super::{LayoutFrame, LayoutKind, LayoutStrategy, MID_X, WIDTH};
use crate::geometry::{Path, Point, straight_path};
use crate::model::{EdgeKey, FlowDirection, FlowPower, NodeType, topology_edge};

/// One row of the list: a source node, a connector and a target node
#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub key: EdgeKey,
    pub direction: FlowDirection,
    pub value: f64,
    pub path: Path,
    /// Where the power label is drawn
    pub label: Point,
    pub from_center: Point,
    pub to_center: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListLayout {
    frame: LayoutFrame,
    rows: Vec<ListRow>,
}

impl ListLayout {
    pub fn new(frame: LayoutFrame, powers: &[FlowPower]) -> Self {
        let mut layout = Self {
            frame,
            rows: Vec::with_capacity(powers.len()),
        };

        let quarter = frame.entity_width / 4.0;
        let label = Point::new(MID_X, layout.row_y());
        for power in sorted(powers) {
            let key = power.edge.key();
            let path = layout.row_path(power.edge.direction);
            layout.rows.push(ListRow {
                key,
                direction: power.edge.direction,
                value: power.value,
                path,
                label,
                from_center: Point::new(quarter, quarter),
                to_center: Point::new(WIDTH - quarter, quarter),
            });
        }
        layout
    }

    /// Edge keys in the order [`ListLayout::new`] would lay out their rows
    pub fn row_order(powers: &[FlowPower]) -> Vec<EdgeKey> {
        sorted(powers).into_iter().map(|p| p.edge.key()).collect()
    }

    pub fn frame(&self) -> &LayoutFrame {
        &self.frame
    }

    /// Rows in display order
    pub fn rows(&self) -> &[ListRow] {
        &self.rows
    }

    fn row_y(&self) -> f64 {
        self.frame.half_entity() / 2.0
    }

    /// Connector between the two node badges of a row, drawn towards the
    /// target for inflows and back towards the source for outflows
    fn row_path(&self, direction: FlowDirection) -> Path {
        let half = self.frame.half_entity();
        let y = self.row_y();
        match direction {
            FlowDirection::In => straight_path(half, y, WIDTH - half, y),
            FlowDirection::Out => straight_path(WIDTH - half, y, half, y),
        }
    }
}

/// Busiest first; ties keep their topology order
fn sorted(powers: &[FlowPower]) -> Vec<&FlowPower> {
    let mut ordered: Vec<&FlowPower> = powers.iter().collect();
    ordered.sort_by(|a, b| b.value.total_cmp(&a.value));
    ordered
}

impl LayoutStrategy for ListLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::List
    }

    /// Height of a single row
    fn height(&self) -> f64 {
        self.frame.half_entity()
    }

    fn mid_y(&self) -> f64 {
        self.row_y()
    }

    fn path_for(&self, edge: EdgeKey) -> Option<Path> {
        if let Some(row) = self.rows.iter().find(|r| r.key == edge) {
            return Some(row.path.clone());
        }
        topology_edge(edge).map(|e| self.row_path(e.direction))
    }

    fn node_center(&self, _node: NodeType) -> Option<Point> {
        None
    }
}
