//! Flow dot animation
//!
//! Every active edge carries a dot that travels along its path at a speed
//! proportional to the edge's power. The driver owns one
//! [`EdgeAnimationState`] per edge and advances all of them once per frame
//! from the frame timestamp alone, so the animation is deterministic for a
//! given sequence of timestamps and powers.

use std::collections::HashMap;

use serde::Serialize;

use crate::easing::DotEasing;
use crate::geometry::{Point, Polyline};
use crate::model::{Edge, EdgeKey, FlowDirection};

/// Fraction of the path covered per millisecond at a speed factor of 1,
/// expressed in percent
const PERCENT_PER_MS: f64 = 0.0075;

/// Advance a dot and return its displayed position.
///
/// `last` is the stored linear position in `[0, 1)`. A dot that reaches the
/// end of its path restarts at exactly 0; otherwise the new linear position
/// is passed through `easing`.
pub fn calculate_dot_position(
    elapsed: f64,
    last: f64,
    speed_factor: f64,
    easing: DotEasing,
) -> f64 {
    let moved = elapsed * PERCENT_PER_MS * speed_factor;
    let mut next = last + moved / 100.0;
    if next >= 1.0 {
        return 0.0;
    }
    if next < 0.0 {
        // negative readings run the dot backwards
        next = (next + 1.0).clamp(0.0, 1.0 - f64::EPSILON);
    }
    easing.apply(next)
}

/// Per-edge animation state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EdgeAnimationState {
    /// Linear position along the path in `[0, 1)`
    pub position: f64,
    /// Power the dot moved at on the last frame
    pub power: f64,
    /// Last drawn dot position
    pub point: Point,
}

/// One edge as the driver sees it on a frame
#[derive(Debug, Clone, Copy)]
pub struct AnimatedEdge<'a> {
    pub edge: Edge,
    pub power: Option<f64>,
    pub path: Option<&'a Polyline>,
    /// Easing of the edge's source node
    pub easing: DotEasing,
}

/// Where to draw an edge's dot on this frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DotFrame {
    pub key: EdgeKey,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub visible: bool,
}

/// Size and speed settings shared by every dot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotSettings {
    pub dot_speed: f64,
    pub dot_size: f64,
}

/// Owns the animation state of every edge
#[derive(Debug, Clone, Default)]
pub struct AnimationDriver {
    states: HashMap<EdgeKey, EdgeAnimationState>,
    previous_timestamp: Option<f64>,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of an edge, once it has been animated
    pub fn state(&self, key: EdgeKey) -> Option<&EdgeAnimationState> {
        self.states.get(&key)
    }

    /// Forget every dot position and the frame clock; used when the layout
    /// changes shape
    pub fn reset(&mut self) {
        tracing::debug!(edges = self.states.len(), "resetting dot positions");
        self.states.clear();
        self.previous_timestamp = None;
    }

    /// Milliseconds since the previous frame; zero on the first frame and
    /// when timestamps go backwards
    fn elapsed(&mut self, timestamp: f64) -> f64 {
        let elapsed = match self.previous_timestamp {
            Some(previous) => (timestamp - previous).max(0.0),
            None => 0.0,
        };
        self.previous_timestamp = Some(timestamp);
        elapsed
    }

    /// Advance every edge to `timestamp` (milliseconds) and return the dots
    /// to draw.
    ///
    /// Edges without a power reading or without a path keep their state and
    /// produce no dot.
    pub fn step(
        &mut self,
        timestamp: f64,
        edges: &[AnimatedEdge<'_>],
        settings: DotSettings,
    ) -> Vec<DotFrame> {
        let elapsed = self.elapsed(timestamp);
        let mut frames = Vec::with_capacity(edges.len());

        for animated in edges {
            let (Some(power), Some(path)) = (animated.power, animated.path) else {
                continue;
            };
            let key = animated.edge.key();
            let state = self.states.entry(key).or_default();

            let speed_factor = (power / 1000.0) * settings.dot_speed;
            let position =
                calculate_dot_position(elapsed, state.position, speed_factor, DotEasing::Linear);
            let mut display =
                calculate_dot_position(elapsed, state.position, speed_factor, animated.easing);
            if animated.edge.direction == FlowDirection::Out {
                display = 1.0 - display;
            }

            if position == 0.0 && state.position > 0.0 {
                tracing::trace!(edge = %key, "dot wrapped");
            }

            let point = path.point_at_fraction(display);
            *state = EdgeAnimationState {
                position,
                power,
                point,
            };

            frames.push(DotFrame {
                key,
                x: point.x,
                y: point.y,
                radius: settings.dot_size / 4.0,
                visible: power != 0.0,
            });
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::straight_path;
    use crate::model::{NodeType, topology_edge};

    fn edge(from: NodeType, to: NodeType) -> Edge {
        topology_edge(EdgeKey::new(from, to)).unwrap()
    }

    const SETTINGS: DotSettings = DotSettings {
        dot_speed: 1.0,
        dot_size: 2.0,
    };

    #[test]
    fn position_advances_with_elapsed_time_and_power() {
        // 1000 ms at 1 kW moves 7.5% of the path
        let p = calculate_dot_position(1000.0, 0.0, 1.0, DotEasing::Linear);
        assert!((p - 0.075).abs() < 1e-12);
        let p = calculate_dot_position(1000.0, 0.0, 2.0, DotEasing::Linear);
        assert!((p - 0.15).abs() < 1e-12);
    }

    #[test]
    fn position_wraps_to_exactly_zero() {
        assert_eq!(calculate_dot_position(100.0, 0.999, 10.0, DotEasing::Linear), 0.0);
        assert_eq!(calculate_dot_position(0.0, 1.0, 1.0, DotEasing::EaseIn), 0.0);
    }

    #[test]
    fn eased_position_differs_from_linear() {
        let linear = calculate_dot_position(1000.0, 0.4, 1.0, DotEasing::Linear);
        let eased = calculate_dot_position(1000.0, 0.4, 1.0, DotEasing::EaseIn);
        assert!((eased - linear.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn first_frame_does_not_move_dots() {
        let path = straight_path(0.0, 0.0, 100.0, 0.0).flatten();
        let edges = [AnimatedEdge {
            edge: edge(NodeType::Solar, NodeType::House),
            power: Some(5000.0),
            path: Some(&path),
            easing: DotEasing::Linear,
        }];
        let mut driver = AnimationDriver::new();
        let frames = driver.step(123_456.0, &edges, SETTINGS);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].x, 0.0);
        assert_eq!(frames[0].radius, 0.5);
        assert!(frames[0].visible);
    }

    #[test]
    fn out_edges_run_backwards() {
        let path = straight_path(0.0, 0.0, 100.0, 0.0).flatten();
        let edges = [
            AnimatedEdge {
                edge: edge(NodeType::Solar, NodeType::House),
                power: Some(1000.0),
                path: Some(&path),
                easing: DotEasing::Linear,
            },
            AnimatedEdge {
                edge: edge(NodeType::Battery, NodeType::House),
                power: Some(1000.0),
                path: Some(&path),
                easing: DotEasing::Linear,
            },
        ];
        let mut driver = AnimationDriver::new();
        driver.step(0.0, &edges, SETTINGS);
        let frames = driver.step(1000.0, &edges, SETTINGS);
        assert!((frames[0].x - 7.5).abs() < 1e-9);
        assert!((frames[1].x - 92.5).abs() < 1e-9);

        let stored = driver
            .state(EdgeKey::new(NodeType::Battery, NodeType::House))
            .unwrap();
        assert!((stored.position - 0.075).abs() < 1e-12);
    }

    #[test]
    fn driver_wraps_dots_back_to_their_start() {
        let path = straight_path(0.0, 0.0, 100.0, 0.0).flatten();
        let inflow = edge(NodeType::Solar, NodeType::House);
        let outflow = edge(NodeType::Battery, NodeType::House);
        let edges = [
            AnimatedEdge {
                edge: inflow,
                power: Some(1000.0),
                path: Some(&path),
                easing: DotEasing::Linear,
            },
            AnimatedEdge {
                edge: outflow,
                power: Some(1000.0),
                path: Some(&path),
                easing: DotEasing::Linear,
            },
        ];
        let settings = DotSettings {
            dot_speed: 5.0,
            dot_size: 2.0,
        };

        // 3.75% of the path per 100 ms frame
        let mut driver = AnimationDriver::new();
        driver.step(0.0, &edges, settings);
        let mut wrapped = None;
        for frame in 1..=40 {
            let before = driver.state(inflow.key()).unwrap().position;
            let frames = driver.step(f64::from(frame) * 100.0, &edges, settings);
            if before > 0.0 && driver.state(inflow.key()).unwrap().position == 0.0 {
                wrapped = Some((frame, frames));
                break;
            }
        }

        let (frame, frames) = wrapped.expect("dot never wrapped");
        assert_eq!(frame, 27);
        assert_eq!(driver.state(inflow.key()).unwrap().position, 0.0);
        assert_eq!(driver.state(outflow.key()).unwrap().position, 0.0);
        assert_eq!((frames[0].x, frames[0].y), (0.0, 0.0));
        assert_eq!((frames[1].x, frames[1].y), (100.0, 0.0));
    }

    #[test]
    fn edges_without_power_or_path_are_frozen() {
        let path = straight_path(0.0, 0.0, 10.0, 0.0).flatten();
        let edges = [
            AnimatedEdge {
                edge: edge(NodeType::Grid, NodeType::House),
                power: None,
                path: Some(&path),
                easing: DotEasing::Linear,
            },
            AnimatedEdge {
                edge: edge(NodeType::Grid, NodeType::Battery),
                power: Some(100.0),
                path: None,
                easing: DotEasing::Linear,
            },
        ];
        let mut driver = AnimationDriver::new();
        assert!(driver.step(0.0, &edges, SETTINGS).is_empty());
        assert!(driver.step(16.0, &edges, SETTINGS).is_empty());
        assert!(driver.state(EdgeKey::new(NodeType::Grid, NodeType::House)).is_none());
    }

    #[test]
    fn zero_power_hides_the_dot() {
        let path = straight_path(0.0, 0.0, 10.0, 0.0).flatten();
        let edges = [AnimatedEdge {
            edge: edge(NodeType::Solar, NodeType::Grid),
            power: Some(0.0),
            path: Some(&path),
            easing: DotEasing::Linear,
        }];
        let mut driver = AnimationDriver::new();
        let frames = driver.step(0.0, &edges, SETTINGS);
        assert!(!frames[0].visible);
    }

    #[test]
    fn reset_clears_positions() {
        let path = straight_path(0.0, 0.0, 10.0, 0.0).flatten();
        let edges = [AnimatedEdge {
            edge: edge(NodeType::Solar, NodeType::Battery),
            power: Some(1000.0),
            path: Some(&path),
            easing: DotEasing::Linear,
        }];
        let mut driver = AnimationDriver::new();
        driver.step(0.0, &edges, SETTINGS);
        driver.step(500.0, &edges, SETTINGS);
        assert!(driver.state(EdgeKey::new(NodeType::Solar, NodeType::Battery)).is_some());
        driver.reset();
        assert!(driver.state(EdgeKey::new(NodeType::Solar, NodeType::Battery)).is_none());
    }
}
