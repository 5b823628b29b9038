//! Path geometry for flow lines
//!
//! Pure functions that build vector paths in the normalised 100-wide drawing
//! space used by every layout. A [`Path`] renders to SVG path data through
//! `Display`, and [`Path::flatten`] turns it into a [`Polyline`] that can be
//! sampled by arc length for the moving flow dots.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Subdivisions used when flattening a quadratic segment.
const QUAD_STEPS: usize = 24;

/// Maximum angle (radians) covered by one chord when flattening an arc.
const ARC_STEP: f64 = PI / 48.0;

/// Distance the full-circle arc stops short of its start point.
///
/// A closed 360° arc has identical end points and renders as nothing, so a
/// "complete" ring ends just before where it began.
const FULL_CIRCLE_GAP: f64 = 0.01;

/// A point in drawing coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other` (`t` in 0..=1)
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A single path-data command
#[derive(Debug, Clone, PartialEq)]
pub enum PathCommand {
    /// `M x,y`
    MoveTo(Point),
    /// `L x,y`
    LineTo(Point),
    /// `H x`
    Horizontal(f64),
    /// `V y`
    Vertical(f64),
    /// `Q cx,cy x,y`
    Quad { control: Point, to: Point },
    /// `q dcx,dcy dx,dy` with offsets relative to the current point
    QuadRelative { control: Point, to: Point },
    /// `A r r 0 large sweep x,y` (circular, no rotation)
    Arc {
        radius: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
}

impl fmt::Display for PathCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCommand::MoveTo(p) => write!(f, "M {},{}", p.x, p.y),
            PathCommand::LineTo(p) => write!(f, "L {},{}", p.x, p.y),
            PathCommand::Horizontal(x) => write!(f, "H {}", x),
            PathCommand::Vertical(y) => write!(f, "V {}", y),
            PathCommand::Quad { control, to } => {
                write!(f, "Q {},{} {},{}", control.x, control.y, to.x, to.y)
            }
            PathCommand::QuadRelative { control, to } => {
                write!(f, "q {},{} {},{}", control.x, control.y, to.x, to.y)
            }
            PathCommand::Arc {
                radius,
                large_arc,
                sweep,
                to,
            } => write!(
                f,
                "A {} {} 0 {} {} {},{}",
                radius,
                radius,
                u8::from(*large_arc),
                u8::from(*sweep),
                to.x,
                to.y
            ),
        }
    }
}

/// An ordered list of path commands
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    /// Start a path at the given point
    pub fn starting_at(x: f64, y: f64) -> Self {
        Self {
            commands: vec![PathCommand::MoveTo(Point::new(x, y))],
        }
    }

    /// Append a command
    pub fn push(&mut self, command: PathCommand) {
        self.commands.push(command);
    }

    /// Builder-style append
    pub fn then(mut self, command: PathCommand) -> Self {
        self.push(command);
        self
    }

    /// The commands making up this path
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Whether the path has no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Convert the path into straight segments for length sampling
    pub fn flatten(&self) -> Polyline {
        let mut polyline = Polyline::default();
        let mut current = Point::default();

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    if polyline.segments.is_empty() {
                        polyline.start = p;
                    }
                    current = p;
                }
                PathCommand::LineTo(p) => {
                    polyline.push(current, p);
                    current = p;
                }
                PathCommand::Horizontal(x) => {
                    let p = Point::new(x, current.y);
                    polyline.push(current, p);
                    current = p;
                }
                PathCommand::Vertical(y) => {
                    let p = Point::new(current.x, y);
                    polyline.push(current, p);
                    current = p;
                }
                PathCommand::Quad { control, to } => {
                    flatten_quad(&mut polyline, current, control, to);
                    current = to;
                }
                PathCommand::QuadRelative { control, to } => {
                    let control = Point::new(current.x + control.x, current.y + control.y);
                    let to = Point::new(current.x + to.x, current.y + to.y);
                    flatten_quad(&mut polyline, current, control, to);
                    current = to;
                }
                PathCommand::Arc {
                    radius,
                    large_arc,
                    sweep,
                    to,
                } => {
                    flatten_arc(&mut polyline, current, radius, large_arc, sweep, to);
                    current = to;
                }
            }
        }

        polyline
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}

fn flatten_quad(polyline: &mut Polyline, from: Point, control: Point, to: Point) {
    let mut prev = from;
    for step in 1..=QUAD_STEPS {
        let t = step as f64 / QUAD_STEPS as f64;
        let mt = 1.0 - t;
        let p = Point::new(
            mt * mt * from.x + 2.0 * mt * t * control.x + t * t * to.x,
            mt * mt * from.y + 2.0 * mt * t * control.y + t * t * to.y,
        );
        polyline.push(prev, p);
        prev = p;
    }
}

/// Flatten a circular arc given in SVG endpoint form.
///
/// Follows the endpoint-to-centre conversion of SVG 1.1 (appendix F.6.5)
/// specialised to `rx == ry` and no axis rotation.
fn flatten_arc(
    polyline: &mut Polyline,
    from: Point,
    radius: f64,
    large_arc: bool,
    sweep: bool,
    to: Point,
) {
    if from == to {
        return;
    }
    let mut r = radius.abs();
    if r == 0.0 {
        polyline.push(from, to);
        return;
    }

    let hx = (from.x - to.x) / 2.0;
    let hy = (from.y - to.y) / 2.0;

    let lambda = (hx * hx + hy * hy) / (r * r);
    if lambda > 1.0 {
        r *= lambda.sqrt();
    }

    let r2 = r * r;
    let denom = r2 * hy * hy + r2 * hx * hx;
    let num = (r2 * r2 - denom).max(0.0);
    let sign = if large_arc == sweep { -1.0 } else { 1.0 };
    let coef = sign * (num / denom).sqrt();

    let ccx = coef * hy;
    let ccy = -coef * hx;
    let center = Point::new(ccx + (from.x + to.x) / 2.0, ccy + (from.y + to.y) / 2.0);

    let theta1 = ((hy - ccy) / r).atan2((hx - ccx) / r);
    let theta2 = ((-hy - ccy) / r).atan2((-hx - ccx) / r);
    let mut delta = theta2 - theta1;
    if sweep && delta < 0.0 {
        delta += 2.0 * PI;
    } else if !sweep && delta > 0.0 {
        delta -= 2.0 * PI;
    }

    let steps = ((delta.abs() / ARC_STEP).ceil() as usize).max(1);
    let mut prev = from;
    for step in 1..steps {
        let theta = theta1 + delta * (step as f64 / steps as f64);
        let p = Point::new(center.x + r * theta.cos(), center.y + r * theta.sin());
        polyline.push(prev, p);
        prev = p;
    }
    polyline.push(prev, to);
}

/// One straight piece of a flattened path
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: Point,
    end: Point,
    /// Path length at the end of this segment
    cumulative: f64,
}

/// A flattened path that can be sampled by arc length
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline {
    start: Point,
    segments: Vec<Segment>,
}

impl Polyline {
    fn push(&mut self, start: Point, end: Point) {
        debug_assert!(start.is_finite() && end.is_finite(), "non-finite path point");
        if self.segments.is_empty() {
            self.start = start;
        }
        let cumulative = self.length() + start.distance_to(end);
        self.segments.push(Segment {
            start,
            end,
            cumulative,
        });
    }

    /// Total length of the path
    pub fn length(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.cumulative)
    }

    /// Point at the given distance along the path (clamped to the path)
    pub fn point_at_length(&self, length: f64) -> Point {
        let Some(last) = self.segments.last() else {
            return self.start;
        };
        if length.is_nan() || length <= 0.0 {
            return self.start;
        }
        if length >= last.cumulative {
            return last.end;
        }

        let index = self.segments.partition_point(|s| s.cumulative < length);
        let segment = self.segments[index];
        let seg_start = if index == 0 {
            0.0
        } else {
            self.segments[index - 1].cumulative
        };
        let seg_len = segment.cumulative - seg_start;
        if seg_len <= 0.0 {
            return segment.end;
        }
        segment.start.lerp(segment.end, (length - seg_start) / seg_len)
    }

    /// Point at a fraction (0..=1) of the total length
    pub fn point_at_fraction(&self, fraction: f64) -> Point {
        self.point_at_length(self.length() * fraction)
    }
}

/// Quadratic curve between two points.
///
/// With `curve == 0` the control point sits on the chord midpoint, giving a
/// straight line. Otherwise the control point is pushed off the chord by
/// `|dist / (2·sin(curve°))|`, to the left of travel for positive angles and
/// to the right for negative ones.
pub fn curve_path(start_x: f64, start_y: f64, end_x: f64, end_y: f64, curve: f64) -> Path {
    let mid_x = (start_x + end_x) / 2.0;
    let mid_y = (start_y + end_y) / 2.0;

    let dist_x = end_x - start_x;
    let dist_y = end_y - start_y;
    let dist = (dist_x * dist_x + dist_y * dist_y).sqrt();
    let angle = dist_y.atan2(dist_x);

    let mut control = Point::new(mid_x, mid_y);
    if curve != 0.0 {
        let curve_dist = (dist / (2.0 * (curve * PI / 180.0).sin())).abs();
        let curve_dir = if curve > 0.0 { -1.0 } else { 1.0 };
        let perp_angle = angle + (curve_dir * PI) / 2.0;
        control = Point::new(
            mid_x + curve_dist * perp_angle.cos(),
            mid_y + curve_dist * perp_angle.sin(),
        );
    }
    debug_assert!(control.is_finite(), "non-finite curve control point");

    Path::starting_at(start_x, start_y).then(PathCommand::Quad {
        control,
        to: Point::new(end_x, end_y),
    })
}

/// Clockwise circular arc covering `percentage` of a full turn.
///
/// The arc starts `offset_percentage` of a turn after 12 o'clock. A full
/// circle (100%) ends [`FULL_CIRCLE_GAP`] units to the left of the start
/// point so the arc never closes onto itself.
pub fn arc_path(percentage: f64, offset_percentage: f64, radius: f64, center: Point) -> Path {
    let offset = (offset_percentage / 100.0) * 360.0;
    let start_angle = -90.0 + offset;
    let end_angle = if percentage == 100.0 {
        start_angle + 360.0
    } else {
        start_angle + (percentage / 100.0) * 360.0
    };

    let start_radians = start_angle * PI / 180.0;
    let end_radians = end_angle * PI / 180.0;

    let start = Point::new(
        center.x + radius * start_radians.cos(),
        center.y + radius * start_radians.sin(),
    );
    let end = Point::new(
        if percentage == 100.0 {
            start.x - FULL_CIRCLE_GAP
        } else {
            center.x + radius * end_radians.cos()
        },
        center.y + radius * end_radians.sin(),
    );
    debug_assert!(start.is_finite() && end.is_finite(), "non-finite arc point");

    Path::starting_at(start.x, start.y).then(PathCommand::Arc {
        radius,
        large_arc: end_angle - start_angle > 180.0,
        sweep: true,
        to: end,
    })
}

/// L-shaped path with one rounded corner.
///
/// `direction` names the corner of the cross layout the path wraps around:
/// 0 (top right) and 3 (bottom left) leave the start point vertically, 1 (top
/// left) and 2 (bottom right) leave it horizontally. The fillet radius is
/// clamped to the shorter leg.
pub fn rounded_corner_path(
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    radius: f64,
    direction: u8,
) -> Path {
    let dx = end_x - start_x;
    let dy = end_y - start_y;
    let r = radius.max(0.0).min(dx.abs()).min(dy.abs());
    let sx = if dx < 0.0 { -1.0 } else { 1.0 };
    let sy = if dy < 0.0 { -1.0 } else { 1.0 };
    let vertical_first = matches!(direction % 4, 0 | 3);

    let mut path = Path::starting_at(start_x, start_y);
    if vertical_first {
        path.push(PathCommand::Vertical(end_y - sy * r));
        if r > 0.0 {
            path.push(PathCommand::QuadRelative {
                control: Point::new(0.0, sy * r),
                to: Point::new(sx * r, sy * r),
            });
        }
        path.push(PathCommand::Horizontal(end_x));
    } else {
        path.push(PathCommand::Horizontal(end_x - sx * r));
        if r > 0.0 {
            path.push(PathCommand::QuadRelative {
                control: Point::new(sx * r, 0.0),
                to: Point::new(sx * r, sy * r),
            });
        }
        path.push(PathCommand::Vertical(end_y));
    }
    path
}

/// Axis-aligned elbow: direction 0 goes horizontal then vertical, any other
/// direction goes vertical then horizontal.
pub fn l_shape_path(start_x: f64, start_y: f64, end_x: f64, end_y: f64, direction: u8) -> Path {
    let path = Path::starting_at(start_x, start_y);
    if direction == 0 {
        path.then(PathCommand::Horizontal(end_x))
            .then(PathCommand::Vertical(end_y))
    } else {
        path.then(PathCommand::Vertical(end_y))
            .then(PathCommand::Horizontal(end_x))
    }
}

/// Direct line between two points
pub fn straight_path(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Path {
    Path::starting_at(start_x, start_y).then(PathCommand::LineTo(Point::new(end_x, end_y)))
}

/// Point on a circle, `fraction` of a clockwise turn after 12 o'clock.
///
/// Coordinates are rounded to nine decimals so quarter turns land exactly on
/// the axes through `center`.
pub fn circle_point(fraction: f64, radius: f64, center: Point) -> Point {
    let angle = fraction * 2.0 * PI - PI / 2.0;
    let (sin, cos) = angle.sin_cos();
    Point::new(
        snap(center.x + radius * cos),
        snap(center.y + radius * sin),
    )
}

fn snap(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}
