//! Easing curves for flow dots
//!
//! Each curve maps linear progress `t` in 0..=1 to a displayed progress in
//! the same range. Dots store their linear progress and only the display
//! position is eased, so every edge advances at the same underlying rate.

use serde::{Deserialize, Serialize};

/// Identity curve
pub fn linear(t: f64) -> f64 {
    t
}

/// Cubic ease-in (slow start)
pub fn ease_in(t: f64) -> f64 {
    t * t * t
}

/// Cubic ease-out (slow end)
pub fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Cubic ease-in-out (slow start and end)
pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t.powi(3)
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Named easing curve selectable per node in the card configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DotEasing {
    #[default]
    Linear,
    #[serde(alias = "easeIn", alias = "ease_in")]
    EaseIn,
    #[serde(alias = "easeOut", alias = "ease_out")]
    EaseOut,
    #[serde(alias = "easeInOut", alias = "ease_in_out")]
    EaseInOut,
}

impl DotEasing {
    /// All curves, in display order
    pub const ALL: [DotEasing; 4] = [
        DotEasing::Linear,
        DotEasing::EaseIn,
        DotEasing::EaseOut,
        DotEasing::EaseInOut,
    ];

    /// Apply the curve to linear progress `t`
    pub fn apply(self, t: f64) -> f64 {
        match self {
            DotEasing::Linear => linear(t),
            DotEasing::EaseIn => ease_in(t),
            DotEasing::EaseOut => ease_out(t),
            DotEasing::EaseInOut => ease_in_out(t),
        }
    }
}
