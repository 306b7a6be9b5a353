//! Conversions between controller steps and physical units.
//!
//! The controller only ever sees integer steps. Micrometre values are derived
//! from the per-axis step size and never sent back as-is.

use crate::command::Axis;

/// Per-axis step size, in micrometres per step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub x_um_per_step: f64,
    pub y_um_per_step: f64,
}

impl Default for Calibration {
    /// 0.1 um per step on both axes.
    fn default() -> Self {
        Self {
            x_um_per_step: 0.1,
            y_um_per_step: 0.1,
        }
    }
}

impl Calibration {
    pub const fn new(x_um_per_step: f64, y_um_per_step: f64) -> Self {
        Self {
            x_um_per_step,
            y_um_per_step,
        }
    }

    /// Step size of a single axis.
    pub fn step_size_um(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x_um_per_step,
            Axis::Y => self.y_um_per_step,
        }
    }

    /// Convert a step position to micrometres.
    pub fn steps_to_um(&self, x: i32, y: i32) -> (f64, f64) {
        (
            x as f64 * self.x_um_per_step,
            y as f64 * self.y_um_per_step,
        )
    }

    /// Convert a micrometre position to the nearest step position.
    pub fn um_to_steps(&self, x_um: f64, y_um: f64) -> (i32, i32) {
        (
            round_to_i32(x_um / self.x_um_per_step),
            round_to_i32(y_um / self.y_um_per_step),
        )
    }
}

/// Round half away from zero, saturating at the `i32` bounds. NaN becomes `0`.
pub(crate) fn round_to_i32(value: f64) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}
