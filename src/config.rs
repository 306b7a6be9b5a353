//! Operational configuration of an XY stage.
//!
//! Use [`StageConfigBuilder`] to create a [`StageConfig`]. Values are held in
//! physical units (micrometres, seconds) and converted to native steps only
//! when a command is built.

use fugit::MillisDurationU32;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::units::{Calibration, round_to_i32};

/// Named stage parameters, as the microscope host knows them.
#[derive(Debug, Display, EnumIter, EnumString, IntoStaticStr, PartialEq, Eq, Clone, Copy)]
pub enum Parameter {
    /// X step size, um per step.
    #[strum(serialize = "StepSize-X")]
    StepSizeX,
    /// Y step size, um per step.
    #[strum(serialize = "StepSize-Y")]
    StepSizeY,
    /// Top speed, um/s.
    Speed,
    /// Start speed, um/s.
    StartSpeed,
    /// Acceleration, um/s^2.
    Acceleration,
}

/// Inclusive range of native values the controller accepts for a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeRange {
    pub min: i32,
    pub max: i32,
}

impl NativeRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Convert a physical value to native units for one axis and clamp it into range.
    pub fn clamp_native(&self, value: f64, um_per_step: f64) -> i32 {
        round_to_i32(value / um_per_step).clamp(self.min, self.max)
    }
}

/// Top speed range, steps per second.
pub const SPEED_RANGE: NativeRange = NativeRange::new(1, 64_000);
/// Start speed range, steps per second.
pub const START_SPEED_RANGE: NativeRange = NativeRange::new(1, 20_000);
/// Acceleration range, steps per second squared.
pub const ACCELERATION_RANGE: NativeRange = NativeRange::new(1, 65_535);

/// A bounded read-retry loop: at most `max_attempts` reads, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: MillisDurationU32,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: MillisDurationU32, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Longest time a poll loop following this policy can block.
    pub fn budget(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.interval.to_millis().saturating_mul(self.max_attempts))
    }
}

/// Busy polling: 10 ms apart, 20 attempts.
pub const DEFAULT_BUSY_POLL: PollPolicy = PollPolicy::new(MillisDurationU32::millis(10), 20);
/// Homing can take a long time: 100 ms apart, one minute in total.
pub const DEFAULT_HOME_POLL: PollPolicy = PollPolicy::new(MillisDurationU32::millis(100), 600);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Step size must be a positive number")]
    InvalidStepSize,
    #[error("Poll policy needs at least one attempt")]
    InvalidPollPolicy,
    #[error("{0} must be a finite number")]
    InvalidRate(Parameter),
}

/// Device configuration state owned by a single stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub(crate) calibration: Calibration,
    pub(crate) speed_um_s: f64,
    pub(crate) start_speed_um_s: f64,
    pub(crate) acceleration_um_s2: f64,
    pub(crate) busy_poll: PollPolicy,
    pub(crate) home_poll: PollPolicy,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            speed_um_s: 2500.0,
            start_speed_um_s: 100.0,
            acceleration_um_s2: 5000.0,
            busy_poll: DEFAULT_BUSY_POLL,
            home_poll: DEFAULT_HOME_POLL,
        }
    }
}

impl StageConfig {
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn busy_poll(&self) -> PollPolicy {
        self.busy_poll
    }

    pub fn home_poll(&self) -> PollPolicy {
        self.home_poll
    }

    /// Read a named parameter in physical units.
    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::StepSizeX => self.calibration.x_um_per_step,
            Parameter::StepSizeY => self.calibration.y_um_per_step,
            Parameter::Speed => self.speed_um_s,
            Parameter::StartSpeed => self.start_speed_um_s,
            Parameter::Acceleration => self.acceleration_um_s2,
        }
    }
}

/// True for values usable as a step size.
pub(crate) fn valid_step_size(um_per_step: f64) -> bool {
    um_per_step.is_finite() && um_per_step > 0.0
}

/// Use this type to create a [`StageConfig`].
#[derive(Debug, Clone, Default)]
pub struct StageConfigBuilder {
    config: StageConfig,
}

impl StageConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step size of both axes.
    pub fn with_step_sizes(mut self, x_um_per_step: f64, y_um_per_step: f64) -> Self {
        self.config.calibration = Calibration::new(x_um_per_step, y_um_per_step);
        self
    }

    /// Nominal top speed, um/s. Clamped into [SPEED_RANGE] by [Self::build].
    pub fn with_speed(mut self, speed_um_s: f64) -> Self {
        self.config.speed_um_s = speed_um_s;
        self
    }

    /// Nominal start speed, um/s. Clamped into [START_SPEED_RANGE] by [Self::build].
    pub fn with_start_speed(mut self, start_speed_um_s: f64) -> Self {
        self.config.start_speed_um_s = start_speed_um_s;
        self
    }

    /// Nominal acceleration, um/s^2. Clamped into [ACCELERATION_RANGE] by [Self::build].
    pub fn with_acceleration(mut self, acceleration_um_s2: f64) -> Self {
        self.config.acceleration_um_s2 = acceleration_um_s2;
        self
    }

    pub fn with_busy_poll(mut self, policy: PollPolicy) -> Self {
        self.config.busy_poll = policy;
        self
    }

    pub fn with_home_poll(mut self, policy: PollPolicy) -> Self {
        self.config.home_poll = policy;
        self
    }

    pub fn build(mut self) -> Result<StageConfig, ConfigError> {
        let cal = self.config.calibration;
        if !valid_step_size(cal.x_um_per_step) || !valid_step_size(cal.y_um_per_step) {
            return Err(ConfigError::InvalidStepSize);
        }
        if self.config.busy_poll.max_attempts == 0 || self.config.home_poll.max_attempts == 0 {
            return Err(ConfigError::InvalidPollPolicy);
        }

        let step = cal.x_um_per_step;
        let config = &mut self.config;
        for (parameter, value, range) in [
            (Parameter::Speed, &mut config.speed_um_s, SPEED_RANGE),
            (Parameter::StartSpeed, &mut config.start_speed_um_s, START_SPEED_RANGE),
            (Parameter::Acceleration, &mut config.acceleration_um_s2, ACCELERATION_RANGE),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidRate(parameter));
            }
            *value = range.clamp_native(*value, step) as f64 * step;
        }
        Ok(self.config)
    }
}
