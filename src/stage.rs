use embedded_hal::delay::DelayNs;
use log::{debug, info, trace, warn};

use crate::{
    channel::Channel,
    command::{Axis, MotionCommand, Verb},
    config::{
        ACCELERATION_RANGE, NativeRange, Parameter, PollPolicy, SPEED_RANGE, START_SPEED_RANGE,
        StageConfig, valid_step_size,
    },
    error::{Error, Result},
    response::{Reply, ReplyError, decode},
};

/// Status byte sent by the controller while an axis is moving.
const BUSY: u8 = b'B';

/// You can create a XyStage using any interface which implements [embedded_io::Read],
/// [embedded_io::Write] & [embedded_io::ReadReady], plus a [DelayNs] used between poll attempts.
///
/// Positions are in controller steps unless the method name says `um`. Speed type
/// settings are cached in physical units and only updated once the controller
/// has accepted them. Before that they hold the configured values, which
/// [Self::initialize] does not send.
///
/// `L` is the capacity of the command and answer line buffers.
pub struct XyStage<
    S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady,
    D: DelayNs,
    const L: usize = 64,
> {
    channel: Channel<S>,
    delay: D,
    config: StageConfig,
    /// Position recorded by the last [Self::set_origin], in um.
    origin_um: (f64, f64),
    initialized: bool,
}

impl<S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady, D: DelayNs, const L: usize>
    XyStage<S, D, L>
{
    /// Create a new XyStage from an interface, a delay and a configuration.
    pub fn new(interface: S, delay: D, config: StageConfig) -> Self {
        Self {
            channel: Channel::new(interface),
            delay,
            config,
            origin_um: (0.0, 0.0),
            initialized: false,
        }
    }

    /// Clear stale bytes from the serial line and mark the stage ready for use.
    pub fn initialize(&mut self) -> Result<(), S::Error> {
        self.channel.purge()?;
        self.initialized = true;
        info!("XY stage initialized");
        Ok(())
    }

    pub fn shutdown(&mut self) {
        if self.initialized {
            self.initialized = false;
            info!("XY stage shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Hand back the serial interface and delay.
    pub fn release(self) -> (S, D) {
        (self.channel.into_inner(), self.delay)
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Move both axes to an absolute step position.
    pub fn move_absolute(&mut self, x: i32, y: i32) -> Result<(), S::Error> {
        self.exchange::<0>(&MotionCommand::assign_xy(Verb::Move, x, y))?;
        Ok(())
    }

    /// Move both axes by a signed number of steps.
    pub fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), S::Error> {
        self.exchange::<0>(&MotionCommand::assign_xy(Verb::MovRel, dx, dy))?;
        Ok(())
    }

    /// Return the current step position as reported by the controller.
    pub fn query_position(&mut self) -> Result<(i32, i32), S::Error> {
        self.channel.purge()?;
        let reply = self.exchange::<2>(&MotionCommand::both_axes(Verb::Where))?;
        Ok((reply.field(0)?, reply.field(1)?))
    }

    /// Zero the controller's position counters and record the resulting origin.
    ///
    /// The origin is read back with a separate position query, so a move racing
    /// with this call can be observed half way.
    pub fn set_origin(&mut self) -> Result<(), S::Error> {
        self.channel.purge()?;
        self.exchange::<0>(&MotionCommand::assign_xy(Verb::Here, 0, 0))?;

        let (x, y) = self.query_position()?;
        self.origin_um = self.config.calibration.steps_to_um(x, y);
        info!("origin set at {:?} um", self.origin_um);
        Ok(())
    }

    /// Origin recorded by the last [Self::set_origin], in um.
    pub fn origin_um(&self) -> (f64, f64) {
        self.origin_um
    }

    /// Run the homing sequence and wait for it to settle.
    ///
    /// Homing outlasts the normal answer timeout, so instead of reading an answer
    /// line this waits for any byte under the home poll policy. What arrives, or
    /// whether anything arrives at all, does not change the result.
    pub fn home(&mut self) -> Result<(), S::Error> {
        self.channel.purge()?;
        let command = Self::encode(&MotionCommand::both_axes(Verb::Home))?;
        self.channel.send_line(&command)?;
        info!("homing");

        let policy = self.config.home_poll;
        match self.poll_byte(policy) {
            Some(byte) => debug!("homing finished with status byte {byte:#04x}"),
            None => warn!(
                "no answer to homing within {} ms, continuing",
                policy.budget().to_millis()
            ),
        }
        self.drain();
        Ok(())
    }

    /// Halt all motion. The controller's answer is read and discarded.
    pub fn stop(&mut self) -> Result<(), S::Error> {
        self.channel.purge()?;
        let command = Self::encode(&MotionCommand::bare(Verb::Halt))?;
        self.channel.send_line(&command)?;
        if let Err(e) = self.channel.read_line::<L>() {
            debug!("ignoring answer to HALT: {e:?}");
        }
        Ok(())
    }

    /// Ask whether one axis is still moving.
    ///
    /// Failing to send the query is an error. Once sent, a read failure or no
    /// answer within the busy poll policy counts as not busy.
    pub fn is_axis_busy(&mut self, axis: Axis) -> Result<bool, S::Error> {
        self.channel.purge()?;
        let command = Self::encode(&MotionCommand::single_axis(Verb::Status, axis))?;
        self.channel.send_line(&command)?;

        let busy = self.poll_byte(self.config.busy_poll) == Some(BUSY);
        self.drain();
        trace!("axis {axis} busy: {busy}");
        Ok(busy)
    }

    /// Whether either axis is moving. Any communication failure counts as not busy.
    pub fn busy(&mut self) -> bool {
        [Axis::X, Axis::Y].into_iter().any(|axis| {
            self.is_axis_busy(axis).unwrap_or_else(|e| {
                warn!("status query for axis {axis} failed: {e:?}");
                false
            })
        })
    }

    /// Return the position in um.
    pub fn position_um(&mut self) -> Result<(f64, f64), S::Error> {
        let (x, y) = self.query_position()?;
        Ok(self.config.calibration.steps_to_um(x, y))
    }

    /// Move to an absolute position given in um, rounded to the nearest step.
    pub fn set_position_um(&mut self, x_um: f64, y_um: f64) -> Result<(), S::Error> {
        let (x, y) = self.config.calibration.um_to_steps(x_um, y_um);
        self.move_absolute(x, y)
    }

    /// Move by a distance given in um, rounded to the nearest step.
    pub fn set_relative_position_um(&mut self, dx_um: f64, dy_um: f64) -> Result<(), S::Error> {
        let (dx, dy) = self.config.calibration.um_to_steps(dx_um, dy_um);
        self.move_relative(dx, dy)
    }

    /// The controller reports no travel limits.
    pub fn step_limits(&self) -> Result<(i32, i32, i32, i32), S::Error> {
        Err(Error::Unsupported)
    }

    /// The controller reports no travel limits.
    pub fn limits_um(&self) -> Result<(f64, f64, f64, f64), S::Error> {
        Err(Error::Unsupported)
    }

    pub fn step_size_x_um(&self) -> f64 {
        self.config.calibration.x_um_per_step
    }

    pub fn step_size_y_um(&self) -> f64 {
        self.config.calibration.y_um_per_step
    }

    /// Set the X calibration. Must be positive.
    pub fn set_step_size_x_um(&mut self, um_per_step: f64) -> Result<(), S::Error> {
        if !valid_step_size(um_per_step) {
            return Err(Error::InvalidParameter(Parameter::StepSizeX));
        }
        self.config.calibration.x_um_per_step = um_per_step;
        Ok(())
    }

    /// Set the Y calibration. Must be positive.
    pub fn set_step_size_y_um(&mut self, um_per_step: f64) -> Result<(), S::Error> {
        if !valid_step_size(um_per_step) {
            return Err(Error::InvalidParameter(Parameter::StepSizeY));
        }
        self.config.calibration.y_um_per_step = um_per_step;
        Ok(())
    }

    /// Top speed in um/s. The configured value until a [Self::set_speed] succeeds.
    pub fn get_speed(&self) -> f64 {
        self.config.speed_um_s
    }

    /// Set the top speed in um/s. Returns the speed actually applied after clamping.
    pub fn set_speed(&mut self, speed_um_s: f64) -> Result<f64, S::Error> {
        self.apply_rate(Parameter::Speed, speed_um_s)
    }

    /// Start speed in um/s. The configured value until a [Self::set_start_speed] succeeds.
    pub fn get_start_speed(&self) -> f64 {
        self.config.start_speed_um_s
    }

    /// Set the start speed in um/s. Returns the speed actually applied after clamping.
    pub fn set_start_speed(&mut self, start_speed_um_s: f64) -> Result<f64, S::Error> {
        self.apply_rate(Parameter::StartSpeed, start_speed_um_s)
    }

    /// Acceleration in um/s^2. The configured value until a [Self::set_acceleration] succeeds.
    pub fn get_acceleration(&self) -> f64 {
        self.config.acceleration_um_s2
    }

    /// Set the acceleration in um/s^2. Returns the value actually applied after clamping.
    pub fn set_acceleration(&mut self, acceleration_um_s2: f64) -> Result<f64, S::Error> {
        self.apply_rate(Parameter::Acceleration, acceleration_um_s2)
    }

    /// Read a named parameter.
    pub fn get_parameter(&self, parameter: Parameter) -> f64 {
        self.config.get(parameter)
    }

    /// Write a named parameter. Returns the value in effect afterwards.
    pub fn set_parameter(&mut self, parameter: Parameter, value: f64) -> Result<f64, S::Error> {
        match parameter {
            Parameter::StepSizeX => self.set_step_size_x_um(value).map(|_| value),
            Parameter::StepSizeY => self.set_step_size_y_um(value).map(|_| value),
            Parameter::Speed | Parameter::StartSpeed | Parameter::Acceleration => {
                self.apply_rate(parameter, value)
            }
        }
    }

    /// Clamp a speed type setting into its native range, send it for both axes and cache it.
    fn apply_rate(&mut self, parameter: Parameter, value: f64) -> Result<f64, S::Error> {
        let (verb, range): (Verb, NativeRange) = match parameter {
            Parameter::Speed => (Verb::Speed, SPEED_RANGE),
            Parameter::StartSpeed => (Verb::StSpeed, START_SPEED_RANGE),
            Parameter::Acceleration => (Verb::Accel, ACCELERATION_RANGE),
            Parameter::StepSizeX | Parameter::StepSizeY => {
                return Err(Error::InvalidParameter(parameter));
            }
        };
        if !value.is_finite() {
            return Err(Error::InvalidParameter(parameter));
        }

        let cal = self.config.calibration;
        let native_x = range.clamp_native(value, cal.x_um_per_step);
        let native_y = range.clamp_native(value, cal.y_um_per_step);
        self.exchange::<0>(&MotionCommand::assign_xy(verb, native_x, native_y))?;

        let applied = native_x as f64 * cal.x_um_per_step;
        match parameter {
            Parameter::Speed => self.config.speed_um_s = applied,
            Parameter::StartSpeed => self.config.start_speed_um_s = applied,
            _ => self.config.acceleration_um_s2 = applied,
        }
        debug!("{parameter} set to {applied}");
        Ok(applied)
    }

    fn encode(command: &MotionCommand) -> Result<heapless::String<L>, S::Error> {
        command.encode::<L>().ok_or(Error::BufferError)
    }

    /// Send a command and decode its answer line.
    fn exchange<const N: usize>(&mut self, command: &MotionCommand) -> Result<Reply<N>, S::Error> {
        let text = Self::encode(command)?;
        self.channel.send_line(&text)?;
        let answer = self.channel.read_line::<L>()?;
        decode::<N>(&answer).map_err(|e| {
            if let ReplyError::DeviceReportedError(code) = e {
                warn!("{} rejected with error {code}", command.verb());
            }
            Error::from(e)
        })
    }

    /// Wait for a single raw byte, at most `policy.max_attempts` checks with
    /// `policy.interval` after each empty one. A read failure ends the wait.
    fn poll_byte(&mut self, policy: PollPolicy) -> Option<u8> {
        for attempt in 1..=policy.max_attempts {
            match self.channel.try_read_byte() {
                Ok(Some(byte)) => return Some(byte),
                Ok(None) => trace!("poll attempt {attempt}: no data"),
                Err(e) => {
                    warn!("poll read failed: {e:?}");
                    return None;
                }
            }
            self.delay.delay_ms(policy.interval.to_millis());
        }
        None
    }

    /// Drop the remainder of a raw answer so the next command starts clean.
    fn drain(&mut self) {
        if let Err(e) = self.channel.purge() {
            debug!("purge after poll failed: {e:?}");
        }
    }
}
