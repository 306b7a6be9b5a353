//! This crate provides an interface for communicating with and controlling the CytoWorks motorized XY microscope stage.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! The stage controller speaks a line based ASCII protocol. Every command is a verb followed by
//! its operands, both axes always travelling in a single command:
//! * `MOVE X=120 Y=45` - absolute move, in controller steps.
//! * `MOVREL X=-10 Y=0` - relative move.
//! * `WHERE X Y` - position query, answered with `:A <x> <y>`.
//! * `HERE X=0 Y=0` - zero the position counters.
//! * `HOME X Y`, `HALT`, `STATUS X`.
//! * `SPEED`, `STSPEED`, `ACCEL` - speed type settings, in steps per second (squared).
//!
//! Answers start with `:A` on success, or `:N<code>` on failure.
//!
//! Any transport implementing [embedded_io::Read], [embedded_io::Write] & [embedded_io::ReadReady] can be
//! used, together with an [embedded_hal::delay::DelayNs] for the status polling loops. See [stage::XyStage].
//!
//! The serial port used for stage comms should be configured like so:
//! * Baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * Handshaking: Off
//! * Read timeout: 500 ms

#![cfg_attr(feature = "no_std", no_std)]

pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod response;
pub mod stage;
pub mod units;

pub use command::Axis;
pub use config::{Parameter, StageConfig, StageConfigBuilder};
pub use error::{Error, Result};
pub use stage::XyStage;

#[cfg(test)]
mod mock_serial;
