//! Our error types for the CytoWorks XY stage.

use thiserror::Error;

use crate::{config::Parameter, response::ReplyError};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Numeric error codes understood by the microscope host.
///
/// [`Error::code`] maps every error onto one of these, apart from
/// [`Error::DeviceReportedError`] which passes the controller's own code through.
pub mod codes {
    pub const UNSUPPORTED_COMMAND: i32 = 11;
    pub const INVALID_SPEED: i32 = 10003;
    pub const INVALID_STEP_SIZE: i32 = 10006;
    pub const UNRECOGNIZED_ANSWER: i32 = 10010;
    pub const NO_ANSWER: i32 = 10013;
    pub const COMMAND_FAILED: i32 = 10014;
    pub const INVALID_PACKET_LENGTH: i32 = 10020;
    pub const SERIAL_COMMAND_FAILED: i32 = 10101;
}

/// Custom error type for CytoWorks stage communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("No answer from the controller")]
    EmptyResponse,
    #[error("Unrecognized answer received")]
    UnrecognizedAnswer,
    #[error("Command failed")]
    CommandFailed,
    #[error("Controller reported error {0}")]
    DeviceReportedError(u32),
    #[error("Serial communication error")]
    ChannelError(I),
    #[error("Invalid value for {0}")]
    InvalidParameter(Parameter),
    #[error("Command or answer does not fit the buffer")]
    BufferError,
    #[error("Operation not supported by the controller")]
    Unsupported,
}

impl<I: embedded_io::Error> Error<I> {
    /// The host error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::EmptyResponse => codes::NO_ANSWER,
            Error::UnrecognizedAnswer => codes::UNRECOGNIZED_ANSWER,
            Error::CommandFailed => codes::COMMAND_FAILED,
            Error::DeviceReportedError(code) => i32::try_from(*code).unwrap_or(i32::MAX),
            Error::ChannelError(_) => codes::SERIAL_COMMAND_FAILED,
            Error::InvalidParameter(Parameter::StepSizeX | Parameter::StepSizeY) => {
                codes::INVALID_STEP_SIZE
            }
            Error::InvalidParameter(_) => codes::INVALID_SPEED,
            Error::BufferError => codes::INVALID_PACKET_LENGTH,
            Error::Unsupported => codes::UNSUPPORTED_COMMAND,
        }
    }
}

impl<I: embedded_io::Error> From<ReplyError> for Error<I> {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::EmptyResponse => Error::EmptyResponse,
            ReplyError::UnrecognizedAnswer => Error::UnrecognizedAnswer,
            ReplyError::CommandFailed => Error::CommandFailed,
            ReplyError::DeviceReportedError(code) => Error::DeviceReportedError(code),
        }
    }
}
