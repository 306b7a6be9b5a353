//! Decoding of controller answers.
//!
//! Every answer line starts with a sentinel token:
//! * `:A` - success, optionally followed by space separated integer fields.
//! * `:N<code>` - failure, with the controller's error code appended directly.

use thiserror::Error;

const SUCCESS: &str = ":A";
const FAILURE: &str = ":N";

/// Reasons an answer line does not signal success.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReplyError {
    #[error("Empty answer")]
    EmptyResponse,
    #[error("Unrecognized answer")]
    UnrecognizedAnswer,
    #[error("Command failed without an error code")]
    CommandFailed,
    #[error("Controller reported error {0}")]
    DeviceReportedError(u32),
}

/// A successful answer, carrying up to `N` integer fields in the order the controller sent them.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Reply<const N: usize> {
    fields: heapless::Vec<i32, N>,
}

impl<const N: usize> Reply<N> {
    /// Field at `index`, or [`ReplyError::UnrecognizedAnswer`] if the controller sent fewer fields.
    pub fn field(&self, index: usize) -> Result<i32, ReplyError> {
        self.fields
            .get(index)
            .copied()
            .ok_or(ReplyError::UnrecognizedAnswer)
    }

    pub fn fields(&self) -> &[i32] {
        &self.fields
    }
}

/// Decode an answer line. Trailing line terminators are ignored.
///
/// Fields beyond the first `N` are dropped.
pub fn decode<const N: usize>(raw: &str) -> Result<Reply<N>, ReplyError> {
    let raw = raw.trim_end_matches(['\r', '\n']);
    if raw.is_empty() {
        return Err(ReplyError::EmptyResponse);
    }

    let mut tokens = raw.split_whitespace();
    let outcome = tokens.next().ok_or(ReplyError::UnrecognizedAnswer)?;

    if outcome == SUCCESS {
        let fields = tokens
            .take(N)
            .map(|token| token.parse::<i32>())
            .collect::<Result<heapless::Vec<i32, N>, _>>()
            .map_err(|_| ReplyError::UnrecognizedAnswer)?;
        Ok(Reply { fields })
    } else if let Some(code) = outcome.strip_prefix(FAILURE) {
        match code.parse::<i64>() {
            Ok(code) if code > 0 => Err(ReplyError::DeviceReportedError(
                u32::try_from(code).unwrap_or(u32::MAX),
            )),
            _ => Err(ReplyError::CommandFailed),
        }
    } else {
        Err(ReplyError::UnrecognizedAnswer)
    }
}
