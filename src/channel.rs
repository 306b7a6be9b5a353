//! Line and byte level access to the serial stream.
//!
//! Commands go out terminated by `\r`. Answers come back terminated by `\n`;
//! a `\r` directly before it is dropped.

use embedded_io::{Error as _, ErrorKind};

use crate::error::{Error, Result};

/// Terminator appended to outgoing commands.
pub const COMMAND_TERMINATOR: u8 = b'\r';
/// Terminator of incoming answer lines.
pub const ANSWER_TERMINATOR: u8 = b'\n';

/// Upper bound on bytes thrown away by a single [`Channel::purge`].
const PURGE_LIMIT: usize = 1024;

/// Wraps any interface implementing [embedded_io::Read], [embedded_io::Write] and [embedded_io::ReadReady].
///
/// [embedded_io::ReadReady] lets the channel look at the receive buffer without
/// blocking for a full read timeout when the line is idle.
pub struct Channel<S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady> {
    interface: S,
}

impl<S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady> Channel<S> {
    pub fn new(interface: S) -> Self {
        Self { interface }
    }

    /// Give the underlying interface back.
    pub fn into_inner(self) -> S {
        self.interface
    }

    #[cfg(test)]
    pub(crate) fn interface(&self) -> &S {
        &self.interface
    }

    /// Send one command line.
    pub fn send_line(&mut self, text: &str) -> Result<(), S::Error> {
        log::debug!("-> {text}");
        self.interface
            .write_all(text.as_bytes())
            .map_err(Error::ChannelError)?;
        self.interface
            .write_all(&[COMMAND_TERMINATOR])
            .map_err(Error::ChannelError)?;
        self.interface.flush().map_err(Error::ChannelError)
    }

    /// Read one answer line, without its terminator.
    ///
    /// If the stream runs dry before the terminator arrives, whatever has been
    /// received so far is returned, which may be an empty line.
    pub fn read_line<const L: usize>(&mut self) -> Result<heapless::String<L>, S::Error> {
        let mut line: heapless::Vec<u8, L> = heapless::Vec::new();
        while let Some(byte) = self.read_byte()? {
            if byte == ANSWER_TERMINATOR {
                break;
            }
            line.push(byte).map_err(|_| Error::BufferError)?;
        }
        if line.last() == Some(&COMMAND_TERMINATOR) {
            line.pop();
        }
        let line = heapless::String::from_utf8(line).map_err(|_| Error::UnrecognizedAnswer)?;
        log::debug!("<- {line}");
        Ok(line)
    }

    /// Read a single byte. `None` means nothing arrived in time.
    pub fn read_byte(&mut self) -> Result<Option<u8>, S::Error> {
        let mut byte = [0u8; 1];
        match self.interface.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if is_no_data(e.kind()) => Ok(None),
            Err(e) => Err(Error::ChannelError(e)),
        }
    }

    /// Read a single byte if one is already waiting, without blocking.
    pub fn try_read_byte(&mut self) -> Result<Option<u8>, S::Error> {
        if !self.ready()? {
            return Ok(None);
        }
        self.read_byte()
    }

    /// Throw away anything already waiting in the receive direction.
    ///
    /// Never waits for more data, so an idle line costs no read timeout.
    pub fn purge(&mut self) -> Result<(), S::Error> {
        let mut scratch = [0u8; 32];
        let mut discarded = 0;
        while discarded < PURGE_LIMIT && self.ready()? {
            match self.interface.read(&mut scratch) {
                Ok(0) => break,
                Ok(count) => discarded += count,
                Err(e) if is_no_data(e.kind()) => break,
                Err(e) => return Err(Error::ChannelError(e)),
            }
        }
        if discarded > 0 {
            log::debug!("purged {discarded} stale bytes");
        }
        Ok(())
    }

    fn ready(&mut self) -> Result<bool, S::Error> {
        self.interface.read_ready().map_err(Error::ChannelError)
    }
}

/// Read errors which only mean that no data was available yet.
fn is_no_data(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::Interrupted)
}
