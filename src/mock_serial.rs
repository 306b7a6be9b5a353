//! We use this mocking module in unit tests to emulate the stage controller's serial port.

/// Our mock type used to emulate a serial port.
///
/// Scripted replies are held back until a complete command (ending in `\r`)
/// has been written, then become readable, one reply per command.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 512>,
    /// Buffer containing data which can currently be read
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Replies released one by one as commands are written
    replies: heapless::Deque<heapless::Vec<u8, 64>, 8>,
    /// Number of read calls made, successful or not
    read_calls: usize,
    /// Read calls which found nothing to read. A real port blocks for its
    /// full timeout on each of these.
    idle_reads: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    /// Simulate read errors once this many read calls have been made
    read_error_after: Option<usize>,
}

#[derive(thiserror::Error, Debug)]
pub enum MockSerialError {
    /// Buffer overflow
    #[error("Mock buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("Simulated serial error")]
    SimulatedError,
    /// No data available, as a real port reports a read timeout
    #[error("Read timed out")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::TimedOut,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        let available_space = self.write_buffer.capacity() - self.write_buffer.len();
        if buf.len() > available_space {
            return Err(MockSerialError::BufferOverflow);
        }

        for &byte in buf {
            self.write_buffer
                .push(byte)
                .map_err(|_| MockSerialError::BufferOverflow)?;
            if byte == b'\r' {
                self.release_reply()?;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_calls += 1;
        if self.read_failing() {
            return Err(MockSerialError::SimulatedError);
        }

        if !self.has_unread_data() {
            self.idle_reads += 1;
            return Err(MockSerialError::WouldBlock);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let bytes_to_read = core::cmp::min(buf.len(), available_bytes);

        buf[..bytes_to_read]
            .copy_from_slice(&self.read_buffer[self.read_position..self.read_position + bytes_to_read]);

        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.read_failing() {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(self.has_unread_data())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            replies: heapless::Deque::new(),
            read_calls: 0,
            idle_reads: 0,
            should_error_on_write: false,
            should_error_on_read: false,
            read_error_after: None,
        }
    }

    /// Create a mock which answers successive commands with `replies`.
    pub fn with_replies(replies: &[&[u8]]) -> Self {
        let mut mock = Self::new();
        for reply in replies {
            mock.queue_reply(reply).unwrap();
        }
        mock
    }

    /// Set the data that can be read immediately, replacing anything unread
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;

        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Queue a reply that becomes readable once the next command has been written
    pub fn queue_reply(&mut self, reply: &[u8]) -> Result<(), MockSerialError> {
        let reply = heapless::Vec::from_slice(reply).map_err(|_| MockSerialError::BufferOverflow)?;
        self.replies
            .push_back(reply)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Move the next queued reply, if any, behind the unread data
    fn release_reply(&mut self) -> Result<(), MockSerialError> {
        let Some(reply) = self.replies.pop_front() else {
            return Ok(());
        };
        let mut pending: heapless::Vec<u8, 256> =
            heapless::Vec::from_slice(&self.read_buffer[self.read_position..])
                .map_err(|_| MockSerialError::BufferOverflow)?;
        pending
            .extend_from_slice(&reply)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        self.read_buffer = pending;
        self.read_position = 0;
        Ok(())
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Written data split into commands, terminators removed
    pub fn written_commands(&self) -> Vec<String> {
        self.write_buffer
            .split(|&b| b == b'\r')
            .filter(|c| !c.is_empty())
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }

    /// Number of read calls made so far
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Number of read calls made while nothing was readable
    pub fn idle_reads(&self) -> usize {
        self.idle_reads
    }

    fn has_unread_data(&self) -> bool {
        self.read_position < self.read_buffer.len()
    }

    fn read_failing(&self) -> bool {
        self.should_error_on_read
            || self
                .read_error_after
                .is_some_and(|limit| self.read_calls > limit)
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Let the next `calls` reads behave normally, then fail every read after them
    pub fn set_read_error_after(&mut self, calls: usize) {
        self.read_error_after = Some(self.read_calls + calls);
    }
}

/// Delay which only keeps count, so tests never sleep.
#[derive(Debug, Default)]
pub struct MockDelay {
    calls: u32,
    total_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delay calls made so far
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Sum of all requested delays, in milliseconds
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_ns += u64::from(us) * 1_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;
    use embedded_io::{Error, Read, ReadReady, Write};

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let test_data = b"MOVE X=1 Y=2";

        let result = mock.write(test_data);
        assert_eq!(result.unwrap(), test_data.len());
        assert_eq!(mock.written_data(), test_data);
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 600]; // Larger than 512 byte capacity

        let result = mock.write(&large_data);
        assert!(matches!(result.unwrap_err(), MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_read_timeout_when_no_data() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];

        let result = mock.read(&mut buffer);
        assert!(matches!(result.unwrap_err(), MockSerialError::WouldBlock));
        assert_eq!(mock.read_calls(), 1);
        assert_eq!(mock.idle_reads(), 1);
    }

    #[test]
    fn test_read_ready_tracks_unread_data() {
        let mut mock = MockSerial::with_replies(&[b"B\n"]);
        assert!(!mock.read_ready().unwrap());

        mock.write(b"STATUS X\r").unwrap();
        assert!(mock.read_ready().unwrap());

        let mut buffer = [0u8; 4];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert!(!mock.read_ready().unwrap());
        assert_eq!(mock.idle_reads(), 0);

        mock.set_read_error(true);
        assert!(mock.read_ready().is_err());
    }

    #[test]
    fn test_reply_released_after_command() {
        let mut mock = MockSerial::with_replies(&[b":A\n", b":N4\n"]);
        let mut buffer = [0u8; 10];

        // Nothing readable before a command is written.
        assert!(mock.read(&mut buffer).is_err());

        mock.write(b"HALT").unwrap();
        assert!(mock.read(&mut buffer).is_err());

        mock.write(b"\r").unwrap();
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b":A\n");

        mock.write(b"HALT\r").unwrap();
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b":N4\n");
    }

    #[test]
    fn test_release_keeps_unread_data() {
        let mut mock = MockSerial::with_replies(&[b"two"]);
        mock.set_read_data(b"one").unwrap();
        mock.write(b"X\r").unwrap();

        let mut buffer = [0u8; 10];
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"onetwo");
    }

    #[test]
    fn test_written_commands() {
        let mut mock = MockSerial::new();
        mock.write(b"WHERE X Y\rHALT\r").unwrap();
        assert_eq!(mock.written_commands(), vec!["WHERE X Y", "HALT"]);
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(
            mock.write(b"test").unwrap_err(),
            MockSerialError::SimulatedError
        ));
        assert!(mock.flush().is_err());

        mock.set_read_data(b"data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert!(matches!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::SimulatedError
        ));
    }

    #[test]
    fn test_read_error_after() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"abc").unwrap();
        mock.set_read_error_after(1);
        let mut buffer = [0u8; 1];
        assert!(mock.read(&mut buffer).is_ok());
        assert!(matches!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::SimulatedError
        ));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::WouldBlock.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
        assert!(matches!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }

    #[test]
    fn test_error_display() {
        fn assert_error<E: core::error::Error>(_: &E) {}
        assert_error(&MockSerialError::SimulatedError);
        assert_eq!(MockSerialError::WouldBlock.to_string(), "Read timed out");
    }

    #[test]
    fn test_mock_delay_counts() {
        let mut delay = MockDelay::new();
        delay.delay_ms(10);
        delay.delay_ms(15);
        assert_eq!(delay.calls(), 2);
        assert_eq!(delay.total_ms(), 25);
    }
}
