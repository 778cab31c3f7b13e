//! # Transport Seam
//!
//! What the output pump writes into. A transport accepts every chunk it
//! is handed and answers whether the caller may keep writing; once it
//! says [`WriteStatus::Full`] the pump waits for a drain notification.
//!
//! [`SocketBuffer`] is the transport sessions use: an in-memory staging
//! buffer with a high-water mark, drained into the TCP stream by the
//! session task.

use crate::error::TransportError;

/// Answer to a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// Keep writing.
    Ready,
    /// Accepted, but stop until drained.
    Full,
}

/// Byte sink with flow control.
pub trait Transport {
    /// Accepts `bytes`.
    ///
    /// # Errors
    ///
    /// The transport can no longer take data.
    fn write(&mut self, bytes: &[u8]) -> Result<WriteStatus, TransportError>;

    /// Whether the transport is still over its mark and must not be
    /// written until drained.
    fn needs_drain(&self) -> bool {
        false
    }

    /// Releases the underlying connection. Called at most once.
    fn detach(&mut self) {}
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketStats {
    /// Bytes accepted.
    pub bytes_accepted: u64,
    /// Bytes handed to the socket.
    pub bytes_sent: u64,
    /// Writes answered with `Full`.
    pub full_events: u64,
}

/// Staging buffer in front of a socket.
#[derive(Debug)]
pub struct SocketBuffer {
    buffered: Vec<u8>,
    high_water_mark: usize,
    detached: bool,
    stats: SocketStats,
}

impl SocketBuffer {
    /// Creates a buffer that reports `Full` once it holds
    /// `high_water_mark` bytes or more.
    #[must_use]
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            buffered: Vec::with_capacity(high_water_mark),
            high_water_mark: high_water_mark.max(1),
            detached: false,
            stats: SocketStats::default(),
        }
    }

    /// Bytes waiting for the socket.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffered
    }

    /// Drops `n` bytes the socket took.
    ///
    /// Returns true when this brought the buffer below the mark, which
    /// is when the pump should be told to resume.
    pub fn consume(&mut self, n: usize) -> bool {
        let was_full = self.buffered.len() >= self.high_water_mark;
        let n = n.min(self.buffered.len());
        self.buffered.drain(..n);
        self.stats.bytes_sent += n as u64;
        was_full && self.buffered.len() < self.high_water_mark
    }

    /// Whether `detach` ran.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.detached
    }

    /// Statistics.
    #[must_use]
    pub const fn stats(&self) -> &SocketStats {
        &self.stats
    }
}

impl Transport for SocketBuffer {
    fn write(&mut self, bytes: &[u8]) -> Result<WriteStatus, TransportError> {
        if self.detached {
            return Err(TransportError::Detached);
        }
        self.buffered.extend_from_slice(bytes);
        self.stats.bytes_accepted += bytes.len() as u64;
        if self.needs_drain() {
            self.stats.full_events += 1;
            Ok(WriteStatus::Full)
        } else {
            Ok(WriteStatus::Ready)
        }
    }

    fn needs_drain(&self) -> bool {
        self.buffered.len() >= self.high_water_mark
    }

    fn detach(&mut self) {
        self.detached = true;
        self.buffered = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_full_at_mark() {
        let mut buffer = SocketBuffer::new(8);
        assert_eq!(buffer.write(b"abcd").ok(), Some(WriteStatus::Ready));
        assert_eq!(buffer.write(b"efgh").ok(), Some(WriteStatus::Full));
        assert!(buffer.needs_drain());
        assert_eq!(buffer.pending(), b"abcdefgh");
    }

    #[test]
    fn test_consume_signals_drain_once() {
        let mut buffer = SocketBuffer::new(4);
        buffer.write(b"abcdef").expect("write");

        assert!(!buffer.consume(1));
        assert!(buffer.consume(2));
        assert!(!buffer.consume(10));
        assert!(buffer.pending().is_empty());
        assert_eq!(buffer.stats().bytes_sent, 6);
    }

    #[test]
    fn test_detached_rejects_writes() {
        let mut buffer = SocketBuffer::new(4);
        buffer.write(b"ab").expect("write");
        buffer.detach();

        assert!(buffer.is_detached());
        assert!(buffer.pending().is_empty());
        assert!(matches!(buffer.write(b"x"), Err(TransportError::Detached)));
    }
}
