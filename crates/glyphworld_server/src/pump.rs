//! # Output Pump
//!
//! Per-connection outbound queue with drop-oldest backpressure.
//!
//! ## Flow
//!
//! ```text
//! enqueue ──► [queue] ──flush──► Transport
//!                ▲                   │ Full
//!                └──── on_drain ◄────┘
//! ```
//!
//! - `enqueue` appends and flushes immediately unless blocked
//! - Flush writes chunks in order until the queue empties or the
//!   transport pushes back; it then waits for [`OutputPump::on_drain`]
//! - While the queue holds more than `ceiling` bytes the oldest chunk is
//!   dropped, never the last one
//!
//! Nothing here loops waiting for the transport.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{Transport, WriteStatus};

/// Delivery counters. All monotonic for the life of the pump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpMetrics {
    /// Bytes handed to the transport from the queue.
    pub bytes_written: u64,
    /// Chunks handed to the transport from the queue.
    pub frames_written: u64,
    /// Chunks dropped for exceeding the ceiling.
    pub frames_dropped: u64,
    /// Drain notifications that unblocked the pump.
    pub drain_events: u64,
    /// Largest queued byte count seen.
    pub peak_backlog: u64,
}

/// Outbound queue in front of one transport.
#[derive(Debug)]
pub struct OutputPump<T: Transport> {
    transport: T,
    queue: VecDeque<Vec<u8>>,
    queued_bytes: usize,
    ceiling: usize,
    blocked: bool,
    destroyed: bool,
    metrics: PumpMetrics,
}

impl<T: Transport> OutputPump<T> {
    /// Creates a pump that keeps at most `ceiling` queued bytes, bar the
    /// newest chunk.
    #[must_use]
    pub fn new(transport: T, ceiling: usize) -> Self {
        Self {
            transport,
            queue: VecDeque::new(),
            queued_bytes: 0,
            ceiling,
            blocked: false,
            destroyed: false,
            metrics: PumpMetrics::default(),
        }
    }

    /// Queues a chunk and tries to flush.
    ///
    /// Chunks enqueued after `destroy` are discarded.
    ///
    /// # Errors
    ///
    /// The transport failed. The pump is destroyed before returning.
    pub fn enqueue(&mut self, chunk: Vec<u8>) -> Result<(), TransportError> {
        if self.destroyed || chunk.is_empty() {
            return Ok(());
        }
        self.queued_bytes += chunk.len();
        self.queue.push_back(chunk);
        self.metrics.peak_backlog = self.metrics.peak_backlog.max(self.queued_bytes as u64);
        self.enforce_ceiling();

        if self.blocked {
            return Ok(());
        }
        self.flush()
    }

    fn enforce_ceiling(&mut self) {
        let mut dropped = 0u64;
        while self.queued_bytes > self.ceiling && self.queue.len() > 1 {
            if let Some(oldest) = self.queue.pop_front() {
                self.queued_bytes -= oldest.len();
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.metrics.frames_dropped += dropped;
            warn!(
                dropped,
                queued_bytes = self.queued_bytes,
                total_dropped = self.metrics.frames_dropped,
                "Output backlog over ceiling, dropped oldest"
            );
        }
    }

    /// Discards everything queued and queues `chunk` in its place.
    ///
    /// Used when queued chunks depend on a chunk the ceiling dropped. The
    /// newest discarded chunk is the one `chunk` stands in for; the rest
    /// count as dropped.
    ///
    /// # Errors
    ///
    /// The transport failed. The pump is destroyed before returning.
    pub fn replace_queued(&mut self, chunk: Vec<u8>) -> Result<(), TransportError> {
        if self.destroyed {
            return Ok(());
        }
        let superseded = self.queue.len().saturating_sub(1) as u64;
        self.metrics.frames_dropped += superseded;
        self.queue.clear();
        self.queued_bytes = chunk.len();
        self.queue.push_back(chunk);
        self.metrics.peak_backlog = self.metrics.peak_backlog.max(self.queued_bytes as u64);

        if self.blocked {
            return Ok(());
        }
        self.flush()
    }

    /// Writes queued chunks until empty or the transport pushes back.
    ///
    /// # Errors
    ///
    /// The transport failed. The pump is destroyed before returning.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        while !self.destroyed {
            if self.transport.needs_drain() {
                self.blocked = true;
                break;
            }
            let Some(chunk) = self.queue.pop_front() else {
                break;
            };
            self.queued_bytes -= chunk.len();

            match self.transport.write(&chunk) {
                Ok(status) => {
                    self.metrics.bytes_written += chunk.len() as u64;
                    self.metrics.frames_written += 1;
                    if status == WriteStatus::Full {
                        self.blocked = true;
                        debug!(queued = self.queue.len(), "Transport full, pausing");
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Transport write failed");
                    self.destroy();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// The transport drained; resume flushing.
    ///
    /// # Errors
    ///
    /// The transport failed. The pump is destroyed before returning.
    pub fn on_drain(&mut self) -> Result<(), TransportError> {
        if self.destroyed {
            return Ok(());
        }
        if self.blocked {
            self.blocked = false;
            self.metrics.drain_events += 1;
        }
        self.flush()
    }

    /// Writes straight to the transport, skipping the queue and metrics.
    ///
    /// # Errors
    ///
    /// The pump is destroyed, or the transport failed.
    pub fn write_immediate(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.destroyed {
            return Err(TransportError::Closed);
        }
        match self.transport.write(chunk) {
            Ok(WriteStatus::Full) => {
                self.blocked = true;
                Ok(())
            }
            Ok(WriteStatus::Ready) => Ok(()),
            Err(e) => {
                self.destroy();
                Err(e)
            }
        }
    }

    /// Drops everything queued and detaches the transport. Safe to call
    /// more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.queue.clear();
        self.queued_bytes = 0;
        self.transport.detach();
        debug!(
            bytes_written = self.metrics.bytes_written,
            frames_dropped = self.metrics.frames_dropped,
            "Output pump destroyed"
        );
    }

    /// Counters.
    #[must_use]
    pub const fn metrics(&self) -> &PumpMetrics {
        &self.metrics
    }

    /// Chunks waiting.
    #[must_use]
    pub fn queued_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Bytes waiting.
    #[must_use]
    pub const fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Whether flushing waits for a drain.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Whether `destroy` ran.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably. Used by the session to drain it.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
