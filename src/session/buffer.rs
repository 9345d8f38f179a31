//! # Command Buffer
//!
//! Accumulates serialized command bytes between transport writes.
//!
//! ## Flush Triggers
//!
//! | Trigger | Behavior |
//! |---------|----------|
//! | [`flush`](CommandBuffer::flush) | one transport write with every buffered byte |
//! | buffer full | [`write`](CommandBuffer::write) flushes, then keeps appending |
//! | [`new_line`](CommandBuffer::new_line) | appends line terminators, then flushes |
//!
//! A failed transport write leaves the bytes in the buffer; the session
//! decides whether to retry or [`discard`](CommandBuffer::discard) them.

use crate::error::{EtiquetaError, Result};
use crate::protocol::commands;
use crate::transport::Transport;

/// Byte buffer in front of a transport.
pub struct CommandBuffer {
    transport: Option<Box<dyn Transport>>,
    data: Vec<u8>,
    capacity: usize,
    line_feed: Vec<u8>,
    bytes_written: u64,
}

impl CommandBuffer {
    /// An unattached buffer. `capacity` below one is treated as one.
    pub fn new(capacity: usize, line_feed: Vec<u8>) -> Self {
        let capacity = capacity.max(1);
        Self {
            transport: None,
            data: Vec::with_capacity(capacity),
            capacity,
            line_feed,
            bytes_written: 0,
        }
    }

    /// Attach a transport. Pending bytes are dropped and the counter reset.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.data.clear();
        self.bytes_written = 0;
        self.transport = Some(transport);
    }

    /// Detach the transport, keeping the byte counter.
    pub fn detach(&mut self) -> Option<Box<dyn Transport>> {
        self.transport.take()
    }

    pub fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    /// Terminator used by [`new_line`](Self::new_line).
    pub fn set_line_feed(&mut self, line_feed: Vec<u8>) {
        self.line_feed = line_feed;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.data.len()
    }

    /// Bytes successfully written since the transport was attached.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn transport_mut(&mut self) -> Result<&mut (dyn Transport + 'static)> {
        self.transport.as_deref_mut().ok_or(EtiquetaError::NoConnection)
    }

    /// Append bytes, flushing every time the buffer fills.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport_mut()?;

        let mut rest = bytes;
        while !rest.is_empty() || self.data.len() >= self.capacity {
            let space = self.capacity.saturating_sub(self.data.len());
            let (head, tail) = rest.split_at(space.min(rest.len()));
            self.data.extend_from_slice(head);
            rest = tail;

            if self.data.len() >= self.capacity {
                tracing::trace!(capacity = self.capacity, "buffer full");
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Send every buffered byte in one transport write.
    ///
    /// Returns the number of bytes written; an empty buffer makes no
    /// transport call.
    pub fn flush(&mut self) -> Result<usize> {
        let transport = self.transport.as_deref_mut().ok_or(EtiquetaError::NoConnection)?;
        if self.data.is_empty() {
            return Ok(0);
        }

        transport.write_all(&self.data)?;
        let n = self.data.len();
        self.bytes_written += n as u64;
        self.data.clear();
        tracing::debug!(bytes = n, total = self.bytes_written, "flushed");
        Ok(n)
    }

    /// Advance `n` lines and flush. `n <= 0` is a plain flush.
    pub fn new_line(&mut self, n: i32) -> Result<usize> {
        if n > 0 {
            let feeds = commands::line_feeds(&self.line_feed, n as usize);
            self.write(&feeds)?;
        }
        self.flush()
    }

    /// Drop buffered bytes without writing them.
    pub fn discard(&mut self) -> usize {
        let n = self.data.len();
        self.data.clear();
        n
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("attached", &self.is_attached())
            .field("pending", &self.data.len())
            .field("capacity", &self.capacity)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LinkStatus, MemoryPrinter, MemoryTransport};
    use proptest::prelude::*;

    fn attached(capacity: usize) -> (CommandBuffer, MemoryPrinter) {
        let printer = MemoryPrinter::new();
        let mut buffer = CommandBuffer::new(capacity, vec![0x0D, 0x0A]);
        buffer.attach(Box::new(
            MemoryTransport::open(&printer, LinkStatus::new()).unwrap(),
        ));
        (buffer, printer)
    }

    #[test]
    fn test_unattached_fails() {
        let mut buffer = CommandBuffer::new(16, vec![0x0A]);
        assert!(matches!(buffer.write(b"x"), Err(EtiquetaError::NoConnection)));
        assert!(matches!(buffer.flush(), Err(EtiquetaError::NoConnection)));
        assert!(matches!(buffer.new_line(0), Err(EtiquetaError::NoConnection)));
    }

    #[test]
    fn test_flush_empty_makes_no_write() {
        let (mut buffer, printer) = attached(16);
        assert_eq!(buffer.flush().unwrap(), 0);
        assert_eq!(printer.write_count(), 0);
    }

    #[test]
    fn test_flush_counts_bytes() {
        let (mut buffer, printer) = attached(16);
        buffer.write(b"ABC").unwrap();
        assert_eq!(buffer.pending(), 3);
        assert_eq!(printer.write_count(), 0);

        assert_eq!(buffer.flush().unwrap(), 3);
        assert_eq!(buffer.bytes_written(), 3);
        assert_eq!(printer.writes(), vec![b"ABC".to_vec()]);
    }

    #[test]
    fn test_auto_flush_when_full() {
        let (mut buffer, printer) = attached(4);
        buffer.write(b"ABCDEFGHIJ").unwrap();

        assert_eq!(printer.writes(), vec![b"ABCD".to_vec(), b"EFGH".to_vec()]);
        assert_eq!(buffer.pending(), 2);
    }

    #[test]
    fn test_new_line_appends_and_flushes() {
        let (mut buffer, printer) = attached(64);
        buffer.write(b"A").unwrap();
        buffer.new_line(2).unwrap();
        assert_eq!(printer.bytes(), b"A\r\n\r\n".to_vec());
    }

    #[test]
    fn test_new_line_non_positive_is_flush() {
        for n in [0, -5] {
            let (mut buffer, printer) = attached(64);
            buffer.write(b"A").unwrap();
            buffer.new_line(n).unwrap();
            assert_eq!(printer.writes(), vec![b"A".to_vec()]);
        }
    }

    #[test]
    fn test_set_line_feed() {
        let (mut buffer, printer) = attached(64);
        buffer.set_line_feed(vec![0x0A]);
        buffer.new_line(2).unwrap();
        assert_eq!(printer.bytes(), b"\n\n".to_vec());
    }

    #[test]
    fn test_failed_flush_keeps_bytes() {
        let (mut buffer, printer) = attached(64);
        buffer.write(b"ABC").unwrap();
        printer.fail_writes(true);

        assert!(matches!(buffer.flush(), Err(EtiquetaError::Transport(_))));
        assert_eq!(buffer.pending(), 3);
        assert_eq!(buffer.bytes_written(), 0);

        printer.fail_writes(false);
        assert_eq!(buffer.flush().unwrap(), 3);
    }

    #[test]
    fn test_write_after_failed_full_flush_retries() {
        let (mut buffer, printer) = attached(4);
        printer.fail_writes(true);
        assert!(buffer.write(b"ABCD").is_err());
        assert_eq!(buffer.pending(), 4);

        printer.fail_writes(false);
        buffer.write(b"E").unwrap();
        assert_eq!(printer.writes(), vec![b"ABCD".to_vec()]);
        assert_eq!(buffer.pending(), 1);
    }

    #[test]
    fn test_discard() {
        let (mut buffer, printer) = attached(64);
        buffer.write(b"ABC").unwrap();
        assert_eq!(buffer.discard(), 3);
        buffer.flush().unwrap();
        assert_eq!(printer.write_count(), 0);
    }

    #[test]
    fn test_attach_resets_counter() {
        let (mut buffer, _printer) = attached(8);
        buffer.write(b"AB").unwrap();
        buffer.flush().unwrap();

        let other = MemoryPrinter::new();
        buffer.attach(Box::new(MemoryTransport::open(&other, LinkStatus::new()).unwrap()));
        assert_eq!(buffer.bytes_written(), 0);
    }

    proptest! {
        #[test]
        fn prop_auto_flush_preserves_bytes(
            capacity in 1usize..64,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..100), 0..20),
        ) {
            let (mut buffer, printer) = attached(capacity);
            for chunk in &chunks {
                buffer.write(chunk).unwrap();
            }
            buffer.flush().unwrap();

            let expected: Vec<u8> = chunks.concat();
            prop_assert_eq!(printer.bytes(), expected.clone());
            prop_assert_eq!(buffer.bytes_written(), expected.len() as u64);
            prop_assert!(printer.writes().iter().all(|w| !w.is_empty() && w.len() <= capacity));
        }
    }
}
