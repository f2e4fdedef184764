//! Receive-side delivery queue.

use std::collections::VecDeque;

use quay_core::logging::targets;

use super::datagram::InboundDatagram;

/// FIFO of received, not yet consumed datagrams, bounded in bytes.
///
/// `len_bytes` always equals the sum of the payload sizes of the queued
/// datagrams. Admission is all-or-nothing: a datagram that does not fit is
/// handed back untouched.
#[derive(Debug, Default)]
pub(crate) struct DeliveryQueue {
    datagrams: VecDeque<InboundDatagram>,
    len_bytes: usize,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `datagram` if it fits under `limit_bytes`.
    ///
    /// Returns the datagram as an `Err` if there wasn't enough space.
    pub fn admit(
        &mut self,
        datagram: InboundDatagram,
        limit_bytes: usize,
    ) -> Result<(), InboundDatagram> {
        let size = datagram.len();
        match self.len_bytes.checked_add(size) {
            Some(total) if total <= limit_bytes => {
                self.len_bytes = total;
                self.datagrams.push_back(datagram);
                tracing::trace!(target: targets::QUEUE, size, queued = self.len_bytes, "admitted datagram");
                Ok(())
            }
            _ => {
                tracing::trace!(
                    target: targets::QUEUE,
                    size,
                    queued = self.len_bytes,
                    limit = limit_bytes,
                    "datagram does not fit"
                );
                Err(datagram)
            }
        }
    }

    /// Remove the oldest datagram.
    pub fn pop(&mut self) -> Option<InboundDatagram> {
        let datagram = self.datagrams.pop_front()?;
        self.len_bytes -= datagram.len();
        Some(datagram)
    }

    /// Discard everything, returning the number of datagrams removed.
    pub fn clear(&mut self) -> usize {
        let count = self.datagrams.len();
        self.datagrams.clear();
        self.len_bytes = 0;
        count
    }

    /// Sum of queued payload sizes.
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    /// Number of queued datagrams. Zero-length datagrams count.
    pub fn len(&self) -> usize {
        self.datagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }
}
