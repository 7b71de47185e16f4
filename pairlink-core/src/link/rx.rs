//! Interrupt-side receive path
//!
//! The radio driver's receive callback copies each datagram into a
//! [`RawFrame`] and hands it to the worker through the bounded raw queue.
//! Nothing here blocks, allocates or parses.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use pairlink_protocol::{MacAddress, MAX_FRAME_SIZE};
use portable_atomic::{AtomicU32, Ordering};

use super::event::LinkEvent;
use crate::config::{EVENT_QUEUE_DEPTH, RAW_QUEUE_DEPTH};

/// Datagram as captured in interrupt context
#[derive(Clone)]
pub struct RawFrame {
    pub source: MacAddress,
    len: u8,
    data: [u8; MAX_FRAME_SIZE],
}

impl RawFrame {
    /// Copy a datagram; `None` if it is empty or longer than a frame
    pub fn new(source: MacAddress, bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MAX_FRAME_SIZE {
            return None;
        }
        let mut data = [0u8; MAX_FRAME_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            source,
            len: bytes.len() as u8,
            data,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("source", &self.source)
            .field("bytes", &self.bytes())
            .finish()
    }
}

/// Raw datagrams from the radio callback to the worker
pub type RawQueue<M> = Channel<M, RawFrame, RAW_QUEUE_DEPTH>;

/// Validated events from the worker to the application
pub type EventQueue<M> = Channel<M, LinkEvent, EVENT_QUEUE_DEPTH>;

/// Queues shared between the radio callback, the worker and the application
///
/// `const`-constructible so it can live in a `static`.
pub struct LinkChannels<M: RawMutex> {
    pub raw: RawQueue<M>,
    pub events: EventQueue<M>,
    overflows: AtomicU32,
}

impl<M: RawMutex> Default for LinkChannels<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> LinkChannels<M> {
    pub const fn new() -> Self {
        Self {
            raw: Channel::new(),
            events: Channel::new(),
            overflows: AtomicU32::new(0),
        }
    }

    /// Handle for the radio driver's receive callback
    pub fn producer(&self) -> RxProducer<'_, M> {
        RxProducer { channels: self }
    }

    /// Datagrams dropped because the raw queue was full
    pub fn raw_overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }
}

/// Receive callback handle
///
/// With a `CriticalSectionRawMutex` this is safe to call from interrupt
/// context.
pub struct RxProducer<'a, M: RawMutex> {
    channels: &'a LinkChannels<M>,
}

impl<M: RawMutex> Clone for RxProducer<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for RxProducer<'_, M> {}

impl<M: RawMutex> RxProducer<'_, M> {
    /// Queue a received datagram
    ///
    /// Returns false if it was out of bounds or the queue was full.
    pub fn on_receive(&self, source: MacAddress, bytes: &[u8]) -> bool {
        let Some(frame) = RawFrame::new(source, bytes) else {
            return false;
        };
        if self.channels.raw.try_send(frame).is_err() {
            self.channels.overflows.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    const SOURCE: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 1]);

    #[test]
    fn test_bounds() {
        let channels = LinkChannels::<CriticalSectionRawMutex>::new();
        let rx = channels.producer();

        assert!(!rx.on_receive(SOURCE, &[]));
        assert!(!rx.on_receive(SOURCE, &[0u8; MAX_FRAME_SIZE + 1]));
        assert!(rx.on_receive(SOURCE, &[0u8; MAX_FRAME_SIZE]));
        assert_eq!(channels.raw_overflows(), 0);
    }

    #[test]
    fn test_full_queue_drops() {
        let channels = LinkChannels::<CriticalSectionRawMutex>::new();
        let rx = channels.producer();

        for i in 0..RAW_QUEUE_DEPTH {
            assert!(rx.on_receive(SOURCE, &[i as u8]));
        }
        assert!(!rx.on_receive(SOURCE, &[0xFF]));
        assert_eq!(channels.raw_overflows(), 1);

        // Arrival order is kept
        let first = channels.raw.try_receive().unwrap();
        assert_eq!(first.bytes(), &[0]);
        assert_eq!(first.source, SOURCE);
    }
}
