//! Datagram radio abstractions
//!
//! The link is connectionless: a frame is handed to the driver together
//! with a destination address and either goes out or fails immediately.
//! Reception is push-based; the driver's receive callback feeds the
//! `RxProducer` in `pairlink-core`.

use pairlink_protocol::MacAddress;

/// Errors from radio transmit operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Driver not initialised or peer not registered
    NotReady,
    /// Transmit queue full
    Busy,
    /// Driver reported a failure
    Driver,
}

/// Radio transmitter
pub trait RadioTx {
    /// Send one frame to `dest`
    ///
    /// [`MacAddress::BROADCAST`] reaches every listener on the channel.
    /// Returns once the driver has accepted the frame; delivery is not
    /// acknowledged.
    fn transmit(&mut self, dest: &MacAddress, frame: &[u8]) -> Result<(), RadioError>;
}

impl<T: RadioTx + ?Sized> RadioTx for &mut T {
    fn transmit(&mut self, dest: &MacAddress, frame: &[u8]) -> Result<(), RadioError> {
        (**self).transmit(dest, frame)
    }
}
