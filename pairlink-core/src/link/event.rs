//! Application-facing events and send errors

use pairlink_hal::RadioError;
use pairlink_protocol::{DeviceName, DeviceType, FrameError, MacAddress, ProtocolEvent};

use crate::peers::PeerStoreError;

/// What the worker posts to the application
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Application traffic from an approved peer
    Message(ProtocolEvent),
    /// A handshake finished and the peer was admitted
    PairingComplete {
        address: MacAddress,
        device_type: DeviceType,
        name: DeviceName,
    },
    /// An approved peer unpaired itself and was removed
    PeerRemoved { address: MacAddress },
}

/// Errors from the `Link` send API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    Frame(FrameError),
    Radio(RadioError),
    /// No approved peer of the requested device type
    NoPeer,
    /// Message type is reserved for the pairing protocol
    ReservedType,
    Peers(PeerStoreError),
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        LinkError::Frame(e)
    }
}

impl From<RadioError> for LinkError {
    fn from(e: RadioError) -> Self {
        LinkError::Radio(e)
    }
}

impl From<PeerStoreError> for LinkError {
    fn from(e: PeerStoreError) -> Self {
        LinkError::Peers(e)
    }
}
