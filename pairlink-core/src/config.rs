//! Link configuration
//!
//! Build-time values (pairing secret, preconfigured peer) are generated by
//! `build.rs`; everything else is supplied at run time through
//! [`LinkConfig`].

use pairlink_protocol::{device_name, DeviceName, DeviceType, MacAddress};
use serde::{Deserialize, Serialize};

/// Maximum number of peers approved through pairing
pub const MAX_APPROVED_PEERS: usize = 4;

/// Depth of the interrupt-to-worker raw frame queue
pub const RAW_QUEUE_DEPTH: usize = 10;

/// Depth of the worker-to-application event queue
pub const EVENT_QUEUE_DEPTH: usize = 10;

/// Default time an initiator waits for a Response (ms)
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

/// Default pairing-mode window on the responder (ms)
pub const DEFAULT_PAIRING_MODE_TIMEOUT_MS: u64 = 30_000;

/// Peer trusted without pairing, fixed at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PreconfiguredPeer {
    pub address: MacAddress,
    pub device_type: DeviceType,
    pub name: &'static str,
}

/// Values generated by build.rs
pub mod generated {
    use super::PreconfiguredPeer;
    use pairlink_protocol::{DeviceType, MacAddress};

    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub use generated::{PAIRING_SECRET, PRECONFIGURED_PEER, SECRET_IS_PLACEHOLDER};

/// Run-time link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Our own link address, carried in pairing payloads
    pub address: MacAddress,
    /// What we are
    pub device_type: DeviceType,
    /// What we pair with
    pub peer_type: DeviceType,
    /// Name announced in pairing Responses
    pub device_name: DeviceName,
    pub response_timeout_ms: u64,
    pub pairing_mode_timeout_ms: u64,
}

impl LinkConfig {
    /// Configuration for a handheld remote that pairs with test units
    pub fn remote_controller(address: MacAddress) -> Self {
        Self {
            address,
            device_type: DeviceType::RemoteController,
            peer_type: DeviceType::FatigueTester,
            device_name: device_name(DeviceType::RemoteController.default_name()),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            pairing_mode_timeout_ms: DEFAULT_PAIRING_MODE_TIMEOUT_MS,
        }
    }

    /// Configuration for a test unit that answers a remote's requests
    pub fn test_unit(address: MacAddress) -> Self {
        Self {
            address,
            device_type: DeviceType::FatigueTester,
            peer_type: DeviceType::RemoteController,
            device_name: device_name(DeviceType::FatigueTester.default_name()),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            pairing_mode_timeout_ms: DEFAULT_PAIRING_MODE_TIMEOUT_MS,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.device_name = device_name(name);
        self
    }
}
