//! Message and device type identifiers
//!
//! Message types are divided into two ranges:
//! - 0x01-0x0C: application traffic, only accepted from approved peers
//! - 0x20-0x24: pairing traffic, accepted from anyone

// Message type IDs: application range
const MSG_DEVICE_DISCOVERY: u8 = 0x01;
const MSG_DEVICE_INFO: u8 = 0x02;
const MSG_CONFIG_REQUEST: u8 = 0x03;
const MSG_CONFIG_RESPONSE: u8 = 0x04;
const MSG_CONFIG_SET: u8 = 0x05;
const MSG_CONFIG_ACK: u8 = 0x06;
const MSG_COMMAND: u8 = 0x07;
const MSG_COMMAND_ACK: u8 = 0x08;
const MSG_STATUS_UPDATE: u8 = 0x09;
const MSG_ERROR: u8 = 0x0A;
const MSG_ERROR_CLEAR: u8 = 0x0B;
const MSG_TEST_COMPLETE: u8 = 0x0C;

// Message type IDs: pairing range
const MSG_PAIRING_REQUEST: u8 = 0x20;
const MSG_PAIRING_RESPONSE: u8 = 0x21;
const MSG_PAIRING_CONFIRM: u8 = 0x22;
const MSG_PAIRING_REJECT: u8 = 0x23;
const MSG_UNPAIR: u8 = 0x24;

/// Message type carried in byte 3 of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsgType {
    DeviceDiscovery,
    DeviceInfo,
    ConfigRequest,
    ConfigResponse,
    ConfigSet,
    ConfigAck,
    Command,
    CommandAck,
    StatusUpdate,
    Error,
    ErrorClear,
    TestComplete,
    PairingRequest,
    PairingResponse,
    PairingConfirm,
    PairingReject,
    /// Peer announces it has forgotten us
    Unpair,
}

impl MsgType {
    /// Parse a message type from its wire byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            MSG_DEVICE_DISCOVERY => Some(MsgType::DeviceDiscovery),
            MSG_DEVICE_INFO => Some(MsgType::DeviceInfo),
            MSG_CONFIG_REQUEST => Some(MsgType::ConfigRequest),
            MSG_CONFIG_RESPONSE => Some(MsgType::ConfigResponse),
            MSG_CONFIG_SET => Some(MsgType::ConfigSet),
            MSG_CONFIG_ACK => Some(MsgType::ConfigAck),
            MSG_COMMAND => Some(MsgType::Command),
            MSG_COMMAND_ACK => Some(MsgType::CommandAck),
            MSG_STATUS_UPDATE => Some(MsgType::StatusUpdate),
            MSG_ERROR => Some(MsgType::Error),
            MSG_ERROR_CLEAR => Some(MsgType::ErrorClear),
            MSG_TEST_COMPLETE => Some(MsgType::TestComplete),
            MSG_PAIRING_REQUEST => Some(MsgType::PairingRequest),
            MSG_PAIRING_RESPONSE => Some(MsgType::PairingResponse),
            MSG_PAIRING_CONFIRM => Some(MsgType::PairingConfirm),
            MSG_PAIRING_REJECT => Some(MsgType::PairingReject),
            MSG_UNPAIR => Some(MsgType::Unpair),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn as_u8(self) -> u8 {
        match self {
            MsgType::DeviceDiscovery => MSG_DEVICE_DISCOVERY,
            MsgType::DeviceInfo => MSG_DEVICE_INFO,
            MsgType::ConfigRequest => MSG_CONFIG_REQUEST,
            MsgType::ConfigResponse => MSG_CONFIG_RESPONSE,
            MsgType::ConfigSet => MSG_CONFIG_SET,
            MsgType::ConfigAck => MSG_CONFIG_ACK,
            MsgType::Command => MSG_COMMAND,
            MsgType::CommandAck => MSG_COMMAND_ACK,
            MsgType::StatusUpdate => MSG_STATUS_UPDATE,
            MsgType::Error => MSG_ERROR,
            MsgType::ErrorClear => MSG_ERROR_CLEAR,
            MsgType::TestComplete => MSG_TEST_COMPLETE,
            MsgType::PairingRequest => MSG_PAIRING_REQUEST,
            MsgType::PairingResponse => MSG_PAIRING_RESPONSE,
            MsgType::PairingConfirm => MSG_PAIRING_CONFIRM,
            MsgType::PairingReject => MSG_PAIRING_REJECT,
            MsgType::Unpair => MSG_UNPAIR,
        }
    }

    /// Returns true for the handshake messages that bypass the approval gate
    ///
    /// `Unpair` is not part of the handshake and is only honored from
    /// approved peers.
    pub fn is_pairing(self) -> bool {
        matches!(
            self,
            MsgType::PairingRequest
                | MsgType::PairingResponse
                | MsgType::PairingConfirm
                | MsgType::PairingReject
        )
    }
}

/// Device type carried in byte 2 of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeviceType {
    Unknown = 0,
    RemoteController = 1,
    FatigueTester = 2,
}

impl DeviceType {
    /// Parse a device type from its wire byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(DeviceType::Unknown),
            1 => Some(DeviceType::RemoteController),
            2 => Some(DeviceType::FatigueTester),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name used when a peer does not announce one
    pub fn default_name(self) -> &'static str {
        match self {
            DeviceType::Unknown => "Unknown",
            DeviceType::RemoteController => "Remote",
            DeviceType::FatigueTester => "Fatigue Tester",
        }
    }
}
