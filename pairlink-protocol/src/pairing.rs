//! Pairing handshake payloads
//!
//! ```text
//! Request  = addr(6) type(1) expected(1) challenge(8) version(1)          17B
//! Response = addr(6) type(1) challenge(8) hmac(16) name(16, NUL padded)   47B
//! Confirm  = addr(6) hmac(16) success(1)                                  23B
//! Reject   = addr(6) reason(1)                                             7B
//! Unpair   = addr(6)                                                       6B
//! ```
//!
//! Decoders reject payloads shorter than the layout and ignore extra bytes.

use heapless::String;

use crate::address::MacAddress;
use crate::frame::FrameError;

/// Challenge nonce size
pub const CHALLENGE_SIZE: usize = 8;

/// Truncated HMAC-SHA256 tag size
pub const HMAC_SIZE: usize = 16;

/// Width of the name field on the wire
pub const MAX_DEVICE_NAME_LEN: usize = 16;

pub type Challenge = [u8; CHALLENGE_SIZE];
pub type HmacTag = [u8; HMAC_SIZE];
pub type DeviceName = String<MAX_DEVICE_NAME_LEN>;

/// Build a device name, truncating at a char boundary so at least one NUL
/// terminator fits in the wire field
pub fn device_name(name: &str) -> DeviceName {
    let mut end = name.len().min(MAX_DEVICE_NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = DeviceName::new();
    // Cannot fail: end < capacity
    let _ = out.push_str(&name[..end]);
    out
}

fn encode_name(name: &DeviceName) -> [u8; MAX_DEVICE_NAME_LEN] {
    let mut field = [0u8; MAX_DEVICE_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_DEVICE_NAME_LEN);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Read a NUL-terminated name, keeping the valid UTF-8 prefix
///
/// The name is informational only, so stray bytes truncate it rather than
/// rejecting the payload.
fn decode_name(field: &[u8]) -> DeviceName {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let bytes = &field[..end.min(MAX_DEVICE_NAME_LEN)];
    let text = match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    };
    let mut name = DeviceName::new();
    // Cannot fail: text is at most MAX_DEVICE_NAME_LEN bytes
    let _ = name.push_str(text);
    name
}

fn check_len(payload: &[u8], size: usize) -> Result<(), FrameError> {
    if payload.len() < size {
        Err(FrameError::InvalidPayload)
    } else {
        Ok(())
    }
}

fn read_address(payload: &[u8]) -> Result<MacAddress, FrameError> {
    MacAddress::from_slice(payload).ok_or(FrameError::InvalidPayload)
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], FrameError> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(FrameError::InvalidPayload)
}

/// Why a responder refused a pairing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RejectReason {
    NotInPairingMode = 0,
    WrongDeviceType = 1,
    HmacFailed = 2,
    AlreadyPaired = 3,
    ProtocolMismatch = 4,
}

impl RejectReason {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(RejectReason::NotInPairingMode),
            1 => Some(RejectReason::WrongDeviceType),
            2 => Some(RejectReason::HmacFailed),
            3 => Some(RejectReason::AlreadyPaired),
            4 => Some(RejectReason::ProtocolMismatch),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Broadcast by the initiator to open a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingRequest {
    pub requester: MacAddress,
    pub requester_type: u8,
    /// Device type the initiator wants to pair with
    pub expected_type: u8,
    pub challenge: Challenge,
    pub version: u8,
}

impl PairingRequest {
    pub const SIZE: usize = 17;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..6].copy_from_slice(self.requester.as_bytes());
        out[6] = self.requester_type;
        out[7] = self.expected_type;
        out[8..16].copy_from_slice(&self.challenge);
        out[16] = self.version;
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        check_len(payload, Self::SIZE)?;
        Ok(Self {
            requester: read_address(payload)?,
            requester_type: payload[6],
            expected_type: payload[7],
            challenge: read_array(&payload[8..])?,
            version: payload[16],
        })
    }
}

/// Responder's answer: proves the secret over the requester's challenge and
/// issues a challenge of its own
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingResponse {
    pub responder: MacAddress,
    pub responder_type: u8,
    pub challenge: Challenge,
    pub hmac: HmacTag,
    pub name: DeviceName,
}

impl PairingResponse {
    pub const SIZE: usize = 47;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..6].copy_from_slice(self.responder.as_bytes());
        out[6] = self.responder_type;
        out[7..15].copy_from_slice(&self.challenge);
        out[15..31].copy_from_slice(&self.hmac);
        out[31..47].copy_from_slice(&encode_name(&self.name));
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        check_len(payload, Self::SIZE)?;
        Ok(Self {
            responder: read_address(payload)?,
            responder_type: payload[6],
            challenge: read_array(&payload[7..])?,
            hmac: read_array(&payload[15..])?,
            name: decode_name(&payload[31..47]),
        })
    }
}

/// Initiator's proof over the responder's challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingConfirm {
    pub confirmer: MacAddress,
    pub hmac: HmacTag,
    pub success: bool,
}

impl PairingConfirm {
    pub const SIZE: usize = 23;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..6].copy_from_slice(self.confirmer.as_bytes());
        out[6..22].copy_from_slice(&self.hmac);
        out[22] = self.success as u8;
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        check_len(payload, Self::SIZE)?;
        Ok(Self {
            confirmer: read_address(payload)?,
            hmac: read_array(&payload[6..])?,
            success: payload[22] == 1,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingReject {
    pub rejecter: MacAddress,
    pub reason: RejectReason,
}

impl PairingReject {
    pub const SIZE: usize = 7;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..6].copy_from_slice(self.rejecter.as_bytes());
        out[6] = self.reason.as_u8();
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        check_len(payload, Self::SIZE)?;
        Ok(Self {
            rejecter: read_address(payload)?,
            reason: RejectReason::from_u8(payload[6]).ok_or(FrameError::InvalidPayload)?,
        })
    }
}

/// Sent by a peer that dropped us from its approved table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Unpair {
    pub sender: MacAddress,
}

impl Unpair {
    pub const SIZE: usize = 6;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        *self.sender.as_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        check_len(payload, Self::SIZE)?;
        Ok(Self {
            sender: read_address(payload)?,
        })
    }
}
