//! pairlink Radio Link Protocol
//!
//! This crate defines the datagram protocol between the handheld remote
//! controller and the test units it drives. Frames travel over a
//! connectionless 2.4GHz link that offers neither reliability nor security,
//! so every frame carries its own integrity check and the pairing messages
//! carry the material for a challenge–response handshake.
//!
//! # Protocol Overview
//!
//! All messages use a fixed header, an opaque payload and a trailing CRC:
//! ```text
//! ┌──────┬─────────┬─────────────┬──────┬─────┬─────┬─────────────┬──────────┐
//! │ SYNC │ VERSION │ DEVICE_TYPE │ TYPE │ SEQ │ LEN │ PAYLOAD     │ CRC16    │
//! │ 1B   │ 1B      │ 1B          │ 1B   │ 1B  │ 1B  │ 0–200B      │ 2B (LE)  │
//! └──────┴─────────┴─────────────┴──────┴─────┴─────┴─────────────┴──────────┘
//! ```
//!
//! The CRC is CRC-16/CCITT-FALSE over the header and payload. Corrupted
//! frames are rejected, never repaired.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod address;
pub mod events;
pub mod frame;
pub mod messages;
pub mod pairing;

pub use address::MacAddress;
pub use events::ProtocolEvent;
pub use frame::{
    crc16_ccitt, decode, encode, Frame, FrameError, FrameHeader, FRAME_OVERHEAD, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION, SYNC_BYTE,
};
pub use messages::{DeviceType, MsgType};
pub use pairing::{
    device_name, Challenge, DeviceName, HmacTag, PairingConfirm, PairingReject, PairingRequest,
    PairingResponse, RejectReason, Unpair, CHALLENGE_SIZE, HMAC_SIZE, MAX_DEVICE_NAME_LEN,
};
