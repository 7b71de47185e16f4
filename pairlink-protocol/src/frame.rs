//! Frame encoding and decoding for the pairlink radio protocol.
//!
//! Frame format:
//! - SYNC (1 byte): 0xAA synchronization byte
//! - VERSION (1 byte): protocol version, must equal [`PROTOCOL_VERSION`]
//! - DEVICE_TYPE (1 byte): device type the frame is addressed to / sent by
//! - TYPE (1 byte): message type identifier
//! - SEQ (1 byte): sequence id, wraps at 256
//! - LENGTH (1 byte): payload length (0-200)
//! - PAYLOAD (0-200 bytes): type-specific data
//! - CRC (2 bytes, little-endian): CRC-16/CCITT-FALSE over header and payload

use heapless::Vec;

use crate::messages::MsgType;

/// Frame synchronization byte
pub const SYNC_BYTE: u8 = 0xAA;

/// Protocol version carried in every frame
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 200;

/// Header size (SYNC + VERSION + DEVICE_TYPE + TYPE + SEQ + LENGTH)
pub const HEADER_SIZE: usize = 6;

/// Trailing CRC size
pub const CRC_SIZE: usize = 2;

/// Bytes a frame occupies beyond its payload
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

const CRC16_POLYNOMIAL: u16 = 0x1021;
const CRC16_INIT: u16 = 0xFFFF;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Buffer is shorter than a header plus CRC
    TooShort,
    /// First byte is not [`SYNC_BYTE`]
    BadSync(u8),
    /// Version byte is not [`PROTOCOL_VERSION`]
    UnsupportedVersion(u8),
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Declared payload length runs past the end of the buffer
    Truncated,
    /// Header length field disagrees with the payload handed to the encoder
    LengthMismatch,
    /// CRC mismatch
    CrcMismatch { expected: u16, actual: u16 },
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Payload does not match the layout of its message type
    InvalidPayload,
}

/// Fixed-size frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    /// Protocol version
    pub version: u8,
    /// Device type id
    pub device_type: u8,
    /// Message type id (see [`MsgType`])
    pub msg_type: u8,
    /// Sequence id, an ordering hint only
    pub sequence_id: u8,
    /// Payload length
    pub len: u8,
}

impl FrameHeader {
    /// Create a header for the current protocol version
    pub const fn new(device_type: u8, msg_type: u8, sequence_id: u8, len: u8) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            device_type,
            msg_type,
            sequence_id,
            len,
        }
    }

    /// Header bytes as they appear on the wire, sync byte included
    pub const fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [
            SYNC_BYTE,
            self.version,
            self.device_type,
            self.msg_type,
            self.sequence_id,
            self.len,
        ]
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, MSB first, no final XOR)
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC16_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Encode a header and payload into `out`
///
/// Returns the number of bytes written (header + payload + CRC).
pub fn encode(header: &FrameHeader, payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }
    if header.len as usize != payload.len() {
        return Err(FrameError::LengthMismatch);
    }

    let body_len = HEADER_SIZE + payload.len();
    let frame_len = body_len + CRC_SIZE;
    if out.len() < frame_len {
        return Err(FrameError::BufferTooSmall);
    }

    out[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    out[HEADER_SIZE..body_len].copy_from_slice(payload);
    let crc = crc16_ccitt(&out[..body_len]);
    out[body_len..frame_len].copy_from_slice(&crc.to_le_bytes());

    Ok(frame_len)
}

/// Decode and validate a frame
///
/// Returns the header and a slice of `buf` holding the payload. Bytes past
/// the CRC are ignored.
pub fn decode(buf: &[u8]) -> Result<(FrameHeader, &[u8]), FrameError> {
    if buf.len() < FRAME_OVERHEAD {
        return Err(FrameError::TooShort);
    }
    if buf[0] != SYNC_BYTE {
        return Err(FrameError::BadSync(buf[0]));
    }
    if buf[1] != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(buf[1]));
    }

    let len = buf[5] as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }
    let body_len = HEADER_SIZE + len;
    if body_len + CRC_SIZE > buf.len() {
        return Err(FrameError::Truncated);
    }

    let actual = u16::from_le_bytes([buf[body_len], buf[body_len + 1]]);
    let expected = crc16_ccitt(&buf[..body_len]);
    if actual != expected {
        return Err(FrameError::CrcMismatch { expected, actual });
    }

    let header = FrameHeader {
        version: buf[1],
        device_type: buf[2],
        msg_type: buf[3],
        sequence_id: buf[4],
        len: buf[5],
    };
    Ok((header, &buf[HEADER_SIZE..body_len]))
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a new frame with the given routing fields and payload
    pub fn new(
        device_type: u8,
        msg_type: MsgType,
        sequence_id: u8,
        payload: &[u8],
    ) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            header: FrameHeader::new(
                device_type,
                msg_type.as_u8(),
                sequence_id,
                payload_vec.len() as u8,
            ),
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(device_type: u8, msg_type: MsgType, sequence_id: u8) -> Self {
        Self {
            header: FrameHeader::new(device_type, msg_type.as_u8(), sequence_id, 0),
            payload: Vec::new(),
        }
    }

    /// Message type, if it is one this protocol version knows
    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_u8(self.header.msg_type)
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        encode(&self.header, &self.payload, buffer)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }

    /// Decode an owned frame from raw bytes
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let (header, payload) = decode(buf)?;
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self {
            header,
            payload: payload_vec,
        })
    }
}
