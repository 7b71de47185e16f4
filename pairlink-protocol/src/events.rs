//! Validated inbound frames

use heapless::Vec;

use crate::address::MacAddress;
use crate::frame::{self, FrameError, FrameHeader, MAX_PAYLOAD_SIZE};
use crate::messages::{DeviceType, MsgType};

/// A frame that passed sync, version, length and CRC checks, tagged with
/// the link address it arrived from
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolEvent {
    pub msg_type: MsgType,
    /// Raw device type byte from the header
    pub device_type: u8,
    pub sequence_id: u8,
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    pub source: MacAddress,
}

impl ProtocolEvent {
    /// Build an event from a decoded header and payload
    ///
    /// Returns `None` for message types this protocol version does not know.
    pub fn from_parts(header: &FrameHeader, payload: &[u8], source: MacAddress) -> Option<Self> {
        let msg_type = MsgType::from_u8(header.msg_type)?;
        let mut owned = Vec::new();
        owned.extend_from_slice(payload).ok()?;
        Some(Self {
            msg_type,
            device_type: header.device_type,
            sequence_id: header.sequence_id,
            payload: owned,
            source,
        })
    }

    /// Decode raw bytes received from `source`
    ///
    /// `Ok(None)` means the frame was valid but its message type is unknown.
    pub fn parse(bytes: &[u8], source: MacAddress) -> Result<Option<Self>, FrameError> {
        let (header, payload) = frame::decode(bytes)?;
        Ok(Self::from_parts(&header, payload, source))
    }

    /// Device type of the sender, if recognised
    pub fn device(&self) -> Option<DeviceType> {
        DeviceType::from_u8(self.device_type)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    const SOURCE: MacAddress = MacAddress([1, 2, 3, 4, 5, 6]);

    #[test]
    fn test_parse_valid_frame() {
        let encoded = Frame::new(2, MsgType::StatusUpdate, 17, &[0xCA, 0xFE])
            .unwrap()
            .encode_to_vec()
            .unwrap();

        let event = ProtocolEvent::parse(&encoded, SOURCE).unwrap().unwrap();
        assert_eq!(event.msg_type, MsgType::StatusUpdate);
        assert_eq!(event.device(), Some(DeviceType::FatigueTester));
        assert_eq!(event.sequence_id, 17);
        assert_eq!(&event.payload[..], &[0xCA, 0xFE]);
        assert_eq!(event.source, SOURCE);
    }

    #[test]
    fn test_parse_unknown_type() {
        let header = FrameHeader::new(2, 0x7F, 1, 0);
        let mut buffer = [0u8; 16];
        let len = frame::encode(&header, &[], &mut buffer).unwrap();
        assert_eq!(ProtocolEvent::parse(&buffer[..len], SOURCE), Ok(None));
    }

    #[test]
    fn test_parse_propagates_frame_errors() {
        assert_eq!(
            ProtocolEvent::parse(&[0xAA, 1, 2], SOURCE),
            Err(FrameError::TooShort)
        );
    }
}
