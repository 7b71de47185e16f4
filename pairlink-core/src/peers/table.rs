//! Approved peer table and its flash record
//!
//! The table is a fixed array of slots with validity flags. It is persisted
//! as a single postcard record guarded by a magic number, a format version
//! and a CRC32, so a torn write is detected on the next load.

use pairlink_protocol::{DeviceName, DeviceType, MacAddress, MAX_DEVICE_NAME_LEN};
use serde::{Deserialize, Serialize};

use crate::config::MAX_APPROVED_PEERS;

/// Magic number to identify a peer table record
pub const PEER_RECORD_MAGIC: u32 = 0x5045_4552; // "PEER"

/// Current peer record format version
pub const PEER_RECORD_VERSION: u8 = 1;

/// Upper bound on the serialized record size
pub const PEER_RECORD_MAX_SIZE: usize = 160;

/// A peer allowed to exchange application traffic with us
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApprovedPeer {
    pub address: MacAddress,
    pub device_type: DeviceType,
    pub name: DeviceName,
    /// Seconds of uptime when the peer was admitted
    pub paired_at: u32,
    /// Whether this slot is in use
    pub valid: bool,
}

impl ApprovedPeer {
    /// An unused slot
    pub const EMPTY: ApprovedPeer = ApprovedPeer {
        address: MacAddress::ZERO,
        device_type: DeviceType::Unknown,
        name: DeviceName::new(),
        paired_at: 0,
        valid: false,
    };

    pub fn new(address: MacAddress, device_type: DeviceType, name: DeviceName, paired_at: u32) -> Self {
        Self {
            address,
            device_type,
            name,
            paired_at,
            valid: true,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Zero the slot
    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }
}

/// Table is full and the address is not already present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableFull;

/// Fixed-capacity peer table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerTable {
    slots: [ApprovedPeer; MAX_APPROVED_PEERS],
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerTable {
    pub const fn new() -> Self {
        Self {
            slots: [ApprovedPeer::EMPTY; MAX_APPROVED_PEERS],
        }
    }

    /// Valid entry for an address
    pub fn get(&self, address: &MacAddress) -> Option<&ApprovedPeer> {
        self.slots
            .iter()
            .find(|p| p.valid && p.address == *address)
    }

    pub fn contains(&self, address: &MacAddress) -> bool {
        self.get(address).is_some()
    }

    /// Insert or update a peer
    ///
    /// Updates the existing slot for this address, otherwise fills the
    /// first free slot.
    pub fn upsert(&mut self, peer: ApprovedPeer) -> Result<(), TableFull> {
        // First, try to find existing entry for this address
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|p| p.valid && p.address == peer.address)
        {
            *slot = peer;
            return Ok(());
        }

        // Otherwise, find an empty slot
        match self.slots.iter_mut().find(|p| !p.valid) {
            Some(slot) => {
                *slot = peer;
                Ok(())
            }
            None => Err(TableFull),
        }
    }

    /// Clear the entry for an address, returning whether one existed
    pub fn remove(&mut self, address: &MacAddress) -> bool {
        let mut removed = false;
        for slot in &mut self.slots {
            if slot.valid && slot.address == *address {
                slot.clear();
                removed = true;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// Valid entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &ApprovedPeer> {
        self.slots.iter().filter(|p| p.valid)
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|p| p.valid)
    }

    /// First valid entry of a device type, in slot order
    pub fn first_of_type(&self, device_type: DeviceType) -> Option<MacAddress> {
        self.iter()
            .find(|p| p.device_type == device_type)
            .map(|p| p.address)
    }

    /// True if no valid entry is zero/broadcast and no address repeats
    pub fn is_consistent(&self) -> bool {
        let valid = || self.slots.iter().enumerate().filter(|(_, p)| p.valid);
        valid().all(|(i, peer)| {
            peer.address.is_unicast()
                && !valid().any(|(j, other)| j != i && other.address == peer.address)
        })
    }
}

/// Why a stored record was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Not a postcard encoding of a record
    Decode,
    BadMagic,
    UnsupportedVersion,
    CrcMismatch,
    /// Duplicate or non-unicast addresses among valid entries
    Inconsistent,
    /// Record does not fit the serialization buffer
    Encode,
}

/// Peer table as stored in flash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    pub table: PeerTable,
    /// CRC32 checksum (calculated over magic..table)
    pub crc: u32,
}

impl PeerRecord {
    /// Wrap a table with a fresh header and CRC
    pub fn new(table: PeerTable) -> Self {
        let mut record = Self {
            magic: PEER_RECORD_MAGIC,
            version: PEER_RECORD_VERSION,
            table,
            crc: 0,
        };
        record.update_crc();
        record
    }

    /// Calculate CRC32 for the record (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);

        for peer in &self.table.slots {
            let mut name = [0u8; MAX_DEVICE_NAME_LEN];
            let bytes = peer.name.as_bytes();
            name[..bytes.len()].copy_from_slice(bytes);

            crc = crc32_update(crc, peer.address.as_bytes());
            crc = crc32_update(crc, &[peer.device_type.as_u8()]);
            crc = crc32_update(crc, &[bytes.len() as u8]);
            crc = crc32_update(crc, &name);
            crc = crc32_update(crc, &peer.paired_at.to_le_bytes());
            crc = crc32_update(crc, &[peer.valid as u8]);
        }

        !crc
    }

    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Serialize into `buffer`, returning the used prefix
    pub fn encode<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], RecordError> {
        postcard::to_slice(self, buffer).map_err(|_| RecordError::Encode)
    }

    /// Parse and validate a stored record
    pub fn decode(bytes: &[u8]) -> Result<PeerTable, RecordError> {
        let record: PeerRecord = postcard::from_bytes(bytes).map_err(|_| RecordError::Decode)?;
        if record.magic != PEER_RECORD_MAGIC {
            return Err(RecordError::BadMagic);
        }
        if record.version != PEER_RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion);
        }
        if !record.verify_crc() {
            return Err(RecordError::CrcMismatch);
        }
        if !record.table.is_consistent() {
            return Err(RecordError::Inconsistent);
        }
        Ok(record.table)
    }
}

/// CRC32 (IEEE 802.3, reflected) update step
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairlink_protocol::device_name;

    fn peer(last: u8, device_type: DeviceType) -> ApprovedPeer {
        ApprovedPeer::new(
            MacAddress([0x02, 0, 0, 0, 0, last]),
            device_type,
            device_name("Unit"),
            100 + last as u32,
        )
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let mut table = PeerTable::new();
        table.upsert(peer(1, DeviceType::FatigueTester)).unwrap();
        table.upsert(peer(2, DeviceType::FatigueTester)).unwrap();

        let mut renamed = peer(1, DeviceType::FatigueTester);
        renamed.name = device_name("Renamed");
        table.upsert(renamed).unwrap();

        assert_eq!(table.count(), 2);
        assert_eq!(
            table.get(&MacAddress([0x02, 0, 0, 0, 0, 1])).unwrap().name.as_str(),
            "Renamed"
        );
    }

    #[test]
    fn test_upsert_full() {
        let mut table = PeerTable::new();
        for i in 1..=MAX_APPROVED_PEERS as u8 {
            table.upsert(peer(i, DeviceType::FatigueTester)).unwrap();
        }
        assert!(table.is_full());
        assert_eq!(table.upsert(peer(9, DeviceType::FatigueTester)), Err(TableFull));
        // Existing entries can still be refreshed
        assert!(table.upsert(peer(1, DeviceType::FatigueTester)).is_ok());
    }

    #[test]
    fn test_remove_frees_slot() {
        let mut table = PeerTable::new();
        table.upsert(peer(1, DeviceType::FatigueTester)).unwrap();
        table.upsert(peer(2, DeviceType::RemoteController)).unwrap();

        assert!(table.remove(&MacAddress([0x02, 0, 0, 0, 0, 1])));
        assert!(!table.remove(&MacAddress([0x02, 0, 0, 0, 0, 1])));
        assert_eq!(table.count(), 1);

        // Freed slot is reused first
        table.upsert(peer(3, DeviceType::FatigueTester)).unwrap();
        assert_eq!(table.slots[0].address, MacAddress([0x02, 0, 0, 0, 0, 3]));
    }

    #[test]
    fn test_first_of_type_slot_order() {
        let mut table = PeerTable::new();
        table.upsert(peer(1, DeviceType::RemoteController)).unwrap();
        table.upsert(peer(2, DeviceType::FatigueTester)).unwrap();
        table.upsert(peer(3, DeviceType::FatigueTester)).unwrap();

        assert_eq!(
            table.first_of_type(DeviceType::FatigueTester),
            Some(MacAddress([0x02, 0, 0, 0, 0, 2]))
        );
        assert_eq!(table.first_of_type(DeviceType::Unknown), None);
    }

    #[test]
    fn test_consistency_check() {
        let mut table = PeerTable::new();
        table.upsert(peer(1, DeviceType::FatigueTester)).unwrap();
        assert!(table.is_consistent());

        table.slots[1] = peer(1, DeviceType::FatigueTester);
        assert!(!table.is_consistent());

        table.slots[1] = ApprovedPeer::new(
            MacAddress::ZERO,
            DeviceType::FatigueTester,
            DeviceName::new(),
            0,
        );
        assert!(!table.is_consistent());
    }

    #[test]
    fn test_record_roundtrip() {
        let mut table = PeerTable::new();
        table.upsert(peer(1, DeviceType::FatigueTester)).unwrap();

        let mut buffer = [0u8; PEER_RECORD_MAX_SIZE];
        let bytes = PeerRecord::new(table.clone()).encode(&mut buffer).unwrap();
        assert_eq!(PeerRecord::decode(bytes), Ok(table));
    }

    #[test]
    fn test_full_record_fits_buffer() {
        let mut table = PeerTable::new();
        for i in 1..=MAX_APPROVED_PEERS as u8 {
            let mut p = peer(i, DeviceType::FatigueTester);
            p.name = device_name("ABCDEFGHIJKLMNO");
            p.paired_at = u32::MAX;
            table.upsert(p).unwrap();
        }
        let mut buffer = [0u8; PEER_RECORD_MAX_SIZE];
        assert!(PeerRecord::new(table).encode(&mut buffer).is_ok());
    }

    #[test]
    fn test_record_rejections() {
        let mut table = PeerTable::new();
        table.upsert(peer(1, DeviceType::FatigueTester)).unwrap();

        let mut record = PeerRecord::new(table.clone());
        record.crc ^= 1;
        let mut buffer = [0u8; PEER_RECORD_MAX_SIZE];
        let bytes = record.encode(&mut buffer).unwrap();
        assert_eq!(PeerRecord::decode(bytes), Err(RecordError::CrcMismatch));

        let mut record = PeerRecord::new(table.clone());
        record.magic = 0;
        record.update_crc();
        let bytes = record.encode(&mut buffer).unwrap();
        assert_eq!(PeerRecord::decode(bytes), Err(RecordError::BadMagic));

        let mut record = PeerRecord::new(table);
        record.version = PEER_RECORD_VERSION + 1;
        record.update_crc();
        let bytes = record.encode(&mut buffer).unwrap();
        assert_eq!(PeerRecord::decode(bytes), Err(RecordError::UnsupportedVersion));

        assert_eq!(PeerRecord::decode(&[]), Err(RecordError::Decode));
    }

    #[test]
    fn test_record_rejects_duplicates() {
        let mut table = PeerTable::new();
        table.slots[0] = peer(1, DeviceType::FatigueTester);
        table.slots[2] = peer(1, DeviceType::RemoteController);

        let mut buffer = [0u8; PEER_RECORD_MAX_SIZE];
        let bytes = PeerRecord::new(table).encode(&mut buffer).unwrap();
        assert_eq!(PeerRecord::decode(bytes), Err(RecordError::Inconsistent));
    }
}
