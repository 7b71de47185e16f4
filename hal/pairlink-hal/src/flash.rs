//! Flash storage abstractions
//!
//! Provides traits for persistent key/blob storage that can be implemented
//! on top of a NOR flash partition or, on hosts, plain RAM.

/// Storage keys for persisted data
///
/// These keys identify different records stored in flash. The storage
/// implementation handles wear leveling; callers add their own integrity
/// checks on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Approved peer table (postcard record with CRC32)
    PeerTable = 0,
    /// Application settings, owned by the application
    AppSettings = 1,
    /// Reserved for future use
    Reserved2 = 2,
    /// Reserved for future use
    Reserved3 = 3,
}

impl StorageKey {
    /// Number of distinct keys
    pub const COUNT: usize = 4;

    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::PeerTable),
            1 => Some(StorageKey::AppSettings),
            2 => Some(StorageKey::Reserved2),
            3 => Some(StorageKey::Reserved3),
            _ => None,
        }
    }
}

/// Errors from flash storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash operation failed
    Flash,
    /// Storage operation failed
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Data corrupted or invalid
    Corrupted,
    /// Storage is full
    Full,
}

/// Flash storage trait
///
/// Writes may be staged; they are only guaranteed durable once
/// [`commit`](FlashStorage::commit) returns `Ok`.
pub trait FlashStorage {
    /// Read a value by key into the provided buffer
    ///
    /// Returns the number of bytes read, or [`FlashError::NotFound`].
    fn read(
        &mut self,
        key: StorageKey,
        buffer: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, FlashError>>;

    /// Write a value by key, replacing any previous value
    fn write(
        &mut self,
        key: StorageKey,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Make all previous writes durable
    fn commit(&mut self) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Check if a key exists in storage
    fn exists(&mut self, key: StorageKey) -> impl core::future::Future<Output = bool>;

    /// Erase all stored data
    ///
    /// This erases the entire partition, application records included.
    fn erase_all(&mut self) -> impl core::future::Future<Output = Result<(), FlashError>>;
}

// Implement the sequential-storage Key trait when the feature is enabled
#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        buffer[0] = self.as_u8();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        match StorageKey::from_u8(buffer[0]) {
            Some(key) => Ok((key, 1)),
            None => Err(sequential_storage::map::SerializationError::InvalidFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_roundtrip() {
        for byte in 0..StorageKey::COUNT as u8 {
            let key = StorageKey::from_u8(byte).unwrap();
            assert_eq!(key.as_u8(), byte);
        }
        assert_eq!(StorageKey::from_u8(StorageKey::COUNT as u8), None);
    }
}
