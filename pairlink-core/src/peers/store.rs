//! Persisted approved-peer store
//!
//! Wraps a [`PeerTable`] with its flash backing and the optional build-time
//! preconfigured peer. Every mutation is written and committed before it
//! returns; a failed write rolls the in-memory table back.

use pairlink_hal::{FlashError, FlashStorage, StorageKey};
use pairlink_protocol::{device_name, DeviceType, MacAddress};

use super::table::{ApprovedPeer, PeerRecord, PeerTable, RecordError, PEER_RECORD_MAX_SIZE};
use crate::config::PreconfiguredPeer;

/// Errors from peer store mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerStoreError {
    /// No free slot and the address is not already present
    Full,
    /// Zero or broadcast address
    InvalidAddress,
    /// Persisting the table failed; the change was rolled back
    Storage(FlashError),
    /// The table could not be serialized
    Serialize,
}

impl From<FlashError> for PeerStoreError {
    fn from(e: FlashError) -> Self {
        PeerStoreError::Storage(e)
    }
}

impl From<RecordError> for PeerStoreError {
    fn from(_: RecordError) -> Self {
        PeerStoreError::Serialize
    }
}

pub struct PeerStore<S> {
    storage: S,
    table: PeerTable,
    preconfigured: Option<PreconfiguredPeer>,
}

impl<S: FlashStorage> PeerStore<S> {
    /// Load the table from `storage`
    ///
    /// A missing, undecodable or inconsistent record yields an empty table.
    pub async fn load(mut storage: S, preconfigured: Option<PreconfiguredPeer>) -> Self {
        let mut buffer = [0u8; PEER_RECORD_MAX_SIZE];

        let table = match storage.read(StorageKey::PeerTable, &mut buffer).await {
            Ok(len) => match PeerRecord::decode(&buffer[..len]) {
                Ok(table) => table,
                Err(e) => {
                    warn!("Discarding stored peer table: {:?}", e);
                    PeerTable::new()
                }
            },
            Err(FlashError::NotFound) => {
                info!("No stored peer table");
                PeerTable::new()
            }
            Err(e) => {
                warn!("Failed to read peer table: {:?}", e);
                PeerTable::new()
            }
        };

        let mut store = Self {
            storage,
            table,
            preconfigured,
        };

        // A stored copy of the preconfigured peer would hold a slot forever
        if let Some(address) = store.preconfigured.map(|p| p.address) {
            if store.table.remove(&address) {
                info!("Dropping stored entry for preconfigured peer {}", address);
                if let Err(e) = store.persist().await {
                    warn!("Failed to persist peer table: {:?}", e);
                }
            }
        }

        store.dump();
        store
    }

    fn dump(&self) {
        if let Some(peer) = &self.preconfigured {
            info!("Preconfigured peer {} ({:?})", peer.address, peer.device_type);
        }
        info!("{} approved peer(s)", self.table.count());
        for peer in self.table.iter() {
            info!(
                "  {} {:?} '{}' paired at {}s",
                peer.address,
                peer.device_type,
                peer.name.as_str(),
                peer.paired_at
            );
        }
    }

    /// Whether `address` may send application traffic
    pub fn is_approved(&self, address: &MacAddress) -> bool {
        if address.is_zero() {
            return false;
        }
        self.is_preconfigured(address) || self.table.contains(address)
    }

    pub fn is_preconfigured(&self, address: &MacAddress) -> bool {
        self.preconfigured
            .as_ref()
            .is_some_and(|p| p.address == *address)
    }

    /// Approve a peer, updating it in place if already present
    ///
    /// An empty `name` is replaced by the device type's default name.
    pub async fn add(
        &mut self,
        address: MacAddress,
        device_type: DeviceType,
        name: &str,
        paired_at: u32,
    ) -> Result<(), PeerStoreError> {
        if !address.is_unicast() {
            return Err(PeerStoreError::InvalidAddress);
        }
        if self.is_preconfigured(&address) {
            debug!("{} is preconfigured, not storing", address);
            return Ok(());
        }

        let name = if name.is_empty() {
            device_type.default_name()
        } else {
            name
        };
        let peer = ApprovedPeer::new(address, device_type, device_name(name), paired_at);

        let previous = self.table.clone();
        self.table.upsert(peer).map_err(|_| PeerStoreError::Full)?;
        if let Err(e) = self.persist().await {
            self.table = previous;
            return Err(e);
        }

        info!("Approved {} ({:?})", address, device_type);
        Ok(())
    }

    /// Forget a peer
    ///
    /// Returns `Ok(false)` if the address was not stored. The preconfigured
    /// peer cannot be removed.
    pub async fn remove(&mut self, address: &MacAddress) -> Result<bool, PeerStoreError> {
        if self.is_preconfigured(address) {
            warn!("{} is preconfigured and cannot be removed", address);
            return Ok(false);
        }

        let previous = self.table.clone();
        if !self.table.remove(address) {
            return Ok(false);
        }
        if let Err(e) = self.persist().await {
            self.table = previous;
            return Err(e);
        }

        info!("Removed {}", address);
        Ok(true)
    }

    /// Forget every stored peer
    pub async fn clear_all(&mut self) -> Result<(), PeerStoreError> {
        let previous = self.table.clone();
        self.table.clear();
        if let Err(e) = self.persist().await {
            self.table = previous;
            return Err(e);
        }
        info!("Cleared approved peers");
        Ok(())
    }

    /// First approved peer of a type, preconfigured peer first
    pub fn first_of_type(&self, device_type: DeviceType) -> Option<MacAddress> {
        match &self.preconfigured {
            Some(p) if p.device_type == device_type => Some(p.address),
            _ => self.table.first_of_type(device_type),
        }
    }

    /// Entry for an address, including the preconfigured peer
    pub fn get(&self, address: &MacAddress) -> Option<ApprovedPeer> {
        match &self.preconfigured {
            Some(p) if p.address == *address => Some(ApprovedPeer::new(
                p.address,
                p.device_type,
                device_name(p.name),
                0,
            )),
            _ => self.table.get(address).cloned(),
        }
    }

    /// Number of stored peers; the preconfigured peer is not counted
    pub fn count(&self) -> usize {
        self.table.count()
    }

    pub fn is_full(&self) -> bool {
        self.table.is_full()
    }

    /// Stored peers in slot order
    pub fn iter(&self) -> impl Iterator<Item = &ApprovedPeer> {
        self.table.iter()
    }

    pub fn preconfigured(&self) -> Option<&PreconfiguredPeer> {
        self.preconfigured.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    async fn persist(&mut self) -> Result<(), PeerStoreError> {
        let mut buffer = [0u8; PEER_RECORD_MAX_SIZE];
        let record = PeerRecord::new(self.table.clone());
        let bytes = record.encode(&mut buffer)?;

        self.storage.write(StorageKey::PeerTable, bytes).await?;
        self.storage.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use pairlink_hal::RamStorage;

    type Storage = RamStorage<256>;

    const UNIT_A: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0xA1]);
    const UNIT_B: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0xB2]);
    const BENCH: PreconfiguredPeer = PreconfiguredPeer {
        address: MacAddress([0x24, 0x6F, 0x28, 0x00, 0x00, 0x01]),
        device_type: DeviceType::FatigueTester,
        name: "Bench",
    };

    fn empty_store() -> PeerStore<Storage> {
        block_on(PeerStore::load(Storage::new(), None))
    }

    #[test]
    fn test_load_missing_record_is_empty() {
        let store = empty_store();
        assert_eq!(store.count(), 0);
        assert!(!store.is_approved(&UNIT_A));
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "Rig 1", 42)).unwrap();
        assert_eq!(store.storage_mut().commit_count(), 1);

        let reloaded = block_on(PeerStore::load(store.into_storage(), None));
        let peer = reloaded.get(&UNIT_A).unwrap();
        assert_eq!(peer.name.as_str(), "Rig 1");
        assert_eq!(peer.paired_at, 42);
        assert!(reloaded.is_approved(&UNIT_A));
    }

    #[test]
    fn test_load_drops_stored_preconfigured_peer() {
        let mut store = empty_store();
        block_on(store.add(BENCH.address, DeviceType::FatigueTester, "Bench", 1)).unwrap();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "Rig", 1)).unwrap();

        let mut store = block_on(PeerStore::load(store.into_storage(), Some(BENCH)));
        assert_eq!(store.count(), 1);
        assert!(store.is_approved(&BENCH.address));

        // The freed slot is usable
        for i in 0..3u8 {
            let addr = MacAddress([0x02, 0, 0, 0, 0x10, i]);
            block_on(store.add(addr, DeviceType::FatigueTester, "", 1)).unwrap();
        }
        assert!(store.is_full());

        // The cleanup was persisted
        let reloaded = block_on(PeerStore::load(store.into_storage(), None));
        assert!(!reloaded.is_approved(&BENCH.address));
        assert!(reloaded.is_approved(&UNIT_A));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "Rig", 1)).unwrap();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "Rig", 1)).unwrap();
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_add_default_name() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 1)).unwrap();
        assert_eq!(store.get(&UNIT_A).unwrap().name.as_str(), "Fatigue Tester");
    }

    #[test]
    fn test_add_rejects_invalid_addresses() {
        let mut store = empty_store();
        assert_eq!(
            block_on(store.add(MacAddress::ZERO, DeviceType::FatigueTester, "", 0)),
            Err(PeerStoreError::InvalidAddress)
        );
        assert_eq!(
            block_on(store.add(MacAddress::BROADCAST, DeviceType::FatigueTester, "", 0)),
            Err(PeerStoreError::InvalidAddress)
        );
        assert!(!store.is_approved(&MacAddress::ZERO));
    }

    #[test]
    fn test_full_table_does_not_mutate() {
        let mut store = empty_store();
        for i in 0..4u8 {
            let addr = MacAddress([0x02, 0, 0, 0, 1, i]);
            block_on(store.add(addr, DeviceType::FatigueTester, "", 0)).unwrap();
        }
        let commits = store.storage_mut().commit_count();

        assert_eq!(
            block_on(store.add(UNIT_B, DeviceType::FatigueTester, "", 0)),
            Err(PeerStoreError::Full)
        );
        assert_eq!(store.count(), 4);
        assert!(!store.is_approved(&UNIT_B));
        assert_eq!(store.storage_mut().commit_count(), commits);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = empty_store();
        store.storage_mut().set_fail_writes(true);
        assert_eq!(
            block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)),
            Err(PeerStoreError::Storage(FlashError::Flash))
        );
        assert!(!store.is_approved(&UNIT_A));
    }

    #[test]
    fn test_failed_commit_rolls_back_remove() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();

        store.storage_mut().set_fail_commits(true);
        assert_eq!(
            block_on(store.remove(&UNIT_A)),
            Err(PeerStoreError::Storage(FlashError::Flash))
        );
        assert!(store.is_approved(&UNIT_A));
    }

    #[test]
    fn test_remove() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();

        assert_eq!(block_on(store.remove(&UNIT_A)), Ok(true));
        assert_eq!(block_on(store.remove(&UNIT_A)), Ok(false));
        assert!(!store.is_approved(&UNIT_A));
    }

    #[test]
    fn test_preconfigured_peer() {
        let mut store = block_on(PeerStore::load(Storage::new(), Some(BENCH)));
        assert!(store.is_approved(&BENCH.address));
        assert_eq!(store.count(), 0);
        assert_eq!(store.get(&BENCH.address).unwrap().name.as_str(), "Bench");

        assert_eq!(block_on(store.remove(&BENCH.address)), Ok(false));
        assert!(store.is_approved(&BENCH.address));

        block_on(store.add(BENCH.address, DeviceType::FatigueTester, "", 0)).unwrap();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_first_of_type_prefers_preconfigured() {
        let mut store = block_on(PeerStore::load(Storage::new(), Some(BENCH)));
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();
        block_on(store.add(UNIT_B, DeviceType::RemoteController, "", 0)).unwrap();

        assert_eq!(store.first_of_type(DeviceType::FatigueTester), Some(BENCH.address));
        assert_eq!(store.first_of_type(DeviceType::RemoteController), Some(UNIT_B));
        assert_eq!(store.first_of_type(DeviceType::Unknown), None);
    }

    #[test]
    fn test_corrupted_record_loads_empty() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();
        let mut storage = store.into_storage();

        let blob = storage.committed_mut(StorageKey::PeerTable).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        let reloaded = block_on(PeerStore::load(storage, None));
        assert_eq!(reloaded.count(), 0);
    }

    #[test]
    fn test_truncated_record_loads_empty() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();
        let mut storage = store.into_storage();

        let blob = storage.committed_mut(StorageKey::PeerTable).unwrap();
        blob.truncate(blob.len() / 2);

        let reloaded = block_on(PeerStore::load(storage, None));
        assert_eq!(reloaded.count(), 0);
    }

    #[test]
    fn test_uncommitted_write_lost_on_power_cycle() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();

        store.storage_mut().set_fail_commits(true);
        let _ = block_on(store.add(UNIT_B, DeviceType::FatigueTester, "", 0));
        let mut storage = store.into_storage();
        storage.power_cycle();

        let reloaded = block_on(PeerStore::load(storage, None));
        assert!(reloaded.is_approved(&UNIT_A));
        assert!(!reloaded.is_approved(&UNIT_B));
    }

    #[test]
    fn test_clear_all() {
        let mut store = empty_store();
        block_on(store.add(UNIT_A, DeviceType::FatigueTester, "", 0)).unwrap();
        block_on(store.add(UNIT_B, DeviceType::FatigueTester, "", 0)).unwrap();
        block_on(store.clear_all()).unwrap();
        assert_eq!(store.count(), 0);
        assert_eq!(store.iter().count(), 0);
    }
}
