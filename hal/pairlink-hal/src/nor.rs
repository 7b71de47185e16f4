//! NOR flash storage
//!
//! Uses sequential-storage for wear-leveled key/blob storage inside a
//! dedicated partition of any async `NorFlash` device.

use core::ops::Range;

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use crate::flash::{FlashError, FlashStorage, StorageKey};

/// Largest record the store can hold, item header included
pub const MAX_RECORD_SIZE: usize = 512;

/// [`FlashStorage`] over a `NorFlash` partition
///
/// sequential-storage writes are durable once `store_item` returns, so
/// [`commit`](FlashStorage::commit) has nothing left to do.
pub struct NorFlashStorage<F> {
    flash: F,
    range: Range<u32>,
}

impl<F: NorFlash> NorFlashStorage<F> {
    /// Create a store over `range`, which must be aligned to the erase size
    pub fn new(flash: F, range: Range<u32>) -> Self {
        Self { flash, range }
    }

    /// Get the raw flash device for low-level access
    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }
}

impl<F: NorFlash> FlashStorage for NorFlashStorage<F> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let mut data_buffer = [0u8; MAX_RECORD_SIZE];

        let result = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        )
        .await;

        match result {
            Ok(Some(data)) => {
                let len = data.len();
                if buffer.len() < len {
                    return Err(FlashError::BufferTooSmall);
                }
                buffer[..len].copy_from_slice(data);
                Ok(len)
            }
            Ok(None) => Err(FlashError::NotFound),
            Err(sequential_storage::Error::Corrupted { .. }) => Err(FlashError::Corrupted),
            Err(_) => Err(FlashError::Storage),
        }
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let mut data_buffer = [0u8; MAX_RECORD_SIZE];

        map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        )
        .await
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => FlashError::Full,
            sequential_storage::Error::Storage { .. } => FlashError::Flash,
            _ => FlashError::Storage,
        })
    }

    async fn commit(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        let mut data_buffer = [0u8; MAX_RECORD_SIZE];

        matches!(
            map::fetch_item::<StorageKey, &[u8], _>(
                &mut self.flash,
                self.range.clone(),
                &mut NoCache::new(),
                &mut data_buffer,
                &key,
            )
            .await,
            Ok(Some(_))
        )
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.flash
            .erase(self.range.start, self.range.end)
            .await
            .map_err(|_| FlashError::Flash)
    }
}
