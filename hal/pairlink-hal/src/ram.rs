//! RAM-backed storage
//!
//! Stands in for flash on hosts and in tests. Writes are staged and only
//! become durable on commit, so a dropped commit behaves like a power loss.
//! Faults can be injected to exercise rollback paths.

use heapless::Vec;

use crate::flash::{FlashError, FlashStorage, StorageKey};

type Slot<const N: usize> = Option<Vec<u8, N>>;

/// In-memory [`FlashStorage`] holding up to `N` bytes per key
#[derive(Debug, Clone)]
pub struct RamStorage<const N: usize> {
    committed: [Slot<N>; StorageKey::COUNT],
    staged: [Slot<N>; StorageKey::COUNT],
    dirty: [bool; StorageKey::COUNT],
    fail_writes: bool,
    fail_commits: bool,
    commits: usize,
}

impl<const N: usize> Default for RamStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamStorage<N> {
    pub fn new() -> Self {
        Self {
            committed: core::array::from_fn(|_| None),
            staged: core::array::from_fn(|_| None),
            dirty: [false; StorageKey::COUNT],
            fail_writes: false,
            fail_commits: false,
            commits: 0,
        }
    }

    /// Make subsequent writes fail with [`FlashError::Flash`]
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Make subsequent commits fail with [`FlashError::Flash`]
    pub fn set_fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Drop all staged writes, as if power was lost before commit
    pub fn power_cycle(&mut self) {
        self.staged = core::array::from_fn(|_| None);
        self.dirty = [false; StorageKey::COUNT];
    }

    /// Durable contents of a key
    pub fn committed(&self, key: StorageKey) -> Option<&[u8]> {
        self.committed[key as usize].as_deref()
    }

    /// Mutable access to the durable bytes of a key
    pub fn committed_mut(&mut self, key: StorageKey) -> Option<&mut Vec<u8, N>> {
        self.committed[key as usize].as_mut()
    }

    /// Replace the durable bytes of a key directly, bypassing staging
    pub fn preload(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        self.committed[key as usize] = Some(Self::copy(data)?);
        Ok(())
    }

    fn copy(data: &[u8]) -> Result<Vec<u8, N>, FlashError> {
        Vec::from_slice(data).map_err(|_| FlashError::Full)
    }

    fn current(&self, key: StorageKey) -> Option<&Vec<u8, N>> {
        let index = key as usize;
        if self.dirty[index] {
            self.staged[index].as_ref()
        } else {
            self.committed[index].as_ref()
        }
    }
}

impl<const N: usize> FlashStorage for RamStorage<N> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let data = self.current(key).ok_or(FlashError::NotFound)?;
        let len = data.len();
        if buffer.len() < len {
            return Err(FlashError::BufferTooSmall);
        }
        buffer[..len].copy_from_slice(data);
        Ok(len)
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Flash);
        }
        let index = key as usize;
        self.staged[index] = Some(Self::copy(data)?);
        self.dirty[index] = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), FlashError> {
        if self.fail_commits {
            return Err(FlashError::Flash);
        }
        for index in 0..StorageKey::COUNT {
            if self.dirty[index] {
                self.committed[index] = self.staged[index].take();
                self.dirty[index] = false;
            }
        }
        self.commits += 1;
        Ok(())
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        self.current(key).is_some()
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Flash);
        }
        self.committed = core::array::from_fn(|_| None);
        self.power_cycle();
        Ok(())
    }
}
