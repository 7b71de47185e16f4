//! Monotonic time source
//!
//! Timeouts in the link are pull-based: deadlines are stored as absolute
//! milliseconds and compared against [`Clock::now_ms`] when state is queried.

use portable_atomic::{AtomicU64, Ordering};

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin (typically boot)
    fn now_ms(&self) -> u64;

    /// Whole seconds since the origin
    fn now_secs(&self) -> u32 {
        (self.now_ms() / 1000) as u32
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Clock that only moves when told to
///
/// Shared by reference, so tests can advance time while a `Link` holds it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub const fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Clock backed by the embassy-time driver
#[cfg(feature = "embassy-time")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}
