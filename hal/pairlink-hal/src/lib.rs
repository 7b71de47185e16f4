//! pairlink Hardware Abstraction Layer
//!
//! This crate defines the hardware seams the link logic runs against, so the
//! same pairing and peer-management code runs on the radio target and on a
//! development host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  pairlink-core (Link, PeerStore, ...)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pairlink-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!   radio driver   NOR flash   RamStorage /
//!   (board crate)  (seq-stor)  ManualClock
//! ```
//!
//! # Traits
//!
//! - [`radio::RadioTx`] - Datagram transmit
//! - [`flash::FlashStorage`] - Persistent key/blob storage
//! - [`clock::Clock`] - Monotonic milliseconds

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod flash;
#[cfg(feature = "sequential-storage")]
pub mod nor;
pub mod radio;
pub mod ram;

// Re-export key traits at crate root for convenience
pub use clock::{Clock, ManualClock};
#[cfg(feature = "embassy-time")]
pub use clock::EmbassyClock;
pub use flash::{FlashError, FlashStorage, StorageKey};
#[cfg(feature = "sequential-storage")]
pub use nor::NorFlashStorage;
pub use radio::{RadioError, RadioTx};
pub use ram::RamStorage;
