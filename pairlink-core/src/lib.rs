//! Secure pairing and receive pipeline for the pairlink radio link
//!
//! This crate contains everything above the radio driver that does not
//! depend on a particular board:
//!
//! - Pairing secret, challenges and HMAC proofs
//! - Initiator and responder pairing sessions
//! - Approved-peer table persisted through [`pairlink_hal::FlashStorage`]
//! - Interrupt-safe receive queue, worker and security gate
//! - Send API for application traffic
//!
//! A board crate wires a [`link::Link`] to its radio, flash, clock and RNG,
//! feeds received datagrams to [`link::RxProducer::on_receive`] and spawns
//! [`link::Link::run`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod link;
pub mod pairing;
pub mod peers;
pub mod security;

#[cfg(test)]
mod testing;

pub use config::LinkConfig;
pub use link::{Link, LinkChannels, LinkError, LinkEvent, RxProducer};
pub use pairing::{PairingError, PairingState};
pub use peers::{ApprovedPeer, PeerStore, PeerStoreError};
pub use security::PairingSecret;
