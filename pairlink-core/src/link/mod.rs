//! Receive pipeline and send API
//!
//! ```text
//!  radio ISR ──on_receive──▶ raw queue ──▶ worker ──▶ event queue ──▶ application
//!                                           │
//!                       decode, pairing, security gate
//! ```
//!
//! The worker is the only consumer of the raw queue. Frames from peers
//! that are not approved never reach the event queue; pairing traffic is
//! handled inside the worker and surfaces only as
//! [`LinkEvent::PairingComplete`].

mod event;
mod rx;
mod service;


pub use event::{LinkError, LinkEvent};
pub use rx::{EventQueue, LinkChannels, RawFrame, RawQueue, RxProducer};
pub use service::Link;
