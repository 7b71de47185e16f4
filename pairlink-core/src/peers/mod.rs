//! Approved peers
//!
//! Only approved peers get past the receive pipeline's security gate.
//! Peers are admitted by completing a pairing handshake, or at build time
//! as the single preconfigured peer.

mod store;
mod table;

pub use store::{PeerStore, PeerStoreError};
pub use table::{
    ApprovedPeer, PeerRecord, PeerTable, RecordError, TableFull, PEER_RECORD_MAGIC,
    PEER_RECORD_MAX_SIZE, PEER_RECORD_VERSION,
};
