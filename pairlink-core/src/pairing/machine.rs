//! Initiator state machine definition
//!
//! The pairing session's state is a function of the current state and an
//! event; side effects (radio, peer store) live in the `Link`.

/// Initiator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingState {
    /// No attempt in flight
    Idle,
    /// Request broadcast, waiting for a responder
    WaitingForResponse,
    /// Responder verified, confirmed and admitted
    Complete,
    /// Attempt ended without admitting a peer
    Failed(PairingFailure),
}

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingFailure {
    /// No valid response before the deadline
    Timeout,
    /// Responder's proof did not match our challenge
    HmacMismatch,
    /// Approved peer table is full
    PeerTableFull,
    /// Peer table could not be persisted
    Storage,
    /// Confirm could not be sent
    Transmit,
}

/// Inputs to the initiator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingEvent {
    /// Request broadcast succeeded
    Started,
    /// Deadline passed while waiting
    DeadlineElapsed,
    /// Responder confirmed and stored
    PeerAdmitted,
    /// Attempt aborted
    Failure(PairingFailure),
    /// Explicit cancellation
    Cancel,
}

impl PairingState {
    /// True while an attempt holds the session
    pub fn is_in_flight(&self) -> bool {
        matches!(self, PairingState::WaitingForResponse)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PairingState::Failed(_))
    }

    /// Process an event and return the next state
    pub fn transition(self, event: PairingEvent) -> Self {
        use PairingEvent::*;
        use PairingState::*;

        match (self, event) {
            // A finished attempt may be restarted; an active one may not
            (Idle, Started) => WaitingForResponse,
            (Complete, Started) => WaitingForResponse,
            (Failed(_), Started) => WaitingForResponse,

            // WaitingForResponse transitions
            (WaitingForResponse, PeerAdmitted) => Complete,
            (WaitingForResponse, DeadlineElapsed) => Failed(PairingFailure::Timeout),
            (WaitingForResponse, Failure(reason)) => Failed(reason),

            // Cancellation from anywhere
            (_, Cancel) => Idle,

            // Default: stay in current state
            _ => self,
        }
    }
}
