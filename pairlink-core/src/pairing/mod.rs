//! Pairing handshake
//!
//! ```text
//!  initiator (remote)                         responder (test unit)
//!  ──────────────────                         ─────────────────────
//!  Request{challenge_i}        ── broadcast ──▶  in pairing mode?
//!                              ◀── unicast ───  Response{challenge_r, HMAC(challenge_i)}
//!  verify, admit responder
//!  Confirm{HMAC(challenge_r)}  ── unicast ────▶  verify, admit initiator
//! ```
//!
//! Either side refuses with a Reject; the initiator only logs them.

mod machine;
mod responder;
mod session;

pub use machine::{PairingEvent, PairingFailure, PairingState};
pub use responder::{ConfirmVerdict, PendingConfirm, RequestVerdict, ResponderSession};
pub use session::{PairingSession, ResponseVerdict};

/// Errors from starting a pairing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingError {
    /// An attempt is already in flight
    Busy,
    /// The Request could not be broadcast; the session stays as it was
    Transmit,
}
