//! Pairing security primitives
//!
//! - [`PairingSecret`]: the pre-shared 16 byte key
//! - [`compute_hmac`] / [`verify_hmac`]: truncated HMAC-SHA256 proofs
//! - [`generate_challenge`]: fresh nonces from a cryptographic RNG

mod challenge;
mod mac;
mod secret;

pub use challenge::generate_challenge;
pub use mac::{compute_hmac, verify_hmac};
pub use secret::{PairingSecret, SecretError, SECRET_SIZE};
