//! Challenge generation

use pairlink_protocol::{Challenge, CHALLENGE_SIZE};
use rand_core::{CryptoRng, RngCore};

/// Draw a fresh challenge
///
/// An all-zero draw is rerolled; it is what an uninitialised session holds.
pub fn generate_challenge<R: RngCore + CryptoRng>(rng: &mut R) -> Challenge {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    loop {
        rng.fill_bytes(&mut challenge);
        if challenge.iter().any(|&b| b != 0) {
            return challenge;
        }
    }
}
