//! Truncated HMAC-SHA256

use hmac::digest::Key;
use hmac::{Hmac, Mac};
use pairlink_protocol::{Challenge, HmacTag, HMAC_SIZE};
use sha2::Sha256;

use super::secret::PairingSecret;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `challenge` keyed by `secret`, truncated to 16 bytes
pub fn compute_hmac(secret: &PairingSecret, challenge: &Challenge) -> HmacTag {
    // HMAC zero-pads short keys to the block size, so padding here is
    // equivalent and keeps construction infallible.
    let mut key = Key::<HmacSha256>::default();
    key[..secret.as_bytes().len()].copy_from_slice(secret.as_bytes());

    let mut mac = <HmacSha256 as Mac>::new(&key);
    mac.update(challenge);
    let digest = mac.finalize().into_bytes();

    let mut tag = [0u8; HMAC_SIZE];
    tag.copy_from_slice(&digest[..HMAC_SIZE]);
    tag
}

/// Check `received` against the expected tag for `challenge`
///
/// Differences are XOR-accumulated over every byte, so the comparison time
/// does not depend on where the first mismatch is.
pub fn verify_hmac(secret: &PairingSecret, challenge: &Challenge, received: &HmacTag) -> bool {
    let expected = compute_hmac(secret, challenge);
    let diff = expected
        .iter()
        .zip(received.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> PairingSecret {
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8 + 1;
        }
        PairingSecret::new(bytes).unwrap()
    }

    const CHALLENGE: Challenge = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7];

    #[test]
    fn test_known_answer() {
        let expected: HmacTag = [
            0x9a, 0x42, 0xdf, 0xf5, 0xc2, 0x97, 0xb2, 0x10, 0x75, 0xd1, 0x78, 0x1b, 0x89, 0x52,
            0xbe, 0xb8,
        ];
        assert_eq!(compute_hmac(&secret(), &CHALLENGE), expected);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            compute_hmac(&secret(), &CHALLENGE),
            compute_hmac(&secret(), &CHALLENGE)
        );
    }

    #[test]
    fn test_sensitive_to_challenge_and_secret() {
        let base = compute_hmac(&secret(), &CHALLENGE);

        let mut other_challenge = CHALLENGE;
        other_challenge[7] ^= 1;
        assert_ne!(compute_hmac(&secret(), &other_challenge), base);

        let other_secret = PairingSecret::new([0x55; 16]).unwrap();
        assert_ne!(compute_hmac(&other_secret, &CHALLENGE), base);
    }

    #[test]
    fn test_verify() {
        let tag = compute_hmac(&secret(), &CHALLENGE);
        assert!(verify_hmac(&secret(), &CHALLENGE, &tag));

        for i in 0..HMAC_SIZE {
            let mut bad = tag;
            bad[i] ^= 0x80;
            assert!(!verify_hmac(&secret(), &CHALLENGE, &bad));
        }

        for i in 0..CHALLENGE.len() {
            let mut other = CHALLENGE;
            other[i] ^= 0x01;
            assert!(!verify_hmac(&secret(), &other, &tag));
        }
    }
}
