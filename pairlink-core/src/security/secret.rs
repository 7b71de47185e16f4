//! Pre-shared pairing secret

use core::fmt;

use crate::config::{PAIRING_SECRET, SECRET_IS_PLACEHOLDER};

pub const SECRET_SIZE: usize = 16;

/// Development placeholder every unprovisioned build shares
const PLACEHOLDER: [u8; SECRET_SIZE] = [
    0x00, 0x00, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef, 0xca, 0xfe, 0xba, 0xbe, 0xde, 0xad, 0xbe, 0xef,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecretError {
    /// The shared development placeholder in a release build
    Placeholder,
    AllZero,
}

/// Key for the pairing HMACs
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct PairingSecret([u8; SECRET_SIZE]);

impl PairingSecret {
    /// Wrap raw key bytes
    ///
    /// The development placeholder is refused in release builds.
    pub fn new(bytes: [u8; SECRET_SIZE]) -> Result<Self, SecretError> {
        if bytes.iter().all(|&b| b == 0) {
            return Err(SecretError::AllZero);
        }
        if bytes == PLACEHOLDER && !cfg!(debug_assertions) {
            return Err(SecretError::Placeholder);
        }
        Ok(Self(bytes))
    }

    /// Secret provisioned at build time
    ///
    /// build.rs refuses to produce a release build around the placeholder,
    /// so this is always usable.
    pub const fn compiled() -> Self {
        Self(PAIRING_SECRET)
    }

    /// True if this is the shared development placeholder
    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER || (SECRET_IS_PLACEHOLDER && self.0 == PAIRING_SECRET)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PairingSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PairingSecret(..)")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PairingSecret {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PairingSecret(..)")
    }
}
