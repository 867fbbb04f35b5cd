//! Key material and the vendor key derivations.
//!
//! Two derivations exist, both pure byte shuffles with no cryptographic
//! strength of their own:
//!
//! - **Session keys** come from the 16-byte seed (`X_Keyword`) handed out at
//!   pairing time. The seed is the IV; the AES key swaps the 16-bit halves of
//!   every 32-bit word; the HMAC key is the IV twice.
//! - **Challenge keys** protect the pairing exchange itself. The AES key is
//!   the bitwise complement of the challenge with each 32-bit word
//!   byte-reversed; the HMAC key XORs a fixed 32-byte mask with the challenge
//!   read through the same half-word swap.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use viera_core::error::CryptoError;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of AES key, IV, and pairing challenge.
pub const KEY_LEN: usize = 16;

/// Length of the HMAC-SHA-256 key.
pub const HMAC_KEY_LEN: usize = 32;

/// HMAC key mask from the vendor control library.
pub const HMAC_KEY_MASK: [u8; HMAC_KEY_LEN] = [
    0x15, 0xC9, 0x5A, 0xC2, 0xB0, 0x8A, 0xA7, 0xEB, 0x4E, 0x22, 0x8F, 0x81, 0x1E, 0x34, 0xD0, 0x4F,
    0xA5, 0x4B, 0xA7, 0xDC, 0xAC, 0x98, 0x79, 0xFA, 0x8A, 0xCD, 0xA3, 0xFC, 0x24, 0x4F, 0x38, 0x54,
];

/// AES key, CBC IV, and HMAC key used together for one payload direction.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    cipher_key: [u8; KEY_LEN],
    iv: [u8; KEY_LEN],
    hmac_key: [u8; HMAC_KEY_LEN],
}

impl KeyMaterial {
    pub fn new(cipher_key: [u8; KEY_LEN], iv: [u8; KEY_LEN], hmac_key: [u8; HMAC_KEY_LEN]) -> Self {
        Self {
            cipher_key,
            iv,
            hmac_key,
        }
    }

    /// Derive session keys from the base64 seed returned as `X_Keyword`.
    pub fn derive_session(enc_key_b64: &str) -> Result<Self, CryptoError> {
        let mut decoded = STANDARD
            .decode(enc_key_b64.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;

        if decoded.len() != KEY_LEN {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKeyMaterial {
                expected: KEY_LEN,
                actual,
            });
        }

        let mut iv = [0u8; KEY_LEN];
        iv.copy_from_slice(&decoded);
        decoded.zeroize();

        Ok(Self::derive_session_from_seed(iv))
    }

    /// Derive session keys from the raw 16-byte seed.
    pub fn derive_session_from_seed(iv: [u8; KEY_LEN]) -> Self {
        let mut cipher_key = [0u8; KEY_LEN];
        for i in (0..KEY_LEN).step_by(4) {
            cipher_key[i] = iv[i + 2];
            cipher_key[i + 1] = iv[i + 3];
            cipher_key[i + 2] = iv[i];
            cipher_key[i + 3] = iv[i + 1];
        }

        let mut hmac_key = [0u8; HMAC_KEY_LEN];
        hmac_key[..KEY_LEN].copy_from_slice(&iv);
        hmac_key[KEY_LEN..].copy_from_slice(&iv);

        Self {
            cipher_key,
            iv,
            hmac_key,
        }
    }

    /// Derive the pairing keys from the `X_ChallengeKey` bytes.
    pub fn derive_challenge(challenge: &[u8; KEY_LEN]) -> Self {
        let mut cipher_key = [0u8; KEY_LEN];
        for i in (0..KEY_LEN).step_by(4) {
            cipher_key[i] = !challenge[i + 3];
            cipher_key[i + 1] = !challenge[i + 2];
            cipher_key[i + 2] = !challenge[i + 1];
            cipher_key[i + 3] = !challenge[i];
        }

        // The mask is twice the challenge length; indices wrap mod 16.
        let mut hmac_key = [0u8; HMAC_KEY_LEN];
        for i in (0..HMAC_KEY_LEN).step_by(4) {
            hmac_key[i] = HMAC_KEY_MASK[i] ^ challenge[(i + 2) & 0xF];
            hmac_key[i + 1] = HMAC_KEY_MASK[i + 1] ^ challenge[(i + 3) & 0xF];
            hmac_key[i + 2] = HMAC_KEY_MASK[i + 2] ^ challenge[i & 0xF];
            hmac_key[i + 3] = HMAC_KEY_MASK[i + 3] ^ challenge[(i + 1) & 0xF];
        }

        Self {
            cipher_key,
            iv: *challenge,
            hmac_key,
        }
    }

    /// Like [`derive_challenge`](Self::derive_challenge), checking the length first.
    pub fn derive_challenge_from_slice(challenge: &[u8]) -> Result<Self, CryptoError> {
        let challenge: &[u8; KEY_LEN] =
            challenge
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyMaterial {
                    expected: KEY_LEN,
                    actual: challenge.len(),
                })?;
        Ok(Self::derive_challenge(challenge))
    }

    pub fn cipher_key(&self) -> &[u8; KEY_LEN] {
        &self.cipher_key
    }

    pub fn iv(&self) -> &[u8; KEY_LEN] {
        &self.iv
    }

    pub fn hmac_key(&self) -> &[u8; HMAC_KEY_LEN] {
        &self.hmac_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}
