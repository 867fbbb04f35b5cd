//! Encrypted payload codec for `X_AuthInfo`, `X_EncInfo`, and their results.
//!
//! Wire format, before base64:
//!
//! ```text
//! +--------------------------- AES-128-CBC ---------------------------+
//! | Random (12) | Length (4 BE) | Plaintext (N) | NUL padding (1..16) | HMAC-SHA-256 (32)
//! +-------------------------------------------------------------------+
//! ```
//!
//! The receiver recovers the plaintext by dropping the 16-byte header and
//! cutting at the first NUL, so plaintexts must not contain NUL bytes.

use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use viera_core::error::CryptoError;

use crate::keys::KeyMaterial;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Random bytes + big-endian plaintext length.
pub const HEADER_LEN: usize = 16;

/// Random prefix of the header.
pub const NONCE_LEN: usize = 12;

/// HMAC-SHA-256 tag appended after the ciphertext.
pub const TAG_LEN: usize = 32;

/// Encrypts and decrypts payloads under one set of key material.
pub struct PayloadCodec<'a> {
    keys: &'a KeyMaterial,
}

impl<'a> PayloadCodec<'a> {
    pub fn new(keys: &'a KeyMaterial) -> Self {
        Self { keys }
    }

    /// Encrypt `plaintext` and return the base64 envelope.
    ///
    /// `rng` only fills the 12 header bytes; it need not be cryptographically strong.
    pub fn encrypt<R: RngCore + ?Sized>(
        &self,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        self.encrypt_with_nonce(plaintext, nonce)
    }

    fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: [u8; NONCE_LEN],
    ) -> Result<String, CryptoError> {
        let len = u32::try_from(plaintext.len()).map_err(|_| {
            CryptoError::Encryption(format!("payload too large: {} bytes", plaintext.len()))
        })?;

        let mut buf = Vec::with_capacity(HEADER_LEN + plaintext.len() + BLOCK_SIZE);
        buf.extend_from_slice(&nonce);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(plaintext);
        pad_with_nul(&mut buf);

        // Already block-aligned, so the mode adds nothing.
        let mut sealed = Aes128CbcEnc::new(self.keys.cipher_key().into(), self.keys.iv().into())
            .encrypt_padded_vec_mut::<NoPadding>(&buf);
        let tag = self.tag(&sealed)?;
        sealed.extend_from_slice(&tag);

        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a base64 envelope and return the plaintext bytes.
    ///
    /// The trailing HMAC tag is not checked; use [`verify`](Self::verify) to
    /// check it separately.
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, CryptoError> {
        let sealed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;

        let decrypted = self.open(&sealed)?;
        if decrypted.len() < HEADER_LEN {
            return Err(CryptoError::Decryption(format!(
                "payload of {} bytes is shorter than its header",
                decrypted.len()
            )));
        }

        let body = &decrypted[HEADER_LEN..];
        let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
        Ok(body[..end].to_vec())
    }

    /// Decrypt a base64 envelope holding UTF-8 text (an XML fragment).
    pub fn decrypt_str(&self, encoded: &str) -> Result<String, CryptoError> {
        let bytes = self.decrypt(encoded)?;
        String::from_utf8(bytes)
            .map_err(|e| CryptoError::Decryption(format!("payload is not UTF-8: {}", e)))
    }

    /// Check the trailing HMAC tag of a base64 envelope.
    pub fn verify(&self, encoded: &str) -> Result<bool, CryptoError> {
        let sealed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        if sealed.len() < TAG_LEN {
            return Ok(false);
        }

        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        let mut mac = self.mac()?;
        mac.update(ciphertext);
        Ok(mac.verify_slice(tag).is_ok())
    }

    /// AES-CBC decrypt of whole blocks, restarting from the key set's IV.
    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Aes128CbcDec::new(self.keys.cipher_key().into(), self.keys.iv().into())
            .decrypt_padded_vec_mut::<NoPadding>(sealed)
            .map_err(|_| {
                CryptoError::Decryption(format!(
                    "ciphertext length {} is not a multiple of {}",
                    sealed.len(),
                    BLOCK_SIZE
                ))
            })
    }

    fn tag(&self, ciphertext: &[u8]) -> Result<[u8; TAG_LEN], CryptoError> {
        let mut mac = self.mac()?;
        mac.update(ciphertext);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        Ok(tag)
    }

    fn mac(&self) -> Result<HmacSha256, CryptoError> {
        <HmacSha256 as Mac>::new_from_slice(self.keys.hmac_key())
            .map_err(|e| CryptoError::Encryption(format!("Invalid HMAC key: {}", e)))
    }
}

/// Append 1..=16 NUL bytes so the buffer ends on a block boundary.
///
/// A block-aligned buffer still gains a full block, so the receiver always
/// finds a terminator.
fn pad_with_nul(buf: &mut Vec<u8>) {
    let pad = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
    buf.resize(buf.len() + pad, 0);
}
