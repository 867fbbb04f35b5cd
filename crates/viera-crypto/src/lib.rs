//! # viera-crypto
//!
//! Cryptographic primitives for the Viera encrypted session protocol.
//!
//! This crate provides:
//! - Key material containers and the two vendor key derivations
//!   (session keys from the persisted seed, pairing keys from the PIN challenge)
//! - The payload codec: framed, NUL-padded, AES-CBC encrypted, HMAC-SHA-256
//!   tagged, base64 encoded
//!
//! All key bytes are zeroized on drop.

pub mod keys;
pub mod payload;

pub use keys::{KeyMaterial, HMAC_KEY_MASK};
pub use payload::PayloadCodec;
