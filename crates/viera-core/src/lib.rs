//! # viera-core
//!
//! Core types, constants, and error definitions shared across all Viera crates.
//!
//! This crate provides:
//! - Device address and encryption capability types
//! - Remote control key codes
//! - Protocol constants (control URLs, service URNs, pairing actions)
//! - Common error types

pub mod constants;
pub mod device;
pub mod error;
pub mod keys;

pub use device::{Device, DeviceInfo, Encryption};
pub use error::{CryptoError, Error, PairingError, Result, SoapError, TransportError};
pub use keys::Key;
