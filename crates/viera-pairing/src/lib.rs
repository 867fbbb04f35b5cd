//! # viera-pairing
//!
//! The encrypted session layer of the Viera remote control protocol.
//!
//! This crate implements:
//! - `SessionState`: credentials, session keys, session id and sequence number
//! - `PairingFlow`: the sans-IO PIN pairing and session id handshake
//! - `CommandEnvelope`: wrapping remote control commands into
//!   `X_EncryptedCommand` and unwrapping the encrypted results
//!
//! Nothing here performs I/O. Each step returns the `SoapRequest` to send and
//! takes back the transport result.

mod envelope;
mod pairing;
mod session;

pub use envelope::{CommandEnvelope, Outgoing};
pub use pairing::{PairingFlow, PairingStage};
pub use session::{Credentials, SessionState};
