//! Error types for the Viera remote.

use thiserror::Error;

/// Primary error type for all Viera operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("SOAP error: {0}")]
    Soap(#[from] SoapError),

    #[error("TV requires an encrypted session; pair with the TV first")]
    EncryptionRequired,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// True when the failure came from the network layer (TV off, timeout, HTTP error).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// The SOAP fault carried by this error, if any.
    pub fn fault(&self) -> Option<(u32, &str)> {
        match self {
            Error::Soap(SoapError::Fault { code, description }) => Some((*code, description)),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(TransportError::Io(err))
    }
}

/// Errors from the HTTP transport carrying SOAP requests.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timed out")]
    Timeout,

    /// Non-2xx HTTP status. The body is kept so SOAP faults can be decoded.
    #[error("HTTP status {status}")]
    Status { status: u16, body: Vec<u8> },

    #[error("Invalid HTTP response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Response body of an HTTP error, if the device sent one.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            TransportError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// SOAP-level protocol errors reported by the device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SoapError {
    #[error("fault {code}: {description}")]
    Fault { code: u32, description: String },

    #[error("missing element <{0}> in response")]
    MissingElement(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors during PIN pairing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    #[error("Invalid PIN code")]
    InvalidPinCode,

    #[error("Invalid pairing state: {0}")]
    InvalidState(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Cryptographic operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key material: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial { expected: usize, actual: usize },

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Invalid base64 payload: {0}")]
    Encoding(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
