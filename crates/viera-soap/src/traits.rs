//! Traits for SOAP transport abstraction.

use crate::SoapRequest;
use async_trait::async_trait;
use viera_core::error::Result;

/// SOAP transport trait for testability.
///
/// Implementations return the raw response body on 2xx and
/// `TransportError::Status` (with the body) otherwise.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SoapTransport: Send + Sync {
    /// POST a SOAP action and return the response body.
    async fn send(&mut self, request: &SoapRequest) -> Result<Vec<u8>>;

    /// GET a description document such as `nrc/ddd.xml`.
    async fn fetch(&mut self, path: &str) -> Result<Vec<u8>>;
}
