//! # viera-soap
//!
//! SOAP over HTTP for the Viera control endpoints.
//!
//! This crate provides:
//! - SOAP request envelopes and their HTTP framing
//! - HTTP response parsing (Content-Length, chunked, read-to-close)
//! - UPnP fault decoding
//! - Namespace-agnostic XML leaf extraction
//! - The `SoapTransport` trait and its TCP implementation

mod connection;
mod request;
mod response;
mod traits;
pub mod fault;
pub mod xml;

pub use connection::HttpTransport;
pub use request::SoapRequest;
pub use response::HttpResponse;
pub use traits::SoapTransport;
