//! UPnP SOAP fault decoding.
//!
//! The TV answers failed actions with HTTP 500 and a body like:
//!
//! ```xml
//! <s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring>
//! <detail><UPnPError><errorCode>600</errorCode>
//! <errorDescription>Invalid Args</errorDescription></UPnPError></detail></s:Fault>
//! ```

use crate::xml;
use viera_core::error::{Error, SoapError};

/// Decode a SOAP fault body.
///
/// Returns `None` if the body carries no `errorCode`.
pub fn parse_fault(body: &[u8]) -> Option<SoapError> {
    let doc = String::from_utf8_lossy(body);
    let code = xml::find_text(&doc, "errorCode")?.trim().parse::<u32>().ok()?;
    let description = xml::find_text(&doc, "errorDescription")
        .or_else(|| xml::find_text(&doc, "faultstring"))
        .unwrap_or_default();

    Some(SoapError::Fault {
        code,
        description: description.trim().to_string(),
    })
}

/// Turn an HTTP error carrying a SOAP fault into `Error::Soap`.
///
/// Any other error passes through unchanged.
pub fn map_fault(err: Error) -> Error {
    if let Error::Transport(transport) = &err {
        if let Some(fault) = transport.body().and_then(parse_fault) {
            return fault.into();
        }
    }
    err
}
