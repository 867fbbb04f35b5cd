//! SOAP request formatting.

use viera_core::constants::{
    PAIRING_ACTIONS, URL_CONTROL_DMR, URL_CONTROL_NRC, URN_REMOTE_CONTROL, URN_RENDERING_CONTROL,
};
use viera_core::Device;

/// A SOAP action invocation on one of the TV's control URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    /// Control URL path, e.g. `nrc/control_0`.
    pub path: String,
    /// Service URN without the `urn:` scheme.
    pub urn: String,
    pub action: String,
    /// Inner XML placed inside the action element.
    pub params: String,
}

impl SoapRequest {
    pub fn new(path: impl Into<String>, urn: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            urn: urn.into(),
            action: action.into(),
            params: String::new(),
        }
    }

    /// Action on the network remote control service.
    pub fn remote_control(action: impl Into<String>) -> Self {
        Self::new(URL_CONTROL_NRC, URN_REMOTE_CONTROL, action)
    }

    /// Action on the UPnP rendering control service.
    pub fn rendering_control(action: impl Into<String>) -> Self {
        Self::new(URL_CONTROL_DMR, URN_RENDERING_CONTROL, action)
    }

    /// Set the inner XML parameters (builder pattern).
    pub fn params(mut self, params: impl Into<String>) -> Self {
        self.params = params.into();
        self
    }

    pub fn is_remote_control(&self) -> bool {
        self.urn == URN_REMOTE_CONTROL
    }

    /// Pairing actions carry their own encryption and skip the session layer.
    pub fn is_pairing_action(&self) -> bool {
        PAIRING_ACTIONS.contains(&self.action.as_str())
    }

    /// `<u:Action xmlns:u="urn:...">params</u:Action>`
    pub fn action_element(&self) -> String {
        format!(
            "<u:{action} xmlns:u=\"urn:{urn}\">{params}</u:{action}>",
            action = self.action,
            urn = self.urn,
            params = self.params
        )
    }

    /// Full SOAP envelope.
    pub fn envelope(&self) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
                "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"",
                " s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">",
                "<s:Body>{}</s:Body>",
                "</s:Envelope>"
            ),
            self.action_element()
        )
    }

    /// Value of the `SOAPACTION` header, quotes included.
    pub fn soap_action(&self) -> String {
        format!("\"urn:{}#{}\"", self.urn, self.action)
    }

    /// Serialize as an HTTP/1.1 POST for `device`.
    pub fn serialize(&self, device: &Device) -> Vec<u8> {
        let body = self.envelope();
        let mut out = format!(
            "POST /{path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Content-Length: {len}\r\n\
             Content-Type: text/xml; charset=\"utf-8\"\r\n\
             SOAPACTION: {action}\r\n\
             Accept: text/xml\r\n\
             Connection: close\r\n\
             \r\n",
            path = self.path.trim_start_matches('/'),
            host = device.authority(),
            len = body.len(),
            action = self.soap_action(),
        )
        .into_bytes();
        out.extend_from_slice(body.as_bytes());
        out
    }
}

/// HTTP/1.1 GET for a description document.
pub(crate) fn serialize_get(path: &str, device: &Device) -> Vec<u8> {
    format!(
        "GET /{} HTTP/1.1\r\nHost: {}\r\nAccept: text/xml\r\nConnection: close\r\n\r\n",
        path.trim_start_matches('/'),
        device.authority()
    )
    .into_bytes()
}
