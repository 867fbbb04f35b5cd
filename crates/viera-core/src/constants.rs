//! Protocol constants: control endpoints, service URNs, and pairing actions.

/// Default SOAP control port.
pub const DEFAULT_PORT: u16 = 55000;

/// Network remote control service (keys, apps, encrypted session).
pub const URN_REMOTE_CONTROL: &str = "panasonic-com:service:p00NetworkControl:1";

/// UPnP rendering control service (volume, mute).
pub const URN_RENDERING_CONTROL: &str = "schemas-upnp-org:service:RenderingControl:1";

/// Control URL for the network remote control service.
pub const URL_CONTROL_NRC: &str = "nrc/control_0";

/// Control URL for the digital media renderer.
pub const URL_CONTROL_DMR: &str = "dmr/control_0";

/// Device description document.
pub const URL_DEVICE_DESCRIPTION: &str = "nrc/ddd.xml";

/// Service description listing the remote control actions.
pub const URL_SERVICE_DESCRIPTION: &str = "nrc/sdd_0.xml";

pub const ACTION_DISPLAY_PIN_CODE: &str = "X_DisplayPinCode";
pub const ACTION_REQUEST_AUTH: &str = "X_RequestAuth";
pub const ACTION_GET_ENCRYPT_SESSION_ID: &str = "X_GetEncryptSessionId";
pub const ACTION_ENCRYPTED_COMMAND: &str = "X_EncryptedCommand";

/// Actions that carry their own per-step encryption and bypass the session layer.
pub const PAIRING_ACTIONS: [&str; 3] = [
    ACTION_GET_ENCRYPT_SESSION_ID,
    ACTION_DISPLAY_PIN_CODE,
    ACTION_REQUEST_AUTH,
];

/// SOAP fault code the TV returns for a wrong PIN.
pub const FAULT_INVALID_PIN: u32 = 600;

/// Device name shown on the TV during pairing when none is given.
pub const DEFAULT_DEVICE_NAME: &str = "viera-rs";
