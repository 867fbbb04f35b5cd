//! Main remote control client implementation.

use rand::rngs::StdRng;
use rand::SeedableRng;
use viera_core::constants::{
    ACTION_GET_ENCRYPT_SESSION_ID, DEFAULT_DEVICE_NAME, URL_DEVICE_DESCRIPTION,
    URL_SERVICE_DESCRIPTION,
};
use viera_core::error::{Error, PairingError, Result, SoapError};
use viera_core::{DeviceInfo, Encryption, Key};
use viera_pairing::{CommandEnvelope, Credentials, PairingFlow, SessionState};
use viera_soap::{fault, xml, HttpTransport, SoapRequest, SoapTransport};

use crate::apps::{launch_keyword, parse_app_list, App};

const MASTER_CHANNEL: &str = "<InstanceID>0</InstanceID><Channel>Master</Channel>";

/// Remote control for one TV.
///
/// Every command takes `&mut self`, so at most one command is in flight per
/// session. Wrap the client in a `tokio::sync::Mutex` to share it.
pub struct RemoteControl<T = HttpTransport> {
    transport: T,
    session: SessionState,
    encryption: Encryption,
    /// In-progress PIN pairing.
    pairing: Option<PairingFlow>,
    rng: StdRng,
}

impl<T: SoapTransport> RemoteControl<T> {
    /// Client for a plain (unencrypted) TV with no stored credentials.
    pub fn new(transport: T) -> Self {
        Self::with_session(transport, SessionState::new(), Encryption::Plain)
    }

    pub fn with_session(transport: T, session: SessionState, encryption: Encryption) -> Self {
        Self {
            transport,
            session,
            encryption,
            pairing: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Credentials to persist after pairing.
    pub fn credentials(&self) -> Option<Credentials> {
        self.session.credentials()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Probe the service description for `X_GetEncryptSessionId`.
    pub async fn detect_encryption(&mut self) -> Result<Encryption> {
        let body = self.transport.fetch(URL_SERVICE_DESCRIPTION).await?;
        let doc = String::from_utf8_lossy(&body);

        self.encryption = if xml::find_all_text(&doc, "name")
            .iter()
            .any(|name| name == ACTION_GET_ENCRYPT_SESSION_ID)
        {
            Encryption::Encrypted
        } else {
            Encryption::Plain
        };
        tracing::debug!(encryption = ?self.encryption, "Detected encryption capability");
        Ok(self.encryption)
    }

    /// Start an encrypted session if the TV needs one and credentials are known.
    pub async fn connect(&mut self) -> Result<()> {
        if self.encryption.is_encrypted()
            && self.session.is_authenticated()
            && !self.session.has_session()
        {
            self.request_session_id().await?;
        }
        Ok(())
    }

    /// Ask the TV to display a pairing PIN, shown with `device_name`.
    pub async fn request_pin_code(&mut self, device_name: Option<&str>) -> Result<()> {
        let mut flow = PairingFlow::new();
        let request = flow.request_pin_code(device_name.unwrap_or(DEFAULT_DEVICE_NAME))?;
        let result = self.transport.send(&request).await;
        // Keep the flow even when it failed so a stray authorize reports the state.
        let outcome = flow.handle_pin_code_response(result);
        self.pairing = Some(flow);
        outcome
    }

    /// Submit the PIN shown on the TV, then open an encrypted session.
    ///
    /// Returns the credentials to persist for later runs. The TV registers
    /// the app as soon as the PIN is accepted, so if opening the session
    /// fails afterwards the credentials are still kept in
    /// [`credentials`](Self::credentials) and
    /// [`request_session_id`](Self::request_session_id) can be retried.
    pub async fn authorize_pin_code(&mut self, pin: &str) -> Result<Credentials> {
        let mut flow = self.pairing.take().ok_or_else(|| {
            PairingError::InvalidState("authorize_pin_code before request_pin_code".to_string())
        })?;

        let request = flow.authorize_pin_code(pin)?;
        let result = self.transport.send(&request).await;
        let credentials = match flow.handle_auth_response(&mut self.session, result) {
            Ok(credentials) => credentials,
            Err(e) => {
                // Keep the failed flow so a retry reports the state.
                self.pairing = Some(flow);
                return Err(e);
            }
        };
        self.encryption = Encryption::Encrypted;

        let request = flow.request_session_id(&self.session)?;
        let result = self.transport.send(&request).await;
        flow.handle_session_response(&mut self.session, result)?;
        Ok(credentials)
    }

    /// Open a new encrypted session with the stored credentials.
    pub async fn request_session_id(&mut self) -> Result<()> {
        let mut flow = PairingFlow::new();
        let request = flow.request_session_id(&self.session)?;
        let result = self.transport.send(&request).await;
        flow.handle_session_response(&mut self.session, result)
    }

    /// Send a SOAP action and return the response XML.
    ///
    /// Remote control actions are encrypted when a session is live. The
    /// sequence number is given back if the transport fails.
    pub async fn soap_request(&mut self, request: SoapRequest) -> Result<String> {
        let action = request.action.clone();
        let outgoing =
            CommandEnvelope::wrap(&mut self.session, self.encryption, request, &mut self.rng)?;

        let body = match self.transport.send(&outgoing.request).await {
            Ok(body) => body,
            Err(e) => {
                if outgoing.encrypted {
                    CommandEnvelope::rollback(&mut self.session);
                }
                tracing::debug!(action = %action, error = %e, "SOAP request failed");
                return Err(fault::map_fault(e));
            }
        };

        if outgoing.encrypted {
            CommandEnvelope::unwrap_response(&self.session, &body)
        } else {
            Ok(String::from_utf8_lossy(&body).into_owned())
        }
    }

    /// Press a remote key.
    pub async fn send_key(&mut self, key: Key) -> Result<()> {
        self.send_key_code(key.code()).await
    }

    /// Press a key by its raw `NRC_*` code.
    pub async fn send_key_code(&mut self, code: &str) -> Result<()> {
        let request = SoapRequest::remote_control("X_SendKey")
            .params(xml::element("X_KeyEvent", code));
        self.soap_request(request).await?;
        Ok(())
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.send_key(Key::Power).await
    }

    pub async fn volume_up(&mut self) -> Result<()> {
        self.send_key(Key::VolumeUp).await
    }

    pub async fn volume_down(&mut self) -> Result<()> {
        self.send_key(Key::VolumeDown).await
    }

    /// Toggle mute.
    pub async fn mute_volume(&mut self) -> Result<()> {
        self.send_key(Key::Mute).await
    }

    pub async fn media_play(&mut self) -> Result<()> {
        self.send_key(Key::Play).await
    }

    pub async fn media_pause(&mut self) -> Result<()> {
        self.send_key(Key::Pause).await
    }

    pub async fn media_next_track(&mut self) -> Result<()> {
        self.send_key(Key::FastForward).await
    }

    pub async fn media_previous_track(&mut self) -> Result<()> {
        self.send_key(Key::Rewind).await
    }

    /// Current volume, 0 to 100.
    pub async fn get_volume(&mut self) -> Result<u8> {
        let request = SoapRequest::rendering_control("GetVolume").params(MASTER_CHANNEL);
        let response = self.soap_request(request).await?;
        let volume = required_text(&response, "CurrentVolume")?;
        volume
            .trim()
            .parse()
            .map_err(|_| SoapError::Malformed(format!("CurrentVolume {:?}", volume)).into())
    }

    pub async fn set_volume(&mut self, volume: u8) -> Result<()> {
        if volume > 100 {
            return Err(Error::InvalidArgument(format!(
                "volume must be between 0 and 100, got {}",
                volume
            )));
        }
        let request = SoapRequest::rendering_control("SetVolume").params(format!(
            "{}<DesiredVolume>{}</DesiredVolume>",
            MASTER_CHANNEL, volume
        ));
        self.soap_request(request).await?;
        Ok(())
    }

    pub async fn get_mute(&mut self) -> Result<bool> {
        let request = SoapRequest::rendering_control("GetMute").params(MASTER_CHANNEL);
        let response = self.soap_request(request).await?;
        Ok(required_text(&response, "CurrentMute")?.trim() != "0")
    }

    pub async fn set_mute(&mut self, mute: bool) -> Result<()> {
        let request = SoapRequest::rendering_control("SetMute").params(format!(
            "{}<DesiredMute>{}</DesiredMute>",
            MASTER_CHANNEL,
            if mute { 1 } else { 0 }
        ));
        self.soap_request(request).await?;
        Ok(())
    }

    /// Apps installed on the TV.
    pub async fn get_apps(&mut self) -> Result<Vec<App>> {
        let response = self
            .soap_request(SoapRequest::remote_control("X_GetAppList"))
            .await?;
        Ok(parse_app_list(&required_text(&response, "X_AppList")?))
    }

    /// Launch an app by product id (16 characters) or resource id.
    pub async fn launch_app(&mut self, app_id: &str) -> Result<()> {
        let request = SoapRequest::remote_control("X_LaunchApp").params(format!(
            "<X_AppType>vc_app</X_AppType>{}",
            xml::element("X_LaunchKeyword", &launch_keyword(app_id))
        ));
        self.soap_request(request).await?;
        Ok(())
    }

    /// Names and identifiers from the device description.
    pub async fn get_device_info(&mut self) -> Result<DeviceInfo> {
        let body = self.transport.fetch(URL_DEVICE_DESCRIPTION).await?;
        Ok(parse_device_info(&String::from_utf8_lossy(&body)))
    }
}

fn required_text(doc: &str, tag: &str) -> Result<String> {
    xml::find_text(doc, tag).ok_or_else(|| SoapError::MissingElement(tag.to_string()).into())
}

fn parse_device_info(doc: &str) -> DeviceInfo {
    DeviceInfo {
        friendly_name: xml::find_text(doc, "friendlyName"),
        model_name: xml::find_text(doc, "modelName"),
        model_number: xml::find_text(doc, "modelNumber"),
        manufacturer: xml::find_text(doc, "manufacturer"),
        udn: xml::find_text(doc, "UDN"),
    }
}
