//! PIN pairing and session id handshake.
//!
//! The flow is sans-IO: each request step returns the [`SoapRequest`] to
//! send and each `handle_*` step takes the transport result.
//!
//! ```text
//! Idle --request_pin_code--> (X_DisplayPinCode) --handle--> PinRequested
//! PinRequested --authorize_pin_code--> (X_RequestAuth) Authorizing
//! Authorizing --handle_auth_response--> SessionRequested
//! SessionRequested --request_session_id--> (X_GetEncryptSessionId) --handle--> Ready
//! ```
//!
//! With stored credentials the flow starts at `request_session_id` from Idle.
//! Any failed response moves the flow to `Failed`; start over with a new flow.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use viera_core::constants::{
    ACTION_DISPLAY_PIN_CODE, ACTION_GET_ENCRYPT_SESSION_ID, ACTION_REQUEST_AUTH,
    FAULT_INVALID_PIN,
};
use viera_core::error::{CryptoError, Error, PairingError, Result, SoapError};
use viera_crypto::{KeyMaterial, PayloadCodec};
use viera_soap::{fault, xml, SoapRequest};

use crate::session::{Credentials, SessionState};

/// Position in the pairing flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStage {
    Idle,
    /// `X_DisplayPinCode` sent; waiting for its response or holding the challenge.
    PinRequested,
    /// `X_RequestAuth` sent.
    Authorizing,
    /// Credentials known; a session id is needed.
    SessionRequested,
    Ready,
    Failed,
}

/// Sans-IO pairing state machine.
pub struct PairingFlow<R = StdRng> {
    stage: PairingStage,
    rng: R,
    /// Set once the `X_DisplayPinCode` response carried a challenge.
    challenge_keys: Option<KeyMaterial>,
    /// Session keys for the pending `X_GetEncryptSessionId`.
    session_keys: Option<KeyMaterial>,
    /// A request step has been issued and its response not yet handled.
    awaiting_response: bool,
}

impl PairingFlow<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for PairingFlow<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> PairingFlow<R> {
    /// Flow drawing payload nonces from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            stage: PairingStage::Idle,
            rng,
            challenge_keys: None,
            session_keys: None,
            awaiting_response: false,
        }
    }

    pub fn stage(&self) -> PairingStage {
        self.stage
    }

    pub fn is_ready(&self) -> bool {
        self.stage == PairingStage::Ready
    }

    /// Ask the TV to display a PIN.
    pub fn request_pin_code(&mut self, device_name: &str) -> Result<SoapRequest> {
        self.expect_stage(PairingStage::Idle, false, "request_pin_code")?;

        tracing::info!(device_name, "Requesting PIN code");
        self.stage = PairingStage::PinRequested;
        self.awaiting_response = true;
        Ok(SoapRequest::remote_control(ACTION_DISPLAY_PIN_CODE)
            .params(xml::element("X_DeviceName", device_name)))
    }

    /// Store the challenge from the `X_DisplayPinCode` response.
    pub fn handle_pin_code_response(&mut self, result: Result<Vec<u8>>) -> Result<()> {
        self.expect_stage(PairingStage::PinRequested, true, "handle_pin_code_response")?;
        self.awaiting_response = false;

        let outcome = result.map_err(fault::map_fault).and_then(|body| {
            let challenge_b64 = required_text(&body, "X_ChallengeKey")?;
            let challenge = STANDARD
                .decode(challenge_b64.trim())
                .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
            Ok(KeyMaterial::derive_challenge_from_slice(&challenge)?)
        });

        match outcome {
            Ok(keys) => {
                tracing::debug!("Received pairing challenge");
                self.challenge_keys = Some(keys);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Encrypt the PIN shown on the TV into an `X_RequestAuth` request.
    pub fn authorize_pin_code(&mut self, pin: &str) -> Result<SoapRequest> {
        self.expect_stage(PairingStage::PinRequested, false, "authorize_pin_code")?;
        let keys = self
            .challenge_keys
            .as_ref()
            .ok_or(PairingError::MissingCredential("challenge"))?;

        let auth_info = PayloadCodec::new(keys).encrypt(
            xml::element("X_PinCode", pin).as_bytes(),
            &mut self.rng,
        )?;

        self.stage = PairingStage::Authorizing;
        self.awaiting_response = true;
        Ok(SoapRequest::remote_control(ACTION_REQUEST_AUTH)
            .params(xml::element("X_AuthInfo", &auth_info)))
    }

    /// Decrypt the credentials from the `X_RequestAuth` response into `state`.
    ///
    /// Fault 600 means the PIN was wrong.
    pub fn handle_auth_response(
        &mut self,
        state: &mut SessionState,
        result: Result<Vec<u8>>,
    ) -> Result<Credentials> {
        self.expect_stage(PairingStage::Authorizing, true, "handle_auth_response")?;
        self.awaiting_response = false;

        let outcome = result
            .map_err(|e| match fault::map_fault(e) {
                Error::Soap(SoapError::Fault { code, .. }) if code == FAULT_INVALID_PIN => {
                    PairingError::InvalidPinCode.into()
                }
                other => other,
            })
            .and_then(|body| self.decode_auth_result(&body));

        match outcome {
            Ok((credentials, session_keys)) => {
                // The challenge is single use.
                self.challenge_keys = None;
                state.set_credentials(
                    credentials.app_id.clone(),
                    credentials.encryption_key.clone(),
                );
                self.session_keys = Some(session_keys);
                self.stage = PairingStage::SessionRequested;
                tracing::info!(app_id = %credentials.app_id, "Paired with TV");
                Ok(credentials)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Build the `X_GetEncryptSessionId` request for the credentials in `state`.
    ///
    /// Valid after a successful `handle_auth_response`, or from `Idle` when
    /// `state` was seeded with stored credentials.
    pub fn request_session_id(&mut self, state: &SessionState) -> Result<SoapRequest> {
        if self.awaiting_response
            || !matches!(
                self.stage,
                PairingStage::Idle | PairingStage::SessionRequested
            )
        {
            return Err(self.invalid_state("request_session_id"));
        }

        let app_id = state
            .app_id()
            .ok_or(PairingError::MissingCredential("app_id"))?;
        let keys = state
            .derive_session_keys()?
            .ok_or(PairingError::MissingCredential("encryption_key"))?;

        let encinfo = PayloadCodec::new(&keys).encrypt(
            xml::element("X_ApplicationId", app_id).as_bytes(),
            &mut self.rng,
        )?;

        tracing::debug!(app_id, "Requesting encrypted session id");
        self.session_keys = Some(keys);
        self.stage = PairingStage::SessionRequested;
        self.awaiting_response = true;
        Ok(SoapRequest::remote_control(ACTION_GET_ENCRYPT_SESSION_ID).params(format!(
            "{}{}",
            xml::element("X_ApplicationId", app_id),
            xml::element("X_EncInfo", &encinfo)
        )))
    }

    /// Install the session from the `X_GetEncryptSessionId` response.
    pub fn handle_session_response(
        &mut self,
        state: &mut SessionState,
        result: Result<Vec<u8>>,
    ) -> Result<()> {
        self.expect_stage(
            PairingStage::SessionRequested,
            true,
            "handle_session_response",
        )?;
        self.awaiting_response = false;

        let outcome = result.map_err(fault::map_fault).and_then(|body| {
            let keys = self
                .session_keys
                .take()
                .ok_or(PairingError::MissingCredential("session keys"))?;
            let encrypted = required_text(&body, "X_EncResult")?;
            let inner = PayloadCodec::new(&keys).decrypt_str(&encrypted)?;
            let session_id = required_text(inner.as_bytes(), "X_SessionId")?;
            Ok((keys, session_id))
        });

        match outcome {
            Ok((keys, session_id)) => {
                tracing::info!(session_id = %session_id, "Encrypted session established");
                state.start_session(keys, session_id);
                self.stage = PairingStage::Ready;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn decode_auth_result(&self, body: &[u8]) -> Result<(Credentials, KeyMaterial)> {
        let keys = self
            .challenge_keys
            .as_ref()
            .ok_or(PairingError::MissingCredential("challenge"))?;
        let encrypted = required_text(body, "X_AuthResult")?;
        let inner = PayloadCodec::new(keys).decrypt_str(&encrypted)?;

        let app_id = required_text(inner.as_bytes(), "X_ApplicationId")?;
        let encryption_key = required_text(inner.as_bytes(), "X_Keyword")?;
        let session_keys = KeyMaterial::derive_session(&encryption_key)?;

        Ok((Credentials::new(app_id, encryption_key), session_keys))
    }

    fn expect_stage(&self, stage: PairingStage, awaiting: bool, step: &str) -> Result<()> {
        if self.stage != stage || self.awaiting_response != awaiting {
            return Err(self.invalid_state(step));
        }
        Ok(())
    }

    fn invalid_state(&self, step: &str) -> Error {
        PairingError::InvalidState(format!(
            "{} not allowed in stage {:?}{}",
            step,
            self.stage,
            if self.awaiting_response {
                " (awaiting response)"
            } else {
                ""
            }
        ))
        .into()
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        tracing::warn!(stage = ?self.stage, error = %err, "Pairing failed");
        self.stage = PairingStage::Failed;
        self.challenge_keys = None;
        self.session_keys = None;
        Err(err)
    }
}

fn required_text(body: &[u8], tag: &str) -> Result<String> {
    xml::find_text(&String::from_utf8_lossy(body), tag)
        .ok_or_else(|| SoapError::MissingElement(tag.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use viera_core::error::TransportError;

    const CHALLENGE: [u8; 16] = [0x01; 16];
    const CHALLENGE_B64: &str = "AQEBAQEBAQEBAQEBAQEBAQ==";
    const KEYWORD: &str = "AAECAwQFBgcICQoLDA0ODw==";

    fn flow() -> PairingFlow {
        PairingFlow::with_rng(StdRng::seed_from_u64(1))
    }

    fn tv_rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    fn response(action: &str, inner: &str) -> Result<Vec<u8>> {
        Ok(format!(
            "<?xml version=\"1.0\"?><s:Envelope><s:Body><u:{action}Response>{inner}</u:{action}Response></s:Body></s:Envelope>"
        )
        .into_bytes())
    }

    fn fault(code: u32, description: &str) -> Result<Vec<u8>> {
        Err(TransportError::Status {
            status: 500,
            body: format!(
                "<s:Fault><detail><UPnPError><errorCode>{code}</errorCode>\
                 <errorDescription>{description}</errorDescription></UPnPError></detail></s:Fault>"
            )
            .into_bytes(),
        }
        .into())
    }

    fn auth_result(app_id: &str, keyword: &str) -> Result<Vec<u8>> {
        let keys = KeyMaterial::derive_challenge(&CHALLENGE);
        let inner = format!(
            "<X_ApplicationId>{app_id}</X_ApplicationId><X_Keyword>{keyword}</X_Keyword>"
        );
        let encrypted = PayloadCodec::new(&keys)
            .encrypt(inner.as_bytes(), &mut tv_rng())
            .unwrap();
        response(
            "X_RequestAuth",
            &format!("<X_AuthResult>{encrypted}</X_AuthResult>"),
        )
    }

    fn session_result(session_id: &str) -> Result<Vec<u8>> {
        let keys = KeyMaterial::derive_session(KEYWORD).unwrap();
        let inner = format!("<X_SessionId>{session_id}</X_SessionId>");
        let encrypted = PayloadCodec::new(&keys)
            .encrypt(inner.as_bytes(), &mut tv_rng())
            .unwrap();
        response(
            "X_GetEncryptSessionId",
            &format!("<X_EncResult>{encrypted}</X_EncResult>"),
        )
    }

    /// Drive a flow up to `Authorizing`.
    fn authorizing(flow: &mut PairingFlow) -> SoapRequest {
        flow.request_pin_code("test").unwrap();
        flow.handle_pin_code_response(response(
            "X_DisplayPinCode",
            &format!("<X_ChallengeKey>{CHALLENGE_B64}</X_ChallengeKey>"),
        ))
        .unwrap();
        flow.authorize_pin_code("1234").unwrap()
    }

    mod pin_code {
        use super::*;

        #[test]
        fn request_carries_device_name() {
            let mut flow = flow();
            let request = flow.request_pin_code("Living & Room").unwrap();

            assert_eq!(request.action, "X_DisplayPinCode");
            assert_eq!(request.params, "<X_DeviceName>Living &amp; Room</X_DeviceName>");
            assert_eq!(flow.stage(), PairingStage::PinRequested);
        }

        #[test]
        fn fault_fails_the_flow() {
            let mut flow = flow();
            flow.request_pin_code("test").unwrap();
            let err = flow
                .handle_pin_code_response(fault(403, "Not allowed"))
                .unwrap_err();

            assert_eq!(err.fault(), Some((403, "Not allowed")));
            assert_eq!(flow.stage(), PairingStage::Failed);
        }

        #[test]
        fn missing_challenge_is_a_protocol_error() {
            let mut flow = flow();
            flow.request_pin_code("test").unwrap();
            let err = flow
                .handle_pin_code_response(response("X_DisplayPinCode", ""))
                .unwrap_err();

            assert!(matches!(
                err,
                Error::Soap(SoapError::MissingElement(ref tag)) if tag == "X_ChallengeKey"
            ));
        }

        #[test]
        fn short_challenge_is_rejected() {
            let mut flow = flow();
            flow.request_pin_code("test").unwrap();
            let err = flow
                .handle_pin_code_response(response(
                    "X_DisplayPinCode",
                    "<X_ChallengeKey>AQID</X_ChallengeKey>",
                ))
                .unwrap_err();

            assert!(matches!(
                err,
                Error::Crypto(CryptoError::InvalidKeyMaterial { actual: 3, .. })
            ));
        }
    }

    mod authorize {
        use super::*;

        #[test]
        fn auth_info_decrypts_to_pin() {
            let mut flow = flow();
            let request = authorizing(&mut flow);
            assert_eq!(request.action, "X_RequestAuth");
            assert_eq!(flow.stage(), PairingStage::Authorizing);

            let auth_info = xml::find_text(&request.params, "X_AuthInfo").unwrap();
            let keys = KeyMaterial::derive_challenge(&CHALLENGE);
            let codec = PayloadCodec::new(&keys);
            assert_eq!(codec.decrypt_str(&auth_info).unwrap(), "<X_PinCode>1234</X_PinCode>");
            assert!(codec.verify(&auth_info).unwrap());
        }

        #[test]
        fn success_stores_credentials() {
            let mut flow = flow();
            let mut state = SessionState::new();
            authorizing(&mut flow);

            let credentials = flow
                .handle_auth_response(&mut state, auth_result("app-1", KEYWORD))
                .unwrap();

            assert_eq!(credentials, Credentials::new("app-1", KEYWORD));
            assert_eq!(state.credentials(), Some(credentials));
            assert!(!state.has_session());
            assert_eq!(flow.stage(), PairingStage::SessionRequested);
        }

        #[test]
        fn fault_600_is_invalid_pin() {
            let mut flow = flow();
            let mut state = SessionState::new();
            authorizing(&mut flow);

            let err = flow
                .handle_auth_response(&mut state, fault(600, "Invalid Args"))
                .unwrap_err();

            assert!(matches!(err, Error::Pairing(PairingError::InvalidPinCode)));
            assert_eq!(flow.stage(), PairingStage::Failed);
            assert!(!state.is_authenticated());
        }

        #[test]
        fn other_faults_keep_description() {
            let mut flow = flow();
            let mut state = SessionState::new();
            authorizing(&mut flow);

            let err = flow
                .handle_auth_response(&mut state, fault(401, "Invalid Action"))
                .unwrap_err();

            assert_eq!(err.fault(), Some((401, "Invalid Action")));
            assert_eq!(flow.stage(), PairingStage::Failed);
        }

        #[test]
        fn transport_error_fails_the_flow() {
            let mut flow = flow();
            let mut state = SessionState::new();
            authorizing(&mut flow);

            let err = flow
                .handle_auth_response(&mut state, Err(TransportError::Timeout.into()))
                .unwrap_err();
            assert!(err.is_transport());
            assert_eq!(flow.stage(), PairingStage::Failed);
        }

        #[test]
        fn invalid_keyword_is_rejected() {
            let mut flow = flow();
            let mut state = SessionState::new();
            authorizing(&mut flow);

            let err = flow
                .handle_auth_response(&mut state, auth_result("app-1", "AAAA"))
                .unwrap_err();
            assert!(matches!(err, Error::Crypto(_)));
            assert!(!state.is_authenticated());
        }
    }

    mod session_id {
        use super::*;

        fn paired() -> (PairingFlow, SessionState) {
            let mut flow = flow();
            let mut state = SessionState::new();
            authorizing(&mut flow);
            flow.handle_auth_response(&mut state, auth_result("app-1", KEYWORD))
                .unwrap();
            (flow, state)
        }

        #[test]
        fn request_encrypts_app_id() {
            let (mut flow, state) = paired();
            let request = flow.request_session_id(&state).unwrap();

            assert_eq!(request.action, "X_GetEncryptSessionId");
            assert!(request
                .params
                .starts_with("<X_ApplicationId>app-1</X_ApplicationId><X_EncInfo>"));

            let encinfo = xml::find_text(&request.params, "X_EncInfo").unwrap();
            let keys = KeyMaterial::derive_session(KEYWORD).unwrap();
            assert_eq!(
                PayloadCodec::new(&keys).decrypt_str(&encinfo).unwrap(),
                "<X_ApplicationId>app-1</X_ApplicationId>"
            );
        }

        #[test]
        fn response_starts_session_at_one() {
            let (mut flow, mut state) = paired();
            flow.request_session_id(&state).unwrap();
            flow.handle_session_response(&mut state, session_result("7781"))
                .unwrap();

            assert!(flow.is_ready());
            assert!(state.has_session());
            assert_eq!(state.session_id(), Some("7781"));
            assert_eq!(state.sequence_number(), Some(1));
        }

        #[test]
        fn stored_credentials_start_from_idle() {
            let mut flow = flow();
            let mut state = SessionState::with_credentials(&Credentials::new("app-1", KEYWORD));

            flow.request_session_id(&state).unwrap();
            flow.handle_session_response(&mut state, session_result("5"))
                .unwrap();
            assert_eq!(state.sequence_number(), Some(1));
        }

        #[test]
        fn requires_credentials() {
            let mut flow = flow();
            let err = flow.request_session_id(&SessionState::new()).unwrap_err();
            assert!(matches!(
                err,
                Error::Pairing(PairingError::MissingCredential("app_id"))
            ));
            assert_eq!(flow.stage(), PairingStage::Idle);
        }

        #[test]
        fn fault_fails_without_session() {
            let (mut flow, mut state) = paired();
            flow.request_session_id(&state).unwrap();
            let err = flow
                .handle_session_response(&mut state, fault(500, "Busy"))
                .unwrap_err();

            assert_eq!(err.fault(), Some((500, "Busy")));
            assert_eq!(flow.stage(), PairingStage::Failed);
            assert!(!state.has_session());
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn authorize_before_pin_request_is_invalid() {
            let mut flow = flow();
            let err = flow.authorize_pin_code("1234").unwrap_err();
            assert!(matches!(err, Error::Pairing(PairingError::InvalidState(_))));
            assert_eq!(flow.stage(), PairingStage::Idle);
        }

        #[test]
        fn authorize_before_challenge_is_invalid() {
            let mut flow = flow();
            flow.request_pin_code("test").unwrap();
            let err = flow.authorize_pin_code("1234").unwrap_err();
            assert!(matches!(err, Error::Pairing(PairingError::InvalidState(_))));
            assert_eq!(flow.stage(), PairingStage::PinRequested);
        }

        #[test]
        fn handler_without_request_is_invalid() {
            let mut flow = flow();
            let mut state = SessionState::new();
            assert!(flow
                .handle_session_response(&mut state, session_result("1"))
                .is_err());
            assert_eq!(flow.stage(), PairingStage::Idle);
        }

        #[test]
        fn failed_flow_rejects_further_steps() {
            let mut flow = flow();
            flow.request_pin_code("test").unwrap();
            let _ = flow.handle_pin_code_response(fault(500, "x"));

            assert!(flow.request_pin_code("test").is_err());
            assert!(flow.authorize_pin_code("1234").is_err());
            assert!(flow
                .request_session_id(&SessionState::with_credentials(&Credentials::new(
                    "a", KEYWORD
                )))
                .is_err());
            assert_eq!(flow.stage(), PairingStage::Failed);
        }

        #[test]
        fn pin_request_twice_is_invalid() {
            let mut flow = flow();
            flow.request_pin_code("test").unwrap();
            assert!(flow.request_pin_code("test").is_err());
        }
    }
}
