//! Session state shared by pairing and the command envelope.

use std::fmt;

use viera_core::error::Result;
use viera_crypto::KeyMaterial;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Long-lived pairing result. The caller persists it between runs.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Application id issued by the TV (`X_ApplicationId`).
    pub app_id: String,
    /// Base64 of the 16-byte session seed (`X_Keyword`).
    pub encryption_key: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, encryption_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            encryption_key: encryption_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

/// Authentication and session state for one TV.
///
/// Created empty or from stored [`Credentials`]. Pairing fills in the
/// credentials and session; the command envelope advances the sequence
/// number. Not meant to be shared between concurrent commands.
#[derive(Default)]
pub struct SessionState {
    app_id: Option<String>,
    enc_key_b64: Option<String>,
    session_key_material: Option<KeyMaterial>,
    session_id: Option<String>,
    sequence_number: Option<u32>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State pre-seeded with stored credentials; a session id is still needed.
    pub fn with_credentials(credentials: &Credentials) -> Self {
        Self {
            app_id: Some(credentials.app_id.clone()),
            enc_key_b64: Some(credentials.encryption_key.clone()),
            ..Self::default()
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn encryption_key(&self) -> Option<&str> {
        self.enc_key_b64.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence_number(&self) -> Option<u32> {
        self.sequence_number
    }

    pub fn session_keys(&self) -> Option<&KeyMaterial> {
        self.session_key_material.as_ref()
    }

    /// The stored credentials, if both parts are known.
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials::new(self.app_id.clone()?, self.enc_key_b64.clone()?))
    }

    /// Has an application id and encryption key.
    pub fn is_authenticated(&self) -> bool {
        self.app_id.is_some() && self.enc_key_b64.is_some()
    }

    /// Has everything needed to wrap an encrypted command.
    pub fn has_session(&self) -> bool {
        self.session_key_material.is_some()
            && self.session_id.is_some()
            && self.sequence_number.is_some()
    }

    /// Session keys derived from the stored encryption key.
    pub fn derive_session_keys(&self) -> Result<Option<KeyMaterial>> {
        match &self.enc_key_b64 {
            Some(key) => Ok(Some(KeyMaterial::derive_session(key)?)),
            None => Ok(None),
        }
    }

    /// Drop the session, keeping the credentials.
    pub fn clear_session(&mut self) {
        self.session_key_material = None;
        self.session_id = None;
        self.sequence_number = None;
    }

    /// Replace the credentials, dropping any session built on the old ones.
    pub(crate) fn set_credentials(&mut self, app_id: String, enc_key_b64: String) {
        self.clear_session();
        self.app_id = Some(app_id);
        self.enc_key_b64 = Some(enc_key_b64);
    }

    /// Install a fresh session; numbering restarts at 1.
    pub(crate) fn start_session(&mut self, keys: KeyMaterial, session_id: String) {
        self.session_key_material = Some(keys);
        self.session_id = Some(session_id);
        self.sequence_number = Some(1);
    }

    pub(crate) fn sequence_number_mut(&mut self) -> Option<&mut u32> {
        self.sequence_number.as_mut()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("app_id", &self.app_id)
            .field("has_encryption_key", &self.enc_key_b64.is_some())
            .field("session_id", &self.session_id)
            .field("sequence_number", &self.sequence_number)
            .finish()
    }
}
