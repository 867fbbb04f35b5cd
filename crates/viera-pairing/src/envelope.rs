//! Encrypted command envelope.
//!
//! On encryption-capable TVs every remote control action other than the
//! pairing actions is sent as `X_EncryptedCommand`, carrying the original
//! action encrypted under the session keys together with the session id and
//! a per-command sequence number.

use rand::RngCore;
use viera_core::constants::ACTION_ENCRYPTED_COMMAND;
use viera_core::error::{Error, PairingError, Result, SoapError};
use viera_core::Encryption;
use viera_crypto::PayloadCodec;
use viera_soap::{xml, SoapRequest};

use crate::session::SessionState;

/// A request ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub request: SoapRequest,
    /// The request consumed a sequence number and its response is encrypted.
    pub encrypted: bool,
}

/// Wraps and unwraps remote control commands for an encrypted session.
pub struct CommandEnvelope;

impl CommandEnvelope {
    /// Prepare `request` for sending.
    ///
    /// With a live session, remote control actions are encrypted and the
    /// sequence number advances. Without one, an encryption-capable TV fails
    /// with [`Error::EncryptionRequired`]. Everything else passes through.
    pub fn wrap<R: RngCore + ?Sized>(
        state: &mut SessionState,
        encryption: Encryption,
        request: SoapRequest,
        rng: &mut R,
    ) -> Result<Outgoing> {
        if !request.is_remote_control() || request.is_pairing_action() {
            return Ok(Outgoing {
                request,
                encrypted: false,
            });
        }

        if !state.has_session() {
            if encryption.is_encrypted() {
                return Err(Error::EncryptionRequired);
            }
            return Ok(Outgoing {
                request,
                encrypted: false,
            });
        }

        let (Some(keys), Some(session_id), Some(seq), Some(app_id)) = (
            state.session_keys(),
            state.session_id(),
            state.sequence_number(),
            state.app_id(),
        ) else {
            return Err(PairingError::MissingCredential("app_id").into());
        };

        let next = seq.wrapping_add(1);
        let inner = format!(
            "{}{}<X_OriginalCommand>{}</X_OriginalCommand>",
            xml::element("X_SessionId", session_id),
            xml::element("X_SequenceNumber", &format!("{:08}", next)),
            request.action_element()
        );
        let encinfo = PayloadCodec::new(keys).encrypt(inner.as_bytes(), rng)?;

        let wrapped = SoapRequest::new(
            request.path.clone(),
            request.urn.clone(),
            ACTION_ENCRYPTED_COMMAND,
        )
        .params(format!(
            "{}{}",
            xml::element("X_ApplicationId", app_id),
            xml::element("X_EncInfo", &encinfo)
        ));

        if let Some(seq) = state.sequence_number_mut() {
            *seq = next;
        }
        tracing::debug!(action = %request.action, seq = next, "Wrapped encrypted command");

        Ok(Outgoing {
            request: wrapped,
            encrypted: true,
        })
    }

    /// Give back the sequence number of an encrypted command that failed to send.
    pub fn rollback(state: &mut SessionState) {
        if let Some(seq) = state.sequence_number_mut() {
            *seq = seq.wrapping_sub(1);
            tracing::debug!(seq = *seq, "Rolled back sequence number");
        }
    }

    /// Decrypt the `X_EncResult` of an encrypted command response.
    ///
    /// Returns the inner XML, i.e. the original action's response.
    pub fn unwrap_response(state: &SessionState, raw: &[u8]) -> Result<String> {
        let keys = state
            .session_keys()
            .ok_or(PairingError::MissingCredential("session keys"))?;
        let body = String::from_utf8_lossy(raw);
        let encrypted = xml::find_text(&body, "X_EncResult")
            .ok_or_else(|| SoapError::MissingElement("X_EncResult".to_string()))?;

        Ok(PayloadCodec::new(keys).decrypt_str(&encrypted)?)
    }
}
