//! Client builder for configuration.

use std::time::Duration;

use viera_core::constants::DEFAULT_PORT;
use viera_core::{Device, Encryption, Result};
use viera_pairing::{Credentials, SessionState};
use viera_soap::HttpTransport;

use crate::RemoteControl;

/// Builder for configuring a [`RemoteControl`] over HTTP.
pub struct ClientBuilder {
    host: String,
    port: u16,
    timeout: Duration,
    credentials: Option<Credentials>,
    /// `None` probes the TV on `connect`.
    encryption: Option<Encryption>,
}

impl ClientBuilder {
    /// Create new builder with defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(5),
            credentials: None,
            encryption: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stored pairing result.
    pub fn credentials(mut self, app_id: impl Into<String>, encryption_key: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(app_id, encryption_key));
        self
    }

    /// Skip probing and use this encryption mode.
    pub fn encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Build the client without touching the network.
    ///
    /// An unset encryption mode is treated as plain until
    /// [`RemoteControl::detect_encryption`] runs.
    pub fn build(self) -> RemoteControl {
        let (client, _) = self.build_parts();
        client
    }

    /// Build the client, probe encryption if unset, and open a session when
    /// the TV is encrypted and credentials were given.
    pub async fn connect(self) -> Result<RemoteControl> {
        let (mut client, probe) = self.build_parts();
        if probe {
            client.detect_encryption().await?;
        }
        client.connect().await?;
        tracing::debug!(
            host = %client.transport().device(),
            encryption = ?client.encryption(),
            session = client.session().has_session(),
            "Connected"
        );
        Ok(client)
    }

    fn build_parts(self) -> (RemoteControl, bool) {
        let transport = HttpTransport::new(Device::with_port(self.host, self.port))
            .with_timeout(self.timeout);
        let session = match &self.credentials {
            Some(credentials) => SessionState::with_credentials(credentials),
            None => SessionState::new(),
        };
        let client = RemoteControl::with_session(
            transport,
            session,
            self.encryption.unwrap_or_default(),
        );
        (client, self.encryption.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod builder {
        use super::*;

        #[test]
        fn new_has_defaults() {
            let builder = ClientBuilder::new("192.168.1.20");
            assert_eq!(builder.port, 55000);
            assert_eq!(builder.timeout, Duration::from_secs(5));
            assert!(builder.credentials.is_none());
            assert!(builder.encryption.is_none());
        }

        #[test]
        fn settings_reach_the_transport() {
            let client = ClientBuilder::new("tv.local")
                .port(8080)
                .timeout(Duration::from_millis(250))
                .build();

            assert_eq!(client.transport().device(), &Device::with_port("tv.local", 8080));
            assert_eq!(client.transport().timeout(), Duration::from_millis(250));
            assert_eq!(client.encryption(), Encryption::Plain);
        }

        #[test]
        fn credentials_seed_the_session() {
            let client = ClientBuilder::new("tv")
                .credentials("app", "AAECAwQFBgcICQoLDA0ODw==")
                .encryption(Encryption::Encrypted)
                .build();

            assert!(client.session().is_authenticated());
            assert!(!client.session().has_session());
            assert_eq!(client.encryption(), Encryption::Encrypted);
            assert_eq!(
                client.credentials(),
                Some(Credentials::new("app", "AAECAwQFBgcICQoLDA0ODw=="))
            );
        }
    }

    #[tokio::test]
    async fn connect_to_unreachable_tv_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = ClientBuilder::new("127.0.0.1")
            .port(port)
            .connect()
            .await
            .err()
            .unwrap();
        assert!(err.is_transport());
    }
}
