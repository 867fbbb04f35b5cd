//! HTTP connection to the TV's control port.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use viera_core::error::{Result, TransportError};
use viera_core::Device;

use crate::request::serialize_get;
use crate::response::{is_complete, HttpResponse};
use crate::traits::SoapTransport;
use crate::SoapRequest;

/// Default timeout for one request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// SOAP transport over plain HTTP/1.1.
///
/// The TV closes the socket after each response, so every exchange opens a
/// fresh TCP connection.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    device: Device,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-exchange timeout (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write `request_data`, read the reply and parse it.
    async fn exchange(&self, request_data: &[u8]) -> Result<HttpResponse> {
        let response_data = timeout(self.timeout, self.round_trip(request_data))
            .await
            .map_err(|_| TransportError::Timeout)??;
        HttpResponse::parse(&response_data)
    }

    async fn round_trip(&self, request_data: &[u8]) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect(self.device.authority()).await?;
        stream.write_all(request_data).await?;
        stream.flush().await?;

        let mut response_data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            response_data.extend_from_slice(&buf[..n]);
            if is_complete(&response_data) {
                break;
            }
        }

        if response_data.is_empty() {
            return Err(TransportError::InvalidResponse("empty response".to_string()).into());
        }
        Ok(response_data)
    }
}

#[async_trait]
impl SoapTransport for HttpTransport {
    async fn send(&mut self, request: &SoapRequest) -> Result<Vec<u8>> {
        let request_data = request.serialize(&self.device);
        tracing::debug!(
            host = %self.device,
            path = %request.path,
            action = %request.action,
            body_len = request_data.len(),
            "SOAP ->"
        );

        let response = self.exchange(&request_data).await?;
        tracing::debug!(
            action = %request.action,
            status = response.status_code,
            reason = %response.status_text,
            body_len = response.body.len(),
            "SOAP <-"
        );

        response.into_body()
    }

    async fn fetch(&mut self, path: &str) -> Result<Vec<u8>> {
        tracing::debug!(host = %self.device, path, "GET ->");
        let response = self.exchange(&serialize_get(path, &self.device)).await?;
        tracing::debug!(
            path,
            status = response.status_code,
            reason = %response.status_text,
            "GET <-"
        );
        response.into_body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use viera_core::Error;

    /// Accept one connection, capture the request, reply with `reply`.
    async fn serve_once(reply: &'static [u8]) -> (Device, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || is_request_complete(&request) {
                    break;
                }
            }
            socket.write_all(reply).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (Device::with_port("127.0.0.1", port), handle)
    }

    fn is_request_complete(data: &[u8]) -> bool {
        let text = String::from_utf8_lossy(data);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let len = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= len
    }

    mod send {
        use super::*;

        #[tokio::test]
        async fn posts_envelope_and_returns_body() {
            let (device, server) = serve_once(
                b"HTTP/1.1 200 OK\r\nContent-Length: 21\r\n\r\n<X_SendKeyResponse/>\n",
            )
            .await;
            let mut transport = HttpTransport::new(device);

            let request = SoapRequest::remote_control("X_SendKey")
                .params("<X_KeyEvent>NRC_MUTE-ONOFF</X_KeyEvent>");
            let body = transport.send(&request).await.unwrap();
            assert_eq!(body, b"<X_SendKeyResponse/>\n");

            let seen = String::from_utf8(server.await.unwrap()).unwrap();
            assert!(seen.starts_with("POST /nrc/control_0 HTTP/1.1\r\n"));
            assert!(seen.contains("<X_KeyEvent>NRC_MUTE-ONOFF</X_KeyEvent>"));
        }

        #[tokio::test]
        async fn error_status_keeps_body() {
            let (device, _server) = serve_once(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 5\r\n\r\nfault",
            )
            .await;
            let mut transport = HttpTransport::new(device);

            let err = transport
                .send(&SoapRequest::remote_control("X_RequestAuth"))
                .await
                .unwrap_err();
            match err {
                Error::Transport(TransportError::Status { status, body }) => {
                    assert_eq!(status, 500);
                    assert_eq!(body, b"fault");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn reads_to_close_without_length() {
            let (device, _server) =
                serve_once(b"HTTP/1.0 200 OK\r\nContent-Type: text/xml\r\n\r\n<ok/>").await;
            let mut transport = HttpTransport::new(device);

            let body = transport
                .send(&SoapRequest::rendering_control("GetVolume"))
                .await
                .unwrap();
            assert_eq!(body, b"<ok/>");
        }
    }

    #[tokio::test]
    async fn fetch_issues_get() {
        let (device, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 7\r\n\r\n<root/>").await;
        let mut transport = HttpTransport::new(device);

        assert_eq!(transport.fetch("nrc/ddd.xml").await.unwrap(), b"<root/>");
        let seen = String::from_utf8(server.await.unwrap()).unwrap();
        assert!(seen.starts_with("GET /nrc/ddd.xml HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = HttpTransport::new(Device::with_port("127.0.0.1", port));
        let err = transport.fetch("nrc/ddd.xml").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut transport = HttpTransport::new(Device::with_port("127.0.0.1", port))
            .with_timeout(Duration::from_millis(100));
        let err = transport
            .send(&SoapRequest::remote_control("X_SendKey"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Timeout)));
    }
}
