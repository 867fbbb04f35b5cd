//! HTTP response parsing.

use std::collections::HashMap;
use viera_core::error::{Result, TransportError};

/// Parsed HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse a complete response read from the socket.
    ///
    /// The body is delimited by `Content-Length`, by chunked transfer
    /// encoding, or by the end of the buffer (connection close).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header_end = find_header_end(data)
            .ok_or_else(|| invalid("missing header terminator"))?;

        let header_str = std::str::from_utf8(&data[..header_end])
            .map_err(|_| invalid("invalid UTF-8 in headers"))?;
        let mut lines = header_str.lines();

        let status_line = lines.next().ok_or_else(|| invalid("missing status line"))?;
        let (status_code, status_text) = parse_status_line(status_line)?;

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let mut response = Self {
            status_code,
            status_text,
            headers,
            body: Vec::new(),
        };

        let rest = &data[header_end + 4..];
        response.body = if response.is_chunked() {
            decode_chunked(rest)?
        } else if let Some(len) = response.content_length() {
            if rest.len() < len {
                return Err(invalid(&format!(
                    "body too short: expected {} bytes, got {}",
                    len,
                    rest.len()
                )));
            }
            rest[..len].to_vec()
        } else {
            rest.to_vec()
        };

        Ok(response)
    }

    /// Check if response indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Get header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    /// Body for a 2xx response, `TransportError::Status` otherwise.
    pub fn into_body(self) -> Result<Vec<u8>> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(TransportError::Status {
                status: self.status_code,
                body: self.body,
            }
            .into())
        }
    }
}

/// Offset of the `\r\n\r\n` header terminator.
pub(crate) fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// True once `data` holds the full response, based on its headers.
///
/// Returns false when the body length is only known at connection close.
pub(crate) fn is_complete(data: &[u8]) -> bool {
    let Some(header_end) = find_header_end(data) else {
        return false;
    };
    let head = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let body = &data[header_end + 4..];

    if head.contains("transfer-encoding: chunked") {
        return body.ends_with(b"0\r\n\r\n");
    }

    head.lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim() == "content-length" {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .map(|len| body.len() >= len)
        .unwrap_or(false)
}

fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(invalid(&format!("bad status line: {}", line)));
    }

    let code = parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| invalid(&format!("bad status code: {}", line)))?;
    let text = parts.next().unwrap_or_default().to_string();

    Ok((code, text))
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| invalid("truncated chunk header"))?;
        let size_line = std::str::from_utf8(&data[..line_end])
            .map_err(|_| invalid("invalid chunk header"))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| invalid(&format!("invalid chunk size: {}", size_hex)))?;

        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(body);
        }
        if size.checked_add(2).map_or(true, |n| data.len() < n) {
            return Err(invalid("truncated chunk"));
        }
        body.extend_from_slice(&data[..size]);
        data = &data[size + 2..];
    }
}

fn invalid(msg: &str) -> viera_core::Error {
    TransportError::InvalidResponse(msg.to_string()).into()
}
