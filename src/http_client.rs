//! Shared HTTP agent and bounded response helpers.
//!
//! Non-OK statuses are data here, not errors: the store decides per resource
//! whether a status is fatal (401 on user stats) or just leaves a slice stale.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for JSON payloads polled by the dashboard.
pub const MAX_JSON_BYTES: usize = 4 * 1024 * 1024;
/// Upper bound for generated synthetic files.
pub const MAX_DOWNLOAD_BYTES: usize = 64 * 1024 * 1024;
/// Upper bound for files sent to the synthetic upload endpoint.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
    /// `Content-Disposition` header, kept for file downloads.
    pub content_disposition: Option<String>,
}

impl HttpReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            content_disposition: None,
        }
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Request never produced a usable reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Failed to read response: {0}")]
    Read(String),
}

/// Return a shared HTTP agent with consistent timeouts.
pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

/// Fold a `ureq` call result into a reply, treating HTTP error statuses as replies.
pub(crate) fn settle(
    result: Result<ureq::Response, ureq::Error>,
    max_bytes: usize,
) -> Result<HttpReply, TransportError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(err)) => {
            return Err(TransportError::Transport(err.to_string()));
        }
    };
    let status = response.status();
    let content_disposition = response.header("Content-Disposition").map(str::to_string);
    let body = read_response_bytes(response, max_bytes)
        .map_err(|err| TransportError::Read(err.to_string()))?;
    Ok(HttpReply {
        status,
        body,
        content_disposition,
    })
}

/// Read a response into memory, enforcing a maximum byte size.
pub(crate) fn read_response_bytes(
    response: ureq::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, io::Error> {
    check_content_length(&response, max_bytes)?;
    let mut limited = response.into_reader().take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(too_large(format!("Response exceeded {max_bytes} bytes")));
    }
    Ok(bytes)
}

/// Write a body to `writer`, enforcing a maximum byte size.
pub(crate) fn copy_limited(
    mut reader: impl Read,
    writer: &mut impl Write,
    max_bytes: usize,
) -> Result<u64, io::Error> {
    let mut total = 0usize;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read;
        if total > max_bytes {
            return Err(too_large(format!("Body exceeded {max_bytes} bytes")));
        }
        writer.write_all(&buf[..read])?;
    }
    Ok(total as u64)
}

fn check_content_length(response: &ureq::Response, max_bytes: usize) -> Result<(), io::Error> {
    let Some(length) = response
        .header("Content-Length")
        .and_then(|value| value.parse::<u64>().ok())
    else {
        return Ok(());
    };
    if length > max_bytes as u64 {
        return Err(too_large(format!("Response too large: {length} bytes")));
    }
    Ok(())
}

fn too_large(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
