//! Blocking HTTP transport used by the API layer.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;

use crate::error::ClientError;

const MAX_BINARY_RESPONSE_BYTES: u64 = 32 * 1024 * 1024;

/// Minimal GET surface the API layer needs.
pub trait HttpTransport {
    /// Performs a GET and parses the body as JSON.
    fn get_json(&self, url: &str) -> Result<Value, ClientError>;
    /// Performs a GET and returns the raw body.
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ClientError>;
}

/// `ureq`-backed transport with fixed timeouts.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self { agent }
    }

    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    fn call(&self, url: &str) -> Result<ureq::Response, ClientError> {
        self.agent.get(url).call().map_err(map_ureq_error)
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(15))
    }
}

impl HttpTransport for UreqTransport {
    fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        self.call(url)?
            .into_json::<Value>()
            .map_err(|err| ClientError::Protocol(format!("response is not valid JSON: {err}")))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        read_limited(self.call(url)?.into_reader(), MAX_BINARY_RESPONSE_BYTES)
    }
}

/// Reads a whole body, failing instead of truncating when it exceeds `limit`.
fn read_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>, ClientError> {
    let mut body = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|err| ClientError::Transport(format!("failed to read response: {err}")))?;
    if body.len() as u64 > limit {
        return Err(ClientError::Protocol(format!(
            "response too large (over {limit} bytes)"
        )));
    }
    Ok(body)
}

/// Splits `ureq` failures into network-level and HTTP-level errors.
pub fn map_ureq_error(err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Status(code, response) => ClientError::Protocol(format!(
            "unexpected HTTP status {code} {}",
            response.status_text()
        )),
        ureq::Error::Transport(transport) => ClientError::Transport(transport.to_string()),
    }
}
