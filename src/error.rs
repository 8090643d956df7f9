//! Error taxonomy shared by the session, library, and playback layers.

use thiserror::Error;

/// Failure reported by any client operation.
///
/// None of these are fatal to the process; the caller reports the message and
/// the user can retry the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Connection refused, timeout, DNS failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response missing the expected envelope or fields, or a server-side failure.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Operation attempted before a session exists.
    #[error("not connected to a server")]
    NotConnected,
    /// Stream handle failed to open or decode.
    #[error("playback error: {0}")]
    Playback(String),
    /// Required connection input was left empty.
    #[error("missing {0}")]
    MissingField(&'static str),
    /// Requested list index does not exist.
    #[error("no {kind} at position {index}")]
    Selection { kind: &'static str, index: usize },
    /// Action needs an artist or album to be selected first.
    #[error("select an {0} first")]
    NoSelection(&'static str),
}

impl ClientError {
    pub(crate) fn protocol(method: &str, detail: impl std::fmt::Display) -> Self {
        Self::Protocol(format!("{method}: {detail}"))
    }
}
