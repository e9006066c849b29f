use std::io;

use thiserror::Error;

use crate::types::{AlertDescription, AlertLevel};

/// Errors surfaced by the engine.
///
/// Record-layer anomalies (replays, undecryptable or malformed records) never
/// appear here; they are dropped where they are found.
#[derive(Debug, Error)]
pub enum Error {
    /// A fatal alert raised by this side. The alert is sent to the peer
    /// before the error is returned.
    #[error("fatal alert {description}: {reason}")]
    FatalAlert {
        description: AlertDescription,
        reason: String,
    },

    /// The peer sent a fatal alert, or closed the connection during the handshake.
    #[error("peer sent alert {description} ({level:?})")]
    PeerAlert {
        level: AlertLevel,
        description: AlertDescription,
    },

    /// Retransmission budget or handshake deadline exhausted.
    #[error("timeout: {0}")]
    Timeout(&'static str),

    /// The datagram transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The connection has been closed (by us or by a close_notify).
    #[error("connection closed")]
    ConnectionClosed,

    /// Caller misuse, detected before any network I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    ConfigError(String),
}

impl Error {
    pub(crate) fn fatal(description: AlertDescription, reason: impl Into<String>) -> Self {
        Error::FatalAlert {
            description,
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected_message(reason: impl Into<String>) -> Self {
        Self::fatal(AlertDescription::UnexpectedMessage, reason)
    }

    pub(crate) fn illegal_parameter(reason: impl Into<String>) -> Self {
        Self::fatal(AlertDescription::IllegalParameter, reason)
    }

    pub(crate) fn handshake_failure(reason: impl Into<String>) -> Self {
        Self::fatal(AlertDescription::HandshakeFailure, reason)
    }

    pub(crate) fn decode_error(reason: impl Into<String>) -> Self {
        Self::fatal(AlertDescription::DecodeError, reason)
    }

    pub(crate) fn decrypt_error(reason: impl Into<String>) -> Self {
        Self::fatal(AlertDescription::DecryptError, reason)
    }

    pub(crate) fn internal_error(reason: impl Into<String>) -> Self {
        Self::fatal(AlertDescription::InternalError, reason)
    }

    /// The alert description carried by this error, if any.
    pub fn alert_description(&self) -> Option<AlertDescription> {
        match self {
            Error::FatalAlert { description, .. } => Some(*description),
            Error::PeerAlert { description, .. } => Some(*description),
            _ => None,
        }
    }

    /// Whether the failure originated on this side of the connection.
    pub fn is_local(&self) -> bool {
        !matches!(self, Error::PeerAlert { .. })
    }

    /// Whether this error should be reported to the peer with an alert.
    pub(crate) fn alert_to_send(&self) -> Option<AlertDescription> {
        match self {
            Error::FatalAlert { description, .. } => Some(*description),
            _ => None,
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let reason = match value {
            nom::Err::Incomplete(_) => "malformed message: truncated".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("malformed message: {:?}", e.code)
            }
        };
        Error::decode_error(reason)
    }
}
