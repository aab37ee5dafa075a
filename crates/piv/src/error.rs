use pivkit_apdu_core::{StatusWord, response::error::ResponseError};

use crate::types::{SignatureAlgorithm, Slot};

/// Result type for PIV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for PIV operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed; the session is no longer usable
    #[error("Transport failure: {0}")]
    Transport(#[source] pivkit_apdu_core::Error),

    /// The card answered with something that could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The PIV application is not present on the card
    #[error("PIV application not found")]
    ApplicationNotFound,

    /// No certificate is stored in the slot
    #[error("No certificate in {0}")]
    CertificateNotFound(Slot),

    /// The operation needs an authenticated session
    #[error("Management key authentication required")]
    AuthenticationRequired,

    /// The management key is blocked for this session
    #[error("Management key authentication is locked")]
    Locked,

    /// The card rejected the management key
    #[error("Wrong management key, {retries_remaining} attempt(s) remaining")]
    WrongManagementKey {
        /// Attempts left before the session locks
        retries_remaining: u8,
    },

    /// The card's answer to the host challenge did not verify
    #[error("Card failed to prove possession of the management key")]
    CardAuthenticationFailed,

    /// The card rejected the data field (6A80)
    #[error("Incorrect parameters in the data field")]
    IncorrectParameters,

    /// Any status word without a dedicated mapping
    #[error("Card returned {0}: {desc}", desc = .0.description())]
    UnknownCardError(StatusWord),

    /// The session was disconnected
    #[error("Session closed")]
    SessionClosed,

    /// Management key material is unusable
    #[error("Invalid management key: {0}")]
    InvalidManagementKey(&'static str),

    /// The input to sign does not match the algorithm
    #[error("{algorithm} expects {expected} bytes to sign, got {actual}")]
    InvalidDigestLength {
        /// Algorithm that was requested
        algorithm: SignatureAlgorithm,
        /// Length the algorithm expects
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Caller supplied data is invalid
    #[error("Invalid data: {0}")]
    InvalidData(&'static str),

    /// Command could not be encoded
    #[error(transparent)]
    Apdu(pivkit_apdu_core::Error),
}

impl Error {
    /// Map a non-success status word to an error
    pub const fn from_status(status: StatusWord) -> Self {
        match status.to_u16() {
            0x6982 => Self::AuthenticationRequired,
            0x6983 => Self::Locked,
            0x6A80 => Self::IncorrectParameters,
            _ => Self::UnknownCardError(status),
        }
    }

    /// Whether the session can no longer be used after this error
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::SessionClosed)
    }
}

impl From<pivkit_apdu_core::Error> for Error {
    fn from(error: pivkit_apdu_core::Error) -> Self {
        if error.is_transport() {
            return Self::Transport(error);
        }
        match error.root() {
            pivkit_apdu_core::Error::Response(err) => Self::MalformedResponse(err.to_string()),
            _ => Self::Apdu(error),
        }
    }
}

impl From<crate::tlv::TlvError> for Error {
    fn from(error: crate::tlv::TlvError) -> Self {
        Self::MalformedResponse(error.to_string())
    }
}

impl From<StatusWord> for Error {
    fn from(status: StatusWord) -> Self {
        Self::from_status(status)
    }
}
