//! Errors raised while decoding APDU responses

/// Error for APDU response processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// Fewer than the two status bytes arrived
    #[error("Incomplete response: {0} byte(s), a status word needs 2")]
    Incomplete(usize),
}
