use bytes::Bytes;

use crate::constants::PIV_AID;

/// Configuration for a PIV session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Application identifier to select
    pub aid: Bytes,
    /// Consecutive wrong management keys before the session locks
    pub lockout_threshold: u8,
    /// Maximum number of GET RESPONSE round trips for one command
    pub max_response_chain: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            aid: Bytes::from_static(PIV_AID),
            lockout_threshold: 3,
            max_response_chain: 10,
        }
    }
}

impl SessionConfig {
    /// Select a different application identifier
    pub fn with_aid(mut self, aid: impl Into<Bytes>) -> Self {
        self.aid = aid.into();
        self
    }

    /// Set the lockout threshold; zero is treated as one
    pub const fn with_lockout_threshold(mut self, threshold: u8) -> Self {
        self.lockout_threshold = if threshold == 0 { 1 } else { threshold };
        self
    }

    /// Set the GET RESPONSE chain limit
    pub const fn with_max_response_chain(mut self, max: usize) -> Self {
        self.max_response_chain = max;
        self
    }
}
