use std::time::Duration;

use crate::constants::DEFAULT_MAX_PAYLOAD_BYTES;

/// Knobs shared by both ends of a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Upper bound for the payload a received header may declare. Protects the
    /// receiver from allocating whatever a corrupted header claims.
    pub max_payload_bytes: usize,
    /// `None` waits as long as the OS does.
    pub connect_timeout: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            connect_timeout: None,
        }
    }
}

impl Limits {
    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}
