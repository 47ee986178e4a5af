use std::time::Duration;

/// Default time to wait for a reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Engine behavior configuration.
#[derive(Debug, Clone)]
pub struct TransceiverConfig {
    /// Deadline applied by [`Transceiver::send`](crate::Transceiver::send).
    pub request_timeout: Duration,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
