/// Errors returned by the injected remote client.
///
/// The classification lives with the type: `is_retryable` is what the
/// engine consults when deciding between backoff and terminal failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Timeout, 5xx, connection reset. Retried with backoff, never
    /// surfaced to the user as a hard failure.
    #[error("transient remote error: {reason}")]
    Transient { reason: String },

    /// 4xx-style rejection: the payload itself is invalid, or a referenced
    /// parent no longer exists remotely. Terminal for the operation.
    #[error("remote rejected request (status {status}): {reason}")]
    Rejected { status: u16, reason: String },
}

impl RemoteError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn rejected(status: u16, reason: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
