/// Errors reported by an RTT transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A channel operation was attempted without an active session.
    #[error("no RTT session is active")]
    NotStarted,

    /// The RTT control block could not be located in target memory.
    #[error("RTT control block not found")]
    ControlBlockNotFound,

    /// The probe driver reported a failure.
    #[error("probe error during {operation}: {message}")]
    Probe {
        operation: &'static str,
        message: String,
    },

    /// An I/O error occurred while talking to the probe.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Convenience constructor for driver-reported failures.
    pub fn probe(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Probe {
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
