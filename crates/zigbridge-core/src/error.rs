//! Error taxonomy for the translation engine.

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures reported by the radio layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RadioError {
    /// No acknowledgement within the allotted time
    #[error("Radio timeout after {0} ms")]
    Timeout(u64),

    /// Device answered with a non-success ZCL status
    #[error("Device rejected request with status 0x{0:02x}")]
    Nack(u8),

    /// The endpoint does not carry the requested cluster
    #[error("Cluster 0x{0:04x} not available on endpoint")]
    ClusterUnavailable(u16),

    /// The device left the network or the link dropped
    #[error("Device disconnected")]
    Disconnected,

    #[error("Radio error: {0}")]
    Other(String),
}

/// Errors produced while translating between wire values and capabilities.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Inbound event from a (cluster, attribute) or DataPoint with no mapping
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// The transform or validation step refused a raw value
    #[error("Value from {source_name} rejected: {reason}")]
    TransformRejected { source_name: String, reason: String },

    /// Reporting could not be configured for an attribute
    #[error("Subscription to {cluster}.{attribute} failed: {reason}")]
    SubscriptionFailed {
        cluster: String,
        attribute: String,
        reason: String,
    },

    /// An outbound command was not acknowledged
    #[error("Write of {capability} failed: {reason}")]
    WriteFailed { capability: String, reason: String },

    /// No endpoint exposes a usable cluster
    #[error("Endpoint selection failed: {0}")]
    EndpointSelectionFailed(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// The capability exists but has no writable mapping
    #[error("Capability not writable: {0}")]
    NotWritable(String),

    #[error("Invalid session state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    /// The session was torn down while the operation was pending
    #[error("Operation cancelled by session teardown")]
    Cancelled,

    /// Malformed DataPoint frame or payload
    #[error("Codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Radio(#[from] RadioError),
}

impl EngineError {
    pub fn rejected(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransformRejected {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn write_failed(capability: impl Into<String>, reason: impl ToString) -> Self {
        Self::WriteFailed {
            capability: capability.into(),
            reason: reason.to_string(),
        }
    }

    /// Only a failed endpoint selection prevents a session from running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EndpointSelectionFailed(_))
    }
}
