//! Events published by device sessions.
//!
//! The host observes capability changes and session health exclusively
//! through these events.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Event emitted by the translation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A capability received a new normalized value
    CapabilityChanged {
        device_id: String,
        capability: String,
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<Value>,
        timestamp: i64,
    },

    /// An internal setting (not surfaced as a capability) changed
    SettingChanged {
        device_id: String,
        key: String,
        value: Value,
        timestamp: i64,
    },

    /// Lifecycle transition of a device session
    SessionStateChanged {
        device_id: String,
        from: String,
        to: String,
        timestamp: i64,
    },

    /// Reporting for an attribute could not be established
    CapabilityDegraded {
        device_id: String,
        cluster: String,
        attribute: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        capability: Option<String>,
        reason: String,
        timestamp: i64,
    },

    /// Security-zone enrollment progressed
    EnrollmentChanged {
        device_id: String,
        state: String,
        attempts: u32,
        timestamp: i64,
    },

    /// A host write request was not acknowledged by the device
    WriteFailed {
        device_id: String,
        capability: String,
        reason: String,
        timestamp: i64,
    },
}

impl EngineEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CapabilityChanged { .. } => "CapabilityChanged",
            Self::SettingChanged { .. } => "SettingChanged",
            Self::SessionStateChanged { .. } => "SessionStateChanged",
            Self::CapabilityDegraded { .. } => "CapabilityDegraded",
            Self::EnrollmentChanged { .. } => "EnrollmentChanged",
            Self::WriteFailed { .. } => "WriteFailed",
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::CapabilityChanged { device_id, .. }
            | Self::SettingChanged { device_id, .. }
            | Self::SessionStateChanged { device_id, .. }
            | Self::CapabilityDegraded { device_id, .. }
            | Self::EnrollmentChanged { device_id, .. }
            | Self::WriteFailed { device_id, .. } => device_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::CapabilityChanged { timestamp, .. }
            | Self::SettingChanged { timestamp, .. }
            | Self::SessionStateChanged { timestamp, .. }
            | Self::CapabilityDegraded { timestamp, .. }
            | Self::EnrollmentChanged { timestamp, .. }
            | Self::WriteFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Capability and setting updates.
    pub fn is_value_event(&self) -> bool {
        matches!(
            self,
            Self::CapabilityChanged { .. } | Self::SettingChanged { .. }
        )
    }

    /// Lifecycle, binding health and failed writes.
    pub fn is_health_event(&self) -> bool {
        matches!(
            self,
            Self::SessionStateChanged { .. }
                | Self::CapabilityDegraded { .. }
                | Self::EnrollmentChanged { .. }
                | Self::WriteFailed { .. }
        )
    }
}

/// Metadata attached to every published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub event_id: String,
    /// Component that published the event
    pub source: String,
    /// Publication time (unix seconds)
    pub timestamp: i64,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Current unix time in milliseconds, used for event timestamps.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
