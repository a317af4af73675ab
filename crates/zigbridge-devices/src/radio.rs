//! Radio abstraction.
//!
//! The engine never touches the Zigbee stack directly. Everything it needs
//! from the host's radio (endpoint discovery, reporting configuration,
//! reads, commands and inbound listeners) goes through [`RadioAdapter`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use zigbridge_core::{EngineError, RadioError, Result, Value};

use crate::datapoint::DataPoint;
use crate::endpoint::EndpointDescriptor;
use crate::session::SessionMessage;
use crate::zcl::{AttributeRef, ClusterId, ReportingConfig, ZclCommand};

/// Identifies a registered listener so it can be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerHandle(pub u64);

/// What arrived from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// Attribute report or read response
    Attribute { source: AttributeRef, value: Value },
    /// One DataPoint record from the private cluster
    DataPoint(DataPoint),
}

/// Inbound radio event for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub endpoint: u8,
    pub payload: InboundPayload,
}

impl InboundEvent {
    pub fn attribute(endpoint: u8, source: AttributeRef, value: impl Into<Value>) -> Self {
        Self {
            endpoint,
            payload: InboundPayload::Attribute {
                source,
                value: value.into(),
            },
        }
    }

    pub fn data_point(endpoint: u8, datapoint: DataPoint) -> Self {
        Self {
            endpoint,
            payload: InboundPayload::DataPoint(datapoint),
        }
    }

    /// Short description of the source, for logs and errors.
    pub fn source_label(&self) -> String {
        match &self.payload {
            InboundPayload::Attribute { source, .. } => source.to_string(),
            InboundPayload::DataPoint(dp) => format!("dp {}", dp.dp),
        }
    }
}

/// Delivery side of a session's message queue, handed to radio listeners.
///
/// Delivery never blocks the radio: when the queue is full or the session is
/// gone the event is dropped.
#[derive(Debug, Clone)]
pub struct InboundSink {
    tx: mpsc::Sender<SessionMessage>,
}

impl InboundSink {
    pub(crate) fn new(tx: mpsc::Sender<SessionMessage>) -> Self {
        Self { tx }
    }

    /// Queue an event. Returns `false` if it was dropped.
    pub fn deliver(&self, event: InboundEvent) -> bool {
        match self.tx.try_send(SessionMessage::Inbound(event)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Session queue full, dropping inbound event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Radio operations used by device sessions.
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Radio name, for logs.
    fn name(&self) -> &str {
        "radio"
    }

    async fn discover_endpoints(&self) -> std::result::Result<Vec<EndpointDescriptor>, RadioError>;

    /// Configure attribute reporting.
    async fn subscribe(
        &self,
        endpoint: u8,
        source: AttributeRef,
        reporting: ReportingConfig,
    ) -> std::result::Result<(), RadioError>;

    async fn read_attribute(
        &self,
        endpoint: u8,
        source: AttributeRef,
    ) -> std::result::Result<Value, RadioError>;

    async fn write_zcl_command(
        &self,
        endpoint: u8,
        cluster: ClusterId,
        command: ZclCommand,
    ) -> std::result::Result<(), RadioError>;

    async fn write_data_point(
        &self,
        endpoint: u8,
        datapoint: DataPoint,
    ) -> std::result::Result<(), RadioError>;

    /// Ask the device to report every DataPoint. Radios without the
    /// private cluster can ignore this.
    async fn query_data_points(&self, _endpoint: u8) -> std::result::Result<(), RadioError> {
        Ok(())
    }

    /// Forward reports of one attribute to `sink`.
    fn on_attribute_change(
        &self,
        endpoint: u8,
        source: AttributeRef,
        sink: InboundSink,
    ) -> ListenerHandle;

    /// Forward every DataPoint reported on `endpoint` to `sink`.
    fn on_data_point_report(&self, endpoint: u8, sink: InboundSink) -> ListenerHandle;

    fn remove_listener(&self, handle: ListenerHandle);
}

/// Shared radio handle.
pub type SharedRadio = Arc<dyn RadioAdapter>;

/// Runs radio calls under a timeout, abandoning them when the session shuts down.
#[derive(Debug, Clone)]
pub(crate) struct RadioGuard {
    shutdown: watch::Receiver<bool>,
}

impl RadioGuard {
    pub(crate) fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self { shutdown }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Await `call`. Resolves to `Cancelled` on shutdown and to a radio
    /// timeout when `timeout` elapses first.
    pub(crate) async fn run<T, F>(&self, timeout: Duration, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, RadioError>>,
    {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow_and_update() {
            return Err(EngineError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = shutdown.wait_for(|down| *down) => Err(EngineError::Cancelled),
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(Ok(_)) if self.is_shutdown() => Err(EngineError::Cancelled),
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(err.into()),
                Err(_) => Err(RadioError::Timeout(timeout.as_millis() as u64).into()),
            },
        }
    }
}
