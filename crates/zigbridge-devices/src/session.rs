//! Device lifecycle controller.
//!
//! One [`DeviceSession`] per paired device, parameterised by the profile its
//! fingerprint resolves to. The session owns the device's store, selected
//! endpoint and listener registrations, and drives
//! `Uninitialized → EndpointSelected → Binding → Ready → Terminated`.
//!
//! Radio listeners and host writes are queued on one mpsc channel and
//! handled strictly in arrival order, either by [`DeviceSession::process_pending`]
//! or by the task started with [`DeviceSession::spawn`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use zigbridge_core::event::now_millis;
use zigbridge_core::{EngineConfig, EngineError, EngineEvent, Result, SharedEventBus, Value};

use crate::binding::{BindStage, BindingManager, BindingReport};
use crate::dispatch::{Applied, InboundDispatcher, OutboundDispatcher, WritePlan, WriteTarget};
use crate::endpoint::{EndpointDescriptor, EndpointSelector};
use crate::ias::{EnrollmentState, ZoneEnrollment};
use crate::profiles::{DeviceFingerprint, ProfileRegistry, SharedProfile};
use crate::radio::{InboundEvent, InboundSink, ListenerHandle, RadioGuard, SharedRadio};
use crate::store::{CapabilityStore, Slot};
use crate::zcl::ClusterId;

/// Lifecycle state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    EndpointSelected,
    Binding,
    Ready,
    Terminated,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::EndpointSelected => "endpoint_selected",
            Self::Binding => "binding",
            Self::Ready => "ready",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Work queued for a session.
#[derive(Debug)]
pub enum SessionMessage {
    /// Delivered by a radio listener
    Inbound(InboundEvent),
    /// Host capability write
    Write {
        capability: String,
        value: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Host write to an internal setting
    WriteSetting {
        key: String,
        value: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    Terminate,
}

/// Tears a session down from outside its task.
///
/// Every pending radio await resolves as `Cancelled` once triggered.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

/// Translation engine instance for one device.
pub struct DeviceSession {
    device_id: String,
    profile: SharedProfile,
    radio: SharedRadio,
    bus: SharedEventBus,
    config: EngineConfig,
    store: Arc<CapabilityStore>,
    state: watch::Sender<SessionState>,
    endpoint: Option<EndpointDescriptor>,
    inbound: InboundDispatcher,
    outbound: Option<OutboundDispatcher>,
    enrollment: Option<ZoneEnrollment>,
    binding: Option<BindingReport>,
    listeners: Vec<ListenerHandle>,
    tx: mpsc::Sender<SessionMessage>,
    rx: mpsc::Receiver<SessionMessage>,
    shutdown: Arc<watch::Sender<bool>>,
    guard: RadioGuard,
}

impl DeviceSession {
    /// Create a session with the built-in profile for `fingerprint`.
    pub fn new(
        device_id: impl Into<String>,
        fingerprint: &DeviceFingerprint,
        radio: SharedRadio,
        bus: SharedEventBus,
        config: EngineConfig,
    ) -> Self {
        let profile = ProfileRegistry::builtin().resolve(fingerprint);
        let session = Self::with_profile(device_id, profile, radio, bus, config);
        tracing::info!(
            device_id = %session.device_id,
            %fingerprint,
            profile = session.profile.name,
            "Device session created"
        );
        session
    }

    /// Create a session with an explicit profile.
    pub fn with_profile(
        device_id: impl Into<String>,
        profile: SharedProfile,
        radio: SharedRadio,
        bus: SharedEventBus,
        config: EngineConfig,
    ) -> Self {
        let device_id = device_id.into();
        let store = Arc::new(CapabilityStore::new());
        let (tx, rx) = mpsc::channel(config.session_queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let inbound =
            InboundDispatcher::new(device_id.clone(), profile.clone(), store.clone(), bus.clone());

        Self {
            device_id,
            profile,
            radio,
            bus,
            config,
            store,
            state,
            endpoint: None,
            inbound,
            outbound: None,
            enrollment: None,
            binding: None,
            listeners: Vec::new(),
            tx,
            rx,
            shutdown: Arc::new(shutdown),
            guard: RadioGuard::new(shutdown_rx),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn profile(&self) -> &SharedProfile {
        &self.profile
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn primary_endpoint(&self) -> Option<&EndpointDescriptor> {
        self.endpoint.as_ref()
    }

    pub fn store(&self) -> &Arc<CapabilityStore> {
        &self.store
    }

    pub fn binding_report(&self) -> Option<&BindingReport> {
        self.binding.as_ref()
    }

    pub fn enrollment_state(&self) -> Option<EnrollmentState> {
        self.enrollment.as_ref().map(ZoneEnrollment::state)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.store.has_capability(name)
    }

    pub fn capability_value(&self, name: &str) -> Option<Value> {
        self.store.capability(name)
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.store.setting(key)
    }

    /// Queue handle for radio listeners.
    pub fn sink(&self) -> InboundSink {
        InboundSink::new(self.tx.clone())
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger(self.shutdown.clone())
    }

    async fn transition(&self, to: SessionState) {
        let from = self.state.send_replace(to);
        if from == to {
            return;
        }
        tracing::info!(device_id = %self.device_id, %from, %to, "Session state changed");
        self.bus
            .publish_with_source(
                EngineEvent::SessionStateChanged {
                    device_id: self.device_id.clone(),
                    from: from.name().to_string(),
                    to: to.name().to_string(),
                    timestamp: now_millis(),
                },
                "session",
            )
            .await;
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                expected: expected.name().to_string(),
                actual: actual.name().to_string(),
            })
        }
    }

    /// Select the primary endpoint, bind it and enroll security zones.
    ///
    /// Only endpoint selection failure is fatal; the session then terminates.
    /// Individual binding failures are reported as degraded capabilities.
    pub async fn initialize(&mut self) -> Result<()> {
        self.expect_state(SessionState::Uninitialized)?;

        let endpoint = match self.select_endpoint().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                if !matches!(e, EngineError::Cancelled) {
                    tracing::error!(device_id = %self.device_id, error = %e, "Initialization failed");
                }
                self.terminate().await;
                return Err(e);
            }
        };

        self.outbound = Some(OutboundDispatcher::new(
            self.profile.clone(),
            endpoint.clone(),
            self.store.clone(),
        ));
        self.endpoint = Some(endpoint.clone());
        self.transition(SessionState::EndpointSelected).await;

        self.transition(SessionState::Binding).await;
        let manager = BindingManager::new(self.radio.clone(), self.guard.clone(), self.config.clone());
        let sink = self.sink();
        let report = match manager
            .bind(&self.device_id, &self.profile, &endpoint, &sink)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.terminate().await;
                return Err(e);
            }
        };
        self.apply_binding(&report).await;
        self.listeners = report.all_listeners().collect();
        self.binding = Some(report);

        self.enroll(&endpoint).await;
        if self.guard.is_shutdown() {
            self.terminate().await;
            return Err(EngineError::Cancelled);
        }

        self.transition(SessionState::Ready).await;
        Ok(())
    }

    async fn select_endpoint(&self) -> Result<EndpointDescriptor> {
        let endpoints = self
            .guard
            .run(self.config.read_timeout(), self.radio.discover_endpoints())
            .await
            .map_err(|e| match e {
                EngineError::Cancelled => e,
                other => EngineError::EndpointSelectionFailed(format!("discovery failed: {}", other)),
            })?;

        if let Some(id) = self.profile.quirks.primary_endpoint {
            if let Some(endpoint) = endpoints.iter().find(|ep| ep.id == id) {
                return Ok(endpoint.clone());
            }
            tracing::warn!(device_id = %self.device_id, endpoint = id, "Pinned endpoint missing, scoring instead");
        }

        let selected = EndpointSelector::select(&endpoints)?;
        tracing::debug!(
            device_id = %self.device_id,
            endpoint = selected.id,
            score = EndpointSelector::score(&selected),
            "Primary endpoint selected"
        );
        Ok(selected)
    }

    /// Mark bound capabilities available, report degraded ones and seed state.
    async fn apply_binding(&self, report: &BindingReport) {
        let mut bound: BTreeSet<&'static str> = report
            .subscribed
            .iter()
            .chain(report.seed.iter().map(|(source, _)| source))
            .filter_map(|source| self.profile.zcl.lookup(source).and_then(|e| e.capability))
            .collect();
        if report.datapoint_listener.is_some() {
            bound.extend(self.profile.datapoints.capabilities());
        }
        for capability in &bound {
            self.store.mark_available(capability);
        }

        for degraded in &report.degraded {
            if degraded.stage == BindStage::Subscribe {
                // Another source may still feed the capability
                if let Some(capability) = degraded.capability.filter(|c| !bound.contains(c)) {
                    self.store.mark_unavailable(capability);
                }
            }
            self.bus
                .publish_with_source(
                    EngineEvent::CapabilityDegraded {
                        device_id: self.device_id.clone(),
                        cluster: degraded.source.cluster.name().to_string(),
                        attribute: degraded.attribute_name.to_string(),
                        capability: degraded.capability.map(str::to_string),
                        reason: degraded.reason.clone(),
                        timestamp: now_millis(),
                    },
                    "binding",
                )
                .await;
        }

        for (source, value) in &report.seed {
            // Rejections are logged by the dispatcher
            let _ = self.inbound.dispatch_attribute(source, value).await;
        }
    }

    async fn enroll(&mut self, endpoint: &EndpointDescriptor) {
        let Some(quirk) = self.profile.quirks.ias_zone else {
            return;
        };
        if !endpoint.has_cluster(ClusterId::IAS_ZONE) {
            tracing::debug!(device_id = %self.device_id, "No IAS zone cluster, skipping enrollment");
            return;
        }

        let mut enrollment = ZoneEnrollment::new(quirk.zone_id, self.config.enrollment_max_attempts);
        if self.zone_reported_enrolled() {
            enrollment.mark_enrolled();
            enrollment.publish(&self.bus, &self.device_id).await;
        } else {
            enrollment
                .run(
                    &self.radio,
                    &self.guard,
                    endpoint.id,
                    self.config.command_timeout(),
                    self.config.enrollment_retry_delay(),
                    &self.bus,
                    &self.device_id,
                )
                .await;
        }
        self.enrollment = Some(enrollment);
    }

    fn zone_reported_enrolled(&self) -> bool {
        matches!(self.store.setting("zone_state"), Some(Value::String(s)) if s == "enrolled")
    }

    /// Translate one inbound radio event.
    pub async fn handle_inbound(&mut self, event: InboundEvent) -> Result<Vec<Applied>> {
        if self.state() == SessionState::Terminated {
            return Err(EngineError::Cancelled);
        }
        // Mappings describe the primary endpoint only
        if self.endpoint.as_ref().map(|ep| ep.id) != Some(event.endpoint) {
            tracing::debug!(
                device_id = %self.device_id,
                endpoint = event.endpoint,
                source = %event.source_label(),
                "Event from non-primary endpoint dropped"
            );
            return Err(EngineError::UnknownSource(format!(
                "endpoint {} {}",
                event.endpoint,
                event.source_label()
            )));
        }
        let applied = self.inbound.dispatch(&event).await?;

        let zone_enrolled = applied
            .iter()
            .any(|a| a.slot == Slot::Setting("zone_state") && a.value == Value::from("enrolled"));
        if zone_enrolled {
            if let Some(enrollment) = self.enrollment.as_mut() {
                if enrollment.mark_enrolled() {
                    enrollment.publish(&self.bus, &self.device_id).await;
                }
            }
        }
        Ok(applied)
    }

    /// Handle every queued message without waiting. Returns how many were handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            handled += 1;
            if !self.handle_message(message).await {
                break;
            }
        }
        handled
    }

    /// Returns `false` when the session should stop.
    async fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Inbound(event) => {
                // Per-event failures are logged and never stop the session
                let _ = self.handle_inbound(event).await;
                true
            }
            SessionMessage::Write {
                capability,
                value,
                reply,
            } => {
                let result = self.on_capability_write_requested(&capability, value).await;
                let _ = reply.send(result);
                true
            }
            SessionMessage::WriteSetting { key, value, reply } => {
                let result = self.set_setting(&key, value).await;
                let _ = reply.send(result);
                true
            }
            SessionMessage::Terminate => {
                self.terminate().await;
                false
            }
        }
    }

    /// Host write: translate, send, and echo into the store once acknowledged.
    pub async fn on_capability_write_requested(&mut self, capability: &str, value: Value) -> Result<()> {
        let plan = self.outbound()?.plan(capability, &value)?;
        self.execute(capability, plan).await
    }

    /// Write an internal setting through the same path as capabilities.
    pub async fn set_setting(&mut self, key: &str, value: Value) -> Result<()> {
        let plan = self.outbound()?.plan_setting(key, &value)?;
        self.execute(key, plan).await
    }

    fn outbound(&self) -> Result<&OutboundDispatcher> {
        self.expect_state(SessionState::Ready)?;
        self.outbound.as_ref().ok_or_else(|| EngineError::InvalidState {
            expected: SessionState::Ready.name().to_string(),
            actual: self.state().name().to_string(),
        })
    }

    async fn execute(&self, name: &str, plan: WritePlan) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .map(|ep| ep.id)
            .ok_or_else(|| EngineError::write_failed(name, "no primary endpoint"))?;
        let timeout = self.config.command_timeout();

        let result = match plan.target {
            WriteTarget::Zcl { cluster, command } => {
                tracing::debug!(device_id = %self.device_id, name, %cluster, %command, "Sending ZCL command");
                self.guard
                    .run(timeout, self.radio.write_zcl_command(endpoint, cluster, command))
                    .await
            }
            WriteTarget::DataPoint(datapoint) => {
                tracing::debug!(device_id = %self.device_id, name, dp = datapoint.dp, "Writing DataPoint");
                self.guard
                    .run(timeout, self.radio.write_data_point(endpoint, datapoint))
                    .await
            }
        };

        match result {
            Ok(()) => {
                for (slot, value) in plan.echo {
                    self.inbound.apply(slot, value, None).await;
                }
                Ok(())
            }
            Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
            Err(e) => {
                tracing::warn!(device_id = %self.device_id, name, error = %e, "Write failed");
                self.bus
                    .publish_with_source(
                        EngineEvent::WriteFailed {
                            device_id: self.device_id.clone(),
                            capability: name.to_string(),
                            reason: e.to_string(),
                            timestamp: now_millis(),
                        },
                        "outbound",
                    )
                    .await;
                Err(EngineError::write_failed(name, e))
            }
        }
    }

    /// Tear the session down: cancel pending radio calls, release listeners
    /// and stop accepting inbound events. Idempotent.
    pub async fn terminate(&mut self) {
        if self.state() == SessionState::Terminated {
            return;
        }
        self.shutdown.send_replace(true);
        for handle in self.listeners.drain(..) {
            self.radio.remove_listener(handle);
        }
        self.rx.close();
        self.transition(SessionState::Terminated).await;
    }

    /// Run the session on its own task: initialize, then handle queued
    /// messages until teardown.
    pub fn spawn(mut self) -> SessionHandle {
        let handle_tx = self.tx.clone();
        let store = self.store.clone();
        let state = self.state.subscribe();
        let shutdown = self.shutdown_trigger();
        let device_id = self.device_id.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        let task = tokio::spawn(async move {
            if self.state() == SessionState::Uninitialized && self.initialize().await.is_err() {
                return;
            }

            loop {
                tokio::select! {
                    biased;
                    _ = async { let _ = shutdown_rx.wait_for(|down| *down).await; } => break,
                    message = self.rx.recv() => match message {
                        Some(message) => {
                            if !self.handle_message(message).await {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            self.terminate().await;
        });

        SessionHandle {
            device_id,
            tx: handle_tx,
            store,
            state,
            shutdown,
            task: Some(task),
        }
    }
}

/// Host-side handle to a spawned session.
#[derive(Debug)]
pub struct SessionHandle {
    device_id: String,
    tx: mpsc::Sender<SessionMessage>,
    store: Arc<CapabilityStore>,
    state: watch::Receiver<SessionState>,
    shutdown: ShutdownTrigger,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.store.has_capability(name)
    }

    pub fn capability_value(&self, name: &str) -> Option<Value> {
        self.store.capability(name)
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.store.setting(key)
    }

    /// Queue handle for radio listeners owned by the host.
    pub fn sink(&self) -> InboundSink {
        InboundSink::new(self.tx.clone())
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    /// Wait until the session is ready or has terminated.
    pub async fn wait_ready(&mut self) -> SessionState {
        match self
            .state
            .wait_for(|s| matches!(s, SessionState::Ready | SessionState::Terminated))
            .await
        {
            Ok(state) => *state,
            Err(_) => SessionState::Terminated,
        }
    }

    pub async fn write(&self, capability: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionMessage::Write {
            capability: capability.into(),
            value: value.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::Cancelled)?
    }

    pub async fn set_setting(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionMessage::WriteSetting {
            key: key.into(),
            value: value.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::Cancelled)?
    }

    async fn send(&self, message: SessionMessage) -> Result<()> {
        self.tx.send(message).await.map_err(|_| EngineError::InvalidState {
            expected: SessionState::Ready.name().to_string(),
            actual: SessionState::Terminated.name().to_string(),
        })
    }

    /// Tear the session down and wait for its task to finish.
    pub async fn terminate(mut self) {
        self.shutdown.trigger();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(device_id = %self.device_id, error = %e, "Session task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::EndpointSelected.to_string(), "endpoint_selected");
        assert_eq!(
            serde_json::to_string(&SessionState::Ready).unwrap(),
            "\"ready\""
        );
    }

    #[test]
    fn test_shutdown_trigger() {
        let (tx, rx) = watch::channel(false);
        let trigger = ShutdownTrigger(Arc::new(tx));
        assert!(!trigger.is_triggered());
        trigger.clone().trigger();
        assert!(trigger.is_triggered());
        assert!(*rx.borrow());
    }
}
