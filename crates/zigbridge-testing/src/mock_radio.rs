//! In-memory radio for tests.
//!
//! Holds endpoint descriptors and attribute values, records every request,
//! and lets tests push attribute reports and DataPoints to whatever
//! listeners the session registered.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use zigbridge_core::{RadioError, Value};
use zigbridge_devices::datapoint::SequenceCounter;
use zigbridge_devices::zcl::attr;
use zigbridge_devices::{
    AttributeRef, ClusterId, CodecError, DataPoint, DataPointFrame, DeviceFingerprint, EndpointDescriptor,
    InboundEvent, InboundSink, ListenerHandle, RadioAdapter, ReportingConfig, SharedRadio,
    ZclCommand,
};

/// ZCL status for an unsupported attribute.
pub const UNSUPPORTED_ATTRIBUTE: u8 = 0x86;

/// A request the engine made to the radio.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioCall {
    Discover,
    Subscribe {
        endpoint: u8,
        source: AttributeRef,
        reporting: ReportingConfig,
    },
    Read {
        endpoint: u8,
        source: AttributeRef,
    },
    Command {
        endpoint: u8,
        cluster: ClusterId,
        command: ZclCommand,
    },
    WriteDataPoint {
        endpoint: u8,
        datapoint: DataPoint,
    },
    QueryDataPoints {
        endpoint: u8,
    },
    RemoveListener(ListenerHandle),
}

#[derive(Debug, Clone)]
enum ListenerKind {
    Attribute(AttributeRef),
    DataPoints,
}

#[derive(Debug, Clone)]
struct Listener {
    endpoint: u8,
    kind: ListenerKind,
    sink: InboundSink,
}

#[derive(Debug, Default)]
struct State {
    endpoints: Vec<EndpointDescriptor>,
    attributes: HashMap<(u8, AttributeRef), Value>,
    calls: Vec<RadioCall>,
    listeners: BTreeMap<u64, Listener>,
    next_listener: u64,
    subscribe_failures: HashMap<AttributeRef, u32>,
    read_failures: HashMap<AttributeRef, u32>,
    write_failures: u32,
    write_error: Option<RadioError>,
    enroll_failures: u32,
    discover_error: Option<RadioError>,
    write_latency: Duration,
}

/// Scriptable [`RadioAdapter`].
#[derive(Debug)]
pub struct MockRadio {
    state: Mutex<State>,
    sequence: SequenceCounter,
}

impl MockRadio {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        Self {
            state: Mutex::new(State {
                endpoints,
                ..State::default()
            }),
            sequence: SequenceCounter::new(0),
        }
    }

    /// Wrap into the shared trait object sessions expect.
    pub fn shared(self: &Arc<Self>) -> SharedRadio {
        self.clone()
    }

    // ========== Scripting ==========

    /// Value returned when the attribute is read.
    pub fn with_attribute(self, endpoint: u8, source: AttributeRef, value: impl Into<Value>) -> Self {
        self.set_attribute(endpoint, source, value);
        self
    }

    pub fn set_attribute(&self, endpoint: u8, source: AttributeRef, value: impl Into<Value>) {
        self.state
            .lock()
            .attributes
            .insert((endpoint, source), value.into());
    }

    /// Answer genBasic identification reads on `endpoint`.
    pub fn with_basic(self, endpoint: u8, fingerprint: &DeviceFingerprint) -> Self {
        let basic = |attribute| AttributeRef::new(ClusterId::BASIC, attribute);
        self.with_attribute(endpoint, basic(attr::basic::MANUFACTURER_NAME), fingerprint.manufacturer_name.as_str())
            .with_attribute(endpoint, basic(attr::basic::MODEL_ID), fingerprint.model_id.as_str())
            .with_attribute(endpoint, basic(attr::basic::POWER_SOURCE), 1i64)
            .with_attribute(endpoint, basic(attr::basic::SW_BUILD_ID), "1.0.0")
    }

    /// Fail the next `times` subscriptions to `source`.
    pub fn fail_subscribe(self, source: AttributeRef, times: u32) -> Self {
        self.state.lock().subscribe_failures.insert(source, times);
        self
    }

    /// Fail the next `times` reads of `source` with a timeout.
    pub fn fail_read(self, source: AttributeRef, times: u32) -> Self {
        self.state.lock().read_failures.insert(source, times);
        self
    }

    /// Reject the next `times` writes (commands and DataPoints) with `error`.
    pub fn fail_writes(&self, times: u32, error: RadioError) {
        let mut state = self.state.lock();
        state.write_failures = times;
        state.write_error = Some(error);
    }

    /// Reject the next `times` zone enroll responses.
    pub fn fail_enrollment(self, times: u32) -> Self {
        self.state.lock().enroll_failures = times;
        self
    }

    pub fn fail_discovery(self, error: RadioError) -> Self {
        self.state.lock().discover_error = Some(error);
        self
    }

    /// Delay before writes are acknowledged.
    pub fn set_write_latency(&self, latency: Duration) {
        self.state.lock().write_latency = latency;
    }

    // ========== Device-side events ==========

    /// Report an attribute change to every matching listener.
    /// Returns the number of listeners reached.
    pub fn emit_attribute(&self, endpoint: u8, source: AttributeRef, value: impl Into<Value>) -> usize {
        let value = value.into();
        let sinks = {
            let mut state = self.state.lock();
            state.attributes.insert((endpoint, source), value.clone());
            Self::matching(&state, endpoint, |kind| {
                matches!(kind, ListenerKind::Attribute(s) if *s == source)
            })
        };
        sinks
            .into_iter()
            .filter(|sink| sink.deliver(InboundEvent::attribute(endpoint, source, value.clone())))
            .count()
    }

    /// Report one DataPoint to every DataPoint listener on `endpoint`.
    pub fn emit_data_point(&self, endpoint: u8, datapoint: DataPoint) -> usize {
        let sinks = {
            let state = self.state.lock();
            Self::matching(&state, endpoint, |kind| matches!(kind, ListenerKind::DataPoints))
        };
        sinks
            .into_iter()
            .filter(|sink| sink.deliver(InboundEvent::data_point(endpoint, datapoint.clone())))
            .count()
    }

    /// Decode a raw frame the way the radio would and report each record.
    pub fn emit_frame(&self, endpoint: u8, bytes: &[u8]) -> Result<usize, CodecError> {
        let frame = DataPointFrame::decode(bytes)?;
        Ok(frame
            .datapoints
            .into_iter()
            .map(|dp| self.emit_data_point(endpoint, dp))
            .sum())
    }

    /// Encode DataPoints into a frame with the next sequence number.
    pub fn frame(&self, datapoints: Vec<DataPoint>) -> Vec<u8> {
        DataPointFrame::new(self.sequence.next(), datapoints).encode()
    }

    fn matching(state: &State, endpoint: u8, kind: impl Fn(&ListenerKind) -> bool) -> Vec<InboundSink> {
        state
            .listeners
            .values()
            .filter(|l| l.endpoint == endpoint && kind(&l.kind))
            .map(|l| l.sink.clone())
            .collect()
    }

    // ========== Inspection ==========

    pub fn calls(&self) -> Vec<RadioCall> {
        self.state.lock().calls.clone()
    }

    pub fn subscriptions(&self) -> Vec<AttributeRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RadioCall::Subscribe { source, .. } => Some(source),
                _ => None,
            })
            .collect()
    }

    pub fn zcl_commands(&self) -> Vec<(ClusterId, ZclCommand)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RadioCall::Command { cluster, command, .. } => Some((cluster, command)),
                _ => None,
            })
            .collect()
    }

    pub fn data_point_writes(&self) -> Vec<DataPoint> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RadioCall::WriteDataPoint { datapoint, .. } => Some(datapoint),
                _ => None,
            })
            .collect()
    }

    pub fn active_listeners(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn record(&self, call: RadioCall) {
        self.state.lock().calls.push(call);
    }

    fn take_failure(counter: &mut u32) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    async fn acknowledge_write(&self, enrollment: bool) -> Result<(), RadioError> {
        let (latency, failure) = {
            let mut state = self.state.lock();
            let failure = if enrollment && Self::take_failure(&mut state.enroll_failures) {
                Some(RadioError::Timeout(0))
            } else if Self::take_failure(&mut state.write_failures) {
                Some(state.write_error.clone().unwrap_or(RadioError::Nack(0x01)))
            } else {
                None
            };
            (state.write_latency, failure)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn add_listener(&self, endpoint: u8, kind: ListenerKind, sink: InboundSink) -> ListenerHandle {
        let mut state = self.state.lock();
        state.next_listener += 1;
        let id = state.next_listener;
        state.listeners.insert(id, Listener { endpoint, kind, sink });
        ListenerHandle(id)
    }
}

#[async_trait]
impl RadioAdapter for MockRadio {
    fn name(&self) -> &str {
        "mock"
    }

    async fn discover_endpoints(&self) -> Result<Vec<EndpointDescriptor>, RadioError> {
        self.record(RadioCall::Discover);
        let state = self.state.lock();
        match &state.discover_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.endpoints.clone()),
        }
    }

    async fn subscribe(
        &self,
        endpoint: u8,
        source: AttributeRef,
        reporting: ReportingConfig,
    ) -> Result<(), RadioError> {
        self.record(RadioCall::Subscribe {
            endpoint,
            source,
            reporting,
        });
        let mut state = self.state.lock();
        if let Some(remaining) = state.subscribe_failures.get_mut(&source) {
            if Self::take_failure(remaining) {
                return Err(RadioError::Timeout(0));
            }
        }
        Ok(())
    }

    async fn read_attribute(&self, endpoint: u8, source: AttributeRef) -> Result<Value, RadioError> {
        self.record(RadioCall::Read { endpoint, source });
        let mut state = self.state.lock();
        if let Some(remaining) = state.read_failures.get_mut(&source) {
            if Self::take_failure(remaining) {
                return Err(RadioError::Timeout(0));
            }
        }
        state
            .attributes
            .get(&(endpoint, source))
            .cloned()
            .ok_or(RadioError::Nack(UNSUPPORTED_ATTRIBUTE))
    }

    async fn write_zcl_command(
        &self,
        endpoint: u8,
        cluster: ClusterId,
        command: ZclCommand,
    ) -> Result<(), RadioError> {
        let enrollment = matches!(command, ZclCommand::ZoneEnrollResponse { .. });
        self.record(RadioCall::Command {
            endpoint,
            cluster,
            command,
        });
        self.acknowledge_write(enrollment).await
    }

    async fn write_data_point(&self, endpoint: u8, datapoint: DataPoint) -> Result<(), RadioError> {
        self.record(RadioCall::WriteDataPoint {
            endpoint,
            datapoint,
        });
        self.acknowledge_write(false).await
    }

    async fn query_data_points(&self, endpoint: u8) -> Result<(), RadioError> {
        self.record(RadioCall::QueryDataPoints { endpoint });
        Ok(())
    }

    fn on_attribute_change(
        &self,
        endpoint: u8,
        source: AttributeRef,
        sink: InboundSink,
    ) -> ListenerHandle {
        self.add_listener(endpoint, ListenerKind::Attribute(source), sink)
    }

    fn on_data_point_report(&self, endpoint: u8, sink: InboundSink) -> ListenerHandle {
        self.add_listener(endpoint, ListenerKind::DataPoints, sink)
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        let mut state = self.state.lock();
        state.calls.push(RadioCall::RemoveListener(handle));
        state.listeners.remove(&handle.0);
    }
}
