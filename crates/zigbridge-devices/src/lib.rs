//! Protocol-to-capability translation for Zigbee devices.
//!
//! Devices expose state two ways: standard ZCL cluster attributes and vendor
//! DataPoints multiplexed over the private `0xEF00` cluster. This crate maps
//! both onto named, unit-normalized capabilities and back.
//!
//! ## Layout
//!
//! - [`zcl`]: cluster ids, commands and the capability mapping table
//! - [`datapoint`]: DataPoint codec, HSV payloads and per-device DP tables
//! - [`profiles`]: device profiles selected by fingerprint
//! - [`endpoint`]: primary endpoint selection
//! - [`radio`]: the radio abstraction sessions talk to
//! - [`binding`]: attribute reporting and listener setup
//! - [`dispatch`]: inbound and outbound value translation
//! - [`ias`]: security-zone enrollment
//! - [`session`]: the per-device lifecycle controller

pub mod binding;
pub mod datapoint;
pub mod dispatch;
pub mod endpoint;
pub mod ias;
pub mod profiles;
pub mod radio;
pub mod session;
pub mod store;
pub mod validation;
pub mod zcl;

pub use binding::{BindStage, BindingManager, BindingReport, DegradedAttribute};
pub use datapoint::{
    CodecError, DataPoint, DataPointEntry, DataPointFrame, DataPointTable, DpTransform, DpType,
    HsvColor,
};
pub use dispatch::{Applied, InboundDispatcher, OutboundDispatcher, WritePlan, WriteTarget};
pub use endpoint::{EndpointDescriptor, EndpointSelector};
pub use ias::{EnrollmentState, ZoneEnrollment};
pub use profiles::{
    DeviceFingerprint, DeviceProfile, FingerprintMatch, IasZoneQuirk, ProfileRegistry, Quirks,
    SharedProfile,
};
pub use radio::{
    InboundEvent, InboundPayload, InboundSink, ListenerHandle, RadioAdapter, SharedRadio,
};
pub use session::{DeviceSession, SessionHandle, SessionMessage, SessionState, ShutdownTrigger};
pub use store::{CapabilityStore, StoreUpdate};
pub use zcl::{
    AttributeRef, CapabilityMappingTable, ClusterId, MappingEntry, ReportingConfig, ZclCommand,
    ZclTransform, ZclWrite,
};

pub use zigbridge_core::{EngineConfig, EngineError, RadioError, Result, Value, ValueType};
