//! Zigbee Cluster Library: identifiers, commands and the capability mapping table.

pub mod cluster;
pub mod command;
pub mod mapping;
pub mod transform;

pub use cluster::{attr, ClusterId};
pub use command::ZclCommand;
pub use mapping::{AttributeRef, CapabilityMappingTable, MappingEntry, ReportingConfig, ZclOverride};
pub use transform::{ZclTransform, ZclWrite};
