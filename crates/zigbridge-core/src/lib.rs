//! Core types shared by the ZigBridge translation engine.
//!
//! This crate holds everything that is independent of the wire protocols:
//! the dynamically typed [`Value`] model, the engine error taxonomy, the
//! events published to the host and the broadcast [`EventBus`] that carries
//! them, plus configuration and logging bootstrap.

pub mod config;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod logging;
pub mod value;

pub use config::{EngineConfig, ReportingDefaults};
pub use error::{EngineError, RadioError, Result};
pub use event::{EngineEvent, EventMetadata};
pub use eventbus::{EventBus, EventBusReceiver, FilteredReceiver, SharedEventBus};
pub use value::{Value, ValueType};
