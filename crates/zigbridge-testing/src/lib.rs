//! Testing utilities for ZigBridge
//!
//! This crate provides:
//! - A scriptable in-memory radio with failure injection
//! - Endpoint layouts and fingerprints of common devices
//! - A harness wiring a session to the mock radio

pub mod fixtures;
pub mod mock_radio;

pub use fixtures::{init_test_logging, test_config, Harness};
pub use mock_radio::{MockRadio, RadioCall};
