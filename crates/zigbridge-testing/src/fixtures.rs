//! Device layouts and a session harness shared by the integration tests.

use std::sync::{Arc, Once};

use zigbridge_core::{EngineConfig, EventBus, EventBusReceiver, SharedEventBus};
use zigbridge_devices::{
    ClusterId, DeviceFingerprint, DeviceSession, EndpointDescriptor, SharedProfile,
};

use crate::mock_radio::MockRadio;

/// Engine settings with timeouts short enough for tests.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        command_timeout_ms: 200,
        read_timeout_ms: 200,
        enrollment_retry_delay_ms: 5,
        ..EngineConfig::default()
    }
}

/// Install a test-writer subscriber once per process. Honours `RUST_LOG`.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub mod fingerprints {
    use super::DeviceFingerprint;

    pub fn tuya_light() -> DeviceFingerprint {
        DeviceFingerprint::new("_TZE200_s8gkrkxk", "TS0601")
    }

    pub fn tuya_dimmer() -> DeviceFingerprint {
        DeviceFingerprint::new("_TZE200_dfxkcots", "TS0601")
    }

    pub fn tuya_climate() -> DeviceFingerprint {
        DeviceFingerprint::new("_TZE200_bjawzodf", "TS0601")
    }

    pub fn color_bulb() -> DeviceFingerprint {
        DeviceFingerprint::new("_TZ3210_mja6r5ix", "TS0505B")
    }

    pub fn plug() -> DeviceFingerprint {
        DeviceFingerprint::new("_TZ3000_cphmq0q7", "TS011F")
    }

    pub fn contact_sensor() -> DeviceFingerprint {
        DeviceFingerprint::new("_TZ3000_26fmupbb", "TS0203")
    }

    pub fn unknown() -> DeviceFingerprint {
        DeviceFingerprint::new("ACME", "Widget 3000")
    }
}

pub mod endpoints {
    use super::{ClusterId, EndpointDescriptor};
    use ClusterId as C;

    /// Single endpoint carrying only basic and the DataPoint cluster.
    pub fn tuya() -> Vec<EndpointDescriptor> {
        vec![EndpointDescriptor::new(
            1,
            [C::BASIC, C::GROUPS, C::SCENES, C::TUYA_PRIVATE],
        )]
    }

    /// Colour bulb with a green power proxy endpoint next to the light.
    pub fn color_light() -> Vec<EndpointDescriptor> {
        vec![
            EndpointDescriptor::new(242, [ClusterId(0x0021)]),
            EndpointDescriptor::new(
                1,
                [
                    C::BASIC,
                    C::IDENTIFY,
                    C::GROUPS,
                    C::SCENES,
                    C::ON_OFF,
                    C::LEVEL_CONTROL,
                    C::COLOR_CONTROL,
                ],
            ),
        ]
    }

    pub fn plug() -> Vec<EndpointDescriptor> {
        vec![EndpointDescriptor::new(
            1,
            [
                C::BASIC,
                C::ON_OFF,
                C::METERING,
                C::ELECTRICAL_MEASUREMENT,
                C::TUYA_PRIVATE,
            ],
        )]
    }

    pub fn contact_sensor() -> Vec<EndpointDescriptor> {
        vec![EndpointDescriptor::new(
            1,
            [C::BASIC, C::POWER_CONFIGURATION, C::IAS_ZONE],
        )]
    }

    pub fn climate_sensor() -> Vec<EndpointDescriptor> {
        vec![EndpointDescriptor::new(
            1,
            [
                C::BASIC,
                C::POWER_CONFIGURATION,
                C::TEMPERATURE_MEASUREMENT,
                C::HUMIDITY_MEASUREMENT,
            ],
        )]
    }
}

/// A session wired to a [`MockRadio`] and a private event bus.
pub struct Harness {
    pub radio: Arc<MockRadio>,
    pub bus: SharedEventBus,
    pub events: EventBusReceiver,
    pub session: DeviceSession,
}

impl Harness {
    /// Session for `fingerprint`, resolved through the built-in profiles.
    pub fn new(radio: MockRadio, fingerprint: &DeviceFingerprint) -> Self {
        Self::with_config(radio, fingerprint, test_config())
    }

    pub fn with_config(radio: MockRadio, fingerprint: &DeviceFingerprint, config: EngineConfig) -> Self {
        init_test_logging();
        let radio = Arc::new(radio);
        let bus: SharedEventBus = Arc::new(EventBus::from_config(&config));
        let events = bus.subscribe();
        let session = DeviceSession::new("test-device", fingerprint, radio.shared(), bus.clone(), config);
        Self {
            radio,
            bus,
            events,
            session,
        }
    }

    pub fn with_profile(radio: MockRadio, profile: SharedProfile) -> Self {
        init_test_logging();
        let radio = Arc::new(radio);
        let config = test_config();
        let bus: SharedEventBus = Arc::new(EventBus::from_config(&config));
        let events = bus.subscribe();
        let session = DeviceSession::with_profile("test-device", profile, radio.shared(), bus.clone(), config);
        Self {
            radio,
            bus,
            events,
            session,
        }
    }

    /// Initialize the session, then handle whatever the radio queued.
    pub async fn ready(mut self) -> Self {
        if let Err(e) = self.session.initialize().await {
            tracing::warn!(error = %e, "Harness session failed to initialize");
        }
        self.session.process_pending().await;
        self
    }

    /// Handle queued radio events.
    pub async fn settle(&mut self) -> usize {
        self.session.process_pending().await
    }
}
