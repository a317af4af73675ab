//! Session lifecycle and host writes
//!
//! - Writes resolve to ZCL commands or DataPoints and echo on acknowledgement
//! - Failed writes leave the store alone and raise WriteFailed
//! - Teardown abandons in-flight radio calls and releases listeners
//! - The spawned task serves writes and inbound events in order

use std::sync::Arc;
use std::time::Duration;

use zigbridge_core::{EngineError, EngineEvent, EventBus, RadioError, Value};
use zigbridge_devices::zcl::attr;
use zigbridge_devices::{
    AttributeRef, ClusterId, DataPoint, DeviceSession, InboundEvent, SessionState, ZclCommand,
};
use zigbridge_testing::fixtures::{endpoints, fingerprints, test_config};
use zigbridge_testing::{Harness, MockRadio, RadioCall};

fn tuya_light() -> Harness {
    let fingerprint = fingerprints::tuya_light();
    Harness::new(
        MockRadio::new(endpoints::tuya()).with_basic(1, &fingerprint),
        &fingerprint,
    )
}

fn plug() -> Harness {
    let fingerprint = fingerprints::plug();
    let radio = MockRadio::new(endpoints::plug())
        .with_basic(1, &fingerprint)
        .with_attribute(1, AttributeRef::new(ClusterId::ON_OFF, attr::on_off::ON_OFF), false)
        .with_attribute(1, AttributeRef::new(ClusterId::ON_OFF, attr::on_off::START_UP_ON_OFF), 0i64)
        .with_attribute(
            1,
            AttributeRef::new(ClusterId::METERING, attr::metering::CURRENT_SUMM_DELIVERED),
            12_500i64,
        )
        .with_attribute(
            1,
            AttributeRef::new(ClusterId::ELECTRICAL_MEASUREMENT, attr::electrical::ACTIVE_POWER),
            60i64,
        )
        .with_attribute(
            1,
            AttributeRef::new(ClusterId::ELECTRICAL_MEASUREMENT, attr::electrical::RMS_VOLTAGE),
            230i64,
        )
        .with_attribute(
            1,
            AttributeRef::new(ClusterId::ELECTRICAL_MEASUREMENT, attr::electrical::RMS_CURRENT),
            260i64,
        );
    Harness::new(radio, &fingerprint)
}

#[tokio::test]
async fn test_datapoint_write_and_echo() {
    let mut h = tuya_light().ready().await;
    h.events.drain();

    h.session
        .on_capability_write_requested("dim", Value::Float(0.2))
        .await
        .unwrap();

    assert_eq!(h.radio.data_point_writes(), vec![DataPoint::value(3, 200)]);
    assert_eq!(h.session.capability_value("dim"), Some(Value::Float(0.2)));
    let echoed = h
        .events
        .drain()
        .into_iter()
        .any(|e| matches!(e, EngineEvent::CapabilityChanged { capability, .. } if capability == "dim"));
    assert!(echoed);
}

#[tokio::test]
async fn test_write_targets_last_reporting_alias() {
    let mut h = tuya_light().ready().await;

    h.radio.emit_data_point(1, DataPoint::value(22, 900));
    h.settle().await;
    h.session
        .on_capability_write_requested("dim", Value::Float(0.3))
        .await
        .unwrap();

    assert_eq!(h.radio.data_point_writes(), vec![DataPoint::value(22, 300)]);
}

#[tokio::test]
async fn test_hsv_write_carries_all_components() {
    let mut h = tuya_light().ready().await;

    h.radio.emit_data_point(1, DataPoint::string(5, "000F03E803E8"));
    h.settle().await;
    h.session
        .on_capability_write_requested("light_saturation", Value::Float(0.5))
        .await
        .unwrap();

    assert_eq!(
        h.radio.data_point_writes(),
        vec![DataPoint::string(5, "000f01f403e8")]
    );
    assert_eq!(h.session.capability_value("light_saturation"), Some(Value::Float(0.5)));
}

#[tokio::test]
async fn test_zcl_write_preferred_over_datapoint() {
    let mut h = plug().ready().await;

    h.session
        .on_capability_write_requested("onoff", Value::Boolean(true))
        .await
        .unwrap();

    assert_eq!(h.radio.zcl_commands(), vec![(ClusterId::ON_OFF, ZclCommand::On)]);
    assert!(h.radio.data_point_writes().is_empty());
    assert_eq!(h.session.capability_value("onoff"), Some(Value::Boolean(true)));
}

#[tokio::test]
async fn test_plug_reports_from_both_protocols() {
    let mut h = plug().ready().await;

    assert_eq!(h.session.capability_value("meter_power"), Some(Value::Float(12.5)));
    assert_eq!(h.session.capability_value("measure_voltage"), Some(Value::Float(230.0)));

    h.radio.emit_data_point(1, DataPoint::value(19, 2312));
    h.settle().await;
    assert_eq!(h.session.capability_value("measure_voltage"), Some(Value::Float(231.2)));
}

#[tokio::test]
async fn test_setting_write() {
    let mut h = tuya_light().ready().await;

    h.session
        .set_setting("power_on_behavior", Value::from("previous"))
        .await
        .unwrap();

    assert_eq!(h.radio.data_point_writes(), vec![DataPoint::enumeration(26, 2)]);
    assert_eq!(h.session.setting("power_on_behavior"), Some(Value::from("previous")));
}

#[tokio::test]
async fn test_rejected_writes_never_reach_radio() {
    let mut h = tuya_light().ready().await;

    assert!(matches!(
        h.session
            .on_capability_write_requested("dim", Value::Float(1.5))
            .await,
        Err(EngineError::TransformRejected { .. })
    ));
    assert!(matches!(
        h.session
            .on_capability_write_requested("measure_power", Value::Float(21.0))
            .await,
        Err(EngineError::NotWritable(_))
    ));
    assert!(matches!(
        h.session
            .on_capability_write_requested("speaker_volume", Value::Float(0.5))
            .await,
        Err(EngineError::UnknownCapability(_))
    ));
    assert!(matches!(
        h.session
            .on_capability_write_requested("onoff", Value::from("yes"))
            .await,
        Err(EngineError::TransformRejected { .. })
    ));
    assert!(h.radio.data_point_writes().is_empty());
}

#[tokio::test]
async fn test_write_before_ready_rejected() {
    let mut h = tuya_light();
    assert!(matches!(
        h.session
            .on_capability_write_requested("onoff", Value::Boolean(true))
            .await,
        Err(EngineError::InvalidState { .. })
    ));
    assert!(h.radio.calls().is_empty());
}

#[tokio::test]
async fn test_failed_write_leaves_store_unchanged() {
    let mut h = tuya_light().ready().await;
    h.radio.emit_data_point(1, DataPoint::bool(1, false));
    h.settle().await;
    let mut health = h.bus.health_events();

    h.radio.fail_writes(1, RadioError::Nack(0x01));
    let result = h
        .session
        .on_capability_write_requested("onoff", Value::Boolean(true))
        .await;

    assert!(matches!(result, Err(EngineError::WriteFailed { .. })));
    assert_eq!(h.session.capability_value("onoff"), Some(Value::Boolean(false)));
    assert!(health.drain().iter().any(|e| matches!(
        e,
        EngineEvent::WriteFailed { capability, .. } if capability == "onoff"
    )));

    // The next write goes through
    h.session
        .on_capability_write_requested("onoff", Value::Boolean(true))
        .await
        .unwrap();
    assert_eq!(h.session.capability_value("onoff"), Some(Value::Boolean(true)));
}

#[tokio::test]
async fn test_write_timeout_reported() {
    let mut h = tuya_light().ready().await;
    h.radio.set_write_latency(Duration::from_secs(2));

    let result = h
        .session
        .on_capability_write_requested("onoff", Value::Boolean(true))
        .await;

    assert!(matches!(result, Err(EngineError::WriteFailed { .. })));
    assert_eq!(h.session.capability_value("onoff"), None);
}

#[tokio::test]
async fn test_teardown_abandons_inflight_write() {
    let mut h = tuya_light().ready().await;
    h.radio.set_write_latency(Duration::from_millis(150));

    let trigger = h.session.shutdown_trigger();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();
    });

    let result = h
        .session
        .on_capability_write_requested("onoff", Value::Boolean(true))
        .await;
    assert!(matches!(result, Err(EngineError::Cancelled)));

    // Give the radio time to acknowledge the abandoned write
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.session.capability_value("onoff"), None);

    h.session.terminate().await;
    assert_eq!(h.session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_terminate_releases_listeners() {
    let mut h = tuya_light().ready().await;
    assert!(h.radio.active_listeners() > 0);

    h.session.terminate().await;
    h.session.terminate().await;

    assert_eq!(h.session.state(), SessionState::Terminated);
    assert_eq!(h.radio.active_listeners(), 0);
    let removed = h
        .radio
        .calls()
        .iter()
        .filter(|c| matches!(c, RadioCall::RemoveListener(_)))
        .count();
    assert_eq!(removed, h.session.binding_report().unwrap().all_listeners().count());

    // Reports after teardown reach nobody
    assert_eq!(h.radio.emit_data_point(1, DataPoint::bool(1, true)), 0);
    assert_eq!(h.session.process_pending().await, 0);
    assert_eq!(h.session.capability_value("onoff"), None);
}

#[tokio::test]
async fn test_lifecycle_events() {
    let mut h = tuya_light();
    let mut health = h.bus.health_events();
    h = h.ready().await;
    h.session.terminate().await;

    let transitions: Vec<(String, String)> = health
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::SessionStateChanged { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    let expected = [
        ("uninitialized", "endpoint_selected"),
        ("endpoint_selected", "binding"),
        ("binding", "ready"),
        ("ready", "terminated"),
    ];
    assert_eq!(
        transitions,
        expected
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect::<Vec<_>>()
    );
}

// ========== Spawned sessions ==========

async fn wait_for_value(handle: &zigbridge_devices::SessionHandle, capability: &str) -> Option<Value> {
    for _ in 0..100 {
        if let Some(value) = handle.capability_value(capability) {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

#[tokio::test]
async fn test_spawned_session() {
    zigbridge_testing::init_test_logging();
    let fingerprint = fingerprints::tuya_light();
    let radio = Arc::new(MockRadio::new(endpoints::tuya()).with_basic(1, &fingerprint));
    let bus = Arc::new(EventBus::new());
    let session = DeviceSession::new("light-1", &fingerprint, radio.shared(), bus.clone(), test_config());

    let mut handle = session.spawn();
    assert_eq!(handle.device_id(), "light-1");
    assert_eq!(handle.wait_ready().await, SessionState::Ready);

    radio.emit_data_point(1, DataPoint::value(3, 750));
    assert_eq!(wait_for_value(&handle, "dim").await, Some(Value::Float(0.75)));

    handle.write("dim", 0.2).await.unwrap();
    assert_eq!(radio.data_point_writes(), vec![DataPoint::value(3, 200)]);
    assert_eq!(handle.capability_value("dim"), Some(Value::Float(0.2)));

    handle.set_setting("light_mode", "colour").await.unwrap();
    assert_eq!(handle.setting("light_mode"), Some(Value::from("colour")));

    assert!(matches!(
        handle.write("speaker_volume", 0.5).await,
        Err(EngineError::UnknownCapability(_))
    ));

    handle.terminate().await;
    assert_eq!(radio.active_listeners(), 0);
}

#[tokio::test]
async fn test_spawned_session_failing_initialization() {
    let radio = Arc::new(MockRadio::new(Vec::new()));
    let bus = Arc::new(EventBus::new());
    let session = DeviceSession::new(
        "ghost",
        &fingerprints::unknown(),
        radio.shared(),
        bus,
        test_config(),
    );

    let mut handle = session.spawn();
    assert_eq!(handle.wait_ready().await, SessionState::Terminated);
    assert!(handle.write("onoff", true).await.is_err());
    handle.terminate().await;
}

#[tokio::test]
async fn test_spawned_session_stops_on_shutdown() {
    let fingerprint = fingerprints::tuya_light();
    let radio = Arc::new(MockRadio::new(endpoints::tuya()).with_basic(1, &fingerprint));
    let bus = Arc::new(EventBus::new());
    let session = DeviceSession::new("light-2", &fingerprint, radio.shared(), bus, test_config());

    let mut handle = session.spawn();
    assert_eq!(handle.wait_ready().await, SessionState::Ready);
    assert!(radio.active_listeners() > 0);

    handle.shutdown_trigger().trigger();
    for _ in 0..100 {
        if handle.state() == SessionState::Terminated {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(handle.state(), SessionState::Terminated);
    assert_eq!(radio.active_listeners(), 0);
    assert!(handle.write("onoff", true).await.is_err());
}

// ========== Endpoint scoping ==========

#[tokio::test]
async fn test_event_from_other_endpoint_dropped() {
    let mut h = plug().ready().await;
    let onoff = AttributeRef::new(ClusterId::ON_OFF, attr::on_off::ON_OFF);

    h.radio.emit_attribute(1, onoff, true);
    h.settle().await;
    assert_eq!(h.session.capability_value("onoff"), Some(Value::Boolean(true)));
    h.events.drain();

    assert!(h.session.sink().deliver(InboundEvent::attribute(2, onoff, 0i64)));
    assert_eq!(h.settle().await, 1);
    assert_eq!(h.session.capability_value("onoff"), Some(Value::Boolean(true)));
    assert!(h.events.drain().iter().all(|e| !e.is_value_event()));

    assert!(matches!(
        h.session
            .handle_inbound(InboundEvent::data_point(2, DataPoint::bool(1, false)))
            .await,
        Err(EngineError::UnknownSource(_))
    ));
    assert_eq!(h.session.capability_value("onoff"), Some(Value::Boolean(true)));
}

// ========== Value representation ==========

#[tokio::test]
async fn test_integer_write_echo_matches_stored_float() {
    let mut h = tuya_light().ready().await;
    h.radio.emit_data_point(1, DataPoint::value(3, 1000));
    h.settle().await;
    assert_eq!(h.session.capability_value("dim"), Some(Value::Float(1.0)));
    h.events.drain();

    h.session
        .on_capability_write_requested("dim", Value::Integer(1))
        .await
        .unwrap();

    assert_eq!(h.radio.data_point_writes(), vec![DataPoint::value(3, 1000)]);
    assert_eq!(h.session.capability_value("dim"), Some(Value::Float(1.0)));
    assert!(h
        .events
        .drain()
        .iter()
        .all(|e| !matches!(e, EngineEvent::CapabilityChanged { .. })));
}
