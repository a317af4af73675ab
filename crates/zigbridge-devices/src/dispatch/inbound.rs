use std::sync::Arc;

use zigbridge_core::event::now_millis;
use zigbridge_core::{EngineError, EngineEvent, Result, SharedEventBus, Value};

use crate::datapoint::{DataPoint, Normalized};
use crate::profiles::SharedProfile;
use crate::radio::{InboundEvent, InboundPayload};
use crate::store::{CapabilityStore, Slot, StoreUpdate};
use crate::zcl::AttributeRef;

/// One value written into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub slot: Slot,
    pub value: Value,
    pub update: StoreUpdate,
}

/// Resolves inbound events against the device profile and updates the store.
#[derive(Clone)]
pub struct InboundDispatcher {
    device_id: String,
    profile: SharedProfile,
    store: Arc<CapabilityStore>,
    bus: SharedEventBus,
}

impl InboundDispatcher {
    pub fn new(
        device_id: impl Into<String>,
        profile: SharedProfile,
        store: Arc<CapabilityStore>,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            profile,
            store,
            bus,
        }
    }

    /// Translate one event. Errors are per-event and never poison the session.
    pub async fn dispatch(&self, event: &InboundEvent) -> Result<Vec<Applied>> {
        match &event.payload {
            InboundPayload::Attribute { source, value } => {
                self.dispatch_attribute(source, value).await.map(|a| vec![a])
            }
            InboundPayload::DataPoint(dp) => self.dispatch_data_point(dp).await,
        }
    }

    pub async fn dispatch_attribute(&self, source: &AttributeRef, raw: &Value) -> Result<Applied> {
        let Some(entry) = self.profile.zcl.lookup(source) else {
            tracing::debug!(device_id = %self.device_id, %source, "Unmapped attribute dropped");
            return Err(EngineError::UnknownSource(source.to_string()));
        };

        let value = entry.normalize(raw).map_err(|reason| {
            tracing::warn!(
                device_id = %self.device_id,
                %source,
                raw = %raw,
                %reason,
                "Attribute value rejected"
            );
            EngineError::rejected(source.to_string(), reason)
        })?;

        Ok(self.apply(entry.slot(), value, None).await)
    }

    pub async fn dispatch_data_point(&self, dp: &DataPoint) -> Result<Vec<Applied>> {
        let label = format!("dp {}", dp.dp);
        let Some(entry) = self.profile.datapoints.lookup(dp.dp) else {
            tracing::debug!(device_id = %self.device_id, dp = dp.dp, "Unmapped DataPoint dropped");
            return Err(EngineError::UnknownSource(label));
        };

        let raw = dp.decode_value().map_err(|e| {
            tracing::warn!(device_id = %self.device_id, dp = dp.dp, error = %e, "Malformed DataPoint");
            EngineError::from(e)
        })?;

        let normalized = entry.normalize(&raw).map_err(|reason| {
            tracing::warn!(
                device_id = %self.device_id,
                dp = dp.dp,
                raw = %raw,
                %reason,
                "DataPoint value rejected"
            );
            EngineError::rejected(label.clone(), reason)
        })?;

        match normalized {
            Normalized::Single(value) => {
                let slot = entry
                    .slot()
                    .ok_or_else(|| EngineError::UnknownSource(label.clone()))?;
                Ok(vec![self.apply(slot, value, Some(dp.dp)).await])
            }
            Normalized::Composite(values) => {
                let mut applied = Vec::with_capacity(values.len());
                for (capability, value) in values {
                    applied.push(
                        self.apply(Slot::Capability(capability), value, Some(dp.dp))
                            .await,
                    );
                }
                Ok(applied)
            }
        }
    }

    /// Write a validated value and notify the host when it changed.
    pub(crate) async fn apply(&self, slot: Slot, value: Value, dp: Option<u8>) -> Applied {
        let update = match slot {
            Slot::Capability(name) => {
                if let Some(dp) = dp {
                    self.store.record_source(name, dp);
                }
                self.store.set_capability(name, value.clone())
            }
            Slot::Setting(key) => self.store.set_setting(key, value.clone()),
        };

        if update.should_notify() {
            tracing::debug!(
                device_id = %self.device_id,
                slot = slot.name(),
                value = %value,
                "Value updated"
            );
            let event = match slot {
                Slot::Capability(name) => EngineEvent::CapabilityChanged {
                    device_id: self.device_id.clone(),
                    capability: name.to_string(),
                    value: value.clone(),
                    previous: update.previous().cloned(),
                    timestamp: now_millis(),
                },
                Slot::Setting(key) => EngineEvent::SettingChanged {
                    device_id: self.device_id.clone(),
                    key: key.to_string(),
                    value: value.clone(),
                    timestamp: now_millis(),
                },
            };
            self.bus.publish_with_source(event, "inbound").await;
        }

        Applied {
            slot,
            value,
            update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::{DataPointEntry, DataPointTable, DpTransform, DpType};
    use crate::profiles::{DeviceProfile, Quirks};
    use crate::zcl::{attr, CapabilityMappingTable, ClusterId};
    use zigbridge_core::{EventBus, ValueType};

    fn dispatcher() -> (InboundDispatcher, Arc<CapabilityStore>, SharedEventBus) {
        let profile = DeviceProfile {
            name: "test",
            zcl: CapabilityMappingTable::standard().clone(),
            datapoints: DataPointTable::new([
                DataPointEntry::capability(1, "onoff", DpType::Bool, ValueType::Bool)
                    .transform(DpTransform::Bool),
                DataPointEntry::capability(2, "dim", DpType::Value, ValueType::Float)
                    .divisor(1000.0)
                    .range(0.0, 1.0),
                DataPointEntry::capability(3, "dim", DpType::Value, ValueType::Float)
                    .divisor(1000.0)
                    .range(0.0, 1.0),
                DataPointEntry::hsv(5),
                DataPointEntry::setting(7, "child_lock", DpType::Bool, ValueType::Bool),
            ]),
            quirks: Quirks::default(),
        };
        let store = Arc::new(CapabilityStore::new());
        let bus = Arc::new(EventBus::new());
        (
            InboundDispatcher::new("dev-1", Arc::new(profile), store.clone(), bus.clone()),
            store,
            bus,
        )
    }

    #[tokio::test]
    async fn test_dual_protocol_convergence() {
        let (dispatcher, store, _bus) = dispatcher();
        dispatcher
            .dispatch(&InboundEvent::data_point(1, DataPoint::bool(1, true)))
            .await
            .unwrap();
        assert_eq!(store.capability("onoff"), Some(Value::Boolean(true)));

        dispatcher
            .dispatch(&InboundEvent::attribute(
                1,
                AttributeRef::new(ClusterId::ON_OFF, attr::on_off::ON_OFF),
                0i64,
            ))
            .await
            .unwrap();
        assert_eq!(store.capability("onoff"), Some(Value::Boolean(false)));
    }

    #[tokio::test]
    async fn test_single_notification_for_repeated_value() {
        let (dispatcher, _store, bus) = dispatcher();
        let mut rx = bus.value_events();
        let event = InboundEvent::data_point(1, DataPoint::value(3, 750));

        let first = dispatcher.dispatch(&event).await.unwrap();
        let second = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(first[0].update, StoreUpdate::First);
        assert_eq!(second[0].update, StoreUpdate::Unchanged);

        let events = rx.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            EngineEvent::CapabilityChanged { capability, value, .. }
                if capability == "dim" && *value == Value::Float(0.75)
        ));
    }

    #[tokio::test]
    async fn test_last_alias_wins() {
        let (dispatcher, store, _bus) = dispatcher();
        dispatcher
            .dispatch_data_point(&DataPoint::value(3, 900))
            .await
            .unwrap();
        dispatcher
            .dispatch_data_point(&DataPoint::value(2, 100))
            .await
            .unwrap();
        assert_eq!(store.capability("dim"), Some(Value::Float(0.1)));
        assert_eq!(store.last_source("dim"), Some(2));
    }

    #[tokio::test]
    async fn test_settings_do_not_surface() {
        let (dispatcher, store, bus) = dispatcher();
        let mut rx = bus.subscribe();
        dispatcher
            .dispatch_data_point(&DataPoint::bool(7, true))
            .await
            .unwrap();
        assert!(!store.has_capability("child_lock"));
        assert_eq!(store.setting("child_lock"), Some(Value::Boolean(true)));
        assert_eq!(rx.drain()[0].type_name(), "SettingChanged");
    }

    #[tokio::test]
    async fn test_rejections_leave_store_untouched() {
        let (dispatcher, store, _bus) = dispatcher();

        let humidity = AttributeRef::new(ClusterId::HUMIDITY_MEASUREMENT, attr::MEASURED_VALUE);
        let err = dispatcher
            .dispatch_attribute(&humidity, &Value::Integer(15000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TransformRejected { .. }));

        let short = DataPoint::string(5, "00F0");
        assert!(dispatcher.dispatch_data_point(&short).await.is_err());

        let truncated = DataPoint {
            dp: 2,
            dp_type: DpType::Value,
            data: vec![0x01],
        };
        assert!(matches!(
            dispatcher.dispatch_data_point(&truncated).await,
            Err(EngineError::Codec(_))
        ));

        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sources() {
        let (dispatcher, _store, _bus) = dispatcher();
        assert!(matches!(
            dispatcher.dispatch_data_point(&DataPoint::bool(99, true)).await,
            Err(EngineError::UnknownSource(_))
        ));
        let unknown = AttributeRef::new(ClusterId(0xFC00), 0x0001);
        assert!(matches!(
            dispatcher.dispatch_attribute(&unknown, &Value::Integer(1)).await,
            Err(EngineError::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn test_hsv_fans_out() {
        let (dispatcher, store, _bus) = dispatcher();
        let applied = dispatcher
            .dispatch_data_point(&DataPoint::string(5, "000f03e803e8"))
            .await
            .unwrap();
        assert_eq!(applied.len(), 3);
        let hue = store.capability("light_hue").unwrap().as_f64().unwrap();
        assert!((hue - 15.0 / 360.0).abs() < 1e-9);
        assert_eq!(store.capability("light_saturation"), Some(Value::Float(1.0)));
        assert_eq!(store.capability("dim"), Some(Value::Float(1.0)));
        assert_eq!(store.last_source("light_hue"), Some(5));
    }
}
