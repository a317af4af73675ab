use std::sync::Arc;

use serde::Serialize;
use zigbridge_core::{EngineError, Result, Value};

use crate::datapoint::{DataPoint, DataPointEntry, DpTransform, HsvColor, HSV_CAPABILITIES};
use crate::endpoint::EndpointDescriptor;
use crate::profiles::SharedProfile;
use crate::store::{CapabilityStore, Slot};
use crate::validation;
use crate::zcl::{ClusterId, MappingEntry, ZclCommand};

/// Where a write goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum WriteTarget {
    Zcl {
        cluster: ClusterId,
        command: ZclCommand,
    },
    DataPoint(DataPoint),
}

/// A resolved host write: the radio request plus the values to echo into
/// the store once the device acknowledges it.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub target: WriteTarget,
    pub echo: Vec<(Slot, Value)>,
}

/// Resolves host writes to radio requests.
#[derive(Clone)]
pub struct OutboundDispatcher {
    profile: SharedProfile,
    endpoint: EndpointDescriptor,
    store: Arc<CapabilityStore>,
}

impl OutboundDispatcher {
    pub fn new(
        profile: SharedProfile,
        endpoint: EndpointDescriptor,
        store: Arc<CapabilityStore>,
    ) -> Self {
        Self {
            profile,
            endpoint,
            store,
        }
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// Plan a capability write.
    ///
    /// A ZCL mapping whose cluster is on the primary endpoint wins; otherwise
    /// the DataPoint alias that last reported the capability, else the
    /// lowest writable index.
    pub fn plan(&self, capability: &str, value: &Value) -> Result<WritePlan> {
        let has_cluster = |c: ClusterId| self.endpoint.has_cluster(c);

        if let Some(entry) = self.profile.zcl.writable_for(capability, has_cluster) {
            return self.plan_zcl(capability, entry, value);
        }

        let preferred = self.store.last_source(capability);
        if let Some(entry) = self.profile.datapoints.writable_for(capability, preferred) {
            return self.plan_data_point(capability, entry, value);
        }

        let known = self.profile.zcl.capabilities().contains(capability)
            || !self.profile.datapoints.aliases(capability).is_empty();
        if known {
            Err(EngineError::NotWritable(capability.to_string()))
        } else {
            Err(EngineError::UnknownCapability(capability.to_string()))
        }
    }

    /// Plan a write to an internal setting.
    pub fn plan_setting(&self, key: &str, value: &Value) -> Result<WritePlan> {
        let has_cluster = |c: ClusterId| self.endpoint.has_cluster(c);

        if let Some(entry) = self.profile.zcl.writable_setting(key, has_cluster) {
            return self.plan_zcl(key, entry, value);
        }
        if let Some(entry) = self.profile.datapoints.writable_setting(key) {
            return self.plan_data_point(key, entry, value);
        }

        let known = self.profile.zcl.iter().any(|e| e.internal_key == Some(key))
            || self.profile.datapoints.iter().any(|e| e.internal_key == Some(key));
        if known {
            Err(EngineError::NotWritable(key.to_string()))
        } else {
            Err(EngineError::UnknownCapability(key.to_string()))
        }
    }

    fn plan_zcl(&self, name: &str, entry: &MappingEntry, value: &Value) -> Result<WritePlan> {
        let value = &validation::conform(value.clone(), entry.value_type, entry.range)
            .map_err(|reason| EngineError::rejected(name, reason))?;

        let command = entry
            .write
            .as_ref()
            .ok_or_else(|| EngineError::NotWritable(name.to_string()))?
            .encode(entry.source.attribute, value)
            .map_err(|reason| EngineError::rejected(name, reason))?;

        Ok(WritePlan {
            target: WriteTarget::Zcl {
                cluster: entry.source.cluster,
                command,
            },
            echo: vec![(entry.slot(), value.clone())],
        })
    }

    fn plan_data_point(
        &self,
        name: &str,
        entry: &DataPointEntry,
        value: &Value,
    ) -> Result<WritePlan> {
        let value = &validation::conform(value.clone(), entry.value_type, entry.range)
            .map_err(|reason| EngineError::rejected(name, reason))?;

        if entry.transform == DpTransform::Hsv {
            return self.plan_hsv(name, entry.dp, value);
        }

        let datapoint = entry
            .encode(value)
            .map_err(|reason| EngineError::rejected(name, reason))?;
        let slot = entry
            .slot()
            .ok_or_else(|| EngineError::NotWritable(name.to_string()))?;

        Ok(WritePlan {
            target: WriteTarget::DataPoint(datapoint),
            echo: vec![(slot, value.clone())],
        })
    }

    /// Colour DataPoints carry all three components, so the two not being
    /// written come from the store. Unknown components default to full.
    fn plan_hsv(&self, name: &str, dp: u8, value: &Value) -> Result<WritePlan> {
        let capability = HSV_CAPABILITIES
            .iter()
            .copied()
            .find(|c| *c == name)
            .ok_or_else(|| EngineError::NotWritable(name.to_string()))?;
        let written = validation::number(value).map_err(|reason| EngineError::rejected(name, reason))?;

        let component = |c: &str| {
            if c == capability {
                written
            } else {
                self.store
                    .capability(c)
                    .and_then(|v| v.as_f64())
                    .unwrap_or(1.0)
            }
        };
        let color = HsvColor::from_normalized(
            component(HSV_CAPABILITIES[0]),
            component(HSV_CAPABILITIES[1]),
            component(HSV_CAPABILITIES[2]),
        );

        Ok(WritePlan {
            target: WriteTarget::DataPoint(DataPoint::string(dp, &color.encode())),
            echo: vec![(Slot::Capability(capability), value.clone())],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::{DataPointTable, DpType};
    use crate::profiles::{DeviceProfile, Quirks};
    use crate::zcl::CapabilityMappingTable;
    use zigbridge_core::ValueType;

    fn profile() -> SharedProfile {
        Arc::new(DeviceProfile {
            name: "test",
            zcl: CapabilityMappingTable::standard().clone(),
            datapoints: DataPointTable::new([
                DataPointEntry::capability(1, "onoff", DpType::Bool, ValueType::Bool)
                    .transform(DpTransform::Bool)
                    .writable(),
                DataPointEntry::capability(2, "dim", DpType::Value, ValueType::Float)
                    .divisor(1000.0)
                    .range(0.0, 1.0)
                    .writable(),
                DataPointEntry::capability(3, "dim", DpType::Value, ValueType::Float)
                    .divisor(1000.0)
                    .range(0.0, 1.0)
                    .writable(),
                DataPointEntry::hsv(5),
                DataPointEntry::capability(18, "measure_power", DpType::Value, ValueType::Float)
                    .divisor(10.0),
                DataPointEntry::setting(7, "child_lock", DpType::Bool, ValueType::Bool).writable(),
                DataPointEntry::setting(9, "frequency", DpType::Value, ValueType::Float),
            ]),
            quirks: Quirks::default(),
        })
    }

    fn tuya_only(store: Arc<CapabilityStore>) -> OutboundDispatcher {
        OutboundDispatcher::new(
            profile(),
            EndpointDescriptor::new(1, [ClusterId::BASIC, ClusterId::TUYA_PRIVATE]),
            store,
        )
    }

    #[test]
    fn test_zcl_preferred_when_cluster_present() {
        let dispatcher = OutboundDispatcher::new(
            profile(),
            EndpointDescriptor::new(1, [ClusterId::ON_OFF, ClusterId::TUYA_PRIVATE]),
            Arc::new(CapabilityStore::new()),
        );
        let plan = dispatcher.plan("onoff", &Value::Boolean(true)).unwrap();
        assert_eq!(
            plan.target,
            WriteTarget::Zcl {
                cluster: ClusterId::ON_OFF,
                command: ZclCommand::On
            }
        );
    }

    #[test]
    fn test_data_point_fallback() {
        let store = Arc::new(CapabilityStore::new());
        let dispatcher = tuya_only(store.clone());

        let plan = dispatcher.plan("dim", &Value::Float(0.2)).unwrap();
        assert_eq!(plan.target, WriteTarget::DataPoint(DataPoint::value(2, 200)));
        assert_eq!(plan.echo, vec![(Slot::Capability("dim"), Value::Float(0.2))]);

        // The alias that reported last receives the write
        store.record_source("dim", 3);
        let plan = dispatcher.plan("dim", &Value::Float(0.2)).unwrap();
        assert_eq!(plan.target, WriteTarget::DataPoint(DataPoint::value(3, 200)));
    }

    #[test]
    fn test_hsv_write_keeps_other_components() {
        let store = Arc::new(CapabilityStore::new());
        store.set_capability("light_saturation", Value::Float(0.5));
        store.set_capability("dim", Value::Float(1.0));
        let dispatcher = tuya_only(store);

        let plan = dispatcher.plan("light_hue", &Value::Float(0.5)).unwrap();
        assert_eq!(
            plan.target,
            WriteTarget::DataPoint(DataPoint::string(5, "00b401f403e8"))
        );
    }

    #[test]
    fn test_invalid_writes() {
        let dispatcher = tuya_only(Arc::new(CapabilityStore::new()));
        assert!(matches!(
            dispatcher.plan("dim", &Value::Float(1.5)),
            Err(EngineError::TransformRejected { .. })
        ));
        assert!(matches!(
            dispatcher.plan("measure_power", &Value::Float(1.0)),
            Err(EngineError::NotWritable(_))
        ));
        assert!(matches!(
            dispatcher.plan("speaker_volume", &Value::Float(1.0)),
            Err(EngineError::UnknownCapability(_))
        ));
    }

    #[test]
    fn test_setting_writes() {
        let dispatcher = tuya_only(Arc::new(CapabilityStore::new()));
        let plan = dispatcher
            .plan_setting("child_lock", &Value::Boolean(true))
            .unwrap();
        assert_eq!(plan.target, WriteTarget::DataPoint(DataPoint::bool(7, true)));
        assert_eq!(plan.echo, vec![(Slot::Setting("child_lock"), Value::Boolean(true))]);

        assert!(matches!(
            dispatcher.plan_setting("frequency", &Value::Float(50.0)),
            Err(EngineError::NotWritable(_))
        ));
        assert!(matches!(
            dispatcher.plan_setting("nonexistent", &Value::Float(50.0)),
            Err(EngineError::UnknownCapability(_))
        ));
    }
}
