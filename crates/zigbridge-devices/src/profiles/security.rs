//! IAS zone sensors: PIR motion and door/window contacts.

use zigbridge_core::ValueType;

use super::{DeviceProfile, IasZoneQuirk, Quirks};
use crate::datapoint::{DataPointEntry, DataPointTable, DpTransform, DpType};
use crate::zcl::mapping::IAS_ALARM_1;
use crate::zcl::{attr, ClusterId, MappingEntry, ZclOverride};

const SENSITIVITY: &[(i64, &str)] = &[(0, "low"), (1, "medium"), (2, "high")];

const KEEP_TIME: &[(i64, &str)] = &[(0, "30s"), (1, "60s"), (2, "120s")];

const DEFAULT_ZONE: IasZoneQuirk = IasZoneQuirk { zone_id: 10 };

fn ias_quirks() -> Quirks {
    Quirks {
        ias_zone: Some(DEFAULT_ZONE),
        ..Quirks::default()
    }
}

pub(super) fn motion_sensor() -> DeviceProfile {
    let overrides = [ZclOverride::Replace(
        MappingEntry::capability(
            ClusterId::IAS_ZONE,
            attr::ias::ZONE_STATUS,
            "zoneStatus",
            "alarm_motion",
            IAS_ALARM_1,
            ValueType::Bool,
        )
        .reporting(0, 3600, 1),
    )];

    // PIR state is an enum where 0 means presence
    let table = DataPointTable::new([
        DataPointEntry::capability(1, "alarm_motion", DpType::Enum, ValueType::Bool)
            .transform(DpTransform::Invert),
        DataPointEntry::capability(4, "measure_battery", DpType::Value, ValueType::Float)
            .range(0.0, 100.0),
        DataPointEntry::setting(9, "sensitivity", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(SENSITIVITY))
            .writable(),
        DataPointEntry::setting(10, "keep_time", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(KEEP_TIME))
            .writable(),
        DataPointEntry::capability(12, "measure_luminance", DpType::Value, ValueType::Float)
            .range(0.0, 100_000.0),
    ]);

    DeviceProfile::build("motion_sensor", &overrides, table, ias_quirks())
}

pub(super) fn contact_sensor() -> DeviceProfile {
    let table = DataPointTable::new([
        DataPointEntry::capability(1, "alarm_contact", DpType::Bool, ValueType::Bool)
            .transform(DpTransform::Bool),
        DataPointEntry::capability(2, "measure_battery", DpType::Value, ValueType::Float)
            .range(0.0, 100.0),
    ]);

    DeviceProfile::build("contact_sensor", &[], table, ias_quirks())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::Normalized;
    use crate::zcl::AttributeRef;
    use zigbridge_core::Value;

    #[test]
    fn test_motion_zone_status_override() {
        let profile = motion_sensor();
        let entry = profile
            .zcl
            .lookup(&AttributeRef::new(ClusterId::IAS_ZONE, attr::ias::ZONE_STATUS))
            .unwrap();
        assert_eq!(entry.capability, Some("alarm_motion"));
        assert_eq!(entry.normalize(&Value::Integer(0x0021)).unwrap(), Value::Boolean(true));
        assert_eq!(profile.quirks.ias_zone, Some(IasZoneQuirk { zone_id: 10 }));
    }

    #[test]
    fn test_pir_state_inverted() {
        let profile = motion_sensor();
        let entry = profile.datapoints.lookup(1).unwrap();
        assert_eq!(
            entry.normalize(&Value::Integer(0)).unwrap(),
            Normalized::Single(Value::Boolean(true))
        );
        assert_eq!(
            entry.normalize(&Value::Integer(1)).unwrap(),
            Normalized::Single(Value::Boolean(false))
        );
    }
}
