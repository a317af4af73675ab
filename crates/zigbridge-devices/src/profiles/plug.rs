//! Smart plugs and DIN-rail meters.

use zigbridge_core::ValueType;

use super::{DeviceProfile, Quirks};
use crate::datapoint::{DataPointEntry, DataPointTable, DpTransform, DpType};

const POWER_ON_BEHAVIOR: &[(i64, &str)] = &[(0, "off"), (1, "on"), (2, "previous")];

const INDICATOR_MODE: &[(i64, &str)] = &[(0, "off"), (1, "status"), (2, "position")];

pub(super) fn plug() -> DeviceProfile {
    let table = DataPointTable::new([
        DataPointEntry::capability(1, "onoff", DpType::Bool, ValueType::Bool)
            .transform(DpTransform::Bool)
            .writable(),
        DataPointEntry::setting(7, "child_lock", DpType::Bool, ValueType::Bool).writable(),
        DataPointEntry::setting(11, "countdown", DpType::Value, ValueType::Int)
            .range(0.0, 86_400.0)
            .writable(),
        DataPointEntry::setting(14, "power_on_behavior", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(POWER_ON_BEHAVIOR))
            .writable(),
        DataPointEntry::capability(17, "measure_current", DpType::Value, ValueType::Float)
            .divisor(1000.0)
            .range(0.0, 100.0),
        DataPointEntry::capability(18, "measure_power", DpType::Value, ValueType::Float)
            .divisor(10.0),
        DataPointEntry::capability(19, "measure_voltage", DpType::Value, ValueType::Float)
            .divisor(10.0)
            .range(0.0, 500.0),
        DataPointEntry::capability(20, "meter_power", DpType::Value, ValueType::Float)
            .divisor(100.0)
            .range(0.0, f64::MAX),
        DataPointEntry::setting(21, "frequency", DpType::Value, ValueType::Float).divisor(100.0),
        DataPointEntry::setting(26, "indicator_mode", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(INDICATOR_MODE))
            .writable(),
        DataPointEntry::setting(27, "indicator_mode", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(INDICATOR_MODE)),
        DataPointEntry::setting(101, "power_factor", DpType::Value, ValueType::Float)
            .divisor(100.0),
        DataPointEntry::setting(121, "power_on_behavior", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(POWER_ON_BEHAVIOR)),
    ]);

    DeviceProfile::build("plug", &[], table, Quirks::default())
}
