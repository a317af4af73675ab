//! Tuya lights and dimmers.
//!
//! Light firmware comes in two generations with separate DataPoint ranges:
//! v1 uses 1..=5 and v2 uses 20..=24. Both are declared as aliases.

use zigbridge_core::ValueType;

use super::{DeviceProfile, Quirks};
use crate::datapoint::{DataPointEntry, DataPointTable, DpTransform, DpType};

const LIGHT_MODE: &[(i64, &str)] = &[(0, "white"), (1, "colour"), (2, "scene"), (3, "music")];

const POWER_ON_BEHAVIOR: &[(i64, &str)] = &[(0, "off"), (1, "on"), (2, "previous")];

fn onoff(dp: u8) -> DataPointEntry {
    DataPointEntry::capability(dp, "onoff", DpType::Bool, ValueType::Bool)
        .transform(DpTransform::Bool)
        .writable()
}

fn dim(dp: u8) -> DataPointEntry {
    DataPointEntry::capability(dp, "dim", DpType::Value, ValueType::Float)
        .divisor(1000.0)
        .range(0.0, 1.0)
        .writable()
}

pub(super) fn light() -> DeviceProfile {
    let mut entries = Vec::new();
    for base in [1u8, 20] {
        entries.extend([
            onoff(base),
            DataPointEntry::setting(base + 1, "light_mode", DpType::Enum, ValueType::Enum)
                .transform(DpTransform::EnumMap(LIGHT_MODE))
                .writable(),
            dim(base + 2),
            DataPointEntry::capability(base + 3, "light_temperature", DpType::Value, ValueType::Float)
                .divisor(1000.0)
                .range(0.0, 1.0)
                .writable(),
            DataPointEntry::hsv(base + 4),
        ]);
    }
    entries.push(
        DataPointEntry::setting(26, "power_on_behavior", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(POWER_ON_BEHAVIOR))
            .writable(),
    );

    DeviceProfile::build("light", &[], DataPointTable::new(entries), Quirks::default())
}

pub(super) fn dimmer() -> DeviceProfile {
    let table = DataPointTable::new([
        onoff(1),
        dim(2),
        dim(3),
        DataPointEntry::setting(14, "power_on_behavior", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(POWER_ON_BEHAVIOR))
            .writable(),
    ]);

    DeviceProfile::build("dimmer", &[], table, Quirks::default())
}
