//! Temperature/humidity sensors and radiator thermostats.

use zigbridge_core::ValueType;

use super::{DeviceProfile, Quirks};
use crate::datapoint::{DataPointEntry, DataPointTable, DpTransform, DpType};

/// Coarse battery state reported by some sensors instead of a percentage.
const BATTERY_LEVEL: &[(i64, f64)] = &[(0, 10.0), (1, 50.0), (2, 100.0)];

const TEMPERATURE_UNIT: &[(i64, &str)] = &[(0, "celsius"), (1, "fahrenheit")];

const SYSTEM_MODE: &[(i64, &str)] = &[(0, "auto"), (1, "heat"), (2, "off")];

fn temperature(dp: u8) -> DataPointEntry {
    DataPointEntry::capability(dp, "measure_temperature", DpType::Value, ValueType::Float)
        .divisor(10.0)
        .range(-50.0, 150.0)
}

fn battery(dp: u8) -> DataPointEntry {
    DataPointEntry::capability(dp, "measure_battery", DpType::Value, ValueType::Float)
        .range(0.0, 100.0)
}

pub(super) fn climate_sensor() -> DeviceProfile {
    let table = DataPointTable::new([
        temperature(1),
        DataPointEntry::capability(2, "measure_humidity", DpType::Value, ValueType::Float)
            .range(0.0, 100.0),
        DataPointEntry::capability(3, "measure_battery", DpType::Enum, ValueType::Float)
            .transform(DpTransform::Lookup(BATTERY_LEVEL)),
        battery(4),
        DataPointEntry::setting(9, "temperature_unit", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(TEMPERATURE_UNIT))
            .writable(),
        battery(15),
    ]);

    DeviceProfile::build(
        "climate_sensor",
        &[],
        table,
        Quirks {
            query_datapoints_on_bind: true,
            ..Quirks::default()
        },
    )
}

pub(super) fn thermostat() -> DeviceProfile {
    let table = DataPointTable::new([
        DataPointEntry::setting(1, "system_mode", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(SYSTEM_MODE))
            .writable(),
        DataPointEntry::capability(2, "target_temperature", DpType::Value, ValueType::Float)
            .divisor(10.0)
            .range(5.0, 35.0)
            .writable(),
        temperature(3),
        DataPointEntry::setting(7, "child_lock", DpType::Bool, ValueType::Bool).writable(),
        DataPointEntry::setting(8, "window_detection", DpType::Bool, ValueType::Bool).writable(),
        DataPointEntry::capability(21, "measure_battery", DpType::Value, ValueType::Float)
            .range(0.0, 100.0),
        DataPointEntry::capability(35, "alarm_battery", DpType::Bitmap, ValueType::Bool)
            .transform(DpTransform::Bool),
    ]);

    DeviceProfile::build("thermostat", &[], table, Quirks::default())
}
