//! Curtain and blind motors.

use zigbridge_core::ValueType;

use super::{DeviceProfile, Quirks};
use crate::datapoint::{DataPointEntry, DataPointTable, DpTransform, DpType};

const CONTROL: &[(i64, &str)] = &[(0, "up"), (1, "idle"), (2, "down")];

const WORK_STATE: &[(i64, &str)] = &[(0, "opening"), (1, "closing")];

const DIRECTION: &[(i64, &str)] = &[(0, "forward"), (1, "back")];

const OPENING_MODE: &[(i64, &str)] = &[(0, "tilt"), (1, "lift")];

// Tuya motors report 0 as fully open; the capability uses 1.0 for open
fn position(dp: u8) -> DataPointEntry {
    DataPointEntry::capability(dp, "windowcoverings_set", DpType::Value, ValueType::Float)
        .divisor(100.0)
        .transform(DpTransform::Complement { max: 1.0 })
        .range(0.0, 1.0)
}

pub(super) fn cover() -> DeviceProfile {
    let table = DataPointTable::new([
        DataPointEntry::capability(1, "windowcoverings_state", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(CONTROL))
            .writable(),
        position(2).writable(),
        position(3),
        DataPointEntry::setting(5, "motor_direction", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(DIRECTION))
            .writable(),
        DataPointEntry::setting(7, "work_state", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(WORK_STATE)),
        DataPointEntry::setting(8, "motor_speed", DpType::Value, ValueType::Int)
            .range(0.0, 255.0)
            .writable(),
        DataPointEntry::setting(10, "calibration_time", DpType::Value, ValueType::Float)
            .divisor(10.0),
        DataPointEntry::capability(13, "measure_battery", DpType::Value, ValueType::Float)
            .range(0.0, 100.0),
        DataPointEntry::setting(101, "opening_mode", DpType::Enum, ValueType::Enum)
            .transform(DpTransform::EnumMap(OPENING_MODE))
            .writable(),
        DataPointEntry::setting(102, "backlight", DpType::Bool, ValueType::Bool).writable(),
    ]);

    DeviceProfile::build("cover", &[], table, Quirks::default())
}
