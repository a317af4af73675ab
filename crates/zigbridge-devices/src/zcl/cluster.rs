//! ZCL cluster and attribute identifiers.

use serde::{Deserialize, Serialize};

/// A ZCL cluster id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u16);

impl ClusterId {
    // General
    pub const BASIC: ClusterId = ClusterId(0x0000);
    pub const POWER_CONFIGURATION: ClusterId = ClusterId(0x0001);
    pub const IDENTIFY: ClusterId = ClusterId(0x0003);
    pub const GROUPS: ClusterId = ClusterId(0x0004);
    pub const SCENES: ClusterId = ClusterId(0x0005);
    pub const ON_OFF: ClusterId = ClusterId(0x0006);
    pub const LEVEL_CONTROL: ClusterId = ClusterId(0x0008);
    pub const OTA: ClusterId = ClusterId(0x0019);

    // Closures / HVAC
    pub const WINDOW_COVERING: ClusterId = ClusterId(0x0102);
    pub const THERMOSTAT: ClusterId = ClusterId(0x0201);

    // Lighting
    pub const COLOR_CONTROL: ClusterId = ClusterId(0x0300);

    // Measurement
    pub const ILLUMINANCE_MEASUREMENT: ClusterId = ClusterId(0x0400);
    pub const TEMPERATURE_MEASUREMENT: ClusterId = ClusterId(0x0402);
    pub const PRESSURE_MEASUREMENT: ClusterId = ClusterId(0x0403);
    pub const HUMIDITY_MEASUREMENT: ClusterId = ClusterId(0x0405);
    pub const OCCUPANCY_SENSING: ClusterId = ClusterId(0x0406);

    // Security
    pub const IAS_ZONE: ClusterId = ClusterId(0x0500);

    // Smart energy
    pub const METERING: ClusterId = ClusterId(0x0702);
    pub const ELECTRICAL_MEASUREMENT: ClusterId = ClusterId(0x0B04);

    // Tuya manufacturer-specific cluster carrying DataPoints
    pub const TUYA_PRIVATE: ClusterId = ClusterId(0xEF00);

    const NAMES: &'static [(ClusterId, &'static str)] = &[
        (Self::BASIC, "genBasic"),
        (Self::POWER_CONFIGURATION, "genPowerCfg"),
        (Self::IDENTIFY, "genIdentify"),
        (Self::GROUPS, "genGroups"),
        (Self::SCENES, "genScenes"),
        (Self::ON_OFF, "genOnOff"),
        (Self::LEVEL_CONTROL, "genLevelCtrl"),
        (Self::OTA, "genOta"),
        (Self::WINDOW_COVERING, "closuresWindowCovering"),
        (Self::THERMOSTAT, "hvacThermostat"),
        (Self::COLOR_CONTROL, "lightingColorCtrl"),
        (Self::ILLUMINANCE_MEASUREMENT, "msIlluminanceMeasurement"),
        (Self::TEMPERATURE_MEASUREMENT, "msTemperatureMeasurement"),
        (Self::PRESSURE_MEASUREMENT, "msPressureMeasurement"),
        (Self::HUMIDITY_MEASUREMENT, "msRelativeHumidity"),
        (Self::OCCUPANCY_SENSING, "msOccupancySensing"),
        (Self::IAS_ZONE, "ssIasZone"),
        (Self::METERING, "seMetering"),
        (Self::ELECTRICAL_MEASUREMENT, "haElectricalMeasurement"),
        (Self::TUYA_PRIVATE, "manuSpecificTuya"),
    ];

    /// Conventional cluster name, `"unknown"` for clusters outside the table.
    pub fn name(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(id, _)| id == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    pub fn is_manufacturer_specific(&self) -> bool {
        self.0 >= 0xFC00
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:04x})", self.name(), self.0)
    }
}

impl From<u16> for ClusterId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Attribute ids, grouped by cluster.
pub mod attr {
    pub mod basic {
        pub const MANUFACTURER_NAME: u16 = 0x0004;
        pub const MODEL_ID: u16 = 0x0005;
        pub const POWER_SOURCE: u16 = 0x0007;
        pub const SW_BUILD_ID: u16 = 0x4000;
    }

    pub mod power {
        pub const BATTERY_VOLTAGE: u16 = 0x0020;
        pub const BATTERY_PERCENTAGE_REMAINING: u16 = 0x0021;
    }

    pub mod on_off {
        pub const ON_OFF: u16 = 0x0000;
        pub const START_UP_ON_OFF: u16 = 0x4003;
    }

    pub mod level {
        pub const CURRENT_LEVEL: u16 = 0x0000;
    }

    pub mod color {
        pub const CURRENT_HUE: u16 = 0x0000;
        pub const CURRENT_SATURATION: u16 = 0x0001;
        pub const COLOR_TEMPERATURE: u16 = 0x0007;
    }

    pub mod covering {
        pub const LIFT_PERCENTAGE: u16 = 0x0008;
        pub const TILT_PERCENTAGE: u16 = 0x0009;
    }

    pub mod thermostat {
        pub const LOCAL_TEMPERATURE: u16 = 0x0000;
        pub const OCCUPIED_COOLING_SETPOINT: u16 = 0x0011;
        pub const OCCUPIED_HEATING_SETPOINT: u16 = 0x0012;
    }

    /// Measured value of the temperature, humidity, pressure and illuminance clusters
    pub const MEASURED_VALUE: u16 = 0x0000;

    pub mod occupancy {
        pub const OCCUPANCY: u16 = 0x0000;
    }

    pub mod ias {
        pub const ZONE_STATE: u16 = 0x0000;
        pub const ZONE_TYPE: u16 = 0x0001;
        pub const ZONE_STATUS: u16 = 0x0002;
    }

    pub mod metering {
        pub const CURRENT_SUMM_DELIVERED: u16 = 0x0000;
    }

    pub mod electrical {
        pub const RMS_VOLTAGE: u16 = 0x0505;
        pub const RMS_CURRENT: u16 = 0x0508;
        pub const ACTIVE_POWER: u16 = 0x050B;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_names() {
        assert_eq!(ClusterId::ON_OFF.name(), "genOnOff");
        assert_eq!(ClusterId(0x1234).name(), "unknown");
        assert_eq!(ClusterId::from_name("ssiaszone"), Some(ClusterId::IAS_ZONE));
        assert_eq!(ClusterId::TUYA_PRIVATE.to_string(), "manuSpecificTuya(0xef00)");
    }

    #[test]
    fn test_manufacturer_specific_range() {
        assert!(ClusterId::TUYA_PRIVATE.is_manufacturer_specific());
        assert!(!ClusterId::IAS_ZONE.is_manufacturer_specific());
    }
}
