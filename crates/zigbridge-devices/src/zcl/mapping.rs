//! Capability mapping table for standard ZCL attributes.
//!
//! Each [`MappingEntry`] says which capability (or internal setting) an
//! attribute feeds, how the raw value is normalized, what range the result
//! must fall in, whether the attribute is reported, and how a host write is
//! turned back into a command. The standard table is built once and shared;
//! device profiles derive their own effective table through overrides.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use zigbridge_core::{ReportingDefaults, Value, ValueType};

use super::cluster::{attr, ClusterId};
use super::transform::{ZclTransform, ZclWrite};
use crate::store::Slot;
use crate::validation;

/// A (cluster, attribute) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRef {
    pub cluster: ClusterId,
    pub attribute: u16,
}

impl AttributeRef {
    pub const fn new(cluster: ClusterId, attribute: u16) -> Self {
        Self { cluster, attribute }
    }
}

impl std::fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.0x{:04x}", self.cluster.name(), self.attribute)
    }
}

/// Attribute reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Minimum seconds between reports
    pub min_interval: u16,
    /// Maximum seconds between reports
    pub max_interval: u16,
    /// Minimum change in raw units that triggers a report
    pub min_change: u32,
}

impl ReportingConfig {
    /// Placeholder resolved to the engine's default window at bind time.
    pub const UNSPECIFIED: Self = Self::new(0, 0, 0);

    pub const fn new(min_interval: u16, max_interval: u16, min_change: u32) -> Self {
        Self {
            min_interval,
            max_interval,
            min_change,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// This window, or `default` when unspecified.
    pub fn or_default(self, default: ReportingConfig) -> Self {
        if self.is_unspecified() {
            default
        } else {
            self
        }
    }
}

impl From<ReportingDefaults> for ReportingConfig {
    fn from(d: ReportingDefaults) -> Self {
        Self::new(d.min_interval, d.max_interval, d.min_change)
    }
}

/// How one ZCL attribute maps onto the capability model.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub source: AttributeRef,
    /// Conventional attribute name, for logs
    pub attribute_name: &'static str,
    pub capability: Option<&'static str>,
    /// Settings slot used when `capability` is `None`
    pub internal_key: Option<&'static str>,
    pub transform: ZclTransform,
    pub value_type: ValueType,
    pub range: Option<(f64, f64)>,
    pub unit: Option<&'static str>,
    /// `None` means read once at bind time, never subscribed
    pub reporting: Option<ReportingConfig>,
    /// `None` means not writable
    pub write: Option<ZclWrite>,
}

impl MappingEntry {
    pub const fn capability(
        cluster: ClusterId,
        attribute: u16,
        attribute_name: &'static str,
        capability: &'static str,
        transform: ZclTransform,
        value_type: ValueType,
    ) -> Self {
        Self {
            source: AttributeRef::new(cluster, attribute),
            attribute_name,
            capability: Some(capability),
            internal_key: None,
            transform,
            value_type,
            range: None,
            unit: None,
            reporting: None,
            write: None,
        }
    }

    /// An attribute that only feeds the internal settings map.
    pub const fn setting(
        cluster: ClusterId,
        attribute: u16,
        attribute_name: &'static str,
        key: &'static str,
        transform: ZclTransform,
        value_type: ValueType,
    ) -> Self {
        Self {
            source: AttributeRef::new(cluster, attribute),
            attribute_name,
            capability: None,
            internal_key: Some(key),
            transform,
            value_type,
            range: None,
            unit: None,
            reporting: None,
            write: None,
        }
    }

    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn reporting(mut self, min_interval: u16, max_interval: u16, min_change: u32) -> Self {
        self.reporting = Some(ReportingConfig::new(min_interval, max_interval, min_change));
        self
    }

    /// Subscribe with the engine's default reporting window.
    pub const fn reported(mut self) -> Self {
        self.reporting = Some(ReportingConfig::UNSPECIFIED);
        self
    }

    pub const fn writable(mut self, write: ZclWrite) -> Self {
        self.write = Some(write);
        self
    }

    /// Where a normalized value from this attribute lands.
    pub fn slot(&self) -> Slot {
        match (self.capability, self.internal_key) {
            (Some(capability), _) => Slot::Capability(capability),
            (None, Some(key)) => Slot::Setting(key),
            (None, None) => Slot::Setting(self.attribute_name),
        }
    }

    /// Transform a raw attribute value and validate the result.
    pub fn normalize(&self, raw: &Value) -> Result<Value, String> {
        let value = self.transform.apply(raw)?;
        validation::conform(value, self.value_type, self.range)
    }
}

/// Edit applied by a device profile to the standard table.
#[derive(Debug, Clone, PartialEq)]
pub enum ZclOverride {
    /// Insert or replace the entry for its attribute
    Replace(MappingEntry),
    /// Drop the entry for an attribute
    Remove(AttributeRef),
}

/// Immutable (cluster, attribute) to capability table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityMappingTable {
    entries: BTreeMap<AttributeRef, MappingEntry>,
}

impl CapabilityMappingTable {
    pub fn new(entries: impl IntoIterator<Item = MappingEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.source, e)).collect(),
        }
    }

    /// The shared table of standard cluster mappings.
    pub fn standard() -> &'static CapabilityMappingTable {
        &STANDARD
    }

    /// A copy of this table with `overrides` applied in order.
    pub fn with_overrides(&self, overrides: &[ZclOverride]) -> Self {
        let mut entries = self.entries.clone();
        for o in overrides {
            match o {
                ZclOverride::Replace(entry) => {
                    entries.insert(entry.source, entry.clone());
                }
                ZclOverride::Remove(source) => {
                    entries.remove(source);
                }
            }
        }
        Self { entries }
    }

    pub fn lookup(&self, source: &AttributeRef) -> Option<&MappingEntry> {
        self.entries.get(source)
    }

    pub fn entries_for_cluster(&self, cluster: ClusterId) -> impl Iterator<Item = &MappingEntry> {
        self.entries
            .range(AttributeRef::new(cluster, 0)..=AttributeRef::new(cluster, u16::MAX))
            .map(|(_, e)| e)
    }

    /// Writable entry for a capability, restricted to clusters `available` accepts.
    pub fn writable_for(
        &self,
        capability: &str,
        available: impl Fn(ClusterId) -> bool,
    ) -> Option<&MappingEntry> {
        self.entries.values().find(|e| {
            e.capability == Some(capability) && e.write.is_some() && available(e.source.cluster)
        })
    }

    /// Writable entry for an internal setting, restricted like [`Self::writable_for`].
    pub fn writable_setting(
        &self,
        key: &str,
        available: impl Fn(ClusterId) -> bool,
    ) -> Option<&MappingEntry> {
        self.entries.values().find(|e| {
            e.capability.is_none()
                && e.internal_key == Some(key)
                && e.write.is_some()
                && available(e.source.cluster)
        })
    }

    pub fn capabilities(&self) -> BTreeSet<&'static str> {
        self.entries.values().filter_map(|e| e.capability).collect()
    }

    pub fn clusters(&self) -> BTreeSet<ClusterId> {
        self.entries.keys().map(|k| k.cluster).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) const POWER_SOURCE: &[(i64, &str)] = &[
    (0, "unknown"),
    (1, "mains"),
    (2, "mains_3phase"),
    (3, "battery"),
    (4, "dc"),
];

pub(crate) const START_UP_ON_OFF: &[(i64, &str)] =
    &[(0, "off"), (1, "on"), (2, "toggle"), (255, "previous")];

pub(crate) const ZONE_STATE: &[(i64, &str)] = &[(0, "not_enrolled"), (1, "enrolled")];

// Bit 0 of the IAS zone status is the primary alarm
pub(crate) const IAS_ALARM_1: ZclTransform = ZclTransform::BitFlag { mask: 0x0001 };

static STANDARD: Lazy<CapabilityMappingTable> = Lazy::new(|| {
    use ClusterId as C;
    use ValueType::*;

    CapabilityMappingTable::new([
        // genBasic: identification only
        MappingEntry::setting(
            C::BASIC,
            attr::basic::MANUFACTURER_NAME,
            "manufacturerName",
            "manufacturer_name",
            ZclTransform::Identity,
            Text,
        ),
        MappingEntry::setting(
            C::BASIC,
            attr::basic::MODEL_ID,
            "modelId",
            "model_id",
            ZclTransform::Identity,
            Text,
        ),
        MappingEntry::setting(
            C::BASIC,
            attr::basic::POWER_SOURCE,
            "powerSource",
            "power_source",
            ZclTransform::Enum(POWER_SOURCE),
            Enum,
        ),
        MappingEntry::setting(
            C::BASIC,
            attr::basic::SW_BUILD_ID,
            "swBuildId",
            "sw_build_id",
            ZclTransform::Identity,
            Text,
        ),
        // genPowerCfg
        MappingEntry::capability(
            C::POWER_CONFIGURATION,
            attr::power::BATTERY_PERCENTAGE_REMAINING,
            "batteryPercentageRemaining",
            "measure_battery",
            ZclTransform::scale(2.0),
            Float,
        )
        .range(0.0, 100.0)
        .unit("%")
        .reporting(3600, 43200, 2),
        MappingEntry::setting(
            C::POWER_CONFIGURATION,
            attr::power::BATTERY_VOLTAGE,
            "batteryVoltage",
            "battery_voltage",
            ZclTransform::scale(10.0),
            Float,
        )
        .unit("V"),
        // genOnOff
        MappingEntry::capability(
            C::ON_OFF,
            attr::on_off::ON_OFF,
            "onOff",
            "onoff",
            ZclTransform::Bool,
            Bool,
        )
        .reporting(0, 600, 1)
        .writable(ZclWrite::OnOff),
        MappingEntry::setting(
            C::ON_OFF,
            attr::on_off::START_UP_ON_OFF,
            "startUpOnOff",
            "power_on_behavior",
            ZclTransform::Enum(START_UP_ON_OFF),
            Enum,
        )
        .writable(ZclWrite::EnumAttribute(START_UP_ON_OFF)),
        // genLevelCtrl
        MappingEntry::capability(
            C::LEVEL_CONTROL,
            attr::level::CURRENT_LEVEL,
            "currentLevel",
            "dim",
            ZclTransform::Normalize { min: 0.0, max: 254.0 },
            Float,
        )
        .range(0.0, 1.0)
        .reporting(1, 600, 1)
        .writable(ZclWrite::Level { transition_time: 0 }),
        // lightingColorCtrl
        MappingEntry::capability(
            C::COLOR_CONTROL,
            attr::color::CURRENT_HUE,
            "currentHue",
            "light_hue",
            ZclTransform::Normalize { min: 0.0, max: 254.0 },
            Float,
        )
        .range(0.0, 1.0)
        .reporting(1, 600, 1)
        .writable(ZclWrite::Hue { transition_time: 0 }),
        MappingEntry::capability(
            C::COLOR_CONTROL,
            attr::color::CURRENT_SATURATION,
            "currentSaturation",
            "light_saturation",
            ZclTransform::Normalize { min: 0.0, max: 254.0 },
            Float,
        )
        .range(0.0, 1.0)
        .reporting(1, 600, 1)
        .writable(ZclWrite::Saturation { transition_time: 0 }),
        MappingEntry::capability(
            C::COLOR_CONTROL,
            attr::color::COLOR_TEMPERATURE,
            "colorTemperature",
            "light_temperature",
            ZclTransform::Normalize { min: 153.0, max: 500.0 },
            Float,
        )
        .range(0.0, 1.0)
        .reporting(1, 600, 1)
        .writable(ZclWrite::ColorTemperature { min: 153.0, max: 500.0 }),
        // Measurement clusters
        MappingEntry::capability(
            C::TEMPERATURE_MEASUREMENT,
            attr::MEASURED_VALUE,
            "measuredValue",
            "measure_temperature",
            ZclTransform::scale_rounded(100.0, 1),
            Float,
        )
        .range(-50.0, 150.0)
        .unit("°C")
        .reporting(60, 3600, 10),
        MappingEntry::capability(
            C::HUMIDITY_MEASUREMENT,
            attr::MEASURED_VALUE,
            "measuredValue",
            "measure_humidity",
            ZclTransform::scale(100.0),
            Float,
        )
        .range(0.0, 100.0)
        .unit("%")
        .reporting(60, 3600, 100),
        MappingEntry::capability(
            C::PRESSURE_MEASUREMENT,
            attr::MEASURED_VALUE,
            "measuredValue",
            "measure_pressure",
            ZclTransform::scale(10.0),
            Float,
        )
        .unit("hPa")
        .reporting(60, 3600, 1),
        MappingEntry::capability(
            C::ILLUMINANCE_MEASUREMENT,
            attr::MEASURED_VALUE,
            "measuredValue",
            "measure_luminance",
            ZclTransform::scale(100.0),
            Float,
        )
        .range(0.0, 100_000.0)
        .unit("lux")
        .reporting(10, 3600, 100),
        MappingEntry::capability(
            C::OCCUPANCY_SENSING,
            attr::occupancy::OCCUPANCY,
            "occupancy",
            "alarm_motion",
            ZclTransform::BitFlag { mask: 0x01 },
            Bool,
        )
        .reporting(0, 3600, 1),
        // closuresWindowCovering
        MappingEntry::capability(
            C::WINDOW_COVERING,
            attr::covering::LIFT_PERCENTAGE,
            "currentPositionLiftPercentage",
            "windowcoverings_set",
            ZclTransform::Normalize { min: 0.0, max: 100.0 },
            Float,
        )
        .range(0.0, 1.0)
        .reporting(1, 600, 1)
        .writable(ZclWrite::LiftPercentage),
        MappingEntry::capability(
            C::WINDOW_COVERING,
            attr::covering::TILT_PERCENTAGE,
            "currentPositionTiltPercentage",
            "windowcoverings_tilt_set",
            ZclTransform::Normalize { min: 0.0, max: 100.0 },
            Float,
        )
        .range(0.0, 1.0)
        .reporting(1, 600, 1)
        .writable(ZclWrite::TiltPercentage),
        // hvacThermostat
        MappingEntry::capability(
            C::THERMOSTAT,
            attr::thermostat::LOCAL_TEMPERATURE,
            "localTemperature",
            "measure_temperature",
            ZclTransform::scale_rounded(100.0, 1),
            Float,
        )
        .range(-50.0, 150.0)
        .unit("°C")
        .reporting(60, 3600, 10),
        MappingEntry::capability(
            C::THERMOSTAT,
            attr::thermostat::OCCUPIED_HEATING_SETPOINT,
            "occupiedHeatingSetpoint",
            "target_temperature",
            ZclTransform::scale(100.0),
            Float,
        )
        .range(5.0, 35.0)
        .unit("°C")
        .reporting(1, 3600, 10)
        .writable(ZclWrite::Attribute { scale: 100.0 }),
        MappingEntry::setting(
            C::THERMOSTAT,
            attr::thermostat::OCCUPIED_COOLING_SETPOINT,
            "occupiedCoolingSetpoint",
            "cooling_setpoint",
            ZclTransform::scale(100.0),
            Float,
        )
        .unit("°C")
        .reported(),
        // ssIasZone
        MappingEntry::setting(
            C::IAS_ZONE,
            attr::ias::ZONE_STATE,
            "zoneState",
            "zone_state",
            ZclTransform::Enum(ZONE_STATE),
            Enum,
        )
        .reported(),
        MappingEntry::setting(
            C::IAS_ZONE,
            attr::ias::ZONE_TYPE,
            "zoneType",
            "zone_type",
            ZclTransform::Identity,
            Int,
        ),
        MappingEntry::capability(
            C::IAS_ZONE,
            attr::ias::ZONE_STATUS,
            "zoneStatus",
            "alarm_contact",
            IAS_ALARM_1,
            Bool,
        )
        .reporting(0, 3600, 1),
        // Energy
        MappingEntry::capability(
            C::METERING,
            attr::metering::CURRENT_SUMM_DELIVERED,
            "currentSummDelivered",
            "meter_power",
            ZclTransform::scale(1000.0),
            Float,
        )
        .range(0.0, f64::MAX)
        .unit("kWh")
        .reporting(10, 3600, 1),
        MappingEntry::capability(
            C::ELECTRICAL_MEASUREMENT,
            attr::electrical::ACTIVE_POWER,
            "activePower",
            "measure_power",
            ZclTransform::scale(1.0),
            Float,
        )
        .unit("W")
        .reporting(10, 600, 5),
        MappingEntry::capability(
            C::ELECTRICAL_MEASUREMENT,
            attr::electrical::RMS_VOLTAGE,
            "rmsVoltage",
            "measure_voltage",
            ZclTransform::scale(1.0),
            Float,
        )
        .range(0.0, 500.0)
        .unit("V")
        .reporting(10, 600, 2),
        MappingEntry::capability(
            C::ELECTRICAL_MEASUREMENT,
            attr::electrical::RMS_CURRENT,
            "rmsCurrent",
            "measure_current",
            ZclTransform::scale(1000.0),
            Float,
        )
        .range(0.0, 100.0)
        .unit("A")
        .reporting(10, 600, 50),
    ])
});
