//! Device profiles and fingerprint-based selection.
//!
//! A profile bundles everything that differs between device families: the
//! effective ZCL table (standard table plus overrides), the DataPoint table
//! and behavioural quirks. Sessions are generic; the profile is injected.

mod climate;
mod cover;
mod light;
mod plug;
mod security;

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::datapoint::DataPointTable;
use crate::zcl::mapping::ZclOverride;
use crate::zcl::CapabilityMappingTable;

/// Identity reported by the device's basic cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub manufacturer_name: String,
    pub model_id: String,
}

impl DeviceFingerprint {
    pub fn new(manufacturer_name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            manufacturer_name: manufacturer_name.into(),
            model_id: model_id.into(),
        }
    }
}

impl std::fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.manufacturer_name, self.model_id)
    }
}

/// Security-zone enrollment requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IasZoneQuirk {
    /// Zone id assigned in the enroll response
    pub zone_id: u8,
}

/// Behavioural differences that are not expressible as table entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quirks {
    pub ias_zone: Option<IasZoneQuirk>,
    /// Sleepy DataPoint devices only report after an explicit query
    pub query_datapoints_on_bind: bool,
    /// Skip scoring and use this endpoint
    pub primary_endpoint: Option<u8>,
}

/// Everything a session needs to know about one device family.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub zcl: CapabilityMappingTable,
    pub datapoints: DataPointTable,
    pub quirks: Quirks,
}

/// Shared immutable profile.
pub type SharedProfile = Arc<DeviceProfile>;

impl DeviceProfile {
    /// Standard ZCL table with no DataPoints and no quirks.
    pub fn generic() -> Self {
        Self {
            name: "generic",
            zcl: CapabilityMappingTable::standard().clone(),
            datapoints: DataPointTable::empty(),
            quirks: Quirks::default(),
        }
    }

    pub(crate) fn build(
        name: &'static str,
        overrides: &[ZclOverride],
        datapoints: DataPointTable,
        quirks: Quirks,
    ) -> Self {
        Self {
            name,
            zcl: CapabilityMappingTable::standard().with_overrides(overrides),
            datapoints,
            quirks,
        }
    }

    pub fn has_datapoints(&self) -> bool {
        !self.datapoints.is_empty()
    }
}

/// How a registry rule matches a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintMatch {
    /// Manufacturer and model both equal
    Exact {
        manufacturer: &'static str,
        model: &'static str,
    },
    /// Manufacturer starts with the prefix; model equal when given
    ManufacturerPrefix {
        prefix: &'static str,
        model: Option<&'static str>,
    },
    /// Model equal, any manufacturer
    Model(&'static str),
}

impl FingerprintMatch {
    fn matches(&self, fp: &DeviceFingerprint) -> bool {
        match self {
            Self::Exact {
                manufacturer,
                model,
            } => fp.manufacturer_name == *manufacturer && fp.model_id == *model,
            Self::ManufacturerPrefix { prefix, model } => {
                fp.manufacturer_name.starts_with(prefix)
                    && model.map_or(true, |m| fp.model_id == m)
            }
            Self::Model(model) => fp.model_id == *model,
        }
    }

    /// Lower ranks are more specific and win.
    fn rank(&self) -> u8 {
        match self {
            Self::Exact { .. } => 0,
            Self::ManufacturerPrefix { model: Some(_), .. } => 1,
            Self::ManufacturerPrefix { model: None, .. } => 2,
            Self::Model(_) => 3,
        }
    }
}

/// Maps fingerprints to profiles.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    rules: Vec<(FingerprintMatch, SharedProfile)>,
    fallback: SharedProfile,
}

impl ProfileRegistry {
    pub fn new(fallback: DeviceProfile) -> Self {
        Self {
            rules: Vec::new(),
            fallback: Arc::new(fallback),
        }
    }

    /// Registry with every built-in device family.
    pub fn builtin() -> &'static ProfileRegistry {
        &BUILTIN
    }

    pub fn register(&mut self, rule: FingerprintMatch, profile: SharedProfile) -> &mut Self {
        self.rules.push((rule, profile));
        self
    }

    /// Most specific matching profile, else the generic fallback.
    /// Among equally specific rules the first registered wins.
    pub fn resolve(&self, fingerprint: &DeviceFingerprint) -> SharedProfile {
        self.rules
            .iter()
            .filter(|(rule, _)| rule.matches(fingerprint))
            .min_by_key(|(rule, _)| rule.rank())
            .map(|(_, profile)| Arc::clone(profile))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Distinct profiles, in registration order, followed by the fallback.
    pub fn profiles(&self) -> Vec<SharedProfile> {
        let mut out: Vec<SharedProfile> = Vec::new();
        for (_, profile) in &self.rules {
            if !out.iter().any(|p| p.name == profile.name) {
                out.push(Arc::clone(profile));
            }
        }
        out.push(Arc::clone(&self.fallback));
        out
    }

    pub fn rules(&self) -> impl Iterator<Item = (&FingerprintMatch, &SharedProfile)> {
        self.rules.iter().map(|(rule, profile)| (rule, profile))
    }
}

static BUILTIN: Lazy<ProfileRegistry> = Lazy::new(|| {
    let mut registry = ProfileRegistry::new(DeviceProfile::generic());

    let light = Arc::new(light::light());
    let dimmer = Arc::new(light::dimmer());
    let plug = Arc::new(plug::plug());
    let cover = Arc::new(cover::cover());
    let climate = Arc::new(climate::climate_sensor());
    let thermostat = Arc::new(climate::thermostat());
    let motion = Arc::new(security::motion_sensor());
    let contact = Arc::new(security::contact_sensor());
    let tuya_generic = Arc::new(DeviceProfile {
        name: "tuya_generic",
        quirks: Quirks {
            query_datapoints_on_bind: true,
            ..Quirks::default()
        },
        ..DeviceProfile::generic()
    });

    for (manufacturer, profile) in [
        ("_TZE200_s8gkrkxk", &light),
        ("_TZE204_s8gkrkxk", &light),
        ("_TZE200_dfxkcots", &dimmer),
        ("_TZE200_w4cryh2i", &dimmer),
        ("_TZE200_9i9dt8is", &dimmer),
        ("_TZE200_byzdayie", &plug),
        ("_TZE200_bkkmqmyo", &plug),
        ("_TZE200_zah67ekd", &cover),
        ("_TZE200_xuzcvlku", &cover),
        ("_TZE200_rddyvrci", &cover),
        ("_TZE200_bjawzodf", &climate),
        ("_TZE200_yjjdcqsq", &climate),
        ("_TZE200_a8sdabtg", &climate),
        ("_TZE200_ckud7u2l", &thermostat),
        ("_TZE200_aoclfnxz", &thermostat),
        ("_TZE200_3towulqd", &motion),
        ("_TZE200_bh3n6gk8", &motion),
    ] {
        registry.register(
            FingerprintMatch::Exact {
                manufacturer,
                model: "TS0601",
            },
            Arc::clone(profile),
        );
    }

    registry
        .register(FingerprintMatch::Model("TS0505B"), Arc::clone(&light))
        .register(FingerprintMatch::Model("TS011F"), Arc::clone(&plug))
        .register(FingerprintMatch::Model("TS130F"), Arc::clone(&cover))
        .register(FingerprintMatch::Model("TS0201"), Arc::clone(&climate))
        .register(FingerprintMatch::Model("TS0202"), Arc::clone(&motion))
        .register(FingerprintMatch::Model("TS0203"), Arc::clone(&contact))
        .register(
            FingerprintMatch::ManufacturerPrefix {
                prefix: "_TZ3000_",
                model: Some("TS011F"),
            },
            Arc::clone(&plug),
        )
        .register(
            FingerprintMatch::ManufacturerPrefix {
                prefix: "_TZE",
                model: Some("TS0601"),
            },
            tuya_generic,
        );

    registry
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_wins_over_model() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.resolve(&DeviceFingerprint::new("_TZE200_dfxkcots", "TS0601"));
        assert_eq!(profile.name, "dimmer");
    }

    #[test]
    fn test_prefix_match_for_unknown_tuya_device() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.resolve(&DeviceFingerprint::new("_TZE204_unknown1", "TS0601"));
        assert_eq!(profile.name, "tuya_generic");
        assert!(profile.quirks.query_datapoints_on_bind);
        assert!(!profile.has_datapoints());
    }

    #[test]
    fn test_model_only_match() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.resolve(&DeviceFingerprint::new("_TZ3000_abcdefgh", "TS0203"));
        assert_eq!(profile.name, "contact_sensor");
        assert!(profile.quirks.ias_zone.is_some());
    }

    #[test]
    fn test_fallback_is_generic() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.resolve(&DeviceFingerprint::new("IKEA of Sweden", "TRADFRI bulb"));
        assert_eq!(profile.name, "generic");
        assert_eq!(profile.zcl, *CapabilityMappingTable::standard());
    }

    #[test]
    fn test_profiles_are_shared() {
        let registry = ProfileRegistry::builtin();
        let a = registry.resolve(&DeviceFingerprint::new("_TZE200_zah67ekd", "TS0601"));
        let b = registry.resolve(&DeviceFingerprint::new("_TZ3000_whatever", "TS130F"));
        assert!(Arc::ptr_eq(&a, &b));
        let names: Vec<_> = registry.profiles().iter().map(|p| p.name).collect();
        assert_eq!(names.last(), Some(&"generic"));
        assert_eq!(names.iter().filter(|n| **n == "cover").count(), 1);
    }

    #[test]
    fn test_custom_registry() {
        let mut registry = ProfileRegistry::new(DeviceProfile::generic());
        registry.register(
            FingerprintMatch::ManufacturerPrefix {
                prefix: "ACME",
                model: None,
            },
            Arc::new(plug::plug()),
        );
        assert_eq!(
            registry
                .resolve(&DeviceFingerprint::new("ACME Corp", "X1"))
                .name,
            "plug"
        );
    }
}
