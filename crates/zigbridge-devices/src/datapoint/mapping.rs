//! Per-device DataPoint mapping tables.
//!
//! Several DataPoint indices may feed the same capability (firmware variants
//! report on different indices); the table keeps every alias and the session
//! decides which one to write back to.

use std::collections::BTreeMap;

use zigbridge_core::{Value, ValueType};

use super::hsv::{HsvColor, HSV_CAPABILITIES};
use super::value::{DataPoint, DpType};
use crate::store::Slot;
use crate::validation::{self, number};
use crate::zcl::transform::enum_code;

/// Transform applied after the divisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DpTransform {
    Identity,
    /// Non-zero is `true`
    Bool,
    /// Boolean negation, for devices that report inverted states
    Invert,
    /// Numeric code to symbolic name
    EnumMap(&'static [(i64, &'static str)]),
    /// Numeric code to a number, e.g. coarse battery levels
    Lookup(&'static [(i64, f64)]),
    /// `max - x`, for reversed position scales
    Complement { max: f64 },
    /// Packed HSV string fanning out to hue, saturation and dim
    Hsv,
}

/// Result of normalizing one DataPoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Single(Value),
    /// Several capabilities updated by one payload
    Composite(Vec<(&'static str, Value)>),
}

/// How one DataPoint index maps onto the capability model.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPointEntry {
    pub dp: u8,
    pub capability: Option<&'static str>,
    pub internal_key: Option<&'static str>,
    /// Wire type used when writing
    pub dp_type: DpType,
    pub transform: DpTransform,
    /// Raw values are divided by this before the transform
    pub divisor: Option<f64>,
    pub value_type: ValueType,
    pub range: Option<(f64, f64)>,
    pub writable: bool,
}

impl DataPointEntry {
    pub const fn capability(
        dp: u8,
        capability: &'static str,
        dp_type: DpType,
        value_type: ValueType,
    ) -> Self {
        Self {
            dp,
            capability: Some(capability),
            internal_key: None,
            dp_type,
            transform: DpTransform::Identity,
            divisor: None,
            value_type,
            range: None,
            writable: false,
        }
    }

    pub const fn setting(dp: u8, key: &'static str, dp_type: DpType, value_type: ValueType) -> Self {
        Self {
            dp,
            capability: None,
            internal_key: Some(key),
            dp_type,
            transform: DpTransform::Identity,
            divisor: None,
            value_type,
            range: None,
            writable: false,
        }
    }

    /// A packed HSV colour DataPoint.
    pub const fn hsv(dp: u8) -> Self {
        Self {
            dp,
            capability: Some(HSV_CAPABILITIES[0]),
            internal_key: None,
            dp_type: DpType::String,
            transform: DpTransform::Hsv,
            divisor: None,
            value_type: ValueType::Float,
            range: Some((0.0, 1.0)),
            writable: true,
        }
    }

    pub const fn divisor(mut self, divisor: f64) -> Self {
        self.divisor = Some(divisor);
        self
    }

    pub const fn transform(mut self, transform: DpTransform) -> Self {
        self.transform = transform;
        self
    }

    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub const fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Every capability this entry updates.
    pub fn capabilities(&self) -> &[&'static str] {
        match (self.transform, &self.capability) {
            (DpTransform::Hsv, _) => &HSV_CAPABILITIES,
            (_, Some(capability)) => std::slice::from_ref(capability),
            (_, None) => &[],
        }
    }

    /// Landing slot for single-valued entries; `None` if the entry names neither.
    pub fn slot(&self) -> Option<Slot> {
        match (self.capability, self.internal_key) {
            (Some(capability), _) => Some(Slot::Capability(capability)),
            (None, Some(key)) => Some(Slot::Setting(key)),
            (None, None) => None,
        }
    }

    /// Divisor, then transform, then type and range validation.
    pub fn normalize(&self, raw: &Value) -> Result<Normalized, String> {
        if self.transform == DpTransform::Hsv {
            let color = HsvColor::from_value(raw).map_err(|e| e.to_string())?;
            let values = color
                .normalized()
                .into_iter()
                .map(Value::Float)
                .collect::<Vec<_>>();
            for v in &values {
                validation::check(v, self.value_type, self.range)?;
            }
            return Ok(Normalized::Composite(
                HSV_CAPABILITIES.iter().copied().zip(values).collect(),
            ));
        }

        let scaled = match self.divisor {
            Some(divisor) => Value::Float(number(raw)? / divisor),
            None => raw.clone(),
        };
        let value = validation::conform(self.apply(&scaled)?, self.value_type, self.range)?;
        Ok(Normalized::Single(value))
    }

    fn apply(&self, v: &Value) -> Result<Value, String> {
        match self.transform {
            DpTransform::Identity | DpTransform::Hsv => Ok(v.clone()),
            DpTransform::Bool => match v {
                Value::Boolean(b) => Ok(Value::Boolean(*b)),
                other => Ok(Value::Boolean(number(other)? != 0.0)),
            },
            DpTransform::Invert => match v {
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                other => Ok(Value::Boolean(number(other)? == 0.0)),
            },
            DpTransform::EnumMap(table) => {
                let code = v
                    .as_i64()
                    .ok_or_else(|| format!("expected enum code, got {}", v.type_name()))?;
                table
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, name)| Value::String(name.to_string()))
                    .ok_or_else(|| format!("unknown enum code {}", code))
            }
            DpTransform::Lookup(table) => {
                let code = v
                    .as_i64()
                    .ok_or_else(|| format!("expected lookup code, got {}", v.type_name()))?;
                table
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, n)| Value::Float(*n))
                    .ok_or_else(|| format!("unknown lookup code {}", code))
            }
            DpTransform::Complement { max } => Ok(Value::Float(max - number(v)?)),
        }
    }

    /// Inverse transform, then multiply by the divisor. Composite entries are
    /// encoded by the caller from the full colour.
    pub fn denormalize(&self, value: &Value) -> Result<Value, String> {
        let unscaled = match self.transform {
            DpTransform::Identity => value.clone(),
            DpTransform::Bool => Value::Boolean(
                value
                    .as_bool()
                    .ok_or_else(|| format!("expected bool, got {}", value.type_name()))?,
            ),
            DpTransform::Invert => Value::Boolean(
                !value
                    .as_bool()
                    .ok_or_else(|| format!("expected bool, got {}", value.type_name()))?,
            ),
            DpTransform::EnumMap(table) => Value::Integer(enum_code(table, value)?),
            DpTransform::Lookup(table) => {
                let n = number(value)?;
                let code = table
                    .iter()
                    .find(|(_, v)| *v == n)
                    .map(|(c, _)| *c)
                    .ok_or_else(|| format!("{} has no lookup code", n))?;
                Value::Integer(code)
            }
            DpTransform::Complement { max } => Value::Float(max - number(value)?),
            DpTransform::Hsv => return Err("composite payload".to_string()),
        };

        match self.divisor {
            Some(divisor) => Ok(Value::Integer((number(&unscaled)? * divisor).round() as i64)),
            None => Ok(unscaled),
        }
    }

    /// Encode a normalized value as an outbound DataPoint.
    pub fn encode(&self, value: &Value) -> Result<DataPoint, String> {
        let raw = self.denormalize(value)?;
        DataPoint::encode(self.dp, self.dp_type, &raw).map_err(|e| e.to_string())
    }
}

/// DataPoint index to capability table for one device type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPointTable {
    entries: BTreeMap<u8, DataPointEntry>,
    by_capability: BTreeMap<&'static str, Vec<u8>>,
}

impl DataPointTable {
    pub fn new(entries: impl IntoIterator<Item = DataPointEntry>) -> Self {
        let entries: BTreeMap<u8, DataPointEntry> =
            entries.into_iter().map(|e| (e.dp, e)).collect();
        let mut by_capability: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
        // BTreeMap iteration keeps every alias list in ascending index order
        for entry in entries.values() {
            for capability in entry.capabilities() {
                by_capability.entry(*capability).or_default().push(entry.dp);
            }
        }
        Self {
            entries,
            by_capability,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, dp: u8) -> Option<&DataPointEntry> {
        self.entries.get(&dp)
    }

    /// Every index feeding `capability`, ascending.
    pub fn aliases(&self, capability: &str) -> &[u8] {
        self.by_capability
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Writable entry for `capability`: `preferred` when it is a writable
    /// alias, otherwise the lowest writable index.
    pub fn writable_for(&self, capability: &str, preferred: Option<u8>) -> Option<&DataPointEntry> {
        let writable = |dp: &u8| self.entries.get(dp).filter(|e| e.writable);
        let aliases = self.aliases(capability);

        preferred
            .filter(|dp| aliases.contains(dp))
            .and_then(|dp| writable(&dp))
            .or_else(|| aliases.iter().find_map(writable))
    }

    pub fn writable_setting(&self, key: &str) -> Option<&DataPointEntry> {
        self.entries
            .values()
            .find(|e| e.capability.is_none() && e.internal_key == Some(key) && e.writable)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_capability.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPointEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<DataPointEntry> for DataPointTable {
    fn from_iter<I: IntoIterator<Item = DataPointEntry>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATTERY_LEVELS: &[(i64, f64)] = &[(0, 10.0), (1, 50.0), (2, 100.0)];

    fn dimmer() -> DataPointTable {
        DataPointTable::new([
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
            DataPointEntry::capability(14, "measure_battery", DpType::Enum, ValueType::Float)
                .transform(DpTransform::Lookup(BATTERY_LEVELS)),
            DataPointEntry::setting(7, "child_lock", DpType::Bool, ValueType::Bool).writable(),
        ])
    }

    #[test]
    fn test_divisor_round_trip() {
        let table = dimmer();
        let entry = table.lookup(3).unwrap();
        let normalized = entry.normalize(&Value::Integer(500)).unwrap();
        assert_eq!(normalized, Normalized::Single(Value::Float(0.5)));
        assert_eq!(entry.denormalize(&Value::Float(0.5)).unwrap(), Value::Integer(500));
        assert_eq!(
            entry.encode(&Value::Float(0.2)).unwrap(),
            DataPoint::value(3, 200)
        );
    }

    #[test]
    fn test_alias_index() {
        let table = dimmer();
        assert_eq!(table.aliases("dim"), &[2, 3]);
        assert_eq!(table.writable_for("dim", None).unwrap().dp, 2);
        assert_eq!(table.writable_for("dim", Some(3)).unwrap().dp, 3);
        // Preferred index that is not an alias is ignored
        assert_eq!(table.writable_for("dim", Some(1)).unwrap().dp, 2);
        assert!(table.writable_for("measure_battery", None).is_none());
    }

    #[test]
    fn test_lookup_transform() {
        let entry = dimmer().lookup(14).cloned().unwrap();
        assert_eq!(
            entry.normalize(&Value::Integer(1)).unwrap(),
            Normalized::Single(Value::Float(50.0))
        );
        assert!(entry.normalize(&Value::Integer(5)).is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let entry = dimmer().lookup(2).cloned().unwrap();
        assert!(entry.normalize(&Value::Integer(1200)).is_err());
    }

    #[test]
    fn test_hsv_entry_is_composite() {
        let table = DataPointTable::new([DataPointEntry::hsv(5)]);
        assert_eq!(table.aliases("light_saturation"), &[5]);
        assert_eq!(table.aliases("dim"), &[5]);

        match table
            .lookup(5)
            .unwrap()
            .normalize(&Value::String("000F03E801F4".into()))
            .unwrap()
        {
            Normalized::Composite(values) => {
                assert_eq!(values.len(), 3);
                assert_eq!(values[1], ("light_saturation", Value::Float(1.0)));
                assert_eq!(values[2], ("dim", Value::Float(0.5)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_setting_lookup() {
        let table = dimmer();
        let entry = table.writable_setting("child_lock").unwrap();
        assert_eq!(entry.slot(), Some(Slot::Setting("child_lock")));
        assert_eq!(entry.encode(&Value::Boolean(true)).unwrap(), DataPoint::bool(7, true));
    }

    #[test]
    fn test_complement_with_divisor() {
        let entry = DataPointEntry::capability(2, "windowcoverings_set", DpType::Value, ValueType::Float)
            .divisor(100.0)
            .transform(DpTransform::Complement { max: 1.0 })
            .range(0.0, 1.0)
            .writable();
        assert_eq!(
            entry.normalize(&Value::Integer(25)).unwrap(),
            Normalized::Single(Value::Float(0.75))
        );
        assert_eq!(entry.denormalize(&Value::Float(0.75)).unwrap(), Value::Integer(25));
    }
}
