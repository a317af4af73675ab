//! Value transforms between raw ZCL attribute values and capabilities.

use zigbridge_core::Value;

use super::command::ZclCommand;
use crate::validation::{number, round_to, scale_unit, unit_interval};

/// Raw attribute value to normalized capability value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZclTransform {
    /// Pass the raw value through unchanged
    Identity,
    /// Non-zero is `true`
    Bool,
    /// `raw / divisor`, optionally rounded
    Scale {
        divisor: f64,
        decimals: Option<u32>,
    },
    /// Linear map of `[min, max]` onto `[0, 1]`
    Normalize { min: f64, max: f64 },
    /// Numeric code to symbolic name
    Enum(&'static [(i64, &'static str)]),
    /// `true` when any bit of the mask is set
    BitFlag { mask: i64 },
}

impl ZclTransform {
    pub const fn scale(divisor: f64) -> Self {
        Self::Scale {
            divisor,
            decimals: None,
        }
    }

    pub const fn scale_rounded(divisor: f64, decimals: u32) -> Self {
        Self::Scale {
            divisor,
            decimals: Some(decimals),
        }
    }

    /// Apply the transform. Raw values outside the legal domain are rejected.
    pub fn apply(&self, raw: &Value) -> Result<Value, String> {
        match self {
            Self::Identity => Ok(raw.clone()),
            Self::Bool => match raw {
                Value::Boolean(b) => Ok(Value::Boolean(*b)),
                other => Ok(Value::Boolean(number(other)? != 0.0)),
            },
            Self::Scale { divisor, decimals } => {
                let v = number(raw)? / divisor;
                Ok(Value::Float(match decimals {
                    Some(d) => round_to(v, *d),
                    None => v,
                }))
            }
            Self::Normalize { min, max } => {
                let v = number(raw)?;
                Ok(Value::Float((v - min) / (max - min)))
            }
            Self::Enum(table) => {
                let code = raw
                    .as_i64()
                    .ok_or_else(|| format!("expected enum code, got {}", raw.type_name()))?;
                table
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, name)| Value::String(name.to_string()))
                    .ok_or_else(|| format!("unknown enum code {}", code))
            }
            Self::BitFlag { mask } => {
                let bits = raw
                    .as_i64()
                    .ok_or_else(|| format!("expected bitmap, got {}", raw.type_name()))?;
                Ok(Value::Boolean(bits & mask != 0))
            }
        }
    }
}

/// Normalized capability value to an outbound ZCL command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZclWrite {
    /// `true`/`false` to on/off
    OnOff,
    /// `[0, 1]` to level `0..=254`
    Level { transition_time: u16 },
    /// `[0, 1]` to hue `0..=254`
    Hue { transition_time: u16 },
    /// `[0, 1]` to saturation `0..=254`
    Saturation { transition_time: u16 },
    /// `[0, 1]` to mireds in `[min, max]`
    ColorTemperature { min: f64, max: f64 },
    /// `[0, 1]` to lift percentage
    LiftPercentage,
    /// `[0, 1]` to tilt percentage
    TiltPercentage,
    /// Write the attribute itself with `round(value * scale)`
    Attribute { scale: f64 },
    /// Write the attribute with the code of a symbolic enum member
    EnumAttribute(&'static [(i64, &'static str)]),
}

impl ZclWrite {
    /// Build the command for `value`. `attribute` is the mapped attribute id,
    /// used by plain attribute writes.
    pub fn encode(&self, attribute: u16, value: &Value) -> Result<ZclCommand, String> {
        match self {
            Self::OnOff => match value.as_bool() {
                Some(true) => Ok(ZclCommand::On),
                Some(false) => Ok(ZclCommand::Off),
                None => Err(format!("expected bool, got {}", value.type_name())),
            },
            Self::Level { transition_time } => Ok(ZclCommand::MoveToLevelWithOnOff {
                level: scale_unit(value, 254.0)? as u8,
                transition_time: *transition_time,
            }),
            Self::Hue { transition_time } => Ok(ZclCommand::MoveToHue {
                hue: scale_unit(value, 254.0)? as u8,
                direction: 0,
                transition_time: *transition_time,
            }),
            Self::Saturation { transition_time } => Ok(ZclCommand::MoveToSaturation {
                saturation: scale_unit(value, 254.0)? as u8,
                transition_time: *transition_time,
            }),
            Self::ColorTemperature { min, max } => {
                let span = unit_interval(value)?;
                Ok(ZclCommand::MoveToColorTemperature {
                    mireds: (min + span * (max - min)).round() as u16,
                    transition_time: 0,
                })
            }
            Self::LiftPercentage => Ok(ZclCommand::GoToLiftPercentage {
                percentage: scale_unit(value, 100.0)? as u8,
            }),
            Self::TiltPercentage => Ok(ZclCommand::GoToTiltPercentage {
                percentage: scale_unit(value, 100.0)? as u8,
            }),
            Self::Attribute { scale } => {
                let raw = match value {
                    Value::String(_) => return Err("expected a number, got string".to_string()),
                    other => (number(other)? * scale).round() as i64,
                };
                Ok(ZclCommand::WriteAttribute {
                    attribute,
                    value: Value::Integer(raw),
                })
            }
            Self::EnumAttribute(table) => {
                let code = enum_code(table, value)?;
                Ok(ZclCommand::WriteAttribute {
                    attribute,
                    value: Value::Integer(code),
                })
            }
        }
    }
}

/// Reverse lookup of an enum member by name, or by code if already numeric.
pub(crate) fn enum_code(table: &[(i64, &'static str)], value: &Value) -> Result<i64, String> {
    match value {
        Value::String(name) => table
            .iter()
            .find(|(_, n)| n == name)
            .map(|(code, _)| *code)
            .ok_or_else(|| format!("unknown enum member {:?}", name)),
        other => {
            let code = other
                .as_i64()
                .ok_or_else(|| format!("expected enum member, got {}", other.type_name()))?;
            if table.iter().any(|(c, _)| *c == code) {
                Ok(code)
            } else {
                Err(format!("unknown enum code {}", code))
            }
        }
    }
}
