//! Outbound ZCL commands.

use serde::{Deserialize, Serialize};
use zigbridge_core::Value;

/// A cluster command or attribute write sent to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ZclCommand {
    Off,
    On,
    Toggle,
    MoveToLevelWithOnOff {
        level: u8,
        transition_time: u16,
    },
    MoveToHue {
        hue: u8,
        direction: u8,
        transition_time: u16,
    },
    MoveToSaturation {
        saturation: u8,
        transition_time: u16,
    },
    MoveToColorTemperature {
        mireds: u16,
        transition_time: u16,
    },
    GoToLiftPercentage {
        percentage: u8,
    },
    GoToTiltPercentage {
        percentage: u8,
    },
    /// Global "write attributes" on the target cluster
    WriteAttribute {
        attribute: u16,
        value: Value,
    },
    ZoneEnrollResponse {
        enroll_response_code: u8,
        zone_id: u8,
    },
}

impl ZclCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Toggle => "toggle",
            Self::MoveToLevelWithOnOff { .. } => "moveToLevelWithOnOff",
            Self::MoveToHue { .. } => "moveToHue",
            Self::MoveToSaturation { .. } => "moveToSaturation",
            Self::MoveToColorTemperature { .. } => "moveToColorTemperature",
            Self::GoToLiftPercentage { .. } => "goToLiftPercentage",
            Self::GoToTiltPercentage { .. } => "goToTiltPercentage",
            Self::WriteAttribute { .. } => "write",
            Self::ZoneEnrollResponse { .. } => "zoneEnrollResponse",
        }
    }

    /// Cluster-specific command id; `None` for global commands.
    pub fn command_id(&self) -> Option<u8> {
        match self {
            Self::Off => Some(0x00),
            Self::On => Some(0x01),
            Self::Toggle => Some(0x02),
            Self::MoveToLevelWithOnOff { .. } => Some(0x04),
            Self::MoveToHue { .. } => Some(0x00),
            Self::MoveToSaturation { .. } => Some(0x03),
            Self::MoveToColorTemperature { .. } => Some(0x0A),
            Self::GoToLiftPercentage { .. } => Some(0x05),
            Self::GoToTiltPercentage { .. } => Some(0x08),
            Self::ZoneEnrollResponse { .. } => Some(0x00),
            Self::WriteAttribute { .. } => None,
        }
    }

    /// The enrollment answer a zone device expects from the coordinator.
    pub fn enroll_success(zone_id: u8) -> Self {
        Self::ZoneEnrollResponse {
            enroll_response_code: 0,
            zone_id,
        }
    }
}

impl std::fmt::Display for ZclCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_ids() {
        assert_eq!(ZclCommand::On.command_id(), Some(0x01));
        assert_eq!(
            ZclCommand::MoveToColorTemperature {
                mireds: 300,
                transition_time: 0
            }
            .command_id(),
            Some(0x0A)
        );
        assert_eq!(
            ZclCommand::WriteAttribute {
                attribute: 0x0012,
                value: Value::Integer(2100)
            }
            .command_id(),
            None
        );
    }

    #[test]
    fn test_enroll_success() {
        assert_eq!(
            ZclCommand::enroll_success(10),
            ZclCommand::ZoneEnrollResponse {
                enroll_response_code: 0,
                zone_id: 10
            }
        );
    }
}
