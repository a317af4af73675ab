//! Packed HSV colour payloads.
//!
//! Colour DataPoints carry twelve hex characters `HHHHSSSSVVVV`: hue in
//! degrees (0..=360), saturation and value in 0..=1000, each as a 16-bit
//! big-endian number.

use zigbridge_core::Value;

use super::value::CodecError;

/// Capabilities fed by one colour DataPoint, in payload order.
pub const HSV_CAPABILITIES: [&str; 3] = ["light_hue", "light_saturation", "dim"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvColor {
    /// Degrees, 0..=360
    pub hue: u16,
    /// 0..=1000
    pub saturation: u16,
    /// 0..=1000
    pub value: u16,
}

impl HsvColor {
    pub const ENCODED_LEN: usize = 12;

    /// Parse the hex payload. Only the first twelve characters are significant.
    pub fn decode(payload: &str) -> Result<Self, CodecError> {
        if !payload.is_ascii() {
            return Err(CodecError::InvalidHex(format!("non-ASCII payload {:?}", payload)));
        }
        if payload.len() < Self::ENCODED_LEN {
            return Err(CodecError::Truncated {
                needed: Self::ENCODED_LEN,
                available: payload.len(),
            });
        }
        let bytes = hex::decode(&payload[..Self::ENCODED_LEN])
            .map_err(|e| CodecError::InvalidHex(e.to_string()))?;

        let color = Self {
            hue: u16::from_be_bytes([bytes[0], bytes[1]]),
            saturation: u16::from_be_bytes([bytes[2], bytes[3]]),
            value: u16::from_be_bytes([bytes[4], bytes[5]]),
        };

        if color.hue > 360 || color.saturation > 1000 || color.value > 1000 {
            return Err(CodecError::Malformed(format!(
                "HSV component out of range: {:?}",
                color
            )));
        }
        Ok(color)
    }

    /// Accepts string payloads and raw ASCII bytes.
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::String(s) => Self::decode(s),
            Value::Binary(bytes) => {
                let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Self::decode(s)
            }
            other => Err(CodecError::Malformed(format!(
                "expected HSV string, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(6);
        bytes.extend_from_slice(&self.hue.to_be_bytes());
        bytes.extend_from_slice(&self.saturation.to_be_bytes());
        bytes.extend_from_slice(&self.value.to_be_bytes());
        hex::encode(bytes)
    }

    /// Build from normalized capability values in `[0, 1]`.
    pub fn from_normalized(hue: f64, saturation: f64, value: f64) -> Self {
        Self {
            hue: (hue.clamp(0.0, 1.0) * 360.0).round() as u16,
            saturation: (saturation.clamp(0.0, 1.0) * 1000.0).round() as u16,
            value: (value.clamp(0.0, 1.0) * 1000.0).round() as u16,
        }
    }

    /// `[light_hue, light_saturation, dim]`, each in `[0, 1]`.
    pub fn normalized(&self) -> [f64; 3] {
        [
            self.hue as f64 / 360.0,
            self.saturation as f64 / 1000.0,
            self.value as f64 / 1000.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fifteen_degrees() {
        let color = HsvColor::decode("000F03E803E8").unwrap();
        assert_eq!(
            color,
            HsvColor {
                hue: 15,
                saturation: 1000,
                value: 1000
            }
        );
        let [h, s, v] = color.normalized();
        assert!((h - 0.0417).abs() < 1e-4);
        assert_eq!(s, 1.0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn test_decode_leading_f0_is_240_degrees() {
        // 0x00F0 in the hue field, not 15 degrees
        let color = HsvColor::decode("00F003E803E8").unwrap();
        assert_eq!(color.hue, 240);
        assert_eq!(color.saturation, 1000);
        assert_eq!(color.value, 1000);
        let [h, _, _] = color.normalized();
        assert!((h - 240.0 / 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_ascii_payload_is_invalid_hex() {
        // Byte 12 falls inside the two-byte 'é'
        let payload = "00F003E803E\u{e9}";
        assert_eq!(payload.len(), 13);
        assert!(matches!(HsvColor::decode(payload), Err(CodecError::InvalidHex(_))));
        assert!(matches!(
            HsvColor::decode("é00F003E803E8"),
            Err(CodecError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_encode_is_lowercase_hex() {
        let color = HsvColor {
            hue: 240,
            saturation: 500,
            value: 1000,
        };
        assert_eq!(color.encode(), "00f001f403e8");
        assert_eq!(HsvColor::decode(&color.encode()).unwrap(), color);
    }

    #[test]
    fn test_short_payload_rejected() {
        assert_eq!(
            HsvColor::decode("00F003E8"),
            Err(CodecError::Truncated {
                needed: 12,
                available: 8
            })
        );
        assert!(HsvColor::decode("zzzzzzzzzzzz").is_err());
        assert!(HsvColor::from_value(&Value::Integer(5)).is_err());
    }

    #[test]
    fn test_component_range_checked() {
        // hue 0x0200 = 512 degrees
        assert!(HsvColor::decode("020003E803E8").is_err());
    }

    #[test]
    fn test_from_normalized() {
        let color = HsvColor::from_normalized(0.5, 0.25, 1.0);
        assert_eq!(color.hue, 180);
        assert_eq!(color.saturation, 250);
        assert_eq!(color.value, 1000);
    }
}
