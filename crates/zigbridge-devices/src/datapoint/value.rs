//! DataPoint records and their typed payloads.

use serde::{Deserialize, Serialize};
use zigbridge_core::{EngineError, Value};

/// Errors decoding or encoding DataPoint payloads and frames.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Insufficient data: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Unknown DataPoint type 0x{0:02x}")]
    UnknownType(u8),

    #[error("Invalid length {len} for {dp_type:?} payload")]
    InvalidLength { dp_type: DpType, len: usize },

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("Cannot encode {value_type} as {dp_type:?}")]
    Incompatible {
        dp_type: DpType,
        value_type: &'static str,
    },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        EngineError::Codec(err.to_string())
    }
}

/// Wire type of a DataPoint payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DpType {
    Raw = 0x00,
    Bool = 0x01,
    /// 4-byte big-endian signed integer
    Value = 0x02,
    String = 0x03,
    /// 1-byte enumeration
    Enum = 0x04,
    /// 1, 2 or 4 byte big-endian bit field
    Bitmap = 0x05,
}

impl TryFrom<u8> for DpType {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(Self::Raw),
            0x01 => Ok(Self::Bool),
            0x02 => Ok(Self::Value),
            0x03 => Ok(Self::String),
            0x04 => Ok(Self::Enum),
            0x05 => Ok(Self::Bitmap),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

/// One DataPoint: index, wire type and raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub dp: u8,
    pub dp_type: DpType,
    pub data: Vec<u8>,
}

impl DataPoint {
    pub fn bool(dp: u8, value: bool) -> Self {
        Self {
            dp,
            dp_type: DpType::Bool,
            data: vec![value as u8],
        }
    }

    pub fn value(dp: u8, value: i32) -> Self {
        Self {
            dp,
            dp_type: DpType::Value,
            data: value.to_be_bytes().to_vec(),
        }
    }

    pub fn enumeration(dp: u8, value: u8) -> Self {
        Self {
            dp,
            dp_type: DpType::Enum,
            data: vec![value],
        }
    }

    pub fn string(dp: u8, value: &str) -> Self {
        Self {
            dp,
            dp_type: DpType::String,
            data: value.as_bytes().to_vec(),
        }
    }

    pub fn raw(dp: u8, data: Vec<u8>) -> Self {
        Self {
            dp,
            dp_type: DpType::Raw,
            data,
        }
    }

    /// Decode the payload into a [`Value`].
    pub fn decode_value(&self) -> Result<Value, CodecError> {
        let invalid = || CodecError::InvalidLength {
            dp_type: self.dp_type,
            len: self.data.len(),
        };

        match self.dp_type {
            DpType::Raw => Ok(Value::Binary(self.data.clone())),
            DpType::Bool => match self.data.as_slice() {
                [b] => Ok(Value::Boolean(*b != 0)),
                _ => Err(invalid()),
            },
            DpType::Value => {
                let bytes: [u8; 4] = self.data.as_slice().try_into().map_err(|_| invalid())?;
                Ok(Value::Integer(i32::from_be_bytes(bytes) as i64))
            }
            DpType::String => String::from_utf8(self.data.clone())
                .map(Value::String)
                .map_err(|_| CodecError::InvalidUtf8),
            DpType::Enum => match self.data.as_slice() {
                [b] => Ok(Value::Integer(*b as i64)),
                _ => Err(invalid()),
            },
            DpType::Bitmap => match self.data.as_slice() {
                [a] => Ok(Value::Integer(*a as i64)),
                [a, b] => Ok(Value::Integer(u16::from_be_bytes([*a, *b]) as i64)),
                [a, b, c, d] => Ok(Value::Integer(u32::from_be_bytes([*a, *b, *c, *d]) as i64)),
                _ => Err(invalid()),
            },
        }
    }

    /// Encode `value` as a DataPoint of the given wire type.
    pub fn encode(dp: u8, dp_type: DpType, value: &Value) -> Result<Self, CodecError> {
        let incompatible = || CodecError::Incompatible {
            dp_type,
            value_type: value.type_name(),
        };

        match dp_type {
            DpType::Bool => value
                .as_bool()
                .map(|b| Self::bool(dp, b))
                .ok_or_else(incompatible),
            DpType::Value => {
                let v = value.as_i64().ok_or_else(incompatible)?;
                let v = i32::try_from(v).map_err(|_| incompatible())?;
                Ok(Self::value(dp, v))
            }
            DpType::Enum => {
                let v = value.as_i64().ok_or_else(incompatible)?;
                let v = u8::try_from(v).map_err(|_| incompatible())?;
                Ok(Self::enumeration(dp, v))
            }
            DpType::Bitmap => {
                let v = value.as_i64().ok_or_else(incompatible)?;
                let data = if let Ok(b) = u8::try_from(v) {
                    vec![b]
                } else if let Ok(w) = u16::try_from(v) {
                    w.to_be_bytes().to_vec()
                } else {
                    u32::try_from(v).map_err(|_| incompatible())?.to_be_bytes().to_vec()
                };
                Ok(Self {
                    dp,
                    dp_type,
                    data,
                })
            }
            DpType::String => value
                .as_str()
                .map(|s| Self::string(dp, s))
                .ok_or_else(incompatible),
            DpType::Raw => match value {
                Value::Binary(bytes) => Ok(Self::raw(dp, bytes.clone())),
                Value::String(s) => Ok(Self::raw(dp, s.as_bytes().to_vec())),
                _ => Err(incompatible()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_signed_big_endian() {
        let dp = DataPoint {
            dp: 2,
            dp_type: DpType::Value,
            data: vec![0xFF, 0xFF, 0xFF, 0xF6],
        };
        assert_eq!(dp.decode_value().unwrap(), Value::Integer(-10));
        assert_eq!(DataPoint::value(3, 750).data, vec![0x00, 0x00, 0x02, 0xEE]);
    }

    #[test]
    fn test_short_value_rejected() {
        let dp = DataPoint {
            dp: 2,
            dp_type: DpType::Value,
            data: vec![0x00, 0x01],
        };
        assert_eq!(
            dp.decode_value(),
            Err(CodecError::InvalidLength {
                dp_type: DpType::Value,
                len: 2
            })
        );
    }

    #[test]
    fn test_bitmap_widths() {
        let wide = DataPoint {
            dp: 9,
            dp_type: DpType::Bitmap,
            data: vec![0x01, 0x00],
        };
        assert_eq!(wide.decode_value().unwrap(), Value::Integer(256));
        let encoded = DataPoint::encode(9, DpType::Bitmap, &Value::Integer(256)).unwrap();
        assert_eq!(encoded.data, vec![0x01, 0x00]);
    }

    #[test]
    fn test_encode_incompatible() {
        assert!(DataPoint::encode(1, DpType::Bool, &Value::String("yes".into())).is_err());
        assert!(DataPoint::encode(4, DpType::Enum, &Value::Integer(300)).is_err());
    }

    #[test]
    fn test_unknown_type_code() {
        assert_eq!(DpType::try_from(0x09), Err(CodecError::UnknownType(0x09)));
        assert_eq!(DpType::try_from(0x04), Ok(DpType::Enum));
    }

    #[test]
    fn test_codec_error_converts() {
        let err: EngineError = CodecError::InvalidUtf8.into();
        assert!(matches!(err, EngineError::Codec(_)));
    }
}
