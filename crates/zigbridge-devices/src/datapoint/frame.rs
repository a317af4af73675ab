//! DataPoint frame codec.
//!
//! A frame is a 2-byte big-endian sequence number followed by one or more
//! records of the form `[dp:1][type:1][len:2 BE][data:len]`.

use std::sync::atomic::{AtomicU16, Ordering};

use super::value::{CodecError, DataPoint, DpType};

const HEADER_LEN: usize = 2;
const RECORD_HEADER_LEN: usize = 4;

/// Decoded DataPoint frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPointFrame {
    pub seq: u16,
    pub datapoints: Vec<DataPoint>,
}

impl DataPointFrame {
    pub fn new(seq: u16, datapoints: Vec<DataPoint>) -> Self {
        Self { seq, datapoints }
    }

    /// Decode a frame. Truncated records and unknown types reject the whole frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }

        let seq = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut datapoints = Vec::new();
        let mut rest = &bytes[HEADER_LEN..];

        while !rest.is_empty() {
            if rest.len() < RECORD_HEADER_LEN {
                return Err(CodecError::Truncated {
                    needed: RECORD_HEADER_LEN,
                    available: rest.len(),
                });
            }
            let dp = rest[0];
            let dp_type = DpType::try_from(rest[1])?;
            let len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            let end = RECORD_HEADER_LEN + len;
            if rest.len() < end {
                return Err(CodecError::Truncated {
                    needed: end,
                    available: rest.len(),
                });
            }
            datapoints.push(DataPoint {
                dp,
                dp_type,
                data: rest[RECORD_HEADER_LEN..end].to_vec(),
            });
            rest = &rest[end..];
        }

        if datapoints.is_empty() {
            return Err(CodecError::Malformed("frame carries no DataPoints".to_string()));
        }

        Ok(Self { seq, datapoints })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_LEN
                + self
                    .datapoints
                    .iter()
                    .map(|d| RECORD_HEADER_LEN + d.data.len())
                    .sum::<usize>(),
        );
        out.extend_from_slice(&self.seq.to_be_bytes());
        for d in &self.datapoints {
            out.push(d.dp);
            out.push(d.dp_type as u8);
            out.extend_from_slice(&(d.data.len() as u16).to_be_bytes());
            out.extend_from_slice(&d.data);
        }
        out
    }
}

/// Wrapping sequence number source for outbound frames.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU16);

impl SequenceCounter {
    pub fn new(start: u16) -> Self {
        Self(AtomicU16::new(start))
    }

    pub fn next(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zigbridge_core::Value;

    #[test]
    fn test_decode_multi_record_frame() {
        let bytes = [
            0x00, 0x2A, // seq 42
            0x01, 0x01, 0x00, 0x01, 0x01, // dp 1 bool true
            0x03, 0x02, 0x00, 0x04, 0x00, 0x00, 0x02, 0xEE, // dp 3 value 750
        ];
        let frame = DataPointFrame::decode(&bytes).unwrap();
        assert_eq!(frame.seq, 42);
        assert_eq!(frame.datapoints.len(), 2);
        assert_eq!(frame.datapoints[0].decode_value().unwrap(), Value::Boolean(true));
        assert_eq!(frame.datapoints[1].decode_value().unwrap(), Value::Integer(750));
        assert_eq!(frame.encode(), bytes.to_vec());
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = [0x00, 0x01, 0x03, 0x02, 0x00, 0x04, 0x00, 0x00];
        assert_eq!(
            DataPointFrame::decode(&bytes),
            Err(CodecError::Truncated {
                needed: 8,
                available: 6
            })
        );
    }

    #[test]
    fn test_empty_and_unknown_type() {
        assert!(matches!(
            DataPointFrame::decode(&[0x00]),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(
            DataPointFrame::decode(&[0x00, 0x01]),
            Err(CodecError::Malformed(_))
        ));
        assert_eq!(
            DataPointFrame::decode(&[0x00, 0x01, 0x01, 0x07, 0x00, 0x00]),
            Err(CodecError::UnknownType(0x07))
        );
    }

    #[test]
    fn test_sequence_counter_wraps() {
        let counter = SequenceCounter::new(u16::MAX);
        assert_eq!(counter.next(), u16::MAX);
        assert_eq!(counter.next(), 0);
    }
}
