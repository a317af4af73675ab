//! Vendor DataPoints tunneled over the private `0xEF00` cluster.

pub mod frame;
pub mod hsv;
pub mod mapping;
pub mod value;

pub use frame::{DataPointFrame, SequenceCounter};
pub use hsv::{HsvColor, HSV_CAPABILITIES};
pub use mapping::{DataPointEntry, DataPointTable, DpTransform, Normalized};
pub use value::{CodecError, DataPoint, DpType};
