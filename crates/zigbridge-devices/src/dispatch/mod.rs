//! Value translation in both directions.
//!
//! [`InboundDispatcher`] turns radio events into store updates and host
//! notifications; [`OutboundDispatcher`] turns host writes into radio
//! commands. Neither talks to the radio itself.

mod inbound;
mod outbound;

pub use inbound::{Applied, InboundDispatcher};
pub use outbound::{OutboundDispatcher, WritePlan, WriteTarget};
