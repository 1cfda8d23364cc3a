//! Channel-facing types: the inbound event the transport hands us and the
//! outbound adapter the workflow replies through.
//!
//! The transport itself (delivery, media encoding, group administration) lives
//! outside this workspace and only has to implement [`ChannelOutbound`].

pub mod error;
pub mod event;
pub mod memory;
pub mod outbound;

pub use {
    error::{Error, Result},
    event::InboundEvent,
    memory::{CapturingOutbound, SentMessage},
    outbound::ChannelOutbound,
};
