//! Link to the native component that owns the operating system's media
//! controls and the presence integration.
//!
//! Outbound, canonical adapter events become JSON envelopes handed to a
//! synchronous [`NativeBridge`]. Inbound, the native side pushes control
//! requests and its own log records over an `async_channel`.

pub mod protocol;
mod relay;

pub use {
    protocol::{
        BridgeCommand, CommandResult, CommandStatus, ControlRequest, CoverSource, InboundMessage,
        LogRecord, MetadataPayload, PlayStatePayload,
    },
    relay::{NativeBridge, Relay},
};
