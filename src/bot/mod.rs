//! Event routing and command handlers.

/// Throttle for denial log lines.
pub mod denial;
/// Inbound event model and the command dispatcher.
pub mod dispatch;
/// Built-in and provider-call handlers.
pub mod handlers;

pub use denial::DenialCache;
pub use dispatch::{Dispatcher, InboundEvent, OutboundAction};
