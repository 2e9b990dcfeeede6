//! Command-driven Telegram relay for generative AI providers.
//!
//! Inbound messages are routed by `/command` to a configured network of an
//! AI provider, with per-conversation history, a file-backed whitelist and a
//! bounded retry policy around every outbound provider call.

pub mod access;
pub mod bot;
pub mod config;
pub mod llm;
pub mod registry;
pub mod store;
pub mod utils;
pub mod whitelist;
