//! IRC protocol layer: session management, framing, parsing, outbound
//! commands, and handler dispatch.

pub mod client;
pub mod codec;
pub mod commands;
pub mod ctcp;
pub mod handler;
pub mod identity;
pub mod message;
mod reader;
